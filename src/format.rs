use anyhow::{anyhow, Context, Result};
use std::path::Path;
use tracing::debug;

use crate::models::{
    BilletSubcategory, PhysicalReadiness, PromotionStatus, Report, ReportType, SummaryGroup,
};

/// On-disk formats a report data file can be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum DataFormat {
    Json,
    Toml,
}

impl DataFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("json") => Ok(DataFormat::Json),
            Some("toml") => Ok(DataFormat::Toml),
            _ => Err(anyhow!(
                "Cannot tell the format of {} from its extension; pass --format json or --format toml",
                path.display()
            )),
        }
    }
}

pub fn parse_report(text: &str, format: DataFormat) -> Result<Report> {
    match format {
        DataFormat::Json => serde_json::from_str(text).context("Failed to parse JSON report"),
        DataFormat::Toml => toml::from_str(text).context("Failed to parse TOML report"),
    }
}

/// Reads a report data file, guessing the format from the extension unless given.
pub fn load_report(path: &Path, format: Option<DataFormat>) -> Result<Report> {
    let format = match format {
        Some(format) => format,
        None => DataFormat::from_path(path)?,
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read report file: {}", path.display()))?;
    debug!(path = %path.display(), ?format, "loading report");
    parse_report(&text, format).with_context(|| format!("Invalid report file: {}", path.display()))
}

pub fn to_string(report: &Report, format: DataFormat) -> Result<String> {
    match format {
        DataFormat::Json => {
            serde_json::to_string_pretty(report).context("Failed to serialize report as JSON")
        }
        DataFormat::Toml => to_toml(report),
    }
}

/// A blank report for users to fill out.
pub fn template(report_type: ReportType, format: DataFormat) -> Result<String> {
    to_string(&Report::new(report_type), format)
}

/// TOML has no null, so unset fields are listed as comments with a hint.
fn to_toml(report: &Report) -> Result<String> {
    let mut text = toml::to_string(report).context("Failed to serialize report as TOML")?;

    let value = serde_json::to_value(report)?;
    let unset: Vec<&String> = value
        .as_object()
        .map(|fields| {
            fields
                .iter()
                .filter(|(_, v)| v.is_null())
                .map(|(k, _)| k)
                .collect()
        })
        .unwrap_or_default();

    if !unset.is_empty() {
        text.push_str("\n# Unset fields\n");
        for key in unset {
            text.push_str(&format!("# {} = {}\n", key, hint(key)));
        }
    }
    Ok(text)
}

fn choices<T: std::fmt::Display>(all: &[T]) -> String {
    let codes: Vec<String> = all.iter().map(|c| format!("\"{}\"", c)).collect();
    format!("one of {}", codes.join(", "))
}

fn hint(key: &str) -> String {
    match key {
        "group" => choices(SummaryGroup::ALL),
        "promotion_status" => choices(PromotionStatus::ALL),
        "billet_subcategory" => choices(BilletSubcategory::ALL),
        "physical_readiness" => choices(PhysicalReadiness::ALL),
        "indiv_promo_rec" => "0-5 (0 = NOB, 5 = Early Promote)".to_string(),
        "retain" => "true or false".to_string(),
        k if k.starts_with("date_") || k.starts_with("period_") => "\"YYYY-MM-DD\"".to_string(),
        _ => "0-5 (0 = NOB)".to_string(),
    }
}
