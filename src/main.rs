mod config;
mod db;
mod error;
mod format;
mod groups;
mod layout;
mod models;
mod pdf;
mod render;
mod traits;
mod tui;
mod validate;
mod wrap;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use crate::config::Settings;
use db::Database;
use format::DataFormat;
use layout::Layout;
use models::{Report, ReportType};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "navfitx")]
#[command(about = "Write, check and print Navy FITREP / EVAL / Chief EVAL forms")]
struct Cli {
    /// Database file (overrides the configured one)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Print a blank report to fill out
    Template {
        /// Kind of report
        #[arg(short = 't', long = "type")]
        report_type: ReportType,

        /// Data format
        #[arg(short, long, value_enum, default_value = "json")]
        format: DataFormat,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check a report file and list every problem
    Check {
        /// JSON or TOML report file
        file: PathBuf,
    },

    /// Print a report file to PDF
    Pdf {
        /// JSON or TOML report file
        file: PathBuf,

        /// Output PDF path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print even if the report fails validation
        #[arg(long)]
        no_validate: bool,

        /// Layout file to use instead of the built-in one
        #[arg(long)]
        layout: Option<PathBuf>,

        /// Blank-form PDF to fill in
        #[arg(long)]
        template: Option<PathBuf>,
    },

    /// Validate a report file and store it
    Save {
        /// JSON or TOML report file
        file: PathBuf,
    },

    /// List stored reports
    List {
        /// Only this kind of report
        #[arg(short = 't', long = "type")]
        report_type: Option<ReportType>,
    },

    /// Show a stored report
    Show {
        /// Report ID
        id: i64,
    },

    /// Write a stored report back out as a data file
    Dump {
        /// Report ID
        id: i64,

        /// Data format
        #[arg(short, long, value_enum, default_value = "json")]
        format: DataFormat,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print a stored report to PDF
    Export {
        /// Report ID
        id: i64,

        /// Output PDF path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Layout file to use instead of the built-in one
        #[arg(long)]
        layout: Option<PathBuf>,

        /// Blank-form PDF to fill in
        #[arg(long)]
        template: Option<PathBuf>,
    },

    /// Delete a stored report
    Delete {
        /// Report ID
        id: i64,
    },

    /// Show summary groups and their averages
    Groups,

    /// Browse stored reports interactively
    Browse,
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load()?;
    init_logging(&settings.log);

    let db_path = cli.db.clone().unwrap_or_else(|| settings.database.clone());
    let db = Database::open(&db_path)?;

    match cli.command {
        Commands::Init => {
            db.init()?;
            println!("Database initialized at {}", db.path().display());
        }

        Commands::Template {
            report_type,
            format,
            output,
        } => {
            let text = format::template(report_type, format)?;
            write_or_print(&text, output.as_deref())?;
        }

        Commands::Check { file } => {
            let mut report = format::load_report(&file, None)?;
            validate::normalize(&mut report);

            for warning in validate::field_warnings(&report) {
                println!("warning: {}", warning);
            }
            validate::validate(&report)?;
            println!("{} is valid ({})", file.display(), report.title());
        }

        Commands::Pdf {
            file,
            output,
            no_validate,
            layout,
            template,
        } => {
            let report = format::load_report(&file, None)?;
            let report = if no_validate {
                report
            } else {
                validate::submit(report)?
            };
            let layout = Layout::resolve(layout.as_ref().or(settings.layout.as_ref()).map(PathBuf::as_path))?;
            let output = output.unwrap_or_else(|| settings.output_dir.join(pdf::default_file_name(&report)));

            let template = template.as_ref().or(settings.template.as_ref());

            let average = stored_summary_average(&db, &report);
            pdf::create_pdf(&report, &layout, average, template.map(PathBuf::as_path), &output)?;
            println!("Wrote {}", output.display());
        }

        Commands::Save { file } => {
            db.ensure_initialized()?;
            let report = validate::submit(format::load_report(&file, None)?)?;
            let updating = report.id.is_some();
            let id = db.save_report(&report)?;
            if updating {
                println!("Updated report #{}", id);
            } else {
                println!("Saved report #{}", id);
            }
        }

        Commands::List { report_type } => {
            db.ensure_initialized()?;
            let reports = db.list_reports(report_type)?;
            if reports.is_empty() {
                println!("No reports found.");
            } else {
                println!(
                    "{:<6} {:<11} {:<28} {:<8} {:<10} {:>6} {:<5}",
                    "ID", "TYPE", "NAME", "RATE", "END", "AVG", "VALID"
                );
                println!("{}", "-".repeat(80));
                for report in &reports {
                    let valid = if validate::violations(report).is_empty() { "yes" } else { "no" };
                    println!(
                        "{:<6} {:<11} {:<28} {:<8} {:<10} {:>6} {:<5}",
                        report.id.unwrap_or_default(),
                        report.report_type().title(),
                        truncate(&report.name, 26),
                        truncate(&report.rate, 8),
                        render::format_date(report.period_end),
                        report.member_average(),
                        valid
                    );
                }
            }
        }

        Commands::Show { id } => {
            db.ensure_initialized()?;
            match db.get_report(id)? {
                Some(report) => print_report(&report, &db)?,
                None => {
                    println!("Report #{} not found.", id);
                }
            }
        }

        Commands::Dump { id, format, output } => {
            db.ensure_initialized()?;
            let report = db
                .get_report(id)?
                .ok_or_else(|| anyhow!("Report #{} not found", id))?;
            let text = format::to_string(&report, format)?;
            write_or_print(&text, output.as_deref())?;
        }

        Commands::Export {
            id,
            output,
            layout,
            template,
        } => {
            db.ensure_initialized()?;
            let report = db
                .get_report(id)?
                .ok_or_else(|| anyhow!("Report #{} not found", id))?;
            let layout = Layout::resolve(layout.as_ref().or(settings.layout.as_ref()).map(PathBuf::as_path))?;
            let output = output.unwrap_or_else(|| settings.output_dir.join(pdf::default_file_name(&report)));

            let template = template.as_ref().or(settings.template.as_ref());

            let average = stored_summary_average(&db, &report);
            pdf::create_pdf(&report, &layout, average, template.map(PathBuf::as_path), &output)?;
            println!("Wrote {}", output.display());
        }

        Commands::Delete { id } => {
            db.ensure_initialized()?;
            if db.delete_report(id)? {
                println!("Deleted report #{}", id);
            } else {
                println!("Report #{} not found.", id);
            }
        }

        Commands::Groups => {
            db.ensure_initialized()?;
            let reports = db.list_reports(None)?;
            let groups = groups::ranking_groups(&reports);
            if groups.is_empty() {
                println!("No reports found.");
            } else {
                println!("{:<50} {:>7} {:>8}", "SUMMARY GROUP", "REPORTS", "AVERAGE");
                println!("{}", "-".repeat(67));
                for group in &groups {
                    println!(
                        "{:<50} {:>7} {:>8}",
                        truncate(&group.key.describe(), 48),
                        group.reports.len(),
                        group.average()
                    );
                }
            }
        }

        Commands::Browse => {
            db.ensure_initialized()?;
            let layout = Layout::resolve(settings.layout.as_deref())?;
            tui::run_browse(&db, &layout, settings.template.as_deref(), &settings.output_dir)?;
        }
    }

    Ok(())
}

/// Summary-group average against the store, when there is one to ask.
fn stored_summary_average(db: &Database, report: &Report) -> Option<String> {
    if !db.exists() {
        info!("no database; summary group average is the member average");
        return None;
    }
    match db.list_reports(Some(report.report_type())) {
        Ok(stored) => Some(groups::summary_group_average(report, &stored)),
        Err(e) => {
            tracing::warn!("could not read stored reports: {:#}", e);
            None
        }
    }
}

fn write_or_print(text: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, text)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Wrote {}", path.display());
        }
        None => print!("{}", text),
    }
    Ok(())
}

fn print_report(report: &Report, db: &Database) -> Result<()> {
    println!("Report #{}", report.id.unwrap_or_default());
    println!("{}", report.title());
    println!("Rate/Desig: {} {}", report.rate, report.desig);
    println!("SSN: {}", report.ssn);
    println!("UIC/Station: {} {}", report.uic, report.station);
    if let Some(group) = report.group {
        println!("Group: {}", group);
    }
    println!(
        "Period: {} to {}",
        render::format_date(report.period_start),
        render::format_date(report.period_end)
    );
    if !report.senior_name.is_empty() {
        println!("Reporting senior: {} {}", report.senior_name, report.senior_grade);
    }

    println!("\n--- Traits ---");
    for t in report.trait_scores() {
        let score = match t.score {
            Some(traits::NOT_OBSERVED) => "NOB".to_string(),
            Some(s) => s.to_string(),
            None => "-".to_string(),
        };
        println!("{:<40} {}", t.label, score);
    }

    let stored = db.list_reports(Some(report.report_type()))?;
    println!("Member average: {}", report.member_average());
    println!(
        "Summary group average: {}",
        groups::summary_group_average(report, &stored)
    );
    if let Some(rec) = report.indiv_promo_rec {
        println!("Promotion recommendation: {}", rec.label());
    }

    if !report.comments.is_empty() {
        println!("\n--- Comments ---\n{}", wrap::wrap_comments(&report.comments));
    }

    let violations = validate::violations(report);
    if !violations.is_empty() {
        println!("\n--- Problems ---");
        for v in violations {
            println!("  - {}", v);
        }
    }
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("SHORT", 10), "SHORT");
        assert_eq!(truncate("DOE, JOHNATHAN ALEXANDER", 10), "DOE, JO...");
    }

    #[test]
    fn test_parse_pdf_command() {
        let cli = Cli::try_parse_from([
            "navfitx", "pdf", "doe.toml", "-o", "out.pdf", "--no-validate", "--db", "x.db",
        ])
        .unwrap();
        assert_eq!(cli.db, Some(PathBuf::from("x.db")));
        match cli.command {
            Commands::Pdf {
                file,
                output,
                no_validate,
                layout,
                template,
            } => {
                assert_eq!(file, PathBuf::from("doe.toml"));
                assert_eq!(output, Some(PathBuf::from("out.pdf")));
                assert!(no_validate);
                assert!(layout.is_none());
                assert!(template.is_none());
            }
            _ => panic!("expected pdf command"),
        }
    }

    #[test]
    fn test_parse_export_template() {
        let cli = Cli::try_parse_from(["navfitx", "export", "7", "--template", "NAVPERS_1616-26.pdf"])
            .unwrap();
        match cli.command {
            Commands::Export { id, template, .. } => {
                assert_eq!(id, 7);
                assert_eq!(template, Some(PathBuf::from("NAVPERS_1616-26.pdf")));
            }
            _ => panic!("expected export command"),
        }
    }

    #[test]
    fn test_summary_average_without_database_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("navfitx.db");
        let db = Database::open(&path).unwrap();

        let report = Report::new(ReportType::Fitrep);
        assert_eq!(stored_summary_average(&db, &report), None);
        assert!(!path.exists());
        assert!(!path.parent().unwrap().exists());
    }

    #[test]
    fn test_parse_template_type() {
        let cli = Cli::try_parse_from(["navfitx", "template", "-t", "chiefeval", "-f", "toml"])
            .unwrap();
        match cli.command {
            Commands::Template {
                report_type,
                format,
                ..
            } => {
                assert_eq!(report_type, ReportType::ChiefEval);
                assert_eq!(format, DataFormat::Toml);
            }
            _ => panic!("expected template command"),
        }
    }
}
