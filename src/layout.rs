//! Where each value lands on the printed form.
//!
//! A layout is data, not code: swapping to another form revision means
//! supplying another TOML file with the same keys.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

const EMBEDDED: &str = include_str!("../layouts/navfit98.toml");

/// Number of pages every form has (front and back).
pub const FORM_PAGES: usize = 2;

#[derive(Debug, Clone, Deserialize)]
pub struct Layout {
    pub revision: String,
    pub page: PageSize,
    #[serde(default)]
    pub text: BTreeMap<String, Vec<Placement>>,
    #[serde(default)]
    pub marks: BTreeMap<String, Placement>,
    pub traits: TraitGrid,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Placement {
    pub page: usize,
    pub x: f32,
    pub y: f32,
    #[serde(default = "default_size")]
    pub size: f32,
    #[serde(default = "default_line_height")]
    pub line_height: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TraitGrid {
    /// X position of each score column, NOB first.
    pub columns: Vec<f32>,
    pub rows: Vec<TraitRow>,
    #[serde(default = "default_size")]
    pub size: f32,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TraitRow {
    pub page: usize,
    pub y: f32,
}

fn default_size() -> f32 {
    12.0
}

fn default_line_height() -> f32 {
    1.0
}

impl Layout {
    /// The layout compiled into the binary.
    pub fn embedded() -> Result<Self> {
        Self::parse(EMBEDDED).context("Embedded layout is invalid")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read layout file: {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid layout file: {}", path.display()))
    }

    /// Loads `path` when given, otherwise the embedded layout.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                debug!(path = %path.display(), "using layout file");
                Self::load(path)
            }
            None => Self::embedded(),
        }
    }

    pub fn parse(text: &str) -> Result<Self> {
        let layout: Layout = toml::from_str(text)?;
        layout.check()?;
        Ok(layout)
    }

    fn check(&self) -> Result<()> {
        let pages = self
            .text
            .values()
            .flatten()
            .map(|p| p.page)
            .chain(self.marks.values().map(|p| p.page))
            .chain(self.traits.rows.iter().map(|r| r.page));
        for page in pages {
            if page >= FORM_PAGES {
                return Err(anyhow!(
                    "Layout places a value on page {} but the form has {} pages",
                    page,
                    FORM_PAGES
                ));
            }
        }
        if self.traits.columns.len() != 6 {
            return Err(anyhow!(
                "Trait grid needs 6 columns (NOB and 1-5), found {}",
                self.traits.columns.len()
            ));
        }
        Ok(())
    }

    pub fn text(&self, key: &str) -> &[Placement] {
        self.text.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn mark(&self, key: &str) -> Option<&Placement> {
        self.marks.get(key)
    }

    /// Placement of the X for `score` on trait row `row`.
    pub fn trait_mark(&self, row: usize, score: u8) -> Option<Placement> {
        let row = self.traits.rows.get(row)?;
        let x = *self.traits.columns.get(usize::from(score))?;
        Some(Placement {
            page: row.page,
            x,
            y: row.y,
            size: self.traits.size,
            line_height: default_line_height(),
        })
    }
}
