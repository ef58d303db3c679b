use anyhow::{Context, Result};
use config::{Config as ConfigLoader, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;

/// User settings: defaults, then `navfitx.toml` in the config dir, then
/// `NAVFITX_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database: PathBuf,
    pub output_dir: PathBuf,
    pub layout: Option<PathBuf>,
    /// Blank-form PDF to fill in; without it forms print on plain pages.
    pub template: Option<PathBuf>,
    pub log: String,
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", "navfitx")
}

/// Where the database lives when nothing overrides it.
pub fn default_database_path() -> PathBuf {
    match project_dirs() {
        Some(dirs) => dirs.data_dir().join("navfitx.db"),
        None => PathBuf::from("navfitx.db"),
    }
}

pub fn config_file_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join("navfitx.toml"))
}

impl Settings {
    pub fn load() -> Result<Self> {
        let mut builder = ConfigLoader::builder()
            .set_default("database", default_database_path().to_string_lossy().into_owned())?
            .set_default("output_dir", ".")?
            .set_default("log", "warn")?;

        if let Some(path) = config_file_path() {
            builder = builder.add_source(File::from(path).required(false));
        }

        builder
            .add_source(Environment::with_prefix("NAVFITX"))
            .build()
            .context("Failed to read settings")?
            .try_deserialize()
            .context("Invalid settings")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_sources() {
        let settings: Settings = ConfigLoader::builder()
            .set_default("database", "/tmp/navfitx.db")
            .unwrap()
            .set_default("output_dir", ".")
            .unwrap()
            .set_default("log", "warn")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(settings.output_dir, PathBuf::from("."));
        assert!(settings.layout.is_none());
        assert!(settings.template.is_none());
        assert_eq!(settings.log, "warn");
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("navfitx.toml");
        std::fs::write(
            &path,
            "output_dir = \"/srv/forms\"\nlayout = \"custom.toml\"\ntemplate = \"NAVPERS_1610-2.pdf\"\n",
        )
        .unwrap();

        let settings: Settings = ConfigLoader::builder()
            .set_default("database", "navfitx.db")
            .unwrap()
            .set_default("output_dir", ".")
            .unwrap()
            .set_default("log", "warn")
            .unwrap()
            .add_source(File::from(path))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(settings.output_dir, PathBuf::from("/srv/forms"));
        assert_eq!(settings.layout, Some(PathBuf::from("custom.toml")));
        assert_eq!(settings.template, Some(PathBuf::from("NAVPERS_1610-2.pdf")));
    }

    #[test]
    fn test_default_database_is_named_navfitx() {
        assert!(default_database_path().ends_with("navfitx.db"));
    }
}
