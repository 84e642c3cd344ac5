use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::app::StorageObject;
use crate::error::ConfigError;
use crate::parse::{normalize_extension, parse_substitutions};

pub const CONFIG_VERSION: u32 = 1;
pub const DEFAULT_EXTENSIONS: [&str; 2] = ["jpg", "jpeg"];

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub version: Option<u32>,
    pub library_path: PathBuf,
    pub extensions: Vec<String>,
    // single CSV row: old,new,old,new,...
    pub name_substitutions: String,
    pub capitalize: bool,
    pub parse_year: bool,
    pub max_concurrency: usize,
    pub rewrite_dates: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: Some(CONFIG_VERSION),
            library_path: PathBuf::new(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            name_substitutions: String::new(),
            capitalize: false,
            parse_year: true,
            max_concurrency: 1,
            rewrite_dates: true,
        }
    }
}

impl Config {
    /// `~/.photo-uploader`
    pub fn storage_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("cannot find user's home dir")?;
        Ok(home.join(".".to_owned() + env!("CARGO_PKG_NAME")))
    }

    pub fn default_path() -> Result<PathBuf> {
        Ok(Self::storage_dir()?.join("config.json"))
    }

    pub fn log_dir() -> Result<PathBuf> {
        Ok(Self::storage_dir()?.join("logs"))
    }

    /// Load the config at `path`, writing defaults first when it does not exist.
    /// An empty `library_path` resolves to `library/` next to the config file.
    pub fn init_at<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let dir = path.parent().unwrap_or(Path::new("."));
        if !path.exists() {
            std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
            let config = Config { library_path: dir.join("library"), ..Config::default() };
            config.save_to(path)?;
            tracing::info!("[config] wrote defaults to {}", path.display());
        }
        let mut config = Config::read_from(path)?;
        if config.library_path.as_os_str().is_empty() {
            config.library_path = dir.join("library");
        }
        config.extensions = config.extensions.iter().map(|e| normalize_extension(e)).collect();
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrency == 0 {
            return Err(ConfigError::Concurrency(self.max_concurrency));
        }
        if self.extensions.iter().all(|e| e.is_empty()) {
            return Err(ConfigError::NoExtensions);
        }
        parse_substitutions(&self.name_substitutions)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_writes_defaults_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg").join("config.json");
        let c = Config::init_at(&path).unwrap();
        assert!(path.exists());
        assert_eq!(c.library_path, dir.path().join("cfg").join("library"));
        assert_eq!(c.extensions, vec!["jpg", "jpeg"]);
        assert_eq!(c.max_concurrency, 1);
        assert!(c.parse_year && c.rewrite_dates && !c.capitalize);

        std::fs::write(&path, r#"{"extensions":[".PNG"],"max_concurrency":4}"#).unwrap();
        let c = Config::init_at(&path).unwrap();
        assert_eq!(c.extensions, vec!["png"]);
        assert_eq!(c.max_concurrency, 4);
        // missing fields fall back to defaults
        assert!(c.parse_year);
    }

    #[test]
    fn validate_rejects_bad_values() {
        let c = Config { max_concurrency: 0, ..Config::default() };
        assert_eq!(c.validate(), Err(ConfigError::Concurrency(0)));
        let c = Config { name_substitutions: "a,b,c".into(), ..Config::default() };
        assert!(matches!(c.validate(), Err(ConfigError::Substitutions(_))));
        assert!(Config::default().validate().is_ok());
    }
}
