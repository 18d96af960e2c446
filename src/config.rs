//! Pipeline configuration.
//!
//! Settings are layered, later layers winning:
//!
//! 1. Built-in defaults ([`PipelineConfig::default`])
//! 2. An optional YAML file passed with `--config`
//! 3. Command-line flags and their environment variables
//!
//! Any key may be omitted from the YAML file:
//!
//! ```yaml
//! base_url: "https://fashion-studio.dicoding.dev/?page={}"
//! max_pages: 10
//! delay_secs: 1.5
//! csv_path: ./out/products.csv
//! spreadsheet_id: 1AbC...
//! ```

use crate::cli::Cli;
use crate::scrapers::fashion_studio::{ScrapeSettings, PAGE_PLACEHOLDER};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, instrument};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/96.0.4664.110 Safari/537.36";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("base_url {0:?} has no `{{}}` page placeholder")]
    MissingPlaceholder(String),
    #[error("max_pages must be at least 1")]
    NoPages,
    #[error("delay_secs must be a non-negative number, got {0}")]
    BadDelay(f64),
    #[error("request_timeout_secs must be at least 1")]
    BadTimeout,
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub base_url: String,
    pub start_page: u32,
    pub max_pages: u32,
    pub delay_secs: f64,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub csv_path: PathBuf,
    pub database_url: Option<String>,
    pub spreadsheet_id: Option<String>,
    pub sheet_range: String,
    pub service_account_file: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            base_url: "https://fashion-studio.dicoding.dev/?page={}".to_string(),
            start_page: 1,
            max_pages: 50,
            delay_secs: 5.0,
            request_timeout_secs: 15,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            csv_path: PathBuf::from("products.csv"),
            database_url: None,
            spreadsheet_id: None,
            sheet_range: "Sheet1!A1".to_string(),
            service_account_file: PathBuf::from("./google-sheets-api.json"),
        }
    }
}

impl PipelineConfig {
    /// Parse a YAML config file; missing keys keep their defaults.
    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn from_yaml_str(text: &str) -> Result<Self, serde_yaml::Error> {
        // An empty file deserializes to `null`, which `serde(default)` does not cover.
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }

    /// Overlay every flag the user actually passed.
    pub fn apply_cli(mut self, cli: &Cli) -> Self {
        if let Some(v) = &cli.base_url {
            self.base_url = v.clone();
        }
        if let Some(v) = cli.start_page {
            self.start_page = v;
        }
        if let Some(v) = cli.max_pages {
            self.max_pages = v;
        }
        if let Some(v) = cli.delay {
            self.delay_secs = v;
        }
        if let Some(v) = cli.timeout {
            self.request_timeout_secs = v;
        }
        if let Some(v) = &cli.user_agent {
            self.user_agent = v.clone();
        }
        if let Some(v) = &cli.csv_path {
            self.csv_path = v.clone();
        }
        if let Some(v) = &cli.database_url {
            self.database_url = Some(v.clone());
        }
        if let Some(v) = &cli.spreadsheet_id {
            self.spreadsheet_id = Some(v.clone());
        }
        if let Some(v) = &cli.sheet_range {
            self.sheet_range = v.clone();
        }
        if let Some(v) = &cli.service_account_file {
            self.service_account_file = v.clone();
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.base_url.contains(PAGE_PLACEHOLDER) {
            return Err(ConfigError::MissingPlaceholder(self.base_url.clone()));
        }
        if self.max_pages == 0 {
            return Err(ConfigError::NoPages);
        }
        if !self.delay_secs.is_finite() || self.delay_secs < 0.0 {
            return Err(ConfigError::BadDelay(self.delay_secs));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::BadTimeout);
        }
        Ok(())
    }

    /// Resolve defaults, the optional config file and the CLI into one validated config.
    #[instrument(level = "info", skip_all)]
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let base = match &cli.config {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };
        let config = base.apply_cli(cli);
        config.validate()?;
        debug!(?config.base_url, config.start_page, config.max_pages, "Resolved configuration");
        Ok(config)
    }

    pub fn scrape_settings(&self) -> ScrapeSettings {
        ScrapeSettings {
            base_url: self.base_url.clone(),
            start_page: self.start_page,
            max_pages: self.max_pages,
            delay: Duration::from_secs_f64(self.delay_secs),
            timeout: Duration::from_secs(self.request_timeout_secs),
            user_agent: self.user_agent.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_pages, 50);
        assert_eq!(config.sheet_range, "Sheet1!A1");
    }

    #[test]
    fn test_yaml_overrides_defaults() {
        let config = PipelineConfig::from_yaml_str(
            "max_pages: 3\ndelay_secs: 0.25\ncsv_path: ./out/products.csv\nspreadsheet_id: abc123\n",
        )
        .unwrap();
        assert_eq!(config.max_pages, 3);
        assert_eq!(config.delay_secs, 0.25);
        assert_eq!(config.csv_path, PathBuf::from("./out/products.csv"));
        assert_eq!(config.spreadsheet_id.as_deref(), Some("abc123"));
        assert_eq!(config.start_page, 1);
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(PipelineConfig::from_yaml_str("").unwrap(), PipelineConfig::default());
    }

    #[test]
    fn test_unknown_yaml_key_is_rejected() {
        assert!(PipelineConfig::from_yaml_str("max_page: 3\n").is_err());
    }

    #[test]
    fn test_cli_wins_over_yaml() {
        let from_yaml = PipelineConfig::from_yaml_str("max_pages: 3\nstart_page: 4\n").unwrap();
        let cli = Cli {
            max_pages: Some(7),
            database_url: Some("postgres://localhost/productdb".to_string()),
            ..Default::default()
        };
        let config = from_yaml.apply_cli(&cli);
        assert_eq!(config.max_pages, 7);
        assert_eq!(config.start_page, 4);
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/productdb"));
    }

    #[test]
    fn test_validation_errors() {
        let mut config = PipelineConfig {
            base_url: "https://example.com/".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::MissingPlaceholder(_))));

        config.base_url = "https://example.com/?page={}".to_string();
        config.max_pages = 0;
        assert!(matches!(config.validate(), Err(ConfigError::NoPages)));

        config.max_pages = 1;
        config.delay_secs = -1.0;
        assert!(matches!(config.validate(), Err(ConfigError::BadDelay(_))));

        config.delay_secs = 0.0;
        config.request_timeout_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::BadTimeout)));
    }

    #[test]
    fn test_load_reads_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("etl.yaml");
        std::fs::write(&path, "max_pages: 2\ndelay_secs: 0\n").unwrap();

        let cli = Cli {
            config: Some(path),
            ..Default::default()
        };
        let config = PipelineConfig::load(&cli).unwrap();
        assert_eq!(config.max_pages, 2);

        let settings = config.scrape_settings();
        assert!(settings.delay.is_zero());
        assert_eq!(settings.timeout, Duration::from_secs(15));
    }

    #[test]
    fn test_load_missing_config_file() {
        let cli = Cli {
            config: Some(PathBuf::from("/definitely/not/here.yaml")),
            ..Default::default()
        };
        assert!(matches!(PipelineConfig::load(&cli), Err(ConfigError::Read { .. })));
    }
}
