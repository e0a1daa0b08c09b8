use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::data::Generator;
use crate::extractors::Eagerness;

/// Configuration for a [`ParserManager`](crate::ParserManager).
///
/// Every field has a default, so a config file only needs the values it
/// changes.
///
/// # Loading
///
/// ```rust,no_run
/// use sd_parsers::config::Config;
/// use sd_parsers::{Eagerness, ParserManager};
///
/// // From a JSON file
/// let config = Config::load(Some("config.json".as_ref())).unwrap();
///
/// // Or use defaults and customize
/// let mut config = Config::default();
/// config.eagerness = Eagerness::Eager;
///
/// let manager = ParserManager::from_config(&config);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Highest extraction tier to attempt (`fast`, `default` or `eager`).
    pub eagerness: Eagerness,
    /// Snake-case parameter keys and turn numeric strings into numbers.
    pub normalize_parameters: bool,
    /// Log recovered extractor and parser failures.
    pub debug: bool,
    /// Parsers to try, in order.
    pub parsers: Vec<Generator>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            eagerness: Eagerness::Default,
            normalize_parameters: true,
            debug: false,
            parsers: Generator::ALL.to_vec(),
        }
    }
}

impl Config {
    /// `config.json` next to the executable.
    pub fn config_path() -> Result<PathBuf> {
        let exe_path = std::env::current_exe().context("Failed to get executable path")?;
        let exe_dir = exe_path
            .parent()
            .context("Failed to get executable directory")?;
        Ok(exe_dir.join("config.json"))
    }

    /// Load config from the given path, or from the default location.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        if !config_path.exists() {
            log::warn!(
                "Config file not found at {}. Using defaults.",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents =
            std::fs::read_to_string(&config_path).context("Failed to read config file")?;
        let config: Config =
            serde_json::from_str(&contents).context("Failed to parse config file")?;
        if config.parsers.is_empty() {
            log::warn!("No parsers configured in {}", config_path.display());
        }
        Ok(config)
    }

    /// Save config to the given path, or to the default location.
    pub fn save(&self, path: Option<&Path>) -> Result<()> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&config_path, contents).context("Failed to write config file")?;
        log::info!("Config saved to {}", config_path.display());
        Ok(())
    }
}
