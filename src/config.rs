//! Configuration file handling.
//!
//! The configuration file is stored at `$FINANZAS_HOME/config.json` and holds the base URL of the
//! finance API, where the session is kept, and a few report settings.

use crate::report::{Category, KeywordTable};
use crate::{utils, Result};
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const APP_NAME: &str = "finanzas";
const CONFIG_VERSION: u8 = 1;
const TOP_N: usize = 5;
const SECRETS: &str = ".secrets";
const SESSION_JSON: &str = "session.json";
const CONFIG_JSON: &str = "config.json";

/// The `Config` object represents the configuration of the app. You instantiate it by providing
/// the path to `$FINANZAS_HOME` and from there it loads `$FINANZAS_HOME/config.json`. It provides
/// paths to other items that are either configurable or are expected in a certain location within
/// the home directory.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    secrets: PathBuf,
    config_path: PathBuf,
    config_file: ConfigFile,
}

impl Config {
    /// Creates the home directory, its `.secrets` subdirectory and an initial `config.json` that
    /// points at `base_url`.
    ///
    /// # Errors
    /// - Returns an error if `base_url` is not a usable URL or if any file operation fails.
    pub async fn create(dir: impl Into<PathBuf>, base_url: &str) -> Result<Self> {
        crate::api::parse_base_url(base_url)?;

        let maybe_relative = dir.into();
        utils::make_dir(&maybe_relative)
            .await
            .context("Unable to create the finanzas home directory")?;
        let root = utils::canonicalize(&maybe_relative).await?;

        let secrets = root.join(SECRETS);
        utils::make_dir(&secrets).await?;

        let config_path = root.join(CONFIG_JSON);
        if config_path.is_file() {
            bail!(
                "A config file already exists at '{}'",
                config_path.display()
            );
        }
        let config_file = ConfigFile {
            base_url: base_url.to_string(),
            ..ConfigFile::default()
        };
        config_file.save(&config_path).await?;

        Ok(Self {
            root,
            secrets,
            config_path,
            config_file,
        })
    }

    /// This will
    /// - validate that the home directory exists and that the config file exists
    /// - load the config file
    /// - validate that the secrets directory exists
    pub async fn load(finanzas_home: impl Into<PathBuf>) -> Result<Self> {
        let maybe_relative = finanzas_home.into();
        let root = utils::canonicalize(&maybe_relative)
            .await
            .context("The finanzas home is missing, run 'finanzas init' first")?;
        let _ = utils::read_dir(&root)
            .await
            .context("The finanzas home is not readable")?;

        let config_path = root.join(CONFIG_JSON);
        if !config_path.is_file() {
            bail!("The config file is missing '{}'", config_path.display())
        }
        let config_file = ConfigFile::load(&config_path).await?;

        let config = Self {
            secrets: root.join(SECRETS),
            root,
            config_path,
            config_file,
        };
        if !config.secrets.is_dir() {
            bail!(
                "The secrets directory is missing '{}'",
                config.secrets.display()
            )
        }
        Ok(config)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn secrets(&self) -> &Path {
        &self.secrets
    }

    pub fn base_url(&self) -> &str {
        &self.config_file.base_url
    }

    /// The session file, resolved against the home directory when it is relative.
    pub fn session_path(&self) -> PathBuf {
        let p = self.config_file.session_path();
        if p.is_absolute() {
            return p;
        }
        self.root.join(p)
    }

    /// How many entries the top-N report shows.
    pub fn top_n(&self) -> usize {
        self.config_file.top_n
    }

    /// The configured keyword table, or the built-in one.
    pub fn keyword_table(&self) -> KeywordTable {
        match &self.config_file.categories {
            Some(categories) => KeywordTable::new(categories.clone()),
            None => KeywordTable::default(),
        }
    }
}

/// Represents the serialization and deserialization format of the configuration file.
///
/// Example configuration:
/// ```json
/// {
///   "app_name": "finanzas",
///   "config_version": 1,
///   "base_url": "https://finanzas.example.com",
///   "session_path": ".secrets/session.json",
///   "top_n": 5,
///   "categories": [{ "name": "Mascotas", "keywords": ["pienso", "veterinario"] }]
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct ConfigFile {
    /// Application name, should always be "finanzas"
    app_name: String,

    config_version: u8,

    /// The origin of the finance API, e.g. `https://finanzas.example.com`
    base_url: String,

    /// Relative to the home directory, or absolute.
    /// Defaults to $FINANZAS_HOME/.secrets/session.json if not specified
    #[serde(default, skip_serializing_if = "Option::is_none")]
    session_path: Option<PathBuf>,

    #[serde(default = "default_top_n")]
    top_n: usize,

    /// Replaces the built-in keyword categories when present. Order is priority.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    categories: Option<Vec<Category>>,
}

fn default_top_n() -> usize {
    TOP_N
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            base_url: String::new(),
            session_path: None,
            top_n: TOP_N,
            categories: None,
        }
    }
}

impl ConfigFile {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = utils::read(path)
            .await
            .with_context(|| format!("Failed to read config file at {}", path.display()))?;

        let config: ConfigFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file at {}", path.display()))?;

        anyhow::ensure!(
            config.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            config.app_name
        );
        crate::api::parse_base_url(&config.base_url)
            .with_context(|| format!("Invalid base_url in config file at {}", path.display()))?;

        Ok(config)
    }

    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let p = path.as_ref();
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        utils::write(p, data)
            .await
            .context("Unable to write config file")
    }

    pub fn session_path(&self) -> PathBuf {
        self.session_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(SECRETS).join(SESSION_JSON))
    }
}
