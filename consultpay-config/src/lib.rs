//! Layered configuration for the Consultpay binaries.
//!
//! Sources, later ones winning: built-in defaults, `config/default.toml`,
//! `config/{env}.toml`, an explicit `--config` file, then `CONSULTPAY__*`
//! environment variables (`CONSULTPAY__DATABASE__PATH=/tmp/ledger.db`).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File, FileFormat};
use consultpay_core::{AccountId, Percent};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const ENV_PREFIX: &str = "CONSULTPAY";
pub const DEFAULT_CONFIG_DIR: &str = "config";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub platform: PlatformConfig,
    pub commission: CommissionConfig,
    pub notifications: NotificationConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/consultpay.db"),
            busy_timeout_ms: 5_000,
        }
    }
}

impl DatabaseConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    /// Account that receives commission rows.
    pub account_id: i64,
    /// Display only. All amounts share one currency.
    pub currency: String,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            account_id: 0,
            currency: "INR".into(),
        }
    }
}

impl PlatformConfig {
    pub fn account(&self) -> AccountId {
        AccountId::new(self.account_id)
    }
}

/// Seed values written to the global settings row when none exist yet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommissionConfig {
    pub default_consultant_pct: Decimal,
    pub default_user_pct: Decimal,
}

impl Default for CommissionConfig {
    fn default() -> Self {
        Self {
            default_consultant_pct: Decimal::from(15),
            default_user_pct: Decimal::from(10),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub enabled: bool,
    /// Mail relay endpoint. Empty means notifications are only logged.
    pub webhook_url: String,
    pub timeout_ms: u64,
    /// How long the CLI waits for queued notifications before exiting.
    pub drain_timeout_ms: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            webhook_url: String::new(),
            timeout_ms: 3_000,
            drain_timeout_ms: 5_000,
        }
    }
}

impl NotificationConfig {
    pub fn webhook(&self) -> Option<&str> {
        let url = self.webhook_url.trim();
        (!url.is_empty()).then_some(url)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
    pub json: bool,
    /// Directory for daily rolling log files. Empty logs to stderr only.
    pub directory: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            directory: String::new(),
        }
    }
}

impl LoggingConfig {
    pub fn directory(&self) -> Option<PathBuf> {
        let dir = self.directory.trim();
        (!dir.is_empty()).then(|| PathBuf::from(dir))
    }
}

impl AppConfig {
    /// Load configuration for `env` from the working directory's `config/` folder.
    pub fn load(env: &str, explicit: Option<&Path>) -> Result<Self> {
        ConfigLoader::new(DEFAULT_CONFIG_DIR, env)
            .with_file(explicit)
            .load()
    }

    /// Reject values that would only fail later, deep inside a write path.
    pub fn validate(&self) -> Result<()> {
        Percent::new(self.commission.default_consultant_pct).with_context(|| {
            format!(
                "commission.default_consultant_pct = {}",
                self.commission.default_consultant_pct
            )
        })?;
        Percent::new(self.commission.default_user_pct).with_context(|| {
            format!(
                "commission.default_user_pct = {}",
                self.commission.default_user_pct
            )
        })?;
        if self.platform.account_id < 0 {
            bail!("platform.account_id must not be negative");
        }
        if self.database.path.as_os_str().is_empty() {
            bail!("database.path must not be empty");
        }
        if self.database.busy_timeout_ms == 0 {
            bail!("database.busy_timeout_ms must be positive");
        }
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to render configuration")
    }
}

/// Builder over the layered sources. `AppConfig::load` covers the usual case.
#[derive(Clone, Debug)]
pub struct ConfigLoader {
    dir: PathBuf,
    env: String,
    explicit: Option<PathBuf>,
    vars: Option<HashMap<String, String>>,
}

impl ConfigLoader {
    pub fn new(dir: impl Into<PathBuf>, env: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            env: env.into(),
            explicit: None,
            vars: None,
        }
    }

    pub fn with_file(mut self, path: Option<&Path>) -> Self {
        self.explicit = path.map(Path::to_path_buf);
        self
    }

    /// Read overrides from this map instead of the process environment.
    pub fn with_vars(mut self, vars: HashMap<String, String>) -> Self {
        self.vars = Some(vars);
        self
    }

    pub fn load(self) -> Result<AppConfig> {
        let mut builder = Config::builder()
            .add_source(
                File::from(self.dir.join("default.toml"))
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                File::from(self.dir.join(format!("{}.toml", self.env)))
                    .format(FileFormat::Toml)
                    .required(false),
            );
        if let Some(path) = &self.explicit {
            builder = builder.add_source(
                File::from(path.as_path())
                    .format(FileFormat::Toml)
                    .required(true),
            );
        }
        let settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .source(self.vars),
            )
            .build()
            .context("failed to read configuration sources")?;
        let config: AppConfig = settings
            .try_deserialize()
            .context("configuration has invalid values")?;
        config.validate()?;
        Ok(config)
    }
}
