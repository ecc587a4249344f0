#![forbid(unsafe_code)]

use clap::Parser;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;
use vt_core::schedule::DAY_MS;
use vt_core::status::StatusPolicy;
use vt_storage::StorePolicy;

const HOUR_MS: i64 = 3_600_000;
const MINUTE_MS: i64 = 60_000;

const DEFAULT_STORAGE_DIR: &str = ".vaxtrack";

/// Command line. Every flag also reads a `VAXTRACK_*` variable; a YAML file passed with
/// `--config` fills whatever neither sets.
#[derive(Debug, Default, Parser)]
#[command(name = "vaxtrack", version, about = "Vaccination tracking API server")]
pub struct Cli {
    #[arg(long, env = "VAXTRACK_CONFIG")]
    pub config: Option<PathBuf>,
    #[arg(long, env = "VAXTRACK_BIND")]
    pub bind: Option<SocketAddr>,
    #[arg(long, env = "VAXTRACK_STORAGE_DIR")]
    pub storage_dir: Option<PathBuf>,
    #[arg(long, env = "VAXTRACK_SWEEP_INTERVAL_SECS")]
    pub sweep_interval_secs: Option<u64>,
    #[arg(long, env = "VAXTRACK_RELAY_INTERVAL_MS")]
    pub relay_interval_ms: Option<u64>,
    #[arg(long, env = "VAXTRACK_DUE_NOW_WINDOW_HOURS")]
    pub due_now_window_hours: Option<i64>,
    #[arg(long, env = "VAXTRACK_MISSED_GRACE_MINUTES")]
    pub missed_grace_minutes: Option<i64>,
    #[arg(long, env = "VAXTRACK_SESSION_TTL_HOURS")]
    pub session_ttl_hours: Option<i64>,
    #[arg(long, env = "VAXTRACK_GUARDIAN_SESSION_TTL_HOURS")]
    pub guardian_session_ttl_hours: Option<i64>,
    #[arg(long, env = "VAXTRACK_STOCK_EXPIRY_WARNING_DAYS")]
    pub stock_expiry_warning_days: Option<i64>,
    #[arg(long, env = "VAXTRACK_DEFAULT_STOCK_ALERT_THRESHOLD")]
    pub default_stock_alert_threshold: Option<i64>,
    #[arg(long = "cors-origin", env = "VAXTRACK_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Vec<String>,
    #[arg(long, env = "VAXTRACK_BOOTSTRAP_ADMIN_EMAIL")]
    pub bootstrap_admin_email: Option<String>,
    #[arg(long, env = "VAXTRACK_BOOTSTRAP_ADMIN_PASSWORD", hide_env_values = true)]
    pub bootstrap_admin_password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    bind: Option<SocketAddr>,
    storage_dir: Option<PathBuf>,
    sweep_interval_secs: Option<u64>,
    relay_interval_ms: Option<u64>,
    due_now_window_hours: Option<i64>,
    missed_grace_minutes: Option<i64>,
    session_ttl_hours: Option<i64>,
    guardian_session_ttl_hours: Option<i64>,
    stock_expiry_warning_days: Option<i64>,
    default_stock_alert_threshold: Option<i64>,
    #[serde(default)]
    cors_origins: Vec<String>,
    bootstrap_admin_email: Option<String>,
    bootstrap_admin_password: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("{0}")]
    Invalid(&'static str),
}

#[derive(Clone, Debug)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub bind: SocketAddr,
    pub storage_dir: PathBuf,
    pub sweep_interval_secs: u64,
    pub relay_interval_ms: u64,
    pub due_now_window_hours: i64,
    pub missed_grace_minutes: i64,
    pub session_ttl_hours: i64,
    pub guardian_session_ttl_hours: i64,
    pub stock_expiry_warning_days: i64,
    pub default_stock_alert_threshold: i64,
    pub cors_origins: Vec<String>,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8080)),
            storage_dir: PathBuf::from(DEFAULT_STORAGE_DIR),
            sweep_interval_secs: 60,
            relay_interval_ms: 500,
            due_now_window_hours: 24,
            missed_grace_minutes: 0,
            session_ttl_hours: 12,
            guardian_session_ttl_hours: 720,
            stock_expiry_warning_days: 30,
            default_stock_alert_threshold: 10,
            cors_origins: Vec::new(),
            bootstrap_admin: None,
        }
    }
}

impl Config {
    pub fn load(cli: Cli) -> Result<Self, ConfigError> {
        let file = match cli.config.as_deref() {
            Some(path) => read_file_config(path)?,
            None => FileConfig::default(),
        };
        Self::merge(cli, file)
    }

    fn merge(cli: Cli, file: FileConfig) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let email = cli.bootstrap_admin_email.or(file.bootstrap_admin_email);
        let password = cli.bootstrap_admin_password.or(file.bootstrap_admin_password);
        let bootstrap_admin = match (email, password) {
            (Some(email), Some(password)) => Some(BootstrapAdmin { email, password }),
            (None, None) => None,
            _ => {
                return Err(ConfigError::Invalid(
                    "bootstrap admin needs both an email and a password",
                ));
            }
        };

        let config = Self {
            bind: cli.bind.or(file.bind).unwrap_or(defaults.bind),
            storage_dir: cli
                .storage_dir
                .or(file.storage_dir)
                .unwrap_or(defaults.storage_dir),
            sweep_interval_secs: cli
                .sweep_interval_secs
                .or(file.sweep_interval_secs)
                .unwrap_or(defaults.sweep_interval_secs),
            relay_interval_ms: cli
                .relay_interval_ms
                .or(file.relay_interval_ms)
                .unwrap_or(defaults.relay_interval_ms),
            due_now_window_hours: cli
                .due_now_window_hours
                .or(file.due_now_window_hours)
                .unwrap_or(defaults.due_now_window_hours),
            missed_grace_minutes: cli
                .missed_grace_minutes
                .or(file.missed_grace_minutes)
                .unwrap_or(defaults.missed_grace_minutes),
            session_ttl_hours: cli
                .session_ttl_hours
                .or(file.session_ttl_hours)
                .unwrap_or(defaults.session_ttl_hours),
            guardian_session_ttl_hours: cli
                .guardian_session_ttl_hours
                .or(file.guardian_session_ttl_hours)
                .unwrap_or(defaults.guardian_session_ttl_hours),
            stock_expiry_warning_days: cli
                .stock_expiry_warning_days
                .or(file.stock_expiry_warning_days)
                .unwrap_or(defaults.stock_expiry_warning_days),
            default_stock_alert_threshold: cli
                .default_stock_alert_threshold
                .or(file.default_stock_alert_threshold)
                .unwrap_or(defaults.default_stock_alert_threshold),
            cors_origins: if cli.cors_origins.is_empty() {
                file.cors_origins
            } else {
                cli.cors_origins
            },
            bootstrap_admin,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid("sweep_interval_secs must be positive"));
        }
        if self.relay_interval_ms == 0 {
            return Err(ConfigError::Invalid("relay_interval_ms must be positive"));
        }
        if self.due_now_window_hours < 0 || self.missed_grace_minutes < 0 {
            return Err(ConfigError::Invalid("status windows must not be negative"));
        }
        if self.session_ttl_hours <= 0 || self.guardian_session_ttl_hours <= 0 {
            return Err(ConfigError::Invalid("session lifetimes must be positive"));
        }
        if self.stock_expiry_warning_days < 0 || self.default_stock_alert_threshold < 0 {
            return Err(ConfigError::Invalid("stock settings must not be negative"));
        }
        Ok(())
    }

    pub fn store_policy(&self) -> StorePolicy {
        StorePolicy {
            status: StatusPolicy {
                due_now_window_ms: self.due_now_window_hours.saturating_mul(HOUR_MS),
                missed_grace_ms: self.missed_grace_minutes.saturating_mul(MINUTE_MS),
            },
            stock_expiry_warning_ms: self.stock_expiry_warning_days.saturating_mul(DAY_MS),
            default_stock_alert_threshold: self.default_stock_alert_threshold,
        }
    }

    pub fn session_ttl_ms(&self) -> i64 {
        self.session_ttl_hours.saturating_mul(HOUR_MS)
    }

    pub fn guardian_session_ttl_ms(&self) -> i64 {
        self.guardian_session_ttl_hours.saturating_mul(HOUR_MS)
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
