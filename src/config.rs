use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use validator::{Validate, ValidationError};

use crate::domain::{VoltageBand, COMPLIANCE_STANDARD, DEFAULT_PROCESSED_BY, VOLTAGE_MAX_PU, VOLTAGE_MIN_PU};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub solver: SolverConfig,
    pub results: ResultsConfig,
    pub compliance: ComplianceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
}
impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}
impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".into(), port: 8080, request_timeout_secs: 900 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Http,
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// S3-compatible endpoint for the `http` backend
    pub endpoint: String,
    /// Directory holding `{bucket}/{key}` for the `local` backend
    pub local_root: PathBuf,
    /// Parent of per-invocation scratch directories; OS temp dir when unset
    pub scratch_root: Option<PathBuf>,
}
impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Http,
            endpoint: "http://127.0.0.1:9000".into(),
            local_root: PathBuf::from("objects"),
            scratch_root: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub command: String,
    pub args: Vec<String>,
}
impl Default for SolverConfig {
    fn default() -> Self {
        Self { command: "gridcheck-loadflow".into(), args: Vec::new() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultsBackend {
    Memory,
    File,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResultsConfig {
    pub backend: ResultsBackend,
    pub table: String,
    /// Table document for the `file` backend
    pub path: PathBuf,
    /// Connection string for the `postgres` backend
    pub url: String,
}
impl Default for ResultsConfig {
    fn default() -> Self {
        Self {
            backend: ResultsBackend::File,
            table: "GridComplianceResults".into(),
            path: PathBuf::from("data/compliance_results.json"),
            url: "postgres://localhost/gridcheck".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
#[validate(schema(function = "validate_band"))]
pub struct ComplianceConfig {
    #[validate(range(min = 0.0, max = 2.0))]
    pub voltage_min_pu: f64,
    #[validate(range(min = 0.0, max = 2.0))]
    pub voltage_max_pu: f64,
    #[validate(length(min = 1))]
    pub standard: String,
    #[validate(length(min = 1))]
    pub processed_by: String,
}
impl ComplianceConfig {
    pub fn band(&self) -> VoltageBand {
        VoltageBand { min_pu: self.voltage_min_pu, max_pu: self.voltage_max_pu }
    }
}
impl Default for ComplianceConfig {
    fn default() -> Self {
        Self {
            voltage_min_pu: VOLTAGE_MIN_PU,
            voltage_max_pu: VOLTAGE_MAX_PU,
            standard: COMPLIANCE_STANDARD.into(),
            processed_by: DEFAULT_PROCESSED_BY.into(),
        }
    }
}

fn validate_band(cfg: &ComplianceConfig) -> Result<(), ValidationError> {
    if cfg.voltage_min_pu < cfg.voltage_max_pu {
        Ok(())
    } else {
        Err(ValidationError::new("voltage_min_pu must be below voltage_max_pu"))
    }
}

impl Config {
    /// Built-in defaults, then `config/default.toml`, then `GRIDCHECK__SECTION__KEY` variables.
    pub fn load() -> Result<Self> {
        Self::from_figment(
            Figment::from(Serialized::defaults(Config::default()))
                .merge(Toml::file("config/default.toml"))
                .merge(Env::prefixed("GRIDCHECK__").split("__")),
        )
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let cfg: Config = figment.extract()?;
        cfg.compliance.validate()?;
        Ok(cfg)
    }
}
