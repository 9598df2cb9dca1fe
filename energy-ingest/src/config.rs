use serde::Deserialize;
use std::{fs, io, path::Path};

use crate::batch::{BatchOptions, DEFAULT_FALLBACK_METER_ID};
use crate::sinks::OutputFormat;
use crate::sources::sdat::{DEFAULT_RESOLUTION_MINUTES, STROM_NAMESPACE};

pub const CONFIG_ENV: &str = "ENERGY_INGEST_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "energy-ingest.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind_addr: String,
    pub max_body_bytes: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            max_body_bytes: 32 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SdatConfig {
    pub namespace: String,
    pub default_resolution_minutes: i64,
}

impl Default for SdatConfig {
    fn default() -> Self {
        Self {
            namespace: STROM_NAMESPACE.to_string(),
            default_resolution_minutes: DEFAULT_RESOLUTION_MINUTES,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub fallback_meter_id: String,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            fallback_meter_id: DEFAULT_FALLBACK_METER_ID.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub sdat: SdatConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub output: OutputConfig,
    pub metrics: Option<MetricsConfig>,
}

impl AppConfig {
    /// Load from `$ENERGY_INGEST_CONFIG`, or `energy-ingest.toml` in the
    /// working directory. Only the implicit default path may be absent, in
    /// which case built-in defaults apply.
    pub fn load() -> anyhow::Result<Self> {
        use std::env;

        match env::var(CONFIG_ENV) {
            Ok(path) => Self::from_path(&path),
            Err(_) => match Self::from_path(DEFAULT_CONFIG_PATH) {
                Err(e) if is_not_found(&e) => {
                    tracing::info!(path = DEFAULT_CONFIG_PATH, "no config file, using defaults");
                    Ok(Self::default())
                }
                other => other,
            },
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path.as_ref())?;
        Ok(Self::from_toml(&contents)?)
    }

    pub fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    pub fn batch_options(&self) -> BatchOptions {
        BatchOptions {
            namespace: self.sdat.namespace.clone(),
            default_resolution_minutes: self.sdat.default_resolution_minutes,
            fallback_meter_id: self.batch.fallback_meter_id.clone(),
        }
    }
}

fn is_not_found(e: &anyhow::Error) -> bool {
    e.downcast_ref::<io::Error>()
        .is_some_and(|io| io.kind() == io::ErrorKind::NotFound)
}
