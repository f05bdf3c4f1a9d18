use crate::metric::{MetricDefinition, MetricKind, Value};
use crate::store::{LOG_DATE, LOG_TIME};
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

/// Tracker declaration loaded from a TOML file.
///
/// The tracker name is an explicit key; when absent it falls back to the
/// config file's stem, so `mood.toml` tracks as "mood" without further
/// ceremony.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub tracker: Option<String>,
    pub data_dir: PathBuf,
    /// Prompt attempts per metric before giving up. 0 = retry forever.
    pub max_attempts: u32,
    #[serde(rename = "metric")]
    pub metrics: Vec<MetricConfig>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            tracker: None,
            data_dir: PathBuf::from("data"),
            max_attempts: 0,
            metrics: Vec::new(),
        }
    }
}

/// One `[[metric]]` entry.
#[derive(Debug, Deserialize)]
pub struct MetricConfig {
    pub name: String,
    #[serde(default = "default_kind")]
    pub kind: MetricKind,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub default: Option<toml::Value>,
}

fn default_kind() -> MetricKind {
    MetricKind::Text
}

impl TrackerConfig {
    /// Load and validate a tracker declaration.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut config: TrackerConfig =
            toml::from_str(&text).map_err(|e| ConfigError::Toml {
                path: path.to_path_buf(),
                source: e,
            })?;

        if config.tracker.is_none() {
            config.tracker = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned());
        }
        if config.metrics.is_empty() {
            return Err(ConfigError::NoMetrics {
                path: path.to_path_buf(),
            });
        }
        // Metric names become store columns; a clash with the log columns or
        // with another metric would silently drop a collected value.
        let mut seen = HashSet::new();
        for metric in &config.metrics {
            if metric.name == LOG_DATE || metric.name == LOG_TIME {
                return Err(ConfigError::ReservedName {
                    metric: metric.name.clone(),
                });
            }
            if !seen.insert(metric.name.as_str()) {
                return Err(ConfigError::DuplicateName {
                    metric: metric.name.clone(),
                });
            }
        }
        Ok(config)
    }

    /// Resolved tracker name.
    pub fn tracker_name(&self) -> &str {
        self.tracker.as_deref().unwrap_or("tracker")
    }
}

impl MetricConfig {
    /// Build the runtime definition, converting the TOML default into a
    /// value of the declared kind.
    pub fn to_definition(&self) -> Result<MetricDefinition, ConfigError> {
        let prompt = self
            .prompt
            .clone()
            .unwrap_or_else(|| "Enter {metric}: ".to_string());
        let mut definition = MetricDefinition::new(&self.name, self.kind, &prompt);
        if let Some(raw) = &self.default {
            let value =
                convert_default(self.kind, raw).ok_or_else(|| ConfigError::DefaultKind {
                    metric: self.name.clone(),
                    kind: self.kind,
                    found: raw.clone(),
                })?;
            definition = definition.with_default(value);
        }
        Ok(definition)
    }
}

fn convert_default(kind: MetricKind, raw: &toml::Value) -> Option<Value> {
    match (kind, raw) {
        (MetricKind::Integer, toml::Value::Integer(v)) => Some(Value::Int(*v)),
        (MetricKind::Float, toml::Value::Float(v)) => Some(Value::Float(*v)),
        // Whole-number float defaults may be written without a decimal point.
        (MetricKind::Float, toml::Value::Integer(v)) => Some(Value::Float(*v as f64)),
        (MetricKind::Text, toml::Value::String(v)) => Some(Value::Text(v.clone())),
        _ => None,
    }
}

/// Errors from loading a tracker declaration.
#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },
    NoMetrics {
        path: PathBuf,
    },
    ReservedName {
        metric: String,
    },
    DuplicateName {
        metric: String,
    },
    DefaultKind {
        metric: String,
        kind: MetricKind,
        found: toml::Value,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "failed to read config {}: {source}", path.display())
            }
            ConfigError::Toml { path, source } => {
                write!(f, "invalid config {}: {source}", path.display())
            }
            ConfigError::NoMetrics { path } => {
                write!(f, "config {} declares no metrics", path.display())
            }
            ConfigError::ReservedName { metric } => {
                write!(
                    f,
                    "metric name '{metric}' collides with a log column ('{LOG_DATE}', '{LOG_TIME}' are reserved)"
                )
            }
            ConfigError::DuplicateName { metric } => {
                write!(f, "metric '{metric}' is declared more than once")
            }
            ConfigError::DefaultKind {
                metric,
                kind,
                found,
            } => {
                write!(
                    f,
                    "metric '{metric}' declares kind {kind} but its default is {found}"
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Toml { source, .. } => Some(source),
            ConfigError::NoMetrics { .. }
            | ConfigError::ReservedName { .. }
            | ConfigError::DuplicateName { .. }
            | ConfigError::DefaultKind { .. } => None,
        }
    }
}
