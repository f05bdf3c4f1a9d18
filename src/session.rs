/// One tracking run: print the title, capture the timestamp, collect a value
/// per metric in order, and append the merged row to the tracker's store.
use crate::config::{ConfigError, TrackerConfig};
use crate::metric::{CollectError, MetricDefinition};
use crate::naming;
use crate::prompt::LineSource;
use crate::store::{Store, StoreError, LOG_DATE, LOG_TIME};
use chrono::Local;
use std::fmt;
use std::path::PathBuf;

pub struct TrackerSession {
    tracker: String,
    store: Store,
    metrics: Vec<MetricDefinition>,
    max_attempts: Option<u32>,
}

impl TrackerSession {
    /// Build a session directly from parts.
    pub fn new(
        tracker: &str,
        data_dir: impl Into<PathBuf>,
        metrics: Vec<MetricDefinition>,
        max_attempts: Option<u32>,
    ) -> Self {
        Self {
            tracker: tracker.to_string(),
            store: Store::new(data_dir, tracker),
            metrics,
            max_attempts,
        }
    }

    /// Build a session from a loaded tracker declaration.
    pub fn from_config(config: &TrackerConfig) -> Result<Self, ConfigError> {
        let metrics = config
            .metrics
            .iter()
            .map(|m| m.to_definition())
            .collect::<Result<Vec<_>, _>>()?;
        let max_attempts = match config.max_attempts {
            0 => None,
            n => Some(n),
        };
        Ok(Self::new(
            config.tracker_name(),
            config.data_dir.clone(),
            metrics,
            max_attempts,
        ))
    }

    pub fn tracker(&self) -> &str {
        &self.tracker
    }

    pub fn metrics(&self) -> &[MetricDefinition] {
        &self.metrics
    }

    pub fn store_path(&self) -> PathBuf {
        self.store.path()
    }

    /// Run the full collect-and-persist flow.
    ///
    /// The timestamp is captured once, before any prompting, so slow answers
    /// don't smear the log columns across metrics.
    pub fn run(&self, source: &mut dyn LineSource, quiet: bool) -> Result<(), SessionError> {
        if !quiet {
            println!("{}\n", naming::tracker_title(&self.tracker));
        }

        let now = Local::now();
        let mut row: Vec<(String, String)> = vec![
            (LOG_DATE.to_string(), now.format("%Y-%m-%d").to_string()),
            (LOG_TIME.to_string(), now.format("%H:%M:%S").to_string()),
        ];

        for metric in &self.metrics {
            let value = metric
                .collect(source, self.max_attempts)
                .map_err(SessionError::Collect)?;
            row.push((metric.name().to_string(), value.to_string()));
        }

        let table = self.store.append_row(&row).map_err(SessionError::Store)?;
        tracing::info!(
            tracker = %self.tracker,
            rows = table.rows().len(),
            path = %self.store.path().display(),
            "entry recorded"
        );
        Ok(())
    }
}

/// Errors that abort a tracking run.
#[derive(Debug)]
pub enum SessionError {
    Collect(CollectError),
    Store(StoreError),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Collect(e) => write!(f, "collection failed: {e}"),
            SessionError::Store(e) => write!(f, "persistence failed: {e}"),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Collect(e) => Some(e),
            SessionError::Store(e) => Some(e),
        }
    }
}
