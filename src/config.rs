//! File-based configuration for the CLI.
//!
//! Stored as a JSON object on disk:
//! ```json
//! {
//!   "datasets": {
//!     "bus":   { "ridership": "data/bus_ridership.csv",   "metadata": "data/bus_routes.csv" },
//!     "train": { "ridership": "data/train_ridership.csv", "metadata": "data/train_stations.csv" }
//!   },
//!   "earliest_month": "2001-01",
//!   "freshness_url": "https://api.github.com/gists/<id>"
//! }
//! ```
//! Every field is optional; command-line flags take precedence.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::assign::TransitMode;
use crate::dataset::EARLIEST_MONTH;
use crate::period::YearMonth;

/// Environment variable naming the config file when `--config` is absent.
pub const CONFIG_ENV: &str = "RIDERSHIP_CONFIG";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DatasetPaths {
    pub ridership: PathBuf,
    pub metadata: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    datasets: HashMap<TransitMode, DatasetPaths>,
    earliest_month: Option<YearMonth>,
    freshness_url: Option<String>,
}

impl AppConfig {
    /// Loads the config from a JSON file at `path`.
    pub fn load(path: &str) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("reading config {path}"))?;
        Self::from_json(&content).with_context(|| format!("parsing config {path}"))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Loads `path`, or the file named by [`CONFIG_ENV`], or falls back to
    /// an empty config.
    pub fn discover(path: Option<&str>) -> Result<Self> {
        match path.map(str::to_string).or_else(|| std::env::var(CONFIG_ENV).ok()) {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn datasets(&self, mode: TransitMode) -> Option<&DatasetPaths> {
        self.datasets.get(&mode)
    }

    pub fn earliest_month(&self) -> YearMonth {
        self.earliest_month.unwrap_or(EARLIEST_MONTH)
    }

    pub fn freshness_url(&self) -> Option<&str> {
        self.freshness_url.as_deref()
    }
}
