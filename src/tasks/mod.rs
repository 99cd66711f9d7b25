//! Pipeline tasks
//!
//! Top-level jobs run once per prediction job. All database and pipeline
//! dependencies are resolved here and injected through traits, so the tasks
//! themselves only decide *whether* and *with what* to run.

use std::collections::BTreeMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::table::DataTable;

pub mod components_forecast;
pub mod train_model;

pub use components_forecast::*;
pub use train_model::*;

/// A forecast configuration for one location / measurement series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionJob {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub lat: f64,
    pub lon: f64,
    pub model: String,
    #[serde(default = "default_train_components")]
    pub train_components: bool,
    #[serde(default)]
    pub horizons: Option<Vec<f64>>,
    #[serde(default)]
    pub feature_names: Option<Vec<String>>,
}

fn default_train_components() -> bool {
    true
}

impl PredictionJob {
    pub fn location(&self) -> (f64, f64) {
        (self.lat, self.lon)
    }
}

/// Hyperparameter values stored per prediction job; unset fields keep the
/// task defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HyperParamOverrides {
    pub training_period_days: Option<u32>,
    pub featureset_name: Option<String>,
}

/// Coefficients splitting a load forecast into demand, wind and PV components
pub type SplitCoefficients = BTreeMap<String, f64>;

/// Persistence used by the tasks
#[cfg_attr(test, mockall::automock)]
pub trait ForecastDatabase {
    fn get_predicted_load(&self, pj: &PredictionJob, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<DataTable>;

    fn get_weather_data(
        &self,
        location: (f64, f64),
        variables: &[String],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<DataTable>;

    fn get_energy_split_coefs(&self, pj: &PredictionJob) -> Result<SplitCoefficients>;

    fn write_forecast(&self, forecast: &DataTable) -> Result<()>;

    fn get_hyper_params(&self, pj: &PredictionJob) -> Result<HyperParamOverrides>;

    fn get_featureset(&self, name: &str) -> Result<Vec<String>>;

    fn get_model_input(&self, pj: &PredictionJob, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<DataTable>;
}

/// Everything a task needs besides the prediction job itself
pub struct TaskContext<D> {
    pub name: String,
    pub config: Config,
    pub database: D,
}

impl<D: ForecastDatabase> TaskContext<D> {
    pub fn new(name: impl Into<String>, config: Config, database: D) -> Self {
        Self {
            name: name.into(),
            config,
            database,
        }
    }
}

/// Why a task stopped without running its pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    ComponentsDisabled,
    NoPredictedLoad,
    NoSplitCoefficients,
    ModelRecent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed,
    Skipped(SkipReason),
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prediction_job_defaults() {
        let pj: PredictionJob = serde_json::from_str(
            r#"{"id": 1, "name": "a", "lat": 52.0, "lon": 5.0, "model": "xgb"}"#,
        )
        .unwrap();
        assert!(pj.train_components);
        assert!(pj.horizons.is_none());
        assert_eq!(pj.location(), (52.0, 5.0));
    }
}
