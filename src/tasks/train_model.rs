//! Model training task
//!
//! Retrains the model of a prediction job on recent history:
//!   1. resolve hyperparameters and the feature set,
//!   2. skip when the stored model is still young enough (unless
//!      `tasks.check_old_model_age` is off),
//!   3. fetch the training input and build per-horizon training features,
//!   4. hand the features to the trainer.

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{ForecastDatabase, HyperParamOverrides, PredictionJob, SkipReason, TaskContext, TaskOutcome};
use crate::config::TasksConfig;
use crate::features::{ApplicatorConfig, DefaultFeatureComputer, FeatureApplicator, TrainFeatureApplicator};
use crate::table::DataTable;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HyperParams {
    pub training_period_days: u32,
    pub featureset_name: String,
}

impl HyperParams {
    pub fn defaults(settings: &TasksConfig) -> Self {
        Self {
            training_period_days: settings.training_period_days,
            featureset_name: settings.featureset_name.clone(),
        }
    }

    pub fn apply(mut self, overrides: HyperParamOverrides) -> Self {
        if let Some(days) = overrides.training_period_days {
            self.training_period_days = days;
        }
        if let Some(name) = overrides.featureset_name {
            self.featureset_name = name;
        }
        self
    }
}

/// Model storage and fitting
#[cfg_attr(test, mockall::automock)]
pub trait ModelTrainer {
    /// Age in days of the stored model, `None` if there is none yet
    fn model_age_days(&self, pj: &PredictionJob) -> Result<Option<f64>>;

    fn train(&self, pj: &PredictionJob, features: &DataTable) -> Result<()>;
}

pub fn train_model_task<D, T>(
    pj: &PredictionJob,
    context: &TaskContext<D>,
    trainer: &T,
) -> Result<TaskOutcome>
where
    D: ForecastDatabase,
    T: ModelTrainer + ?Sized,
{
    let settings = &context.config.tasks;
    let overrides = context
        .database
        .get_hyper_params(pj)
        .context("Failed to retrieve hyperparameters")?;
    let hyper_params = HyperParams::defaults(settings).apply(overrides);
    let feature_names = context
        .database
        .get_featureset(&hyper_params.featureset_name)
        .with_context(|| format!("Failed to retrieve featureset {}", hyper_params.featureset_name))?;

    // Checked before retrieving any input data
    if settings.check_old_model_age {
        if let Some(age) = trainer.model_age_days(pj)? {
            debug!(pid = pj.id, age_days = age, "Old model age");
            if age < settings.maximum_model_age_days {
                info!(
                    pid = pj.id,
                    age_days = age,
                    maximum_age_days = settings.maximum_model_age_days,
                    "Old model was new enough, skipping"
                );
                return Ok(TaskOutcome::Skipped(SkipReason::ModelRecent));
            }
        }
    }

    let end = Utc::now();
    let start = end - Duration::days(i64::from(hyper_params.training_period_days));
    let input = context
        .database
        .get_model_input(pj, start, end)
        .context("Failed to retrieve model input")?;
    debug!(pid = pj.id, rows = input.len(), "Retrieved timeseries input");

    let feature_names = (!feature_names.is_empty()).then_some(feature_names);
    let config = ApplicatorConfig::new(pj.horizons.clone(), feature_names)?;
    let computer = DefaultFeatureComputer::new(context.config.features.load_column.as_str(), pj.lat);
    let applicator =
        TrainFeatureApplicator::new(config, computer).with_latency(context.config.features.latency.clone());

    let features = applicator.add_features(&input)?;
    info!(
        pid = pj.id,
        rows = features.len(),
        horizons = ?applicator.effective_horizons(),
        "Built training features"
    );

    trainer.train(pj, &features).context("Model training failed")?;
    info!(pid = pj.id, "Model trained");

    Ok(TaskOutcome::Completed)
}
