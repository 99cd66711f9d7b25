//! Components forecast task
//!
//! Splits the most recent load forecast of a prediction job into demand,
//! wind and PV components and stores the result. Requires a regular load
//! forecast and stored split coefficients.

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use tracing::{debug, info, warn};

use super::{
    ForecastDatabase, PredictionJob, SkipReason, SplitCoefficients, TaskContext, TaskOutcome,
};
use crate::table::DataTable;

/// Weather variables used to derive the split coefficients; the component
/// forecast must use the same ones
pub const COMPONENT_WEATHER_VARIABLES: [&str; 2] = ["radiation", "windspeed_100m"];

/// Turns a load forecast into a per-component forecast
#[cfg_attr(test, mockall::automock)]
pub trait ComponentsForecastPipeline {
    fn create_components_forecast(
        &self,
        pj: &PredictionJob,
        input: &DataTable,
        weather: &DataTable,
        coefs: &SplitCoefficients,
    ) -> Result<DataTable>;
}

pub fn create_components_forecast_task<D, P>(
    pj: &PredictionJob,
    context: &TaskContext<D>,
    pipeline: &P,
) -> Result<TaskOutcome>
where
    D: ForecastDatabase,
    P: ComponentsForecastPipeline + ?Sized,
{
    if !pj.train_components {
        info!(pid = pj.id, train_components = false, "Skip prediction job");
        return Ok(TaskOutcome::Skipped(SkipReason::ComponentsDisabled));
    }

    let now = Utc::now();
    let start = now - Duration::days(context.config.tasks.t_behind_days);
    let end = now + Duration::days(context.config.tasks.t_ahead_days);

    info!(pid = pj.id, %start, %end, "Get predicted load");
    let input = context
        .database
        .get_predicted_load(pj, start, end)
        .context("Failed to retrieve predicted load")?;
    if input.is_empty() {
        warn!(pid = pj.id, "No forecast found, skipping");
        return Ok(TaskOutcome::Skipped(SkipReason::NoPredictedLoad));
    }

    let variables: Vec<String> = COMPONENT_WEATHER_VARIABLES
        .iter()
        .map(|v| v.to_string())
        .collect();
    let weather = context
        .database
        .get_weather_data(pj.location(), &variables, start, end)
        .context("Failed to retrieve weather data")?;

    let coefs = context
        .database
        .get_energy_split_coefs(pj)
        .context("Failed to retrieve energy split coefficients")?;
    if coefs.is_empty() {
        warn!(pid = pj.id, "No split coefficients found, skipping");
        return Ok(TaskOutcome::Skipped(SkipReason::NoSplitCoefficients));
    }

    let forecast = pipeline.create_components_forecast(pj, &input, &weather, &coefs)?;

    context
        .database
        .write_forecast(&forecast)
        .context("Failed to write components forecast")?;
    debug!(pid = pj.id, rows = forecast.len(), "Written forecast to database");

    Ok(TaskOutcome::Completed)
}
