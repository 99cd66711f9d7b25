//! Horizon-aware feature applicators
//!
//! Three pipelines consume features differently:
//! - training stacks one copy of the data per horizon and invalidates
//!   features that would not be published yet at that horizon,
//! - operational prediction computes one horizon with the requested features,
//! - backtesting computes the full feature set for one horizon and trims it.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::debug;

use super::general::reconcile_feature_columns;
use super::{DefaultFeatureComputer, FeatureComputer, LatencyConfig};
use crate::error::{FeatureError, Result};
use crate::table::DataTable;

/// Quarter-hour-ahead and day-ahead
pub const DEFAULT_TRAIN_HORIZONS: [f64; 2] = [0.25, 24.0];

/// Column tagging each training row with the horizon it was computed for
pub const HORIZON_COLUMN: &str = "Horizon";

/// Horizons as they appear in configuration files.
///
/// A bare number is accepted by the parser so that it can be rejected with a
/// configuration error instead of a parse error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HorizonsSetting {
    List(Vec<f64>),
    Single(f64),
}

/// Configuration shared by all applicators
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplicatorConfig {
    horizons: Option<Vec<f64>>,
    feature_names: Option<Vec<String>>,
}

impl ApplicatorConfig {
    pub fn new(horizons: Option<Vec<f64>>, feature_names: Option<Vec<String>>) -> Result<Self> {
        if let Some(bad) = horizons
            .iter()
            .flatten()
            .find(|h| !h.is_finite() || **h < 0.0)
        {
            return Err(FeatureError::InvalidHorizon(*bad));
        }
        Ok(Self {
            horizons,
            feature_names,
        })
    }

    /// Build from a configuration value; a non-list horizon is rejected
    pub fn from_setting(horizons: Option<HorizonsSetting>, feature_names: Option<Vec<String>>) -> Result<Self> {
        match horizons {
            Some(HorizonsSetting::Single(_)) => Err(FeatureError::HorizonsNotAList),
            Some(HorizonsSetting::List(list)) => Self::new(Some(list), feature_names),
            None => Self::new(None, feature_names),
        }
    }

    pub fn horizons(&self) -> Option<&[f64]> {
        self.horizons.as_deref()
    }

    pub fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    /// The only configured horizon, for the single-horizon pipelines
    pub fn single_horizon(&self) -> Result<f64> {
        match self.horizons.as_deref() {
            Some([horizon]) => Ok(*horizon),
            other => Err(FeatureError::HorizonCount(other.map_or(0, <[f64]>::len))),
        }
    }
}

/// Pipeline a table is being prepared for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PipelineMode {
    Train,
    Operational,
    Backtest,
}

/// Adds features to an input table for a specific pipeline
pub trait FeatureApplicator {
    fn mode(&self) -> PipelineMode;

    fn add_features(&self, table: &DataTable) -> Result<DataTable>;
}

/// Feature applicator for the model training pipeline.
///
/// For example, for horizon 24 the feature `T-720min` is not added as the
/// load 720 minutes ago is not available 24 hours in advance, while for
/// horizon 0.25 it is.
#[derive(Debug, Clone)]
pub struct TrainFeatureApplicator<C = DefaultFeatureComputer> {
    horizons: Vec<f64>,
    feature_names: Option<Vec<String>>,
    latency: LatencyConfig,
    computer: C,
}

impl TrainFeatureApplicator<DefaultFeatureComputer> {
    pub fn from_config(config: ApplicatorConfig) -> Self {
        Self::new(config, DefaultFeatureComputer::default())
    }
}

impl<C: FeatureComputer> TrainFeatureApplicator<C> {
    /// Horizons default to [`DEFAULT_TRAIN_HORIZONS`] when none are configured
    pub fn new(config: ApplicatorConfig, computer: C) -> Self {
        Self {
            horizons: config
                .horizons
                .unwrap_or_else(|| DEFAULT_TRAIN_HORIZONS.to_vec()),
            feature_names: config.feature_names,
            latency: LatencyConfig::default(),
            computer,
        }
    }

    pub fn with_latency(mut self, latency: LatencyConfig) -> Self {
        self.latency = latency;
        self
    }

    pub fn effective_horizons(&self) -> &[f64] {
        &self.horizons
    }

    pub fn latency(&self) -> &LatencyConfig {
        &self.latency
    }

    /// Like [`FeatureApplicator::add_features`] with a per-call latency config
    pub fn add_features_with_latency(&self, table: &DataTable, latency: &LatencyConfig) -> Result<DataTable> {
        let mut per_horizon = Vec::with_capacity(self.horizons.len());
        for &horizon in &self.horizons {
            let mut features = self
                .computer
                .compute(table, self.feature_names.as_deref(), horizon)?;
            features.fill_column(HORIZON_COLUMN, Some(horizon));
            debug!(
                horizon,
                rows = features.len(),
                columns = features.num_columns(),
                "Added features for horizon"
            );
            per_horizon.push(features);
        }

        let mut result = DataTable::concat(per_horizon);

        for (feature, threshold) in latency.iter() {
            if !result.has_column(feature) {
                debug!(feature, "Latency-limited feature not present");
                continue;
            }
            let invalidated = result.null_where(feature, HORIZON_COLUMN, |h| {
                h.map_or(false, |h| !latency.is_available(feature, h))
            })?;
            debug!(feature, threshold, invalidated, "Invalidated feature due to data latency");
        }

        // Per-horizon blocks are stacked, restore chronological order
        result.sort_by_index();
        Ok(result)
    }
}

impl<C: FeatureComputer> FeatureApplicator for TrainFeatureApplicator<C> {
    fn mode(&self) -> PipelineMode {
        PipelineMode::Train
    }

    fn add_features(&self, table: &DataTable) -> Result<DataTable> {
        self.add_features_with_latency(table, &self.latency)
    }
}

/// Feature applicator for operational predictions: one horizon, exactly the
/// requested features.
#[derive(Debug, Clone)]
pub struct OperationalPredictFeatureApplicator<C = DefaultFeatureComputer> {
    config: ApplicatorConfig,
    computer: C,
}

impl OperationalPredictFeatureApplicator<DefaultFeatureComputer> {
    pub fn from_config(config: ApplicatorConfig) -> Self {
        Self::new(config, DefaultFeatureComputer::default())
    }
}

impl<C: FeatureComputer> OperationalPredictFeatureApplicator<C> {
    pub fn new(config: ApplicatorConfig, computer: C) -> Self {
        Self { config, computer }
    }
}

impl<C: FeatureComputer> FeatureApplicator for OperationalPredictFeatureApplicator<C> {
    fn mode(&self) -> PipelineMode {
        PipelineMode::Operational
    }

    fn add_features(&self, table: &DataTable) -> Result<DataTable> {
        let horizon = self.config.single_horizon()?;
        let feature_names = self.config.feature_names();

        let features = self.computer.compute(table, feature_names, horizon)?;
        // The computer may add more than was asked for
        Ok(reconcile_feature_columns(features, feature_names))
    }
}

/// Feature applicator for backtests: computes every available feature for
/// one horizon and only then trims to the requested set.
#[derive(Debug, Clone)]
pub struct BackTestPredictFeatureApplicator<C = DefaultFeatureComputer> {
    config: ApplicatorConfig,
    computer: C,
}

impl BackTestPredictFeatureApplicator<DefaultFeatureComputer> {
    pub fn from_config(config: ApplicatorConfig) -> Self {
        Self::new(config, DefaultFeatureComputer::default())
    }
}

impl<C: FeatureComputer> BackTestPredictFeatureApplicator<C> {
    pub fn new(config: ApplicatorConfig, computer: C) -> Self {
        Self { config, computer }
    }
}

impl<C: FeatureComputer> FeatureApplicator for BackTestPredictFeatureApplicator<C> {
    fn mode(&self) -> PipelineMode {
        PipelineMode::Backtest
    }

    fn add_features(&self, table: &DataTable) -> Result<DataTable> {
        let horizon = self.config.single_horizon()?;
        let features = self.computer.compute(table, None, horizon)?;
        Ok(reconcile_feature_columns(features, self.config.feature_names()))
    }
}

/// Create the applicator for `mode`. `latency` only affects training.
pub fn build_applicator<C>(
    mode: PipelineMode,
    config: ApplicatorConfig,
    latency: LatencyConfig,
    computer: C,
) -> Box<dyn FeatureApplicator>
where
    C: FeatureComputer + 'static,
{
    match mode {
        PipelineMode::Train => Box::new(TrainFeatureApplicator::new(config, computer).with_latency(latency)),
        PipelineMode::Operational => Box::new(OperationalPredictFeatureApplicator::new(config, computer)),
        PipelineMode::Backtest => Box::new(BackTestPredictFeatureApplicator::new(config, computer)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use std::cell::RefCell;
    use std::rc::Rc;

    type Calls = Rc<RefCell<Vec<(Option<Vec<String>>, f64)>>>;

    /// Adds `produced` columns (value = horizon) and records every call
    struct StubComputer {
        produced: Vec<&'static str>,
        calls: Calls,
    }

    impl StubComputer {
        fn new(produced: &[&'static str]) -> (Self, Calls) {
            let calls = Calls::default();
            let stub = Self {
                produced: produced.to_vec(),
                calls: Rc::clone(&calls),
            };
            (stub, calls)
        }
    }

    impl FeatureComputer for StubComputer {
        fn compute(&self, table: &DataTable, feature_names: Option<&[String]>, horizon: f64) -> Result<DataTable> {
            self.calls
                .borrow_mut()
                .push((feature_names.map(<[String]>::to_vec), horizon));
            let mut out = table.clone();
            for name in &self.produced {
                out.fill_column(*name, Some(horizon));
            }
            Ok(out)
        }
    }

    fn input(rows: i64) -> DataTable {
        let t0 = Utc.with_ymd_and_hms(2021, 5, 1, 0, 0, 0).unwrap();
        let index = (0..rows).map(|i| t0 + Duration::minutes(15 * i)).collect();
        DataTable::new(index)
            .with_column("load", (0..rows).map(|i| Some(i as f64)).collect())
            .unwrap()
            .with_column("APX", (0..rows).map(|_| Some(50.0)).collect())
            .unwrap()
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_scalar_horizon_setting_is_rejected() {
        let err = ApplicatorConfig::from_setting(Some(HorizonsSetting::Single(24.0)), None).unwrap_err();
        assert!(matches!(err, FeatureError::HorizonsNotAList));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_horizon_setting_parses_list_and_scalar() {
        let list: HorizonsSetting = serde_json::from_str("[0.25, 24]").unwrap();
        assert_eq!(list, HorizonsSetting::List(vec![0.25, 24.0]));
        let single: HorizonsSetting = serde_json::from_str("24").unwrap();
        assert_eq!(single, HorizonsSetting::Single(24.0));
    }

    #[test]
    fn test_negative_horizon_is_rejected() {
        let err = ApplicatorConfig::new(Some(vec![0.25, -1.0]), None).unwrap_err();
        assert!(matches!(err, FeatureError::InvalidHorizon(h) if h == -1.0));
    }

    #[test]
    fn test_train_defaults_horizons() {
        let (stub, calls) = StubComputer::new(&[]);
        let applicator = TrainFeatureApplicator::new(ApplicatorConfig::default(), stub);
        assert_eq!(applicator.effective_horizons(), &[0.25, 24.0]);

        let out = applicator.add_features(&input(3)).unwrap();
        assert_eq!(out.len(), 6);
        let horizons: Vec<f64> = calls.borrow().iter().map(|(_, h)| *h).collect();
        assert_eq!(horizons, vec![0.25, 24.0]);
    }

    #[test]
    fn test_train_invalidates_latency_limited_features() {
        let (stub, _calls) = StubComputer::new(&["T-15min"]);
        let config = ApplicatorConfig::new(Some(vec![0.25, 24.0, 48.0]), None).unwrap();
        let applicator = TrainFeatureApplicator::new(config, stub);

        let out = applicator.add_features(&input(4)).unwrap();
        assert_eq!(out.len(), 12);
        assert!(out.is_sorted_by_index());
        for row in 0..out.len() {
            let horizon = out.value(row, HORIZON_COLUMN).unwrap();
            if horizon > 24.0 {
                assert_eq!(out.value(row, "APX"), None);
            } else {
                assert_eq!(out.value(row, "APX"), Some(50.0));
            }
            assert_eq!(out.value(row, "T-15min"), Some(horizon));
        }
    }

    #[test]
    fn test_train_custom_latency_per_call() {
        let (stub, _calls) = StubComputer::new(&["T-720min"]);
        let config = ApplicatorConfig::new(Some(vec![0.25, 24.0]), None).unwrap();
        let applicator = TrainFeatureApplicator::new(config, stub);
        let latency = LatencyConfig::empty().with("T-720min", 12.0);

        let out = applicator.add_features_with_latency(&input(2), &latency).unwrap();
        for row in 0..out.len() {
            let horizon = out.value(row, HORIZON_COLUMN).unwrap();
            assert_eq!(out.value(row, "T-720min").is_none(), horizon > 12.0);
            assert!(out.value(row, "APX").is_some());
        }
    }

    #[test]
    fn test_train_forwards_feature_filter() {
        let (stub, calls) = StubComputer::new(&[]);
        let config = ApplicatorConfig::new(Some(vec![1.0]), Some(names(&["APX"]))).unwrap();
        TrainFeatureApplicator::new(config, stub)
            .add_features(&input(1))
            .unwrap();
        assert_eq!(calls.borrow()[0].0, Some(names(&["APX"])));
    }

    #[test]
    fn test_operational_reconciles_columns() {
        let (stub, calls) = StubComputer::new(&["T-720min", "hour"]);
        let requested = names(&["T-720min", "APX", "IsSunday"]);
        let config = ApplicatorConfig::new(Some(vec![0.25]), Some(requested.clone())).unwrap();
        let applicator = OperationalPredictFeatureApplicator::new(config, stub);

        let out = applicator.add_features(&input(3)).unwrap();
        assert_eq!(out.column_names().collect::<Vec<_>>(), vec!["T-720min", "APX", "IsSunday"]);
        assert_eq!(out.column("IsSunday").unwrap(), &[None, None, None]);
        assert_eq!(out.len(), 3);
        assert_eq!(calls.borrow()[0], (Some(requested), 0.25));
    }

    #[test]
    fn test_backtest_computes_without_filter() {
        let (stub, calls) = StubComputer::new(&["T-720min", "hour"]);
        let requested = names(&["hour"]);
        let config = ApplicatorConfig::new(Some(vec![24.0]), Some(requested)).unwrap();
        let applicator = BackTestPredictFeatureApplicator::new(config, stub);

        let out = applicator.add_features(&input(2)).unwrap();
        assert_eq!(out.column_names().collect::<Vec<_>>(), vec!["hour"]);
        assert_eq!(calls.borrow()[0], (None, 24.0));
    }

    #[test]
    fn test_single_horizon_pipelines_reject_missing_horizons() {
        let (stub, calls) = StubComputer::new(&[]);
        let applicator = OperationalPredictFeatureApplicator::new(ApplicatorConfig::default(), stub);
        let err = applicator.add_features(&input(1)).unwrap_err();
        assert_eq!(err.to_string(), "Expected one horizon, got 0");
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn test_computer_errors_propagate() {
        let failing = |_: &DataTable, _: Option<&[String]>, _: f64| -> Result<DataTable> {
            Err(FeatureError::Computation("weather source offline".to_string()))
        };
        let config = ApplicatorConfig::new(Some(vec![0.25]), None).unwrap();
        let err = OperationalPredictFeatureApplicator::new(config, failing)
            .add_features(&input(1))
            .unwrap_err();
        assert!(matches!(err, FeatureError::Computation(msg) if msg == "weather source offline"));
    }

    #[test]
    fn test_build_applicator_by_mode() {
        let config = ApplicatorConfig::new(Some(vec![0.25]), None).unwrap();
        for mode in [PipelineMode::Train, PipelineMode::Operational, PipelineMode::Backtest] {
            let applicator = build_applicator(
                mode,
                config.clone(),
                LatencyConfig::default(),
                DefaultFeatureComputer::default(),
            );
            assert_eq!(applicator.mode(), mode);
        }
        assert_eq!("backtest".parse::<PipelineMode>().unwrap(), PipelineMode::Backtest);
        assert_eq!(PipelineMode::Operational.to_string(), "operational");
    }
}
