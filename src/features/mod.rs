//! Feature engineering for load forecasting
//!
//! The applicators in [`applicator`] decide which features are computed for
//! which horizon and shape the result for the training, operational and
//! backtest pipelines. The actual computation is delegated to a
//! [`FeatureComputer`].

pub mod applicator;
pub mod compute;
pub mod general;
pub mod latency;

pub use applicator::*;
pub use compute::DefaultFeatureComputer;
pub use general::{add_missing_feature_columns, reconcile_feature_columns, remove_extra_feature_columns};
pub use latency::LatencyConfig;

use crate::error::Result;
use crate::table::DataTable;

/// Computes feature columns for one forecast horizon.
///
/// Implementations return a table with the input's row index plus zero or
/// more added columns; they may add columns beyond `feature_names`.
pub trait FeatureComputer {
    fn compute(&self, table: &DataTable, feature_names: Option<&[String]>, horizon: f64) -> Result<DataTable>;
}

impl<F> FeatureComputer for F
where
    F: Fn(&DataTable, Option<&[String]>, f64) -> Result<DataTable>,
{
    fn compute(&self, table: &DataTable, feature_names: Option<&[String]>, horizon: f64) -> Result<DataTable> {
        self(table, feature_names, horizon)
    }
}
