//! Horizon-aware feature engineering for energy load forecasting
//!
//! Turns a timestamp-indexed table of measurements into feature tables for
//! model training, operational prediction and backtesting.

pub mod config;
pub mod error;
pub mod features;
pub mod table;
pub mod tasks;
pub mod telemetry;

pub use error::{FeatureError, Result};
pub use features::{
    build_applicator, ApplicatorConfig, BackTestPredictFeatureApplicator, FeatureApplicator,
    FeatureComputer, LatencyConfig, OperationalPredictFeatureApplicator, PipelineMode,
    TrainFeatureApplicator,
};
pub use table::DataTable;
