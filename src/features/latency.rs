use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Latency thresholds (hours) per feature.
///
/// A feature is not yet published for forecasts further ahead than its
/// threshold, so training rows with `Horizon > threshold` must not see it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LatencyConfig(BTreeMap<String, f64>);

impl Default for LatencyConfig {
    fn default() -> Self {
        Self::empty().with("APX", 24.0)
    }
}

impl LatencyConfig {
    /// No latency constraints at all
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    pub fn with(mut self, feature: impl Into<String>, threshold_hours: f64) -> Self {
        self.0.insert(feature.into(), threshold_hours);
        self
    }

    pub fn threshold(&self, feature: &str) -> Option<f64> {
        self.0.get(feature).copied()
    }

    /// Whether `feature` is known at forecast time for `horizon` hours ahead
    pub fn is_available(&self, feature: &str, horizon: f64) -> bool {
        self.threshold(feature).map_or(true, |threshold| horizon <= threshold)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, f64)> for LatencyConfig {
    fn from_iter<T: IntoIterator<Item = (String, f64)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
