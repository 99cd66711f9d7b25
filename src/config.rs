use anyhow::{Context, Result};
use figment::{providers::{Env, Format, Toml}, Figment};
use serde::Deserialize;

use crate::error::FeatureError;
use crate::features::{ApplicatorConfig, DefaultFeatureComputer, HorizonsSetting, LatencyConfig, PipelineMode};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub features: FeaturesConfig,
    #[serde(default)]
    pub tasks: TasksConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeaturesConfig {
    pub mode: PipelineMode,
    pub horizons: Option<HorizonsSetting>,
    pub feature_names: Option<Vec<String>>,
    pub latency: LatencyConfig,
    pub load_column: String,
    pub latitude: f64,
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            mode: PipelineMode::Train,
            horizons: None,
            feature_names: None,
            latency: LatencyConfig::default(),
            load_column: "load".to_string(),
            latitude: 51.98,
        }
    }
}

impl FeaturesConfig {
    pub fn applicator_config(&self) -> std::result::Result<ApplicatorConfig, FeatureError> {
        ApplicatorConfig::from_setting(self.horizons.clone(), self.feature_names.clone())
    }

    pub fn computer(&self) -> DefaultFeatureComputer {
        DefaultFeatureComputer::new(self.load_column.as_str(), self.latitude)
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.load_column.trim().is_empty() {
            return Err("load_column must not be empty".to_string());
        }
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(format!("latitude {} out of range [-90, 90]", self.latitude));
        }
        if let Some((feature, threshold)) = self.latency.iter().find(|(_, t)| !t.is_finite() || *t < 0.0) {
            return Err(format!("latency threshold for {feature} must be non-negative, got {threshold}"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TasksConfig {
    pub training_period_days: u32,
    pub featureset_name: String,
    pub t_behind_days: i64,
    pub t_ahead_days: i64,
    pub maximum_model_age_days: f64,
    /// Skip retraining while the stored model is younger than `maximum_model_age_days`
    pub check_old_model_age: bool,
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            training_period_days: 120,
            featureset_name: "D".to_string(),
            t_behind_days: 0,
            t_ahead_days: 3,
            maximum_model_age_days: 7.0,
            check_old_model_age: true,
        }
    }
}

impl Config {
    pub fn figment() -> Figment {
        Figment::new()
            .merge(Toml::file("config/default.toml"))
            .merge(Env::prefixed("LFF__").split("__"))
    }

    pub fn load() -> Result<Self> {
        let config: Config = Self::figment()
            .extract()
            .context("Failed to load configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.features.validate().map_err(anyhow::Error::msg)?;
        if self.tasks.training_period_days == 0 {
            anyhow::bail!("training_period_days must be positive");
        }
        Ok(())
    }
}
