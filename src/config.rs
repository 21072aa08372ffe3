//! Engine configuration loaded from TOML
//!
//! Every threshold, boost and blend coefficient used by the rule engine, the
//! feature extractor and the model adapter is a named field here. Missing keys
//! fall back to the defaults below.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{HydrationError, Result};

/// Thresholds and volume coefficients for the rule engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleThresholds {
    /// Share of the fluid deficit replaced before any boost
    pub base_volume_fraction: f64,
    /// Extra share of the deficit when weight loss is significant
    pub weight_loss_boost_fraction: f64,
    /// Extra share of the deficit in hot conditions
    pub heat_boost_fraction: f64,
    /// Floor applied to every recommendation
    pub min_volume_liters: f64,
    /// Ceiling applied to every recommendation
    pub max_volume_liters: f64,
    pub weight_loss_high_kg: f64,
    pub hot_temperature_f: f64,
    /// Heart-rate reserve (fraction above baseline) that counts as high intensity
    pub high_intensity_hrr_pct: f64,
    /// weight_loss_pct x intensity_score at which sodium replacement kicks in
    pub sodium_proxy_threshold: f64,
    /// weight_loss_pct at which post-workout intake becomes urgent
    pub urgent_weight_loss_pct: f64,
}

impl Default for RuleThresholds {
    fn default() -> Self {
        Self {
            base_volume_fraction: 0.40,
            weight_loss_boost_fraction: 0.05,
            heat_boost_fraction: 0.05,
            min_volume_liters: 0.20,
            max_volume_liters: 3.0,
            weight_loss_high_kg: 0.5,
            hot_temperature_f: 85.0,
            high_intensity_hrr_pct: 1.75,
            sodium_proxy_threshold: 0.02,
            urgent_weight_loss_pct: 0.02,
        }
    }
}

/// Bucketing and history settings for the feature extractor.
///
/// The high-intensity and hot-temperature cut points come from
/// `RuleThresholds`, so inferred intensity and the hot bucket always agree
/// with the rules that fire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub medium_intensity_hrr_pct: f64,
    pub max_heart_rate_reserve_pct: f64,
    /// Number of most recent workouts used for the baseline sweat rate
    pub history_window: usize,
    pub cold_temperature_f: f64,
    pub mild_temperature_f: f64,
    pub short_duration_minutes: f64,
    pub long_duration_minutes: f64,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            medium_intensity_hrr_pct: 1.0,
            max_heart_rate_reserve_pct: 3.0,
            history_window: 5,
            cold_temperature_f: 50.0,
            mild_temperature_f: 70.0,
            short_duration_minutes: 30.0,
            long_duration_minutes: 90.0,
        }
    }
}

/// Model fitting and blending settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub min_samples: usize,
    /// Weight of the model volume in the blend (0 = rules only, 1 = model only)
    pub blend_weight: f64,
    /// Below this confidence the model is ignored and rules are used verbatim
    pub min_confidence: f64,
    pub ridge_alpha: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            min_samples: 10,
            blend_weight: 0.5,
            min_confidence: 0.0,
            ridge_alpha: 0.5,
        }
    }
}

/// How historical samples are divided into training and holdout sets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SplitPolicy {
    /// Oldest samples train, newest `holdout_fraction` are held out
    Chronological { holdout_fraction: f64 },
    /// Seeded shuffle before splitting
    Random { holdout_fraction: f64, seed: u64 },
}

impl SplitPolicy {
    pub fn holdout_fraction(&self) -> f64 {
        match self {
            SplitPolicy::Chronological { holdout_fraction } => *holdout_fraction,
            SplitPolicy::Random { holdout_fraction, .. } => *holdout_fraction,
        }
    }
}

impl Default for SplitPolicy {
    fn default() -> Self {
        SplitPolicy::Chronological { holdout_fraction: 0.2 }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub split: SplitPolicy,
}

/// Full engine configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub rules: RuleThresholds,
    pub features: FeatureConfig,
    pub model: ModelConfig,
    pub training: TrainingConfig,
}

impl EngineConfig {
    /// Parse configuration from a TOML string and validate it
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Reject coefficient combinations the engine cannot honor.
    pub fn validate(&self) -> Result<()> {
        let r = &self.rules;
        if r.min_volume_liters < 0.0 {
            return Err(HydrationError::validation("rules.min_volume_liters", "must be >= 0"));
        }
        if r.max_volume_liters < r.min_volume_liters {
            return Err(HydrationError::validation(
                "rules.max_volume_liters",
                "must be >= min_volume_liters",
            ));
        }
        if r.base_volume_fraction < 0.0
            || r.weight_loss_boost_fraction < 0.0
            || r.heat_boost_fraction < 0.0
        {
            return Err(HydrationError::validation(
                "rules.base_volume_fraction",
                "volume fractions must be >= 0",
            ));
        }
        if self.features.medium_intensity_hrr_pct > r.high_intensity_hrr_pct {
            return Err(HydrationError::validation(
                "features.medium_intensity_hrr_pct",
                "must not exceed rules.high_intensity_hrr_pct",
            ));
        }
        if self.features.mild_temperature_f > r.hot_temperature_f {
            return Err(HydrationError::validation(
                "features.mild_temperature_f",
                "must not exceed rules.hot_temperature_f",
            ));
        }
        if !(0.0..=1.0).contains(&self.model.blend_weight) {
            return Err(HydrationError::validation("model.blend_weight", "must be within [0, 1]"));
        }
        if self.model.ridge_alpha <= 0.0 {
            return Err(HydrationError::validation("model.ridge_alpha", "must be > 0"));
        }
        if self.model.min_samples == 0 {
            return Err(HydrationError::validation("model.min_samples", "must be > 0"));
        }
        let holdout = self.training.split.holdout_fraction();
        if !(0.0..1.0).contains(&holdout) {
            return Err(HydrationError::validation(
                "training.split.holdout_fraction",
                "must be within [0, 1)",
            ));
        }
        Ok(())
    }
}
