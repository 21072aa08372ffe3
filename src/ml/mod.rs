//! ML module - Hydration predictions and recommendations
//!
//! Features:
//! - Feature extraction from profile, observations, conditions and history
//! - Rule-based recommendations with ordered reasons
//! - Volume / electrolyte regression (linfa) blended with the rules once trained

pub mod features;
pub mod predictor;
pub mod rules;
pub mod trainer;

pub use features::{FeatureExtractor, FeatureVector};
pub use predictor::{
    FittedModel, HydrationModel, JsonModelCodec, ModelAdapter, ModelCodec, ModelEstimate,
    ModelOutput, TrainingReport, TrainingSample,
};
pub use rules::RuleEngine;
pub use trainer::{EvaluationReport, FitSummary, Trainer};

use tracing::debug;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::models::recommendation::round2;
use crate::models::{
    AthleteProfile, EnvironmentalData, Recommendation, RecommendationSource, WorkoutMetrics,
    WorkoutRecord,
};

/// How much the caller trusts the learned model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PredictionMode {
    /// Rules, blended with the model when one is trained and confident enough
    #[default]
    Blended,
    RuleOnly,
    /// Model volume only; fails with `ModelUnavailable` when untrained
    ModelOnly,
}

/// Entry point: features in, recommendation out
pub struct HydrationEngine<M = FittedModel> {
    config: EngineConfig,
    extractor: FeatureExtractor,
    rules: RuleEngine,
    model: ModelAdapter<M>,
}

impl<M: HydrationModel> HydrationEngine<M> {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            extractor: FeatureExtractor::new(config.features.clone(), &config.rules),
            rules: RuleEngine::new(config.rules.clone()),
            model: ModelAdapter::new(config.model.clone()),
            config,
        }
    }

    pub fn with_model(config: EngineConfig, model: M) -> Self {
        let engine = Self::new(config);
        engine.model.install(model);
        engine
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    pub fn rules(&self) -> &RuleEngine {
        &self.rules
    }

    pub fn model(&self) -> &ModelAdapter<M> {
        &self.model
    }

    /// Blended recommendation; never fails
    pub fn recommend(&self, features: &FeatureVector) -> Recommendation {
        let rule = self.rules.evaluate(features);
        match self.model.predict(features) {
            ModelOutput::Untrained => rule,
            ModelOutput::Estimate(estimate) if estimate.confidence < self.config.model.min_confidence => {
                debug!(
                    confidence = estimate.confidence,
                    min_confidence = self.config.model.min_confidence,
                    "Model below confidence threshold, using rules"
                );
                rule
            }
            ModelOutput::Estimate(estimate) => blend(rule, estimate, self.config.model.blend_weight),
        }
    }

    pub fn recommend_with(&self, features: &FeatureVector, mode: PredictionMode) -> Result<Recommendation> {
        match mode {
            PredictionMode::Blended => Ok(self.recommend(features)),
            PredictionMode::RuleOnly => Ok(self.rules.evaluate(features)),
            PredictionMode::ModelOnly => {
                let estimate = self.model.predict_strict(features)?;
                Ok(blend(self.rules.evaluate(features), estimate, 1.0))
            }
        }
    }

    /// One-shot recommendation for a completed workout
    pub fn recommend_workout(
        &self,
        profile: &AthleteProfile,
        metrics: &WorkoutMetrics,
        environment: Option<&EnvironmentalData>,
        history: Option<&[WorkoutRecord]>,
    ) -> Result<Recommendation> {
        let features = self.extractor.extract(profile, metrics, environment, history)?;
        Ok(self.recommend(&features))
    }
}

/// Weighted average of rule and model volume; electrolyte raised to the model's level
fn blend(rule: Recommendation, estimate: ModelEstimate, model_weight: f64) -> Recommendation {
    let rule_volume = rule.volume_liters;
    let volume = round2(rule_volume * (1.0 - model_weight) + estimate.volume_liters * model_weight);
    let delta = volume - rule_volume;

    let mut reasons = rule.reasons;
    reasons.push(format!("ML adjustment applied ({:+.2} L)", delta));

    Recommendation {
        volume_liters: volume,
        electrolyte_level: rule.electrolyte_level.max(estimate.electrolyte_level),
        timing: rule.timing,
        reasons,
        future_suggestions: rule.future_suggestions,
        source: RecommendationSource::MlBlended {
            rule_volume_liters: rule_volume,
            model_volume_liters: estimate.volume_liters,
            confidence: estimate.confidence,
        },
    }
}
