//! Builds training data from completed workouts and evaluates fitted models

use std::collections::HashMap;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{EngineConfig, SplitPolicy};
use crate::error::{HydrationError, Result};
use crate::models::{AthleteProfile, WorkoutRecord};
use crate::store::AthleteRegistry;

use super::features::FeatureExtractor;
use super::predictor::{
    FittedModel, HydrationModel, ModelAdapter, TrainingReport, TrainingSample, score_samples,
};

/// Accuracy of a model on held-out samples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub volume_mae: f64,
    pub electrolyte_accuracy: f64,
    pub sample_count: usize,
}

/// Result of a full fit: training metrics and, when a holdout exists, its metrics
#[derive(Debug, Clone, PartialEq)]
pub struct FitSummary {
    pub training: TrainingReport,
    pub holdout: Option<EvaluationReport>,
}

pub struct Trainer {
    extractor: FeatureExtractor,
    min_samples: usize,
    split: SplitPolicy,
}

impl Trainer {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            extractor: FeatureExtractor::new(config.features.clone(), &config.rules),
            min_samples: config.model.min_samples,
            split: config.training.split,
        }
    }

    /// Samples from records that carry an outcome, oldest first.
    ///
    /// Each record's history is the same athlete's earlier records, so the
    /// baseline sweat rate never looks ahead.
    pub fn build_dataset(
        &self,
        registry: &dyn AthleteRegistry,
        records: &[WorkoutRecord],
    ) -> Result<Vec<TrainingSample>> {
        let mut ordered: Vec<&WorkoutRecord> = records.iter().collect();
        ordered.sort_by_key(|r| r.started_at);

        let mut profiles: HashMap<&str, Option<AthleteProfile>> = HashMap::new();
        let mut earlier: HashMap<&str, Vec<WorkoutRecord>> = HashMap::new();
        let mut dataset = Vec::new();

        for record in ordered {
            let athlete_id = record.athlete_id.as_str();
            if !profiles.contains_key(athlete_id) {
                profiles.insert(athlete_id, registry.lookup(athlete_id)?);
            }
            let history = earlier.entry(athlete_id).or_default();

            if let Some(outcome) = &record.outcome {
                match profiles.get(athlete_id).and_then(Option::as_ref) {
                    Some(profile) => {
                        outcome.validate()?;
                        let features = self.extractor.extract_series(
                            profile,
                            &record.observations,
                            record.environment.as_ref(),
                            Some(history.as_slice()),
                            false,
                        )?;
                        dataset.push(TrainingSample {
                            features,
                            actual_volume_liters: outcome.actual_volume_liters,
                            actual_electrolyte: outcome.actual_electrolyte,
                        });
                    }
                    None => warn!(
                        workout_id = %record.workout_id,
                        athlete_id,
                        "Skipping workout of unregistered athlete"
                    ),
                }
            }

            history.push(record.clone());
        }

        if dataset.len() < self.min_samples {
            return Err(HydrationError::InsufficientData {
                required: self.min_samples,
                actual: dataset.len(),
            });
        }
        Ok(dataset)
    }

    /// Divide into (training, holdout) according to the configured policy
    pub fn split(&self, mut dataset: Vec<TrainingSample>) -> (Vec<TrainingSample>, Vec<TrainingSample>) {
        let holdout_len = (dataset.len() as f64 * self.split.holdout_fraction()).round() as usize;
        if let SplitPolicy::Random { seed, .. } = self.split {
            let mut rng = StdRng::seed_from_u64(seed);
            dataset.shuffle(&mut rng);
        }
        let holdout = dataset.split_off(dataset.len() - holdout_len.min(dataset.len()));
        (dataset, holdout)
    }

    /// Volume MAE and electrolyte accuracy on held-out samples
    pub fn evaluate<M: HydrationModel + ?Sized>(
        &self,
        model: &M,
        holdout: &[TrainingSample],
    ) -> Result<EvaluationReport> {
        if holdout.is_empty() {
            return Err(HydrationError::InsufficientData { required: 1, actual: 0 });
        }
        let report = score_samples(model, holdout, 0.0);
        Ok(EvaluationReport {
            volume_mae: report.volume_mae,
            electrolyte_accuracy: report.electrolyte_accuracy,
            sample_count: report.sample_count,
        })
    }

    /// Build, split, train and evaluate in one pass.
    ///
    /// The holdout is scored against the model this call fitted, before it
    /// is installed, so a concurrent swap cannot leak into the report.
    pub fn fit(
        &self,
        adapter: &ModelAdapter<FittedModel>,
        registry: &dyn AthleteRegistry,
        records: &[WorkoutRecord],
    ) -> Result<FitSummary> {
        let dataset = self.build_dataset(registry, records)?;
        let (train, holdout) = self.split(dataset);
        let (model, training) = adapter.fit_candidate(&train)?;

        let holdout = if holdout.is_empty() {
            None
        } else {
            Some(self.evaluate(&model, &holdout)?)
        };
        adapter.install(model);
        info!(
            samples = training.sample_count,
            volume_mae = training.volume_mae,
            volume_r2 = training.volume_r2,
            "Model swapped in"
        );
        if let Some(report) = &holdout {
            info!(
                holdout = report.sample_count,
                volume_mae = report.volume_mae,
                electrolyte_accuracy = report.electrolyte_accuracy,
                "Holdout evaluation"
            );
        }

        Ok(FitSummary { training, holdout })
    }
}
