//! Volume and electrolyte prediction using linear regression (linfa)
//!
//! The fitted model lives behind a swappable handle: training builds a new
//! model off to the side and swaps it in only once fitting has succeeded, so
//! predictions keep being served by the previous model in the meantime.

use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use linfa::prelude::*;
use linfa_linear::LinearRegression;
use ndarray::{Array1, Array2, Axis, concatenate};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ModelConfig;
use crate::error::{HydrationError, Result};
use crate::models::ElectrolyteLevel;
use crate::models::recommendation::round2;

use super::features::{FeatureVector, MODEL_FEATURES};

/// Single prediction from a trained model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelEstimate {
    pub volume_liters: f64,
    pub electrolyte_level: ElectrolyteLevel,
    /// 0-1
    pub confidence: f64,
}

/// Prediction outcome; `Untrained` instead of an error when no model is loaded
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ModelOutput {
    Untrained,
    Estimate(ModelEstimate),
}

/// Anything that can turn features into a volume/electrolyte estimate
pub trait HydrationModel: Send + Sync {
    fn predict(&self, features: &FeatureVector) -> ModelEstimate;
}

/// One historical observation with what the athlete actually needed
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSample {
    pub features: FeatureVector,
    pub actual_volume_liters: f64,
    pub actual_electrolyte: ElectrolyteLevel,
}

impl TrainingSample {
    pub fn validate(&self) -> Result<()> {
        if !(self.actual_volume_liters.is_finite() && self.actual_volume_liters >= 0.0) {
            return Err(HydrationError::validation("actual_volume_liters", "must be >= 0"));
        }
        if !self.features.model_row().iter().all(|v| v.is_finite()) {
            return Err(HydrationError::validation("features", "must be finite"));
        }
        Ok(())
    }
}

/// Fit quality on the training set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub volume_mae: f64,
    pub electrolyte_accuracy: f64,
    pub sample_count: usize,
    pub volume_r2: f64,
}

/// Linear head over standardized features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearHead {
    pub weights: Vec<f64>,
    pub intercept: f64,
}

impl LinearHead {
    fn score(&self, standardized: &[f64]) -> f64 {
        self.intercept
            + self
                .weights
                .iter()
                .zip(standardized)
                .map(|(w, x)| w * x)
                .sum::<f64>()
    }
}

/// Fitted parameters for both regressors plus the feature scaling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedModel {
    pub feature_means: Vec<f64>,
    pub feature_scales: Vec<f64>,
    pub volume: LinearHead,
    pub electrolyte: LinearHead,
    pub confidence: f64,
    pub sample_count: usize,
    pub trained_at: DateTime<Utc>,
}

impl FittedModel {
    /// Fit volume and electrolyte regressors on standardized features
    pub fn fit(samples: &[TrainingSample], ridge_alpha: f64) -> Result<(Self, TrainingReport)> {
        let n_samples = samples.len();
        if n_samples == 0 {
            return Err(HydrationError::InsufficientData { required: 1, actual: 0 });
        }
        for sample in samples {
            sample.validate()?;
        }

        let rows: Vec<f64> = samples.iter().flat_map(|s| s.features.model_row()).collect();
        let records = Array2::from_shape_vec((n_samples, MODEL_FEATURES), rows)
            .map_err(|e| HydrationError::Training(e.to_string()))?;

        let means = records
            .mean_axis(Axis(0))
            .ok_or_else(|| HydrationError::Training("empty feature matrix".to_string()))?;
        let scales = records
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s > 1e-9 { s } else { 1.0 });
        let standardized = (&records - &means) / &scales;

        let volume_targets: Array1<f64> =
            samples.iter().map(|s| s.actual_volume_liters).collect();
        let electrolyte_targets: Array1<f64> = samples
            .iter()
            .map(|s| s.actual_electrolyte.ordinal() as f64)
            .collect();

        let volume = fit_ridge(&standardized, &volume_targets, ridge_alpha)?;
        let electrolyte = fit_ridge(&standardized, &electrolyte_targets, ridge_alpha)?;

        // In-sample fit quality
        let volume_predictions =
            standardized.dot(&Array1::from_vec(volume.weights.clone())) + volume.intercept;
        let dataset = Dataset::new(standardized.clone(), volume_targets.clone());
        let volume_r2 = volume_predictions
            .r2(&dataset)
            .ok()
            .filter(|r2| r2.is_finite())
            .unwrap_or(0.0);

        let model = Self {
            feature_means: means.to_vec(),
            feature_scales: scales.to_vec(),
            volume,
            electrolyte,
            confidence: volume_r2.clamp(0.0, 1.0),
            sample_count: n_samples,
            trained_at: Utc::now(),
        };
        model
            .validate()
            .map_err(|e| HydrationError::Training(e.to_string()))?;

        let report = score_samples(&model, samples, volume_r2);
        Ok((model, report))
    }

    /// Reject parameters that could not have come from `fit`
    pub fn validate(&self) -> Result<()> {
        let lengths_ok = self.feature_means.len() == MODEL_FEATURES
            && self.feature_scales.len() == MODEL_FEATURES
            && self.volume.weights.len() == MODEL_FEATURES
            && self.electrolyte.weights.len() == MODEL_FEATURES;
        if !lengths_ok {
            return Err(HydrationError::Codec(format!(
                "expected {} feature columns",
                MODEL_FEATURES
            )));
        }
        let finite = self
            .feature_means
            .iter()
            .chain(&self.volume.weights)
            .chain(&self.electrolyte.weights)
            .chain([&self.volume.intercept, &self.electrolyte.intercept])
            .all(|v| v.is_finite());
        if !finite || self.feature_scales.iter().any(|s| !(s.is_finite() && *s > 0.0)) {
            return Err(HydrationError::Codec("non-finite model parameters".to_string()));
        }
        Ok(())
    }

    fn standardize(&self, features: &FeatureVector) -> Vec<f64> {
        features
            .model_row()
            .iter()
            .zip(&self.feature_means)
            .zip(&self.feature_scales)
            .map(|((x, mean), scale)| (x - mean) / scale)
            .collect()
    }
}

impl HydrationModel for FittedModel {
    fn predict(&self, features: &FeatureVector) -> ModelEstimate {
        let standardized = self.standardize(features);
        ModelEstimate {
            volume_liters: round2(self.volume.score(&standardized).max(0.0)),
            electrolyte_level: ElectrolyteLevel::from_score(self.electrolyte.score(&standardized)),
            confidence: self.confidence,
        }
    }
}

/// Ridge regression via OLS on a design augmented with sqrt(alpha) * I rows.
///
/// Inputs are standardized (zero-mean columns), so the intercept is the target mean.
fn fit_ridge(standardized: &Array2<f64>, targets: &Array1<f64>, alpha: f64) -> Result<LinearHead> {
    let n_features = standardized.ncols();
    let intercept = targets.mean().unwrap_or(0.0);
    let centered = targets - intercept;

    let penalty = Array2::<f64>::eye(n_features) * alpha.sqrt();
    let zeros = Array1::<f64>::zeros(n_features);
    let records = concatenate(Axis(0), &[standardized.view(), penalty.view()])
        .map_err(|e| HydrationError::Training(e.to_string()))?;
    let augmented_targets = concatenate(Axis(0), &[centered.view(), zeros.view()])
        .map_err(|e| HydrationError::Training(e.to_string()))?;

    let dataset = Dataset::new(records, augmented_targets);
    let model = LinearRegression::new()
        .with_intercept(false)
        .fit(&dataset)
        .map_err(|e| HydrationError::Training(e.to_string()))?;

    Ok(LinearHead {
        weights: model.params().to_vec(),
        intercept,
    })
}

/// MAE for volume and accuracy for electrolyte level of `model` on `samples`
pub(crate) fn score_samples<M: HydrationModel + ?Sized>(
    model: &M,
    samples: &[TrainingSample],
    volume_r2: f64,
) -> TrainingReport {
    let n = samples.len().max(1) as f64;
    let mut abs_error = 0.0;
    let mut correct = 0usize;
    for sample in samples {
        let estimate = model.predict(&sample.features);
        abs_error += (estimate.volume_liters - sample.actual_volume_liters).abs();
        if estimate.electrolyte_level == sample.actual_electrolyte {
            correct += 1;
        }
    }
    TrainingReport {
        volume_mae: abs_error / n,
        electrolyte_accuracy: correct as f64 / n,
        sample_count: samples.len(),
        volume_r2,
    }
}

/// Model persistence contract: bytes in, bytes out, format owned by the codec
pub trait ModelCodec {
    fn serialize(&self, model: &FittedModel) -> Result<Vec<u8>>;
    fn deserialize(&self, bytes: &[u8]) -> Result<FittedModel>;
}

/// JSON encoding of the fitted parameters
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonModelCodec;

impl ModelCodec for JsonModelCodec {
    fn serialize(&self, model: &FittedModel) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(model)?)
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<FittedModel> {
        let model: FittedModel = serde_json::from_slice(bytes)?;
        model.validate()?;
        Ok(model)
    }
}

/// Holds the currently served model and swaps it atomically
pub struct ModelAdapter<M = FittedModel> {
    config: ModelConfig,
    current: RwLock<Option<Arc<M>>>,
}

impl<M: HydrationModel> ModelAdapter<M> {
    pub fn new(config: ModelConfig) -> Self {
        Self {
            config,
            current: RwLock::new(None),
        }
    }

    pub fn with_model(config: ModelConfig, model: M) -> Self {
        Self {
            config,
            current: RwLock::new(Some(Arc::new(model))),
        }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn is_trained(&self) -> bool {
        self.current().is_some()
    }

    /// Snapshot of the model currently serving predictions
    pub fn current(&self) -> Option<Arc<M>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Swap in a new model, returning the one it replaced
    pub fn install(&self, model: M) -> Option<Arc<M>> {
        let mut slot = self.current.write().unwrap_or_else(PoisonError::into_inner);
        slot.replace(Arc::new(model))
    }

    /// Fails closed: `Untrained` when nothing is loaded
    pub fn predict(&self, features: &FeatureVector) -> ModelOutput {
        match self.current() {
            Some(model) => ModelOutput::Estimate(model.predict(features)),
            None => ModelOutput::Untrained,
        }
    }

    /// Prediction for callers that require the model
    pub fn predict_strict(&self, features: &FeatureVector) -> Result<ModelEstimate> {
        match self.predict(features) {
            ModelOutput::Estimate(estimate) => Ok(estimate),
            ModelOutput::Untrained => Err(HydrationError::ModelUnavailable),
        }
    }
}

impl ModelAdapter<FittedModel> {
    /// Fit with this adapter's settings without touching the serving model
    pub fn fit_candidate(&self, dataset: &[TrainingSample]) -> Result<(FittedModel, TrainingReport)> {
        if dataset.len() < self.config.min_samples {
            return Err(HydrationError::InsufficientData {
                required: self.config.min_samples,
                actual: dataset.len(),
            });
        }

        debug!(samples = dataset.len(), "Fitting hydration model");
        FittedModel::fit(dataset, self.config.ridge_alpha)
    }

    /// Fit a new model and swap it in. On error the previous model keeps serving.
    pub fn train(&self, dataset: &[TrainingSample]) -> Result<TrainingReport> {
        let (model, report) = self.fit_candidate(dataset)?;
        self.install(model);

        info!(
            samples = report.sample_count,
            volume_mae = report.volume_mae,
            electrolyte_accuracy = report.electrolyte_accuracy,
            "Hydration model trained and swapped in"
        );
        Ok(report)
    }

    pub fn export(&self, codec: &dyn ModelCodec) -> Result<Vec<u8>> {
        let model = self.current().ok_or(HydrationError::ModelUnavailable)?;
        codec.serialize(&model)
    }

    pub fn import(&self, codec: &dyn ModelCodec, bytes: &[u8]) -> Result<()> {
        let model = codec.deserialize(bytes)?;
        self.install(model);
        Ok(())
    }

    /// Write the current model as JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = self.export(&JsonModelCodec)?;
        std::fs::write(path, bytes)?;
        info!(path = %path.display(), "Model saved");
        Ok(())
    }

    /// Read a JSON model and swap it in
    pub fn load(&self, path: &Path) -> Result<()> {
        let bytes = std::fs::read(path)?;
        self.import(&JsonModelCodec, &bytes)?;
        info!(path = %path.display(), "Model loaded");
        Ok(())
    }
}
