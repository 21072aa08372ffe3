//! Feature extraction from profile, observations, conditions and history

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::{FeatureConfig, RuleThresholds};
use crate::error::{HydrationError, Result};
use crate::models::{
    ActivityLevel, AthleteProfile, EnvironmentalData, IntensityLevel, Location, WorkoutMetrics,
    WorkoutRecord,
};

/// Number of numeric columns fed to the model
pub const MODEL_FEATURES: usize = 13;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemperatureBucket {
    Unknown,
    Cold,
    Mild,
    Warm,
    Hot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DurationBucket {
    Short,
    Moderate,
    Long,
}

/// Normalized summary of a workout at one point in time.
///
/// Optional fields are `None` when the underlying data is unknown; rules treat
/// them as neutral and the model sees them as zero with an indicator column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub weight_loss_kg: f64,
    pub weight_loss_pct: f64,
    pub fluid_intake_liters: f64,
    pub fluid_deficit_liters: f64,
    pub heart_rate_reserve_pct: f64,
    pub intensity: IntensityLevel,
    pub intensity_score: u8,
    pub intensity_inferred: bool,
    pub duration_minutes: f64,
    pub duration_bucket: DurationBucket,
    pub temperature_f: Option<f64>,
    pub temperature_bucket: TemperatureBucket,
    pub humidity_percent: Option<f64>,
    pub heat_index_c: Option<f64>,
    pub location: Option<Location>,
    pub sweat_rate_lph: Option<f64>,
    pub baseline_sweat_rate_lph: Option<f64>,
    pub sweat_rate_deviation: Option<f64>,
    /// Sweat rate over the latest interval minus the rate before it
    pub loss_acceleration_lph: Option<f64>,
    pub activity_level: ActivityLevel,
    pub weight_gain_flagged: bool,
    pub observation_count: usize,
    /// Workout still running (session open)
    pub in_progress: bool,
}

impl FeatureVector {
    /// weight_loss_pct x intensity_score
    pub fn sodium_loss_proxy(&self) -> f64 {
        self.weight_loss_pct * self.intensity_score as f64
    }

    /// Fixed-order numeric row for the regressors
    pub fn model_row(&self) -> [f64; MODEL_FEATURES] {
        [
            self.weight_loss_kg,
            self.weight_loss_pct,
            self.fluid_deficit_liters,
            self.heart_rate_reserve_pct,
            self.intensity_score as f64,
            self.duration_minutes / 60.0,
            self.temperature_f.map_or(0.0, |t| t - 70.0),
            if self.temperature_f.is_some() { 1.0 } else { 0.0 },
            self.humidity_percent.map_or(0.0, |h| h - 50.0),
            self.sweat_rate_lph.unwrap_or(0.0),
            self.sweat_rate_deviation.unwrap_or(0.0),
            self.activity_level.ordinal() as f64,
            self.loss_acceleration_lph.unwrap_or(0.0),
        ]
    }
}

/// Derives feature vectors. Pure: no I/O, no hidden state.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    config: FeatureConfig,
    /// Shared with the rule engine
    high_intensity_hrr_pct: f64,
    hot_temperature_f: f64,
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new(FeatureConfig::default(), &RuleThresholds::default())
    }
}

impl FeatureExtractor {
    pub fn new(config: FeatureConfig, rules: &RuleThresholds) -> Self {
        Self {
            config,
            high_intensity_hrr_pct: rules.high_intensity_hrr_pct,
            hot_temperature_f: rules.hot_temperature_f,
        }
    }

    /// Features for a single completed observation
    pub fn extract(
        &self,
        profile: &AthleteProfile,
        metrics: &WorkoutMetrics,
        environment: Option<&EnvironmentalData>,
        history: Option<&[WorkoutRecord]>,
    ) -> Result<FeatureVector> {
        self.extract_series(profile, std::slice::from_ref(metrics), environment, history, false)
    }

    /// Features over an ordered observation sequence; the last one is current.
    pub fn extract_series(
        &self,
        profile: &AthleteProfile,
        observations: &[WorkoutMetrics],
        environment: Option<&EnvironmentalData>,
        history: Option<&[WorkoutRecord]>,
        in_progress: bool,
    ) -> Result<FeatureVector> {
        profile.validate()?;
        for metrics in observations {
            metrics.validate()?;
        }
        for pair in observations.windows(2) {
            check_ordering(&pair[0], &pair[1])?;
        }
        if let Some(env) = environment {
            env.validate()?;
        }
        self.derive(profile, observations, environment, history, in_progress)
    }

    /// Like `extract_series`, for a sequence whose prefix was already
    /// accepted: only the last observation and its ordering are checked.
    pub fn extract_appended(
        &self,
        profile: &AthleteProfile,
        observations: &[WorkoutMetrics],
        environment: Option<&EnvironmentalData>,
        history: Option<&[WorkoutRecord]>,
        in_progress: bool,
    ) -> Result<FeatureVector> {
        match observations {
            [.., previous, current] => {
                current.validate()?;
                check_ordering(previous, current)?;
            }
            [current] => current.validate()?,
            [] => {}
        }
        self.derive(profile, observations, environment, history, in_progress)
    }

    fn derive(
        &self,
        profile: &AthleteProfile,
        observations: &[WorkoutMetrics],
        environment: Option<&EnvironmentalData>,
        history: Option<&[WorkoutRecord]>,
        in_progress: bool,
    ) -> Result<FeatureVector> {
        let Some(current) = observations.last() else {
            return Err(HydrationError::validation(
                "observations",
                "at least one observation is required",
            ));
        };

        if current.has_weight_gain() {
            warn!(
                pre = current.pre_workout_weight_kg,
                post = current.post_workout_weight_kg,
                "post-workout weight above pre-workout weight"
            );
        }

        let weight_loss_kg = current.weight_loss_kg();
        let weight_loss_pct = weight_loss_kg / current.pre_workout_weight_kg;

        let baseline = profile.baseline_heart_rate as f64;
        let heart_rate_reserve_pct = ((current.average_heart_rate_bpm as f64 - baseline) / baseline)
            .max(0.0)
            .min(self.config.max_heart_rate_reserve_pct);

        let (intensity, intensity_inferred) = match current.intensity_level {
            Some(level) => (level, false),
            None => (self.infer_intensity(heart_rate_reserve_pct), true),
        };

        let sweat_rate_lph = current.sweat_rate_lph();
        let baseline_sweat_rate_lph = history
            .and_then(|records| self.baseline_sweat_rate(records))
            .or(profile.known_sweat_rate_lph);
        let sweat_rate_deviation = match (sweat_rate_lph, baseline_sweat_rate_lph) {
            (Some(rate), Some(base)) if base > 0.0 => Some((rate - base) / base),
            _ => None,
        };

        Ok(FeatureVector {
            weight_loss_kg,
            weight_loss_pct,
            fluid_intake_liters: current.fluid_intake_liters,
            fluid_deficit_liters: current.fluid_deficit_liters(),
            heart_rate_reserve_pct,
            intensity,
            intensity_score: intensity.score(),
            intensity_inferred,
            duration_minutes: current.duration_minutes,
            duration_bucket: self.duration_bucket(current.duration_minutes),
            temperature_f: environment.map(|e| e.temperature_fahrenheit),
            temperature_bucket: self.temperature_bucket(environment),
            humidity_percent: environment.map(|e| e.humidity_percent),
            heat_index_c: environment.map(EnvironmentalData::heat_index_c),
            location: environment.map(|e| e.location),
            sweat_rate_lph,
            baseline_sweat_rate_lph,
            sweat_rate_deviation,
            loss_acceleration_lph: loss_acceleration(observations),
            activity_level: profile.activity_level,
            weight_gain_flagged: current.has_weight_gain(),
            observation_count: observations.len(),
            in_progress,
        })
    }

    fn infer_intensity(&self, heart_rate_reserve_pct: f64) -> IntensityLevel {
        if heart_rate_reserve_pct >= self.high_intensity_hrr_pct {
            IntensityLevel::High
        } else if heart_rate_reserve_pct >= self.config.medium_intensity_hrr_pct {
            IntensityLevel::Medium
        } else {
            IntensityLevel::Low
        }
    }

    fn temperature_bucket(&self, environment: Option<&EnvironmentalData>) -> TemperatureBucket {
        let Some(env) = environment else {
            return TemperatureBucket::Unknown;
        };
        let t = env.temperature_fahrenheit;
        if t >= self.hot_temperature_f {
            TemperatureBucket::Hot
        } else if t >= self.config.mild_temperature_f {
            TemperatureBucket::Warm
        } else if t >= self.config.cold_temperature_f {
            TemperatureBucket::Mild
        } else {
            TemperatureBucket::Cold
        }
    }

    fn duration_bucket(&self, minutes: f64) -> DurationBucket {
        if minutes < self.config.short_duration_minutes {
            DurationBucket::Short
        } else if minutes < self.config.long_duration_minutes {
            DurationBucket::Moderate
        } else {
            DurationBucket::Long
        }
    }

    /// Mean sweat rate over the most recent workouts with a positive rate
    fn baseline_sweat_rate(&self, history: &[WorkoutRecord]) -> Option<f64> {
        let mut records: Vec<_> = history.iter().collect();
        records.sort_by(|a, b| b.started_at.cmp(&a.started_at));

        let rates: Vec<f64> = records
            .iter()
            .filter_map(|r| r.final_metrics().and_then(WorkoutMetrics::sweat_rate_lph))
            .filter(|rate| *rate > 0.0)
            .take(self.config.history_window)
            .collect();

        if rates.is_empty() {
            None
        } else {
            Some(rates.iter().sum::<f64>() / rates.len() as f64)
        }
    }
}

fn check_ordering(previous: &WorkoutMetrics, next: &WorkoutMetrics) -> Result<()> {
    if next.duration_minutes < previous.duration_minutes {
        return Err(HydrationError::validation(
            "duration_minutes",
            "must not decrease across observations",
        ));
    }
    Ok(())
}

fn loss_acceleration(observations: &[WorkoutMetrics]) -> Option<f64> {
    let [.., previous, latest] = observations else {
        return None;
    };
    let interval_minutes = latest.duration_minutes - previous.duration_minutes;
    if interval_minutes <= 0.0 {
        return None;
    }
    let previous_rate = previous.sweat_rate_lph()?;
    let interval_loss = latest.weight_loss_kg() - previous.weight_loss_kg();
    let interval_rate = interval_loss / (interval_minutes / 60.0);
    Some(interval_rate - previous_rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    use crate::models::{
        ElectrolyteLevel, Gender, Recommendation, RecommendationSource, Timing, WorkoutType,
    };

    fn create_profile() -> AthleteProfile {
        AthleteProfile::new(28, Gender::Male, 70.0, 180.0, ActivityLevel::Competitive, 60).unwrap()
    }

    fn create_metrics(post: f64, minutes: f64, hr: u32) -> WorkoutMetrics {
        WorkoutMetrics {
            duration_minutes: minutes,
            average_heart_rate_bpm: hr,
            pre_workout_weight_kg: 70.0,
            post_workout_weight_kg: post,
            fluid_intake_liters: 0.0,
            workout_type: WorkoutType::Distance,
            distance_km: None,
            intensity_level: None,
        }
    }

    fn create_record(post: f64, minutes: f64, days_ago: i64) -> WorkoutRecord {
        let started_at = Utc::now() - Duration::days(days_ago);
        WorkoutRecord {
            workout_id: format!("w-{}", days_ago),
            athlete_id: "a1".to_string(),
            started_at,
            ended_at: started_at + Duration::minutes(minutes as i64),
            observations: vec![create_metrics(post, minutes, 150)],
            environment: None,
            recommendation: Recommendation {
                volume_liters: 0.2,
                electrolyte_level: ElectrolyteLevel::None,
                timing: Timing::Within2Hr,
                reasons: vec![],
                future_suggestions: vec![],
                source: RecommendationSource::RuleBased,
            },
            outcome: None,
        }
    }

    #[test]
    fn test_basic_derivations() {
        let extractor = FeatureExtractor::default();
        let f = extractor
            .extract(&create_profile(), &create_metrics(68.8, 60.0, 175), None, None)
            .unwrap();

        assert!((f.weight_loss_kg - 1.2).abs() < 1e-9);
        assert!((f.weight_loss_pct - 1.2 / 70.0).abs() < 1e-9);
        assert!((f.heart_rate_reserve_pct - 115.0 / 60.0).abs() < 1e-9);
        assert!((f.sweat_rate_lph.unwrap() - 1.2).abs() < 1e-9);
        assert_eq!(f.duration_bucket, DurationBucket::Moderate);
        assert!(!f.in_progress);
    }

    #[test]
    fn test_missing_environment_is_unknown() {
        let extractor = FeatureExtractor::default();
        let f = extractor
            .extract(&create_profile(), &create_metrics(69.5, 45.0, 140), None, None)
            .unwrap();

        assert_eq!(f.temperature_bucket, TemperatureBucket::Unknown);
        assert!(f.temperature_f.is_none());
        assert!(f.humidity_percent.is_none());
        assert!(f.heat_index_c.is_none());
        assert!(f.location.is_none());
    }

    #[test]
    fn test_temperature_buckets() {
        let extractor = FeatureExtractor::default();
        let profile = create_profile();
        let metrics = create_metrics(69.5, 45.0, 140);
        let bucket = |temp: f64| {
            let env = EnvironmentalData::new(temp, 40.0, Location::Outdoor);
            extractor
                .extract(&profile, &metrics, Some(&env), None)
                .unwrap()
                .temperature_bucket
        };

        assert_eq!(bucket(40.0), TemperatureBucket::Cold);
        assert_eq!(bucket(60.0), TemperatureBucket::Mild);
        assert_eq!(bucket(75.0), TemperatureBucket::Warm);
        assert_eq!(bucket(85.0), TemperatureBucket::Hot);
    }

    #[test]
    fn test_intensity_inferred_from_heart_rate() {
        let extractor = FeatureExtractor::default();
        let profile = create_profile();

        let high = extractor.extract(&profile, &create_metrics(69.0, 60.0, 175), None, None).unwrap();
        assert_eq!(high.intensity, IntensityLevel::High);
        assert!(high.intensity_inferred);

        let medium = extractor.extract(&profile, &create_metrics(69.0, 60.0, 130), None, None).unwrap();
        assert_eq!(medium.intensity, IntensityLevel::Medium);

        let low = extractor.extract(&profile, &create_metrics(69.0, 60.0, 90), None, None).unwrap();
        assert_eq!(low.intensity, IntensityLevel::Low);
    }

    #[test]
    fn test_explicit_intensity_kept() {
        let extractor = FeatureExtractor::default();
        let mut metrics = create_metrics(69.0, 60.0, 175);
        metrics.intensity_level = Some(IntensityLevel::Low);

        let f = extractor.extract(&create_profile(), &metrics, None, None).unwrap();
        assert_eq!(f.intensity, IntensityLevel::Low);
        assert_eq!(f.intensity_score, 0);
        assert!(!f.intensity_inferred);
    }

    #[test]
    fn test_heart_rate_reserve_clamped() {
        let extractor = FeatureExtractor::default();
        let profile = create_profile().with_baseline_heart_rate(40).unwrap();

        let f = extractor.extract(&profile, &create_metrics(69.0, 60.0, 220), None, None).unwrap();
        assert_eq!(f.heart_rate_reserve_pct, 3.0);

        let f = extractor.extract(&profile, &create_metrics(69.0, 60.0, 30), None, None).unwrap();
        assert_eq!(f.heart_rate_reserve_pct, 0.0);
    }

    #[test]
    fn test_zero_duration_sweat_rate_unknown() {
        let extractor = FeatureExtractor::default();
        let f = extractor.extract(&create_profile(), &create_metrics(70.0, 0.0, 90), None, None).unwrap();
        assert!(f.sweat_rate_lph.is_none());
        assert_eq!(f.duration_bucket, DurationBucket::Short);
    }

    #[test]
    fn test_negative_duration_fails_with_field() {
        let extractor = FeatureExtractor::default();
        let err = extractor
            .extract(&create_profile(), &create_metrics(69.0, -1.0, 150), None, None)
            .unwrap_err();
        match err {
            HydrationError::Validation { field, .. } => assert_eq!(field, "duration_minutes"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_no_history_is_unknown_not_zero() {
        let extractor = FeatureExtractor::default();
        let profile = create_profile();
        let metrics = create_metrics(69.0, 60.0, 150);

        let none = extractor.extract(&profile, &metrics, None, None).unwrap();
        assert!(none.baseline_sweat_rate_lph.is_none());
        assert!(none.sweat_rate_deviation.is_none());

        let empty = extractor.extract(&profile, &metrics, None, Some(&[])).unwrap();
        assert!(empty.baseline_sweat_rate_lph.is_none());
    }

    #[test]
    fn test_history_baseline_and_deviation() {
        let extractor = FeatureExtractor::default();
        let history = vec![
            create_record(69.0, 60.0, 3), // 1.0 L/h
            create_record(69.5, 60.0, 2), // 0.5 L/h
        ];

        let f = extractor
            .extract(&create_profile(), &create_metrics(68.5, 60.0, 150), None, Some(&history))
            .unwrap();

        assert!((f.baseline_sweat_rate_lph.unwrap() - 0.75).abs() < 1e-9);
        // 1.5 L/h vs 0.75 baseline
        assert!((f.sweat_rate_deviation.unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_history_window_uses_most_recent() {
        let config = FeatureConfig { history_window: 1, ..FeatureConfig::default() };
        let extractor = FeatureExtractor::new(config, &RuleThresholds::default());
        let history = vec![create_record(69.0, 60.0, 10), create_record(69.5, 60.0, 1)];

        let f = extractor
            .extract(&create_profile(), &create_metrics(69.0, 60.0, 150), None, Some(&history))
            .unwrap();
        assert!((f.baseline_sweat_rate_lph.unwrap() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_known_sweat_rate_used_without_history() {
        let extractor = FeatureExtractor::default();
        let profile = create_profile().with_known_sweat_rate(Some(2.0)).unwrap();
        let f = extractor.extract(&profile, &create_metrics(69.0, 60.0, 150), None, None).unwrap();

        assert_eq!(f.baseline_sweat_rate_lph, Some(2.0));
        assert!((f.sweat_rate_deviation.unwrap() + 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_series_detects_acceleration() {
        let extractor = FeatureExtractor::default();
        let observations = vec![
            create_metrics(69.7, 30.0, 150), // 0.6 L/h
            create_metrics(69.1, 60.0, 160), // interval: 0.6 kg in 30 min = 1.2 L/h
        ];

        let f = extractor
            .extract_series(&create_profile(), &observations, None, None, true)
            .unwrap();

        assert!((f.loss_acceleration_lph.unwrap() - 0.6).abs() < 1e-9);
        assert_eq!(f.observation_count, 2);
        assert!(f.in_progress);
    }

    #[test]
    fn test_series_rejects_decreasing_duration() {
        let extractor = FeatureExtractor::default();
        let observations = vec![create_metrics(69.5, 40.0, 150), create_metrics(69.0, 20.0, 150)];
        let err = extractor
            .extract_series(&create_profile(), &observations, None, None, true)
            .unwrap_err();
        assert!(matches!(err, HydrationError::Validation { field: "duration_minutes", .. }));
    }

    #[test]
    fn test_appended_matches_full_series() {
        let extractor = FeatureExtractor::default();
        let history = vec![create_record(69.0, 60.0, 3)];
        let observations = vec![
            create_metrics(69.8, 20.0, 140),
            create_metrics(69.5, 40.0, 150),
            create_metrics(69.0, 60.0, 165),
        ];

        let full = extractor
            .extract_series(&create_profile(), &observations, None, Some(history.as_slice()), true)
            .unwrap();
        let appended = extractor
            .extract_appended(&create_profile(), &observations, None, Some(history.as_slice()), true)
            .unwrap();
        assert_eq!(full, appended);
    }

    #[test]
    fn test_appended_checks_latest_observation() {
        let extractor = FeatureExtractor::default();
        let profile = create_profile();

        let backwards = vec![create_metrics(69.5, 40.0, 150), create_metrics(69.0, 20.0, 150)];
        let err = extractor
            .extract_appended(&profile, &backwards, None, None, true)
            .unwrap_err();
        assert!(matches!(err, HydrationError::Validation { field: "duration_minutes", .. }));

        let bad_heart_rate = vec![create_metrics(69.5, 40.0, 150), create_metrics(69.0, 50.0, 0)];
        assert!(extractor.extract_appended(&profile, &bad_heart_rate, None, None, true).is_err());
        assert!(extractor.extract_appended(&profile, &[], None, None, true).is_err());
    }

    #[test]
    fn test_empty_series_rejected() {
        let extractor = FeatureExtractor::default();
        let result = extractor.extract_series(&create_profile(), &[], None, None, false);
        assert!(result.is_err());
    }

    #[test]
    fn test_weight_gain_flagged() {
        let extractor = FeatureExtractor::default();
        let f = extractor.extract(&create_profile(), &create_metrics(70.3, 60.0, 150), None, None).unwrap();
        assert!(f.weight_gain_flagged);
        assert!(f.weight_loss_kg < 0.0);
        assert_eq!(f.fluid_deficit_liters, 0.0);
    }

    #[test]
    fn test_model_row_unknown_environment_zeroed() {
        let extractor = FeatureExtractor::default();
        let f = extractor.extract(&create_profile(), &create_metrics(69.0, 60.0, 150), None, None).unwrap();
        let row = f.model_row();

        assert_eq!(row.len(), MODEL_FEATURES);
        assert_eq!(row[6], 0.0);
        assert_eq!(row[7], 0.0);
        assert_eq!(row[8], 0.0);
    }
}
