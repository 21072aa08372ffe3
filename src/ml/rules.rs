//! Deterministic rule-based recommendation

use crate::config::RuleThresholds;
use crate::models::recommendation::round2;
use crate::models::{ElectrolyteLevel, IntensityLevel, Recommendation, RecommendationSource, Timing};
use crate::suggestions::{NEUTRAL_REASON, NEUTRAL_SUGGESTION, Trigger, suggestions_for};

use super::features::FeatureVector;

/// Heuristic engine over thresholds on weight loss, temperature, heart rate
/// and the sodium-loss proxy. Total over any valid feature vector.
#[derive(Debug, Clone, Default)]
pub struct RuleEngine {
    thresholds: RuleThresholds,
}

impl RuleEngine {
    pub fn new(thresholds: RuleThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &RuleThresholds {
        &self.thresholds
    }

    /// Rules that fire for these features, in evaluation order
    pub fn triggers(&self, features: &FeatureVector) -> Vec<Trigger> {
        let t = &self.thresholds;
        let mut triggers = Vec::new();

        if features.weight_loss_kg >= t.weight_loss_high_kg {
            triggers.push(Trigger::WeightLoss);
        }
        if features.temperature_f.is_some_and(|temp| temp >= t.hot_temperature_f) {
            triggers.push(Trigger::Heat);
        }
        if features.intensity == IntensityLevel::High
            || features.heart_rate_reserve_pct >= t.high_intensity_hrr_pct
        {
            triggers.push(Trigger::Intensity);
        }
        if features.sodium_loss_proxy() >= t.sodium_proxy_threshold {
            triggers.push(Trigger::SodiumLoss);
        }

        triggers
    }

    pub fn evaluate(&self, features: &FeatureVector) -> Recommendation {
        let t = &self.thresholds;
        let triggers = self.triggers(features);

        let mut volume_fraction = t.base_volume_fraction;
        let mut electrolyte_level = ElectrolyteLevel::None;
        let mut intensity_level = ElectrolyteLevel::None;

        for trigger in &triggers {
            match trigger {
                Trigger::WeightLoss => volume_fraction += t.weight_loss_boost_fraction,
                Trigger::Heat => {
                    volume_fraction += t.heat_boost_fraction;
                    electrolyte_level = electrolyte_level.max(ElectrolyteLevel::Medium);
                }
                Trigger::Intensity => {
                    intensity_level = ElectrolyteLevel::Low;
                    electrolyte_level = electrolyte_level.max(intensity_level);
                }
                // One step above what intensity alone implied
                Trigger::SodiumLoss => {
                    electrolyte_level = electrolyte_level.max(intensity_level.step_up());
                }
            }
        }

        let volume = (features.fluid_deficit_liters * volume_fraction)
            .max(t.min_volume_liters)
            .min(t.max_volume_liters);

        let (reasons, future_suggestions) = if triggers.is_empty() {
            (vec![NEUTRAL_REASON.to_string()], vec![NEUTRAL_SUGGESTION.to_string()])
        } else {
            let reasons = triggers.iter().map(|tr| tr.reason().to_string()).collect();
            let suggestions = triggers
                .iter()
                .flat_map(|tr| suggestions_for(*tr))
                .map(str::to_string)
                .collect();
            (reasons, suggestions)
        };

        Recommendation {
            volume_liters: round2(volume),
            electrolyte_level,
            timing: self.timing(features),
            reasons,
            future_suggestions,
            source: RecommendationSource::RuleBased,
        }
    }

    fn timing(&self, features: &FeatureVector) -> Timing {
        if features.in_progress {
            Timing::During
        } else if features.weight_loss_pct >= self.thresholds.urgent_weight_loss_pct {
            Timing::Within30Min
        } else {
            Timing::Within2Hr
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::features::FeatureExtractor;
    use crate::models::{
        ActivityLevel, AthleteProfile, EnvironmentalData, Gender, Location, WorkoutMetrics,
        WorkoutType,
    };

    fn create_profile() -> AthleteProfile {
        AthleteProfile::new(24, Gender::Male, 70.0, 178.0, ActivityLevel::Competitive, 60).unwrap()
    }

    fn create_metrics(loss: f64, hr: u32) -> WorkoutMetrics {
        WorkoutMetrics {
            duration_minutes: 60.0,
            average_heart_rate_bpm: hr,
            pre_workout_weight_kg: 70.0,
            post_workout_weight_kg: 70.0 - loss,
            fluid_intake_liters: 0.0,
            workout_type: WorkoutType::Distance,
            distance_km: Some(12.0),
            intensity_level: None,
        }
    }

    fn features(loss: f64, hr: u32, temp: Option<f64>) -> FeatureVector {
        let env = temp.map(|t| EnvironmentalData::new(t, 50.0, Location::Outdoor));
        FeatureExtractor::default()
            .extract(&create_profile(), &create_metrics(loss, hr), env.as_ref(), None)
            .unwrap()
    }

    #[test]
    fn test_worked_example_triggers_all_rules() {
        let rec = RuleEngine::default().evaluate(&features(1.20, 175, Some(85.0)));

        assert_eq!(
            rec.reasons,
            vec![
                "Significant weight loss",
                "High temperature",
                "High intensity",
                "Electrolyte replacement needed due to sodium loss",
            ]
        );
        assert_eq!(rec.electrolyte_level, ElectrolyteLevel::Medium);
        assert!((rec.volume_liters - 0.60).abs() < 1e-9, "volume {}", rec.volume_liters);
        assert_eq!(rec.source, RecommendationSource::RuleBased);
    }

    #[test]
    fn test_no_triggers_neutral() {
        let rec = RuleEngine::default().evaluate(&features(0.1, 90, Some(65.0)));

        assert_eq!(rec.reasons, vec![NEUTRAL_REASON]);
        assert_eq!(rec.future_suggestions, vec![NEUTRAL_SUGGESTION]);
        assert_eq!(rec.electrolyte_level, ElectrolyteLevel::None);
        assert_eq!(rec.volume_liters, 0.2);
        assert_eq!(rec.timing, Timing::Within2Hr);
    }

    #[test]
    fn test_unknown_temperature_is_neutral() {
        let engine = RuleEngine::default();
        let rec = engine.evaluate(&features(0.1, 90, None));
        assert!(!engine.triggers(&features(0.1, 90, None)).contains(&Trigger::Heat));
        assert_eq!(rec.electrolyte_level, ElectrolyteLevel::None);
    }

    #[test]
    fn test_heat_alone_raises_floor_to_medium() {
        let rec = RuleEngine::default().evaluate(&features(0.1, 90, Some(95.0)));
        assert_eq!(rec.reasons, vec!["High temperature"]);
        assert_eq!(rec.electrolyte_level, ElectrolyteLevel::Medium);
    }

    #[test]
    fn test_intensity_with_sodium_escalates() {
        // High intensity, no heat: low from intensity, medium from sodium loss
        let rec = RuleEngine::default().evaluate(&features(1.2, 175, Some(60.0)));
        assert_eq!(
            rec.reasons,
            vec![
                "Significant weight loss",
                "High intensity",
                "Electrolyte replacement needed due to sodium loss",
            ]
        );
        assert_eq!(rec.electrolyte_level, ElectrolyteLevel::Medium);
    }

    #[test]
    fn test_intensity_only_is_low() {
        let rec = RuleEngine::default().evaluate(&features(0.2, 175, None));
        assert_eq!(rec.reasons, vec!["High intensity"]);
        assert_eq!(rec.electrolyte_level, ElectrolyteLevel::Low);
    }

    #[test]
    fn test_timing_during_when_in_progress() {
        let mut f = features(1.2, 175, Some(85.0));
        f.in_progress = true;
        assert_eq!(RuleEngine::default().evaluate(&f).timing, Timing::During);
    }

    #[test]
    fn test_timing_urgent_after_large_loss() {
        // 1.5 kg of 70 kg > 2%
        let rec = RuleEngine::default().evaluate(&features(1.5, 150, None));
        assert_eq!(rec.timing, Timing::Within30Min);

        let rec = RuleEngine::default().evaluate(&features(0.5, 150, None));
        assert_eq!(rec.timing, Timing::Within2Hr);
    }

    #[test]
    fn test_volume_capped() {
        let rec = RuleEngine::default().evaluate(&features(9.0, 150, Some(100.0)));
        assert_eq!(rec.volume_liters, 3.0);
    }

    #[test]
    fn test_fluid_intake_reduces_volume() {
        let profile = create_profile();
        let mut metrics = create_metrics(1.2, 175);
        metrics.fluid_intake_liters = 0.4;
        let f = FeatureExtractor::default().extract(&profile, &metrics, None, None).unwrap();

        let with_intake = RuleEngine::default().evaluate(&f);
        let without = RuleEngine::default().evaluate(&features(1.2, 175, None));
        assert!(with_intake.volume_liters < without.volume_liters);
    }

    #[test]
    fn test_reasons_follow_rule_order() {
        let engine = RuleEngine::default();
        for loss in [0.0, 0.4, 0.8, 1.6] {
            for hr in [80, 130, 180] {
                for temp in [None, Some(60.0), Some(90.0)] {
                    let f = features(loss, hr, temp);
                    let triggers = engine.triggers(&f);
                    let mut sorted = triggers.clone();
                    sorted.sort();
                    assert_eq!(triggers, sorted);

                    let rec = engine.evaluate(&f);
                    assert!(rec.volume_liters >= 0.0);
                    if !triggers.is_empty() {
                        let expected: Vec<_> = triggers.iter().map(|t| t.reason()).collect();
                        assert_eq!(rec.reasons, expected);
                    }
                }
            }
        }
    }

    #[test]
    fn test_volume_monotonic_in_weight_loss() {
        let engine = RuleEngine::default();
        for temp in [None, Some(70.0), Some(92.0)] {
            for hr in [90, 140, 180] {
                let mut previous = 0.0;
                for step in 0..60 {
                    let loss = step as f64 * 0.05;
                    let volume = engine.evaluate(&features(loss, hr, temp)).volume_liters;
                    assert!(volume >= previous, "loss {} gave {} < {}", loss, volume, previous);
                    previous = volume;
                }
            }
        }
    }

    #[test]
    fn test_evaluate_is_idempotent() {
        let engine = RuleEngine::default();
        let f = features(1.2, 175, Some(85.0));
        assert_eq!(engine.evaluate(&f), engine.evaluate(&f));
    }

    #[test]
    fn test_weight_gain_never_negative_volume() {
        let rec = RuleEngine::default().evaluate(&features(-0.5, 150, None));
        assert!(rec.volume_liters >= 0.0);
        assert_eq!(rec.timing, Timing::Within2Hr);
    }

    #[test]
    fn test_suggestions_follow_triggers() {
        let rec = RuleEngine::default().evaluate(&features(1.2, 175, Some(85.0)));
        assert_eq!(rec.future_suggestions.len(), 5);
        assert!(rec.future_suggestions[0].starts_with("High fluid loss"));
        assert!(rec.future_suggestions[2].contains("pre-hydration"));
    }
}
