//! Workout observations, conditions and completed workout records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::recommendation::{ElectrolyteLevel, Recommendation};
use crate::error::{HydrationError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkoutType {
    Distance,
    Sprint,
    Field,
    Other,
}

impl WorkoutType {
    pub fn name(&self) -> &'static str {
        match self {
            WorkoutType::Distance => "distance",
            WorkoutType::Sprint => "sprint",
            WorkoutType::Field => "field",
            WorkoutType::Other => "other",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "distance" => Some(WorkoutType::Distance),
            "sprint" => Some(WorkoutType::Sprint),
            "field" => Some(WorkoutType::Field),
            "other" => Some(WorkoutType::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntensityLevel {
    Low,
    Medium,
    High,
}

impl IntensityLevel {
    /// Ordinal score (0-2)
    pub fn score(&self) -> u8 {
        match self {
            IntensityLevel::Low => 0,
            IntensityLevel::Medium => 1,
            IntensityLevel::High => 2,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "low" => Some(IntensityLevel::Low),
            "medium" | "moderate" => Some(IntensityLevel::Medium),
            "high" => Some(IntensityLevel::High),
            _ => None,
        }
    }
}

/// One observation of a workout: initial, intermediate or final.
///
/// Weights and fluid intake are cumulative since the start of the workout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutMetrics {
    pub duration_minutes: f64,
    pub average_heart_rate_bpm: u32,
    pub pre_workout_weight_kg: f64,
    pub post_workout_weight_kg: f64,
    pub fluid_intake_liters: f64,
    pub workout_type: WorkoutType,
    pub distance_km: Option<f64>,
    /// Inferred from heart-rate reserve when absent
    pub intensity_level: Option<IntensityLevel>,
}

impl WorkoutMetrics {
    pub fn weight_loss_kg(&self) -> f64 {
        self.pre_workout_weight_kg - self.post_workout_weight_kg
    }

    /// Liters still to replace (1 kg of body mass ~ 1 L of fluid), floored at 0
    pub fn fluid_deficit_liters(&self) -> f64 {
        (self.weight_loss_kg() - self.fluid_intake_liters).max(0.0)
    }

    /// Weight loss per hour, undefined for zero-length workouts
    pub fn sweat_rate_lph(&self) -> Option<f64> {
        if self.duration_minutes > 0.0 {
            Some(self.weight_loss_kg() / (self.duration_minutes / 60.0))
        } else {
            None
        }
    }

    /// Post weight above pre weight is kept but flagged.
    pub fn has_weight_gain(&self) -> bool {
        self.post_workout_weight_kg > self.pre_workout_weight_kg
    }

    /// The same workout at minute zero: nothing lost, nothing drunk yet
    pub fn starting_point(&self) -> Self {
        Self {
            duration_minutes: 0.0,
            post_workout_weight_kg: self.pre_workout_weight_kg,
            fluid_intake_liters: 0.0,
            distance_km: self.distance_km.map(|_| 0.0),
            ..self.clone()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.duration_minutes.is_finite() && self.duration_minutes >= 0.0) {
            return Err(HydrationError::validation("duration_minutes", "must be >= 0"));
        }
        if self.average_heart_rate_bpm == 0 || self.average_heart_rate_bpm > 250 {
            return Err(HydrationError::validation(
                "average_heart_rate_bpm",
                "must be within 1-250",
            ));
        }
        if !(self.pre_workout_weight_kg.is_finite() && self.pre_workout_weight_kg > 0.0) {
            return Err(HydrationError::validation("pre_workout_weight_kg", "must be > 0"));
        }
        if !(self.post_workout_weight_kg.is_finite() && self.post_workout_weight_kg > 0.0) {
            return Err(HydrationError::validation("post_workout_weight_kg", "must be > 0"));
        }
        if !(self.fluid_intake_liters.is_finite() && self.fluid_intake_liters >= 0.0) {
            return Err(HydrationError::validation("fluid_intake_liters", "must be >= 0"));
        }
        if let Some(distance) = self.distance_km
            && !(distance.is_finite() && distance >= 0.0)
        {
            return Err(HydrationError::validation("distance_km", "must be >= 0"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    Indoor,
    Outdoor,
}

/// Conditions during a workout. Absent altogether when unknown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentalData {
    pub temperature_fahrenheit: f64,
    pub humidity_percent: f64,
    pub location: Location,
    pub wind_speed_mph: Option<f64>,
}

impl EnvironmentalData {
    pub fn new(temperature_fahrenheit: f64, humidity_percent: f64, location: Location) -> Self {
        Self {
            temperature_fahrenheit,
            humidity_percent,
            location,
            wind_speed_mph: None,
        }
    }

    pub fn temperature_celsius(&self) -> f64 {
        (self.temperature_fahrenheit - 32.0) * 5.0 / 9.0
    }

    /// Simplified apparent temperature in Celsius
    pub fn heat_index_c(&self) -> f64 {
        let temp_c = self.temperature_celsius();
        temp_c + 0.5 * (temp_c + 61.0) * ((self.humidity_percent - 68.0) / 100.0)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.temperature_fahrenheit.is_finite()
            && (-80.0..=150.0).contains(&self.temperature_fahrenheit))
        {
            return Err(HydrationError::validation(
                "temperature_fahrenheit",
                "must be within -80..150",
            ));
        }
        if !(0.0..=100.0).contains(&self.humidity_percent) {
            return Err(HydrationError::validation("humidity_percent", "must be within 0-100"));
        }
        if let Some(wind) = self.wind_speed_mph
            && !(wind.is_finite() && wind >= 0.0)
        {
            return Err(HydrationError::validation("wind_speed_mph", "must be >= 0"));
        }
        Ok(())
    }
}

/// What the athlete actually drank after the workout, reported later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HydrationOutcome {
    pub actual_volume_liters: f64,
    pub actual_electrolyte: ElectrolyteLevel,
}

impl HydrationOutcome {
    pub fn validate(&self) -> Result<()> {
        if !(self.actual_volume_liters.is_finite() && self.actual_volume_liters >= 0.0) {
            return Err(HydrationError::validation("actual_volume_liters", "must be >= 0"));
        }
        Ok(())
    }
}

/// Immutable record of a closed workout session, handed to persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutRecord {
    pub workout_id: String,
    pub athlete_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub observations: Vec<WorkoutMetrics>,
    pub environment: Option<EnvironmentalData>,
    pub recommendation: Recommendation,
    pub outcome: Option<HydrationOutcome>,
}

impl WorkoutRecord {
    /// Last observation, i.e. the metrics at the end of the workout
    pub fn final_metrics(&self) -> Option<&WorkoutMetrics> {
        self.observations.last()
    }

    pub fn with_outcome(&self, outcome: HydrationOutcome) -> Self {
        Self {
            outcome: Some(outcome),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_metrics(pre: f64, post: f64, intake: f64, minutes: f64) -> WorkoutMetrics {
        WorkoutMetrics {
            duration_minutes: minutes,
            average_heart_rate_bpm: 150,
            pre_workout_weight_kg: pre,
            post_workout_weight_kg: post,
            fluid_intake_liters: intake,
            workout_type: WorkoutType::Distance,
            distance_km: Some(10.0),
            intensity_level: None,
        }
    }

    #[test]
    fn test_fluid_deficit_subtracts_intake() {
        let metrics = create_metrics(70.0, 68.8, 0.5, 60.0);
        assert!((metrics.fluid_deficit_liters() - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_fluid_deficit_floored_at_zero() {
        let metrics = create_metrics(70.0, 69.8, 1.0, 60.0);
        assert_eq!(metrics.fluid_deficit_liters(), 0.0);
    }

    #[test]
    fn test_sweat_rate_undefined_for_zero_duration() {
        let metrics = create_metrics(70.0, 69.0, 0.0, 0.0);
        assert!(metrics.sweat_rate_lph().is_none());
    }

    #[test]
    fn test_sweat_rate_per_hour() {
        let metrics = create_metrics(70.0, 69.0, 0.0, 30.0);
        assert!((metrics.sweat_rate_lph().unwrap() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_weight_gain_flagged_not_rejected() {
        let metrics = create_metrics(70.0, 70.4, 0.0, 45.0);
        assert!(metrics.has_weight_gain());
        assert!(metrics.validate().is_ok());
    }

    #[test]
    fn test_negative_duration_rejected() {
        let metrics = create_metrics(70.0, 69.0, 0.0, -5.0);
        match metrics.validate().unwrap_err() {
            HydrationError::Validation { field, .. } => assert_eq!(field, "duration_minutes"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_humidity_out_of_range() {
        let env = EnvironmentalData::new(80.0, 120.0, Location::Outdoor);
        assert!(env.validate().is_err());
    }

    #[test]
    fn test_heat_index_rises_with_humidity() {
        let dry = EnvironmentalData::new(90.0, 20.0, Location::Outdoor);
        let humid = EnvironmentalData::new(90.0, 90.0, Location::Outdoor);
        assert!(humid.heat_index_c() > dry.heat_index_c());
    }

    #[test]
    fn test_outcome_volume_must_be_finite_and_non_negative() {
        let mut outcome = HydrationOutcome {
            actual_volume_liters: 0.0,
            actual_electrolyte: ElectrolyteLevel::Low,
        };
        assert!(outcome.validate().is_ok());

        for bad in [f64::NAN, f64::INFINITY, -5.0] {
            outcome.actual_volume_liters = bad;
            match outcome.validate().unwrap_err() {
                HydrationError::Validation { field, .. } => assert_eq!(field, "actual_volume_liters"),
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn test_starting_point_has_no_loss() {
        let start = create_metrics(70.0, 68.8, 0.5, 60.0).starting_point();
        assert_eq!(start.duration_minutes, 0.0);
        assert_eq!(start.weight_loss_kg(), 0.0);
        assert_eq!(start.fluid_intake_liters, 0.0);
        assert_eq!(start.distance_km, Some(0.0));
        assert!(start.validate().is_ok());
    }

    #[test]
    fn test_intensity_from_name_accepts_moderate() {
        assert_eq!(IntensityLevel::from_name("moderate"), Some(IntensityLevel::Medium));
        assert_eq!(IntensityLevel::from_name("extreme"), None);
    }
}
