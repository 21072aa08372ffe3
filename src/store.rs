//! Collaborator interfaces: athlete registry, workout history, weather
//!
//! `MemoryStore` implements the registry and history traits in memory; the
//! SQLite-backed `Database` implements them on disk.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::warn;

use crate::error::{HydrationError, Result};
use crate::models::{AthleteProfile, EnvironmentalData, HydrationOutcome, WorkoutRecord};

/// Looks up registered athletes
pub trait AthleteRegistry: Send + Sync {
    fn lookup(&self, athlete_id: &str) -> Result<Option<AthleteProfile>>;
}

/// Completed workouts per athlete
pub trait HistoryStore: Send + Sync {
    fn fetch_history(&self, athlete_id: &str) -> Result<Vec<WorkoutRecord>>;
}

#[derive(Debug, Error)]
#[error("weather data unavailable: {0}")]
pub struct WeatherUnavailable(pub String);

/// Source of environmental conditions for a place and time
pub trait WeatherService {
    fn fetch(
        &self,
        location: &str,
        time: DateTime<Utc>,
    ) -> std::result::Result<EnvironmentalData, WeatherUnavailable>;
}

/// Conditions if the weather service has them, otherwise unknown
pub fn environment_or_unknown(
    service: &dyn WeatherService,
    location: &str,
    time: DateTime<Utc>,
) -> Option<EnvironmentalData> {
    match service.fetch(location, time) {
        Ok(env) => Some(env),
        Err(e) => {
            warn!(location, error = %e, "Continuing without environmental data");
            None
        }
    }
}

/// In-memory registry and history
#[derive(Debug, Default)]
pub struct MemoryStore {
    athletes: RwLock<HashMap<String, AthleteProfile>>,
    workouts: RwLock<Vec<WorkoutRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, athlete_id: &str, profile: AthleteProfile) -> Result<()> {
        profile.validate()?;
        self.athletes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(athlete_id.to_string(), profile);
        Ok(())
    }

    pub fn add_workout(&self, record: WorkoutRecord) {
        self.workouts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }

    /// Attach the athlete's reported outcome to a stored workout
    pub fn record_outcome(&self, workout_id: &str, outcome: HydrationOutcome) -> Result<()> {
        outcome.validate()?;
        let mut workouts = self.workouts.write().unwrap_or_else(PoisonError::into_inner);
        let record = workouts
            .iter_mut()
            .find(|r| r.workout_id == workout_id)
            .ok_or_else(|| HydrationError::Storage(format!("workout {} not found", workout_id)))?;
        *record = record.with_outcome(outcome);
        Ok(())
    }

    pub fn all_workouts(&self) -> Vec<WorkoutRecord> {
        self.workouts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl AthleteRegistry for MemoryStore {
    fn lookup(&self, athlete_id: &str) -> Result<Option<AthleteProfile>> {
        Ok(self
            .athletes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(athlete_id)
            .cloned())
    }
}

impl HistoryStore for MemoryStore {
    fn fetch_history(&self, athlete_id: &str) -> Result<Vec<WorkoutRecord>> {
        Ok(self
            .workouts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|r| r.athlete_id == athlete_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ActivityLevel, ElectrolyteLevel, Gender, Location, Recommendation, RecommendationSource,
        Timing,
    };

    fn create_profile() -> AthleteProfile {
        AthleteProfile::new(35, Gender::Female, 58.0, 165.0, ActivityLevel::Recreational, 65).unwrap()
    }

    fn create_record(id: &str, athlete: &str) -> WorkoutRecord {
        WorkoutRecord {
            workout_id: id.to_string(),
            athlete_id: athlete.to_string(),
            started_at: Utc::now(),
            ended_at: Utc::now(),
            observations: vec![],
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

    struct Offline;

    impl WeatherService for Offline {
        fn fetch(&self, location: &str, _time: DateTime<Utc>) -> std::result::Result<EnvironmentalData, WeatherUnavailable> {
            Err(WeatherUnavailable(format!("no data for {}", location)))
        }
    }

    struct Sunny;

    impl WeatherService for Sunny {
        fn fetch(&self, _location: &str, _time: DateTime<Utc>) -> std::result::Result<EnvironmentalData, WeatherUnavailable> {
            Ok(EnvironmentalData::new(88.0, 60.0, Location::Outdoor))
        }
    }

    #[test]
    fn test_lookup_registered_athlete() {
        let store = MemoryStore::new();
        store.register("ath-1", create_profile()).unwrap();

        assert_eq!(store.lookup("ath-1").unwrap(), Some(create_profile()));
        assert_eq!(store.lookup("ath-2").unwrap(), None);
    }

    #[test]
    fn test_history_filtered_by_athlete() {
        let store = MemoryStore::new();
        store.add_workout(create_record("w1", "ath-1"));
        store.add_workout(create_record("w2", "ath-2"));
        store.add_workout(create_record("w3", "ath-1"));

        let history = store.fetch_history("ath-1").unwrap();
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|r| r.athlete_id == "ath-1"));
    }

    #[test]
    fn test_record_outcome() {
        let store = MemoryStore::new();
        store.add_workout(create_record("w1", "ath-1"));
        let outcome = HydrationOutcome {
            actual_volume_liters: 0.8,
            actual_electrolyte: ElectrolyteLevel::Low,
        };

        store.record_outcome("w1", outcome.clone()).unwrap();
        assert_eq!(store.all_workouts()[0].outcome, Some(outcome.clone()));
        assert!(store.record_outcome("missing", outcome).is_err());
    }

    #[test]
    fn test_record_outcome_rejects_negative_volume() {
        let store = MemoryStore::new();
        store.add_workout(create_record("w1", "ath-1"));
        let outcome = HydrationOutcome {
            actual_volume_liters: -0.2,
            actual_electrolyte: ElectrolyteLevel::Low,
        };

        let err = store.record_outcome("w1", outcome).unwrap_err();
        assert!(matches!(err, HydrationError::Validation { .. }));
        assert!(store.all_workouts()[0].outcome.is_none());
    }

    #[test]
    fn test_unavailable_weather_is_unknown() {
        assert!(environment_or_unknown(&Offline, "Boulder", Utc::now()).is_none());
        let env = environment_or_unknown(&Sunny, "Boulder", Utc::now()).unwrap();
        assert_eq!(env.temperature_fahrenheit, 88.0);
    }
}
