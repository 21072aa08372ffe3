//! Value objects: athlete, workout observations, conditions, recommendations

pub mod athlete;
pub mod recommendation;
pub mod workout;

pub use athlete::{ActivityLevel, AthleteProfile, Gender};
pub use recommendation::{ElectrolyteLevel, Recommendation, RecommendationSource, Timing};
pub use workout::{
    EnvironmentalData, HydrationOutcome, IntensityLevel, Location, WorkoutMetrics, WorkoutRecord,
    WorkoutType,
};
