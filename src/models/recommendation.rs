//! Hydration recommendation value object

use std::fmt;

use serde::{Deserialize, Serialize};

/// Electrolyte concentration of the recommended drink
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElectrolyteLevel {
    None,
    Low,
    Medium,
    High,
}

impl ElectrolyteLevel {
    pub const ALL: [ElectrolyteLevel; 4] = [
        ElectrolyteLevel::None,
        ElectrolyteLevel::Low,
        ElectrolyteLevel::Medium,
        ElectrolyteLevel::High,
    ];

    pub fn ordinal(&self) -> u8 {
        match self {
            ElectrolyteLevel::None => 0,
            ElectrolyteLevel::Low => 1,
            ElectrolyteLevel::Medium => 2,
            ElectrolyteLevel::High => 3,
        }
    }

    /// One level higher, saturating at `High`
    pub fn step_up(&self) -> Self {
        match self {
            ElectrolyteLevel::None => ElectrolyteLevel::Low,
            ElectrolyteLevel::Low => ElectrolyteLevel::Medium,
            ElectrolyteLevel::Medium | ElectrolyteLevel::High => ElectrolyteLevel::High,
        }
    }

    /// Map a continuous model score onto the ordinal scale
    pub fn from_score(score: f64) -> Self {
        if score >= 2.5 {
            ElectrolyteLevel::High
        } else if score >= 1.5 {
            ElectrolyteLevel::Medium
        } else if score >= 0.5 {
            ElectrolyteLevel::Low
        } else {
            ElectrolyteLevel::None
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ElectrolyteLevel::None => "none",
            ElectrolyteLevel::Low => "low",
            ElectrolyteLevel::Medium => "medium",
            ElectrolyteLevel::High => "high",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|level| level.name() == name.to_lowercase())
    }

    fn drink(&self) -> &'static str {
        match self {
            ElectrolyteLevel::None => "water",
            ElectrolyteLevel::Low => "low-sodium electrolyte drink",
            ElectrolyteLevel::Medium => "medium-sodium electrolyte drink",
            ElectrolyteLevel::High => "high-sodium electrolyte drink",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timing {
    During,
    Within30Min,
    Within2Hr,
}

impl Timing {
    fn phrase(&self) -> &'static str {
        match self {
            Timing::During => "during the workout",
            Timing::Within30Min => "within 30 minutes post-workout",
            Timing::Within2Hr => "within 2 hours post-workout",
        }
    }
}

/// Which strategy produced a recommendation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecommendationSource {
    RuleBased,
    MlBlended {
        rule_volume_liters: f64,
        model_volume_liters: f64,
        confidence: f64,
    },
}

impl RecommendationSource {
    pub fn is_blended(&self) -> bool {
        matches!(self, RecommendationSource::MlBlended { .. })
    }
}

/// Actionable hydration recommendation. Built fresh per evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    /// Liters, rounded to 2 decimals
    pub volume_liters: f64,
    pub electrolyte_level: ElectrolyteLevel,
    pub timing: Timing,
    /// In rule evaluation order
    pub reasons: Vec<String>,
    pub future_suggestions: Vec<String>,
    pub source: RecommendationSource,
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Recommended: {:.2} L of {} {}.",
            self.volume_liters,
            self.electrolyte_level.drink(),
            self.timing.phrase()
        )?;
        if !self.reasons.is_empty() {
            write!(f, "\nReason: {}", self.reasons.join("; "))?;
        }
        if !self.future_suggestions.is_empty() {
            write!(f, "\nFuture suggestions:")?;
            for suggestion in &self.future_suggestions {
                write!(f, "\n- {}", suggestion)?;
            }
        }
        Ok(())
    }
}

/// Round to 2 decimals
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
