//! Athlete physiological profile

use serde::{Deserialize, Serialize};

use crate::error::{HydrationError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
    #[serde(rename = "other")]
    Other,
}

impl Gender {
    pub fn code(&self) -> &'static str {
        match self {
            Gender::Male => "M",
            Gender::Female => "F",
            Gender::Other => "other",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "M" | "m" => Some(Gender::Male),
            "F" | "f" => Some(Gender::Female),
            "other" | "Other" => Some(Gender::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityLevel {
    Recreational,
    Competitive,
    Elite,
}

impl ActivityLevel {
    /// Ordinal encoding used by the model (0-2)
    pub fn ordinal(&self) -> u8 {
        match self {
            ActivityLevel::Recreational => 0,
            ActivityLevel::Competitive => 1,
            ActivityLevel::Elite => 2,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ActivityLevel::Recreational => "recreational",
            ActivityLevel::Competitive => "competitive",
            ActivityLevel::Elite => "elite",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "recreational" => Some(ActivityLevel::Recreational),
            "competitive" => Some(ActivityLevel::Competitive),
            "elite" => Some(ActivityLevel::Elite),
            _ => None,
        }
    }
}

/// Validated athlete profile. Updates return a new profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AthleteProfile {
    pub age: u32,
    pub gender: Gender,
    pub weight_kg: f64,
    pub height_cm: f64,
    pub activity_level: ActivityLevel,
    pub baseline_heart_rate: u32,
    /// Personal sweat rate from a lab test, if the athlete has one
    pub known_sweat_rate_lph: Option<f64>,
}

impl AthleteProfile {
    pub fn new(
        age: u32,
        gender: Gender,
        weight_kg: f64,
        height_cm: f64,
        activity_level: ActivityLevel,
        baseline_heart_rate: u32,
    ) -> Result<Self> {
        let profile = Self {
            age,
            gender,
            weight_kg,
            height_cm,
            activity_level,
            baseline_heart_rate,
            known_sweat_rate_lph: None,
        };
        profile.validate()?;
        Ok(profile)
    }

    pub fn with_weight_kg(&self, weight_kg: f64) -> Result<Self> {
        let updated = Self { weight_kg, ..self.clone() };
        updated.validate()?;
        Ok(updated)
    }

    pub fn with_baseline_heart_rate(&self, baseline_heart_rate: u32) -> Result<Self> {
        let updated = Self { baseline_heart_rate, ..self.clone() };
        updated.validate()?;
        Ok(updated)
    }

    pub fn with_known_sweat_rate(&self, sweat_rate_lph: Option<f64>) -> Result<Self> {
        let updated = Self { known_sweat_rate_lph: sweat_rate_lph, ..self.clone() };
        updated.validate()?;
        Ok(updated)
    }

    pub fn validate(&self) -> Result<()> {
        if !(10..=100).contains(&self.age) {
            return Err(HydrationError::validation("age", "must be within 10-100"));
        }
        if !(self.weight_kg.is_finite() && self.weight_kg > 0.0) {
            return Err(HydrationError::validation("weight_kg", "must be > 0"));
        }
        if !(self.height_cm.is_finite() && self.height_cm > 0.0) {
            return Err(HydrationError::validation("height_cm", "must be > 0"));
        }
        if self.baseline_heart_rate == 0 {
            return Err(HydrationError::validation("baseline_heart_rate", "must be > 0"));
        }
        if let Some(rate) = self.known_sweat_rate_lph
            && !(rate.is_finite() && rate > 0.0)
        {
            return Err(HydrationError::validation("known_sweat_rate_lph", "must be > 0"));
        }
        Ok(())
    }
}
