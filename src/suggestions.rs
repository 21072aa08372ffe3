//! Rule triggers, their reasons and advisory texts for future workouts

use serde::{Deserialize, Serialize};

/// Rule that fired during evaluation, in fixed evaluation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Trigger {
    WeightLoss,
    Heat,
    Intensity,
    SodiumLoss,
}

impl Trigger {
    pub const ORDER: [Trigger; 4] = [
        Trigger::WeightLoss,
        Trigger::Heat,
        Trigger::Intensity,
        Trigger::SodiumLoss,
    ];

    pub fn reason(&self) -> &'static str {
        match self {
            Trigger::WeightLoss => "Significant weight loss",
            Trigger::Heat => "High temperature",
            Trigger::Intensity => "High intensity",
            Trigger::SodiumLoss => "Electrolyte replacement needed due to sodium loss",
        }
    }
}

pub const NEUTRAL_REASON: &str = "No significant hydration deficit detected.";

pub const NEUTRAL_SUGGESTION: &str = "Continue current hydration routine";

/// Advisory text tied to a trigger
#[derive(Debug, Clone)]
pub struct Suggestion {
    pub trigger: Trigger,
    pub text: &'static str,
}

pub const SUGGESTIONS: &[Suggestion] = &[
    Suggestion {
        trigger: Trigger::WeightLoss,
        text: "High fluid loss detected - monitor hydration throughout the workout",
    },
    Suggestion {
        trigger: Trigger::WeightLoss,
        text: "Weigh yourself before and after long sessions to learn your sweat rate",
    },
    Suggestion {
        trigger: Trigger::Heat,
        text: "Consider pre-hydration before workouts in hot conditions",
    },
    Suggestion {
        trigger: Trigger::Intensity,
        text: "For high-intensity workouts, consider carrying hydration during exercise",
    },
    Suggestion {
        trigger: Trigger::SodiumLoss,
        text: "Add a sodium source to drinks for sessions of similar effort",
    },
];

/// Suggestions for one trigger, in table order
pub fn suggestions_for(trigger: Trigger) -> impl Iterator<Item = &'static str> {
    SUGGESTIONS
        .iter()
        .filter(move |s| s.trigger == trigger)
        .map(|s| s.text)
}
