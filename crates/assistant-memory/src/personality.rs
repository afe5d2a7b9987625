//! Personality sliders and the directive text derived from them
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::context_engine::PersonalitySource;

const HIGH: f64 = 0.7;
const LOW: f64 = 0.3;
const NEUTRAL: f64 = 0.5;

pub const TRAIT_NAMES: [&str; 5] = ["formality", "humor", "empathy", "creativity", "assertiveness"];

/// Each trait lies in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalityTraits {
    pub formality: f64,
    pub humor: f64,
    pub empathy: f64,
    pub creativity: f64,
    pub assertiveness: f64,
}

impl Default for PersonalityTraits {
    fn default() -> Self {
        Self {
            formality: NEUTRAL,
            humor: NEUTRAL,
            empathy: NEUTRAL,
            creativity: NEUTRAL,
            assertiveness: NEUTRAL,
        }
    }
}

fn pick(value: f64, high: &'static str, low: &'static str, middle: &'static str) -> &'static str {
    if value > HIGH {
        high
    } else if value < LOW {
        low
    } else {
        middle
    }
}

impl PersonalityTraits {
    fn slot(&mut self, name: &str) -> Option<&mut f64> {
        match name {
            "formality" => Some(&mut self.formality),
            "humor" => Some(&mut self.humor),
            "empathy" => Some(&mut self.empathy),
            "creativity" => Some(&mut self.creativity),
            "assertiveness" => Some(&mut self.assertiveness),
            _ => None,
        }
    }

    /// Returns whether the update was applied. Unknown traits and values
    /// outside `[0, 1]` are ignored.
    pub fn set_trait(&mut self, name: &str, value: f64) -> bool {
        if !(0.0..=1.0).contains(&value) {
            warn!("Ignoring out-of-range value {} for trait '{}'", value, name);
            return false;
        }
        match self.slot(name) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => {
                warn!("Ignoring unknown personality trait '{}'", name);
                false
            }
        }
    }

    pub fn get_trait(&self, name: &str) -> f64 {
        match name {
            "formality" => self.formality,
            "humor" => self.humor,
            "empathy" => self.empathy,
            "creativity" => self.creativity,
            "assertiveness" => self.assertiveness,
            _ => NEUTRAL,
        }
    }
}

impl PersonalitySource for PersonalityTraits {
    fn get_personality_prompt(&self) -> String {
        [
            format!(
                "Be {} in your responses.",
                pick(self.formality, "very formal", "casual", "moderately formal")
            ),
            format!(
                "{} in your interactions.",
                pick(self.humor, "Use humor frequently", "Be mostly serious", "Use occasional humor")
            ),
            format!(
                "{} in your responses.",
                pick(self.empathy, "Show strong empathy", "Be matter-of-fact", "Show moderate empathy")
            ),
            format!(
                "{} in your answers.",
                pick(self.creativity, "Be highly creative", "Be straightforward", "Be moderately creative")
            ),
            format!(
                "{} in your communication.",
                pick(
                    self.assertiveness,
                    "Be very assertive",
                    "Be gentle and passive",
                    "Be moderately assertive"
                )
            ),
        ]
        .join(" ")
    }
}
