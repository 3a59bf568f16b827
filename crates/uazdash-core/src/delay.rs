//! Send delay configuration and its fixed presets.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::UazError;

/// Minimum wait before the first block when safe mode is on, in seconds.
pub const SAFE_MODE_MIN_BEFORE: f64 = 2.0;
/// Minimum wait between blocks when safe mode is on, in seconds.
pub const SAFE_MODE_MIN_BETWEEN: f64 = 3.0;
/// Upper bound for every delay field, in seconds.
pub const MAX_DELAY_SECS: f64 = 3600.0;

/// Delay settings applied by the dispatcher. Persisted as a whole under
/// `uaz_delay_config`; there are no partial updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelayConfig {
    pub delay_before_sending: f64,
    pub delay_between_messages: f64,
    pub delay_between_chars: f64,
    pub enable_safe_mode: bool,
    pub randomize_delays: bool,
    pub max_random_variation: f64,
}

impl Default for DelayConfig {
    fn default() -> Self {
        DelayPreset::Normal.config()
    }
}

impl DelayConfig {
    /// Reject negative, non-finite or over-long durations.
    pub fn validate(&self) -> Result<(), UazError> {
        for (name, value) in [
            ("delayBeforeSending", self.delay_before_sending),
            ("delayBetweenMessages", self.delay_between_messages),
            ("delayBetweenChars", self.delay_between_chars),
            ("maxRandomVariation", self.max_random_variation),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(UazError::Validation(format!(
                    "{name} must be a non-negative number of seconds, got {value}"
                )));
            }
            if value > MAX_DELAY_SECS {
                return Err(UazError::Validation(format!(
                    "{name} must be at most {MAX_DELAY_SECS} seconds, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Wait before the first block.
    pub fn before_sending(&self, rng: &mut impl Rng) -> Result<Duration, UazError> {
        let floor = if self.enable_safe_mode {
            SAFE_MODE_MIN_BEFORE
        } else {
            0.0
        };
        self.jittered(self.delay_before_sending, floor, rng)
    }

    /// Wait between two consecutive blocks.
    pub fn between_messages(&self, rng: &mut impl Rng) -> Result<Duration, UazError> {
        let floor = if self.enable_safe_mode {
            SAFE_MODE_MIN_BETWEEN
        } else {
            0.0
        };
        self.jittered(self.delay_between_messages, floor, rng)
    }

    /// Typing simulation sent along with a text block, in milliseconds.
    pub fn typing_delay_ms(&self, text: &str) -> u64 {
        let chars = text.chars().count() as f64;
        (chars * self.delay_between_chars * 1000.0).round() as u64
    }

    fn jittered(&self, base: f64, floor: f64, rng: &mut impl Rng) -> Result<Duration, UazError> {
        let secs = if self.randomize_delays && self.max_random_variation > 0.0 {
            let v = self.max_random_variation;
            base + rng.gen_range(-v..=v)
        } else {
            base
        };
        Duration::try_from_secs_f64(secs.max(floor).max(0.0))
            .map_err(|e| UazError::Validation(format!("unusable delay of {secs} seconds: {e}")))
    }
}

/// The four fixed presets. Applying one replaces the whole config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayPreset {
    Fast,
    Normal,
    Safe,
    VerySafe,
}

impl DelayPreset {
    pub const ALL: [DelayPreset; 4] = [Self::Fast, Self::Normal, Self::Safe, Self::VerySafe];

    /// Literal values of this preset.
    pub fn config(self) -> DelayConfig {
        match self {
            Self::Fast => DelayConfig {
                delay_before_sending: 1.0,
                delay_between_messages: 1.0,
                delay_between_chars: 0.03,
                enable_safe_mode: false,
                randomize_delays: false,
                max_random_variation: 0.5,
            },
            Self::Normal => DelayConfig {
                delay_before_sending: 3.0,
                delay_between_messages: 2.0,
                delay_between_chars: 0.05,
                enable_safe_mode: false,
                randomize_delays: true,
                max_random_variation: 1.0,
            },
            Self::Safe => DelayConfig {
                delay_before_sending: 5.0,
                delay_between_messages: 3.0,
                delay_between_chars: 0.1,
                enable_safe_mode: true,
                randomize_delays: true,
                max_random_variation: 2.0,
            },
            Self::VerySafe => DelayConfig {
                delay_before_sending: 10.0,
                delay_between_messages: 6.0,
                delay_between_chars: 0.15,
                enable_safe_mode: true,
                randomize_delays: true,
                max_random_variation: 3.0,
            },
        }
    }

    /// Canonical (Portuguese) preset name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Fast => "rapido",
            Self::Normal => "normal",
            Self::Safe => "seguro",
            Self::VerySafe => "muito_seguro",
        }
    }
}

impl std::str::FromStr for DelayPreset {
    type Err = UazError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase().replace([' ', '-'], "_");
        match key.as_str() {
            "rapido" | "rápido" | "fast" => Ok(Self::Fast),
            "normal" => Ok(Self::Normal),
            "seguro" | "safe" => Ok(Self::Safe),
            "muito_seguro" | "very_safe" => Ok(Self::VerySafe),
            _ => Err(UazError::Validation(format!(
                "unknown delay preset '{s}' (expected rapido, normal, seguro or muito_seguro)"
            ))),
        }
    }
}
