//! Speaking pace and the natural-language hint derived from it.
//!
//! The backend has no rate parameter, so pace is expressed as an instruction
//! appended to the style prompt.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const MIN_PACE: f32 = 0.5;
pub const MAX_PACE: f32 = 2.0;

/// Errors that can occur when parsing a pace descriptor
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PaceError {
    #[error("invalid pace '{0}': expected a multiplier like \"1.3x\" or Slow/Normal/Fast")]
    Invalid(String),
}

/// Speaking rate multiplier, 1.0 being natural speed.
///
/// Parsed from descriptors such as `"1.3x"`, `"0.8"` or the legacy
/// `"Slow"`/`"Normal"`/`"Fast"` names. Displays as `"{:.1}x"`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pace(f32);

impl Pace {
    pub const NORMAL: Pace = Pace(1.0);

    /// Clamp to the supported range and round to one decimal, as the pace
    /// control does.
    pub fn from_multiplier(value: f32) -> Self {
        let clamped = value.clamp(MIN_PACE, MAX_PACE);
        Pace((clamped * 10.0).round() / 10.0)
    }

    pub fn multiplier(&self) -> f32 {
        self.0
    }

    /// Natural-language pacing instruction, or `None` at exactly normal speed.
    pub fn hint(&self) -> Option<&'static str> {
        let speed = self.0;
        if (speed - 1.0).abs() < f32::EPSILON {
            return None;
        }
        let hint = if speed <= 0.6 {
            "Speak very slowly"
        } else if speed <= 0.8 {
            "Speak slowly"
        } else if speed <= 1.1 {
            "Speak at a normal natural pace"
        } else if speed <= 1.5 {
            "Speak quickly"
        } else {
            "Speak very fast"
        };
        Some(hint)
    }
}

impl Default for Pace {
    fn default() -> Self {
        Pace::NORMAL
    }
}

impl FromStr for Pace {
    type Err = PaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        // Legacy names map onto multipliers that produce the same hints they used to.
        match trimmed.to_ascii_lowercase().as_str() {
            "normal" => return Ok(Pace::NORMAL),
            "slow" => return Ok(Pace(0.8)),
            "fast" => return Ok(Pace(1.3)),
            _ => {}
        }

        let number = trimmed
            .strip_suffix(['x', 'X'])
            .unwrap_or(trimmed)
            .trim();
        match number.parse::<f32>() {
            Ok(value) if value.is_finite() => Ok(Pace::from_multiplier(value)),
            _ => Err(PaceError::Invalid(s.to_string())),
        }
    }
}

impl TryFrom<String> for Pace {
    type Error = PaceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Pace> for String {
    fn from(pace: Pace) -> Self {
        pace.to_string()
    }
}

impl fmt::Display for Pace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}x", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hint(s: &str) -> Option<&'static str> {
        s.parse::<Pace>().unwrap().hint()
    }

    #[test]
    fn normal_speed_has_no_hint() {
        assert_eq!(hint("1.0x"), None);
        assert_eq!(hint("Normal"), None);
        assert_eq!(hint("1"), None);
    }

    #[test]
    fn hint_table() {
        assert_eq!(hint("0.5x"), Some("Speak very slowly"));
        assert_eq!(hint("0.6x"), Some("Speak very slowly"));
        assert_eq!(hint("0.7x"), Some("Speak slowly"));
        assert_eq!(hint("0.8x"), Some("Speak slowly"));
        assert_eq!(hint("0.9x"), Some("Speak at a normal natural pace"));
        assert_eq!(hint("1.1x"), Some("Speak at a normal natural pace"));
        assert_eq!(hint("1.3x"), Some("Speak quickly"));
        assert_eq!(hint("1.5x"), Some("Speak quickly"));
        assert_eq!(hint("1.6x"), Some("Speak very fast"));
        assert_eq!(hint("2.0x"), Some("Speak very fast"));
    }

    #[test]
    fn legacy_names_keep_their_hints() {
        assert_eq!(hint("Slow"), Some("Speak slowly"));
        assert_eq!(hint("Fast"), Some("Speak quickly"));
    }

    #[test]
    fn multiplier_is_clamped_and_rounded() {
        assert_eq!(Pace::from_multiplier(0.1).to_string(), "0.5x");
        assert_eq!(Pace::from_multiplier(3.0).to_string(), "2.0x");
        assert_eq!(Pace::from_multiplier(1.26).to_string(), "1.3x");
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!("quick".parse::<Pace>(), Err(PaceError::Invalid(_))));
        assert!("x".parse::<Pace>().is_err());
        assert!("NaNx".parse::<Pace>().is_err());
    }

    #[test]
    fn serializes_as_descriptor_string() {
        let json = serde_json::to_string(&Pace::from_multiplier(1.5)).unwrap();
        assert_eq!(json, "\"1.5x\"");
        let pace: Pace = serde_json::from_str("\"0.7x\"").unwrap();
        assert_eq!(pace.to_string(), "0.7x");
    }
}
