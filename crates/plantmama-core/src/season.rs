//! Seasons of the (northern hemisphere) plant care year.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};

/// A season as used for care adjustments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    Spring,
    Summer,
    Fall,
    Winter,
}

impl Season {
    /// Season for a calendar month (1-12).
    pub fn from_month(month: u32) -> Self {
        match month {
            12 | 1 | 2 => Self::Winter,
            3..=5 => Self::Spring,
            6..=8 => Self::Summer,
            _ => Self::Fall,
        }
    }

    /// Season for today's date (UTC).
    pub fn current() -> Self {
        Self::from_month(Utc::now().month())
    }

    /// Lowercase English key.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Spring => "spring",
            Self::Summer => "summer",
            Self::Fall => "fall",
            Self::Winter => "winter",
        }
    }

    /// Russian name used in prompts.
    pub fn russian_name(&self) -> &'static str {
        match self {
            Self::Spring => "весна",
            Self::Summer => "лето",
            Self::Fall => "осень",
            Self::Winter => "зима",
        }
    }

    /// Whether most houseplants are dormant.
    pub fn is_dormant(&self) -> bool {
        matches!(self, Self::Fall | Self::Winter)
    }

    /// Parse a season name, falling back to spring for anything unknown.
    pub fn parse_or_spring(s: &str) -> Self {
        s.parse().unwrap_or(Self::Spring)
    }
}

impl FromStr for Season {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "spring" => Ok(Self::Spring),
            "summer" => Ok(Self::Summer),
            "fall" | "autumn" => Ok(Self::Fall),
            "winter" => Ok(Self::Winter),
            other => Err(format!("unknown season: {}", other)),
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
