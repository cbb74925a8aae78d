use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Severity classification reported by the MRI classifier.
///
/// Ordering is defined by [`Stage::rank`], not by declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    #[serde(rename = "Non Demented", alias = "NonDemented")]
    NonDemented,
    #[serde(rename = "Very Mild Demented", alias = "VeryMild")]
    VeryMild,
    #[serde(rename = "Mild Demented", alias = "Mild")]
    Mild,
    #[serde(rename = "Moderate Demented", alias = "Moderate")]
    Moderate,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::NonDemented,
        Stage::VeryMild,
        Stage::Mild,
        Stage::Moderate,
    ];

    /// Severity rank, 0 (no decline) to 3 (moderate).
    pub fn rank(self) -> u8 {
        match self {
            Stage::NonDemented => 0,
            Stage::VeryMild => 1,
            Stage::Mild => 2,
            Stage::Moderate => 3,
        }
    }

    pub fn from_rank(rank: u8) -> Option<Stage> {
        match rank {
            0 => Some(Stage::NonDemented),
            1 => Some(Stage::VeryMild),
            2 => Some(Stage::Mild),
            3 => Some(Stage::Moderate),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Stage::NonDemented => "Non Demented",
            Stage::VeryMild => "Very Mild Demented",
            Stage::Mild => "Mild Demented",
            Stage::Moderate => "Moderate Demented",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Stage::NonDemented => "No cognitive decline detected. Normal brain function.",
            Stage::VeryMild => "Initial signs of memory loss. Often mistaken for normal aging.",
            Stage::Mild => "Clear difficulties in daily tasks, planning, and memory retrieval.",
            Stage::Moderate => {
                "Significant cognitive impairment requiring assistance for daily activities."
            }
        }
    }

    /// Display colour (hex) used for badges and chart points.
    pub fn color(self) -> &'static str {
        match self {
            Stage::NonDemented => "#10b981",
            Stage::VeryMild => "#fbbf24",
            Stage::Mild => "#f59e0b",
            Stage::Moderate => "#ef4444",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Stage {
    type Err = ValidationError;

    /// Accepts display labels, variant names and snake_case, ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        let key = key.strip_suffix("demented").unwrap_or(&key);
        match key {
            "non" => Ok(Stage::NonDemented),
            "verymild" => Ok(Stage::VeryMild),
            "mild" => Ok(Stage::Mild),
            "moderate" => Ok(Stage::Moderate),
            _ => Err(ValidationError::UnknownStage(s.to_string())),
        }
    }
}
