//! Plant health diagnoses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{DiagnosisId, PlantId};

/// Severity of the detected problems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Cosmetic or early-stage issues.
    #[default]
    Mild,
    /// Needs attention soon.
    Moderate,
    /// Plant at risk.
    Severe,
}

impl Severity {
    /// Parses a severity label leniently, defaulting to mild.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "severe" | "high" | "critical" => Self::Severe,
            "moderate" | "medium" => Self::Moderate,
            _ => Self::Mild,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mild => write!(f, "mild"),
            Self::Moderate => write!(f, "moderate"),
            Self::Severe => write!(f, "severe"),
        }
    }
}

/// A health assessment of a plant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnosis {
    /// Unique identifier.
    pub id: DiagnosisId,

    /// Diagnosed plant.
    pub plant_id: PlantId,

    /// Photo the diagnosis was made from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,

    /// Health score, 1 (dying) to 10 (thriving).
    pub health_score: f32,

    /// Detected problems.
    #[serde(default)]
    pub issues: Vec<String>,

    /// Overall severity.
    pub severity: Severity,

    /// First-aid recommendations.
    #[serde(default)]
    pub recommendations: Vec<String>,

    /// Confidence of the assessment, 0 to 1.
    pub confidence: f32,

    /// Free-form notes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    /// When the diagnosis was made.
    pub created_at: DateTime<Utc>,
}

impl Diagnosis {
    /// Creates a diagnosis, clamping score and confidence into range.
    pub fn new(plant_id: PlantId, health_score: f32, severity: Severity, confidence: f32) -> Self {
        Self {
            id: DiagnosisId::new(),
            plant_id,
            image_path: None,
            health_score: clamp_or(health_score, 1.0, 10.0),
            issues: Vec::new(),
            severity,
            recommendations: Vec::new(),
            confidence: clamp_or(confidence, 0.0, 1.0),
            notes: None,
            created_at: Utc::now(),
        }
    }

    /// Sets detected issues.
    pub fn with_issues(mut self, issues: Vec<String>) -> Self {
        self.issues = issues;
        self
    }

    /// Sets recommendations.
    pub fn with_recommendations(mut self, recommendations: Vec<String>) -> Self {
        self.recommendations = recommendations;
        self
    }
}

// NaN maps to the lower bound.
fn clamp_or(value: f32, min: f32, max: f32) -> f32 {
    if value.is_nan() {
        min
    } else {
        value.clamp(min, max)
    }
}
