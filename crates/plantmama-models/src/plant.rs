//! Plants registered by users.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::diagnosis::Diagnosis;
use crate::ids::{PlantId, UserId};

/// A plant owned by a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plant {
    /// Unique identifier.
    pub id: PlantId,

    /// Owner of the plant.
    pub user_id: UserId,

    /// Name given when the plant was registered.
    pub name: String,

    /// Species as identified or entered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub species: Option<String>,

    /// Latin name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scientific_name: Option<String>,

    /// Pet name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,

    /// Path of the last stored photo.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_path: Option<String>,

    /// Where the plant lives (e.g. "south window").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    /// Pot size (small/medium/large).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pot_size: Option<String>,

    /// Soil description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub soil_type: Option<String>,

    /// Last watering time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_watered: Option<DateTime<Utc>>,

    /// Last fertilizing time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_fertilized: Option<DateTime<Utc>>,

    /// Health score from the latest diagnosis (1-10).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_score: Option<f32>,

    /// Free-form notes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    /// When the plant was registered.
    pub added_at: DateTime<Utc>,

    /// When the record last changed.
    pub updated_at: DateTime<Utc>,
}

impl Plant {
    /// Creates a new plant for a user.
    pub fn new(user_id: UserId, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: PlantId::new(),
            user_id,
            name: name.into(),
            species: None,
            scientific_name: None,
            nickname: None,
            photo_path: None,
            location: None,
            pot_size: None,
            soil_type: None,
            last_watered: None,
            last_fertilized: None,
            health_score: None,
            notes: None,
            added_at: now,
            updated_at: now,
        }
    }

    /// Sets the species.
    pub fn with_species(mut self, species: impl Into<String>) -> Self {
        self.species = Some(species.into());
        self
    }

    /// Sets the nickname.
    pub fn with_nickname(mut self, nickname: impl Into<String>) -> Self {
        self.nickname = Some(nickname.into());
        self
    }

    /// Records a watering.
    pub fn record_watering(&mut self, at: DateTime<Utc>) {
        self.last_watered = Some(at);
        self.updated_at = Utc::now();
    }

    /// Records a fertilizing.
    pub fn record_fertilizing(&mut self, at: DateTime<Utc>) {
        self.last_fertilized = Some(at);
        self.updated_at = Utc::now();
    }

    /// Copies the diagnosis result onto the plant.
    pub fn apply_diagnosis(&mut self, diagnosis: &Diagnosis) {
        self.health_score = Some(diagnosis.health_score);
        if diagnosis.image_path.is_some() {
            self.photo_path = diagnosis.image_path.clone();
        }
        self.updated_at = Utc::now();
    }

    /// Nickname if set, otherwise the registered name.
    pub fn display_name(&self) -> &str {
        self.nickname.as_deref().unwrap_or(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnosis::Severity;

    #[test]
    fn test_new_plant() {
        let user = UserId::new();
        let plant = Plant::new(user.clone(), "Monstera").with_species("Monstera deliciosa");
        assert_eq!(plant.user_id, user);
        assert_eq!(plant.species.as_deref(), Some("Monstera deliciosa"));
        assert!(plant.health_score.is_none());
    }

    #[test]
    fn test_display_name_prefers_nickname() {
        let plant = Plant::new(UserId::new(), "Ficus lyrata");
        assert_eq!(plant.display_name(), "Ficus lyrata");
        let plant = plant.with_nickname("Fiddle");
        assert_eq!(plant.display_name(), "Fiddle");
    }

    #[test]
    fn test_apply_diagnosis_updates_health() {
        let mut plant = Plant::new(UserId::new(), "Pothos");
        let mut diagnosis = Diagnosis::new(plant.id.clone(), 6.0, Severity::Moderate, 0.8);
        diagnosis.image_path = Some("uploads/abc.jpg".into());

        plant.apply_diagnosis(&diagnosis);

        assert_eq!(plant.health_score, Some(6.0));
        assert_eq!(plant.photo_path.as_deref(), Some("uploads/abc.jpg"));
    }

    #[test]
    fn test_record_care() {
        let mut plant = Plant::new(UserId::new(), "Aloe");
        let at = Utc::now();
        plant.record_watering(at);
        plant.record_fertilizing(at);
        assert_eq!(plant.last_watered, Some(at));
        assert_eq!(plant.last_fertilized, Some(at));
    }
}
