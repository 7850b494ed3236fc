//! Plant and diagnosis persistence.

use std::path::PathBuf;

use plantmama_models::{Diagnosis, Plant, PlantId, UserId};

use crate::atomic::{atomic_write_json, read_json, read_json_dir, remove_dir_if_exists, remove_if_exists};
use crate::error::{PersistenceError, Result};

/// Stores plants grouped by owner:
/// ```text
/// base_path/
/// └── plants/
///     └── {user_id}/
///         └── {plant_id}.json
/// ```
pub struct PlantStore {
    base_path: PathBuf,
}

impl PlantStore {
    /// Creates a store rooted at `base_path`.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn user_dir(&self, user_id: &UserId) -> PathBuf {
        self.base_path.join("plants").join(user_id.as_str())
    }

    fn plant_path(&self, user_id: &UserId, plant_id: &PlantId) -> PathBuf {
        self.user_dir(user_id).join(format!("{}.json", plant_id))
    }

    /// Saves a plant.
    pub fn save(&self, plant: &Plant) -> Result<()> {
        atomic_write_json(&self.plant_path(&plant.user_id, &plant.id), plant)
    }

    /// Loads one of a user's plants.
    pub fn load(&self, user_id: &UserId, plant_id: &PlantId) -> Result<Plant> {
        let path = self.plant_path(user_id, plant_id);
        if !path.exists() {
            return Err(PersistenceError::not_found("plant", plant_id));
        }
        read_json(&path)
    }

    /// Lists a user's plants, oldest first.
    pub fn list(&self, user_id: &UserId) -> Result<Vec<Plant>> {
        let mut plants: Vec<Plant> = read_json_dir(&self.user_dir(user_id))?;
        plants.sort_by_key(|p| p.added_at);
        Ok(plants)
    }

    /// Finds a plant by name or nickname, ignoring case.
    pub fn find_by_name(&self, user_id: &UserId, name: &str) -> Result<Option<Plant>> {
        let needle = name.trim().to_lowercase();
        Ok(self.list(user_id)?.into_iter().find(|p| {
            p.name.to_lowercase() == needle
                || p.nickname.as_ref().is_some_and(|n| n.to_lowercase() == needle)
        }))
    }

    /// Deletes a plant.
    pub fn delete(&self, user_id: &UserId, plant_id: &PlantId) -> Result<()> {
        remove_if_exists(&self.plant_path(user_id, plant_id))
    }
}

/// Stores diagnoses grouped by plant: `diagnoses/{plant_id}/{diagnosis_id}.json`.
pub struct DiagnosisStore {
    base_path: PathBuf,
}

impl DiagnosisStore {
    /// Creates a store rooted at `base_path`.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn plant_dir(&self, plant_id: &PlantId) -> PathBuf {
        self.base_path.join("diagnoses").join(plant_id.as_str())
    }

    /// Saves a diagnosis.
    pub fn save(&self, diagnosis: &Diagnosis) -> Result<()> {
        let path = self
            .plant_dir(&diagnosis.plant_id)
            .join(format!("{}.json", diagnosis.id));
        atomic_write_json(&path, diagnosis)
    }

    /// Lists a plant's diagnoses, newest first.
    pub fn list(&self, plant_id: &PlantId) -> Result<Vec<Diagnosis>> {
        let mut items: Vec<Diagnosis> = read_json_dir(&self.plant_dir(plant_id))?;
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }

    /// Most recent diagnosis of a plant.
    pub fn latest(&self, plant_id: &PlantId) -> Result<Option<Diagnosis>> {
        Ok(self.list(plant_id)?.into_iter().next())
    }

    /// Deletes every diagnosis of a plant.
    pub fn delete_all(&self, plant_id: &PlantId) -> Result<()> {
        remove_dir_if_exists(&self.plant_dir(plant_id))
    }
}
