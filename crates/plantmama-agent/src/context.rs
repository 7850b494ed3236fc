//! Per-request context handed to tools.

use std::path::PathBuf;

use plantmama_core::ProcessedImage;
use plantmama_models::{Plant, PlantId, SessionId, User, UserProfile};
use plantmama_persistence::DataStore;

use crate::client::ChatClient;
use crate::config::ModelConfig;
use crate::error::Result;

/// Who sent the message.
#[derive(Debug, Clone, Default)]
pub struct UserRef {
    /// Telegram user id.
    pub telegram_id: i64,
    /// Profile fields from the update.
    pub profile: UserProfile,
}

impl UserRef {
    pub fn new(telegram_id: i64) -> Self {
        Self {
            telegram_id,
            profile: UserProfile::default(),
        }
    }

    pub fn with_profile(mut self, profile: UserProfile) -> Self {
        self.profile = profile;
        self
    }
}

/// A processed photo attached to the current message.
#[derive(Debug, Clone)]
pub struct AttachedImage {
    /// Normalized JPEG.
    pub image: ProcessedImage,
    /// Where the upload was stored, if it was.
    pub path: Option<PathBuf>,
}

impl AttachedImage {
    pub fn new(image: ProcessedImage, path: Option<PathBuf>) -> Self {
        Self { image, path }
    }

    /// Stored path as a string for records.
    pub fn path_string(&self) -> Option<String> {
        self.path.as_ref().map(|p| p.display().to_string())
    }
}

/// Everything a tool may touch while handling one call.
///
/// The user is fixed by the conversation; tools never take a user id from
/// model arguments.
pub struct ToolContext<'a> {
    pub store: &'a DataStore,
    pub client: &'a ChatClient,
    pub vision_config: &'a ModelConfig,
    pub aux_config: &'a ModelConfig,
    pub user: &'a User,
    pub session_id: &'a SessionId,
    pub image: Option<&'a AttachedImage>,
}

impl ToolContext<'_> {
    /// Find one of the user's plants by id or by name/nickname.
    pub fn find_plant(&self, key: &str) -> Result<Option<Plant>> {
        let key = key.trim();
        if key.is_empty() {
            return Ok(None);
        }
        if looks_like_plant_id(key) {
            match self.store.plants.load(&self.user.id, &PlantId::from(key)) {
                Ok(plant) => return Ok(Some(plant)),
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(self.store.plants.find_by_name(&self.user.id, key)?)
    }

    /// Attach a plant to the open session.
    pub fn link_plant_to_session(&self, plant_id: &PlantId) -> Result<()> {
        let plant_id = plant_id.clone();
        self.store
            .sessions
            .update(&self.user.id, self.session_id, move |s| s.add_plant(plant_id))?;
        Ok(())
    }
}

/// Ids are used as file names, so anything path-like is never looked up.
fn looks_like_plant_id(key: &str) -> bool {
    key.starts_with("plant-")
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
}
