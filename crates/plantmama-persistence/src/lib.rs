//! Persistence layer for PlantMama.
//!
//! This crate provides crash-safe persistence for users, plants, diagnoses,
//! conversation sessions and reminders using atomic file operations (write to
//! a temp file, then rename). Every record is one pretty-printed JSON file.
//!
//! # Example
//!
//! ```no_run
//! use plantmama_models::{Plant, UserProfile};
//! use plantmama_persistence::DataStore;
//!
//! let store = DataStore::new("/var/lib/plantmama/data");
//!
//! let user = store.users.get_or_create(42, &UserProfile::default()).unwrap();
//! let plant = Plant::new(user.id.clone(), "Monstera");
//! store.plants.save(&plant).unwrap();
//!
//! let plants = store.plants.list(&user.id).unwrap();
//! assert_eq!(plants.len(), 1);
//! ```

pub mod atomic;
pub mod error;
pub mod plant_store;
pub mod reminder_store;
pub mod session_store;
pub mod user_store;

use std::path::{Path, PathBuf};

pub use error::{PersistenceError, Result};
pub use plant_store::{DiagnosisStore, PlantStore};
pub use reminder_store::ReminderStore;
pub use session_store::SessionStore;
pub use user_store::UserStore;

/// All record stores sharing one data directory.
pub struct DataStore {
    base_path: PathBuf,
    /// Users keyed by Telegram id.
    pub users: UserStore,
    /// Plants per user.
    pub plants: PlantStore,
    /// Diagnoses per plant.
    pub diagnoses: DiagnosisStore,
    /// Sessions and messages.
    pub sessions: SessionStore,
    /// Care reminders.
    pub reminders: ReminderStore,
}

impl DataStore {
    /// Opens (lazily) a store rooted at `base_path`.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        let base_path = base_path.into();
        Self {
            users: UserStore::new(&base_path),
            plants: PlantStore::new(&base_path),
            diagnoses: DiagnosisStore::new(&base_path),
            sessions: SessionStore::new(&base_path),
            reminders: ReminderStore::new(&base_path),
            base_path,
        }
    }

    /// Root data directory.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Checks that the data directory exists and is writable.
    pub fn health_check(&self) -> Result<()> {
        let probe = self.base_path.join(".health");
        atomic::atomic_write(&probe, b"ok")?;
        std::fs::remove_file(&probe).map_err(|source| PersistenceError::WriteError {
            path: probe,
            source,
        })
    }
}
