//! User persistence.

use std::path::PathBuf;
use std::sync::Mutex;

use plantmama_models::{User, UserProfile};
use tracing::debug;

use crate::atomic::{atomic_write_json, read_json, read_json_dir, read_json_optional};
use crate::error::{PersistenceError, Result};

/// Stores users as `users/{telegram_id}.json`.
pub struct UserStore {
    base_path: PathBuf,
    /// Keeps concurrent first contacts from creating two users.
    write_lock: Mutex<()>,
}

impl UserStore {
    /// Creates a store rooted at `base_path`.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn users_dir(&self) -> PathBuf {
        self.base_path.join("users")
    }

    fn user_path(&self, telegram_id: i64) -> PathBuf {
        self.users_dir().join(format!("{}.json", telegram_id))
    }

    /// Saves a user.
    pub fn save(&self, user: &User) -> Result<()> {
        atomic_write_json(&self.user_path(user.telegram_id), user)
    }

    /// Loads a user by Telegram id.
    pub fn load(&self, telegram_id: i64) -> Result<User> {
        let path = self.user_path(telegram_id);
        if !path.exists() {
            return Err(PersistenceError::not_found("user", telegram_id));
        }
        read_json(&path)
    }

    /// Loads a user if present.
    pub fn find(&self, telegram_id: i64) -> Result<Option<User>> {
        read_json_optional(&self.user_path(telegram_id))
    }

    /// Returns the existing user, refreshing profile fields, or creates one.
    pub fn get_or_create(&self, telegram_id: i64, profile: &UserProfile) -> Result<User> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match self.find(telegram_id)? {
            Some(mut user) => {
                if user.apply_profile(profile) {
                    self.save(&user)?;
                }
                Ok(user)
            }
            None => {
                let user = User::with_profile(telegram_id, profile);
                self.save(&user)?;
                debug!(telegram_id, user_id = %user.id, "Created user");
                Ok(user)
            }
        }
    }

    /// Lists all users.
    pub fn list(&self) -> Result<Vec<User>> {
        let mut users: Vec<User> = read_json_dir(&self.users_dir())?;
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }
}
