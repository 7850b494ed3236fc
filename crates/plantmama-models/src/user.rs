//! Telegram users known to the bot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::ids::UserId;

/// Profile fields reported by Telegram for a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Telegram @username, without the @.
    pub username: Option<String>,
    /// First name.
    pub first_name: Option<String>,
    /// Last name.
    pub last_name: Option<String>,
    /// IETF language tag reported by the client.
    pub language_code: Option<String>,
}

/// A user of the bot, keyed by Telegram user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Internal identifier.
    pub id: UserId,

    /// Telegram user id (unique).
    pub telegram_id: i64,

    /// Telegram @username.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// First name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,

    /// Last name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,

    /// Preferred language.
    #[serde(default = "default_language")]
    pub language_code: String,

    /// Free-form user preferences.
    #[serde(default)]
    pub preferences: HashMap<String, serde_json::Value>,

    /// When the user first talked to the bot.
    pub created_at: DateTime<Utc>,

    /// When the record last changed.
    pub updated_at: DateTime<Utc>,

    /// Whether the user is active.
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_language() -> String {
    "en".to_string()
}

fn default_active() -> bool {
    true
}

impl User {
    /// Creates a new user for the given Telegram id.
    pub fn new(telegram_id: i64) -> Self {
        let now = Utc::now();
        Self {
            id: UserId::new(),
            telegram_id,
            username: None,
            first_name: None,
            last_name: None,
            language_code: default_language(),
            preferences: HashMap::new(),
            created_at: now,
            updated_at: now,
            is_active: true,
        }
    }

    /// Creates a new user populated from a Telegram profile.
    pub fn with_profile(telegram_id: i64, profile: &UserProfile) -> Self {
        let mut user = Self::new(telegram_id);
        user.apply_profile(profile);
        user
    }

    /// Copies non-empty profile fields onto the user.
    ///
    /// Returns true if anything changed.
    pub fn apply_profile(&mut self, profile: &UserProfile) -> bool {
        let mut changed = false;
        if profile.username.is_some() && self.username != profile.username {
            self.username = profile.username.clone();
            changed = true;
        }
        if profile.first_name.is_some() && self.first_name != profile.first_name {
            self.first_name = profile.first_name.clone();
            changed = true;
        }
        if profile.last_name.is_some() && self.last_name != profile.last_name {
            self.last_name = profile.last_name.clone();
            changed = true;
        }
        if let Some(lang) = &profile.language_code {
            if &self.language_code != lang {
                self.language_code = lang.clone();
                changed = true;
            }
        }
        if changed {
            self.touch();
        }
        changed
    }

    /// Refreshes `updated_at`.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Name to greet the user with.
    pub fn display_name(&self) -> &str {
        self.first_name
            .as_deref()
            .or(self.username.as_deref())
            .unwrap_or("друг")
    }
}
