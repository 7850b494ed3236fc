//! Reminder persistence.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use plantmama_models::{Reminder, ReminderId, UserId};

use crate::atomic::{atomic_write_json, read_json, read_json_dir, subdirs};
use crate::error::{PersistenceError, Result};

/// Stores reminders grouped by user: `reminders/{user_id}/{reminder_id}.json`.
pub struct ReminderStore {
    base_path: PathBuf,
}

impl ReminderStore {
    /// Creates a store rooted at `base_path`.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn root(&self) -> PathBuf {
        self.base_path.join("reminders")
    }

    fn user_dir(&self, user_id: &UserId) -> PathBuf {
        self.root().join(user_id.as_str())
    }

    fn reminder_path(&self, user_id: &UserId, id: &ReminderId) -> PathBuf {
        self.user_dir(user_id).join(format!("{}.json", id))
    }

    /// Saves a reminder.
    pub fn save(&self, reminder: &Reminder) -> Result<()> {
        atomic_write_json(&self.reminder_path(&reminder.user_id, &reminder.id), reminder)
    }

    /// Loads a reminder.
    pub fn load(&self, user_id: &UserId, id: &ReminderId) -> Result<Reminder> {
        let path = self.reminder_path(user_id, id);
        if !path.exists() {
            return Err(PersistenceError::not_found("reminder", id));
        }
        read_json(&path)
    }

    /// All of a user's reminders ordered by scheduled time.
    pub fn list(&self, user_id: &UserId) -> Result<Vec<Reminder>> {
        let mut reminders: Vec<Reminder> = read_json_dir(&self.user_dir(user_id))?;
        reminders.sort_by_key(|r| r.scheduled_at);
        Ok(reminders)
    }

    /// A user's pending reminders ordered by scheduled time.
    pub fn pending(&self, user_id: &UserId) -> Result<Vec<Reminder>> {
        Ok(self
            .list(user_id)?
            .into_iter()
            .filter(Reminder::is_pending)
            .collect())
    }

    /// Reminders of every user that are due at `now`, oldest first.
    pub fn due(&self, now: DateTime<Utc>) -> Result<Vec<Reminder>> {
        let mut due = Vec::new();
        for dir in subdirs(&self.root())? {
            let reminders: Vec<Reminder> = read_json_dir(&dir)?;
            due.extend(reminders.into_iter().filter(|r| r.is_due(now)));
        }
        due.sort_by_key(|r| r.scheduled_at);
        Ok(due)
    }

    /// Cancels a pending reminder.
    ///
    /// Returns false if the reminder had already been sent or cancelled.
    pub fn cancel(&self, user_id: &UserId, id: &ReminderId) -> Result<bool> {
        let mut reminder = self.load(user_id, id)?;
        if !reminder.cancel() {
            return Ok(false);
        }
        self.save(&reminder)?;
        Ok(true)
    }

    /// Marks a reminder delivered.
    pub fn mark_sent(&self, reminder: &Reminder, at: DateTime<Utc>) -> Result<Reminder> {
        let mut updated = reminder.clone();
        updated.mark_sent(at);
        self.save(&updated)?;
        Ok(updated)
    }
}
