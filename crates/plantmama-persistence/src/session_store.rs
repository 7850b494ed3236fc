//! Conversation session and message persistence.

use std::path::PathBuf;
use std::sync::Mutex;

use plantmama_models::{ChatMessage, Session, SessionId, UserId};

use crate::atomic::{atomic_write_json, read_json, read_json_dir};
use crate::error::{PersistenceError, Result};

/// Stores sessions and their messages:
/// ```text
/// base_path/
/// ├── sessions/{user_id}/{session_id}.json
/// └── messages/{session_id}/{message_id}.json
/// ```
pub struct SessionStore {
    base_path: PathBuf,
    /// Serializes read-modify-write updates of session counters.
    write_lock: Mutex<()>,
}

impl SessionStore {
    /// Creates a store rooted at `base_path`.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn user_dir(&self, user_id: &UserId) -> PathBuf {
        self.base_path.join("sessions").join(user_id.as_str())
    }

    fn session_path(&self, user_id: &UserId, session_id: &SessionId) -> PathBuf {
        self.user_dir(user_id).join(format!("{}.json", session_id))
    }

    fn messages_dir(&self, session_id: &SessionId) -> PathBuf {
        self.base_path.join("messages").join(session_id.as_str())
    }

    /// Saves a session.
    pub fn save(&self, session: &Session) -> Result<()> {
        atomic_write_json(&self.session_path(&session.user_id, &session.id), session)
    }

    /// Loads a session.
    pub fn load(&self, user_id: &UserId, session_id: &SessionId) -> Result<Session> {
        let path = self.session_path(user_id, session_id);
        if !path.exists() {
            return Err(PersistenceError::not_found("session", session_id));
        }
        read_json(&path)
    }

    /// Lists a user's sessions, oldest first.
    pub fn list(&self, user_id: &UserId) -> Result<Vec<Session>> {
        let mut sessions: Vec<Session> = read_json_dir(&self.user_dir(user_id))?;
        sessions.sort_by_key(|s| s.start_time);
        Ok(sessions)
    }

    /// The user's newest open session, if any.
    pub fn current(&self, user_id: &UserId) -> Result<Option<Session>> {
        Ok(self.list(user_id)?.into_iter().rev().find(Session::is_open))
    }

    /// Returns the newest open session or opens a new one.
    pub fn current_or_open(&self, user_id: &UserId) -> Result<Session> {
        let _guard = self.lock();
        if let Some(session) = self.current(user_id)? {
            return Ok(session);
        }
        let session = Session::new(user_id.clone());
        self.save(&session)?;
        Ok(session)
    }

    /// Persists a message and updates the session counters.
    ///
    /// Returns the updated session.
    pub fn append_message(&self, user_id: &UserId, message: &ChatMessage) -> Result<Session> {
        let _guard = self.lock();
        let mut session = self.load(user_id, &message.session_id)?;

        let path = self
            .messages_dir(&message.session_id)
            .join(format!("{}.json", message.id));
        atomic_write_json(&path, message)?;

        session.record_message(message.tokens_used);
        self.save(&session)?;
        Ok(session)
    }

    /// Applies `f` to a stored session and saves it.
    pub fn update<F>(&self, user_id: &UserId, session_id: &SessionId, f: F) -> Result<Session>
    where
        F: FnOnce(&mut Session),
    {
        let _guard = self.lock();
        let mut session = self.load(user_id, session_id)?;
        f(&mut session);
        self.save(&session)?;
        Ok(session)
    }

    /// Messages of a session in chronological order.
    pub fn messages(&self, session_id: &SessionId) -> Result<Vec<ChatMessage>> {
        let mut messages: Vec<ChatMessage> = read_json_dir(&self.messages_dir(session_id))?;
        messages.sort_by_key(|m| m.timestamp);
        Ok(messages)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ()> {
        // A poisoned lock only means another writer panicked; the files are
        // still consistent because every write is atomic.
        self.write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plantmama_models::ChatRole;
    use tempfile::tempdir;

    #[test]
    fn test_current_or_open_reuses_open_session() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let user = UserId::new();

        let first = store.current_or_open(&user).unwrap();
        let second = store.current_or_open(&user).unwrap();
        assert_eq!(first.id, second.id);
    }

    #[test]
    fn test_ended_session_is_not_current() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let user = UserId::new();

        let session = store.current_or_open(&user).unwrap();
        store.update(&user, &session.id, |s| s.end()).unwrap();

        assert!(store.current(&user).unwrap().is_none());
        let next = store.current_or_open(&user).unwrap();
        assert_ne!(next.id, session.id);
        assert_eq!(store.list(&user).unwrap().len(), 2);
    }

    #[test]
    fn test_append_message_updates_counters() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let user = UserId::new();
        let session = store.current_or_open(&user).unwrap();

        let question = ChatMessage::new(session.id.clone(), ChatRole::User, "Why yellow leaves?");
        store.append_message(&user, &question).unwrap();
        let answer = ChatMessage::new(session.id.clone(), ChatRole::Assistant, "Overwatering.")
            .with_tokens(250);
        let updated = store.append_message(&user, &answer).unwrap();

        assert_eq!(updated.messages_count, 2);
        assert_eq!(updated.tokens_used, 250);

        let messages = store.messages(&session.id).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, ChatRole::User);
    }

    #[test]
    fn test_append_to_unknown_session_fails() {
        let dir = tempdir().unwrap();
        let store = SessionStore::new(dir.path());
        let msg = ChatMessage::new(SessionId::new(), ChatRole::User, "hi");

        let err = store.append_message(&UserId::new(), &msg).unwrap_err();
        assert!(err.is_not_found());
    }
}
