//! Core data models for PlantMama.
//!
//! This crate provides the records persisted by the bot: users, their plants,
//! conversation sessions and messages, diagnoses and care reminders.

pub mod diagnosis;
pub mod ids;
pub mod plant;
pub mod reminder;
pub mod session;
pub mod user;

pub use diagnosis::{Diagnosis, Severity};
pub use ids::{DiagnosisId, MessageId, PlantId, ReminderId, SessionId, UserId};
pub use plant::Plant;
pub use reminder::{Reminder, ReminderKind, ReminderStatus};
pub use session::{ChatMessage, ChatRole, Session};
pub use user::{User, UserProfile};
