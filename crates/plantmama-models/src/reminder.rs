//! Care reminders.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{PlantId, ReminderId, UserId};

/// What the reminder is about.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderKind {
    /// Water the plant.
    Watering,
    /// Feed the plant.
    Fertilizing,
    /// Prune or deadhead.
    Pruning,
    /// Move to a larger pot.
    Repotting,
    /// Mist the leaves.
    Misting,
    /// Anything else.
    Other(String),
}

impl ReminderKind {
    /// Parses a reminder type label. Unknown labels become `Other`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "watering" | "water" => Self::Watering,
            "fertilizing" | "fertilize" | "feeding" => Self::Fertilizing,
            "pruning" | "prune" => Self::Pruning,
            "repotting" | "repot" => Self::Repotting,
            "misting" | "mist" => Self::Misting,
            other => Self::Other(other.to_string()),
        }
    }

    /// Emoji shown next to the reminder in chat.
    pub fn emoji(&self) -> &'static str {
        match self {
            Self::Watering => "💧",
            Self::Fertilizing => "🧪",
            Self::Pruning => "✂️",
            Self::Repotting => "🪴",
            Self::Misting => "🌫",
            Self::Other(_) => "🔔",
        }
    }
}

impl std::fmt::Display for ReminderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Watering => write!(f, "watering"),
            Self::Fertilizing => write!(f, "fertilizing"),
            Self::Pruning => write!(f, "pruning"),
            Self::Repotting => write!(f, "repotting"),
            Self::Misting => write!(f, "misting"),
            Self::Other(s) => write!(f, "{}", s),
        }
    }
}

/// Delivery state of a reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReminderStatus {
    /// Waiting for its time.
    #[default]
    Pending,
    /// Delivered to the user.
    Sent,
    /// Cancelled before delivery.
    Cancelled,
}

/// A scheduled notification for a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reminder {
    /// Unique identifier.
    pub id: ReminderId,

    /// Recipient.
    pub user_id: UserId,

    /// Plant the reminder concerns.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plant_id: Option<PlantId>,

    /// Reminder type.
    pub kind: ReminderKind,

    /// Short title.
    pub title: String,

    /// Longer description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// When to deliver.
    pub scheduled_at: DateTime<Utc>,

    /// When it was delivered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<DateTime<Utc>>,

    /// Delivery state.
    #[serde(default)]
    pub status: ReminderStatus,

    /// When the reminder was created.
    pub created_at: DateTime<Utc>,
}

impl Reminder {
    /// Creates a pending reminder.
    pub fn new(
        user_id: UserId,
        kind: ReminderKind,
        title: impl Into<String>,
        scheduled_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ReminderId::new(),
            user_id,
            plant_id: None,
            kind,
            title: title.into(),
            description: None,
            scheduled_at,
            sent_at: None,
            status: ReminderStatus::Pending,
            created_at: Utc::now(),
        }
    }

    /// Links the reminder to a plant.
    pub fn for_plant(mut self, plant_id: PlantId) -> Self {
        self.plant_id = Some(plant_id);
        self
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Pending and scheduled at or before `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == ReminderStatus::Pending && self.scheduled_at <= now
    }

    /// Whether the reminder is still waiting.
    pub fn is_pending(&self) -> bool {
        self.status == ReminderStatus::Pending
    }

    /// Marks the reminder delivered.
    pub fn mark_sent(&mut self, at: DateTime<Utc>) {
        self.status = ReminderStatus::Sent;
        self.sent_at = Some(at);
    }

    /// Cancels a pending reminder. Returns false if it was no longer pending.
    pub fn cancel(&mut self) -> bool {
        if self.status != ReminderStatus::Pending {
            return false;
        }
        self.status = ReminderStatus::Cancelled;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn reminder_at(offset: Duration) -> Reminder {
        Reminder::new(
            UserId::new(),
            ReminderKind::Watering,
            "Water the monstera",
            Utc::now() + offset,
        )
    }

    #[test]
    fn test_is_due() {
        let now = Utc::now();
        assert!(reminder_at(Duration::minutes(-5)).is_due(now));
        assert!(!reminder_at(Duration::hours(1)).is_due(now));
    }

    #[test]
    fn test_sent_and_cancelled_are_never_due() {
        let later = Utc::now() + Duration::days(1);

        let mut sent = reminder_at(Duration::minutes(-1));
        sent.mark_sent(Utc::now());
        assert!(!sent.is_due(later));
        assert!(sent.sent_at.is_some());

        let mut cancelled = reminder_at(Duration::minutes(-1));
        assert!(cancelled.cancel());
        assert!(!cancelled.is_due(later));
        assert!(!cancelled.cancel());
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!(ReminderKind::parse("Water"), ReminderKind::Watering);
        assert_eq!(ReminderKind::parse("repotting"), ReminderKind::Repotting);
        assert_eq!(
            ReminderKind::parse("rotate pot"),
            ReminderKind::Other("rotate pot".into())
        );
    }

    #[test]
    fn test_kind_serialization() {
        let json = serde_json::to_string(&ReminderKind::Fertilizing).unwrap();
        assert_eq!(json, "\"fertilizing\"");
        let other: ReminderKind = serde_json::from_str(r#"{"other":"rotate"}"#).unwrap();
        assert_eq!(other, ReminderKind::Other("rotate".into()));
    }
}
