//! Strongly typed identifiers.
//!
//! Each id wraps a prefixed UUID string (`plant-3f2a...`) so ids of different
//! record kinds cannot be mixed up and remain readable in file names and logs.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Prefix used when generating new ids.
            pub const PREFIX: &'static str = $prefix;

            /// Generates a new random id.
            pub fn new() -> Self {
                Self(format!("{}-{}", $prefix, uuid::Uuid::new_v4()))
            }

            /// Returns the id as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

define_id!(
    /// Identifier of a [`User`](crate::User).
    UserId,
    "user"
);
define_id!(
    /// Identifier of a [`Plant`](crate::Plant).
    PlantId,
    "plant"
);
define_id!(
    /// Identifier of a conversation [`Session`](crate::Session).
    SessionId,
    "session"
);
define_id!(
    /// Identifier of a persisted [`ChatMessage`](crate::ChatMessage).
    MessageId,
    "msg"
);
define_id!(
    /// Identifier of a [`Diagnosis`](crate::Diagnosis).
    DiagnosisId,
    "diag"
);
define_id!(
    /// Identifier of a [`Reminder`](crate::Reminder).
    ReminderId,
    "rem"
);
