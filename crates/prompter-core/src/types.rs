use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// =============================================================================
// Enums
// =============================================================================

/// Author of a conversation message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// Assistant coaching profile.
///
/// Keys the placeholder greeting shown before the first exchange and the
/// framing of the system prompt sent with each generation call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    #[default]
    Interview,
    Sales,
    Meeting,
    Presentation,
    Negotiation,
}

impl Profile {
    /// Placeholder greeting shown while the conversation log is empty.
    pub fn greeting(&self) -> &'static str {
        match self {
            Profile::Interview => "Hey, I'm listening. Ask me anything about your interview.",
            Profile::Sales => "Hey, let's win this deal. What do you need?",
            Profile::Meeting => "Hey, I'm following along. Ask me anything about the meeting.",
            Profile::Presentation => "Hey, I've got your back. Ask me anything about your talk.",
            Profile::Negotiation => "Hey, let's get you the best terms. What's on the table?",
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Profile::Interview => write!(f, "interview"),
            Profile::Sales => write!(f, "sales"),
            Profile::Meeting => write!(f, "meeting"),
            Profile::Presentation => write!(f, "presentation"),
            Profile::Negotiation => write!(f, "negotiation"),
        }
    }
}

impl std::str::FromStr for Profile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "interview" => Ok(Profile::Interview),
            "sales" => Ok(Profile::Sales),
            "meeting" => Ok(Profile::Meeting),
            "presentation" => Ok(Profile::Presentation),
            "negotiation" => Ok(Profile::Negotiation),
            _ => Err(format!("Unknown profile: {}", s)),
        }
    }
}

// =============================================================================
// Newtype Wrappers
// =============================================================================

/// Epoch seconds (UTC).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now().timestamp())
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt.timestamp())
    }

    pub fn to_datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.0, 0).unwrap_or_default()
    }
}

// =============================================================================
// Message
// =============================================================================

/// One entry in the conversation log.
///
/// Ordering in the log is append-only; the only documented in-place change
/// is the rewrite of the most recent assistant message when a search
/// augments an earlier answer. The id is stable across that rewrite.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    pub created_at: Timestamp,
}

impl Message {
    /// Create a message with a fresh id stamped now.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            created_at: Timestamp::now(),
        }
    }

    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }
}

// =============================================================================
// Tests
// =============================================================================
