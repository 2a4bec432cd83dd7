use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::Timestamp;

/// Domain events announced when the conversation log changes.
///
/// The conversation store emits these after each mutation so observers
/// (the reveal engine, the out-of-scope view layer) react to explicit
/// change notifications instead of polling shared state.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ConversationEvent {
    /// A user message was appended to the log.
    UserAppended {
        message_id: Uuid,
        timestamp: Timestamp,
    },

    /// An assistant message was appended to the log.
    AssistantAppended {
        message_id: Uuid,
        timestamp: Timestamp,
    },

    /// The most recent assistant message was rewritten in place.
    AssistantReplaced {
        message_id: Uuid,
        timestamp: Timestamp,
    },

    /// The whole log was reset.
    HistoryCleared { timestamp: Timestamp },
}

impl ConversationEvent {
    /// Returns the timestamp of the event.
    pub fn timestamp(&self) -> Timestamp {
        match self {
            ConversationEvent::UserAppended { timestamp, .. }
            | ConversationEvent::AssistantAppended { timestamp, .. }
            | ConversationEvent::AssistantReplaced { timestamp, .. }
            | ConversationEvent::HistoryCleared { timestamp } => *timestamp,
        }
    }

    /// Returns a human-readable event name for logging.
    pub fn event_name(&self) -> &'static str {
        match self {
            ConversationEvent::UserAppended { .. } => "user_appended",
            ConversationEvent::AssistantAppended { .. } => "assistant_appended",
            ConversationEvent::AssistantReplaced { .. } => "assistant_replaced",
            ConversationEvent::HistoryCleared { .. } => "history_cleared",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_timestamp() {
        let ts = Timestamp::now();
        let event = ConversationEvent::UserAppended {
            message_id: Uuid::new_v4(),
            timestamp: ts,
        };
        assert_eq!(event.timestamp(), ts);
    }

    #[test]
    fn test_event_names() {
        let ts = Timestamp::now();
        let id = Uuid::new_v4();
        let events = vec![
            ConversationEvent::UserAppended {
                message_id: id,
                timestamp: ts,
            },
            ConversationEvent::AssistantAppended {
                message_id: id,
                timestamp: ts,
            },
            ConversationEvent::AssistantReplaced {
                message_id: id,
                timestamp: ts,
            },
            ConversationEvent::HistoryCleared { timestamp: ts },
        ];
        let names: Vec<&str> = events.iter().map(|e| e.event_name()).collect();
        assert_eq!(
            names,
            vec![
                "user_appended",
                "assistant_appended",
                "assistant_replaced",
                "history_cleared"
            ]
        );
    }

    #[test]
    fn test_event_serialization_round_trip() {
        let event = ConversationEvent::AssistantReplaced {
            message_id: Uuid::new_v4(),
            timestamp: Timestamp::now(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: ConversationEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.event_name(), "assistant_replaced");
        assert_eq!(back.timestamp(), event.timestamp());
    }
}
