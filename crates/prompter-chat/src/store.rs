//! Conversation store: the ordered message log and its derived response.
//!
//! Single owner of conversation state. All mutations go through the
//! append/replace API, persist write-through to the transcript store, and
//! are announced on a broadcast channel so observers react to explicit
//! change events instead of polling.

use std::sync::Mutex;

use tokio::sync::broadcast;
use tracing::{debug, info};

use prompter_core::events::ConversationEvent;
use prompter_core::types::{Message, Profile, Role, Timestamp};
use prompter_storage::TranscriptStore;

use crate::error::ChatError;

/// Maximum message length in characters.
pub const MAX_MESSAGE_LENGTH: usize = 2000;

/// Capacity of the change-notification channel.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Ordered message log with write-through persistence.
pub struct ConversationStore {
    messages: Mutex<Vec<Message>>,
    transcript: Option<TranscriptStore>,
    events: broadcast::Sender<ConversationEvent>,
    profile: Profile,
}

impl ConversationStore {
    /// Create a store with no persistence (tests, throwaway sessions).
    pub fn in_memory(profile: Profile) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            messages: Mutex::new(Vec::new()),
            transcript: None,
            events,
            profile,
        }
    }

    /// Create a store backed by the transcript store, restoring any
    /// previously persisted log.
    pub fn with_transcript(profile: Profile, transcript: TranscriptStore) -> Result<Self, ChatError> {
        let restored = transcript.load()?;
        if !restored.is_empty() {
            info!(message_count = restored.len(), "Conversation restored");
        }
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            messages: Mutex::new(restored),
            transcript: Some(transcript),
            events,
            profile,
        })
    }

    /// Subscribe to change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<ConversationEvent> {
        self.events.subscribe()
    }

    /// Append a user message.
    ///
    /// Rejects input that trims to empty before anything else happens, so
    /// no downstream stage ever sees a blank submission.
    pub fn append_user(&self, text: &str) -> Result<Message, ChatError> {
        if text.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if text.len() > MAX_MESSAGE_LENGTH {
            return Err(ChatError::MessageTooLong(MAX_MESSAGE_LENGTH));
        }

        let message = Message::new(Role::User, text);
        self.push_and_persist(message.clone())?;
        self.emit(ConversationEvent::UserAppended {
            message_id: message.id,
            timestamp: message.created_at,
        });
        Ok(message)
    }

    /// Append an assistant message.
    pub fn append_assistant(&self, text: &str) -> Result<Message, ChatError> {
        let message = Message::new(Role::Assistant, text);
        self.push_and_persist(message.clone())?;
        self.emit(ConversationEvent::AssistantAppended {
            message_id: message.id,
            timestamp: message.created_at,
        });
        Ok(message)
    }

    /// Rewrite the content of the most recent assistant message in place.
    ///
    /// The message keeps its id, so an in-progress reveal resumes instead
    /// of restarting. When the tail is not an assistant message this
    /// degrades to an append.
    pub fn replace_last_assistant(&self, text: &str) -> Result<Message, ChatError> {
        let replaced = {
            let mut messages = self.lock_messages()?;
            match messages.last_mut() {
                Some(last) if last.role == Role::Assistant => {
                    last.content = text.to_string();
                    let message = last.clone();
                    self.persist(&messages)?;
                    Some(message)
                }
                _ => None,
            }
        };

        match replaced {
            Some(message) => {
                self.emit(ConversationEvent::AssistantReplaced {
                    message_id: message.id,
                    timestamp: Timestamp::now(),
                });
                Ok(message)
            }
            None => self.append_assistant(text),
        }
    }

    /// The most recent assistant content, or the profile greeting when the
    /// log holds none.
    pub fn current_response(&self) -> String {
        let messages = match self.lock_messages() {
            Ok(messages) => messages,
            Err(_) => return self.profile.greeting().to_string(),
        };
        messages
            .iter()
            .rev()
            .find(|m| m.is_assistant())
            .map(|m| m.content.clone())
            .unwrap_or_else(|| self.profile.greeting().to_string())
    }

    /// Snapshot of the full ordered log.
    pub fn messages(&self) -> Vec<Message> {
        self.lock_messages().map(|m| m.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.lock_messages().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wholesale history reset. Individual messages are never deleted.
    pub fn clear(&self) -> Result<(), ChatError> {
        {
            let mut messages = self.lock_messages()?;
            messages.clear();
            self.persist(&messages)?;
        }
        self.emit(ConversationEvent::HistoryCleared {
            timestamp: Timestamp::now(),
        });
        Ok(())
    }

    // -- Private helpers --

    fn lock_messages(&self) -> Result<std::sync::MutexGuard<'_, Vec<Message>>, ChatError> {
        self.messages
            .lock()
            .map_err(|e| ChatError::Storage(format!("message lock poisoned: {}", e)))
    }

    fn push_and_persist(&self, message: Message) -> Result<(), ChatError> {
        let mut messages = self.lock_messages()?;
        messages.push(message);
        self.persist(&messages)
    }

    /// Write the full log through to durable storage, synchronously with
    /// the in-memory mutation.
    fn persist(&self, messages: &[Message]) -> Result<(), ChatError> {
        if let Some(ref transcript) = self.transcript {
            transcript.save(messages)?;
        }
        Ok(())
    }

    fn emit(&self, event: ConversationEvent) {
        debug!(event = event.event_name(), "Conversation changed");
        let _ = self.events.send(event);
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use prompter_storage::Database;
    use std::sync::Arc;

    fn make_store() -> ConversationStore {
        ConversationStore::in_memory(Profile::Interview)
    }

    // ---- Append ----

    #[test]
    fn test_append_user_and_assistant() {
        let store = make_store();
        store.append_user("hello").unwrap();
        store.append_assistant("hi there").unwrap();

        let messages = store.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].content, "hello");
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].content, "hi there");
    }

    #[test]
    fn test_append_user_empty_rejected() {
        let store = make_store();
        assert!(matches!(
            store.append_user("").unwrap_err(),
            ChatError::EmptyMessage
        ));
        assert!(matches!(
            store.append_user("   \n\t").unwrap_err(),
            ChatError::EmptyMessage
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn test_append_user_too_long_rejected() {
        let store = make_store();
        let long = "a".repeat(MAX_MESSAGE_LENGTH + 1);
        assert!(matches!(
            store.append_user(&long).unwrap_err(),
            ChatError::MessageTooLong(_)
        ));
    }

    #[test]
    fn test_append_user_at_max_length_ok() {
        let store = make_store();
        let msg = "a".repeat(MAX_MESSAGE_LENGTH);
        assert!(store.append_user(&msg).is_ok());
    }

    // ---- Replace-last invariant ----

    #[test]
    fn test_replace_last_assistant_rewrites_in_place() {
        let store = make_store();
        store.append_user("question").unwrap();
        let original = store.append_assistant("interim answer").unwrap();

        let replaced = store.replace_last_assistant("final answer").unwrap();

        let messages = store.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].content, "final answer");
        // Identity survives the rewrite.
        assert_eq!(replaced.id, original.id);
    }

    #[test]
    fn test_replace_last_assistant_appends_when_tail_is_user() {
        let store = make_store();
        store.append_user("question").unwrap();

        store.replace_last_assistant("answer").unwrap();

        let messages = store.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].content, "answer");
    }

    #[test]
    fn test_replace_last_assistant_on_empty_store_appends() {
        let store = make_store();
        store.replace_last_assistant("answer").unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.messages()[0].role, Role::Assistant);
    }

    // ---- Current response ----

    #[test]
    fn test_current_response_greeting_when_empty() {
        let store = make_store();
        assert_eq!(store.current_response(), Profile::Interview.greeting());
    }

    #[test]
    fn test_current_response_greeting_is_profile_keyed() {
        let store = ConversationStore::in_memory(Profile::Sales);
        assert_eq!(store.current_response(), Profile::Sales.greeting());
    }

    #[test]
    fn test_current_response_tail_assistant() {
        let store = make_store();
        store.append_user("q1").unwrap();
        store.append_assistant("a1").unwrap();
        store.append_user("q2").unwrap();
        // Tail is a user message; the derived response is still the most
        // recent assistant content.
        assert_eq!(store.current_response(), "a1");

        store.append_assistant("a2").unwrap();
        assert_eq!(store.current_response(), "a2");
    }

    #[test]
    fn test_current_response_greeting_when_only_user_messages() {
        let store = make_store();
        store.append_user("anyone there?").unwrap();
        assert_eq!(store.current_response(), Profile::Interview.greeting());
    }

    // ---- Clear ----

    #[test]
    fn test_clear_resets_log() {
        let store = make_store();
        store.append_user("q").unwrap();
        store.append_assistant("a").unwrap();
        store.clear().unwrap();
        assert!(store.is_empty());
        assert_eq!(store.current_response(), Profile::Interview.greeting());
    }

    // ---- Events ----

    #[tokio::test]
    async fn test_mutations_emit_events() {
        let store = make_store();
        let mut rx = store.subscribe();

        let user = store.append_user("q").unwrap();
        let assistant = store.append_assistant("a").unwrap();
        store.replace_last_assistant("a2").unwrap();
        store.clear().unwrap();

        match rx.recv().await.unwrap() {
            ConversationEvent::UserAppended { message_id, .. } => assert_eq!(message_id, user.id),
            other => panic!("unexpected event {:?}", other),
        }
        match rx.recv().await.unwrap() {
            ConversationEvent::AssistantAppended { message_id, .. } => {
                assert_eq!(message_id, assistant.id)
            }
            other => panic!("unexpected event {:?}", other),
        }
        match rx.recv().await.unwrap() {
            ConversationEvent::AssistantReplaced { message_id, .. } => {
                assert_eq!(message_id, assistant.id)
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert!(matches!(
            rx.recv().await.unwrap(),
            ConversationEvent::HistoryCleared { .. }
        ));
    }

    #[test]
    fn test_mutations_without_subscribers_do_not_fail() {
        let store = make_store();
        store.append_user("no one is listening").unwrap();
        store.append_assistant("still fine").unwrap();
    }

    // ---- Persistence round-trip ----

    #[test]
    fn test_store_round_trip_through_transcript() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompter.db");

        {
            let db = Arc::new(Database::new(&path).unwrap());
            let store = ConversationStore::with_transcript(
                Profile::Interview,
                TranscriptStore::new(db),
            )
            .unwrap();
            store.append_user("a").unwrap();
            store.append_assistant("b").unwrap();
        }

        let db = Arc::new(Database::new(&path).unwrap());
        let store =
            ConversationStore::with_transcript(Profile::Interview, TranscriptStore::new(db))
                .unwrap();

        let messages = store.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].content, "a");
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].content, "b");
        assert_eq!(store.current_response(), "b");
    }

    #[test]
    fn test_replace_persists_through_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompter.db");

        {
            let db = Arc::new(Database::new(&path).unwrap());
            let store = ConversationStore::with_transcript(
                Profile::Interview,
                TranscriptStore::new(db),
            )
            .unwrap();
            store.append_user("q").unwrap();
            store.append_assistant("interim").unwrap();
            store.replace_last_assistant("augmented").unwrap();
        }

        let db = Arc::new(Database::new(&path).unwrap());
        let store =
            ConversationStore::with_transcript(Profile::Interview, TranscriptStore::new(db))
                .unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.current_response(), "augmented");
    }
}
