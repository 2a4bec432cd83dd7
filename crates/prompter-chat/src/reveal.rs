//! Word-by-word reveal engine.
//!
//! Reveals the newest assistant message one word at a time while keeping
//! every earlier message fully visible. Each scheduled reveal captures a
//! generation id at schedule time; every render pass advances the live
//! generation, so timers belonging to a superseded pass fall through
//! without touching the cursor.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use prompter_core::config::RevealConfig;
use prompter_core::types::{Message, Role};

/// Capacity of the completion-notification channel.
const EVENT_CHANNEL_CAPACITY: usize = 16;

// =============================================================================
// Frame types
// =============================================================================

/// One message as currently visible.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderedMessage {
    pub id: Uuid,
    pub role: Role,
    /// Full source content.
    pub content: String,
    /// The prefix currently visible.
    pub visible: String,
    pub visible_words: usize,
    pub total_words: usize,
}

impl RenderedMessage {
    pub fn fully_visible(&self) -> bool {
        self.visible_words >= self.total_words
    }
}

/// Snapshot of the conversation as it should be displayed right now.
#[derive(Clone, Debug, PartialEq)]
pub struct RevealFrame {
    pub messages: Vec<RenderedMessage>,
}

/// Notifications from the engine.
#[derive(Clone, Debug, PartialEq)]
pub enum RevealEvent {
    /// Every word of the animating message has been revealed.
    Completed { message_id: Uuid },
}

// =============================================================================
// Tokenization
// =============================================================================

/// Count whitespace-delimited words. Inline markup tokens count as words;
/// line breaks are layout, not content.
pub fn word_count(content: &str) -> usize {
    content.split_whitespace().count()
}

/// Reconstruct the prefix holding the first `count` words, preserving the
/// line structure of blocks already reached.
pub fn visible_prefix(content: &str, count: usize) -> String {
    if count == 0 {
        return String::new();
    }
    let mut remaining = count;
    let mut out: Vec<String> = Vec::new();
    for line in content.lines() {
        if remaining == 0 {
            break;
        }
        let words: Vec<&str> = line.split_whitespace().collect();
        if words.is_empty() {
            out.push(String::new());
            continue;
        }
        let take = words.len().min(remaining);
        remaining -= take;
        out.push(words[..take].join(" "));
    }
    out.join("\n")
}

// =============================================================================
// RevealEngine
// =============================================================================

struct CursorState {
    /// Identity of the assistant message currently animating.
    message_id: Option<Uuid>,
    /// Words already marked visible in it. Non-decreasing while the
    /// identity is unchanged.
    revealed: usize,
    /// Live generation. Timers compare their captured value against this.
    generation: u64,
}

/// State shared with the scheduled reveal callbacks.
struct Shared {
    state: Mutex<CursorState>,
    animate_flag: Arc<AtomicBool>,
    events: broadcast::Sender<RevealEvent>,
}

impl Shared {
    /// A scheduled reveal landing. No-op when the pass that scheduled it
    /// has been superseded or the message identity moved on.
    fn apply_reveal(&self, generation: u64, message_id: Uuid, count: usize, total: usize) {
        {
            let mut state = self.state.lock().expect("cursor lock poisoned");
            if state.generation != generation || state.message_id != Some(message_id) {
                return;
            }
            if count > state.revealed {
                state.revealed = count;
            }
        }
        if count >= total {
            self.complete(message_id);
        }
    }

    fn complete(&self, message_id: Uuid) {
        self.animate_flag.store(false, Ordering::SeqCst);
        let _ = self.events.send(RevealEvent::Completed { message_id });
    }
}

/// Drives the word-by-word reveal of the newest assistant message.
pub struct RevealEngine {
    shared: Arc<Shared>,
    word_delay: Duration,
}

impl RevealEngine {
    /// Create an engine. `animate_flag` is the shared flag the orchestrator
    /// sets when new content should animate; the engine clears it when the
    /// reveal completes.
    pub fn new(config: &RevealConfig, animate_flag: Arc<AtomicBool>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(CursorState {
                    message_id: None,
                    revealed: 0,
                    generation: 0,
                }),
                animate_flag,
                events,
            }),
            word_delay: Duration::from_millis(config.word_delay_ms),
        }
    }

    /// Subscribe to completion notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<RevealEvent> {
        self.shared.events.subscribe()
    }

    /// Current cursor: animating message identity and revealed word count.
    pub fn cursor(&self) -> (Option<Uuid>, usize) {
        let state = self.shared.state.lock().expect("cursor lock poisoned");
        (state.message_id, state.revealed)
    }

    /// Produce a display frame and, when animating, schedule the pending
    /// word reveals.
    ///
    /// Every assistant message except the most recent renders fully
    /// visible. The most recent one renders up to the cursor: resumed when
    /// its identity is unchanged since the last pass, restarted from zero
    /// when the identity changed.
    pub fn render(&self, messages: &[Message], animate: bool) -> RevealFrame {
        let latest_assistant = messages.iter().rev().find(|m| m.is_assistant()).map(|m| m.id);

        let mut rendered = Vec::with_capacity(messages.len());
        match latest_assistant {
            None => {
                let mut state = self.shared.state.lock().expect("cursor lock poisoned");
                state.message_id = None;
                state.revealed = 0;
                state.generation += 1;
                drop(state);
                for message in messages {
                    rendered.push(full_render(message));
                }
            }
            Some(latest_id) => {
                let visible_words = self.advance_cursor(messages, latest_id, animate);
                for message in messages {
                    if message.id == latest_id {
                        rendered.push(partial_render(message, visible_words));
                    } else {
                        rendered.push(full_render(message));
                    }
                }
            }
        }

        RevealFrame { messages: rendered }
    }

    /// Update the cursor for this pass and schedule reveals; returns the
    /// word count visible right now.
    fn advance_cursor(&self, messages: &[Message], latest_id: Uuid, animate: bool) -> usize {
        let content = messages
            .iter()
            .find(|m| m.id == latest_id)
            .map(|m| m.content.as_str())
            .unwrap_or("");
        let total = word_count(content);

        let mut state = self.shared.state.lock().expect("cursor lock poisoned");
        if state.message_id != Some(latest_id) {
            state.message_id = Some(latest_id);
            state.revealed = 0;
        }
        state.generation += 1;
        let generation = state.generation;

        if !animate {
            state.revealed = total;
            return total;
        }

        if total == 0 {
            state.revealed = 0;
            drop(state);
            debug!(message_id = %latest_id, "Empty message, reveal complete");
            self.shared.complete(latest_id);
            return 0;
        }

        let start = state.revealed.min(total);
        drop(state);

        for index in start..total {
            let shared = Arc::clone(&self.shared);
            let delay = self.word_delay * (index - start + 1) as u32;
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                shared.apply_reveal(generation, latest_id, index + 1, total);
            });
        }

        start
    }
}

fn full_render(message: &Message) -> RenderedMessage {
    let total = word_count(&message.content);
    RenderedMessage {
        id: message.id,
        role: message.role,
        content: message.content.clone(),
        visible: message.content.clone(),
        visible_words: total,
        total_words: total,
    }
}

fn partial_render(message: &Message, visible_words: usize) -> RenderedMessage {
    let total = word_count(&message.content);
    let visible_words = visible_words.min(total);
    let visible = if visible_words >= total {
        message.content.clone()
    } else {
        visible_prefix(&message.content, visible_words)
    };
    RenderedMessage {
        id: message.id,
        role: message.role,
        content: message.content.clone(),
        visible,
        visible_words,
        total_words: total,
    }
}

// =============================================================================
// Tests
// =============================================================================
