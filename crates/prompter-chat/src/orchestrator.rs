//! Response pipeline orchestrator.
//!
//! Drives the staged call sequence for one user submission: primary
//! generation, structured-action decoding, optional search augmentation,
//! and the detached workflow side effect, writing results into the
//! conversation store. Submissions are serialized; a second one arriving
//! while the reply path is still pending is rejected as busy.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::{debug, info, warn};

use prompter_core::config::PrompterConfig;
use prompter_core::types::Profile;

use crate::error::ChatError;
use crate::parser::{ActionDirective, ActionParser, StructuredAction};
use crate::services::{
    GenerateRequest, HistoryTurn, LinkOpener, ModelService, SearchRequest, SearchService,
    WorkflowRequest, WorkflowService,
};
use crate::store::ConversationStore;

/// Result of one accepted submission.
#[derive(Clone, Debug)]
pub struct SubmissionOutcome {
    /// The assistant message the user ends up seeing.
    pub message_id: uuid::Uuid,
    /// Whether a search augmentation replaced the interim reply.
    pub augmented: bool,
}

/// Central coordinator for the response pipeline.
pub struct Orchestrator {
    store: Arc<ConversationStore>,
    model: Arc<dyn ModelService>,
    search: Arc<dyn SearchService>,
    workflow: Arc<dyn WorkflowService>,
    opener: Arc<dyn LinkOpener>,
    parser: ActionParser,
    config: PrompterConfig,
    in_flight: AtomicBool,
    status: Arc<Mutex<String>>,
    animate: Arc<AtomicBool>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<ConversationStore>,
        model: Arc<dyn ModelService>,
        search: Arc<dyn SearchService>,
        workflow: Arc<dyn WorkflowService>,
        opener: Arc<dyn LinkOpener>,
        config: PrompterConfig,
    ) -> Self {
        Self {
            store,
            model,
            search,
            workflow,
            opener,
            parser: ActionParser,
            config,
            in_flight: AtomicBool::new(false),
            status: Arc::new(Mutex::new(String::new())),
            animate: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The rolling status line. Advisory only; never blocks input.
    pub fn status(&self) -> String {
        self.status.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Shared flag the reveal engine clears when its animation completes.
    pub fn animate_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.animate)
    }

    /// Whether the newest assistant content is waiting to animate.
    pub fn animation_pending(&self) -> bool {
        self.animate.load(Ordering::SeqCst)
    }

    /// Handle one user submission end to end.
    ///
    /// Empty input is rejected before any service call. While a prior
    /// submission's reply path is pending, further submissions fail with
    /// [`ChatError::Busy`]; the detached workflow stage of a finished
    /// submission may still be running and does not hold the slot.
    pub async fn submit(&self, text: &str) -> Result<SubmissionOutcome, ChatError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if trimmed.len() > crate::store::MAX_MESSAGE_LENGTH {
            return Err(ChatError::MessageTooLong(crate::store::MAX_MESSAGE_LENGTH));
        }

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            self.set_status("Still working on the previous answer");
            return Err(ChatError::Busy);
        }

        let result = self.run_reply_path(trimmed).await;
        self.in_flight.store(false, Ordering::SeqCst);
        result
    }

    // -----------------------------------------------------------------
    // Stages
    // -----------------------------------------------------------------

    async fn run_reply_path(&self, text: &str) -> Result<SubmissionOutcome, ChatError> {
        let profile = self.config.profile.active;

        // Stage A: primary generation.
        self.set_status("Thinking\u{2026}");
        let request = GenerateRequest {
            user_message: text.to_string(),
            system_prompt: system_prompt(profile, &self.config.profile.language),
            history: self.recent_history(),
            temperature: self.config.chat.temperature,
            max_tokens: self.config.chat.max_tokens,
        };

        let envelope = match self.model.generate(request).await {
            Ok(envelope) if envelope.success => envelope,
            Ok(envelope) => {
                let reason = envelope
                    .error
                    .unwrap_or_else(|| "model service reported failure".to_string());
                self.set_status(format!("Couldn't get an answer: {}", reason));
                return Err(ChatError::Transport(reason));
            }
            Err(e) => {
                self.set_status(format!("Couldn't reach the model service: {}", e));
                return Err(e);
            }
        };

        let suggestion = envelope.response.workflow().cloned();
        let raw = envelope.response.text().to_string();
        let outcome = self.parser.parse(&raw, text);
        if outcome.is_fallback() {
            debug!("Model reply was not structured JSON, using plain-text fallback");
        }
        let action = outcome.into_action();

        // The pipeline mutates the store only once generation has
        // succeeded, so an aborted submission leaves no partial message
        // and resubmitting the same text is the recovery path.
        self.store.append_user(text)?;

        // Stage B: branch on search intent.
        let (message, augmented) = if action.should_search {
            let interim = if action.reply.trim().is_empty() {
                self.config.chat.interim_ack.clone()
            } else {
                action.reply.clone()
            };
            let interim_message = self.store.append_assistant(&interim)?;
            self.animate.store(true, Ordering::SeqCst);

            // Stage C: search augmentation.
            self.set_status("Checking the latest\u{2026}");
            match self.run_search(text, &interim, &action, profile).await {
                Some(augmented_text) => {
                    let replaced = self.store.replace_last_assistant(&augmented_text)?;
                    self.animate.store(true, Ordering::SeqCst);
                    self.set_status("Ready");
                    (replaced, true)
                }
                None => (interim_message, false),
            }
        } else {
            let message = self.store.append_assistant(&action.reply)?;
            self.animate.store(true, Ordering::SeqCst);
            self.set_status("Ready");
            (message, false)
        };

        // Stage D: detached workflow side effect.
        self.spawn_workflow_stage(&action, suggestion, text);

        Ok(SubmissionOutcome {
            message_id: message.id,
            augmented,
        })
    }

    /// Stage C call. Returns the augmented text, or None when the interim
    /// reply should stand.
    async fn run_search(
        &self,
        user_message: &str,
        interim: &str,
        action: &StructuredAction,
        profile: Profile,
    ) -> Option<String> {
        let request = SearchRequest {
            user_message: user_message.to_string(),
            initial_response: interim.to_string(),
            profile,
            search_query: action.search_query.clone(),
        };

        match self.search.augment(request).await {
            Ok(response) if response.success && !response.response.is_empty() => {
                Some(response.response)
            }
            Ok(response) => {
                let reason = response
                    .error
                    .unwrap_or_else(|| "empty search result".to_string());
                warn!(reason = %reason, "Search augmentation failed, keeping interim reply");
                self.set_status("Search unavailable, showing the first answer");
                None
            }
            Err(e) => {
                warn!(error = %e, "Search augmentation failed, keeping interim reply");
                self.set_status(format!("Search failed: {}", e));
                None
            }
        }
    }

    /// Stage D. Runs after the reply path settles and is never awaited by
    /// it; failures surface only in the status line.
    fn spawn_workflow_stage(
        &self,
        action: &StructuredAction,
        suggestion: Option<Value>,
        user_message: &str,
    ) {
        if !self.config.workflow.enabled {
            return;
        }

        let (target_text, task_summary) = match (&action.action, &suggestion) {
            (ActionDirective::Workflow { target, task }, _) => (target.clone(), task.clone()),
            // A vendor suggestion alone is enough to trigger.
            (ActionDirective::None, Some(_)) => {
                (user_message.to_string(), action.reply.clone())
            }
            (ActionDirective::None, None) => return,
        };

        let fallback = self.config.workflow.fallback_workflow.clone();
        let workflow_key = suggestion
            .as_ref()
            .and_then(|s| s.get("key"))
            .and_then(Value::as_str)
            .unwrap_or(&fallback)
            .to_string();

        let request = WorkflowRequest {
            workflow_key,
            target_text,
            task_summary,
            user_message: user_message.to_string(),
            fallback_workflow: fallback,
        };

        let service = Arc::clone(&self.workflow);
        let opener = Arc::clone(&self.opener);
        let status = Arc::clone(&self.status);

        tokio::spawn(async move {
            match service.trigger(request).await {
                Ok(response) if response.success => {
                    let label = response
                        .workflow
                        .map(|w| w.label)
                        .unwrap_or_else(|| "Workflow".to_string());
                    match response.redirect_url {
                        Some(url) => match opener.open(&url) {
                            Ok(()) => {
                                info!(label = %label, "Workflow launched");
                                write_status(
                                    &status,
                                    format!("{} opened, finish up in your browser", label),
                                );
                            }
                            Err(e) => {
                                warn!(error = %e, "Workflow redirect rejected");
                                write_status(&status, format!("Workflow error: {}", e));
                            }
                        },
                        None => {
                            info!(label = %label, "Workflow ready");
                            write_status(&status, format!("{} is ready", label));
                        }
                    }
                }
                Ok(response) => {
                    let reason = response
                        .error
                        .unwrap_or_else(|| "workflow service reported failure".to_string());
                    warn!(reason = %reason, "Workflow trigger failed");
                    write_status(&status, format!("Workflow error: {}", reason));
                }
                Err(e) => {
                    warn!(error = %e, "Workflow trigger failed");
                    write_status(&status, format!("Workflow error: {}", e));
                }
            }
        });
    }

    // -----------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------

    /// The last N prior turns, oldest first.
    fn recent_history(&self) -> Vec<HistoryTurn> {
        let messages = self.store.messages();
        let turns = self.config.chat.history_turns;
        let skip = messages.len().saturating_sub(turns);
        messages
            .into_iter()
            .skip(skip)
            .map(|m| HistoryTurn {
                role: m.role,
                content: m.content,
            })
            .collect()
    }

    fn set_status(&self, text: impl Into<String>) {
        write_status(&self.status, text.into());
    }
}

fn write_status(slot: &Mutex<String>, text: String) {
    if let Ok(mut status) = slot.lock() {
        *status = text;
    }
}

/// System instruction mandating the strict JSON reply shape.
fn system_prompt(profile: Profile, language: &str) -> String {
    format!(
        "You are a real-time {} copilot. Answer in {}. Respond with a single \
         JSON object and no prose outside it, shaped exactly as: {{\"reply\": \
         string, \"should_search\": boolean, \"search_query\": string, \
         \"action\": {{\"type\": \"none\" | \"composio_workflow\", \"target\": \
         string, \"task\": string}}}}. Set should_search only when the answer \
         needs information fresher than you hold, and put the lookup terms in \
         search_query.",
        profile, language
    )
}

// =============================================================================
// Tests
// =============================================================================
