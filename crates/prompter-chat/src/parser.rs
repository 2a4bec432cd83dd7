//! Structured action decoding for model replies.
//!
//! The model is instructed to answer with a strict JSON shape, but its
//! output is untrusted: replies arrive wrapped in markdown fences, with
//! missing or mistyped fields, or as plain prose. Decoding is therefore a
//! total function: anything that fails strict JSON decode becomes a
//! plain-text reply, and decoded fields are coerced to safe defaults.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

/// A fenced code block wrapping the whole payload, optionally tagged `json`.
static FENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\s*```(?:json)?\s*\n?(.*?)\n?\s*```\s*$").expect("Invalid fence regex")
});

/// Wire name of the workflow action type.
const WORKFLOW_ACTION_TYPE: &str = "composio_workflow";

// =============================================================================
// Types
// =============================================================================

/// Directive attached to a structured reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActionDirective {
    None,
    Workflow { target: String, task: String },
}

/// Decoded intent envelope produced from one model reply.
#[derive(Clone, Debug, PartialEq)]
pub struct StructuredAction {
    pub reply: String,
    pub should_search: bool,
    pub search_query: String,
    pub action: ActionDirective,
}

/// Outcome of decoding a raw payload.
///
/// Both variants carry a complete [`StructuredAction`]; the variant records
/// whether strict JSON decode produced it or the plain-text fallback did.
#[derive(Clone, Debug, PartialEq)]
pub enum ParseOutcome {
    Structured(StructuredAction),
    PlainText(StructuredAction),
}

impl ParseOutcome {
    pub fn into_action(self) -> StructuredAction {
        match self {
            ParseOutcome::Structured(action) | ParseOutcome::PlainText(action) => action,
        }
    }

    pub fn action(&self) -> &StructuredAction {
        match self {
            ParseOutcome::Structured(action) | ParseOutcome::PlainText(action) => action,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, ParseOutcome::PlainText(_))
    }
}

// =============================================================================
// ActionParser
// =============================================================================

/// Permissive decoder from raw model text to a [`StructuredAction`].
pub struct ActionParser;

impl ActionParser {
    /// Decode a raw payload. Never fails.
    ///
    /// `user_message` supplies the fallback search query when the model
    /// requests a search without naming one, and the fallback workflow
    /// target when the action omits it.
    pub fn parse(&self, raw: &str, user_message: &str) -> ParseOutcome {
        let candidate = strip_fence(raw);

        let map = match serde_json::from_str::<Value>(candidate) {
            Ok(Value::Object(map)) => map,
            _ => return ParseOutcome::PlainText(plain_text_action(raw)),
        };

        let reply = string_field(&map, "reply")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| raw.to_string());

        let should_search = map
            .get("should_search")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let search_query = if should_search {
            string_field(&map, "search_query")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| user_message.to_string())
        } else {
            String::new()
        };

        let action = decode_action(map.get("action"), user_message, &reply);

        ParseOutcome::Structured(StructuredAction {
            reply,
            should_search,
            search_query,
            action,
        })
    }
}

/// Peel one fenced wrapper off the payload, if present.
fn strip_fence(raw: &str) -> &str {
    match FENCE_RE.captures(raw) {
        Some(caps) => caps.get(1).map(|m| m.as_str()).unwrap_or(raw),
        None => raw,
    }
}

fn plain_text_action(raw: &str) -> StructuredAction {
    StructuredAction {
        reply: raw.to_string(),
        should_search: false,
        search_query: String::new(),
        action: ActionDirective::None,
    }
}

fn string_field(map: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    map.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Decode the `action` object, coercing unknown types and blank fields.
///
/// A workflow directive survives only when both target and task resolve to
/// non-empty strings; the user message and the reply text serve as the
/// respective fallbacks.
fn decode_action(value: Option<&Value>, user_message: &str, reply: &str) -> ActionDirective {
    let Some(Value::Object(action)) = value else {
        return ActionDirective::None;
    };

    match action.get("type").and_then(Value::as_str) {
        Some(WORKFLOW_ACTION_TYPE) => {
            let target = action
                .get("target")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or(user_message)
                .to_string();
            let task = action
                .get("task")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or(reply)
                .to_string();

            if target.trim().is_empty() || task.trim().is_empty() {
                ActionDirective::None
            } else {
                ActionDirective::Workflow { target, task }
            }
        }
        _ => ActionDirective::None,
    }
}

// =============================================================================
// Tests
// =============================================================================
