//! Service boundaries of the response pipeline.
//!
//! Wire-contract types and async traits for the external collaborators:
//! the primary model service, the search-augmented service, and the
//! workflow-automation service, plus the opener used for workflow
//! redirect URLs. The privileged host process implements these; tests
//! substitute doubles.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use prompter_core::types::{Profile, Role};

use crate::error::ChatError;

// =============================================================================
// Primary generation call
// =============================================================================

/// One prior turn included as model context.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryTurn {
    pub role: Role,
    pub content: String,
}

/// Request body for the primary generation call.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub user_message: String,
    pub system_prompt: String,
    pub history: Vec<HistoryTurn>,
    pub temperature: f64,
    pub max_tokens: u32,
}

/// The model payload: bare text, or text carrying a vendor workflow
/// suggestion object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseBody {
    Rich {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        workflow: Option<Value>,
    },
    Text(String),
}

impl Default for ResponseBody {
    fn default() -> Self {
        ResponseBody::Text(String::new())
    }
}

impl ResponseBody {
    /// The reply text, regardless of shape.
    pub fn text(&self) -> &str {
        match self {
            ResponseBody::Text(text) => text,
            ResponseBody::Rich { text, .. } => text,
        }
    }

    /// The vendor workflow suggestion, if the payload carried one.
    pub fn workflow(&self) -> Option<&Value> {
        match self {
            ResponseBody::Text(_) => None,
            ResponseBody::Rich { workflow, .. } => workflow.as_ref(),
        }
    }
}

/// Response envelope from the primary generation call.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub success: bool,
    #[serde(default)]
    pub response: ResponseBody,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// =============================================================================
// Search-augmentation call
// =============================================================================

/// Request body for the search-augmented service.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub user_message: String,
    pub initial_response: String,
    pub profile: Profile,
    pub search_query: String,
}

/// Response envelope from the search-augmented service.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub success: bool,
    #[serde(default)]
    pub response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// =============================================================================
// Workflow-trigger call
// =============================================================================

/// Request body for the workflow-automation service.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRequest {
    pub workflow_key: String,
    pub target_text: String,
    pub task_summary: String,
    pub user_message: String,
    pub fallback_workflow: String,
}

/// Resolved workflow descriptor returned by the automation service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkflowInfo {
    pub label: String,
}

/// Response envelope from the workflow-automation service.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowResponse {
    pub success: bool,
    #[serde(default)]
    pub workflow: Option<WorkflowInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// =============================================================================
// Service traits
// =============================================================================

/// The primary model service.
#[async_trait]
pub trait ModelService: Send + Sync {
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, ChatError>;
}

/// The search-augmented answer service.
#[async_trait]
pub trait SearchService: Send + Sync {
    async fn augment(&self, request: SearchRequest) -> Result<SearchResponse, ChatError>;
}

/// The workflow-automation service.
#[async_trait]
pub trait WorkflowService: Send + Sync {
    async fn trigger(&self, request: WorkflowRequest) -> Result<WorkflowResponse, ChatError>;
}

/// Opens workflow redirect URLs externally.
pub trait LinkOpener: Send + Sync {
    fn open(&self, url: &str) -> Result<(), ChatError>;
}

/// Default opener: validates the scheme and logs the URL for the host
/// shell to pick up. Only `http://` and `https://` are allowed.
pub struct LoggingLinkOpener;

impl LinkOpener for LoggingLinkOpener {
    fn open(&self, url: &str) -> Result<(), ChatError> {
        if url.is_empty() {
            return Err(ChatError::Workflow("redirect URL is empty".to_string()));
        }
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ChatError::Workflow(format!(
                "Unsupported URL scheme. Only http:// and https:// are allowed, got: {}",
                url
            )));
        }
        tracing::info!(url = %url, "Opened workflow redirect");
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
