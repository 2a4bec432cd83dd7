use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{CoreError, Result};
use crate::types::Profile;

/// Top-level configuration for the Prompter pipeline.
///
/// Loaded from `~/.prompter/config.toml` by default. Each section
/// corresponds to one component of the response pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrompterConfig {
    #[serde(default)]
    pub profile: ProfileConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub reveal: RevealConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
}

impl PrompterConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: PrompterConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| CoreError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// Active profile settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    /// Coaching profile keying greetings and prompt framing.
    pub active: Profile,
    /// BCP 47 language tag passed through to the model service.
    pub language: String,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            active: Profile::default(),
            language: "en-US".to_string(),
        }
    }
}

/// Generation pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Number of prior turns sent as context with each generation call.
    pub history_turns: usize,
    /// Sampling temperature for the primary generation call.
    pub temperature: f64,
    /// Token budget for the primary generation call.
    pub max_tokens: u32,
    /// Acknowledgment shown while a search augmentation is pending, used
    /// when the model's own reply is empty.
    pub interim_ack: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history_turns: 10,
            temperature: 0.7,
            max_tokens: 2048,
            interim_ack: "Let me look that up for you.".to_string(),
        }
    }
}

/// Word-reveal animation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RevealConfig {
    /// Delay between consecutive word reveals, in milliseconds.
    pub word_delay_ms: u64,
}

impl Default for RevealConfig {
    fn default() -> Self {
        Self { word_delay_ms: 30 }
    }
}

/// Workflow side-effect settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Whether workflow triggers run at all.
    pub enabled: bool,
    /// Workflow key used when the model supplies none.
    pub fallback_workflow: String,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            fallback_workflow: "gmail".to_string(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
