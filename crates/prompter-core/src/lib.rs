//! Shared kernel for the Prompter workspace.
//!
//! Defines the conversation domain types, the top-level error taxonomy,
//! configuration loading, and the domain events announced when the
//! conversation log changes.

pub mod config;
pub mod error;
pub mod events;
pub mod types;

pub use config::PrompterConfig;
pub use error::{CoreError, Result};
pub use events::ConversationEvent;
pub use types::{Message, Profile, Role, Timestamp};
