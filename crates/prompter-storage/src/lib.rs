//! Durable local storage for Prompter.
//!
//! Wraps a single SQLite database and persists the conversation
//! transcript through a key-value table so a later session restore
//! observes the same message log.

pub mod db;
pub mod transcript;

pub use db::Database;
pub use transcript::{TranscriptStore, TRANSCRIPT_KEY};
