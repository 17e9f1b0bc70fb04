//! stagecue - Streaming voice agent for a speaking character
//!
//! Turns a model's streamed reply into spoken sentences and stage tags as it
//! arrives, and lets new user input cut a reply off mid-sentence.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod agent;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod error;
pub mod llm;
pub mod logging;
pub mod output;
pub mod pipeline;
pub mod transport;
pub mod tts;

// Core traits (model → pipeline → sink)
pub use llm::LanguageModel;
pub use pipeline::{Consumer, Node};
pub use transport::EventSink;
pub use tts::Synthesizer;

// Orchestration
pub use agent::{OrchestratorConfig, ResponseOrchestrator, TurnState};
pub use pipeline::{PipelineBuilder, SegmentPipeline};

// Error handling
pub use error::{Result, StagecueError};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
