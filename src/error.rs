//! Error types for stagecue.

use crate::pipeline::error::NodeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StagecueError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Language model errors
    #[error("Model request failed: {message}")]
    ModelRequest { message: String },

    #[error("Model protocol error: {message}")]
    ModelProtocol { message: String },

    // Speech synthesis errors
    #[error("Speech synthesis failed: {message}")]
    Synthesis { message: String },

    // Transport errors
    #[error("Transport connection failed: {message}")]
    TransportConnection { message: String },

    #[error("Transport protocol error: {message}")]
    TransportProtocol { message: String },

    #[error("Transport closed")]
    TransportClosed,

    // Pipeline errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] NodeError),

    // Serialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, StagecueError>;
