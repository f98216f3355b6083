use thiserror::Error;

pub mod entry;
pub mod risk;
pub mod wire;

pub use entry::{
    CommandDraft, CommandEntry, EntryId, clamp_confidence, format_timestamp, parse_timestamp,
    truncate_to_millis,
};
pub use risk::{RiskLevel, RiskPresentation, risk_presentation};
pub use wire::{ClassificationRequest, ClassificationResponse, RequestContext};

/// rllm specific error types
#[derive(Error, Debug)]
pub enum RllmError {
    #[error("Snapshot validation failed: {0}")]
    Validation(String),

    #[error("No history entry with id {0}")]
    NotFound(EntryId),

    #[error("Command generation failed: {0}")]
    Generation(String),

    #[error("Classification superseded by a newer request")]
    Superseded,

    #[error("Storage operation failed: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

pub type RllmResult<T> = std::result::Result<T, RllmError>;
