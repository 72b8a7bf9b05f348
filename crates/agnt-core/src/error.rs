/// Errors raised by the history store, approval gate, and orchestrator.
///
/// Tool-level errors stay as `agnt_llm::Error` (see `tool.rs`) since tools
/// are defined against that crate's error type; this enum covers the parts
/// of `agnt-core` that don't go through a tool call.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("model error: {0}")]
    Model(#[from] agnt_llm::Error),

    #[error("turn cancelled")]
    Cancelled,

    #[error("turn exceeded its time budget")]
    TurnTimeout,

    #[error("{0}")]
    Other(String),
}
