use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub root_dir: PathBuf,
    pub name: Option<String>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub project_id: String,
    pub title: Option<String>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

/// One row of a session's rollout. `commands_run`/`files_modified` are
/// scanned out of that turn's tool calls by the caller before persisting,
/// not recomputed here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub id: String,
    pub session_id: String,
    pub seq: i64,
    pub user_parts: serde_json::Value,
    pub assistant_parts: serde_json::Value,
    pub commands_run: Vec<String>,
    pub files_modified: Vec<String>,
    pub usage: Option<serde_json::Value>,
    pub created_at_ms: i64,
}

/// The session rollout file shape: `{messages, commands_run,
/// files_modified, created_at, updated_at, session_id}`, assembled by
/// concatenating every turn's parts in `seq` order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRollout {
    pub session_id: String,
    pub messages: Vec<serde_json::Value>,
    pub commands_run: Vec<String>,
    pub files_modified: Vec<String>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionInput {
    pub project_id: String,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppendTurnInput {
    pub session_id: String,
    pub user_parts: serde_json::Value,
    pub assistant_parts: serde_json::Value,
    pub commands_run: Vec<String>,
    pub files_modified: Vec<String>,
    pub usage: Option<serde_json::Value>,
}
