use std::path::Path;
use std::sync::Arc;

use agnt_core::history::Entry;
use agnt_core::{Agent, ConversationState};
use agnt_db::{AppendTurnInput, CreateSessionInput, Session, Store};
use agnt_llm::stream::Usage;
use parking_lot::Mutex;
use serde_json::Value;

pub type SharedSessionStore = Arc<Mutex<SessionStore>>;

const SESSION_TITLE_MAX_CHARS: usize = 80;
const ADD_FILE_PREFIX: &str = "*** Add File: ";
const UPDATE_FILE_PREFIX: &str = "*** Update File: ";
const DELETE_FILE_PREFIX: &str = "*** Delete File: ";

pub struct SessionStore {
    store: Arc<Mutex<Store>>,
    project_id: String,
    active_session_id: Option<String>,
}

impl SessionStore {
    pub fn open_for_project_root(
        store: Arc<Mutex<Store>>,
        project_root: &Path,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let project = {
            let mut db = store.lock();
            db.sessions().upsert_project(project_root, None)?
        };

        Ok(Self {
            store,
            project_id: project.id,
            active_session_id: None,
        })
    }

    pub fn list_sessions(&self, limit: usize) -> Result<Vec<Session>, Box<dyn std::error::Error>> {
        let mut db = self.store.lock();
        Ok(db
            .sessions()
            .list_sessions_for_project(&self.project_id, limit)?)
    }

    pub fn active_session_id(&self) -> Option<&str> {
        self.active_session_id.as_deref()
    }

    pub fn clear_active_session(&mut self) {
        self.active_session_id = None;
    }

    pub fn create_session(
        &mut self,
        title: Option<String>,
    ) -> Result<Session, Box<dyn std::error::Error>> {
        let session = {
            let mut db = self.store.lock();
            db.sessions().create_session(CreateSessionInput {
                project_id: self.project_id.clone(),
                title,
            })?
        };

        self.active_session_id = Some(session.id.clone());
        Ok(session)
    }

    pub fn ensure_active_session(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if self.active_session_id.is_none() {
            self.create_session(None)?;
        }
        Ok(())
    }

    pub fn activate_session(
        &mut self,
        session_id: &str,
    ) -> Result<Option<ConversationState>, Box<dyn std::error::Error>> {
        let session = {
            let mut db = self.store.lock();
            db.sessions()
                .get_session(session_id)?
                .ok_or_else(|| format!("session not found: {session_id}"))?
        };

        if session.project_id != self.project_id {
            return Err(format!(
                "session '{session_id}' does not belong to project '{}'",
                self.project_id
            )
            .into());
        }

        self.active_session_id = Some(session.id.clone());
        self.load_active_conversation_state()
    }

    pub fn resume_most_recent_session(
        &mut self,
    ) -> Result<Option<ConversationState>, Box<dyn std::error::Error>> {
        let latest_session_id = {
            let mut db = self.store.lock();
            db.sessions()
                .list_sessions_for_project(&self.project_id, 1)?
                .into_iter()
                .next()
                .map(|session| session.id)
        };

        let Some(session_id) = latest_session_id else {
            return Ok(None);
        };

        self.active_session_id = Some(session_id);
        self.load_active_conversation_state()
    }

    pub fn load_active_conversation_state(
        &mut self,
    ) -> Result<Option<ConversationState>, Box<dyn std::error::Error>> {
        let Some(session_id) = self.active_session_id.as_deref() else {
            return Ok(None);
        };

        let rollout = {
            let mut db = self.store.lock();
            db.sessions().rollout(session_id)?
        };

        if rollout.messages.is_empty() {
            return Ok(None);
        }

        let entries = rollout
            .messages
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Entry>, _>>()?;

        Ok(Some(ConversationState { entries }))
    }

    pub fn persist_turn_from_agent(
        &mut self,
        agent: &Agent,
        usage: &Usage,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let Some(session_id) = self.active_session_id.clone() else {
            return Err("no active session selected".into());
        };

        let snapshot = agent.conversation_state();
        let turn = extract_latest_turn(&snapshot.entries)?;
        let session_title = derive_session_title(&snapshot.entries);

        let mut db = self.store.lock();
        db.sessions().append_turn(AppendTurnInput {
            session_id: session_id.clone(),
            user_parts: turn.user_parts,
            assistant_parts: turn.assistant_parts,
            commands_run: turn.commands_run,
            files_modified: turn.files_modified,
            usage: Some(serde_json::to_value(usage)?),
        })?;

        if let Some(title) = session_title.as_deref() {
            db.sessions()
                .set_session_title_if_missing(&session_id, title)?;
        }

        Ok(())
    }
}

pub fn session_label(session: &Session) -> String {
    if let Some(title) = &session.title {
        return format!("{title} ({})", session.id);
    }
    format!("Session {}", session.id)
}

struct LatestTurn {
    user_parts: Value,
    assistant_parts: Value,
    commands_run: Vec<String>,
    files_modified: Vec<String>,
}

/// Split the conversation's tail into the most recent user entry and
/// everything the assistant produced in reply to it, deriving
/// `commands_run`/`files_modified` by scanning the tool calls in between
/// rather than storing them separately.
fn extract_latest_turn(entries: &[Entry]) -> Result<LatestTurn, Box<dyn std::error::Error>> {
    let user_idx = entries
        .iter()
        .rposition(|e| matches!(e, Entry::UserText(_)))
        .ok_or("cannot persist turn: no user message found")?;

    let user_parts = match &entries[user_idx] {
        Entry::UserText(text) => serde_json::to_value(text)?,
        _ => return Err("cannot persist turn: invalid user entry shape".into()),
    };

    let tail = &entries[user_idx + 1..];
    if tail.is_empty() {
        return Err("cannot persist turn: no assistant content found for latest user turn".into());
    }

    let assistant_parts = serde_json::to_value(tail)?;

    let mut commands_run = Vec::new();
    let mut files_modified = Vec::new();
    for entry in tail {
        if let Entry::AssistantToolRequest(calls) = entry {
            for call in calls {
                match call.name.as_str() {
                    "execute_command" => {
                        if let Some(command) = extract_string_arg(&call.arguments, "command") {
                            push_unique(&mut commands_run, command);
                        }
                    }
                    "write_file" => {
                        if let Some(path) = extract_string_arg(&call.arguments, "path") {
                            push_unique(&mut files_modified, path);
                        }
                    }
                    "patch_file" => {
                        if let Some(patch) = extract_string_arg(&call.arguments, "patch") {
                            for path in paths_touched_by_patch(&patch) {
                                push_unique(&mut files_modified, path);
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    Ok(LatestTurn {
        user_parts,
        assistant_parts,
        commands_run,
        files_modified,
    })
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !list.contains(&value) {
        list.push(value);
    }
}

fn extract_string_arg(arguments_json: &str, field: &str) -> Option<String> {
    let value: Value = serde_json::from_str(arguments_json).ok()?;
    value.get(field)?.as_str().map(str::to_string)
}

fn paths_touched_by_patch(patch: &str) -> Vec<String> {
    patch
        .lines()
        .filter_map(|line| {
            for prefix in [ADD_FILE_PREFIX, UPDATE_FILE_PREFIX, DELETE_FILE_PREFIX] {
                if let Some(path) = line.strip_prefix(prefix) {
                    return Some(path.trim().to_string());
                }
            }
            None
        })
        .collect()
}

fn derive_session_title(entries: &[Entry]) -> Option<String> {
    let first_user_text = entries.iter().find_map(|entry| match entry {
        Entry::UserText(text) => Some(text.as_str()),
        _ => None,
    })?;

    let normalized = first_user_text.split_whitespace().collect::<Vec<_>>().join(" ");

    if normalized.is_empty() {
        return None;
    }

    Some(truncate_with_ellipsis(&normalized, SESSION_TITLE_MAX_CHARS))
}

fn truncate_with_ellipsis(input: &str, max_chars: usize) -> String {
    if input.chars().count() <= max_chars {
        return input.to_string();
    }

    let mut truncated = input.chars().take(max_chars).collect::<String>();
    truncated.push('…');
    truncated
}

#[cfg(test)]
mod tests {
    use super::*;
    use agnt_core::history::ToolCallRecord;

    #[test]
    fn extracts_commands_and_files_from_the_latest_turn() {
        let entries = vec![
            Entry::SystemText("be helpful".into()),
            Entry::UserText("please fix the build".into()),
            Entry::AssistantToolRequest(vec![ToolCallRecord {
                id: "c1".into(),
                name: "execute_command".into(),
                arguments: r#"{"command":"cargo test"}"#.into(),
            }]),
            Entry::ToolResult {
                call_id: "c1".into(),
                name: "execute_command".into(),
                payload: Value::String("ok".into()),
                ok: true,
            },
            Entry::AssistantToolRequest(vec![ToolCallRecord {
                id: "c2".into(),
                name: "write_file".into(),
                arguments: r#"{"path":"src/lib.rs","content":"..."}"#.into(),
            }]),
            Entry::ToolResult {
                call_id: "c2".into(),
                name: "write_file".into(),
                payload: Value::String("wrote 3 bytes".into()),
                ok: true,
            },
            Entry::AssistantText("done".into()),
        ];

        let turn = extract_latest_turn(&entries).unwrap();
        assert_eq!(turn.commands_run, vec!["cargo test".to_string()]);
        assert_eq!(turn.files_modified, vec!["src/lib.rs".to_string()]);
    }

    #[test]
    fn derives_files_touched_by_a_patch() {
        let patch = "*** Begin Patch\n*** Add File: a.txt\n+hi\n*** Update File: b.txt\n@1:abcd\n-x\n+y\n*** End Patch\n";
        let paths = paths_touched_by_patch(patch);
        assert_eq!(paths, vec!["a.txt".to_string(), "b.txt".to_string()]);
    }

    #[test]
    fn title_comes_from_the_first_user_entry() {
        let entries = vec![
            Entry::SystemText("be helpful".into()),
            Entry::UserText("  refactor   the parser  ".into()),
        ];
        assert_eq!(
            derive_session_title(&entries),
            Some("refactor the parser".to_string())
        );
    }
}
