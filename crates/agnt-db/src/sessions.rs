use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::types::Type;
use rusqlite::{OptionalExtension, Row, Transaction, params};

use crate::database::Database;
use crate::error::{Error, Result};
use crate::models::{AppendTurnInput, CreateSessionInput, Project, Session, SessionRollout, Turn};

pub struct Sessions<'db> {
    pub(crate) db: &'db mut Database,
}

impl Sessions<'_> {
    pub fn upsert_project(
        &mut self,
        root_dir: impl AsRef<Path>,
        name: Option<String>,
    ) -> Result<Project> {
        let root_dir = path_to_string(root_dir.as_ref());
        let now = now_ms();

        let tx = self.db.conn.transaction()?;

        let existing = tx
            .query_row(
                "SELECT id, root_dir, name, created_at_ms, updated_at_ms
                 FROM projects
                 WHERE root_dir = ?1",
                params![root_dir],
                row_to_project,
            )
            .optional()?;

        let project = if let Some(mut project) = existing {
            if name.is_some() && project.name != name {
                tx.execute(
                    "UPDATE projects
                     SET name = ?2, updated_at_ms = ?3
                     WHERE id = ?1",
                    params![project.id, name, now],
                )?;
                project.name = name;
                project.updated_at_ms = now;
            }
            project
        } else {
            let id = generate_id(&tx, "proj")?;
            tx.execute(
                "INSERT INTO projects (id, root_dir, name, created_at_ms, updated_at_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, root_dir, name, now, now],
            )?;
            Project {
                id,
                root_dir: PathBuf::from(root_dir),
                name,
                created_at_ms: now,
                updated_at_ms: now,
            }
        };

        tx.commit()?;
        Ok(project)
    }

    pub fn project_by_root_dir(&self, root_dir: impl AsRef<Path>) -> Result<Option<Project>> {
        let root_dir = path_to_string(root_dir.as_ref());
        self.db
            .conn
            .query_row(
                "SELECT id, root_dir, name, created_at_ms, updated_at_ms
                 FROM projects
                 WHERE root_dir = ?1",
                params![root_dir],
                row_to_project,
            )
            .optional()
            .map_err(Error::from)
    }

    pub fn get_project(&self, project_id: &str) -> Result<Option<Project>> {
        self.db
            .conn
            .query_row(
                "SELECT id, root_dir, name, created_at_ms, updated_at_ms
                 FROM projects
                 WHERE id = ?1",
                params![project_id],
                row_to_project,
            )
            .optional()
            .map_err(Error::from)
    }

    pub fn create_session(&mut self, input: CreateSessionInput) -> Result<Session> {
        let now = now_ms();
        let tx = self.db.conn.transaction()?;

        ensure_project_exists(&tx, &input.project_id)?;

        let id = generate_id(&tx, "sess")?;
        tx.execute(
            "INSERT INTO sessions (id, project_id, title, created_at_ms, updated_at_ms)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, input.project_id, input.title, now, now],
        )?;

        let session = tx.query_row(
            "SELECT id, project_id, title, created_at_ms, updated_at_ms
             FROM sessions
             WHERE id = ?1",
            params![id],
            row_to_session,
        )?;

        tx.commit()?;
        Ok(session)
    }

    pub fn get_session(&self, session_id: &str) -> Result<Option<Session>> {
        self.db
            .conn
            .query_row(
                "SELECT id, project_id, title, created_at_ms, updated_at_ms
                 FROM sessions
                 WHERE id = ?1",
                params![session_id],
                row_to_session,
            )
            .optional()
            .map_err(Error::from)
    }

    pub fn list_sessions_for_project(
        &self,
        project_id: &str,
        limit: usize,
    ) -> Result<Vec<Session>> {
        let mut stmt = self.db.conn.prepare(
            "SELECT id, project_id, title, created_at_ms, updated_at_ms
             FROM sessions
             WHERE project_id = ?1
             ORDER BY updated_at_ms DESC
             LIMIT ?2",
        )?;

        let iter = stmt.query_map(params![project_id, limit as i64], row_to_session)?;
        collect_rows(iter)
    }

    pub fn set_session_title_if_missing(&mut self, session_id: &str, title: &str) -> Result<()> {
        let title = title.trim();
        if title.is_empty() {
            return Ok(());
        }

        let now = now_ms();
        let tx = self.db.conn.transaction()?;

        ensure_session_exists(&tx, session_id)?;

        tx.execute(
            "UPDATE sessions
             SET title = ?2, updated_at_ms = ?3
             WHERE id = ?1
               AND (title IS NULL OR trim(title) = '')",
            params![session_id, title, now],
        )?;

        tx.commit()?;
        Ok(())
    }

    /// Appends the next turn of a session's linear rollout. `seq` is
    /// assigned as one past the session's current turn count.
    pub fn append_turn(&mut self, input: AppendTurnInput) -> Result<Turn> {
        let now = now_ms();
        let tx = self.db.conn.transaction()?;

        ensure_session_exists(&tx, &input.session_id)?;

        let next_seq: i64 = tx.query_row(
            "SELECT COALESCE(MAX(seq), -1) + 1 FROM turns WHERE session_id = ?1",
            params![input.session_id],
            |row| row.get(0),
        )?;

        let turn_id = generate_id(&tx, "turn")?;
        let user_parts_json = serde_json::to_string(&input.user_parts)?;
        let assistant_parts_json = serde_json::to_string(&input.assistant_parts)?;
        let commands_run_json = serde_json::to_string(&input.commands_run)?;
        let files_modified_json = serde_json::to_string(&input.files_modified)?;
        let usage_json = input
            .usage
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        tx.execute(
            "INSERT INTO turns (
                id, session_id, seq,
                user_parts_json, assistant_parts_json,
                commands_run_json, files_modified_json,
                usage_json, created_at_ms
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                turn_id,
                input.session_id,
                next_seq,
                user_parts_json,
                assistant_parts_json,
                commands_run_json,
                files_modified_json,
                usage_json,
                now
            ],
        )?;

        tx.execute(
            "UPDATE sessions SET updated_at_ms = ?2 WHERE id = ?1",
            params![input.session_id, now],
        )?;

        let turn = tx.query_row(
            "SELECT
                id, session_id, seq,
                user_parts_json, assistant_parts_json,
                commands_run_json, files_modified_json,
                usage_json, created_at_ms
             FROM turns
             WHERE id = ?1",
            params![turn_id],
            row_to_turn,
        )?;

        tx.commit()?;
        Ok(turn)
    }

    pub fn get_turn(&self, turn_id: &str) -> Result<Option<Turn>> {
        self.db
            .conn
            .query_row(
                "SELECT
                    id, session_id, seq,
                    user_parts_json, assistant_parts_json,
                    commands_run_json, files_modified_json,
                    usage_json, created_at_ms
                 FROM turns
                 WHERE id = ?1",
                params![turn_id],
                row_to_turn,
            )
            .optional()
            .map_err(Error::from)
    }

    pub fn list_turns_for_session(&self, session_id: &str) -> Result<Vec<Turn>> {
        let mut stmt = self.db.conn.prepare(
            "SELECT
                id, session_id, seq,
                user_parts_json, assistant_parts_json,
                commands_run_json, files_modified_json,
                usage_json, created_at_ms
             FROM turns
             WHERE session_id = ?1
             ORDER BY seq ASC",
        )?;
        let iter = stmt.query_map(params![session_id], row_to_turn)?;
        collect_rows(iter)
    }

    /// Assembles the session rollout shape by scanning every turn in
    /// order; `commands_run`/`files_modified` are unioned rather than
    /// stored as separate mutable state.
    pub fn rollout(&self, session_id: &str) -> Result<SessionRollout> {
        let session = self
            .get_session(session_id)?
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))?;
        let turns = self.list_turns_for_session(session_id)?;

        let mut messages = Vec::new();
        let mut commands_run = Vec::new();
        let mut files_modified = Vec::new();

        for turn in turns {
            messages.push(turn.user_parts);
            messages.push(turn.assistant_parts);
            for command in turn.commands_run {
                if !commands_run.contains(&command) {
                    commands_run.push(command);
                }
            }
            for path in turn.files_modified {
                if !files_modified.contains(&path) {
                    files_modified.push(path);
                }
            }
        }

        Ok(SessionRollout {
            session_id: session.id,
            messages,
            commands_run,
            files_modified,
            created_at_ms: session.created_at_ms,
            updated_at_ms: session.updated_at_ms,
        })
    }
}

fn ensure_project_exists(tx: &Transaction<'_>, project_id: &str) -> Result<()> {
    let exists = tx
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM projects WHERE id = ?1)",
            params![project_id],
            |row| row.get::<_, i64>(0),
        )
        .map(|n| n != 0)?;
    if exists {
        Ok(())
    } else {
        Err(Error::ProjectNotFound(project_id.to_string()))
    }
}

fn ensure_session_exists(tx: &Transaction<'_>, session_id: &str) -> Result<()> {
    let exists = tx
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM sessions WHERE id = ?1)",
            params![session_id],
            |row| row.get::<_, i64>(0),
        )
        .map(|n| n != 0)?;
    if exists {
        Ok(())
    } else {
        Err(Error::SessionNotFound(session_id.to_string()))
    }
}

fn generate_id(tx: &Transaction<'_>, prefix: &str) -> rusqlite::Result<String> {
    tx.query_row("SELECT lower(hex(randomblob(16)))", [], |row| {
        let suffix: String = row.get(0)?;
        Ok(format!("{prefix}_{suffix}"))
    })
}

fn row_to_project(row: &Row<'_>) -> rusqlite::Result<Project> {
    let root_dir: String = row.get(1)?;
    Ok(Project {
        id: row.get(0)?,
        root_dir: PathBuf::from(root_dir),
        name: row.get(2)?,
        created_at_ms: row.get(3)?,
        updated_at_ms: row.get(4)?,
    })
}

fn row_to_session(row: &Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        id: row.get(0)?,
        project_id: row.get(1)?,
        title: row.get(2)?,
        created_at_ms: row.get(3)?,
        updated_at_ms: row.get(4)?,
    })
}

fn row_to_turn(row: &Row<'_>) -> rusqlite::Result<Turn> {
    Ok(Turn {
        id: row.get(0)?,
        session_id: row.get(1)?,
        seq: row.get(2)?,
        user_parts: parse_json_column(row, 3)?,
        assistant_parts: parse_json_column(row, 4)?,
        commands_run: parse_json_column(row, 5)?,
        files_modified: parse_json_column(row, 6)?,
        usage: parse_optional_json_column(row, 7)?,
        created_at_ms: row.get(8)?,
    })
}

fn parse_json_column<T: serde::de::DeserializeOwned>(
    row: &Row<'_>,
    idx: usize,
) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_optional_json_column(
    row: &Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<serde_json::Value>> {
    let raw: Option<String> = row.get(idx)?;
    match raw {
        None => Ok(None),
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))),
    }
}

fn collect_rows<T, F>(iter: rusqlite::MappedRows<'_, F>) -> Result<Vec<T>>
where
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
    let mut rows = Vec::new();
    for row in iter {
        rows.push(row?);
    }
    Ok(rows)
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

fn path_to_string(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    #[test]
    fn create_session_and_append_linear_turns() {
        let mut store = Store::open_in_memory().unwrap();
        let project = store
            .sessions()
            .upsert_project("/tmp/demo", Some("demo".into()))
            .unwrap();

        let session = store
            .sessions()
            .create_session(CreateSessionInput {
                project_id: project.id.clone(),
                title: None,
            })
            .unwrap();

        let first = store
            .sessions()
            .append_turn(AppendTurnInput {
                session_id: session.id.clone(),
                user_parts: serde_json::json!({"role": "user", "text": "hi"}),
                assistant_parts: serde_json::json!({"role": "assistant", "text": "hello"}),
                commands_run: vec![],
                files_modified: vec![],
                usage: None,
            })
            .unwrap();
        assert_eq!(first.seq, 0);

        let second = store
            .sessions()
            .append_turn(AppendTurnInput {
                session_id: session.id.clone(),
                user_parts: serde_json::json!({"role": "user", "text": "edit the file"}),
                assistant_parts: serde_json::json!({"role": "assistant", "text": "done"}),
                commands_run: vec!["cargo test".into()],
                files_modified: vec!["src/lib.rs".into()],
                usage: None,
            })
            .unwrap();
        assert_eq!(second.seq, 1);

        let rollout = store.sessions().rollout(&session.id).unwrap();
        assert_eq!(rollout.messages.len(), 4);
        assert_eq!(rollout.commands_run, vec!["cargo test".to_string()]);
        assert_eq!(rollout.files_modified, vec!["src/lib.rs".to_string()]);
    }

    #[test]
    fn append_turn_to_unknown_session_is_an_error() {
        let mut store = Store::open_in_memory().unwrap();
        let result = store.sessions().append_turn(AppendTurnInput {
            session_id: "sess_missing".into(),
            user_parts: serde_json::json!({}),
            assistant_parts: serde_json::json!({}),
            commands_run: vec![],
            files_modified: vec![],
            usage: None,
        });
        assert!(matches!(result, Err(Error::SessionNotFound(_))));
    }

    #[test]
    fn set_session_title_if_missing_does_not_clobber_an_existing_title() {
        let mut store = Store::open_in_memory().unwrap();
        let project = store
            .sessions()
            .upsert_project("/tmp/demo2", None)
            .unwrap();
        let session = store
            .sessions()
            .create_session(CreateSessionInput {
                project_id: project.id,
                title: Some("keep me".into()),
            })
            .unwrap();

        store
            .sessions()
            .set_session_title_if_missing(&session.id, "overwritten?")
            .unwrap();

        let reloaded = store.sessions().get_session(&session.id).unwrap().unwrap();
        assert_eq!(reloaded.title.as_deref(), Some("keep me"));
    }
}
