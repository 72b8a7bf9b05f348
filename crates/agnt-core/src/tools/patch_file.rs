//! Anchor-addressed file patching. Grounded on the teacher's orphaned
//! `hashline` module (FNV-1a line-hash anchors, originally unwired to any
//! tool) combined with the `*** Begin Patch` / `Add File` / `Update File` /
//! `Delete File` / `End Patch` envelope vocabulary used by a sibling
//! example's `apply_patch` tool. Unlike that sibling, hunks address their
//! position with a `line:hash` anchor rather than context-line matching, so
//! a patch survives small drifts elsewhere in the file without needing full
//! surrounding context.

use agnt_llm::{Describe, Property, Schema};
use serde::Deserialize;

use crate::event::{DisplayBody, ToolCallDisplay, ToolResultDisplay};
use crate::tool::{Tool, ToolOutput};
use crate::tools::hashline;
use crate::tools::hashline::{replacement_lines, resolve_anchor, FileLines};

const BEGIN: &str = "*** Begin Patch";
const END: &str = "*** End Patch";
const ADD_PREFIX: &str = "*** Add File: ";
const DELETE_PREFIX: &str = "*** Delete File: ";
const UPDATE_PREFIX: &str = "*** Update File: ";

#[derive(Clone, Deserialize)]
pub struct PatchFileInput {
    /// The full patch text, including the `*** Begin Patch` / `*** End Patch`
    /// envelope.
    pub patch: String,
}

impl Describe for PatchFileInput {
    fn describe() -> Schema {
        Schema::Object {
            description: None,
            properties: vec![Property {
                name: "patch".into(),
                schema: Schema::String {
                    description: Some(
                        "Patch text: *** Begin Patch, then one or more of \
                         *** Add File: <path> (+lines), *** Delete File: <path>, \
                         *** Update File: <path> (hunks addressed by @line:hash anchors \
                         with -/+ lines), then *** End Patch."
                            .into(),
                    ),
                    enumeration: None,
                },
            }],
            required: vec!["patch".into()],
        }
    }
}

/// Structured output from applying a patch: one entry per file operation.
pub struct PatchFileOutput {
    pub changes: Vec<String>,
}

impl ToolOutput for PatchFileOutput {
    fn to_llm(&self) -> String {
        if self.changes.is_empty() {
            "(no changes applied)".to_string()
        } else {
            self.changes.join("\n")
        }
    }
}

/// Tool that applies a multi-file patch using anchor-addressed hunks.
#[derive(Clone)]
pub struct PatchFileTool {
    pub(crate) cwd: std::path::PathBuf,
}

impl Tool for PatchFileTool {
    type Input = PatchFileInput;
    type Output = PatchFileOutput;

    fn name(&self) -> &str {
        "patch_file"
    }

    fn description(&self) -> &str {
        "Apply a patch to add, delete, or update files. Update hunks address \
         their position with a `@line:hash` anchor (as shown by read_file's \
         line-hash annotations) rather than surrounding context, so small \
         drift elsewhere in the file doesn't break the patch."
    }

    async fn call(&self, input: PatchFileInput) -> Result<PatchFileOutput, agnt_llm::Error> {
        let changes = apply_patch(&self.cwd, &input.patch)
            .await
            .map_err(agnt_llm::Error::Other)?;
        Ok(PatchFileOutput { changes })
    }

    fn render_input(&self, input: &PatchFileInput) -> ToolCallDisplay {
        ToolCallDisplay {
            title: "Apply patch".to_string(),
            body: Some(DisplayBody::Code {
                language: Some("diff".to_string()),
                content: input.patch.clone(),
            }),
        }
    }

    fn render_output(&self, _input: &PatchFileInput, output: &PatchFileOutput) -> ToolResultDisplay {
        ToolResultDisplay {
            title: format!("{} change(s) applied", output.changes.len()),
            body: None,
        }
    }
}

async fn apply_patch(cwd: &std::path::Path, patch: &str) -> Result<Vec<String>, String> {
    let start = patch
        .find(BEGIN)
        .ok_or_else(|| format!("`{BEGIN}` not found"))?;
    let finish = patch
        .find(END)
        .ok_or_else(|| format!("`{END}` not found"))?;
    if finish <= start {
        return Err(format!("`{END}` appears before `{BEGIN}`"));
    }

    let mut remaining = &patch[start + BEGIN.len()..finish];
    let mut changes = Vec::new();

    while !remaining.trim().is_empty() {
        remaining = remaining.trim_start_matches('\n');

        if let Some(rest) = remaining.strip_prefix(ADD_PREFIX) {
            let (path, rest) = take_header(rest);
            let (content, rest) = collect_added_lines(rest);
            let full = cwd.join(&path);
            if let Some(parent) = full.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| format!("{}: {e}", parent.display()))?;
            }
            tokio::fs::write(&full, &content)
                .await
                .map_err(|e| format!("{}: {e}", full.display()))?;
            changes.push(format!("A {path}"));
            remaining = rest;
        } else if let Some(rest) = remaining.strip_prefix(DELETE_PREFIX) {
            let (path, rest) = take_header(rest);
            let full = cwd.join(&path);
            tokio::fs::remove_file(&full)
                .await
                .map_err(|e| format!("{}: {e}", full.display()))?;
            changes.push(format!("D {path}"));
            remaining = rest;
        } else if let Some(rest) = remaining.strip_prefix(UPDATE_PREFIX) {
            let (path, rest) = take_header(rest);
            let (hunks, rest) = collect_hunks(rest);
            let full = cwd.join(&path);
            let original = tokio::fs::read_to_string(&full)
                .await
                .map_err(|e| format!("cannot read {}: {e}", full.display()))?;
            let patched = apply_hunks(&original, &hunks)?;
            tokio::fs::write(&full, &patched)
                .await
                .map_err(|e| format!("{}: {e}", full.display()))?;
            changes.push(format!("M {path}"));
            remaining = rest;
        } else {
            let next = remaining.find('\n').unwrap_or(remaining.len());
            remaining = &remaining[next..];
        }
    }

    Ok(changes)
}

fn take_header(s: &str) -> (String, &str) {
    let newline = s.find('\n').unwrap_or(s.len());
    (s[..newline].trim().to_string(), &s[newline..])
}

fn collect_added_lines(s: &str) -> (String, &str) {
    let mut lines = Vec::new();
    let mut remaining = s;
    loop {
        remaining = remaining.strip_prefix('\n').unwrap_or(remaining);
        if remaining.starts_with("*** ") || remaining.is_empty() {
            break;
        }
        let newline = remaining.find('\n').unwrap_or(remaining.len());
        let line = &remaining[..newline];
        lines.push(line.strip_prefix('+').unwrap_or(line).to_string());
        remaining = &remaining[newline..];
    }
    let mut content = lines.join("\n");
    if !content.is_empty() {
        content.push('\n');
    }
    (content, remaining)
}

/// A single anchored hunk: the anchor names the first affected line, `-`
/// lines must match the file there, `+` lines are what replaces them.
struct Hunk {
    anchor: String,
    removed: Vec<String>,
    added: Vec<String>,
}

fn collect_hunks(s: &str) -> (Vec<Hunk>, &str) {
    let mut hunks = Vec::new();
    let mut remaining = s;

    loop {
        remaining = remaining.strip_prefix('\n').unwrap_or(remaining);
        if remaining.starts_with("*** ") || remaining.is_empty() {
            break;
        }

        if let Some(rest) = remaining.strip_prefix('@') {
            let newline = rest.find('\n').unwrap_or(rest.len());
            let anchor = rest[..newline].trim().to_string();
            remaining = &rest[newline..];

            let mut removed = Vec::new();
            let mut added = Vec::new();
            loop {
                remaining = remaining.strip_prefix('\n').unwrap_or(remaining);
                if remaining.is_empty()
                    || remaining.starts_with('@')
                    || remaining.starts_with("*** ")
                {
                    break;
                }
                let newline = remaining.find('\n').unwrap_or(remaining.len());
                let line = &remaining[..newline];
                if let Some(text) = line.strip_prefix('-') {
                    removed.push(text.to_string());
                } else if let Some(text) = line.strip_prefix('+') {
                    added.push(text.to_string());
                }
                remaining = &remaining[newline..];
            }

            hunks.push(Hunk {
                anchor,
                removed,
                added,
            });
        } else {
            let next = remaining.find('\n').unwrap_or(remaining.len());
            remaining = &remaining[next..];
        }
    }

    (hunks, remaining)
}

fn apply_hunks(content: &str, hunks: &[Hunk]) -> Result<String, String> {
    let mut file = FileLines::parse(content);

    // Apply from the bottom up so earlier anchors stay valid as later hunks
    // shift line numbers.
    let mut resolved: Vec<(usize, &Hunk)> = hunks
        .iter()
        .map(|hunk| resolve_anchor(&hunk.anchor, &file.lines).map(|idx| (idx, hunk)))
        .collect::<Result<_, _>>()?;
    resolved.sort_by_key(|(idx, _)| std::cmp::Reverse(*idx));

    for (idx, hunk) in resolved {
        let end = idx + hunk.removed.len();
        if end > file.lines.len() {
            return Err(format!(
                "hunk at anchor `{}` removes past end of file",
                hunk.anchor
            ));
        }
        for (offset, expected) in hunk.removed.iter().enumerate() {
            if &file.lines[idx + offset] != expected {
                return Err(format!(
                    "hunk at anchor `{}` does not match file content at line {}",
                    hunk.anchor,
                    idx + offset + 1
                ));
            }
        }

        let added = hunk
            .added
            .iter()
            .flat_map(|line| replacement_lines(line))
            .collect::<Vec<_>>();
        file.lines.splice(idx..end, added);
    }

    Ok(file.render())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn adds_a_new_file() {
        let dir = tempdir().unwrap();
        let patch = format!(
            "{BEGIN}\n{ADD_PREFIX}new.txt\n+hello\n+world\n{END}\n"
        );
        let changes = apply_patch(dir.path(), &patch).await.unwrap();
        assert_eq!(changes, vec!["A new.txt".to_string()]);
        let written = tokio::fs::read_to_string(dir.path().join("new.txt"))
            .await
            .unwrap();
        assert_eq!(written, "hello\nworld\n");
    }

    #[tokio::test]
    async fn deletes_a_file() {
        let dir = tempdir().unwrap();
        tokio::fs::write(dir.path().join("gone.txt"), "bye").await.unwrap();
        let patch = format!("{BEGIN}\n{DELETE_PREFIX}gone.txt\n{END}\n");
        let changes = apply_patch(dir.path(), &patch).await.unwrap();
        assert_eq!(changes, vec!["D gone.txt".to_string()]);
        assert!(tokio::fs::metadata(dir.path().join("gone.txt")).await.is_err());
    }

    #[tokio::test]
    async fn updates_a_file_via_anchor() {
        let dir = tempdir().unwrap();
        tokio::fs::write(dir.path().join("a.txt"), "one\ntwo\nthree\n")
            .await
            .unwrap();
        let anchor = super::hashline::hashline(2, "two");
        let patch = format!(
            "{BEGIN}\n{UPDATE_PREFIX}a.txt\n@{anchor}\n-two\n+TWO\n{END}\n"
        );
        let changes = apply_patch(dir.path(), &patch).await.unwrap();
        assert_eq!(changes, vec!["M a.txt".to_string()]);
        let written = tokio::fs::read_to_string(dir.path().join("a.txt"))
            .await
            .unwrap();
        assert_eq!(written, "one\nTWO\nthree\n");
    }

    #[tokio::test]
    async fn mismatched_removed_line_is_an_error() {
        let dir = tempdir().unwrap();
        tokio::fs::write(dir.path().join("a.txt"), "one\ntwo\nthree\n")
            .await
            .unwrap();
        let anchor = super::hashline::hashline(2, "two");
        let patch = format!(
            "{BEGIN}\n{UPDATE_PREFIX}a.txt\n@{anchor}\n-not-two\n+TWO\n{END}\n"
        );
        assert!(apply_patch(dir.path(), &patch).await.is_err());
    }
}
