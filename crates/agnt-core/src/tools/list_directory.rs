//! Non-recursive directory listing. Grounded on a sibling example's `fs`
//! tool `list` operation (sort entries, suffix directories with `/`,
//! symlinks with `@`, `ls -F` style).

use agnt_llm::{Describe, Property, Schema};
use serde::Deserialize;

use crate::event::{ToolCallDisplay, ToolResultDisplay};
use crate::tool::{Tool, ToolOutput};

#[derive(Clone, Deserialize)]
pub struct ListDirectoryInput {
    /// The directory to list, relative to the working directory. Defaults
    /// to the working directory itself when omitted.
    #[serde(default)]
    pub path: Option<String>,
}

impl Describe for ListDirectoryInput {
    fn describe() -> Schema {
        Schema::Object {
            description: None,
            properties: vec![Property {
                name: "path".into(),
                schema: Schema::String {
                    description: Some(
                        "Directory to list, relative to the working directory. \
                         Defaults to the working directory."
                            .into(),
                    ),
                    enumeration: None,
                },
            }],
            required: vec![],
        }
    }
}

/// Structured output from listing a directory.
pub struct ListDirectoryOutput {
    pub path: String,
    pub entries: Vec<String>,
}

impl ToolOutput for ListDirectoryOutput {
    fn to_llm(&self) -> String {
        if self.entries.is_empty() {
            "(empty directory)".to_string()
        } else {
            self.entries.join("\n")
        }
    }
}

/// Tool that lists the immediate contents of a directory. Directories are
/// suffixed with `/`, symlinks with `@`; entries are sorted by name.
#[derive(Clone)]
pub struct ListDirectoryTool {
    pub(crate) cwd: std::path::PathBuf,
}

impl Tool for ListDirectoryTool {
    type Input = ListDirectoryInput;
    type Output = ListDirectoryOutput;

    fn name(&self) -> &str {
        "list_directory"
    }

    fn description(&self) -> &str {
        "List the immediate contents of a directory. Directories are \
         suffixed with `/`, symlinks with `@`. Not recursive."
    }

    async fn call(&self, input: ListDirectoryInput) -> Result<ListDirectoryOutput, agnt_llm::Error> {
        let rel = input.path.clone().unwrap_or_else(|| ".".to_string());
        let full = self.cwd.join(&rel);

        let mut read_dir = tokio::fs::read_dir(&full)
            .await
            .map_err(|e| agnt_llm::Error::Other(format!("{}: {e}", full.display())))?;

        let mut entries = Vec::new();
        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| agnt_llm::Error::Other(format!("{}: {e}", full.display())))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            let file_type = entry.file_type().await.ok();
            let suffix = match file_type {
                Some(t) if t.is_symlink() => "@",
                Some(t) if t.is_dir() => "/",
                _ => "",
            };
            entries.push(format!("{name}{suffix}"));
        }
        entries.sort();

        Ok(ListDirectoryOutput { path: rel, entries })
    }

    fn render_input(&self, input: &ListDirectoryInput) -> ToolCallDisplay {
        ToolCallDisplay {
            title: format!("List {}", input.path.as_deref().unwrap_or(".")),
            body: None,
        }
    }

    fn render_output(
        &self,
        _input: &ListDirectoryInput,
        output: &ListDirectoryOutput,
    ) -> ToolResultDisplay {
        ToolResultDisplay {
            title: format!("{} entries in {}", output.entries.len(), output.path),
            body: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn lists_files_and_directories_sorted() {
        let dir = tempdir().unwrap();
        tokio::fs::write(dir.path().join("b.txt"), "").await.unwrap();
        tokio::fs::create_dir(dir.path().join("a_dir")).await.unwrap();
        tokio::fs::write(dir.path().join("c.txt"), "").await.unwrap();

        let tool = ListDirectoryTool { cwd: dir.path().to_path_buf() };
        let out = tool.call(ListDirectoryInput { path: None }).await.unwrap();
        assert_eq!(out.entries, vec!["a_dir/", "b.txt", "c.txt"]);
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn reports_symlinks_with_their_own_suffix() {
        let dir = tempdir().unwrap();
        tokio::fs::write(dir.path().join("target.txt"), "").await.unwrap();
        tokio::fs::symlink(dir.path().join("target.txt"), dir.path().join("link"))
            .await
            .unwrap();

        let tool = ListDirectoryTool { cwd: dir.path().to_path_buf() };
        let out = tool.call(ListDirectoryInput { path: None }).await.unwrap();
        assert_eq!(out.entries, vec!["link@", "target.txt"]);
    }

    #[tokio::test]
    async fn missing_directory_is_an_error() {
        let dir = tempdir().unwrap();
        let tool = ListDirectoryTool { cwd: dir.path().to_path_buf() };
        assert!(tool
            .call(ListDirectoryInput {
                path: Some("missing".to_string())
            })
            .await
            .is_err());
    }
}
