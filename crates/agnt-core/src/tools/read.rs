use agnt_llm::{Describe, Property, Schema};
use serde::Deserialize;

use crate::event::{DisplayBody, ToolCallDisplay, ToolResultDisplay};
use crate::tool::{Tool, ToolOutput};
use crate::tools::hashline;

#[derive(Clone, Deserialize)]
pub struct ReadInput {
    /// The file path to read, relative to the working directory.
    pub path: String,
}

impl Describe for ReadInput {
    fn describe() -> Schema {
        Schema::Object {
            description: None,
            properties: vec![Property {
                name: "path".into(),
                schema: Schema::String {
                    description: Some(
                        "File path to read, relative to the working directory".into(),
                    ),
                    enumeration: None,
                },
            }],
            required: vec!["path".into()],
        }
    }
}

/// Structured output from reading a file.
pub struct ReadOutput {
    pub path: String,
    pub content: String,
}

impl ToolOutput for ReadOutput {
    fn to_llm(&self) -> String {
        annotate_with_hashlines(&self.content)
    }
}

/// Prefix each line with a `line:hash` anchor so `patch_file` hunks can
/// address a position without surrounding context.
fn annotate_with_hashlines(content: &str) -> String {
    content
        .lines()
        .enumerate()
        .map(|(idx, line)| hashline::hashline(idx + 1, line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Tool that reads a file from disk relative to the working directory.
#[derive(Clone)]
pub struct ReadTool {
    pub(crate) cwd: std::path::PathBuf,
}

impl Tool for ReadTool {
    type Input = ReadInput;
    type Output = ReadOutput;

    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read a file from disk. Returns the file contents as text."
    }

    async fn call(&self, input: ReadInput) -> Result<ReadOutput, agnt_llm::Error> {
        let path = self.cwd.join(&input.path);
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| agnt_llm::Error::Other(format!("{}: {e}", path.display())))?;
        Ok(ReadOutput {
            path: input.path,
            content,
        })
    }

    fn render_input(&self, input: &ReadInput) -> ToolCallDisplay {
        ToolCallDisplay {
            title: format!("Read {}", input.path),
            body: None,
        }
    }

    fn render_output(&self, _input: &ReadInput, output: &ReadOutput) -> ToolResultDisplay {
        let lines = output.content.lines().count();
        ToolResultDisplay {
            title: format!("{lines} lines"),
            body: Some(DisplayBody::Code {
                language: lang_from_ext(&output.path),
                content: output.content.clone(),
            }),
        }
    }
}

/// Guess a language name from a file extension for syntax highlighting.
fn lang_from_ext(path: &str) -> Option<String> {
    let ext = path.rsplit('.').next()?;
    let lang = match ext {
        "rs" => "rust",
        "ts" | "tsx" => "typescript",
        "js" | "jsx" => "javascript",
        "py" => "python",
        "rb" => "ruby",
        "go" => "go",
        "java" => "java",
        "c" | "h" => "c",
        "cpp" | "cc" | "cxx" | "hpp" => "cpp",
        "sh" | "bash" => "bash",
        "json" => "json",
        "yaml" | "yml" => "yaml",
        "toml" => "toml",
        "md" => "markdown",
        "html" | "htm" => "html",
        "css" => "css",
        "sql" => "sql",
        "xml" => "xml",
        _ => return None,
    };
    Some(lang.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn reads_existing_file() {
        let dir = tempdir().unwrap();
        tokio::fs::write(dir.path().join("a.rs"), "fn main() {}").await.unwrap();
        let tool = ReadTool { cwd: dir.path().to_path_buf() };
        let out = tool.call(ReadInput { path: "a.rs".into() }).await.unwrap();
        assert_eq!(out.content, "fn main() {}");
    }

    #[tokio::test]
    async fn missing_file_is_an_error_not_a_panic() {
        let dir = tempdir().unwrap();
        let tool = ReadTool { cwd: dir.path().to_path_buf() };
        assert!(tool.call(ReadInput { path: "missing.txt".into() }).await.is_err());
    }

    #[tokio::test]
    async fn to_llm_annotates_each_line_with_a_hash_anchor() {
        let dir = tempdir().unwrap();
        tokio::fs::write(dir.path().join("a.txt"), "one\ntwo\n").await.unwrap();
        let tool = ReadTool { cwd: dir.path().to_path_buf() };
        let out = tool.call(ReadInput { path: "a.txt".into() }).await.unwrap();
        let annotated = out.to_llm();
        let anchor_one = hashline::hashline(1, "one");
        let anchor_two = hashline::hashline(2, "two");
        assert_eq!(annotated, format!("{anchor_one}\n{anchor_two}"));
    }
}
