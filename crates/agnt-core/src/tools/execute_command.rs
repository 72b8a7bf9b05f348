//! Shell command execution. Generalizes the teacher's single-shot `bash`
//! tool with a wall-clock ceiling and a sandboxed execution mode, the two
//! properties the approval gate's `Verdict::AutoSandboxed` depends on.

use std::time::Duration;

use agnt_llm::{Describe, Property, Schema};
use serde::Deserialize;
use tokio::process::Command;

use crate::event::{DisplayBody, ToolCallDisplay, ToolResultDisplay};
use crate::tool::{Tool, ToolOutput};

/// Default wall-clock ceiling for a single command.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Environment variables preserved when a command runs sandboxed. Anything
/// not in this list is stripped before exec.
const SANDBOX_ENV_ALLOWLIST: &[&str] = &["PATH", "HOME", "LANG", "TERM", "TMPDIR"];

#[derive(Clone, Deserialize)]
pub struct ExecuteCommandInput {
    /// The shell command to run.
    pub command: String,
}

impl Describe for ExecuteCommandInput {
    fn describe() -> Schema {
        Schema::Object {
            description: None,
            properties: vec![Property {
                name: "command".into(),
                schema: Schema::String {
                    description: Some("The shell command to run".into()),
                    enumeration: None,
                },
            }],
            required: vec!["command".into()],
        }
    }
}

/// Structured output from running a command.
pub struct ExecuteCommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
}

impl ToolOutput for ExecuteCommandOutput {
    fn to_llm(&self) -> String {
        let mut result = String::new();

        if !self.stdout.is_empty() {
            result.push_str(&self.stdout);
        }
        if !self.stderr.is_empty() {
            if !result.is_empty() {
                result.push('\n');
            }
            result.push_str("stderr:\n");
            result.push_str(&self.stderr);
        }

        if self.timed_out {
            result.push_str("\n[command timed out and was killed]");
        } else if let Some(code) = self.exit_code
            && code != 0
        {
            result.push_str(&format!("\n[exit code: {code}]"));
        }

        if result.is_empty() {
            result.push_str("(no output)");
        }

        result
    }
}

/// Tool that runs a shell command in the working directory, either
/// unrestricted or sandboxed to a minimal environment, bounded by a
/// wall-clock timeout.
#[derive(Clone)]
pub struct ExecuteCommandTool {
    pub(crate) cwd: std::path::PathBuf,
    pub(crate) sandboxed: bool,
    pub(crate) timeout: Duration,
}

impl ExecuteCommandTool {
    pub fn new(cwd: std::path::PathBuf) -> Self {
        Self {
            cwd,
            sandboxed: false,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn sandboxed(cwd: std::path::PathBuf) -> Self {
        Self {
            cwd,
            sandboxed: true,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl Tool for ExecuteCommandTool {
    type Input = ExecuteCommandInput;
    type Output = ExecuteCommandOutput;

    fn name(&self) -> &str {
        "execute_command"
    }

    fn description(&self) -> &str {
        "Run a shell command and return the combined stdout and stderr. \
         Commands are bounded by a wall-clock timeout and killed if they \
         exceed it."
    }

    async fn call(&self, input: ExecuteCommandInput) -> Result<ExecuteCommandOutput, agnt_llm::Error> {
        let mut command = Command::new("bash");
        command
            .arg("-c")
            .arg(&input.command)
            .current_dir(&self.cwd)
            .kill_on_drop(true);

        if self.sandboxed {
            command.env_clear();
            for key in SANDBOX_ENV_ALLOWLIST {
                if let Ok(value) = std::env::var(key) {
                    command.env(key, value);
                }
            }
        }

        let mut child = command
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()
            .map_err(|e| agnt_llm::Error::Other(format!("failed to spawn command: {e}")))?;

        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => Ok(ExecuteCommandOutput {
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                exit_code: output.status.code(),
                timed_out: false,
            }),
            Ok(Err(e)) => Err(agnt_llm::Error::Other(format!("command wait failed: {e}"))),
            Err(_) => Ok(ExecuteCommandOutput {
                stdout: String::new(),
                stderr: String::new(),
                exit_code: None,
                timed_out: true,
            }),
        }
    }

    fn render_input(&self, input: &ExecuteCommandInput) -> ToolCallDisplay {
        let label = if self.sandboxed {
            format!("Run (sandboxed) `{}`", input.command)
        } else {
            format!("Run `{}`", input.command)
        };
        ToolCallDisplay {
            title: label,
            body: None,
        }
    }

    fn render_output(
        &self,
        _input: &ExecuteCommandInput,
        output: &ExecuteCommandOutput,
    ) -> ToolResultDisplay {
        let title = if output.timed_out {
            "timed out".to_string()
        } else {
            match output.exit_code {
                Some(0) => "exit code 0".to_string(),
                Some(code) => format!("exit code {code}"),
                None => "killed by signal".to_string(),
            }
        };

        let body = if !output.stdout.is_empty() || !output.stderr.is_empty() {
            let mut content = String::new();
            if !output.stdout.is_empty() {
                content.push_str(&output.stdout);
            }
            if !output.stderr.is_empty() {
                if !content.is_empty() {
                    content.push('\n');
                }
                content.push_str("stderr:\n");
                content.push_str(&output.stderr);
            }
            Some(DisplayBody::Code {
                language: None,
                content,
            })
        } else {
            None
        };

        ToolResultDisplay { title, body }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn runs_a_command_and_captures_output() {
        let dir = tempdir().unwrap();
        let tool = ExecuteCommandTool::new(dir.path().to_path_buf());
        let out = tool
            .call(ExecuteCommandInput {
                command: "echo hi".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(out.stdout.trim(), "hi");
        assert_eq!(out.exit_code, Some(0));
        assert!(!out.timed_out);
    }

    #[tokio::test]
    async fn nonzero_exit_is_reported_not_an_error() {
        let dir = tempdir().unwrap();
        let tool = ExecuteCommandTool::new(dir.path().to_path_buf());
        let out = tool
            .call(ExecuteCommandInput {
                command: "exit 7".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(out.exit_code, Some(7));
    }

    #[tokio::test]
    async fn slow_commands_are_killed_at_the_timeout() {
        let dir = tempdir().unwrap();
        let mut tool = ExecuteCommandTool::new(dir.path().to_path_buf());
        tool.timeout = Duration::from_millis(50);
        let out = tool
            .call(ExecuteCommandInput {
                command: "sleep 5".to_string(),
            })
            .await
            .unwrap();
        assert!(out.timed_out);
    }

    #[tokio::test]
    async fn sandboxed_commands_do_not_see_arbitrary_env_vars() {
        let dir = tempdir().unwrap();
        std::env::set_var("AGNT_TEST_SECRET", "shh");
        let tool = ExecuteCommandTool::sandboxed(dir.path().to_path_buf());
        let out = tool
            .call(ExecuteCommandInput {
                command: "echo ${AGNT_TEST_SECRET:-unset}".to_string(),
            })
            .await
            .unwrap();
        std::env::remove_var("AGNT_TEST_SECRET");
        assert_eq!(out.stdout.trim(), "unset");
    }
}
