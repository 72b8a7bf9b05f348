use agnt_llm::{Describe, ToolDefinition};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::pin::Pin;

use crate::event::{DisplayBody, ToolCallDisplay, ToolResultDisplay};

/// The model-facing rendering of a tool's structured output.
///
/// Kept distinct from [`ToolResultDisplay`] (the UI-facing rendering) so a
/// tool can show rich output to a human (syntax-highlighted file contents, a
/// diff) while sending the model a plain summary string.
pub trait ToolOutput {
    fn to_llm(&self) -> String;
}

impl ToolOutput for String {
    fn to_llm(&self) -> String {
        self.clone()
    }
}

/// A callable tool with typed input and output. Implement this trait to
/// register tools with the agent.
///
/// The `Input` type must implement [`Describe`] (for schema generation) and
/// `DeserializeOwned` (for parsing the model's JSON arguments). The `Output`
/// type must implement [`ToolOutput`] so the executor can derive the
/// model-facing string independently of how it is rendered to a human.
///
/// Tools must be `Clone` so the erasure layer can clone them before calling
/// `async fn call` — this avoids the borrow-across-await problem without
/// requiring manual `Box::pin`.
///
/// # Example
///
/// ```ignore
/// #[derive(Clone)]
/// struct ReadFile { cwd: std::path::PathBuf }
///
/// impl Tool for ReadFile {
///     type Input = ReadFileInput;
///     type Output = String;
///
///     fn name(&self) -> &str { "read_file" }
///     fn description(&self) -> &str { "Read a file from disk" }
///
///     async fn call(&self, input: ReadFileInput) -> Result<String, agnt_llm::Error> {
///         tokio::fs::read_to_string(self.cwd.join(&input.path))
///             .await
///             .map_err(|e| agnt_llm::Error::Other(e.to_string()))
///     }
///
///     fn render_input(&self, input: &ReadFileInput) -> ToolCallDisplay {
///         ToolCallDisplay { title: format!("Read {}", input.path), body: None }
///     }
///
///     fn render_output(&self, _input: &ReadFileInput, output: &String) -> ToolResultDisplay {
///         ToolResultDisplay { title: "read".into(), body: None }
///     }
/// }
/// ```
pub trait Tool: Clone + Send + Sync + 'static {
    type Input: Describe + DeserializeOwned + Clone + Send;
    type Output: ToolOutput + Send;

    fn name(&self) -> &str;
    fn description(&self) -> &str;

    fn call(
        &self,
        input: Self::Input,
    ) -> impl Future<Output = Result<Self::Output, agnt_llm::Error>> + Send;

    /// Render the pending call for display before it executes.
    fn render_input(&self, input: &Self::Input) -> ToolCallDisplay;

    /// Render the result for display once it has executed.
    fn render_output(&self, input: &Self::Input, output: &Self::Output) -> ToolResultDisplay;
}

// ---------------------------------------------------------------------------
// Type erasure
// ---------------------------------------------------------------------------

/// The outcome of invoking an erased tool: what to tell the model, what to
/// show the user, and whether it succeeded.
pub struct ToolOutcome {
    pub call_display: ToolCallDisplay,
    pub result_display: ToolResultDisplay,
    /// The text that goes into the model-facing `ToolResult` payload.
    pub llm_text: String,
    pub ok: bool,
}

/// Object-safe, type-erased wrapper around a [`Tool`].
///
/// The returned future from `call_erased` is `'static` — it does not borrow
/// `self`, which allows callers to drop locks before awaiting.
pub trait ErasedTool: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    /// Render what this call would look like without executing it, so the
    /// orchestrator can show `ToolCallStart`/`ApprovalRequested` before the
    /// approval gate has even been consulted.
    fn describe_pending(&self, arguments: &str) -> ToolCallDisplay;

    fn call_erased(&self, arguments: &str) -> Pin<Box<dyn Future<Output = ToolOutcome> + Send>>;
}

impl<T: Tool> ErasedTool for T {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: T::Input::describe(),
        }
    }

    fn describe_pending(&self, arguments: &str) -> ToolCallDisplay {
        match serde_json::from_str::<T::Input>(arguments) {
            Ok(input) => self.render_input(&input),
            Err(_) => ToolCallDisplay {
                title: format!("Call {}", self.name()),
                body: None,
            },
        }
    }

    fn call_erased(&self, arguments: &str) -> Pin<Box<dyn Future<Output = ToolOutcome> + Send>> {
        // Empty arguments are normalized to `{}` before reaching here by the
        // stream decoder; parsing still happens per-call since a tool may be
        // invoked with genuinely malformed JSON from the model.
        let parsed: Result<T::Input, _> = serde_json::from_str(arguments);
        let this = self.clone();
        let name = self.name().to_string();
        Box::pin(async move {
            let input = match parsed {
                Ok(input) => input,
                Err(e) => {
                    let message = format!("invalid arguments: {e}");
                    return ToolOutcome {
                        call_display: ToolCallDisplay {
                            title: format!("Call {name}"),
                            body: None,
                        },
                        result_display: ToolResultDisplay {
                            title: "Invalid arguments".to_string(),
                            body: Some(DisplayBody::Text(message.clone())),
                        },
                        llm_text: message,
                        ok: false,
                    };
                }
            };

            let call_display = this.render_input(&input);
            match this.call(input.clone()).await {
                Ok(output) => {
                    let result_display = this.render_output(&input, &output);
                    ToolOutcome {
                        call_display,
                        result_display,
                        llm_text: output.to_llm(),
                        ok: true,
                    }
                }
                Err(e) => {
                    let message = e.to_string();
                    ToolOutcome {
                        call_display,
                        result_display: ToolResultDisplay {
                            title: "Error".to_string(),
                            body: Some(DisplayBody::Text(message.clone())),
                        },
                        llm_text: message,
                        ok: false,
                    }
                }
            }
        })
    }
}
