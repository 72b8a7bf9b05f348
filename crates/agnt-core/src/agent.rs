use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use agnt_llm::stream::{FinishReason, StreamEvent, Usage};
use agnt_llm::{LanguageModel, ToolDefinition};
use tokio::sync::{mpsc, oneshot};
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::approval::{self, ApprovalMode, Verdict};
use crate::error::Error;
use crate::event::{AgentEvent, DisplayBody, ToolResultDisplay};
use crate::history::{Entry, History, HistoryConfig, NullSummarizer, ToolCallRecord};
use crate::tool::{ErasedTool, Tool};
use crate::tools::{ExecuteCommandTool, ListDirectoryTool, PatchFileTool, ReadTool, WriteTool};

/// Ceiling on how long a single turn (including any number of tool
/// round-trips) is allowed to run before the orchestrator gives up on it.
pub const DEFAULT_TURN_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// A snapshot of everything needed to resume a conversation later: the raw
/// history entries. Approval mode and registered tools are session
/// configuration, not conversation state, so they are not included here.
#[derive(Debug, Clone)]
pub struct ConversationState {
    pub entries: Vec<Entry>,
}

struct AgentState {
    tools: Vec<Box<dyn ErasedTool>>,
    cwd: PathBuf,
    approval_mode: ApprovalMode,
}

/// The core agent. Holds a language model, a token-budgeted conversation
/// history, a tool registry, and an approval gate. UI-agnostic —
/// communicates via [`AgentEvent`]s and blocks on approval round-trips
/// through the handle returned by [`Agent::submit`].
pub struct Agent {
    model: Arc<LanguageModel>,
    history: Arc<History>,
    state: Arc<Mutex<AgentState>>,
}

impl Agent {
    /// Create a new agent backed by the given model and no tools.
    pub fn new(model: LanguageModel, approval_mode: ApprovalMode, cwd: PathBuf) -> Self {
        Self {
            model: Arc::new(model),
            history: Arc::new(History::new(HistoryConfig::default(), Arc::new(NullSummarizer))),
            state: Arc::new(Mutex::new(AgentState {
                tools: Vec::new(),
                cwd,
                approval_mode,
            })),
        }
    }

    /// Create an agent with the full default coding tool catalog
    /// (`read_file`, `write_file`, `patch_file`, `execute_command`,
    /// `list_directory`) and a system prompt that turns it into a coding
    /// assistant.
    pub fn with_defaults(model: LanguageModel, cwd: PathBuf, approval_mode: ApprovalMode) -> Self {
        let config = HistoryConfig {
            system_prompt: Some(system_prompt(&cwd)),
            ..HistoryConfig::default()
        };

        let mut agent = Self {
            model: Arc::new(model),
            history: Arc::new(History::new(config, Arc::new(NullSummarizer))),
            state: Arc::new(Mutex::new(AgentState {
                tools: Vec::new(),
                cwd: cwd.clone(),
                approval_mode,
            })),
        };

        agent.tool(ReadTool { cwd: cwd.clone() });
        agent.tool(WriteTool { cwd: cwd.clone() });
        agent.tool(PatchFileTool { cwd: cwd.clone() });
        agent.tool(ListDirectoryTool { cwd: cwd.clone() });
        agent.tool(ExecuteCommandTool::new(cwd));

        agent
    }

    /// Register a tool the model can call.
    pub fn tool(&mut self, tool: impl Tool) -> &mut Self {
        self.state.lock().unwrap_or_else(|p| p.into_inner()).tools.push(Box::new(tool));
        self
    }

    /// Change the approval mode for subsequent tool calls.
    pub fn set_approval_mode(&self, mode: ApprovalMode) {
        self.state.lock().unwrap_or_else(|p| p.into_inner()).approval_mode = mode;
    }

    /// A point-in-time copy of the conversation so far.
    pub fn conversation_state(&self) -> ConversationState {
        ConversationState {
            entries: self.history.snapshot(),
        }
    }

    /// Replace the current conversation with a previously saved one, e.g.
    /// when resuming a session.
    pub fn restore_conversation_state(&self, state: ConversationState) {
        self.history.clear();
        for entry in state.entries {
            // Restoring does not need the pruning protocol to run per entry,
            // but reusing `append` keeps both paths going through the single
            // write surface that enforces the budget.
            let history = Arc::clone(&self.history);
            tokio::spawn(async move {
                history.append(entry).await;
            });
        }
    }

    /// Wipe the conversation entirely (the `/clear` command). Unlike
    /// [`Agent::restore_conversation_state`], this does not re-seed a system
    /// prompt — callers that want one to survive should call
    /// [`Agent::reseed_system_prompt`] immediately after.
    pub fn clear(&self) {
        self.history.clear();
    }

    /// Re-seed a system prompt after [`Agent::clear`].
    pub fn reseed_system_prompt(&self, prompt: impl Into<String>) {
        self.history.seed_system(prompt);
    }

    /// Submit user input and get back a handle to the turn's event stream.
    ///
    /// The returned [`AgentStream`] yields [`AgentEvent`]s as the model
    /// generates a response. If tool calls occur, the agent consults the
    /// approval gate and, once cleared, executes them and loops until the
    /// model produces a final text answer or the turn is cancelled/times
    /// out.
    pub fn submit(&self, content: impl Into<String>) -> AgentStream {
        let content = content.into();
        let (tx, rx) = mpsc::channel(64);
        let pending_approvals = Arc::new(Mutex::new(HashMap::<String, oneshot::Sender<bool>>::new()));
        let cancel = CancellationToken::new();

        let model = Arc::clone(&self.model);
        let history = Arc::clone(&self.history);
        let state = Arc::clone(&self.state);
        let approvals = Arc::clone(&pending_approvals);
        let turn_cancel = cancel.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = turn_cancel.cancelled() => {
                    let _ = tx.send(AgentEvent::Cancelled).await;
                }
                result = tokio::time::timeout(
                    DEFAULT_TURN_TIMEOUT,
                    run_turn(model, history, state, approvals, content, tx.clone()),
                ) => {
                    if result.is_err() {
                        let _ = tx.send(AgentEvent::Error { error: Error::TurnTimeout.to_string() }).await;
                    }
                }
            }
        });

        AgentStream {
            rx,
            pending_approvals,
            cancel,
        }
    }
}

/// A handle to a single turn's event stream. Implements async iteration via
/// [`next()`](AgentStream::next). Dropping it, or calling
/// [`cancel()`](AgentStream::cancel), ends the in-flight generation.
pub struct AgentStream {
    rx: mpsc::Receiver<AgentEvent>,
    pending_approvals: Arc<Mutex<HashMap<String, oneshot::Sender<bool>>>>,
    cancel: CancellationToken,
}

impl AgentStream {
    /// Get the next event, or `None` when the turn is complete.
    pub async fn next(&mut self) -> Option<AgentEvent> {
        self.rx.recv().await
    }

    /// Answer a pending [`AgentEvent::ApprovalRequested`]. A stale or
    /// already-answered id is silently ignored.
    pub fn respond_approval(&self, id: &str, approved: bool) {
        let mut pending = self.pending_approvals.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(tx) = pending.remove(id) {
            let _ = tx.send(approved);
        }
    }

    /// Cancel the in-flight turn. The stream yields [`AgentEvent::Cancelled`]
    /// and then closes.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

// ---------------------------------------------------------------------------
// Turn orchestration
// ---------------------------------------------------------------------------

async fn run_turn(
    model: Arc<LanguageModel>,
    history: Arc<History>,
    state: Arc<Mutex<AgentState>>,
    pending_approvals: Arc<Mutex<HashMap<String, oneshot::Sender<bool>>>>,
    content: String,
    tx: mpsc::Sender<AgentEvent>,
) {
    history.append(Entry::UserText(content.clone())).await;
    if tx.send(AgentEvent::UserMessage { content }).await.is_err() {
        return;
    }

    let mut cumulative_usage = Usage::default();
    let mut ran_any_tool = false;

    loop {
        let tool_defs: Vec<ToolDefinition> = {
            let s = state.lock().unwrap_or_else(|p| p.into_inner());
            s.tools.iter().map(|t| t.definition()).collect()
        };

        let mut req = agnt_llm::request();
        req.messages(history.to_messages());
        req.tools(tool_defs);

        let Some((full_text, tool_calls, finish_reason, usage)) =
            drain_stream(model.generate(req.build()), &tx).await
        else {
            return; // receiver dropped or a stream error was already reported
        };
        cumulative_usage.accumulate(&usage);

        if finish_reason != FinishReason::ToolCalls || tool_calls.is_empty() {
            // `AssistantText` is terminal: a turn that ends in tool calls
            // carries no accompanying text entry (see the Data Model's
            // tool-call scenario), only the turn's final answer does.
            if !full_text.is_empty() {
                history.append(Entry::AssistantText(full_text)).await;
            }

            if ran_any_tool && tx.send(AgentEvent::FollowUpComplete).await.is_err() {
                return;
            }
            let _ = tx
                .send(AgentEvent::TurnComplete {
                    usage: cumulative_usage,
                })
                .await;
            return;
        }

        ran_any_tool = true;
        history
            .append(Entry::AssistantToolRequest(
                tool_calls
                    .iter()
                    .map(|c| ToolCallRecord {
                        id: c.id.clone(),
                        name: c.name.clone(),
                        arguments: if c.arguments.is_empty() {
                            "{}".to_string()
                        } else {
                            c.arguments.clone()
                        },
                    })
                    .collect(),
            ))
            .await;

        for call in &tool_calls {
            let arguments = if call.arguments.is_empty() {
                "{}"
            } else {
                call.arguments.as_str()
            };

            let outcome = execute_tool_call(
                &state,
                &pending_approvals,
                &tx,
                &call.id,
                &call.name,
                arguments,
            )
            .await;

            let Some((ok, llm_text, result_display)) = outcome else {
                return; // receiver dropped mid-approval
            };

            if tx
                .send(AgentEvent::ToolCallDone {
                    id: call.id.clone(),
                    display: result_display,
                    ok,
                })
                .await
                .is_err()
            {
                return;
            }

            let payload = if ok {
                serde_json::json!({ "output": llm_text })
            } else {
                serde_json::json!({ "error": llm_text })
            };
            history
                .append(Entry::ToolResult {
                    call_id: call.id.clone(),
                    name: call.name.clone(),
                    payload,
                    ok,
                })
                .await;
        }
    }
}

/// Run the approval gate and, if cleared, execute a single tool call.
/// Returns `None` if the event channel closed while waiting on a user
/// approval (the turn should abandon).
async fn execute_tool_call(
    state: &Arc<Mutex<AgentState>>,
    pending_approvals: &Arc<Mutex<HashMap<String, oneshot::Sender<bool>>>>,
    tx: &mpsc::Sender<AgentEvent>,
    id: &str,
    name: &str,
    arguments: &str,
) -> Option<(bool, String, ToolResultDisplay)> {
    let (mode, cwd, found) = {
        let s = state.lock().unwrap_or_else(|p| p.into_inner());
        let found = s.tools.iter().find(|t| t.definition().name == name).is_some();
        (s.approval_mode, s.cwd.clone(), found)
    };

    if !found {
        let message = format!("Unknown function: {name}");
        let display = ToolResultDisplay {
            title: "Unknown tool".to_string(),
            body: Some(DisplayBody::Text(message.clone())),
        };
        return Some((false, message, display));
    }

    let pending_display = {
        let s = state.lock().unwrap_or_else(|p| p.into_inner());
        let tool = s.tools.iter().find(|t| t.definition().name == name).unwrap();
        tool.describe_pending(arguments)
    };

    if tx
        .send(AgentEvent::ToolCallStart {
            id: id.to_string(),
            display: pending_display.clone(),
        })
        .await
        .is_err()
    {
        return None;
    }

    let verdict = approval::decide(mode, name);

    if verdict == Verdict::Ask {
        let (approval_tx, approval_rx) = oneshot::channel();
        pending_approvals
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(id.to_string(), approval_tx);

        if tx
            .send(AgentEvent::ApprovalRequested {
                id: id.to_string(),
                tool_name: name.to_string(),
                display: pending_display,
            })
            .await
            .is_err()
        {
            return None;
        }

        let approved = approval_rx.await.unwrap_or(false);
        if !approved {
            let message = approval::denial_message(name);
            let display = ToolResultDisplay {
                title: "Denied".to_string(),
                body: Some(DisplayBody::Text(message.clone())),
            };
            return Some((false, message, display));
        }
    }

    let outcome = if verdict == Verdict::AutoSandboxed && name == "execute_command" {
        ExecuteCommandTool::sandboxed(cwd).call_erased(arguments).await
    } else {
        let fut = {
            let s = state.lock().unwrap_or_else(|p| p.into_inner());
            let tool = s.tools.iter().find(|t| t.definition().name == name).unwrap();
            tool.call_erased(arguments)
        };
        fut.await
    };

    Some((outcome.ok, outcome.llm_text, outcome.result_display))
}

/// A tool call whose arguments are still being assembled from `ToolCallBegin`
/// + zero or more `ToolCallDelta` fragments.
struct PendingToolCall {
    id: String,
    name: String,
    arguments: String,
}

/// Consume a streaming response, forwarding cumulative text/reasoning
/// deltas and tool-call lifecycle events as they arrive. Returns the final
/// assembled text, tool calls, finish reason, and usage — or `None` if the
/// event channel closed (the caller should stop).
async fn drain_stream(
    response: agnt_llm::response::Response,
    tx: &mpsc::Sender<AgentEvent>,
) -> Option<(String, Vec<agnt_llm::ToolCallPart>, FinishReason, Usage)> {
    let mut stream = response.events();

    // The provider's native deltas may be additive; we accumulate here so
    // every `AgentEvent::TextDelta`/`ReasoningDelta` carries the full text
    // so far, matching the cumulative contract documented on `AgentEvent`.
    let mut text = String::new();
    let mut reasoning = String::new();
    let mut tool_calls: Vec<agnt_llm::ToolCallPart> = Vec::new();
    let mut finish_reason = FinishReason::Stop;
    let mut usage = Usage::default();

    // Buffers argument fragments per call index between `ToolCallBegin` and
    // `ToolCallEnd`, in arrival order, so calls interleaved across multiple
    // ids still assemble their arguments correctly rather than trusting that
    // a binding happens to deliver whole arguments in the terminal event.
    let mut pending_calls: std::collections::BTreeMap<usize, PendingToolCall> =
        std::collections::BTreeMap::new();

    while let Some(event) = stream.next().await {
        match event {
            Ok(StreamEvent::TextDelta(delta)) => {
                text.push_str(&delta);
                if tx
                    .send(AgentEvent::TextDelta { delta: text.clone() })
                    .await
                    .is_err()
                {
                    return None;
                }
            }
            Ok(StreamEvent::ReasoningDelta(delta)) => {
                reasoning.push_str(&delta);
                if tx
                    .send(AgentEvent::ReasoningDelta {
                        delta: reasoning.clone(),
                    })
                    .await
                    .is_err()
                {
                    return None;
                }
            }
            Ok(StreamEvent::ReasoningDone(_) | StreamEvent::TextDone { .. }) => {}
            Ok(StreamEvent::ToolCallBegin { index, id, name }) => {
                pending_calls.insert(
                    index,
                    PendingToolCall {
                        id,
                        name,
                        arguments: String::new(),
                    },
                );
            }
            Ok(StreamEvent::ToolCallDelta {
                index,
                arguments_delta,
            }) => {
                if let Some(pending) = pending_calls.get_mut(&index) {
                    pending.arguments.push_str(&arguments_delta);
                }
            }
            Ok(StreamEvent::ToolCallEnd { index, call }) => {
                let assembled = match pending_calls.remove(&index) {
                    Some(pending) => agnt_llm::ToolCallPart {
                        id: if pending.id.is_empty() { call.id } else { pending.id },
                        name: if pending.name.is_empty() { call.name } else { pending.name },
                        arguments: if pending.arguments.is_empty() {
                            call.arguments
                        } else {
                            pending.arguments
                        },
                        metadata: call.metadata,
                    },
                    None => call,
                };
                tool_calls.push(assembled);
            }
            Ok(StreamEvent::Finish { reason, usage: u }) => {
                finish_reason = reason;
                if let Some(u) = u {
                    usage.accumulate(&u);
                }
            }
            Ok(StreamEvent::Error(message)) => {
                let _ = tx.send(AgentEvent::Error { error: message }).await;
                return None;
            }
            Err(e) => {
                let _ = tx
                    .send(AgentEvent::Error {
                        error: e.to_string(),
                    })
                    .await;
                return None;
            }
        }
    }

    Some((text, tool_calls, finish_reason, usage))
}

// ---------------------------------------------------------------------------
// Default system prompt
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use agnt_llm::{Describe, LanguageModelBackend, Property, Schema};
    use std::sync::Mutex as StdMutex;

    /// A backend that plays back one scripted batch of [`StreamEvent`]s per
    /// call to `generate`, in order. Lets a test drive `run_turn` through
    /// several model round-trips without a real provider.
    struct ScriptedBackend {
        batches: StdMutex<std::collections::VecDeque<Vec<Result<StreamEvent, agnt_llm::Error>>>>,
    }

    impl ScriptedBackend {
        fn new(batches: Vec<Vec<Result<StreamEvent, agnt_llm::Error>>>) -> Self {
            Self {
                batches: StdMutex::new(batches.into_iter().collect()),
            }
        }
    }

    impl LanguageModelBackend for ScriptedBackend {
        fn model_id(&self) -> &str {
            "scripted"
        }

        fn provider(&self) -> &str {
            "test"
        }

        fn generate(&self, _request: agnt_llm::request::GenerateRequest) -> agnt_llm::Response {
            let batch = self
                .batches
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .pop_front()
                .unwrap_or_default();
            agnt_llm::Response::new(tokio_stream::iter(batch))
        }
    }

    fn agent_with_script(batches: Vec<Vec<Result<StreamEvent, agnt_llm::Error>>>) -> Agent {
        let model = agnt_llm::LanguageModel::new(ScriptedBackend::new(batches));
        Agent::new(model, ApprovalMode::Dangerous, PathBuf::from("."))
    }

    async fn drain(stream: &mut AgentStream) -> Vec<AgentEvent> {
        let mut events = Vec::new();
        while let Some(event) = stream.next().await {
            events.push(event);
        }
        events
    }

    fn text_finish(text: &str) -> Vec<Result<StreamEvent, agnt_llm::Error>> {
        vec![
            Ok(StreamEvent::TextDelta(text.to_string())),
            Ok(StreamEvent::Finish {
                reason: FinishReason::Stop,
                usage: None,
            }),
        ]
    }

    #[derive(Clone, serde::Deserialize)]
    struct EchoInput {}

    impl Describe for EchoInput {
        fn describe() -> Schema {
            Schema::Object {
                description: None,
                properties: Vec::<Property>::new(),
                required: Vec::new(),
            }
        }
    }

    struct EchoOutput(String);

    impl ToolOutput for EchoOutput {
        fn to_llm(&self) -> String {
            self.0.clone()
        }
    }

    #[derive(Clone)]
    struct EchoTool;

    impl Tool for EchoTool {
        type Input = EchoInput;
        type Output = EchoOutput;

        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo a fixed string."
        }

        async fn call(&self, _input: EchoInput) -> Result<EchoOutput, agnt_llm::Error> {
            Ok(EchoOutput("hello".to_string()))
        }

        fn render_input(&self, _input: &EchoInput) -> crate::event::ToolCallDisplay {
            crate::event::ToolCallDisplay {
                title: "Echo".to_string(),
                body: None,
            }
        }

        fn render_output(
            &self,
            _input: &EchoInput,
            _output: &EchoOutput,
        ) -> crate::event::ToolResultDisplay {
            crate::event::ToolResultDisplay {
                title: "Echo".to_string(),
                body: None,
            }
        }
    }

    #[tokio::test]
    async fn unknown_tool_call_is_reported_with_the_spec_wording_and_text_stays_unpersisted() {
        let call = vec![
            Ok(StreamEvent::TextDelta("stray".to_string())),
            Ok(StreamEvent::ToolCallBegin {
                index: 0,
                id: "call_0".to_string(),
                name: "unknown_tool".to_string(),
            }),
            Ok(StreamEvent::ToolCallEnd {
                index: 0,
                call: agnt_llm::ToolCallPart {
                    id: "call_0".to_string(),
                    name: "unknown_tool".to_string(),
                    arguments: "{}".to_string(),
                    metadata: HashMap::new(),
                },
            }),
            Ok(StreamEvent::Finish {
                reason: FinishReason::ToolCalls,
                usage: None,
            }),
        ];

        let agent = agent_with_script(vec![call, text_finish("done")]);
        let mut stream = agent.submit("hi");
        drain(&mut stream).await;

        let entries = agent.conversation_state().entries;
        assert!(
            !entries
                .iter()
                .any(|e| matches!(e, Entry::AssistantText(t) if t == "stray")),
            "text emitted alongside a tool call must not be persisted: {entries:?}"
        );

        let Some(Entry::ToolResult { name, payload, ok, .. }) = entries
            .iter()
            .find(|e| matches!(e, Entry::ToolResult { .. }))
            .cloned()
        else {
            panic!("expected a ToolResult entry: {entries:?}");
        };
        assert_eq!(name, "unknown_tool");
        assert!(!ok);
        assert_eq!(
            payload,
            serde_json::json!({ "error": "Unknown function: unknown_tool" })
        );

        assert!(entries
            .iter()
            .any(|e| matches!(e, Entry::AssistantText(t) if t == "done")));
    }

    #[tokio::test]
    async fn successful_tool_call_wraps_its_result_under_output() {
        let call = vec![
            Ok(StreamEvent::ToolCallBegin {
                index: 0,
                id: "call_0".to_string(),
                name: "echo".to_string(),
            }),
            Ok(StreamEvent::ToolCallEnd {
                index: 0,
                call: agnt_llm::ToolCallPart {
                    id: "call_0".to_string(),
                    name: "echo".to_string(),
                    arguments: "{}".to_string(),
                    metadata: HashMap::new(),
                },
            }),
            Ok(StreamEvent::Finish {
                reason: FinishReason::ToolCalls,
                usage: None,
            }),
        ];

        let mut agent = agent_with_script(vec![call, text_finish("done")]);
        agent.tool(EchoTool);
        let mut stream = agent.submit("hi");
        drain(&mut stream).await;

        let entries = agent.conversation_state().entries;
        let Some(Entry::ToolResult { payload, ok, .. }) = entries
            .iter()
            .find(|e| matches!(e, Entry::ToolResult { .. }))
            .cloned()
        else {
            panic!("expected a ToolResult entry: {entries:?}");
        };
        assert!(ok);
        assert_eq!(payload, serde_json::json!({ "output": "hello" }));
    }

    #[tokio::test]
    async fn drain_stream_assembles_tool_calls_interleaved_across_ids() {
        let (tx, mut rx) = mpsc::channel(64);
        let events = vec![
            Ok(StreamEvent::ToolCallBegin {
                index: 0,
                id: "call_0".to_string(),
                name: "first".to_string(),
            }),
            Ok(StreamEvent::ToolCallBegin {
                index: 1,
                id: "call_1".to_string(),
                name: "second".to_string(),
            }),
            Ok(StreamEvent::ToolCallDelta {
                index: 0,
                arguments_delta: "{\"x\":".to_string(),
            }),
            Ok(StreamEvent::ToolCallDelta {
                index: 1,
                arguments_delta: "{\"y\":".to_string(),
            }),
            Ok(StreamEvent::ToolCallDelta {
                index: 0,
                arguments_delta: "1}".to_string(),
            }),
            Ok(StreamEvent::ToolCallDelta {
                index: 1,
                arguments_delta: "2}".to_string(),
            }),
            Ok(StreamEvent::ToolCallEnd {
                index: 0,
                call: agnt_llm::ToolCallPart {
                    id: "call_0".to_string(),
                    name: "first".to_string(),
                    arguments: String::new(),
                    metadata: HashMap::new(),
                },
            }),
            Ok(StreamEvent::ToolCallEnd {
                index: 1,
                call: agnt_llm::ToolCallPart {
                    id: "call_1".to_string(),
                    name: "second".to_string(),
                    arguments: String::new(),
                    metadata: HashMap::new(),
                },
            }),
            Ok(StreamEvent::Finish {
                reason: FinishReason::ToolCalls,
                usage: None,
            }),
        ];

        let response = agnt_llm::Response::new(tokio_stream::iter(events));
        let (_text, tool_calls, finish_reason, _usage) = drain_stream(response, &tx).await.unwrap();
        drop(tx);
        while rx.recv().await.is_some() {}

        assert_eq!(finish_reason, FinishReason::ToolCalls);
        assert_eq!(tool_calls.len(), 2);
        assert_eq!(tool_calls[0].id, "call_0");
        assert_eq!(tool_calls[0].arguments, "{\"x\":1}");
        assert_eq!(tool_calls[1].id, "call_1");
        assert_eq!(tool_calls[1].arguments, "{\"y\":2}");
    }
}

fn system_prompt(cwd: &std::path::Path) -> String {
    format!(
        r#"You are an expert coding assistant. You help the user by reading, writing, patching, and running code in their project.

Working directory: {cwd}

You have five tools:

- **read_file**: Read a file. Give a path relative to the working directory.
- **write_file**: Write (or overwrite) a file. Give a relative path and the full content. Parent directories are created automatically.
- **patch_file**: Apply a patch to add, delete, or update files. Update hunks address their position with a `@line:hash` anchor rather than full surrounding context.
- **execute_command**: Run a shell command in the working directory. Returns stdout, stderr, and exit code. Long-running commands are killed at a timeout.
- **list_directory**: List the immediate contents of a directory (not recursive).

Guidelines:
- Before patching a file, read it first so your anchors match its current content.
- Use patch_file for surgical changes; use write_file only when creating new files or replacing the entire content.
- When running commands, prefer non-interactive invocations.
- Be concise in your explanations. Focus on what changed and why.
- If a command fails, read the error and try to fix it."#,
        cwd = cwd.display()
    )
}
