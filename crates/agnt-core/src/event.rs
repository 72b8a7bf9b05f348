use agnt_llm::stream::Usage;

// ---------------------------------------------------------------------------
// Display types — tool-agnostic rendering protocol
// ---------------------------------------------------------------------------

/// How to display a tool invocation (the input side) to the user.
#[derive(Debug, Clone)]
pub struct ToolCallDisplay {
    /// Short summary, e.g. "Read src/main.rs", "Run `cargo build`".
    pub title: String,
    /// Optional expanded content (e.g. the command, the file content to write).
    pub body: Option<DisplayBody>,
}

/// How to display a tool result (the output side) to the user.
#[derive(Debug, Clone)]
pub struct ToolResultDisplay {
    /// Short summary, e.g. "55 lines", "exit code 0".
    pub title: String,
    /// Optional expanded content (e.g. file contents, command output).
    pub body: Option<DisplayBody>,
}

/// Structured content for display. Frontends can use this to apply
/// syntax highlighting, diff rendering, etc.
#[derive(Debug, Clone)]
pub enum DisplayBody {
    /// Plain text.
    Text(String),
    /// Code with an optional language hint for syntax highlighting.
    Code {
        language: Option<String>,
        content: String,
    },
}

// ---------------------------------------------------------------------------
// Agent events — the render-oriented protocol from agent to UI
// ---------------------------------------------------------------------------

/// Events emitted by the agent during a generation turn.
///
/// A frontend consumes these to update its UI. The events form a protocol:
///
/// ```text
/// UserMessage
/// (TextDelta | ReasoningDelta)*
/// (ToolCallStart (ApprovalRequested)? ToolCallDone)* ← tool loop
/// (TextDelta)*                                        ← follow-up answer
/// FollowUpComplete                                    ← only after a tool loop
/// TurnComplete
/// ```
///
/// `TurnComplete` always ends a turn, whether or not any tools ran.
/// `FollowUpComplete` is an additional signal emitted only when the turn
/// included at least one tool round-trip, so a frontend can distinguish
/// "first answer already satisfied the user" from "answer arrived after
/// doing some work" without inspecting history itself.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    /// The user's message was recorded in conversation history.
    UserMessage { content: String },

    /// A chunk of cumulative assistant text arrived (full text so far).
    TextDelta { delta: String },

    /// A chunk of cumulative reasoning/thinking summary text arrived.
    ReasoningDelta { delta: String },

    /// A tool call has been fully parsed and is about to execute.
    /// Contains a rendered display of the tool's input.
    ToolCallStart {
        id: String,
        display: ToolCallDisplay,
    },

    /// The approval gate is asking the user whether to run a pending tool
    /// call. The frontend must reply with [`crate::approval::Verdict`]
    /// through whatever channel it was given (see `agnt-cli`'s app loop).
    ApprovalRequested {
        id: String,
        tool_name: String,
        display: ToolCallDisplay,
    },

    /// A tool has finished executing. Contains a rendered display of the
    /// result; `ok` is `false` for tool errors and denied approvals alike.
    ToolCallDone {
        id: String,
        display: ToolResultDisplay,
        ok: bool,
    },

    /// A follow-up model request (after at least one tool round-trip in
    /// this turn) produced its terminal text. See the enum doc for how this
    /// differs from `TurnComplete`.
    FollowUpComplete,

    /// The entire turn is complete (no more tool loops).
    TurnComplete { usage: Usage },

    /// The turn was cancelled before reaching a terminal state.
    Cancelled,

    /// An error occurred during the turn.
    Error { error: String },
}
