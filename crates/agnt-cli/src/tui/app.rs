use agnt_core::event::ToolCallDisplay;
use agnt_core::history::Entry;
use agnt_core::{Agent, AgentEvent, AgentStream, ConversationState};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};

use crate::session::SharedSessionStore;
use crate::tui::session_dialog::{self, ResumeSessionDialogState};
use crate::tui::typeahead::{ActiveTypeahead, TypeaheadActivation, TypeaheadState};
use crate::typeahead::{Command, Mention};

// ---------------------------------------------------------------------------
// Display messages (what the UI renders)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone)]
pub struct DisplayMessage {
    pub role: Role,
    pub chunks: Vec<StreamChunk>,
}

/// A typed chunk in the streaming assistant response, preserving
/// the natural ordering of reasoning, text, and tool calls.
#[derive(Debug, Clone)]
pub enum StreamChunk {
    /// Model reasoning/thinking text (rendered dimmed/italic).
    Reasoning(String),
    /// Regular assistant text.
    Text(String),
    /// Tool call status line (e.g. "[Read src/main.rs...]" or "[Read src/main.rs]").
    Tool(String),
}

// ---------------------------------------------------------------------------
// App state
// ---------------------------------------------------------------------------

pub enum AppState {
    Idle,
    Generating { stream: AgentStream },
}

/// A tool call awaiting the user's yes/no decision. Key input is routed here
/// instead of normal editing while this is set.
pub struct PendingApproval {
    pub id: String,
    pub tool_name: String,
    pub display: ToolCallDisplay,
}

pub struct App {
    pub agent: Agent,
    pub session_store: SharedSessionStore,
    pub messages: Vec<DisplayMessage>,
    pub input: String,
    pub cursor_pos: usize,
    pub scroll_offset: u16,
    pub state: AppState,
    /// Streaming assistant response as an ordered list of typed chunks.
    pub stream_chunks: Vec<StreamChunk>,
    pub should_quit: bool,
    /// Toggled by a timer to blink the streaming cursor.
    pub cursor_blink_on: bool,
    /// Maximum scroll offset (set by the renderer each frame).
    pub max_scroll: u16,
    pub pending_approval: Option<PendingApproval>,
    pub resume_dialog: Option<ResumeSessionDialogState>,
    typeahead: TypeaheadState,
}

impl App {
    pub fn new(agent: Agent, session_store: SharedSessionStore) -> Self {
        let messages = display_messages_from_history(&agent.conversation_state().entries);
        Self {
            agent,
            session_store,
            messages,
            input: String::new(),
            cursor_pos: 0,
            scroll_offset: 0,
            state: AppState::Idle,
            stream_chunks: Vec::new(),
            should_quit: false,
            cursor_blink_on: true,
            max_scroll: 0,
            pending_approval: None,
            resume_dialog: None,
            typeahead: TypeaheadState::new_for_current_project(),
        }
    }

    /// Handle a keyboard event. Returns true if the event was consumed.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        if self.pending_approval.is_some() {
            return self.handle_approval_key(key);
        }

        if self.resume_dialog.is_some() {
            return self.handle_resume_dialog_key(key);
        }

        match key.code {
            // Quit
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                if matches!(self.state, AppState::Generating { .. }) {
                    // Cancel generation by dropping the stream
                    self.finalize_response();
                    self.state = AppState::Idle;
                } else {
                    self.should_quit = true;
                }
                true
            }

            // Submit
            KeyCode::Enter
                if !key
                    .modifiers
                    .intersects(KeyModifiers::SHIFT | KeyModifiers::ALT) =>
            {
                if let Some(activation) = self
                    .typeahead
                    .activate_selected(&self.input, self.cursor_pos)
                {
                    self.apply_typeahead_activation(activation);
                    return true;
                }
                if matches!(self.state, AppState::Idle) && !self.input.trim().is_empty() {
                    self.submit();
                }
                true
            }

            // Newline in input
            KeyCode::Enter
                if key
                    .modifiers
                    .intersects(KeyModifiers::SHIFT | KeyModifiers::ALT) =>
            {
                self.insert_char('\n');
                true
            }

            // Escape → cancel if generating
            KeyCode::Esc => {
                if matches!(self.state, AppState::Generating { .. }) {
                    self.finalize_response();
                    self.state = AppState::Idle;
                } else {
                    self.typeahead.dismiss(&self.input, self.cursor_pos);
                }
                true
            }

            // Text input
            KeyCode::Char(c) => {
                self.insert_char(c);
                self.typeahead.sync(&self.input, self.cursor_pos);
                true
            }
            KeyCode::Backspace => {
                if self.cursor_pos > 0 {
                    self.cursor_pos -= 1;
                    self.input.remove(self.cursor_pos);
                    self.typeahead.sync(&self.input, self.cursor_pos);
                }
                true
            }
            KeyCode::Delete => {
                if self.cursor_pos < self.input.len() {
                    self.input.remove(self.cursor_pos);
                    self.typeahead.sync(&self.input, self.cursor_pos);
                }
                true
            }
            KeyCode::Left => {
                if self.cursor_pos > 0 {
                    self.cursor_pos -= 1;
                    self.typeahead.sync(&self.input, self.cursor_pos);
                }
                true
            }
            KeyCode::Right => {
                if self.cursor_pos < self.input.len() {
                    self.cursor_pos += 1;
                    self.typeahead.sync(&self.input, self.cursor_pos);
                }
                true
            }
            KeyCode::Home => {
                self.cursor_pos = 0;
                self.typeahead.sync(&self.input, self.cursor_pos);
                true
            }
            KeyCode::End => {
                self.cursor_pos = self.input.len();
                self.typeahead.sync(&self.input, self.cursor_pos);
                true
            }
            KeyCode::Up => {
                self.typeahead
                    .move_selection(-1, &self.input, self.cursor_pos);
                true
            }
            KeyCode::Down => {
                self.typeahead
                    .move_selection(1, &self.input, self.cursor_pos);
                true
            }

            // Scroll history
            KeyCode::PageUp => {
                self.scroll_offset = self.scroll_offset.saturating_add(10).min(self.max_scroll);
                true
            }
            KeyCode::PageDown => {
                self.scroll_offset = self.scroll_offset.saturating_sub(10);
                true
            }

            _ => false,
        }
    }

    /// Handle a key while a [`PendingApproval`] is awaiting a decision.
    /// `y`/Enter approves, `n`/Escape denies; any other key is ignored.
    fn handle_approval_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                self.answer_pending_approval(true);
                true
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                self.answer_pending_approval(false);
                true
            }
            _ => true,
        }
    }

    /// Handle a key while the resume-session dialog is open.
    fn handle_resume_dialog_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Up => {
                if let Some(dialog) = &mut self.resume_dialog {
                    session_dialog::move_selection(dialog, -1);
                }
                true
            }
            KeyCode::Down => {
                if let Some(dialog) = &mut self.resume_dialog {
                    session_dialog::move_selection(dialog, 1);
                }
                true
            }
            KeyCode::Enter => {
                self.confirm_resume_dialog();
                true
            }
            KeyCode::Esc => {
                self.resume_dialog = None;
                true
            }
            _ => true,
        }
    }

    fn confirm_resume_dialog(&mut self) {
        let Some(dialog) = self.resume_dialog.take() else {
            return;
        };
        let Some(session_id) = session_dialog::selected_session_id(&dialog).map(str::to_string)
        else {
            return;
        };

        if matches!(self.state, AppState::Generating { .. }) {
            self.finalize_response();
            self.state = AppState::Idle;
        }

        let activated = self.session_store.lock().activate_session(&session_id);

        match activated {
            Ok(conversation_state) => {
                let entries = conversation_state.map(|s| s.entries).unwrap_or_default();
                self.messages = display_messages_from_history(&entries);
                self.agent
                    .restore_conversation_state(ConversationState { entries });
                self.stream_chunks.clear();
                self.input.clear();
                self.cursor_pos = 0;
                self.scroll_offset = 0;
                self.max_scroll = 0;
                self.typeahead.sync(&self.input, self.cursor_pos);
            }
            Err(err) => {
                self.stream_chunks
                    .push(StreamChunk::Tool(format!("[session error: {err}]")));
            }
        }
    }

    fn answer_pending_approval(&mut self, approved: bool) {
        let Some(pending) = self.pending_approval.take() else {
            return;
        };
        if let AppState::Generating { stream } = &self.state {
            stream.respond_approval(&pending.id, approved);
        }
    }

    /// Handle a mouse event.
    pub fn handle_mouse(&mut self, mouse: MouseEvent) {
        match mouse.kind {
            MouseEventKind::ScrollUp => {
                self.scroll_offset = self.scroll_offset.saturating_add(3).min(self.max_scroll);
            }
            MouseEventKind::ScrollDown => {
                self.scroll_offset = self.scroll_offset.saturating_sub(3);
            }
            _ => {}
        }
    }

    /// Handle an agent event.
    pub fn handle_agent_event(&mut self, event: AgentEvent) {
        match event {
            AgentEvent::UserMessage { content } => {
                // Clear input now that the message is recorded in history
                self.input.clear();
                self.cursor_pos = 0;
                self.typeahead.sync(&self.input, self.cursor_pos);
                self.messages.push(DisplayMessage {
                    role: Role::User,
                    chunks: vec![StreamChunk::Text(content)],
                });
            }
            AgentEvent::TextDelta { delta } => {
                // Append to the last Text chunk, or start a new one.
                if let Some(StreamChunk::Text(s)) = self.stream_chunks.last_mut() {
                    s.push_str(&delta);
                } else {
                    self.stream_chunks.push(StreamChunk::Text(delta));
                }
                self.cursor_blink_on = true;
            }
            AgentEvent::ReasoningDelta { delta } => {
                // Append to the last Reasoning chunk, or start a new one.
                if let Some(StreamChunk::Reasoning(s)) = self.stream_chunks.last_mut() {
                    s.push_str(&delta);
                } else {
                    self.stream_chunks.push(StreamChunk::Reasoning(delta));
                }
                self.cursor_blink_on = true;
            }
            AgentEvent::ToolCallStart { display, .. } => {
                self.stream_chunks
                    .push(StreamChunk::Tool(format!("[{}...]", display.title)));
            }
            AgentEvent::ApprovalRequested {
                id,
                tool_name,
                display,
            } => {
                self.pending_approval = Some(PendingApproval {
                    id,
                    tool_name,
                    display,
                });
            }
            AgentEvent::ToolCallDone { display, .. } => {
                self.stream_chunks
                    .push(StreamChunk::Tool(format!("[{}]", display.title)));
            }
            AgentEvent::FollowUpComplete => {}
            AgentEvent::TurnComplete { usage } => {
                if let Err(err) = self
                    .session_store
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .persist_turn_from_agent(&self.agent, &usage)
                {
                    self.stream_chunks
                        .push(StreamChunk::Tool(format!("[session save error: {err}]")));
                }
                self.finalize_response();
                self.state = AppState::Idle;
            }
            AgentEvent::Cancelled => {
                self.stream_chunks.push(StreamChunk::Tool("[cancelled]".to_string()));
                self.finalize_response();
                self.state = AppState::Idle;
            }
            AgentEvent::Error { error } => {
                self.stream_chunks
                    .push(StreamChunk::Tool(format!("[error: {error}]")));
                self.finalize_response();
                self.state = AppState::Idle;
            }
        }
    }

    fn submit(&mut self) {
        let text = self.input.trim().to_string();
        self.stream_chunks.clear();
        // Input stays visible until UserMessage event confirms it's in history
        let stream = self.agent.submit(&text);
        self.state = AppState::Generating { stream };
    }

    fn finalize_response(&mut self) {
        let chunks = std::mem::take(&mut self.stream_chunks);
        if !chunks.is_empty() {
            self.messages.push(DisplayMessage {
                role: Role::Assistant,
                chunks,
            });
        }
    }

    pub fn toggle_cursor_blink(&mut self) {
        self.cursor_blink_on = !self.cursor_blink_on;
    }

    fn insert_char(&mut self, c: char) {
        self.input.insert(self.cursor_pos, c);
        self.cursor_pos += c.len_utf8();
    }

    pub fn typeahead_matches(&mut self) -> Option<ActiveTypeahead> {
        self.typeahead.visible_matches(&self.input, self.cursor_pos)
    }

    pub fn typeahead_selected_index(&self) -> usize {
        self.typeahead.selected_index()
    }

    pub fn should_poll_typeahead(&self) -> bool {
        self.typeahead
            .has_background_work(&self.input, self.cursor_pos)
    }

    fn apply_typeahead_activation(&mut self, activation: TypeaheadActivation) {
        match activation {
            TypeaheadActivation::Mention {
                mention,
                token_start,
                token_end,
            } => self.apply_mention(mention, token_start, token_end),
            TypeaheadActivation::Command { command, .. } => self.run_command(command),
        }
    }

    fn apply_mention(&mut self, mention: Mention, token_start: usize, token_end: usize) {
        let mention_text = match mention {
            Mention::File(path) => path.to_string_lossy().replace('\\', "/"),
        };
        let replacement = format!("{mention_text} ");
        self.input
            .replace_range(token_start..token_end, &replacement);
        self.cursor_pos = token_start + replacement.len();
        self.typeahead.sync(&self.input, self.cursor_pos);
    }

    fn run_command(&mut self, command: Command) {
        match command {
            Command::NewSession => self.start_new_session(),
            Command::ResumeSession => self.open_resume_dialog(),
        }
    }

    fn open_resume_dialog(&mut self) {
        match self.session_store.lock().list_sessions(20) {
            Ok(sessions) => {
                let entries = session_dialog::build_dialog_entries(sessions);
                self.resume_dialog = Some(ResumeSessionDialogState {
                    entries,
                    selected_index: 0,
                });
            }
            Err(err) => {
                self.stream_chunks
                    .push(StreamChunk::Tool(format!("[session error: {err}]")));
            }
        }
    }

    fn start_new_session(&mut self) {
        if matches!(self.state, AppState::Generating { .. }) {
            self.finalize_response();
            self.state = AppState::Idle;
        }

        match self.session_store.lock().create_session(None) {
            Ok(_) => {
                self.agent.restore_conversation_state(ConversationState {
                    entries: Vec::new(),
                });
                self.messages.clear();
                self.stream_chunks.clear();
                self.input.clear();
                self.cursor_pos = 0;
                self.scroll_offset = 0;
                self.max_scroll = 0;
                self.typeahead.sync(&self.input, self.cursor_pos);
            }
            Err(err) => {
                self.stream_chunks
                    .push(StreamChunk::Tool(format!("[session error: {err}]")));
            }
        }
    }
}

/// Replay saved [`Entry`] values into the flat `(role, chunks)` shape the
/// renderer expects. Tool results are folded onto the same chunk list as the
/// assistant text around them, matching how they appeared live.
pub fn display_messages_from_history(entries: &[Entry]) -> Vec<DisplayMessage> {
    let mut out = Vec::new();
    let mut current: Option<DisplayMessage> = None;

    let mut flush = |current: &mut Option<DisplayMessage>, out: &mut Vec<DisplayMessage>| {
        if let Some(message) = current.take()
            && !message.chunks.is_empty()
        {
            out.push(message);
        }
    };

    for entry in entries {
        match entry {
            Entry::SystemText(_) => {}
            Entry::UserText(text) => {
                flush(&mut current, &mut out);
                out.push(DisplayMessage {
                    role: Role::User,
                    chunks: vec![StreamChunk::Text(text.clone())],
                });
            }
            Entry::AssistantText(text) => {
                let message = current.get_or_insert_with(|| DisplayMessage {
                    role: Role::Assistant,
                    chunks: Vec::new(),
                });
                message.chunks.push(StreamChunk::Text(text.clone()));
            }
            Entry::AssistantToolRequest(calls) => {
                let message = current.get_or_insert_with(|| DisplayMessage {
                    role: Role::Assistant,
                    chunks: Vec::new(),
                });
                for call in calls {
                    message
                        .chunks
                        .push(StreamChunk::Tool(format!("[{}...]", call.name)));
                }
            }
            Entry::ToolResult { name, payload, ok } => {
                let message = current.get_or_insert_with(|| DisplayMessage {
                    role: Role::Assistant,
                    chunks: Vec::new(),
                });
                let summary = match payload {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                let status = if *ok { "ok" } else { "error" };
                message
                    .chunks
                    .push(StreamChunk::Tool(format!("[{name}: {status}] {summary}")));
            }
        }
    }
    flush(&mut current, &mut out);

    out
}
