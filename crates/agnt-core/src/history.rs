use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use agnt_llm::request::{AssistantPart, ReasoningPart, TextPart, ToolCallPart};
use agnt_llm::{LanguageModel, Message};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Error;

/// A single recorded conversation event.
///
/// See `Invariant 3.1`: for every [`Entry::AssistantToolRequest`], a
/// [`Entry::ToolResult`] for each of its call ids must appear before the
/// next [`Entry::AssistantText`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Entry {
    SystemText(String),
    UserText(String),
    AssistantText(String),
    AssistantToolRequest(Vec<ToolCallRecord>),
    ToolResult {
        call_id: String,
        name: String,
        payload: serde_json::Value,
        ok: bool,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub id: String,
    pub name: String,
    /// Always valid JSON; empty arguments are normalized to `"{}"`.
    pub arguments: String,
}

const SUMMARY_PREFIX: &str = "Summary of conversation: ";
const PER_ENTRY_OVERHEAD: usize = 4;
const KEEP_RECENT_AFTER_SUMMARY: usize = 4;

fn entry_content_len(entry: &Entry) -> usize {
    match entry {
        Entry::SystemText(t) | Entry::UserText(t) | Entry::AssistantText(t) => t.chars().count(),
        Entry::AssistantToolRequest(calls) => calls
            .iter()
            .map(|c| c.name.chars().count() + c.arguments.chars().count())
            .sum(),
        Entry::ToolResult { payload, .. } => payload.to_string().chars().count(),
    }
}

/// Cheap token estimate: a fixed per-entry overhead plus ~1 token per 4
/// content characters. Not meant to be exact, only a stable heuristic that
/// the pruning protocol can budget against.
pub fn estimate_tokens(entries: &[Entry]) -> usize {
    entries
        .iter()
        .map(|e| PER_ENTRY_OVERHEAD + entry_content_len(e).div_ceil(4))
        .sum()
}

#[derive(Debug, Clone)]
pub struct HistoryConfig {
    pub max_tokens: usize,
    pub system_prompt: Option<String>,
    pub persistence_path: Option<PathBuf>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_tokens: 32_000,
            system_prompt: None,
            persistence_path: None,
        }
    }
}

/// Produces a condensed summary of conversation entries for the pruning
/// protocol's last resort. Implementations must never panic; a failing
/// summarizer should return `None` so the caller falls back to a trivial
/// summary string.
pub trait Summarizer: Send + Sync {
    fn summarize<'a>(
        &'a self,
        entries: &'a [Entry],
    ) -> Pin<Box<dyn Future<Output = Option<String>> + Send + 'a>>;
}

/// The default "no summarization" binding: pruning always falls back to the
/// trivial `"Summary: N messages"` string.
pub struct NullSummarizer;

impl Summarizer for NullSummarizer {
    fn summarize<'a>(
        &'a self,
        _entries: &'a [Entry],
    ) -> Pin<Box<dyn Future<Output = Option<String>> + Send + 'a>> {
        Box::pin(async { None })
    }
}

/// A summarizer that delegates to a second, cheap model call.
pub struct ModelSummarizer {
    model: Arc<LanguageModel>,
}

impl ModelSummarizer {
    pub fn new(model: Arc<LanguageModel>) -> Self {
        Self { model }
    }
}

impl Summarizer for ModelSummarizer {
    fn summarize<'a>(
        &'a self,
        entries: &'a [Entry],
    ) -> Pin<Box<dyn Future<Output = Option<String>> + Send + 'a>> {
        Box::pin(async move {
            let transcript = render_plain_transcript(entries);
            let mut req = agnt_llm::request();
            req.system("Summarize this conversation concisely for context continuity.")
                .user(transcript)
                .max_tokens(256);

            match self.model.generate(req.build()).into_result().await {
                Ok(result) if !result.text.trim().is_empty() => Some(result.text),
                Ok(_) => None,
                Err(e) => {
                    warn!(error = %e, "summarizer model call failed, falling back to trivial summary");
                    None
                }
            }
        })
    }
}

fn render_plain_transcript(entries: &[Entry]) -> String {
    entries
        .iter()
        .filter_map(|e| match e {
            Entry::UserText(t) => Some(format!("User: {t}")),
            Entry::AssistantText(t) => Some(format!("Assistant: {t}")),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Disk-persisted shape for a history, matching the `messages` rollout
/// convention shared with `agnt-db`'s session rollout rows.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedHistory {
    messages: Vec<Entry>,
    max_token_count: usize,
    current_session: String,
    created_at: String,
    updated_at: String,
}

/// The token-budgeted conversation history.
///
/// Readers take a point-in-time [`History::snapshot`]; writers go through
/// [`History::append`], which enforces the pruning protocol. Shared mutable
/// state is a single mutex — this is deliberately the *only* piece of cross-
/// task shared state in the orchestrator (see SPEC_FULL.md §5).
pub struct History {
    entries: Mutex<Vec<Entry>>,
    config: HistoryConfig,
    summarizer: Arc<dyn Summarizer>,
}

impl History {
    pub fn new(config: HistoryConfig, summarizer: Arc<dyn Summarizer>) -> Self {
        let mut entries = Vec::new();
        if let Some(ref prompt) = config.system_prompt {
            entries.push(Entry::SystemText(prompt.clone()));
        }
        Self {
            entries: Mutex::new(entries),
            config,
            summarizer,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Entry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append an entry, then run the pruning protocol if the estimated
    /// token count now exceeds the configured budget.
    pub async fn append(&self, entry: Entry) {
        {
            let mut entries = self.lock();
            entries.push(entry);
        }
        self.prune_if_needed().await;
    }

    async fn prune_if_needed(&self) {
        let over_budget = {
            let entries = self.lock();
            estimate_tokens(&entries) > self.config.max_tokens
        };
        if !over_budget {
            return;
        }

        // Step 1-2: drop the oldest non-system entries while over budget,
        // keeping at least the last two.
        loop {
            let (should_drop, still_over) = {
                let entries = self.lock();
                let other_count = entries.iter().filter(|e| !matches!(e, Entry::SystemText(_))).count();
                let over = estimate_tokens(&entries) > self.config.max_tokens;
                (other_count > 2 && over, over)
            };
            if !should_drop {
                if !still_over {
                    return;
                }
                break;
            }
            let mut entries = self.lock();
            if let Some(idx) = entries.iter().position(|e| !matches!(e, Entry::SystemText(_))) {
                entries.remove(idx);
            } else {
                break;
            }
        }

        // Step 3: still over budget — summarize.
        let (still_over, non_system_snapshot) = {
            let entries = self.lock();
            (
                estimate_tokens(&entries) > self.config.max_tokens,
                entries
                    .iter()
                    .filter(|e| !matches!(e, Entry::SystemText(_)))
                    .cloned()
                    .collect::<Vec<_>>(),
            )
        };
        if !still_over {
            return;
        }

        // Never re-summarize an existing summary entry; fold it into the
        // new one's input so it still informs the condensed text.
        let already_summarized = non_system_snapshot.len();
        let summary_text = self
            .summarizer
            .summarize(&non_system_snapshot)
            .await
            .unwrap_or_else(|| format!("Summary: {already_summarized} messages"));

        let mut entries = self.lock();
        let systems: Vec<Entry> = entries
            .iter()
            .filter(|e| matches!(e, Entry::SystemText(_)))
            .cloned()
            .collect();
        let recent: Vec<Entry> = entries
            .iter()
            .filter(|e| !matches!(e, Entry::SystemText(_)))
            .rev()
            .take(KEEP_RECENT_AFTER_SUMMARY)
            .cloned()
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();

        let mut rebuilt = systems;
        rebuilt.push(Entry::SystemText(format!("{SUMMARY_PREFIX}{summary_text}")));
        rebuilt.extend(recent);
        debug!(entries = rebuilt.len(), "pruned history via summarization");
        *entries = rebuilt;
    }

    /// A point-in-time copy of all entries, oldest first.
    pub fn snapshot(&self) -> Vec<Entry> {
        self.lock().clone()
    }

    /// Remove all entries, including the system prompt (see SPEC_FULL.md §9
    /// — callers that want a persona to survive `/clear` must re-seed it).
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Re-seed a system prompt, e.g. immediately after [`History::clear`].
    pub fn seed_system(&self, prompt: impl Into<String>) {
        self.lock().insert(0, Entry::SystemText(prompt.into()));
    }

    pub fn estimated_tokens(&self) -> usize {
        estimate_tokens(&self.lock())
    }

    /// Convert the current snapshot into provider-agnostic chat messages
    /// suitable for a [`agnt_llm::request::RequestBuilder`].
    pub fn to_messages(&self) -> Vec<Message> {
        entries_to_messages(&self.snapshot())
    }

    pub async fn save(&self, session_id: &str, timestamp: &str) -> Result<(), Error> {
        let Some(path) = self.config.persistence_path.clone() else {
            return Ok(());
        };
        let persisted = PersistedHistory {
            messages: self.snapshot(),
            max_token_count: self.config.max_tokens,
            current_session: session_id.to_string(),
            created_at: timestamp.to_string(),
            updated_at: timestamp.to_string(),
        };
        let json = serde_json::to_vec_pretty(&persisted)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, json).await?;
        Ok(())
    }

    pub async fn load(
        path: &Path,
        config: HistoryConfig,
        summarizer: Arc<dyn Summarizer>,
    ) -> Result<Self, Error> {
        let bytes = tokio::fs::read(path).await?;
        let persisted: PersistedHistory = serde_json::from_slice(&bytes)?;
        Ok(Self {
            entries: Mutex::new(persisted.messages),
            config,
            summarizer,
        })
    }
}

fn entries_to_messages(entries: &[Entry]) -> Vec<Message> {
    let mut messages = Vec::new();
    for entry in entries {
        match entry {
            Entry::SystemText(t) => messages.push(Message::system(t.clone())),
            Entry::UserText(t) => messages.push(Message::user(t.clone())),
            Entry::AssistantText(t) => messages.push(Message::assistant(t.clone())),
            Entry::AssistantToolRequest(calls) => {
                let parts = calls
                    .iter()
                    .map(|c| ToolCallPart {
                        id: c.id.clone(),
                        name: c.name.clone(),
                        arguments: c.arguments.clone(),
                        metadata: Default::default(),
                    })
                    .collect();
                messages.push(Message::assistant_tool_calls(parts));
            }
            Entry::ToolResult { call_id, payload, .. } => {
                // A plain string payload (the common case — a tool's
                // `to_llm()` text) is sent verbatim; anything else is
                // rendered as JSON.
                let content = match payload {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                messages.push(Message::tool_result(call_id.clone(), content));
            }
        }
    }
    messages
}

/// Unused directly but documents the shape the conversion walks through
/// when an assistant turn mixes reasoning, text, and tool calls (reasoning
/// content itself is never persisted into history — only its side effect on
/// ordering matters at the `agnt_llm` request layer).
#[allow(dead_code)]
fn _reasoning_part_is_not_persisted(_: ReasoningPart, _: AssistantPart, _: TextPart) {}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_tokens: usize) -> HistoryConfig {
        HistoryConfig {
            max_tokens,
            system_prompt: Some("you are helpful".into()),
            persistence_path: None,
        }
    }

    #[tokio::test]
    async fn clear_removes_the_system_prompt_too() {
        let history = History::new(config(10_000), Arc::new(NullSummarizer));
        history.append(Entry::UserText("hi".into())).await;
        history.clear();
        assert!(history.snapshot().is_empty());
    }

    #[tokio::test]
    async fn append_is_monotone_until_a_prune_drops_something() {
        let history = History::new(config(10_000), Arc::new(NullSummarizer));
        let before = history.estimated_tokens();
        history.append(Entry::UserText("hello there".into())).await;
        assert!(history.estimated_tokens() >= before);
    }

    #[tokio::test]
    async fn pruning_drops_oldest_non_system_entries_first() {
        let history = History::new(config(40), Arc::new(NullSummarizer));
        for i in 0..20 {
            history
                .append(Entry::UserText(format!("message number {i} is fairly long text")))
                .await;
        }
        let snapshot = history.snapshot();
        // System prompt must survive; budget should be respected or at
        // least be much smaller than appending everything would produce.
        assert!(matches!(snapshot.first(), Some(Entry::SystemText(_))));
        assert!(snapshot.len() < 21);
    }

    #[tokio::test]
    async fn tool_request_and_result_round_trip_to_messages() {
        let history = History::new(config(10_000), Arc::new(NullSummarizer));
        history
            .append(Entry::AssistantToolRequest(vec![ToolCallRecord {
                id: "c1".into(),
                name: "read_file".into(),
                arguments: "{}".into(),
            }]))
            .await;
        history
            .append(Entry::ToolResult {
                call_id: "c1".into(),
                name: "read_file".into(),
                payload: serde_json::json!({"output": "contents"}),
                ok: true,
            })
            .await;
        let messages = history.to_messages();
        assert!(matches!(messages.last(), Some(Message::Tool { .. })));
    }
}
