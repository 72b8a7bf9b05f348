pub mod agent;
pub mod approval;
pub mod error;
pub mod event;
pub mod history;
pub mod tool;
pub mod tools;

pub use agent::{Agent, AgentStream, ConversationState};
pub use approval::{ApprovalMode, Verdict};
pub use error::Error;
pub use event::{AgentEvent, DisplayBody, ToolCallDisplay, ToolResultDisplay};
pub use history::{Entry, History, HistoryConfig};
pub use tool::{ErasedTool, Tool, ToolOutcome, ToolOutput};
pub use tools::{ExecuteCommandTool, ListDirectoryTool, PatchFileTool, ReadTool, WriteTool};
