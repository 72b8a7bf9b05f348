mod execute_command;
mod hashline;
mod list_directory;
mod patch_file;
mod read;
mod write;

pub use execute_command::ExecuteCommandTool;
pub use list_directory::ListDirectoryTool;
pub use patch_file::PatchFileTool;
pub use read::ReadTool;
pub use write::WriteTool;
