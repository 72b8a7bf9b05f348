//! The approval gate (C5): a pure lookup from `(ApprovalMode, tool name)` to
//! a verdict. Grounded on the teacher's absence of any approval concept and
//! on a sibling example's policy engine shape (table-driven `decide()` with
//! dense unit tests), adapted to the fixed four-mode/five-tool table
//! SPEC_FULL.md §4.5 specifies rather than a glob-pattern policy.

/// The four approval modes a session can run in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApprovalMode {
    /// Ask before any write or command; auto-approve reads.
    Suggest,
    /// Auto-approve file writes and patches; still ask before commands.
    AutoEdit,
    /// Auto-approve everything, with commands run inside a sandbox.
    FullAuto,
    /// Auto-approve everything, commands run unsandboxed.
    Dangerous,
}

/// The gate's decision for a pending tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Proceed without asking.
    Auto,
    /// Proceed without asking, but constrain command execution to a
    /// sandbox.
    AutoSandboxed,
    /// Ask the user; the orchestrator blocks on a UI round-trip.
    Ask,
}

const READ_ONLY_TOOLS: &[&str] = &["read_file", "list_directory"];
const WRITE_TOOLS: &[&str] = &["write_file", "patch_file"];
const COMMAND_TOOL: &str = "execute_command";

/// Decide what to do with a pending call to `tool_name` under `mode`.
///
/// This is a pure function of its two arguments by design (a testable
/// property in SPEC_FULL.md §8): it never inspects the call's arguments or
/// any conversation state.
pub fn decide(mode: ApprovalMode, tool_name: &str) -> Verdict {
    if READ_ONLY_TOOLS.contains(&tool_name) {
        return Verdict::Auto;
    }

    if tool_name == COMMAND_TOOL {
        return match mode {
            ApprovalMode::Suggest | ApprovalMode::AutoEdit => Verdict::Ask,
            ApprovalMode::FullAuto => Verdict::AutoSandboxed,
            ApprovalMode::Dangerous => Verdict::Auto,
        };
    }

    if WRITE_TOOLS.contains(&tool_name) {
        return match mode {
            ApprovalMode::Suggest => Verdict::Ask,
            ApprovalMode::AutoEdit | ApprovalMode::FullAuto | ApprovalMode::Dangerous => {
                Verdict::Auto
            }
        };
    }

    // Unknown tools: same posture as write tools — ask only in suggest mode.
    match mode {
        ApprovalMode::Suggest => Verdict::Ask,
        _ => Verdict::Auto,
    }
}

/// Message recorded as the tool result when the user denies an `Ask`
/// verdict. Appended to history like any real result, preserving
/// Invariant 3.1.
pub fn denial_message(tool_name: &str) -> String {
    format!("Operation '{tool_name}' denied by user.")
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_MODES: [ApprovalMode; 4] = [
        ApprovalMode::Suggest,
        ApprovalMode::AutoEdit,
        ApprovalMode::FullAuto,
        ApprovalMode::Dangerous,
    ];

    #[test]
    fn reads_are_always_auto() {
        for mode in ALL_MODES {
            assert_eq!(decide(mode, "read_file"), Verdict::Auto);
            assert_eq!(decide(mode, "list_directory"), Verdict::Auto);
        }
    }

    #[test]
    fn writes_ask_only_in_suggest() {
        for tool in ["write_file", "patch_file"] {
            assert_eq!(decide(ApprovalMode::Suggest, tool), Verdict::Ask);
            assert_eq!(decide(ApprovalMode::AutoEdit, tool), Verdict::Auto);
            assert_eq!(decide(ApprovalMode::FullAuto, tool), Verdict::Auto);
            assert_eq!(decide(ApprovalMode::Dangerous, tool), Verdict::Auto);
        }
    }

    #[test]
    fn commands_follow_the_full_table() {
        assert_eq!(decide(ApprovalMode::Suggest, COMMAND_TOOL), Verdict::Ask);
        assert_eq!(decide(ApprovalMode::AutoEdit, COMMAND_TOOL), Verdict::Ask);
        assert_eq!(
            decide(ApprovalMode::FullAuto, COMMAND_TOOL),
            Verdict::AutoSandboxed
        );
        assert_eq!(decide(ApprovalMode::Dangerous, COMMAND_TOOL), Verdict::Auto);
    }

    #[test]
    fn decision_depends_only_on_mode_and_name() {
        // Calling twice with identical arguments always agrees — there is
        // no hidden state to perturb the answer.
        for mode in ALL_MODES {
            for tool in ["read_file", "write_file", "execute_command", "unknown_tool"] {
                assert_eq!(decide(mode, tool), decide(mode, tool));
            }
        }
    }

    #[test]
    fn unknown_tool_is_conservative_like_suggest_mode_writes() {
        assert_eq!(decide(ApprovalMode::Suggest, "mystery"), Verdict::Ask);
        assert_eq!(decide(ApprovalMode::Dangerous, "mystery"), Verdict::Auto);
    }
}
