//! Cross-module invariants for the core types.

use synapse_core::{
    base_command, failure::help_hint, normalize, CommandResult, FailureCategory, PermissionSet,
};

#[test]
fn test_classification_is_a_partition() {
    // Every stderr maps to exactly one category.
    let samples = [
        "Unknown tool: frob",
        "bash: x: command not found",
        "usage: widget [-v]",
        "error: unexpected argument: --frob",
        "invalid parameters: missing field",
        "requires a number argument",
        "must be a non-negative number",
        "segfault at 0x0",
        "",
        "no keywords here at all",
    ];
    for stderr in samples {
        let category = FailureCategory::classify(stderr);
        let count = [
            FailureCategory::CommandNotFound,
            FailureCategory::InvalidUsage,
            FailureCategory::ExecutionError,
        ]
        .iter()
        .filter(|c| **c == category)
        .count();
        assert_eq!(count, 1, "{stderr:?} must land in exactly one category");
    }
}

#[test]
fn test_counting_policy_tracks_self_description_policy() {
    for category in [
        FailureCategory::CommandNotFound,
        FailureCategory::InvalidUsage,
        FailureCategory::ExecutionError,
    ] {
        // The hint fires exactly when the failure counts toward the breaker.
        assert_eq!(
            category.should_attach_self_description(),
            category.should_count_failure()
        );
    }
}

#[test]
fn test_base_command_for_every_layer_shape() {
    assert_eq!(base_command("read src/lib.rs"), "read");
    assert_eq!(base_command("mcp:fs:read_file {\"path\":\"x\"}"), "mcp:fs:read_file");
    assert_eq!(base_command("skill:review:run --fast"), "skill:review:run");
    assert_eq!(base_command("task:explore --prompt hi"), "task:explore");
    assert_eq!(base_command("  ls   -la  "), "ls");
}

#[test]
fn test_normalize_then_hint_round_trip() {
    let command = normalize("/skill:load review");
    let hint = help_hint(&base_command(&command));
    assert!(hint.contains("Bash(command=\"skill:load --help\")"));
}

#[test]
fn test_command_result_serde_round_trip() {
    let result = CommandResult::blocked("deny file-read", "~/.ssh/id_rsa");
    let json = serde_json::to_string(&result).unwrap();
    let back: CommandResult = serde_json::from_str(&json).unwrap();
    assert!(back.blocked);
    assert_eq!(back.blocked_reason.as_deref(), Some("deny file-read"));
    assert_eq!(back.blocked_resource.as_deref(), Some("~/.ssh/id_rsa"));
}

#[test]
fn test_permissions_never_exclude_unrelated_base() {
    let perms = PermissionSet::all().with_exclude(&["task:", "write", "skill:"]);
    for base in ["read", "glob", "ls", "mcp:fs:read", "TodoWrite"] {
        assert!(!perms.excludes(base), "{base} should pass");
    }
    for base in ["task:explore", "write", "skill:load", "skill:review:run"] {
        assert!(perms.excludes(base), "{base} should be excluded");
    }
}
