//! Wire-shape tests for the provider types.

use synapse_llm::{
    validate_and_heal_messages, AccumulatedToolCall, ContentBlock, LlmContent, LlmMessage,
    LlmRequest,
};

fn tool_use(id: &str) -> ContentBlock {
    ContentBlock::ToolUse {
        id: id.into(),
        name: "Bash".into(),
        input: serde_json::json!({"command": "pwd"}),
    }
}

fn tool_result(id: &str) -> ContentBlock {
    ContentBlock::ToolResult {
        tool_use_id: id.into(),
        content: "ok".into(),
        is_error: None,
    }
}

fn result_ids(message: &LlmMessage) -> Vec<String> {
    match &message.content {
        LlmContent::Blocks(blocks) => blocks
            .iter()
            .filter_map(|b| match b {
                ContentBlock::ToolResult { tool_use_id, .. } => Some(tool_use_id.clone()),
                _ => None,
            })
            .collect(),
        LlmContent::Text(_) => Vec::new(),
    }
}

#[test]
fn test_heal_appends_results_for_dangling_tool_use() {
    let messages = vec![
        LlmMessage::user("go"),
        LlmMessage::assistant_blocks(vec![tool_use("t1")]),
    ];
    let healed = validate_and_heal_messages(&messages);
    assert_eq!(healed.len(), 3);
    assert_eq!(healed[2].role, "user");
    assert_eq!(result_ids(&healed[2]), vec!["t1"]);
}

#[test]
fn test_heal_merges_missing_results_into_existing_turn() {
    let messages = vec![
        LlmMessage::user("go"),
        LlmMessage::assistant_blocks(vec![tool_use("t1"), tool_use("t2")]),
        LlmMessage::tool_results(vec![tool_result("t2")]),
    ];
    let healed = validate_and_heal_messages(&messages);
    assert_eq!(healed.len(), 3);
    let ids = result_ids(&healed[2]);
    assert!(ids.contains(&"t1".to_string()));
    assert!(ids.contains(&"t2".to_string()));
}

#[test]
fn test_heal_leaves_complete_history_untouched() {
    let messages = vec![
        LlmMessage::user("go"),
        LlmMessage::assistant_blocks(vec![tool_use("t1")]),
        LlmMessage::tool_results(vec![tool_result("t1")]),
        LlmMessage::assistant_blocks(vec![ContentBlock::Text { text: "done".into() }]),
    ];
    let healed = validate_and_heal_messages(&messages);
    assert_eq!(healed.len(), messages.len());
    assert_eq!(result_ids(&healed[2]), vec!["t1"]);
}

#[test]
fn test_request_skips_absent_fields() {
    let request = LlmRequest {
        model: "m".into(),
        messages: vec![LlmMessage::user("hi")],
        tools: None,
        max_tokens: None,
        system: None,
    };
    let v = serde_json::to_value(&request).unwrap();
    assert!(v.get("tools").is_none());
    assert!(v.get("system").is_none());
    assert!(v.get("max_tokens").is_none());
}

#[test]
fn test_text_content_serializes_as_plain_string() {
    let message = LlmMessage::user("hello");
    let v = serde_json::to_value(&message).unwrap();
    assert_eq!(v["content"], "hello");
    assert_eq!(v["role"], "user");
}

#[test]
fn test_tool_result_message_shape() {
    let message = LlmMessage::tool_results(vec![ContentBlock::ToolResult {
        tool_use_id: "t1".into(),
        content: "output".into(),
        is_error: Some(true),
    }]);
    let v = serde_json::to_value(&message).unwrap();
    assert_eq!(v["role"], "user");
    assert_eq!(v["content"][0]["type"], "tool_result");
    assert_eq!(v["content"][0]["is_error"], true);
}

#[test]
fn test_assistant_blocks_preserve_tool_use() {
    let message = LlmMessage::assistant_blocks(vec![
        ContentBlock::Text { text: "thinking aloud".into() },
        ContentBlock::ToolUse {
            id: "t1".into(),
            name: "Bash".into(),
            input: serde_json::json!({"command": "pwd"}),
        },
    ]);
    let v = serde_json::to_value(&message).unwrap();
    assert_eq!(v["content"][1]["type"], "tool_use");
    assert_eq!(v["content"][1]["input"]["command"], "pwd");
}

#[test]
fn test_accumulated_arguments_concatenate() {
    let mut call = AccumulatedToolCall {
        id: "t1".into(),
        name: "Bash".into(),
        arguments: String::new(),
    };
    for chunk in [r#"{"com"#, r#"mand":"#, r#""ls"}"#] {
        call.arguments.push_str(chunk);
    }
    assert_eq!(call.parse_arguments().unwrap()["command"], "ls");
}

#[test]
fn test_content_round_trip() {
    let content = LlmContent::Blocks(vec![ContentBlock::Text { text: "x".into() }]);
    let json = serde_json::to_string(&content).unwrap();
    let back: LlmContent = serde_json::from_str(&json).unwrap();
    match back {
        LlmContent::Blocks(blocks) => assert_eq!(blocks.len(), 1),
        LlmContent::Text(_) => panic!("expected blocks"),
    }
}
