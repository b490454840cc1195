use serde_json::{json, Value};
use toolprobe::{classify, Classification};

fn payload_with_message(message: Value) -> Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [{"index": 0, "message": message, "finish_reason": "stop"}]
    })
}

#[test]
fn structured_payload_extracts_every_call() {
    let payload = payload_with_message(json!({
        "role": "assistant",
        "content": null,
        "tool_calls": [{
            "id": "call_1",
            "type": "function",
            "function": {"name": "get_weather", "arguments": "{\"location\":\"Paris\"}"}
        }]
    }));

    let result = classify(&payload);
    assert_eq!(result.classification, Classification::Structured);
    assert_eq!(result.invocations.len(), 1);
    assert_eq!(result.invocations[0].name, "get_weather");
    assert_eq!(result.invocations[0].id.as_deref(), Some("call_1"));
    assert_eq!(
        result.invocations[0].arguments,
        Some(json!({"location": "Paris"}))
    );
    assert!(result.diagnostics.is_empty());
}

#[test]
fn parallel_calls_yield_one_invocation_each() {
    let payload = payload_with_message(json!({
        "role": "assistant",
        "content": null,
        "tool_calls": [
            {"id": "call_1", "type": "function",
             "function": {"name": "get_weather", "arguments": "{\"location\":\"Paris\"}"}},
            {"id": "call_2", "type": "function",
             "function": {"name": "get_time", "arguments": "{\"location\":\"Paris\"}"}}
        ]
    }));

    let result = classify(&payload);
    assert_eq!(result.classification, Classification::Structured);
    assert_eq!(result.invocations.len(), 2);
    assert_eq!(result.invocations[1].name, "get_time");
}

#[test]
fn marker_only_payload_is_textual() {
    let payload = payload_with_message(json!({
        "role": "assistant",
        "tool_calls": null,
        "content": "functools[{\"name\": \"get_weather\", \"arguments\": {\"location\": \"Paris\"}}]"
    }));

    let result = classify(&payload);
    assert_eq!(result.classification, Classification::TextualMarker);
    assert_eq!(result.invocations.len(), 1);
    assert_eq!(result.invocations[0].name, "get_weather");
    assert_eq!(
        result.invocations[0].arguments,
        Some(json!({"location": "Paris"}))
    );
}

#[test]
fn marker_with_two_entries_extracts_both() {
    let payload = payload_with_message(json!({
        "role": "assistant",
        "content": "functools[{\"name\": \"get_weather\", \"arguments\": {\"location\": \"Paris\"}}, \
                    {\"name\": \"get_time\", \"arguments\": {\"location\": \"Paris\"}}]"
    }));

    let result = classify(&payload);
    assert_eq!(result.classification, Classification::TextualMarker);
    assert_eq!(result.invocations.len(), 2);
}

#[test]
fn plain_answer_classifies_none() {
    let payload = payload_with_message(json!({
        "role": "assistant",
        "content": "The weather in Paris is sunny."
    }));

    let result = classify(&payload);
    assert_eq!(result.classification, Classification::None);
    assert!(result.invocations.is_empty());
    assert_eq!(
        result.content.as_deref(),
        Some("The weather in Paris is sunny.")
    );
}

#[test]
fn empty_tool_call_list_does_not_count_as_structured() {
    let payload = payload_with_message(json!({
        "role": "assistant",
        "tool_calls": [],
        "content": "No tools needed."
    }));

    assert_eq!(classify(&payload).classification, Classification::None);
}

#[test]
fn structured_wins_over_marker() {
    let payload = payload_with_message(json!({
        "role": "assistant",
        "content": "functools[{\"name\": \"get_time\", \"arguments\": {}}]",
        "tool_calls": [{
            "id": "call_1",
            "type": "function",
            "function": {"name": "get_weather", "arguments": "{\"location\":\"Paris\"}"}
        }]
    }));

    let result = classify(&payload);
    assert_eq!(result.classification, Classification::Structured);
    assert_eq!(result.invocations.len(), 1);
    assert_eq!(result.invocations[0].name, "get_weather");
}

#[test]
fn classify_is_idempotent() {
    let payload = payload_with_message(json!({
        "role": "assistant",
        "content": "functools[{\"name\": \"get_weather\", \"arguments\": {\"location\": \"Paris\"}}]"
    }));

    assert_eq!(classify(&payload), classify(&payload));
}

#[test]
fn malformed_marker_reports_parse_error_without_crashing() {
    let payload = payload_with_message(json!({
        "role": "assistant",
        "content": "functools[{bad json"
    }));

    let result = classify(&payload);
    assert_eq!(result.classification, Classification::TextualMarker);
    assert!(result.invocations.is_empty());
    assert!(result.diagnostics.iter().any(|d| d.starts_with("ParseError")));
    assert!(result.diagnostics.iter().any(|d| d.contains("{bad json")));
}

#[test]
fn bad_structured_arguments_keep_call_with_diagnostic() {
    let payload = payload_with_message(json!({
        "role": "assistant",
        "tool_calls": [{
            "id": "call_1",
            "type": "function",
            "function": {"name": "get_weather", "arguments": "{oops"}
        }]
    }));

    let result = classify(&payload);
    assert_eq!(result.classification, Classification::Structured);
    assert_eq!(result.invocations.len(), 1);
    assert_eq!(result.invocations[0].arguments, None);
    assert_eq!(result.invocations[0].raw_arguments, "{oops");
    assert!(result.diagnostics.iter().any(|d| d.starts_with("ParseError")));
}

#[test]
fn marker_payload_with_nested_array_arguments_parses() {
    let payload = payload_with_message(json!({
        "role": "assistant",
        "content": "functools[{\"name\": \"pick\", \"arguments\": {\"ids\": [1, 2, 3]}}] done"
    }));

    let result = classify(&payload);
    assert_eq!(result.classification, Classification::TextualMarker);
    assert_eq!(result.invocations.len(), 1);
    assert_eq!(result.invocations[0].arguments, Some(json!({"ids": [1, 2, 3]})));
}

#[test]
fn payload_without_choices_is_none_with_diagnostic() {
    let result = classify(&json!({"object": "error"}));
    assert_eq!(result.classification, Classification::None);
    assert!(!result.diagnostics.is_empty());
}
