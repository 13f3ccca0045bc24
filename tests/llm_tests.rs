use crate::extras::{ScriptedLlm, context};
use gapscribe::llm::{extract_json_array, extract_json_object, strip_think};
use gapscribe::retry::RetryPolicy;
use gapscribe::{CompletionContext, GapError};
use spectral::prelude::*;
use std::collections::HashMap;

mod extras;

assert_responses![
    filled_think_removed:
        response => "<think>This is inside think tags</think>\n## Video Tips\nTest content",
        result => "## Video Tips\nTest content",
    empty_think_removed:
        response => "<think>\n</think>\n## Video Tips\nTest content",
        result => "## Video Tips\nTest content",
    plain_answer_trimmed:
        response => "\n  Plain answer  \n",
        result => "Plain answer",
];

#[tokio::test]
async fn transient_failure_is_retried() {
    let model = ScriptedLlm::new()
        .fail_on("", "rate limited")
        .on("", "second time lucky");
    let context = CompletionContext {
        retry: RetryPolicy::immediate(2),
        ..context(&model)
    };

    let result = context.complete("test", "prompt").await;

    assert_that(&result.ok()).is_equal_to(Some("second time lucky".to_owned()));
    assert_that(&model.prompts()).has_length(2);
}

#[tokio::test]
async fn exhausted_retries_surface_ai_service_error() {
    let model = ScriptedLlm::new().fail_on("", "service down");
    let context = CompletionContext {
        retry: RetryPolicy::immediate(1),
        ..context(&model)
    };

    let result = context.complete("draft", "prompt").await;

    match result {
        Err(GapError::AiService { stage, reason }) => {
            assert_that(&stage.as_str()).is_equal_to("draft");
            assert_that(&reason).contains("service down");
        }
        other => panic!("expected AiService error, got {other:?}"),
    }
    assert_that(&model.prompts()).has_length(2);
}

#[test]
fn json_array_is_found_inside_prose() {
    let parsed: Option<Vec<String>> =
        extract_json_array("Sure! Here you go:\n```json\n[\"blog.example.com\"]\n```");

    assert_that(&parsed).is_equal_to(Some(vec!["blog.example.com".to_owned()]));
}

#[test]
fn json_object_is_found_inside_prose() {
    let parsed: Option<HashMap<String, String>> =
        extract_json_object("Domains: {\"CapCut\": \"capcut.com\"} hope this helps");

    assert_that(&parsed.and_then(|map| map.get("CapCut").cloned()))
        .is_equal_to(Some("capcut.com".to_owned()));
}

#[test]
fn broken_json_yields_none() {
    let parsed: Option<Vec<String>> = extract_json_array("[\"unterminated");

    assert_that(&parsed).is_none();
}

#[test]
fn strip_think_keeps_text_without_tags() {
    assert_that(&strip_think("no reasoning here")).is_equal_to("no reasoning here".to_owned());
}
