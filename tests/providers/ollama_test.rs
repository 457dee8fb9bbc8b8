//! Ollama provider wire format tests.

use std::time::Duration;

use serde_json::json;
use bondprompt::providers::ollama::{
    build_request, model_listed, parse_response, parse_stream_line, OllamaProvider,
    DEFAULT_OLLAMA_MODEL, DEFAULT_OLLAMA_URL,
};
use bondprompt::providers::{CompletionRequest, LlmProvider, ProviderError};

#[test]
fn build_request_carries_prompt_and_options() {
    let request = CompletionRequest {
        prompt: "解析：买入24国债07".to_owned(),
        system: Some("只返回JSON".to_owned()),
        max_tokens: Some(256),
    };
    let body = serde_json::to_value(build_request("qwen3:0.6b", &request, false)).expect("json");
    assert_eq!(
        body,
        json!({
            "model": "qwen3:0.6b",
            "prompt": "解析：买入24国债07",
            "system": "只返回JSON",
            "stream": false,
            "options": { "num_predict": 256 }
        })
    );
}

#[test]
fn build_request_omits_unset_fields() {
    let body = serde_json::to_value(build_request("m", &CompletionRequest::new("p"), true))
        .expect("json");
    assert_eq!(body, json!({"model": "m", "prompt": "p", "stream": true}));
}

#[test]
fn parse_response_reads_text_and_usage() {
    let body = json!({
        "model": "qwen3:0.6b",
        "response": "{\"assetCode\":\"2407\"}",
        "done": true,
        "prompt_eval_count": 120,
        "eval_count": 18
    })
    .to_string();
    let resp = parse_response(&body).expect("parse");
    assert_eq!(resp.text, "{\"assetCode\":\"2407\"}");
    assert_eq!(resp.model, "qwen3:0.6b");
    assert_eq!(resp.usage.input_tokens, 120);
    assert_eq!(resp.usage.output_tokens, 18);
}

#[test]
fn parse_response_defaults_missing_counts() {
    let resp = parse_response(r#"{"response":"ok"}"#).expect("parse");
    assert_eq!(resp.usage.input_tokens, 0);
    assert_eq!(resp.usage.output_tokens, 0);
}

#[test]
fn parse_response_rejects_garbage() {
    let err = parse_response("not json").expect_err("garbage");
    assert!(matches!(err, ProviderError::Parse(_)));
}

#[test]
fn stream_lines() {
    let chunk = parse_stream_line(r#"{"response":"你","done":false}"#).expect("chunk");
    assert_eq!(chunk.content, "你");
    assert!(!chunk.done);

    let last = parse_stream_line("{\"response\":\"\",\"done\":true}\n").expect("chunk");
    assert!(last.done);

    assert!(parse_stream_line("   ").is_none());
    assert!(parse_stream_line("{broken").is_none());
}

#[test]
fn tags_listing() {
    let body = r#"{"models":[{"name":"qwen3:0.6b"},{"name":"llama3:8b"}]}"#;
    assert!(model_listed(body, "qwen3:0.6b").expect("parse"));
    assert!(!model_listed(body, "qwen3:8b").expect("parse"));
    assert!(!model_listed("{}", "qwen3:0.6b").expect("parse"));
    assert!(model_listed("[]", "x").is_err());
}

#[test]
fn provider_defaults() {
    let provider = OllamaProvider::new(DEFAULT_OLLAMA_MODEL.to_owned());
    assert_eq!(provider.model_id(), "qwen3:0.6b");
    assert_eq!(provider.base_url, DEFAULT_OLLAMA_URL);
}

#[test]
fn with_settings_trims_trailing_slash() {
    let provider = OllamaProvider::with_settings(
        "m".to_owned(),
        "http://localhost:11434/".to_owned(),
        Duration::from_secs(5),
    )
    .expect("client");
    assert_eq!(provider.base_url, "http://localhost:11434");
}
