//! Orchestration against a scripted generator.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;

use bondprompt::normalize::TradeSide;
use bondprompt::pipeline::{BondParser, ParseError};
use bondprompt::prompts::catalog::Category;
use bondprompt::prompts::TemplateRegistry;
use bondprompt::providers::{
    CompletionRequest, CompletionResponse, LlmProvider, ProviderError, UsageStats,
};
use bondprompt::recovery::{RecoveryError, Strategy};

/// Replays canned responses in order and records every prompt it receives.
struct Scripted {
    replies: Mutex<VecDeque<Result<String, ProviderError>>>,
    prompts: Mutex<Vec<String>>,
}

impl Scripted {
    fn new(replies: Vec<Result<String, ProviderError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn ok(replies: &[&str]) -> Arc<Self> {
        Self::new(replies.iter().map(|r| Ok((*r).to_owned())).collect())
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("lock").clone()
    }
}

#[async_trait]
impl LlmProvider for Scripted {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        self.prompts.lock().expect("lock").push(request.prompt);
        let next = self
            .replies
            .lock()
            .expect("lock")
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::Unavailable("script exhausted".to_owned())));
        next.map(|text| CompletionResponse {
            text,
            usage: UsageStats::default(),
            model: "scripted".to_owned(),
        })
    }

    fn model_id(&self) -> &str {
        "scripted"
    }
}

fn parser(provider: Arc<Scripted>) -> BondParser {
    BondParser::new(TemplateRegistry::with_defaults(), provider)
}

#[tokio::test]
async fn parses_repaired_output() {
    let provider = Scripted::ok(&[
        "```json\n{assetCode: '24国债07', trdSide: '买入', amount: '1000万', rate: 3.5, amountReqFlag: True}\n```",
    ]);
    let outcome = parser(Arc::clone(&provider))
        .parse("买入24国债07 *1000万 3.5%", "")
        .await
        .expect("parse");

    assert_eq!(outcome.plan.category, Category::SingleWithReview);
    assert_eq!(outcome.strategy, Strategy::Repaired);
    assert_eq!(outcome.attempts, 1);
    assert_eq!(outcome.record.asset_code, "24国债07");
    assert_eq!(outcome.record.trd_side, TradeSide::Buy);
    assert!((outcome.record.amount - 10_000_000.0).abs() < f64::EPSILON);
    assert!(outcome.record.amount_req_flag);

    let prompts = provider.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("买入24国债07 *1000万 3.5%"));
}

#[tokio::test]
async fn single_attempt_surfaces_recovery_error() {
    let provider = Scripted::ok(&["我无法回答"]);
    let err = parser(provider)
        .parse("买入24国债07", "")
        .await
        .expect_err("unrecoverable");
    assert!(matches!(
        err,
        ParseError::Recovery(RecoveryError::Unrecoverable { .. })
    ));
}

#[tokio::test]
async fn retries_until_output_is_recoverable() {
    let provider = Scripted::ok(&["", "抱歉", r#"{"assetCode":"2407"}"#]);
    let outcome = parser(Arc::clone(&provider))
        .with_max_attempts(3)
        .parse("卖出2407", "")
        .await
        .expect("parse");
    assert_eq!(outcome.attempts, 3);
    assert_eq!(outcome.strategy, Strategy::Direct);
    assert_eq!(provider.prompts().len(), 3);
}

#[tokio::test]
async fn retries_stop_at_max_attempts() {
    let provider = Scripted::ok(&["", "", r#"{"assetCode":"2407"}"#]);
    let err = parser(Arc::clone(&provider))
        .with_max_attempts(2)
        .parse("卖出2407", "")
        .await
        .expect_err("two empty replies");
    assert!(matches!(err, ParseError::Recovery(RecoveryError::Empty)));
    assert_eq!(provider.prompts().len(), 2);
}

#[tokio::test]
async fn provider_errors_are_not_retried() {
    let provider = Scripted::new(vec![
        Err(ProviderError::Unavailable("down".to_owned())),
        Ok(r#"{"assetCode":"2407"}"#.to_owned()),
    ]);
    let err = parser(Arc::clone(&provider))
        .with_max_attempts(5)
        .parse("卖出2407", "")
        .await
        .expect_err("provider down");
    assert!(matches!(err, ParseError::Provider(_)));
    assert_eq!(provider.prompts().len(), 1);
}

#[tokio::test]
async fn parse_as_overrides_selection() {
    let provider = Scripted::ok(&[r#"{"assetCode":"2407"}"#]);
    let outcome = parser(provider)
        .parse_as(Category::MultiProduct, "买入2407", "")
        .await
        .expect("parse");
    assert_eq!(outcome.plan.category, Category::MultiProduct);
    assert!(outcome.plan.prompt.contains("JSON数组"));
    assert!(outcome.plan.reasoning.contains("explicitly"));
}

#[tokio::test]
async fn parse_records_returns_every_product() {
    let provider = Scripted::ok(&[concat!(
        "```json\n[",
        r#"{"assetCode":"24国债07","trdSide":"买入","fundName":["富国天惠"]},"#,
        r#"{"assetCode":"25国债08","trdSide":"卖出","fundName":["华夏成长"],"amount":"abc"}"#,
        "]\n```"
    )]);
    let outcome = parser(provider)
        .parse_records("富国天惠买入24国债07，华夏成长卖出25国债08", "")
        .await
        .expect("parse");

    assert_eq!(outcome.plan.category, Category::MultiProduct);
    assert_eq!(outcome.strategy, Strategy::Direct);
    assert_eq!(outcome.records.len(), 2);
    assert_eq!(outcome.records[0].trd_side, TradeSide::Buy);
    assert_eq!(outcome.records[1].trd_side, TradeSide::Sell);
    assert_eq!(outcome.records[1].fund_name, vec!["华夏成长"]);
    assert_eq!(outcome.diagnostics.len(), 1);
    assert_eq!(outcome.diagnostics[0].field, "amount");
}

#[tokio::test]
async fn selected_multi_product_template_keeps_every_product() {
    let provider = Scripted::ok(&[concat!(
        "[",
        r#"{"assetCode":"24国债07","trdSide":"买入","fundName":["富国天惠"]},"#,
        r#"{"assetCode":"25国债08","trdSide":"卖出","fundName":["华夏成长"]}"#,
        "]"
    )]);
    let outcome = parser(provider)
        .parse("富国天惠买入24国债07，华夏成长卖出25国债08", "")
        .await
        .expect("parse");

    assert_eq!(outcome.plan.category, Category::MultiProduct);
    assert_eq!(outcome.strategy, Strategy::Direct);
    assert_eq!(outcome.records.len(), 2);
    assert_eq!(outcome.record.asset_code, "24国债07");
    assert_eq!(outcome.records[1].asset_code, "25国债08");
    assert_eq!(outcome.records[1].trd_side, TradeSide::Sell);
}

#[tokio::test]
async fn single_product_outcome_lists_its_record() {
    let provider = Scripted::ok(&[r#"{"assetCode":"24国债07","trdSide":"买入"}"#]);
    let outcome = parser(provider)
        .parse("买入24国债07", "")
        .await
        .expect("parse");
    assert_eq!(outcome.records, vec![outcome.record.clone()]);
}

#[tokio::test]
async fn batch_outcome_is_timestamped() {
    let before = Utc::now();
    let provider = Scripted::ok(&[r#"[{"assetCode":"24国债07"},{"assetCode":"25国债08"}]"#]);
    let outcome = parser(provider)
        .parse_records("富国天惠买入24国债07，华夏成长卖出25国债08", "")
        .await
        .expect("parse");

    assert!(outcome.completed_at >= before);
    assert!(outcome.completed_at <= Utc::now());
    let encoded = serde_json::to_value(&outcome).expect("encode");
    assert!(encoded.get("completed_at").is_some());
}

#[tokio::test]
async fn registry_edits_apply_to_later_requests() {
    let provider = Scripted::ok(&[r#"{"assetCode":"1"}"#, r#"{"assetCode":"2"}"#]);
    let parser = parser(Arc::clone(&provider));

    parser.parse("买入2407", "").await.expect("first");
    parser
        .registry()
        .write()
        .await
        .update("single-basic", "EDITED {text}")
        .expect("update");
    parser.parse("买入2407", "").await.expect("second");

    let prompts = provider.prompts();
    assert!(!prompts[0].starts_with("EDITED"));
    assert_eq!(prompts[1], "EDITED 买入2407");
}

#[tokio::test]
async fn plan_makes_no_generator_call() {
    let provider = Scripted::ok(&[]);
    let plan = parser(Arc::clone(&provider))
        .plan("什么是久期？", "")
        .await
        .expect("plan");
    assert_eq!(plan.category, Category::Conversational);
    assert!(provider.prompts().is_empty());
}

#[tokio::test]
async fn chat_streams_conversational_answer() {
    let provider = Scripted::ok(&["久期衡量价格对利率的敏感度。"]);
    let (tx, mut rx) = mpsc::channel(8);
    let sent = parser(Arc::clone(&provider))
        .chat("什么是久期？", "用户持有24国债07", tx)
        .await
        .expect("chat");
    assert_eq!(sent, 1);

    let chunk = rx.recv().await.expect("chunk");
    assert_eq!(chunk.content, "久期衡量价格对利率的敏感度。");
    assert!(chunk.done);

    let prompts = provider.prompts();
    assert!(prompts[0].contains("问题：什么是久期？"));
    assert!(prompts[0].contains("上下文信息：用户持有24国债07"));
}
