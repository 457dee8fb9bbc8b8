//! Total coercion of recovered fields into typed records.

use serde_json::{json, Value};

use bondprompt::normalize::{normalize, normalize_with_diagnostics, NormalizedRecord, TradeSide};
use bondprompt::recovery::{recover, RawFieldMap};

fn fields(value: Value) -> RawFieldMap {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

#[test]
fn empty_map_yields_defaults_without_diagnostics() {
    let (record, diagnostics) = normalize_with_diagnostics(&RawFieldMap::new());
    assert_eq!(record, NormalizedRecord::default());
    assert_eq!(record.trd_side, TradeSide::Unknown);
    assert!(diagnostics.is_empty());
}

#[test]
fn well_formed_record() {
    let record = normalize(&fields(json!({
        "assetCode": "240007",
        "assetName": "24国债07",
        "trdSide": "买入",
        "amount": 10000000,
        "rate": 3.5,
        "amountReqFlag": true,
        "rateReqFlag": false,
        "fundName": ["富国天惠", "华夏成长"]
    })));
    assert_eq!(record.asset_code, "240007");
    assert_eq!(record.asset_name, "24国债07");
    assert_eq!(record.trd_side, TradeSide::Buy);
    assert!((record.amount - 10_000_000.0).abs() < f64::EPSILON);
    assert!((record.rate - 3.5).abs() < f64::EPSILON);
    assert!(record.amount_req_flag);
    assert!(!record.rate_req_flag);
    assert_eq!(record.fund_name, vec!["富国天惠", "华夏成长"]);
}

#[test]
fn unit_suffixed_strings_expand() {
    let record = normalize(&fields(json!({"amount": "1000万", "rate": "3.5%"})));
    assert!((record.amount - 10_000_000.0).abs() < f64::EPSILON);
    assert!((record.rate - 3.5).abs() < f64::EPSILON);

    let record = normalize(&fields(json!({"amount": "2亿"})));
    assert!((record.amount - 200_000_000.0).abs() < f64::EPSILON);
}

#[test]
fn bad_numbers_default_with_diagnostics() {
    let (record, diagnostics) =
        normalize_with_diagnostics(&fields(json!({"amount": "很多", "rate": [1]})));
    assert!(record.amount.abs() < f64::EPSILON);
    assert!(record.rate.abs() < f64::EPSILON);
    let names: Vec<&str> = diagnostics.iter().map(|d| d.field).collect();
    assert_eq!(names, vec!["amount", "rate"]);
}

#[test]
fn boolean_trade_side_is_unknown_with_diagnostic() {
    let (record, diagnostics) = normalize_with_diagnostics(&fields(json!({"trdSide": true})));
    assert_eq!(record.trd_side, TradeSide::Unknown);
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].field, "trdSide");
}

#[test]
fn trade_side_keywords() {
    assert_eq!(TradeSide::from_keyword("卖出"), TradeSide::Sell);
    assert_eq!(TradeSide::from_keyword(" BUY "), TradeSide::Buy);
    assert_eq!(TradeSide::from_keyword("S"), TradeSide::Sell);
    assert_eq!(TradeSide::from_keyword("持有"), TradeSide::Unknown);
    assert_eq!(TradeSide::Sell.to_string(), "Sell");
}

#[test]
fn unknown_side_placeholder_is_silent() {
    let (record, diagnostics) = normalize_with_diagnostics(&fields(json!({"trdSide": "未知"})));
    assert_eq!(record.trd_side, TradeSide::Unknown);
    assert!(diagnostics.is_empty());

    let (_, diagnostics) = normalize_with_diagnostics(&fields(json!({"trdSide": "持有"})));
    assert_eq!(diagnostics.len(), 1);
}

#[test]
fn flags_accept_loose_truthiness() {
    let record = normalize(&fields(json!({"amountReqFlag": "true", "rateReqFlag": "否"})));
    assert!(record.amount_req_flag);
    assert!(!record.rate_req_flag);

    let record = normalize(&fields(json!({"amountReqFlag": 1, "rateReqFlag": 0})));
    assert!(record.amount_req_flag);
    assert!(!record.rate_req_flag);
}

#[test]
fn spelled_out_false_flag_is_false() {
    let record = normalize(&fields(json!({"amountReqFlag": "false", "rateReqFlag": "False"})));
    assert!(!record.amount_req_flag);
    assert!(!record.rate_req_flag);
}

#[test]
fn boolean_amount_and_rate_are_not_numbers() {
    let (record, diagnostics) =
        normalize_with_diagnostics(&fields(json!({"amount": true, "rate": true})));
    assert_eq!(record.amount, 0.0);
    assert_eq!(record.rate, 0.0);
    let flagged: Vec<&str> = diagnostics.iter().map(|d| d.field).collect();
    assert_eq!(flagged, vec!["amount", "rate"]);
}

#[test]
fn scalar_codes_are_stringified() {
    let record = normalize(&fields(json!({"assetCode": 240007, "assetName": null})));
    assert_eq!(record.asset_code, "240007");
    assert_eq!(record.asset_name, "");
}

#[test]
fn fund_name_accepts_string_or_list() {
    let record = normalize(&fields(json!({"fundName": "富国天惠"})));
    assert_eq!(record.fund_name, vec!["富国天惠"]);

    let record = normalize(&fields(json!({"fundName": ["", "华夏成长", null]})));
    assert_eq!(record.fund_name, vec!["华夏成长"]);
}

#[test]
fn prose_recovery_normalizes_end_to_end() {
    let recovered = recover("买入24国债07，金额*1000万，利率3.5%").expect("recover");
    let (record, diagnostics) = normalize_with_diagnostics(&recovered.fields);
    assert!(diagnostics.is_empty(), "{diagnostics:?}");
    assert_eq!(record.asset_code, "24国债07");
    assert_eq!(record.trd_side, TradeSide::Buy);
    assert!((record.amount - 10_000_000.0).abs() < f64::EPSILON);
    assert!((record.rate - 3.5).abs() < f64::EPSILON);
    assert!(record.amount_req_flag);
    assert!(!record.rate_req_flag);
    assert!(record.fund_name.is_empty());
}

#[test]
fn record_serializes_with_camel_case_keys() {
    let value = serde_json::to_value(NormalizedRecord::default()).expect("serialize");
    assert_eq!(value["trdSide"], json!("Unknown"));
    assert!(value.get("amountReqFlag").is_some());
    assert!(value.get("fundName").is_some());
}
