//! Tolerant parser for relaxed object syntax.

use serde_json::json;

use bondprompt::recovery::lenient::parse;

#[test]
fn mixed_quote_styles_and_bare_keys() {
    let value = parse(r#"{assetCode: '2407', "assetName": "24国债07", rate: 3.5}"#).expect("parse");
    assert_eq!(
        value,
        json!({"assetCode": "2407", "assetName": "24国债07", "rate": 3.5})
    );
}

#[test]
fn python_style_literals() {
    let value = parse("{amountReqFlag: True, rateReqFlag: False, fundName: None}").expect("parse");
    assert_eq!(
        value,
        json!({"amountReqFlag": true, "rateReqFlag": false, "fundName": null})
    );
}

#[test]
fn escapes_inside_single_quotes() {
    let value = parse(r"{name: 'it\'s 中'}").expect("parse");
    assert_eq!(value, json!({"name": "it's 中"}));
}

#[test]
fn empty_containers() {
    assert_eq!(parse("{}").expect("parse"), json!({}));
    assert_eq!(parse("[ ]").expect("parse"), json!([]));
}

#[test]
fn error_carries_offset() {
    let err = parse("{a: }").expect_err("missing value");
    assert!(err.offset >= 3, "offset {}", err.offset);
}
