//! Last-resort field extraction from plain prose.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::RawFieldMap;
use crate::analysis::patterns::BOND_CODE;

static TRADE_SIDE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("买入|卖出").expect("trade side pattern is valid"));

/// Optional `*` marker, number, required 万/亿 unit.
static AMOUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\*?)(\d+(?:\.\d+)?(?:万|亿))").expect("amount pattern is valid")
});

/// Optional `*` marker, number, required percent sign.
static RATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\*?)(\d+(?:\.\d+)?%)").expect("rate pattern is valid"));

/// Keywords in prose that put both amount and rate under review.
const PROSE_NEGOTIABLE: &[&str] = &["可议价", "价格可议"];

/// Side placeholder when the prose names no direction.
pub const UNKNOWN_SIDE: &str = "未知";

/// Pull individual fields out of prose. `None` unless a bond code is present.
///
/// Amount and rate are stored as their raw tokens (e.g. `"1000万"`,
/// `"3.5%"`) and expanded later by the normalizer.
pub fn extract_fields(text: &str) -> Option<RawFieldMap> {
    let code = BOND_CODE.find(text)?.as_str().to_owned();
    let negotiable = PROSE_NEGOTIABLE.iter().any(|k| text.contains(k));

    let mut fields = RawFieldMap::new();
    fields.insert("assetCode".to_owned(), Value::String(code.clone()));
    fields.insert("assetName".to_owned(), Value::String(code));

    let side = TRADE_SIDE.find(text).map_or(UNKNOWN_SIDE, |m| m.as_str());
    fields.insert("trdSide".to_owned(), Value::String(side.to_owned()));

    let (amount, amount_marked) = marked_token(&AMOUNT, text);
    if let Some(amount) = amount {
        fields.insert("amount".to_owned(), Value::String(amount));
    }
    let (rate, rate_marked) = marked_token(&RATE, text);
    if let Some(rate) = rate {
        fields.insert("rate".to_owned(), Value::String(rate));
    }

    fields.insert(
        "amountReqFlag".to_owned(),
        Value::Bool(amount_marked || negotiable),
    );
    fields.insert(
        "rateReqFlag".to_owned(),
        Value::Bool(rate_marked || negotiable),
    );
    fields.insert("fundName".to_owned(), Value::Array(Vec::new()));

    Some(fields)
}

/// First match of `pattern`: the value token and whether a `*` preceded it.
fn marked_token(pattern: &Regex, text: &str) -> (Option<String>, bool) {
    match pattern.captures(text) {
        Some(caps) => {
            let marked = caps.get(1).is_some_and(|m| !m.as_str().is_empty());
            (caps.get(2).map(|m| m.as_str().to_owned()), marked)
        }
        None => (None, false),
    }
}
