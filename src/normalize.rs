//! Total coercion of a [`RawFieldMap`] into a typed [`NormalizedRecord`].
//!
//! Every field is coerced on its own. A value that cannot be coerced is
//! replaced by the field's default and reported as a [`Diagnostic`]; the
//! normalizer itself never fails.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::recovery::prose::UNKNOWN_SIDE;
use crate::recovery::RawFieldMap;

const TEN_THOUSAND: f64 = 10_000.0;
const HUNDRED_MILLION: f64 = 100_000_000.0;

/// Direction of a trade.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeSide {
    /// 买入.
    Buy,
    /// 卖出.
    Sell,
    /// Direction absent or unrecognised.
    #[default]
    Unknown,
}

impl TradeSide {
    /// Recognise a direction keyword, in Chinese or English.
    pub fn from_keyword(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "买入" | "买" | "buy" | "b" => Self::Buy,
            "卖出" | "卖" | "sell" | "s" => Self::Sell,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Buy => "Buy",
            Self::Sell => "Sell",
            Self::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// Fully typed bond-trade record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedRecord {
    /// Bond code.
    pub asset_code: String,
    /// Bond name.
    pub asset_name: String,
    /// Trade direction.
    pub trd_side: TradeSide,
    /// Amount in base units (万 and 亿 expanded).
    pub amount: f64,
    /// Rate as a percentage value.
    pub rate: f64,
    /// Amount needs approval.
    pub amount_req_flag: bool,
    /// Rate needs approval.
    pub rate_req_flag: bool,
    /// Fund names, empty when none.
    #[serde(default)]
    pub fund_name: Vec<String>,
}

/// A field that fell back to its default or was interpreted heuristically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// Field name as it appears in the raw map.
    pub field: &'static str,
    /// What went wrong.
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Normalize a field map, logging any fallback.
pub fn normalize(fields: &RawFieldMap) -> NormalizedRecord {
    normalize_with_diagnostics(fields).0
}

/// Normalize a field map and return the fallbacks that were applied.
pub fn normalize_with_diagnostics(fields: &RawFieldMap) -> (NormalizedRecord, Vec<Diagnostic>) {
    let mut diagnostics = Vec::new();

    let record = NormalizedRecord {
        asset_code: fields.get("assetCode").map(stringify).unwrap_or_default(),
        asset_name: fields.get("assetName").map(stringify).unwrap_or_default(),
        trd_side: coerce_side(fields.get("trdSide"), &mut diagnostics),
        amount: coerce_number(fields.get("amount"), "amount", parse_amount, &mut diagnostics),
        rate: coerce_number(fields.get("rate"), "rate", parse_rate, &mut diagnostics),
        amount_req_flag: fields.get("amountReqFlag").is_some_and(truthy),
        rate_req_flag: fields.get("rateReqFlag").is_some_and(truthy),
        fund_name: coerce_funds(fields.get("fundName")),
    };

    for diagnostic in &diagnostics {
        warn!(field = diagnostic.field, message = %diagnostic.message, "normalizer fallback");
    }
    (record, diagnostics)
}

/// Text form of any JSON value; strings are taken verbatim, null is empty.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Parse an amount string: drop `,`, expand 万 (×10⁴) or 亿 (×10⁸).
pub fn parse_amount(raw: &str) -> Option<f64> {
    let digits: String = raw
        .chars()
        .filter(|c| !matches!(c, ',' | '万' | '亿'))
        .collect();
    let base = parse_finite(&digits)?;
    if raw.contains('万') {
        Some(base * TEN_THOUSAND)
    } else if raw.contains('亿') {
        Some(base * HUNDRED_MILLION)
    } else {
        Some(base)
    }
}

/// Parse a rate string, dropping `%`.
pub fn parse_rate(raw: &str) -> Option<f64> {
    parse_finite(&raw.replace('%', ""))
}

/// Truthiness of a raw value. Strings such as `"false"`, `"0"`, `"否"` are false.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !matches!(
            s.trim().to_lowercase().as_str(),
            "" | "false" | "0" | "no" | "n" | "否" | "none" | "null"
        ),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn parse_finite(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|f| f.is_finite())
}

fn coerce_side(value: Option<&Value>, diagnostics: &mut Vec<Diagnostic>) -> TradeSide {
    match value {
        None | Some(Value::Null) => TradeSide::Unknown,
        Some(Value::Bool(b)) => {
            diagnostics.push(Diagnostic {
                field: "trdSide",
                message: format!("boolean {b} is not a trade direction"),
            });
            TradeSide::Unknown
        }
        Some(other) => {
            let text = stringify(other);
            let side = TradeSide::from_keyword(&text);
            let unrecognised = side == TradeSide::Unknown
                && !text.trim().is_empty()
                && text != UNKNOWN_SIDE;
            if unrecognised {
                diagnostics.push(Diagnostic {
                    field: "trdSide",
                    message: format!("unrecognised direction '{text}'"),
                });
            }
            side
        }
    }
}

fn coerce_number(
    value: Option<&Value>,
    field: &'static str,
    parse: fn(&str) -> Option<f64>,
    diagnostics: &mut Vec<Diagnostic>,
) -> f64 {
    let parsed = match value {
        None | Some(Value::Null) => return 0.0,
        Some(Value::Number(n)) => n.as_f64().filter(|f| f.is_finite()),
        Some(Value::String(s)) => parse(s),
        Some(_) => None,
    };
    parsed.unwrap_or_else(|| {
        let raw = value.map(stringify).unwrap_or_default();
        diagnostics.push(Diagnostic {
            field,
            message: format!("cannot convert '{raw}' to a number"),
        });
        0.0
    })
}

fn coerce_funds(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .map(stringify)
            .filter(|name| !name.is_empty())
            .collect(),
        Some(Value::String(s)) if !s.is_empty() => vec![s.clone()],
        _ => Vec::new(),
    }
}
