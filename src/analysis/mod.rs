//! Feature analysis of raw instruction text.
//!
//! [`analyze`] scans an instruction (or question) for the fixed signal
//! patterns that drive template selection: review markers, negotiable
//! keywords, bond codes, fund names, and question indicators. The result is
//! a transient [`Characteristics`] value recomputed on every call.

pub mod patterns;
pub mod selector;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use self::patterns::{BOND_CODE, FUND_NAME_PATTERNS};

/// Keywords meaning the price is open for negotiation.
pub const NEGOTIABLE_KEYWORDS: &[&str] = &["可议价", "价格可议", "议价", "面议"];

/// Substrings that mark the text as a question rather than an instruction.
pub const QUESTION_INDICATORS: &[&str] =
    &["什么", "如何", "为什么", "怎么", "?", "？", "请问", "能否"];

/// Marker placed before an amount or rate that needs approval.
pub const REVIEW_MARKER: char = '*';

/// Signals extracted from one piece of instruction text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Characteristics {
    /// A `*` review marker appears somewhere in the text.
    pub has_asterisk: bool,
    /// One of [`NEGOTIABLE_KEYWORDS`] appears in the text.
    pub has_negotiable_keywords: bool,
    /// Number of bond codes found.
    pub product_count: usize,
    /// Bond codes in order of appearance.
    pub bond_codes: Vec<String>,
    /// Distinct fund names detected.
    pub fund_names: BTreeSet<String>,
    /// Number of distinct fund names.
    pub fund_count: usize,
    /// At least one fund name was detected.
    pub has_fund_names: bool,
    /// More than one distinct fund name was detected.
    pub has_multiple_products: bool,
    /// One of [`QUESTION_INDICATORS`] appears in the text.
    pub is_chat_question: bool,
}

/// Analyze raw text. Total: every field falls back to false/0/empty.
pub fn analyze(text: &str) -> Characteristics {
    let bond_codes: Vec<String> = BOND_CODE
        .find_iter(text)
        .map(|m| m.as_str().to_owned())
        .collect();

    let fund_names = detect_fund_names(text);
    let fund_count = fund_names.len();

    Characteristics {
        has_asterisk: text.contains(REVIEW_MARKER),
        has_negotiable_keywords: contains_any(text, NEGOTIABLE_KEYWORDS),
        product_count: bond_codes.len(),
        bond_codes,
        fund_count,
        has_fund_names: fund_count > 0,
        has_multiple_products: fund_count > 1,
        fund_names,
        is_chat_question: contains_any(text, QUESTION_INDICATORS),
    }
}

/// Union of all fund-name pattern matches, deduplicated, single characters dropped.
pub fn detect_fund_names(text: &str) -> BTreeSet<String> {
    FUND_NAME_PATTERNS
        .iter()
        .flat_map(|pattern| pattern.find_iter(text))
        .map(|m| m.as_str().trim())
        .filter(|name| name.chars().count() > 1)
        .map(str::to_owned)
        .collect()
}

fn contains_any(text: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| text.contains(needle))
}
