//! Compiled signal patterns shared by feature analysis and prose recovery.

use std::sync::LazyLock;

use regex::Regex;

/// Bond code: two digits, `国债`, two digits (e.g. `24国债07`).
pub static BOND_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{2}国债\d{2}").expect("bond code pattern is valid"));

/// Fund family prefixes recognised at the start of a fund name.
pub const FUND_FAMILIES: &[&str] = &[
    "富国", "华夏", "嘉实", "广发", "易方达", "博时", "招商", "南方", "工银", "建信",
];

/// Characters a fund name never spans: full-width punctuation and whitespace.
const SEPARATORS: &str = r"，。；！？\s";

/// Fund-name patterns, applied independently and unioned by the caller.
pub static FUND_NAME_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(fund_name_patterns);

fn fund_name_patterns() -> Vec<Regex> {
    // Prefix patterns stop before a trailing 买/卖 so "华夏买入" yields "华夏".
    let bounded_tail = format!("[^{SEPARATORS}买卖]{{0,4}}");

    let mut sources: Vec<String> = vec![
        format!("[^{SEPARATORS}]*基金"),
        format!("[^{SEPARATORS}]*货币"),
        format!("景{bounded_tail}"),
    ];
    sources.extend(
        FUND_FAMILIES
            .iter()
            .map(|family| format!("{family}{bounded_tail}")),
    );

    sources
        .iter()
        .filter_map(|source| Regex::new(source).ok())
        .collect()
}
