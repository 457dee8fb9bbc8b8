//! The fixed category catalog and the built-in template bodies.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One of the four template categories. The identifiers are part of the
/// external contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    /// Plain single-instruction extraction.
    SingleBasic,
    /// Single instruction carrying review markers or negotiable terms.
    SingleWithReview,
    /// Free-form question for the trading assistant.
    Conversational,
    /// Several fund products in one instruction.
    MultiProduct,
}

impl Category {
    /// Every category, in catalog order.
    pub const ALL: [Category; 4] = [
        Category::SingleBasic,
        Category::SingleWithReview,
        Category::Conversational,
        Category::MultiProduct,
    ];

    /// Stable identifier, also used as the registry key.
    pub fn id(self) -> &'static str {
        match self {
            Self::SingleBasic => "single-basic",
            Self::SingleWithReview => "single-with-review",
            Self::Conversational => "conversational",
            Self::MultiProduct => "multi-product",
        }
    }

    /// Human-readable purpose of the category.
    pub fn description(self) -> &'static str {
        match self {
            Self::SingleBasic => "Extract a single bond-trade instruction",
            Self::SingleWithReview => {
                "Extract a single instruction whose amount or rate is marked for review (*) or negotiable"
            }
            Self::Conversational => "Answer a bond-trading question step by step",
            Self::MultiProduct => "Extract an instruction covering several fund products as a JSON array",
        }
    }

    /// Built-in template body.
    pub fn default_body(self) -> &'static str {
        match self {
            Self::SingleBasic => SINGLE_BASIC,
            Self::SingleWithReview => SINGLE_WITH_REVIEW,
            Self::Conversational => CONVERSATIONAL,
            Self::MultiProduct => MULTI_PRODUCT,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Returned when a string is not a catalog identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown category: {0}")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.id() == s.trim())
            .ok_or_else(|| UnknownCategory(s.to_owned()))
    }
}

/// Prefix put before caller-supplied context in conversational prompts.
pub const CONTEXT_PREFIX: &str = "上下文信息：";

const SINGLE_BASIC: &str = concat!(
    "请将以下债券交易文本解析为JSON格式，只返回JSON对象，不要包含其他文字说明：\n",
    "{text}\n",
    "\n",
    "需要提取的字段：\n",
    "- assetCode: 债券代码为含有 4 位数字及以上纯数字不包括（小数点，加号等任意特殊字符）且不能被100整除或者含有任一关键字 (.IB,.SH,.SZ等，该关键字支持配置)；\n",
    "- assetName: 债券名称\n",
    "- trdSide: 交易方向（买入/卖出）\n",
    "- amount: 交易金额（数字）\n",
    "- rate: 利率（数字）\n",
    "- amountReqFlag: 金额是否需请示（布尔值，当金额前有*号时为true）\n",
    "- rateReqFlag: 利率是否需请示（布尔值，当利率前有*号时为true）\n",
    "\n",
);

const SINGLE_WITH_REVIEW: &str = concat!(
    "请将以下债券交易文本解析为JSON格式，特别注意标有*号的金额和利率需要请示，只返回JSON对象，不要包含其他文字说明：\n",
    "{text}\n",
    "\n",
    "需要提取的字段：\n",
    "- assetCode: 债券代码为含有 4 位数字及以上纯数字不包括（小数点，加号等任意特殊字符）且不能被100整除或者含有任一关键字 (.IB,.SH,.SZ等，该关键字支持配置)；\n",
    "- assetName: 债券名称\n",
    "- trdSide: 交易方向（买入/卖出）\n",
    "- amount: 交易金额（数字）\n",
    "- rate: 利率（数字）\n",
    "- amountReqFlag: 金额是否需请示（布尔值，当金额前有*号或包含\"可议价\"、\"价格可议\"等关键词时为true）\n",
    "- rateReqFlag: 利率是否需请示（布尔值，当利率前有*号或包含\"可议价\"、\"价格可议\"等关键词时为true）\n",
    "\n",
);

const CONVERSATIONAL: &str = concat!(
    "你是一个专业的债券交易助手。请基于以下信息回答问题：\n",
    "\n",
    "问题：{question}\n",
    "\n",
    "{context_info}\n",
    "\n",
    "请逐步思考并回答。每步思考都要清晰说明。",
);

const MULTI_PRODUCT: &str = concat!(
    "请将以下包含多个债券产品的交易文本解析为JSON数组格式，每个产品对应一个JSON对象，只返回JSON数组，不要包含其他文字说明：\n",
    "{text}\n",
    "\n",
    "每个产品需要提取的字段：\n",
    "- assetCode: 债券代码为含有 4 位数字及以上纯数字不包括（小数点，加号等任意特殊字符）且不能被100整除或者含有任一关键字 (.IB,.SH,.SZ等，该关键字支持配置)；\n",
    "- assetName: 债券名称\n",
    "- trdSide: 交易方向（买入/卖出）\n",
    "- amount: 交易金额（数字）\n",
    "- rate: 利率（数字）\n",
    "- amountReqFlag: 金额是否需请示（布尔值，当金额前有*号时为true）\n",
    "- rateReqFlag: 利率是否需请示（布尔值，当利率前有*号时为true）\n",
    "- fundName: 基金名称,这是个list,需要提取出基金名称,可能包含多个基金名称\n",
    "\n",
);
