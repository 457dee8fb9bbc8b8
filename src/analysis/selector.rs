//! Priority-ordered template selection over [`Characteristics`].

use super::{analyze, Characteristics};
use crate::prompts::catalog::Category;

/// Pick exactly one category. First matching rule wins:
///
/// 1. question → [`Category::Conversational`]
/// 2. more than one fund → [`Category::MultiProduct`]
/// 3. review marker or negotiable keyword → [`Category::SingleWithReview`]
/// 4. otherwise → [`Category::SingleBasic`]
pub fn select(characteristics: &Characteristics) -> Category {
    if characteristics.is_chat_question {
        return Category::Conversational;
    }
    if characteristics.has_multiple_products {
        return Category::MultiProduct;
    }
    if characteristics.has_asterisk || characteristics.has_negotiable_keywords {
        return Category::SingleWithReview;
    }
    Category::SingleBasic
}

/// Analyze `text` and select its category in one step.
pub fn recommend(text: &str) -> Category {
    select(&analyze(text))
}
