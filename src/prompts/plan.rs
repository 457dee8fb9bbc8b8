//! Analyse, select, and render in one step.

use serde::Serialize;
use tracing::{debug, warn};

use super::catalog::{Category, CONTEXT_PREFIX};
use super::{TemplateError, TemplateRegistry};
use crate::analysis::selector::select;
use crate::analysis::{analyze, Characteristics};

/// The outbound prompt together with the signals that chose it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptPlan {
    /// Selected category.
    pub category: Category,
    /// Signals extracted from the input text.
    pub characteristics: Characteristics,
    /// Rendered prompt to send to the generator.
    pub prompt: String,
    /// Short explanation of the selection.
    pub reasoning: String,
}

/// Select the best category for `text` and render its template.
///
/// # Errors
///
/// Returns [`TemplateError`] if the selected template is missing from the
/// registry or needs a parameter this function does not supply.
pub fn prepare_prompt(
    registry: &TemplateRegistry,
    text: &str,
    context: &str,
) -> Result<PromptPlan, TemplateError> {
    let characteristics = analyze(text);
    let category = select(&characteristics);
    let prompt = render_for(registry, category, text, context)?;
    let reasoning = explain(category, &characteristics);

    debug!(%category, %reasoning, "prompt prepared");

    Ok(PromptPlan {
        category,
        characteristics,
        prompt,
        reasoning,
    })
}

/// Like [`prepare_prompt`], but render `category` instead of the selection.
///
/// The characteristics are still reported; the reasoning records the override
/// when it differs from what selection would have picked.
///
/// # Errors
///
/// Returns [`TemplateError`] if the template is missing or needs other parameters.
pub fn prepare_prompt_as(
    registry: &TemplateRegistry,
    category: Category,
    text: &str,
    context: &str,
) -> Result<PromptPlan, TemplateError> {
    let characteristics = analyze(text);
    let selected = select(&characteristics);
    let prompt = render_for(registry, category, text, context)?;
    let reasoning = if selected == category {
        explain(category, &characteristics)
    } else {
        format!("category '{category}' requested explicitly")
    };

    debug!(%category, %selected, "prompt prepared with explicit category");

    Ok(PromptPlan {
        category,
        characteristics,
        prompt,
        reasoning,
    })
}

/// Render a specific category for `text`.
///
/// Conversational templates receive `text` as the question and `context`
/// (prefixed) as the context block; the rest receive `text` only.
///
/// # Errors
///
/// Returns [`TemplateError`] if the template is missing or needs other parameters.
pub fn render_for(
    registry: &TemplateRegistry,
    category: Category,
    text: &str,
    context: &str,
) -> Result<String, TemplateError> {
    match category {
        Category::Conversational => {
            let context_info = context_block(context);
            registry.render(
                category,
                &[("question", text), ("context_info", context_info.as_str())],
            )
        }
        _ => registry.render(category, &[("text", text)]),
    }
}

/// Resolve a caller-supplied category name, defaulting to single-basic.
pub fn category_or_default(name: &str) -> Category {
    name.parse().unwrap_or_else(|_| {
        warn!(name, "unknown prompt category, using single-basic");
        Category::SingleBasic
    })
}

/// Context block for conversational prompts; empty when there is no context.
pub fn context_block(context: &str) -> String {
    if context.is_empty() {
        String::new()
    } else {
        format!("{CONTEXT_PREFIX}{context}")
    }
}

fn explain(category: Category, c: &Characteristics) -> String {
    let funds: Vec<&str> = c.fund_names.iter().map(String::as_str).collect();
    format!(
        "selected '{category}': asterisk={}, negotiable={}, multiple_funds={}, question={}, \
         fund_count={}, funds={funds:?}, bond_count={}",
        c.has_asterisk,
        c.has_negotiable_keywords,
        c.has_multiple_products,
        c.is_chat_question,
        c.fund_count,
        c.product_count,
    )
}
