//! Request orchestration: prompt preparation, the generator call, recovery,
//! and normalization.
//!
//! [`BondParser`] is the only place that talks to a generator. Everything it
//! calls into is synchronous and stateless; the registry is shared behind a
//! lock so it can be edited while requests run, and each request renders
//! from its own snapshot.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::normalize::{normalize_with_diagnostics, Diagnostic, NormalizedRecord};
use crate::prompts::catalog::Category;
use crate::prompts::plan::{prepare_prompt, prepare_prompt_as, render_for, PromptPlan};
use crate::prompts::{TemplateError, TemplateRegistry};
use crate::providers::{CompletionRequest, LlmProvider, ProviderError, StreamChunk};
use crate::recovery::{recover, recover_records, RawFieldMap, RecoveryError, Strategy};

/// Errors surfaced by the orchestrator.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The prompt could not be rendered.
    #[error(transparent)]
    Template(#[from] TemplateError),
    /// The generator call failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),
    /// No attempt produced recoverable output.
    #[error(transparent)]
    Recovery(#[from] RecoveryError),
}

/// Result of parsing one instruction.
#[derive(Debug, Clone, Serialize)]
pub struct ParseOutcome {
    /// Typed record (the first product when several were described).
    pub record: NormalizedRecord,
    /// Every product the response described. A multi-product plan can yield
    /// several; otherwise this holds just `record`.
    pub records: Vec<NormalizedRecord>,
    /// Prompt that was sent and why.
    pub plan: PromptPlan,
    /// Recovery strategy that succeeded.
    pub strategy: Strategy,
    /// Generator calls made.
    pub attempts: u32,
    /// Normalizer fallbacks.
    pub diagnostics: Vec<Diagnostic>,
    /// When the outcome was produced.
    pub completed_at: DateTime<Utc>,
}

/// Result of parsing a multi-product instruction.
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    /// One typed record per product.
    pub records: Vec<NormalizedRecord>,
    /// Prompt that was sent and why.
    pub plan: PromptPlan,
    /// Recovery strategy that succeeded.
    pub strategy: Strategy,
    /// Generator calls made.
    pub attempts: u32,
    /// Normalizer fallbacks across all records.
    pub diagnostics: Vec<Diagnostic>,
    /// When the outcome was produced.
    pub completed_at: DateTime<Utc>,
}

/// Orchestrates prompt → generator → recovery → normalization.
#[derive(Clone)]
pub struct BondParser {
    registry: Arc<RwLock<TemplateRegistry>>,
    provider: Arc<dyn LlmProvider>,
    max_attempts: u32,
}

impl BondParser {
    /// Parser owning `registry`, calling the generator once per request.
    pub fn new(registry: TemplateRegistry, provider: Arc<dyn LlmProvider>) -> Self {
        Self::with_shared_registry(Arc::new(RwLock::new(registry)), provider)
    }

    /// Parser over a registry shared with other owners.
    pub fn with_shared_registry(
        registry: Arc<RwLock<TemplateRegistry>>,
        provider: Arc<dyn LlmProvider>,
    ) -> Self {
        Self {
            registry,
            provider,
            max_attempts: 1,
        }
    }

    /// Total generator calls per request when recovery fails (at least 1).
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Shared handle to the template registry.
    pub fn registry(&self) -> Arc<RwLock<TemplateRegistry>> {
        Arc::clone(&self.registry)
    }

    async fn snapshot(&self) -> TemplateRegistry {
        self.registry.read().await.clone()
    }

    /// Analyse `text` and render the selected template. No generator call.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] if rendering fails.
    pub async fn plan(&self, text: &str, context: &str) -> Result<PromptPlan, TemplateError> {
        prepare_prompt(&self.snapshot().await, text, context)
    }

    /// Parse an instruction using the automatically selected template.
    ///
    /// When the multi-product template is selected the response is read as
    /// an array and every product lands in [`ParseOutcome::records`].
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] if rendering, the generator call, or every
    /// recovery attempt fails.
    pub async fn parse(&self, text: &str, context: &str) -> Result<ParseOutcome, ParseError> {
        let span = info_span!("parse", request_id = %uuid::Uuid::new_v4());
        async {
            let plan = self.plan(text, context).await?;
            info!(category = %plan.category, "template selected");
            self.run(plan).await
        }
        .instrument(span)
        .await
    }

    /// Parse an instruction with an explicitly chosen template.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] if rendering, the generator call, or every
    /// recovery attempt fails.
    pub async fn parse_as(
        &self,
        category: Category,
        text: &str,
        context: &str,
    ) -> Result<ParseOutcome, ParseError> {
        let span = info_span!("parse", request_id = %uuid::Uuid::new_v4(), %category);
        async {
            let plan = prepare_prompt_as(&self.snapshot().await, category, text, context)?;
            self.run(plan).await
        }
        .instrument(span)
        .await
    }

    /// Parse an instruction that may describe several products.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] if rendering, the generator call, or every
    /// recovery attempt fails.
    pub async fn parse_records(
        &self,
        text: &str,
        context: &str,
    ) -> Result<BatchOutcome, ParseError> {
        let span = info_span!("parse_records", request_id = %uuid::Uuid::new_v4());
        async {
            let plan = self.plan(text, context).await?;
            let (recovered, attempts) = self.generate(&plan.prompt, recover_records).await?;
            let (records, diagnostics) = normalize_all(&recovered.records);
            info!(count = records.len(), "records parsed");

            Ok(BatchOutcome {
                records,
                plan,
                strategy: recovered.strategy,
                attempts,
                diagnostics,
                completed_at: Utc::now(),
            })
        }
        .instrument(span)
        .await
    }

    /// Ask the trading assistant a question, streaming the answer into `tx`.
    ///
    /// Returns the number of chunks sent.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] if rendering or the generator call fails.
    pub async fn chat(
        &self,
        question: &str,
        context: &str,
        tx: mpsc::Sender<StreamChunk>,
    ) -> Result<usize, ParseError> {
        let prompt = render_for(
            &self.snapshot().await,
            Category::Conversational,
            question,
            context,
        )?;
        debug!(prompt_chars = prompt.chars().count(), "chat prompt rendered");
        Ok(self
            .provider
            .stream(CompletionRequest::new(prompt), tx)
            .await?)
    }

    async fn run(&self, plan: PromptPlan) -> Result<ParseOutcome, ParseError> {
        let (fields, strategy, attempts) = if plan.category == Category::MultiProduct {
            let (recovered, attempts) = self.generate(&plan.prompt, recover_records).await?;
            (recovered.records, recovered.strategy, attempts)
        } else {
            let (recovered, attempts) = self.generate(&plan.prompt, recover).await?;
            (vec![recovered.fields], recovered.strategy, attempts)
        };

        let (records, diagnostics) = normalize_all(&fields);
        let record = records.first().cloned().unwrap_or_default();
        info!(
            ?strategy,
            attempts,
            asset_code = %record.asset_code,
            products = records.len(),
            "instruction parsed"
        );
        Ok(ParseOutcome {
            record,
            records,
            plan,
            strategy,
            attempts,
            diagnostics,
            completed_at: Utc::now(),
        })
    }

    /// Call the generator until its output is recoverable or attempts run out.
    /// Generator errors are returned immediately.
    async fn generate<T>(
        &self,
        prompt: &str,
        recover_fn: fn(&str) -> Result<T, RecoveryError>,
    ) -> Result<(T, u32), ParseError> {
        let mut attempt: u32 = 0;
        loop {
            attempt = attempt.saturating_add(1);
            let response = self
                .provider
                .complete(CompletionRequest::new(prompt))
                .await?;
            debug!(
                attempt,
                model = %response.model,
                output_tokens = response.usage.output_tokens,
                "generator responded"
            );

            match recover_fn(&response.text) {
                Ok(value) => return Ok((value, attempt)),
                Err(e) if attempt < self.max_attempts => {
                    warn!(error = %e, attempt, "recovery failed, asking generator again");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn normalize_all(maps: &[RawFieldMap]) -> (Vec<NormalizedRecord>, Vec<Diagnostic>) {
    let mut records = Vec::with_capacity(maps.len());
    let mut diagnostics = Vec::new();
    for fields in maps {
        let (record, found) = normalize_with_diagnostics(fields);
        records.push(record);
        diagnostics.extend(found);
    }
    (records, diagnostics)
}
