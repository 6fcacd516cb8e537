use std::num::NonZeroUsize;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::{debug, info, instrument};

use precis_core::{word_count, Document, InferenceBackend};

use crate::chunker;
use crate::errors::{Result, SummarizeError};
use crate::prompt::{PromptBuilder, TemplateKind};
use crate::summary::{Summary, SummaryPath};

const DEFAULT_WORD_COUNT_MAX: NonZeroUsize = match NonZeroUsize::new(100) {
    Some(n) => n,
    None => unreachable!(),
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SummarizerConfig {
    /// Texts longer than this (in words) are map-reduced, and it is also
    /// the chunk size.
    pub word_count_max: NonZeroUsize,
    pub max_output_tokens: u32,
    /// Maximum nesting of map-reduce passes. `None` relies on the shrink
    /// check alone.
    pub max_depth: Option<usize>,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            word_count_max: DEFAULT_WORD_COUNT_MAX,
            max_output_tokens: 1024,
            max_depth: None,
        }
    }
}

/// Summarizes text of any length through a single backend.
pub struct SummarizationController {
    backend: Arc<dyn InferenceBackend>,
    config: SummarizerConfig,
    prompts: PromptBuilder,
}

impl SummarizationController {
    pub fn new(backend: Arc<dyn InferenceBackend>, config: SummarizerConfig) -> Self {
        Self {
            backend,
            config,
            prompts: PromptBuilder::new(),
        }
    }

    /// Summarize `text` with `kind`'s template, map-reducing when it is over
    /// the word budget. Any backend failure aborts the whole call.
    pub async fn summarize(&self, text: &str, kind: TemplateKind) -> Result<String> {
        let (summary, _) = self.summarize_at(text, kind, 0).await?;
        Ok(summary)
    }

    /// Bullet-point summary of a whole document.
    #[instrument(skip_all, fields(source = ?document.source(), words = document.word_count()))]
    pub async fn summarize_document(&self, document: &Document) -> Result<Summary> {
        let kind = TemplateKind::Bullet;
        let (text, path) = self.summarize_at(document.content(), kind, 0).await?;
        info!(?path, "document summarized");
        Ok(Summary {
            text,
            kind,
            path,
            source_words: document.word_count(),
        })
    }

    fn summarize_at<'a>(
        &'a self,
        text: &'a str,
        kind: TemplateKind,
        depth: usize,
    ) -> BoxFuture<'a, Result<(String, SummaryPath)>> {
        async move {
            let words = word_count(text);
            if words <= self.config.word_count_max.get() {
                let prompt = self.prompts.render(kind, text);
                debug!(depth, words, ?kind, "direct summary");
                let summary = self
                    .backend
                    .invoke(&prompt, self.config.max_output_tokens)
                    .await?;
                return Ok((summary, SummaryPath::Direct));
            }

            if let Some(limit) = self.config.max_depth {
                if depth >= limit {
                    return Err(SummarizeError::DepthExceeded { depth, limit });
                }
            }

            let chunks = chunker::split(text, self.config.word_count_max);
            debug!(depth, words, chunks = chunks.len(), "map phase");

            let mut partials = Vec::with_capacity(chunks.len());
            for chunk in &chunks {
                let (partial, _) = self
                    .summarize_at(&chunk.text, TemplateKind::Initial, depth + 1)
                    .await?;
                partials.push(partial);
            }

            let joined = partials.join("\n");
            let joined_words = word_count(&joined);
            if joined_words >= words {
                return Err(SummarizeError::NotShrinking {
                    input_words: words,
                    output_words: joined_words,
                });
            }

            debug!(depth, words = joined_words, "reduce phase");
            let (summary, _) = self
                .summarize_at(&joined, TemplateKind::Final, depth + 1)
                .await?;
            Ok((summary, SummaryPath::Reduced))
        }
        .boxed()
    }
}
