//! Map-reduce summarization over an [`InferenceBackend`](precis_core::InferenceBackend).
//!
//! Text under the word budget is summarized in one call. Longer text is
//! chunked, each chunk summarized, and the joined partial summaries are
//! summarized again, recursing until the input fits.

pub mod chunker;
pub mod controller;
pub mod errors;
pub mod prompt;
pub mod summary;

pub use chunker::{split, Chunk};
pub use controller::{SummarizationController, SummarizerConfig};
pub use errors::SummarizeError;
pub use prompt::{PromptBuilder, TemplateKind};
pub use summary::{Summary, SummaryPath};
