use serde::Serialize;

use crate::prompt::TemplateKind;

/// How a summary was produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryPath {
    /// One inference call over the whole text.
    Direct,
    /// Chunked, summarized per chunk, then reduced.
    Reduced,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub text: String,
    pub kind: TemplateKind,
    pub path: SummaryPath,
    pub source_words: usize,
}
