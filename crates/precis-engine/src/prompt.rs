use serde::{Deserialize, Serialize};

/// Which instruction wraps the text sent to the model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateKind {
    /// Prose summary, used for each chunk in the map phase.
    Initial,
    /// Bullet-point summary of text that fits in one call.
    Bullet,
    /// Bullet-point summary of joined partial summaries.
    Final,
}

const CONCISE_HEADER: &str =
    "Write a concise summary of the following text delimited by triple backquotes.\n";
const BULLET_HEADER: &str = "Write a concise summary of the following text delimited by triple backquotes.\n\
Return your response in bullet points which covers the key points of the text.\n";

/// Renders instruction templates around a text body.
#[derive(Clone, Copy, Debug, Default)]
pub struct PromptBuilder;

impl PromptBuilder {
    pub fn new() -> Self {
        Self
    }

    /// The body is inserted verbatim. Backquotes in it are not escaped, so a
    /// body containing a triple-backquote fence can end the delimiter early.
    pub fn render(&self, kind: TemplateKind, body: &str) -> String {
        let (header, label) = match kind {
            TemplateKind::Initial => (CONCISE_HEADER, "CONCISE SUMMARY:"),
            TemplateKind::Bullet | TemplateKind::Final => (BULLET_HEADER, "BULLET POINT SUMMARY:"),
        };
        format!("{header}\n```{body}```\n\n{label}")
    }
}
