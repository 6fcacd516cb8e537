use std::path::{Path, PathBuf};

/// Number of whitespace-separated words in `text`.
///
/// This is the single word-count definition used for the size check, the
/// chunker and the shrink guard.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// An immutable text blob read from the corpus.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Document {
    source: Option<PathBuf>,
    content: String,
    words: usize,
}

impl Document {
    pub fn new(content: impl Into<String>) -> Self {
        let content = content.into();
        let words = word_count(&content);
        Self {
            source: None,
            content,
            words,
        }
    }

    pub fn from_path(source: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        Self {
            source: Some(source.into()),
            ..Self::new(content)
        }
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn word_count(&self) -> usize {
        self.words
    }
}
