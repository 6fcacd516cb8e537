use std::num::NonZeroUsize;

/// A contiguous run of words from a larger text, rejoined with single spaces.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    pub text: String,
}

/// Split `text` into consecutive windows of `words_per_chunk` words.
///
/// Only the last window may be shorter. Empty or whitespace-only input yields
/// no chunks.
pub fn split(text: &str, words_per_chunk: NonZeroUsize) -> Vec<Chunk> {
    let words: Vec<&str> = text.split_whitespace().collect();
    words
        .chunks(words_per_chunk.get())
        .enumerate()
        .map(|(index, window)| Chunk {
            index,
            text: window.join(" "),
        })
        .collect()
}
