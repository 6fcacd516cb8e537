//! Sentence segmentation for bullet-style output from extractive-ish models.

const ABBREVIATIONS: &[&str] = &[
    "mr", "mrs", "ms", "dr", "prof", "sr", "jr", "st", "vs", "etc", "e.g", "i.e", "inc", "ltd",
    "co", "fig",
];

const CLOSERS: &[char] = &['"', '\'', ')', ']', '\u{201d}', '\u{2019}'];

fn is_terminal(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

/// True when the word ending at a `.` is an abbreviation or a single initial.
fn is_abbreviation(word: &str) -> bool {
    let word = word.trim_start_matches(|c: char| !c.is_alphanumeric());
    let stem = word.trim_end_matches('.');
    if stem.chars().count() == 1 && stem.chars().all(char::is_alphabetic) {
        return true;
    }
    let lower = stem.to_lowercase();
    ABBREVIATIONS.contains(&lower.as_str())
}

/// Split text into trimmed sentences. A sentence ends at `.`, `!`, or `?`
/// followed by whitespace (or end of input), after absorbing closing quotes
/// and brackets.
pub fn split_sentences(text: &str) -> Vec<String> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut sentences = Vec::new();
    let mut start = 0usize;
    let mut i = 0usize;

    while i < chars.len() {
        let (pos, c) = chars[i];
        if !is_terminal(c) {
            i += 1;
            continue;
        }

        let mut j = i + 1;
        while j < chars.len() && (is_terminal(chars[j].1) || CLOSERS.contains(&chars[j].1)) {
            j += 1;
        }
        let at_boundary = j == chars.len() || chars[j].1.is_whitespace();
        if !at_boundary {
            i = j;
            continue;
        }

        if c == '.' && j == i + 1 {
            let word_start = text[start..pos]
                .char_indices()
                .rev()
                .find(|(_, ch)| ch.is_whitespace())
                .map(|(w, ch)| start + w + ch.len_utf8())
                .unwrap_or(start);
            if is_abbreviation(&text[word_start..=pos]) && j < chars.len() {
                i = j;
                continue;
            }
        }

        let end = if j == chars.len() { text.len() } else { chars[j].0 };
        let sentence = text[start..end].trim();
        if !sentence.is_empty() {
            sentences.push(sentence.to_string());
        }
        start = end;
        i = j;
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }
    sentences
}

/// Render each sentence as a `- ` bullet line.
pub fn to_bullet_points(text: &str) -> String {
    split_sentences(text)
        .iter()
        .map(|s| format!("- {s}"))
        .collect::<Vec<_>>()
        .join("\n")
}
