//! Recursive text-file reader for the summarization inputs.

use std::path::Path;

use tracing::{debug, warn};
use walkdir::WalkDir;

use precis_core::Document;

/// Documents read from one root, plus how many entries were skipped.
#[derive(Debug, Default)]
pub struct Corpus {
    pub documents: Vec<Document>,
    pub skipped: usize,
}

/// Read every regular file under `root` (or `root` itself if it is a file)
/// as UTF-8, in file-name order. Unreadable entries are logged and skipped.
pub fn read_corpus(root: &Path) -> Corpus {
    let mut corpus = Corpus::default();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(root = %root.display(), error = %e, "skipping unreadable entry");
                corpus.skipped += 1;
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        match std::fs::read_to_string(path) {
            Ok(content) => {
                debug!(path = %path.display(), bytes = content.len(), "read document");
                corpus.documents.push(Document::from_path(path, content));
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping file");
                corpus.skipped += 1;
            }
        }
    }

    corpus
}
