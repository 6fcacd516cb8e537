use serde::{Deserialize, Serialize};

/// Decoding parameters for the local encoder-decoder backend.
///
/// The summarization controller never reads these; they travel from settings
/// straight to the backend that decodes with them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerationParams {
    /// Maximum summary length in tokens.
    pub max_length: usize,
    /// Minimum summary length in tokens; end-of-sequence is suppressed before it.
    pub min_length: usize,
    /// Exponent applied to hypothesis length when ranking finished beams.
    pub length_penalty: f32,
    /// Beam width. `1` is greedy decoding.
    pub num_beams: usize,
    /// Stop as soon as `num_beams` hypotheses are finished.
    pub early_stopping: bool,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_length: 150,
            min_length: 40,
            length_penalty: 2.0,
            num_beams: 4,
            early_stopping: true,
        }
    }
}
