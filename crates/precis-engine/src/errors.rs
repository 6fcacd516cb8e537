use precis_core::BackendError;

#[derive(Debug, thiserror::Error)]
pub enum SummarizeError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// A map phase produced partial summaries at least as long as its input,
    /// so reducing them again would not converge.
    #[error("map phase did not shrink the text ({input_words} words in, {output_words} out)")]
    NotShrinking {
        input_words: usize,
        output_words: usize,
    },

    #[error("map-reduce depth {depth} reached the limit of {limit}")]
    DepthExceeded { depth: usize, limit: usize },
}

pub type Result<T> = std::result::Result<T, SummarizeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_errors_convert() {
        let err: SummarizeError = BackendError::Model("boom".into()).into();
        assert!(matches!(err, SummarizeError::Backend(BackendError::Model(_))));
        assert_eq!(err.to_string(), "model error: boom");
    }

    #[test]
    fn guard_messages() {
        let err = SummarizeError::NotShrinking {
            input_words: 300,
            output_words: 320,
        };
        assert!(err.to_string().contains("300 words in, 320 out"));
        let err = SummarizeError::DepthExceeded { depth: 2, limit: 2 };
        assert!(err.to_string().contains("limit of 2"));
    }
}
