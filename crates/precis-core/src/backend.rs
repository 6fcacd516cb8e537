use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::BackendError;

/// A single text-generation capability: prompt in, text out.
///
/// Implemented by each concrete model (remote hosted, local seq2seq) and by
/// wrappers that add rate limiting and retries around another backend.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    fn name(&self) -> &str;
    fn model(&self) -> &str;

    async fn invoke(&self, prompt: &str, max_output_tokens: u32) -> Result<String, BackendError>;
}

#[async_trait]
impl<B: InferenceBackend + ?Sized> InferenceBackend for Arc<B> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn model(&self) -> &str {
        (**self).model()
    }

    async fn invoke(&self, prompt: &str, max_output_tokens: u32) -> Result<String, BackendError> {
        (**self).invoke(prompt, max_output_tokens).await
    }
}
