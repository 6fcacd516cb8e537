//! Backend construction from settings.

use std::sync::Arc;

use anyhow::{Context, Result};
use secrecy::SecretString;
use tracing::info;

use precis_core::InferenceBackend;
use precis_llm::VertexProvider;
use precis_settings::{BackendKind, BackendSettings, LocalModelSettings, VertexSettings};

/// Bearer token for the Vertex AI endpoint (e.g. from `gcloud auth print-access-token`).
pub const ACCESS_TOKEN_ENV: &str = "PRECIS_VERTEX_ACCESS_TOKEN";

pub async fn build_backend(settings: &BackendSettings) -> Result<Arc<dyn InferenceBackend>> {
    match settings.kind {
        BackendKind::Vertex => {
            let token = std::env::var(ACCESS_TOKEN_ENV)
                .ok()
                .filter(|t| !t.trim().is_empty())
                .with_context(|| format!("{ACCESS_TOKEN_ENV} is not set"))?;
            vertex_backend(&settings.vertex, token)
        }
        BackendKind::Local => local_backend(&settings.local).await,
    }
}

fn vertex_backend(settings: &VertexSettings, token: String) -> Result<Arc<dyn InferenceBackend>> {
    let provider = VertexProvider::new(settings.clone(), SecretString::from(token))
        .context("failed to configure Vertex backend")?;
    info!(
        model = %settings.model,
        endpoint = provider.endpoint(),
        "using Vertex backend"
    );
    Ok(Arc::new(provider))
}

/// Loads the model before returning so a missing or broken export fails at
/// startup rather than on the first document.
#[cfg(feature = "ort")]
async fn local_backend(settings: &LocalModelSettings) -> Result<Arc<dyn InferenceBackend>> {
    info!(model = %settings.model, cache_dir = %settings.resolved_cache_dir(), "using local backend");
    let provider = precis_llm::LocalSeq2SeqProvider::new(settings.clone());
    provider
        .initialize()
        .await
        .with_context(|| format!("failed to load local model {}", settings.model))?;
    Ok(Arc::new(provider))
}

#[cfg(not(feature = "ort"))]
async fn local_backend(_settings: &LocalModelSettings) -> Result<Arc<dyn InferenceBackend>> {
    anyhow::bail!("the local backend requires building with `--features ort`")
}
