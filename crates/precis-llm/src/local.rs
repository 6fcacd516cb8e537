//! ONNX Runtime encoder-decoder summarizer (feature-gated behind `ort`).
//!
//! Fetches an optimum-style export (`onnx/encoder_model.onnx`,
//! `onnx/decoder_model.onnx`, `tokenizer.json`, `config.json`) via `hf-hub`,
//! then decodes with [`beam_search`] on a blocking thread.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, instrument};

use precis_core::{BackendError, GenerationParams, InferenceBackend};
use precis_settings::LocalModelSettings;

use crate::beam::{beam_search, SpecialTokens};
use crate::sentences::to_bullet_points;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

const ENCODER_FILE: &str = "onnx/encoder_model.onnx";
const DECODER_FILE: &str = "onnx/decoder_model.onnx";

#[derive(Debug, Deserialize)]
struct ModelConfig {
    decoder_start_token_id: i64,
    eos_token_id: i64,
}

struct LoadedModel {
    encoder: ort::session::Session,
    decoder: ort::session::Session,
    tokenizer: tokenizers::Tokenizer,
    special: SpecialTokens,
}

/// Local summarization model. Weights load on first use.
pub struct LocalSeq2SeqProvider {
    settings: LocalModelSettings,
    state: Arc<tokio::sync::Mutex<Option<LoadedModel>>>,
}

impl LocalSeq2SeqProvider {
    pub fn new(settings: LocalModelSettings) -> Self {
        Self {
            settings,
            state: Arc::new(tokio::sync::Mutex::new(None)),
        }
    }

    /// Download (if needed) and load the model now instead of on the first call.
    pub async fn initialize(&self) -> Result<(), BackendError> {
        let mut guard = self.state.clone().lock_owned().await;
        if guard.is_some() {
            return Ok(());
        }
        let settings = self.settings.clone();
        let loaded = tokio::task::spawn_blocking(move || load_model(&settings))
            .await
            .map_err(|e| BackendError::Model(format!("join error: {e}")))?
            .map_err(|e| BackendError::Model(e.to_string()))?;
        *guard = Some(loaded);
        Ok(())
    }
}

fn load_model(settings: &LocalModelSettings) -> Result<LoadedModel, BoxError> {
    let cache_dir = settings.resolved_cache_dir();
    debug!(cache_dir, model = %settings.model, "fetching model via hf-hub");

    let api = hf_hub::api::sync::ApiBuilder::new()
        .with_cache_dir(PathBuf::from(&cache_dir))
        .build()?;
    let repo = api.model(settings.model.clone());

    let encoder_path = repo.get(ENCODER_FILE)?;
    let decoder_path = repo.get(DECODER_FILE)?;
    let tokenizer_path = repo.get("tokenizer.json")?;
    let config_path = repo.get("config.json")?;

    let config: ModelConfig = serde_json::from_str(&std::fs::read_to_string(&config_path)?)?;
    let tokenizer = tokenizers::Tokenizer::from_file(&tokenizer_path)
        .map_err(|e| format!("tokenizer load: {e}"))?;

    let encoder = ort::session::Session::builder()?
        .with_intra_threads(2)?
        .with_log_level(ort::logging::LogLevel::Warning)?
        .commit_from_file(&encoder_path)?;
    let decoder = ort::session::Session::builder()?
        .with_intra_threads(2)?
        .with_log_level(ort::logging::LogLevel::Warning)?
        .commit_from_file(&decoder_path)?;

    info!(model = %settings.model, "local summarization model loaded");
    Ok(LoadedModel {
        encoder,
        decoder,
        tokenizer,
        special: SpecialTokens {
            decoder_start: config.decoder_start_token_id,
            eos: config.eos_token_id,
        },
    })
}

/// Clamp decoding lengths to the caller's output token limit.
fn effective_params(base: &GenerationParams, max_output_tokens: u32) -> GenerationParams {
    let cap = usize::try_from(max_output_tokens).unwrap_or(usize::MAX);
    let max_length = base.max_length.min(cap);
    GenerationParams {
        max_length,
        min_length: base.min_length.min(max_length),
        ..base.clone()
    }
}

/// Keep the first `max - 1` ids and the final id (end-of-sequence).
fn truncate_ids(mut ids: Vec<i64>, max: usize) -> Vec<i64> {
    if max == 0 || ids.len() <= max {
        return ids;
    }
    let last = ids[ids.len() - 1];
    ids.truncate(max);
    ids[max - 1] = last;
    ids
}

fn summarize_blocking(
    model: &mut LoadedModel,
    text: &str,
    max_input_tokens: usize,
    params: &GenerationParams,
) -> Result<String, BoxError> {
    let encoding = model.tokenizer.encode(text, true)?;
    let ids: Vec<i64> = encoding.get_ids().iter().map(|&id| i64::from(id)).collect();
    let ids = truncate_ids(ids, max_input_tokens);
    if ids.is_empty() {
        return Err("empty tokenization".into());
    }

    #[allow(clippy::cast_possible_wrap)]
    let shape = vec![1i64, ids.len() as i64];
    let mask = vec![1i64; ids.len()];

    let input_ids = ort::value::Tensor::from_array((shape.clone(), ids))?;
    let attention_mask = ort::value::Tensor::from_array((shape.clone(), mask.clone()))?;
    let outputs = model.encoder.run(ort::inputs![
        "input_ids" => input_ids,
        "attention_mask" => attention_mask
    ])?;
    let (hidden_shape, hidden) = outputs[0].try_extract_tensor::<f32>()?;
    let hidden_shape: Vec<i64> = hidden_shape.iter().copied().collect();
    let hidden = hidden.to_vec();
    drop(outputs);

    let decoder = &mut model.decoder;
    let tokens = beam_search(params, model.special, |prefix: &[i64]| -> Result<Vec<f32>, BoxError> {
        #[allow(clippy::cast_possible_wrap)]
        let dec_shape = vec![1i64, prefix.len() as i64];
        let outputs = decoder.run(ort::inputs![
            "encoder_attention_mask" => ort::value::Tensor::from_array((shape.clone(), mask.clone()))?,
            "input_ids" => ort::value::Tensor::from_array((dec_shape, prefix.to_vec()))?,
            "encoder_hidden_states" => ort::value::Tensor::from_array((hidden_shape.clone(), hidden.clone()))?
        ])?;
        let (logit_shape, logits) = outputs[0].try_extract_tensor::<f32>()?;
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let vocab = logit_shape.last().copied().unwrap_or(0) as usize;
        if vocab == 0 || logits.len() < vocab {
            return Err(format!("unexpected logits shape: {logit_shape:?}").into());
        }
        Ok(logits[logits.len() - vocab..].to_vec())
    })?;

    let ids: Vec<u32> = tokens.iter().filter_map(|&t| u32::try_from(t).ok()).collect();
    Ok(model.tokenizer.decode(&ids, true)?.trim().to_string())
}

#[async_trait]
impl InferenceBackend for LocalSeq2SeqProvider {
    fn name(&self) -> &str {
        "local"
    }

    fn model(&self) -> &str {
        &self.settings.model
    }

    #[instrument(skip(self, prompt), fields(model = %self.settings.model, prompt_len = prompt.len()))]
    async fn invoke(&self, prompt: &str, max_output_tokens: u32) -> Result<String, BackendError> {
        let mut guard = self.state.clone().lock_owned().await;
        let settings = self.settings.clone();
        let params = effective_params(&settings.generation, max_output_tokens);
        let prompt = prompt.to_string();

        let text = tokio::task::spawn_blocking(move || -> Result<String, BoxError> {
            if guard.is_none() {
                *guard = Some(load_model(&settings)?);
            }
            let model = guard.as_mut().ok_or("model not loaded")?;
            summarize_blocking(model, &prompt, settings.max_input_tokens, &params)
        })
        .await
        .map_err(|e| BackendError::Model(format!("join error: {e}")))?
        .map_err(|e| BackendError::Model(e.to_string()))?;

        if self.settings.bullet_points {
            Ok(to_bullet_points(&text))
        } else {
            Ok(text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_provider_implements_backend() {
        fn assert_backend<T: InferenceBackend>() {}
        assert_backend::<LocalSeq2SeqProvider>();
    }

    #[test]
    fn identity_from_settings() {
        let p = LocalSeq2SeqProvider::new(LocalModelSettings::default());
        assert_eq!(p.name(), "local");
        assert_eq!(p.model(), "Xenova/distilbart-cnn-6-6");
    }

    #[test]
    fn output_limit_caps_generation() {
        let base = GenerationParams::default();
        let p = effective_params(&base, 30);
        assert_eq!(p.max_length, 30);
        assert_eq!(p.min_length, 30);
        let p = effective_params(&base, 1024);
        assert_eq!(p.max_length, 150);
        assert_eq!(p.min_length, 40);
        assert_eq!(p.num_beams, base.num_beams);
    }

    #[test]
    fn truncation_keeps_final_token() {
        assert_eq!(truncate_ids(vec![0, 5, 6, 7, 2], 3), vec![0, 5, 2]);
        assert_eq!(truncate_ids(vec![0, 5, 2], 3), vec![0, 5, 2]);
        assert_eq!(truncate_ids(vec![0, 5, 2], 0), vec![0, 5, 2]);
    }

    #[test]
    fn model_config_reads_special_ids() {
        let cfg: ModelConfig = serde_json::from_str(
            r#"{"decoder_start_token_id": 2, "eos_token_id": 2, "vocab_size": 50264}"#,
        )
        .unwrap();
        assert_eq!(cfg.decoder_start_token_id, 2);
        assert_eq!(cfg.eos_token_id, 2);
    }
}
