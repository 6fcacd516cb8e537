//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]` so a settings
//! file may name only the fields it changes.

use precis_core::GenerationParams;
use serde::{Deserialize, Serialize};

/// Root settings type.
///
/// ```json
/// {
///   "summarizer": { "wordCountMax": 400 },
///   "backend": { "kind": "local", "local": { "cacheDir": "~/models" } }
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PrecisSettings {
    pub summarizer: SummarizerSettings,
    pub rate_limit: RateLimitSettings,
    pub retry: RetrySettings,
    pub backend: BackendSettings,
    pub logging: LoggingSettings,
}

/// Map-reduce controller settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SummarizerSettings {
    /// Largest word count summarized in a single call; also the chunk size.
    pub word_count_max: usize,
    /// Output token cap passed to every inference call.
    pub max_output_tokens: u32,
    /// Optional cap on map-reduce recursion depth. Unset means unbounded
    /// (termination then relies on the shrink check alone).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
}

impl Default for SummarizerSettings {
    fn default() -> Self {
        Self {
            word_count_max: 100,
            max_output_tokens: 1024,
            max_depth: None,
        }
    }
}

/// Local call ceiling applied before every inference call.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RateLimitSettings {
    pub call_ceiling: usize,
    pub period_secs: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            call_ceiling: 20,
            period_secs: 60,
        }
    }
}

/// Backoff applied to transient backend rejections.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetrySettings {
    /// First backoff delay; doubles on every further attempt.
    pub base_delay_ms: u64,
    /// Cumulative backoff budget per call.
    pub max_backoff_secs: u64,
    /// Jitter 0.0–1.0 applied to each delay.
    pub jitter_factor: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            base_delay_ms: 1000,
            max_backoff_secs: 300,
            jitter_factor: 0.0,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Vertex,
    Local,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackendSettings {
    pub kind: BackendKind,
    pub vertex: VertexSettings,
    pub local: LocalModelSettings,
}

/// Remote hosted text model. The access token is never stored here; it is
/// read from the environment when the provider is built.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VertexSettings {
    pub project: String,
    pub location: String,
    pub model: String,
    /// Override for the API host (tests, private endpoints).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

impl Default for VertexSettings {
    fn default() -> Self {
        Self {
            project: String::new(),
            location: "us-central1".to_string(),
            model: "text-bison@001".to_string(),
            api_base: None,
            temperature: None,
        }
    }
}

/// Locally loaded encoder-decoder model.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LocalModelSettings {
    /// Hugging Face repository with an ONNX export of the model.
    pub model: String,
    /// Local weights cache directory (may contain `~`).
    pub cache_dir: String,
    /// Input is truncated to this many tokens before encoding.
    pub max_input_tokens: usize,
    /// Reformat decoded output as one `- ` line per sentence.
    pub bullet_points: bool,
    pub generation: GenerationParams,
}

impl Default for LocalModelSettings {
    fn default() -> Self {
        Self {
            model: "Xenova/distilbart-cnn-6-6".to_string(),
            cache_dir: "~/.precis/models".to_string(),
            max_input_tokens: 1024,
            bullet_points: false,
            generation: GenerationParams::default(),
        }
    }
}

impl LocalModelSettings {
    /// Resolve the cache directory, expanding `~/` to the home directory.
    pub fn resolved_cache_dir(&self) -> String {
        if self.cache_dir.starts_with("~/") {
            if let Ok(home) = std::env::var("HOME") {
                return format!("{}{}", home, &self.cache_dir[1..]);
            }
        }
        self.cache_dir.clone()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default level; `RUST_LOG` takes precedence.
    pub level: String,
    /// Emit JSON lines instead of human-readable text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
