//! Inference backends and the rate-limited, retrying wrapper around them.

pub mod beam;
#[cfg(feature = "ort")]
pub mod local;
pub mod mock;
pub mod rate_limit;
pub mod reliable;
pub mod sentences;
pub mod vertex;

pub use beam::{beam_search, SpecialTokens};
#[cfg(feature = "ort")]
pub use local::LocalSeq2SeqProvider;
pub use mock::{MockBackend, MockResponse};
pub use rate_limit::{RateBudget, RateLimitConfig, RateLimiter};
pub use reliable::{ReliableBackend, ReliableConfig};
pub use sentences::{split_sentences, to_bullet_points};
pub use vertex::VertexProvider;
