pub mod backend;
pub mod document;
pub mod errors;
pub mod generation;

pub use backend::InferenceBackend;
pub use document::{word_count, Document};
pub use errors::BackendError;
pub use generation::GenerationParams;
