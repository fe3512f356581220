//! facelab-infer — Remote face analysis through a multimodal LLM.
//!
//! Talks to any OpenAI-compatible `chat/completions` endpoint that accepts
//! `image_url` content parts. The service does all of the analysis; this
//! crate builds requests and turns whatever comes back into usable values.

pub mod client;
pub mod config;
pub mod parse;
pub mod prompts;

pub use client::{compare_failure, InferenceClient, InferenceError};
pub use config::{ConfigError, InferenceConfig};
pub use parse::{parse_comparison, DEFAULT_SIMILARITY};
