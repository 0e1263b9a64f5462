//! Model-backed evaluation for infrascore.
//!
//! [`LlmEvaluator`] renders a per-metric rubric prompt, sends it through a
//! [`ChatBackend`] and validates the JSON it gets back. [`OpenAiChatClient`]
//! is the HTTP backend for OpenAI-compatible chat APIs.

pub mod client;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod parse;
pub mod prompt;

pub use client::{with_retry, ChatBackend, OpenAiChatClient};
pub use config::{LlmConfig, DEFAULT_BASE_URL, DEFAULT_MODEL};
pub use error::{LlmError, LlmResult};
pub use evaluator::LlmEvaluator;
pub use parse::extract_json;
pub use prompt::{build_prompt, rubric_for, Prompt, Rubric, RUBRICS};
