//! AI primitives for the muaddib relay.
//!
//! This crate provides:
//!
//! - **Backend traits**: [`CompletionEngine`] and [`ImageGenerator`]
//! - **Answer contract**: [`AnswerResult`], the normalized verdict of one completion
//! - **Personas**: system prompts chosen per speaker
//! - **Vision**: image analysis requests
//! - **OpenAI-compatible client**: the HTTP implementation of both traits

pub mod answer;
pub mod backend;
pub mod error;
pub mod openai;
pub mod persona;
pub mod vision;

pub use answer::{AnswerResult, FALLBACK_ANSWER};
pub use backend::{
    ChatMessage, ChatRole, CompletionEngine, CompletionRequest, CompletionResponse, ContentPart,
    ImageDetail, ImageGenerator, ImageUrl, MessageContent, OutputSchema,
};
pub use error::LlmError;
pub use openai::{OpenAiCompatibleClient, OpenAiCompatibleConfig};
pub use persona::{Persona, PersonaKind, PersonaSelector, PersonaSettings, RoleCode};
pub use vision::{ANALYSIS_FALLBACK, analysis_request};
