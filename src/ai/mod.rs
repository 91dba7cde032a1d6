pub mod client;
pub mod parser;
pub mod prompt;
pub mod sanitize;

pub use client::*;
pub use parser::*;
pub use prompt::*;
pub use sanitize::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AiError {
    #[error("AI is not configured (GEMINI_API_KEY unset)")]
    NotConfigured,

    #[error("Cannot reach AI service at {0}")]
    Connection(String),

    #[error("AI request timed out after {0}s")]
    Timeout(u64),

    #[error("AI service returned error (status {status}): {body}")]
    Status { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    #[error("AI returned no text")]
    EmptyResponse,
}
