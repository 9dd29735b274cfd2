//! Error types for the relay
//!
//! Tool failures are not errors here: they travel as [`crate::tools::Outcome`]
//! values. What remains are programming errors inside a run
//! (contract violations) and startup/transport failures.

use crate::agent::pipeline::Stage;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Longest diagnostic text sent to a client
const MAX_CLIENT_MESSAGE_LEN: usize = 500;

static SECRET_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(password|token|key|secret)[=:]\s*\S+").expect("secret pattern is valid")
});

static SENSITIVE_PATH_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/[a-zA-Z0-9._/-]+/(secrets?|\.ssh|\.aws|\.config)/[a-zA-Z0-9._/-]+")
        .expect("path pattern is valid")
});

/// Main error type for relay operations
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Contract violation in {stage} stage: {message}")]
    ContractViolation { stage: Stage, message: String },

    #[error("Transport error: {message}")]
    TransportError { message: String },

    #[error("Configuration error: {0}")]
    ConfigError(#[from] crate::config::ConfigError),

    #[error("Tool error: {0}")]
    ToolError(#[from] crate::tools::ToolError),
}

impl AgentError {
    /// Create contract violation error
    pub fn contract_violation<S: Into<String>>(stage: Stage, message: S) -> Self {
        Self::ContractViolation {
            stage,
            message: message.into(),
        }
    }

    /// Create transport error
    pub fn transport_error<S: Into<String>>(message: S) -> Self {
        Self::TransportError {
            message: message.into(),
        }
    }

    pub fn is_contract_violation(&self) -> bool {
        matches!(self, AgentError::ContractViolation { .. })
    }

    /// Error text safe to put on the wire
    pub fn client_message(&self) -> String {
        sanitize_error_message(&self.to_string())
    }
}

/// Sanitize error messages to prevent sensitive data leakage
pub fn sanitize_error_message(message: &str) -> String {
    let sanitized = SECRET_PATTERN.replace_all(message, "${1}=***");
    let mut sanitized = SENSITIVE_PATH_PATTERN
        .replace_all(&sanitized, "/***REDACTED***/")
        .to_string();

    if sanitized.len() > MAX_CLIENT_MESSAGE_LEN {
        let truncate_suffix = "...[truncated]";
        let mut cut = MAX_CLIENT_MESSAGE_LEN - truncate_suffix.len();
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized = format!("{}{}", &sanitized[..cut], truncate_suffix);
    }

    sanitized
}

/// Result type for relay operations
pub type AgentResult<T> = Result<T, AgentError>;
