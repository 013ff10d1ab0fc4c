/// Error types for the messaging engine
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MessagingError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Server rejected request ({status}): {reason}")]
    Rejected { status: u16, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl MessagingError {
    /// Build a rejection from a non-2xx response body.
    pub fn rejected(status: u16, body: &[u8]) -> Self {
        MessagingError::Rejected {
            status,
            reason: reason_from_body(status, body),
        }
    }

    /// Text shown to the user for a failed action they initiated.
    pub fn user_message(&self) -> String {
        match self {
            MessagingError::Rejected { reason, .. } => reason.clone(),
            MessagingError::Transport(e) => format!("Network error: {}", e),
            MessagingError::Decode(_) => "Unexpected response from server".to_string(),
            MessagingError::Config(msg) => msg.clone(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MessagingError>;

/// Pull a human readable reason out of an error payload.
///
/// Accepts `{"error": "..."}`, `{"detail": "..."}` and field error maps
/// such as `{"recipient": ["Cannot send messages to yourself"]}`.
fn reason_from_body(status: u16, body: &[u8]) -> String {
    let fallback = || format!("request failed with status {}", status);

    let value: serde_json::Value = match serde_json::from_slice(body) {
        Ok(v) => v,
        Err(_) => return fallback(),
    };
    let object = match value.as_object() {
        Some(o) => o,
        None => return fallback(),
    };

    for key in ["error", "detail"] {
        if let Some(text) = object.get(key).and_then(|v| v.as_str()) {
            return text.to_string();
        }
    }

    let mut parts: Vec<String> = Vec::new();
    for (field, messages) in object {
        match messages {
            serde_json::Value::Array(items) => {
                let texts: Vec<&str> = items.iter().filter_map(|m| m.as_str()).collect();
                if !texts.is_empty() {
                    parts.push(format!("{}: {}", field, texts.join(" ")));
                }
            }
            serde_json::Value::String(text) => parts.push(format!("{}: {}", field, text)),
            _ => {}
        }
    }

    if parts.is_empty() {
        fallback()
    } else {
        parts.join("; ")
    }
}
