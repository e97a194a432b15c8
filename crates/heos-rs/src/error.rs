// Copyright (C) 2025 Tom Waddington
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

use crate::context::ContextError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, HeosError>;

#[derive(Debug, Error)]
pub enum HeosError {
    #[error("Connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// The caller's context was canceled before the exchange completed.
    #[error("context canceled")]
    Canceled,

    /// The caller's context deadline passed before the exchange completed.
    #[error("context deadline exceeded")]
    DeadlineExceeded,

    #[error("Invalid command {command:?}: {reason}")]
    InvalidCommand { command: String, reason: String },

    #[error("Codec error: {message}{}", .buffer_preview.as_deref().unwrap_or(""))]
    Codec {
        message: String,
        buffer_preview: Option<String>,
    },

    #[error("Response exceeds maximum size of {limit} bytes")]
    ResponseTooLarge { limit: usize },

    /// The device answered with a well-formed envelope whose result is a failure.
    #[error("Command {command} failed (eid {}): {text}", .eid.map_or_else(|| "?".to_string(), |e| e.to_string()))]
    CommandFailed {
        command: String,
        eid: Option<i32>,
        text: String,
    },

    #[error("connection closed")]
    Closed,
}

impl From<ContextError> for HeosError {
    fn from(err: ContextError) -> Self {
        match err {
            ContextError::Canceled => HeosError::Canceled,
            ContextError::DeadlineExceeded => HeosError::DeadlineExceeded,
        }
    }
}

impl From<serde_json::Error> for HeosError {
    fn from(err: serde_json::Error) -> Self {
        HeosError::codec(err.to_string())
    }
}

impl HeosError {
    /// Create a codec error without buffer context
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
            buffer_preview: None,
        }
    }

    /// Create a codec error carrying a preview of the offending bytes
    pub fn codec_with_preview(message: impl Into<String>, buffer: &[u8]) -> Self {
        let preview_len = buffer.len().min(100);
        let preview = String::from_utf8_lossy(&buffer[..preview_len]);

        Self::Codec {
            message: message.into(),
            buffer_preview: Some(format!(" (buffer preview: {:?})", preview)),
        }
    }

    pub(crate) fn invalid_command(command: &str, reason: impl Into<String>) -> Self {
        Self::InvalidCommand {
            command: command.to_string(),
            reason: reason.into(),
        }
    }

    /// Returns true for the two context-driven outcomes.
    pub fn is_context_error(&self) -> bool {
        matches!(self, HeosError::Canceled | HeosError::DeadlineExceeded)
    }
}
