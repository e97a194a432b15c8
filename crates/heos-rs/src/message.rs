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

use crate::error::{HeosError, Result};
use serde::{Deserialize, Serialize};

/// Outcome reported in the `result` field of a command acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CommandResult {
    Success,
    Failure,
    /// Any value the device sends that is not one of the documented ones
    Other(String),
}

impl Default for CommandResult {
    fn default() -> Self {
        CommandResult::Other(String::new())
    }
}

impl From<String> for CommandResult {
    fn from(value: String) -> Self {
        match value.as_str() {
            "success" => CommandResult::Success,
            "fail" | "failure" => CommandResult::Failure,
            _ => CommandResult::Other(value),
        }
    }
}

impl From<CommandResult> for String {
    fn from(value: CommandResult) -> Self {
        match value {
            CommandResult::Success => "success".to_string(),
            CommandResult::Failure => "fail".to_string(),
            CommandResult::Other(value) => value,
        }
    }
}

/// Command acknowledgement carried in the `heos` object of every response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    /// The command path echoed by the device, e.g. `system/heart_beat`
    pub command: String,
    /// Absent from unsolicited event notifications
    #[serde(default)]
    pub result: CommandResult,
    /// URL-form encoded details, e.g. `eid=2&text=ID Not Valid`
    #[serde(default)]
    pub message: String,
}

impl Command {
    pub fn is_success(&self) -> bool {
        self.result == CommandResult::Success
    }

    /// Decode the `key=value&...` pairs of the message field.
    pub fn message_params(&self) -> Vec<(String, String)> {
        url::form_urlencoded::parse(self.message.as_bytes())
            .into_owned()
            .collect()
    }

    /// Look up a single message parameter by key.
    pub fn message_param(&self, key: &str) -> Option<String> {
        url::form_urlencoded::parse(self.message.as_bytes())
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    /// Interim acknowledgement sent before the real response to a slow command.
    pub fn is_under_process(&self) -> bool {
        self.message.starts_with("command under process")
    }

    /// Convert a non-success acknowledgement into [`HeosError::CommandFailed`].
    pub fn ensure_success(&self) -> Result<()> {
        if self.is_success() {
            return Ok(());
        }

        Err(HeosError::CommandFailed {
            command: self.command.clone(),
            eid: self.message_param("eid").and_then(|eid| eid.parse().ok()),
            text: self
                .message_param("text")
                .unwrap_or_else(|| self.message.clone()),
        })
    }
}

/// A decoded response: the acknowledgement plus an optional command payload.
#[derive(Debug, Clone, Deserialize)]
pub struct Reply<T> {
    pub heos: Command,
    pub payload: Option<T>,
}
