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

//! Command URIs and request framing
//!
//! Requests are command paths such as `system/heart_beat` qualified with the
//! `heos://` scheme, with arguments as query parameters, and terminated by
//! `\r\n` on the wire.

use crate::error::{HeosError, Result};
use std::fmt;
use std::str::FromStr;
use url::Url;

/// Scheme that qualifies every command.
pub const SCHEME: &str = "heos";

/// Every request line must end with this exact terminator.
const TERMINATOR: &[u8] = b"\r\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandUri {
    url: Url,
}

impl CommandUri {
    /// Normalize `command` into a `heos://group/command?args` URI.
    ///
    /// Accepts either a bare command path or one already carrying the scheme.
    pub fn parse(command: &str) -> Result<Self> {
        let path = command
            .strip_prefix(SCHEME)
            .and_then(|rest| rest.strip_prefix("://"))
            .unwrap_or(command);

        if path.trim().is_empty() {
            return Err(HeosError::invalid_command(command, "empty command"));
        }
        if path.contains("://") {
            return Err(HeosError::invalid_command(command, "unsupported scheme"));
        }

        let url = Url::parse(&format!("{SCHEME}://{path}"))
            .map_err(|e| HeosError::invalid_command(command, e.to_string()))?;

        if url.host_str().is_none_or(str::is_empty) {
            return Err(HeosError::invalid_command(command, "missing command group"));
        }

        Ok(Self { url })
    }

    /// The unqualified command path, e.g. `system/heart_beat`.
    ///
    /// This is what devices echo back in the acknowledgement envelope.
    pub fn command_path(&self) -> String {
        let group = self.url.host_str().unwrap_or_default();
        format!("{}{}", group, self.url.path())
    }

    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.url.query_pairs().into_owned().collect()
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    /// The exact bytes written for this request.
    pub fn to_wire(&self) -> Vec<u8> {
        let uri = self.url.as_str().as_bytes();
        let mut wire = Vec::with_capacity(uri.len() + TERMINATOR.len());
        wire.extend_from_slice(uri);
        wire.extend_from_slice(TERMINATOR);
        wire
    }
}

impl FromStr for CommandUri {
    type Err = HeosError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for CommandUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}
