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

/// Initial size of the per-connection response buffer (one page).
///
/// This is a starting allocation, not a limit: the buffer grows when a response
/// does not fit, up to [`DEFAULT_MAX_RESPONSE_SIZE`].
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Largest single response accepted before the exchange fails (1MB).
/// This keeps a misbehaving device from growing the buffer without bound.
pub const DEFAULT_MAX_RESPONSE_SIZE: usize = 1024 * 1024;

/// Client tunables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientConfig {
    /// Initial buffer allocation, also the amount reserved before each read
    pub buffer_size: usize,
    /// Upper bound on a single buffered response
    pub max_response_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            max_response_size: DEFAULT_MAX_RESPONSE_SIZE,
        }
    }
}

impl ClientConfig {
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn with_max_response_size(mut self, max_response_size: usize) -> Self {
        self.max_response_size = max_response_size;
        self
    }

    /// Clamp the values into a usable range: a non-empty buffer and a maximum
    /// no smaller than the initial buffer.
    pub(crate) fn normalized(self) -> Self {
        let buffer_size = self.buffer_size.max(1);
        Self {
            buffer_size,
            max_response_size: self.max_response_size.max(buffer_size),
        }
    }
}
