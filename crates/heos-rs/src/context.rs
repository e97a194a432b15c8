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

//! Cancellable, time-bounded operation contexts
//!
//! Every network operation takes a [`Context`]. A context carries an optional
//! deadline and a cancellation signal; child contexts inherit both from their
//! parent, so canceling a parent cancels every context derived from it.

use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a context is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("context canceled")]
    Canceled,

    #[error("context deadline exceeded")]
    DeadlineExceeded,
}

#[derive(Debug, Clone)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

/// Cancels the context it was created with, and every context derived from it.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

impl Context {
    /// A root context that is never canceled and has no deadline.
    pub fn background() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Derive a context that is canceled when the returned handle is invoked.
    pub fn with_cancel(&self) -> (Context, CancelHandle) {
        self.child(self.deadline)
    }

    /// Derive a context whose deadline is `timeout` from now, or the parent's
    /// deadline if that is sooner.
    pub fn with_timeout(&self, timeout: Duration) -> (Context, CancelHandle) {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self.with_cancel(),
        }
    }

    /// Derive a context that expires at `deadline`, or at the parent's deadline
    /// if that is sooner.
    pub fn with_deadline(&self, deadline: Instant) -> (Context, CancelHandle) {
        let deadline = match self.deadline {
            Some(parent) if parent < deadline => parent,
            _ => deadline,
        };
        self.child(Some(deadline))
    }

    fn child(&self, deadline: Option<Instant>) -> (Context, CancelHandle) {
        let token = self.token.child_token();
        let handle = CancelHandle {
            token: token.clone(),
        };
        (Context { token, deadline }, handle)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns why the context is done, or `None` while it is still live.
    ///
    /// Explicit cancellation takes precedence over an elapsed deadline.
    pub fn err(&self) -> Option<ContextError> {
        if self.token.is_cancelled() {
            Some(ContextError::Canceled)
        } else if self.deadline.is_some_and(|d| Instant::now() >= d) {
            Some(ContextError::DeadlineExceeded)
        } else {
            None
        }
    }

    /// Resolves once the context is canceled or its deadline passes.
    pub async fn done(&self) -> ContextError {
        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                _ = self.token.cancelled() => ContextError::Canceled,
                _ = tokio::time::sleep_until(deadline) => ContextError::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                ContextError::Canceled
            }
        }
    }
}
