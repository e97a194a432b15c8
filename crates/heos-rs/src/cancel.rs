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

//! Context-aware execution of in-flight stream operations
//!
//! [`run`] applies a [`Context`]'s deadline to a [`DeadlineStream`] and races
//! the operation against the context. On cancellation the stream deadline is
//! forced into the past so the operation unblocks, and the operation is always
//! driven to completion before `run` returns. Nothing can still be touching the
//! connection's buffers once the caller sees the result.
//!
//! A second token, owned by the connection rather than the caller, aborts the
//! operation the same way when the connection is being closed.
//!
//! [`DeadlineStream`]: crate::deadline::DeadlineStream

use crate::context::{Context, ContextError};
use crate::deadline::DeadlineHandle;
use crate::error::{HeosError, Result};
use lazy_static::lazy_static;
use std::future::Future;
use std::io;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

lazy_static! {
    /// An instant captured once; every deadline set after its first use is
    /// later than it, so it always reads as already elapsed.
    pub(crate) static ref DEADLINE_NOW: Instant = Instant::now();
}

/// Run `op` under `ctx`.
///
/// `deadline` must control the stream `op` performs I/O on, and `abort_at`
/// must lie in the past; it is applied when `ctx` is canceled or `shutdown`
/// fires.
///
/// Returns the operation's own result if it finishes first, the context's
/// error if `ctx` ends first, and [`HeosError::Closed`] on shutdown.
pub(crate) async fn run<F, T>(
    ctx: &Context,
    shutdown: &CancellationToken,
    deadline: &DeadlineHandle,
    abort_at: Instant,
    op: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    if shutdown.is_cancelled() {
        return Err(HeosError::Closed);
    }
    if let Some(reason) = ctx.err() {
        return Err(reason.into());
    }

    deadline.set(ctx.deadline());

    tokio::pin!(op);
    tokio::select! {
        biased;
        result = &mut op => match (result, ctx.err()) {
            // The stream deadline and the context deadline are the same
            // instant, so the operation may observe it first.
            (Err(HeosError::Connection(err)), Some(reason))
                if err.kind() == io::ErrorKind::TimedOut =>
            {
                Err(reason.into())
            }
            (result, _) => result,
        },
        () = shutdown.cancelled() => {
            deadline.set(Some(abort_at));
            debug!("aborting in-flight operation for shutdown");

            if let Err(err) = op.await {
                debug!(error = %err, "aborted operation unwound");
            }
            Err(HeosError::Closed)
        }
        reason = ctx.done() => {
            if reason == ContextError::Canceled {
                deadline.set(Some(abort_at));
            }
            debug!(%reason, "aborting in-flight operation");

            if let Err(err) = op.await {
                debug!(error = %err, "aborted operation unwound");
            }
            Err(reason.into())
        }
    }
}
