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

//! Deadline-aware stream wrapper
//!
//! Tokio streams have no notion of a read/write deadline. [`DeadlineStream`]
//! adds one: once the deadline held by its [`DeadlineHandle`] has passed, every
//! read, write and flush fails with [`io::ErrorKind::TimedOut`]. The handle is
//! shared, so the deadline can be moved while an operation on the stream is
//! still pending, and moving it wakes that operation.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll, Waker};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::time::{Instant, Sleep};

#[derive(Debug, Clone, Copy)]
enum Direction {
    Read,
    Write,
}

#[derive(Debug, Default)]
struct State {
    deadline: Option<Instant>,
    read_waker: Option<Waker>,
    write_waker: Option<Waker>,
}

/// Shared setter for the deadline of a [`DeadlineStream`].
#[derive(Debug, Clone, Default)]
pub(crate) struct DeadlineHandle {
    state: Arc<Mutex<State>>,
}

impl DeadlineHandle {
    /// Replace the deadline. `None` disables it.
    pub(crate) fn set(&self, deadline: Option<Instant>) {
        let (read_waker, write_waker) = {
            let mut state = self.lock();
            state.deadline = deadline;
            (state.read_waker.take(), state.write_waker.take())
        };

        // Pending operations re-check the new deadline when polled again.
        for waker in read_waker.into_iter().chain(write_waker) {
            waker.wake();
        }
    }

    #[cfg(test)]
    pub(crate) fn get(&self) -> Option<Instant> {
        self.lock().deadline
    }

    fn register(&self, direction: Direction, waker: &Waker) -> Option<Instant> {
        let mut state = self.lock();
        let slot = match direction {
            Direction::Read => &mut state.read_waker,
            Direction::Write => &mut state.write_waker,
        };
        match slot {
            Some(existing) if existing.will_wake(waker) => {}
            _ => *slot = Some(waker.clone()),
        }
        state.deadline
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // State stays consistent even if a holder panicked.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[derive(Debug, Default)]
struct Timer {
    sleep: Option<Pin<Box<Sleep>>>,
    armed: Option<Instant>,
}

impl Timer {
    fn poll_expired(&mut self, deadline: Instant, cx: &mut Context<'_>) -> bool {
        if Instant::now() >= deadline {
            return true;
        }

        let sleep = self
            .sleep
            .get_or_insert_with(|| Box::pin(tokio::time::sleep_until(deadline)));
        if self.armed != Some(deadline) {
            sleep.as_mut().reset(deadline);
            self.armed = Some(deadline);
        }
        sleep.as_mut().poll(cx).is_ready()
    }
}

#[derive(Debug)]
pub(crate) struct DeadlineStream<S> {
    inner: S,
    handle: DeadlineHandle,
    read_timer: Timer,
    write_timer: Timer,
}

impl<S> DeadlineStream<S> {
    pub(crate) fn new(inner: S) -> Self {
        Self {
            inner,
            handle: DeadlineHandle::default(),
            read_timer: Timer::default(),
            write_timer: Timer::default(),
        }
    }

    pub(crate) fn handle(&self) -> DeadlineHandle {
        self.handle.clone()
    }

    fn poll_deadline(&mut self, direction: Direction, cx: &mut Context<'_>) -> io::Result<()> {
        let Some(deadline) = self.handle.register(direction, cx.waker()) else {
            return Ok(());
        };

        let timer = match direction {
            Direction::Read => &mut self.read_timer,
            Direction::Write => &mut self.write_timer,
        };
        if timer.poll_expired(deadline, cx) {
            Err(io::Error::new(io::ErrorKind::TimedOut, "i/o deadline exceeded"))
        } else {
            Ok(())
        }
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for DeadlineStream<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if let Err(err) = this.poll_deadline(Direction::Read, cx) {
            return Poll::Ready(Err(err));
        }
        Pin::new(&mut this.inner).poll_read(cx, buf)
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for DeadlineStream<S> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        if let Err(err) = this.poll_deadline(Direction::Write, cx) {
            return Poll::Ready(Err(err));
        }
        Pin::new(&mut this.inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if let Err(err) = this.poll_deadline(Direction::Write, cx) {
            return Poll::Ready(Err(err));
        }
        Pin::new(&mut this.inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}
