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

//! In-process fake HEOS device for integration tests

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// Canned handshake response captured from a receiver.
pub const HEARTBEAT_ACK: &str =
    r#"{"heos": {"command": "system/heart_beat", "result": "success", "message": ""}}"#;

/// What the device does with one request.
pub enum Action {
    Reply(String),
    /// Write the reply in two pieces, pausing between them.
    Split(String, usize),
    Delayed(Duration, String),
    Silent,
    Close,
}

/// Successful acknowledgement echoing `command`.
pub fn ack(command: &str) -> String {
    format!(r#"{{"heos": {{"command": "{command}", "result": "success", "message": ""}}}}"#)
}

/// Acknowledgement echoing `command` with a JSON payload.
pub fn ack_with_payload(command: &str, payload: &str) -> String {
    format!(
        r#"{{"heos": {{"command": "{command}", "result": "success", "message": ""}}, "payload": {payload}}}"#
    )
}

/// Command path of a raw request line.
///
/// `heos://player/get_volume?pid=1\r\n` becomes `player/get_volume`.
pub fn command_path(request: &str) -> &str {
    let request = request.trim_end();
    let request = request.strip_prefix("heos://").unwrap_or(request);
    request.split('?').next().unwrap_or(request)
}

type Handler = dyn Fn(usize, &str) -> Action + Send + Sync;

/// A fake device listening on an ephemeral port.
///
/// Every accepted connection is served by the same handler, which sees the
/// zero-based index of the request on that connection and the raw request line.
pub struct FakeDevice {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
    task: JoinHandle<()>,
}

impl FakeDevice {
    pub async fn spawn<F>(handler: F) -> Self
    where
        F: Fn(usize, &str) -> Action + Send + Sync + 'static,
    {
        let listener = TcpListener::bind(("127.0.0.1", 0))
            .await
            .expect("Failed to bind fake device");
        let addr = listener.local_addr().expect("Failed to read local addr");
        let requests: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let handler: Arc<Handler> = Arc::new(handler);

        let recorded = Arc::clone(&requests);
        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let handler = Arc::clone(&handler);
                let recorded = Arc::clone(&recorded);
                tokio::spawn(serve(stream, handler, recorded));
            }
        });

        Self {
            addr,
            requests,
            task,
        }
    }

    /// Answer the handshake with the canned heartbeat, then defer to `handler`.
    pub async fn with_handshake<F>(handler: F) -> Self
    where
        F: Fn(&str) -> Action + Send + Sync + 'static,
    {
        Self::spawn(move |index, request| {
            if index == 0 {
                Action::Reply(HEARTBEAT_ACK.to_string())
            } else {
                handler(request)
            }
        })
        .await
    }

    /// A device that echoes every command back as a success.
    pub async fn echo() -> Self {
        Self::with_handshake(|request| Action::Reply(ack(command_path(request)))).await
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Raw request lines received so far, across all connections.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().expect("requests lock poisoned").clone()
    }
}

impl Drop for FakeDevice {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(stream: TcpStream, handler: Arc<Handler>, requests: Arc<Mutex<Vec<String>>>) {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    for index in 0.. {
        let mut line = String::new();
        match reader.read_line(&mut line).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
        requests
            .lock()
            .expect("requests lock poisoned")
            .push(line.clone());

        let written = match handler(index, &line) {
            Action::Reply(body) => write_half.write_all(body.as_bytes()).await,
            Action::Split(body, at) => {
                let (head, tail) = body.as_bytes().split_at(at.min(body.len()));
                if write_half.write_all(head).await.is_err() {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
                write_half.write_all(tail).await
            }
            Action::Delayed(delay, body) => {
                tokio::time::sleep(delay).await;
                write_half.write_all(body.as_bytes()).await
            }
            Action::Silent => Ok(()),
            Action::Close => return,
        };
        if written.is_err() {
            return;
        }
    }
}
