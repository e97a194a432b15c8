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

/// HEOS client connection and raw queries
use crate::cancel::{self, DEADLINE_NOW};
use crate::codec::next_reply;
use crate::command::CommandUri;
use crate::config::ClientConfig;
use crate::context::Context;
use crate::deadline::{DeadlineHandle, DeadlineStream};
use crate::error::{HeosError, Result};
use crate::message::{Command, Reply};
use crate::system::System;
use serde::de::{DeserializeOwned, IgnoredAny};
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Main HEOS client
///
/// All queries share one TCP connection. Responses carry no request id, so
/// exchanges are strictly serialized: a query holds the connection lock from
/// the moment its request is written until its response is decoded. Wrap the
/// client in an `Arc` to issue queries from several tasks.
#[derive(Debug)]
pub struct Client {
    conn: Mutex<Option<Connection>>,
    /// Fired by `close` before it takes the lock, so a query holding the
    /// connection is aborted instead of waited for.
    shutdown: CancellationToken,
    config: ClientConfig,
    peer: SocketAddr,
}

/// The open transport and its reusable response buffer.
#[derive(Debug)]
struct Connection {
    stream: DeadlineStream<TcpStream>,
    deadline: DeadlineHandle,
    buffer: Vec<u8>,
}

impl Connection {
    fn new(stream: TcpStream, buffer_size: usize) -> Self {
        let stream = DeadlineStream::new(stream);
        let deadline = stream.handle();
        Self {
            stream,
            deadline,
            buffer: Vec::with_capacity(buffer_size),
        }
    }

    async fn shut_down(mut self, peer: SocketAddr) {
        if let Err(err) = self.stream.shutdown().await {
            debug!(%peer, error = %err, "shutdown failed; dropping socket");
        }
    }

    /// Write one request and read the reply to it.
    async fn exchange<T: DeserializeOwned>(
        &mut self,
        ctx: &Context,
        shutdown: &CancellationToken,
        uri: &CommandUri,
        config: &ClientConfig,
    ) -> Result<Reply<T>> {
        let Connection {
            stream,
            deadline,
            buffer,
        } = self;
        let request = uri.to_wire();
        let command_path = uri.command_path();

        trace!(request = %uri, "sending command");
        cancel::run(ctx, shutdown, deadline, *DEADLINE_NOW, async {
            stream.write_all(&request).await?;
            stream.flush().await?;

            loop {
                if let Some(reply) = next_reply::<T>(buffer, &command_path)? {
                    return Ok(reply);
                }

                // The rest of the document is still in flight; the caller
                // must not reuse this connection.
                if buffer.len() >= config.max_response_size {
                    buffer.clear();
                    return Err(HeosError::ResponseTooLarge {
                        limit: config.max_response_size,
                    });
                }

                buffer.reserve(config.buffer_size);
                let n = stream.read_buf(buffer).await?;
                if n == 0 {
                    return Err(HeosError::Connection(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "connection closed",
                    )));
                }
                trace!(bytes = n, buffered = buffer.len(), "read response data");
            }
        })
        .await
    }
}

impl Client {
    /// Connect to a HEOS device and verify it speaks the protocol.
    ///
    /// Both the TCP connect and the initial heartbeat are bound by `ctx`.
    pub async fn dial(ctx: &Context, addr: impl ToSocketAddrs) -> Result<Self> {
        Self::dial_with_config(ctx, addr, ClientConfig::default()).await
    }

    pub async fn dial_with_config(
        ctx: &Context,
        addr: impl ToSocketAddrs,
        config: ClientConfig,
    ) -> Result<Self> {
        if let Some(reason) = ctx.err() {
            return Err(reason.into());
        }

        let stream = tokio::select! {
            biased;
            reason = ctx.done() => return Err(reason.into()),
            stream = TcpStream::connect(addr) => stream?,
        };
        let peer = stream.peer_addr()?;
        let config = config.normalized();

        let client = Self {
            conn: Mutex::new(Some(Connection::new(stream, config.buffer_size))),
            shutdown: CancellationToken::new(),
            config,
            peer,
        };

        // A device that does not answer the heartbeat is not a HEOS device;
        // dropping the client closes the socket.
        debug!(%peer, "connected, sending handshake heartbeat");
        client.system().heartbeat(ctx).await?;
        debug!(%peer, "handshake complete");

        Ok(client)
    }

    /// Issue a raw query such as `system/heart_beat` or
    /// `player/get_volume?pid=1` and return the acknowledgement.
    ///
    /// A "fail" result is returned as-is, not as an error; use
    /// [`Command::ensure_success`] to treat it as one.
    pub async fn query(&self, ctx: &Context, command: &str) -> Result<Command> {
        self.query_with_payload::<IgnoredAny>(ctx, command)
            .await
            .map(|reply| reply.heos)
    }

    /// Issue a raw query and decode the response payload into `T`.
    pub async fn query_with_payload<T: DeserializeOwned>(
        &self,
        ctx: &Context,
        command: &str,
    ) -> Result<Reply<T>> {
        let uri = CommandUri::parse(command)?;

        let mut guard = tokio::select! {
            biased;
            () = self.shutdown.cancelled() => return Err(HeosError::Closed),
            guard = self.conn.lock() => guard,
            reason = ctx.done() => return Err(reason.into()),
        };
        let conn = guard.as_mut().ok_or(HeosError::Closed)?;

        let result = conn.exchange(ctx, &self.shutdown, &uri, &self.config).await;
        if let Err(HeosError::ResponseTooLarge { limit }) = &result {
            // The unread tail of the oversized document would be taken as the
            // reply to the next query.
            debug!(peer = %self.peer, limit, "response too large; dropping connection");
            if let Some(conn) = guard.take() {
                self.shutdown.cancel();
                conn.shut_down(self.peer).await;
            }
        }
        result
    }

    /// Close the connection.
    ///
    /// An in-flight query is aborted with [`HeosError::Closed`] and drained
    /// before the socket is shut down. Closing an already closed client returns
    /// [`HeosError::Closed`].
    pub async fn close(&self) -> Result<()> {
        self.shutdown.cancel();
        let conn = self.conn.lock().await.take().ok_or(HeosError::Closed)?;

        debug!(peer = %self.peer, "closing connection");
        conn.shut_down(self.peer).await;
        Ok(())
    }

    pub async fn is_closed(&self) -> bool {
        self.conn.lock().await.is_none()
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// HEOS `system/*` commands
    pub fn system(&self) -> System<'_> {
        System::new(self)
    }
}
