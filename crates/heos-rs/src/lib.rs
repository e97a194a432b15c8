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

//! # HEOS Client
//!
//! An async client for the Denon HEOS control protocol: URL-like command lines
//! such as `heos://system/heart_beat\r\n` sent over a long-lived TCP
//! connection, each answered by one JSON document.
//!
//! Every operation takes a [`Context`] that bounds it with an optional deadline
//! and can cancel it while it is blocked on the network. Cancelling a query
//! aborts that query only; the connection stays usable.
//!
//! ## Example
//!
//! ```no_run
//! use heos_rs::{Client, Context};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (ctx, _cancel) = Context::background().with_timeout(Duration::from_secs(5));
//!     let client = Client::dial(&ctx, "192.168.1.20:1255").await?;
//!
//!     client.system().heartbeat(&ctx).await?;
//!     let ack = client.query(&ctx, "player/get_players").await?;
//!     println!("{}: {:?}", ack.command, ack.result);
//!
//!     client.close().await?;
//!     Ok(())
//! }
//! ```

mod cancel;
mod codec;
mod command;
mod config;
mod connection;
mod context;
mod deadline;
mod error;
mod message;
mod system;

pub use command::{CommandUri, SCHEME};
pub use config::{ClientConfig, DEFAULT_BUFFER_SIZE, DEFAULT_MAX_RESPONSE_SIZE};
pub use connection::Client;
pub use context::{CancelHandle, Context, ContextError};
pub use error::{HeosError, Result};
pub use message::{Command, CommandResult, Reply};
pub use system::{HEART_BEAT, System};
