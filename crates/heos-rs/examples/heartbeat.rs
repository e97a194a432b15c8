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

//! Connect to a HEOS device and send a heartbeat
//!
//! HEOS devices listen on TCP port 1255:
//! ```bash
//! RUST_LOG=heos_rs=debug cargo run -p heos-rs --example heartbeat -- 192.168.1.20:1255
//! ```

use heos_rs::{Client, Context, Result};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:1255".to_string());

    let (ctx, _cancel) = Context::background().with_timeout(Duration::from_secs(5));

    println!("Connecting to HEOS device at {}...", addr);
    let client = Client::dial(&ctx, addr.as_str()).await?;
    println!("✓ Connected to {}", client.peer_addr());

    println!("\nSending heartbeat...");
    client.system().heartbeat(&ctx).await?;
    println!("✓ Device is alive");

    println!("\nQuerying players...");
    let reply = client
        .query_with_payload::<serde_json::Value>(&ctx, "player/get_players")
        .await?;
    println!("✓ {} ({:?})", reply.heos.command, reply.heos.result);
    if let Some(players) = reply.payload {
        println!("✓ Players: {}", players);
    }

    client.close().await?;
    println!("\n✓ Connection closed");

    Ok(())
}
