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

/// HEOS system command group
use crate::connection::Client;
use crate::context::Context;
use crate::error::Result;

/// Command path of the liveness check.
pub const HEART_BEAT: &str = "system/heart_beat";

/// View over a [`Client`] exposing `system/*` commands
#[derive(Debug, Clone, Copy)]
pub struct System<'a> {
    client: &'a Client,
}

impl<'a> System<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Send a heartbeat to the device.
    ///
    /// Succeeds only if the device acknowledges with a success result.
    pub async fn heartbeat(&self, ctx: &Context) -> Result<()> {
        self.client.query(ctx, HEART_BEAT).await?.ensure_success()
    }
}
