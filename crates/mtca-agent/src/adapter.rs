// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! SHDR adapter client.
//!
//! The agent dials out to each configured adapter, reads newline-terminated
//! SHDR and feeds it to the agent facade. Connections are retried forever
//! with a fixed interval; the data plane sees UNAVAILABLE values (from
//! registration seeding) until the first line arrives.

use mtca::Agent;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

/// One adapter connection, pinned to a device uuid.
pub struct AdapterClient {
    address: String,
    device_uuid: String,
    reconnect_interval: Duration,
}

impl AdapterClient {
    pub fn new(
        address: impl Into<String>,
        device_uuid: impl Into<String>,
        reconnect_interval: Duration,
    ) -> Self {
        Self {
            address: address.into(),
            device_uuid: device_uuid.into(),
            reconnect_interval,
        }
    }

    /// Connect-read-reconnect loop. Runs until the process exits.
    pub async fn run(self, agent: Arc<Agent>) {
        loop {
            match TcpStream::connect(&self.address).await {
                Ok(stream) => {
                    info!(
                        "adapter {} connected for device {}",
                        self.address, self.device_uuid
                    );
                    self.read_lines(stream, &agent).await;
                    warn!(
                        "adapter {} disconnected, retrying in {:?}",
                        self.address, self.reconnect_interval
                    );
                }
                Err(err) => {
                    warn!(
                        "adapter {} unreachable ({err}), retrying in {:?}",
                        self.address, self.reconnect_interval
                    );
                }
            }
            tokio::time::sleep(self.reconnect_interval).await;
        }
    }

    async fn read_lines(&self, stream: TcpStream, agent: &Agent) {
        let reader = BufReader::new(stream);
        let mut lines = reader.lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    ingest_line(agent, &self.device_uuid, &line);
                }
                Ok(None) => return, // EOF
                Err(err) => {
                    warn!("adapter {} read error: {err}", self.address);
                    return;
                }
            }
        }
    }
}

/// Feed one raw adapter line into the agent. Protocol chatter (`* PONG`,
/// blank lines) is dropped here. Returns whether the line was handed to the
/// data plane.
pub fn ingest_line(agent: &Agent, device_uuid: &str, line: &str) -> bool {
    let line = line.trim();
    if line.is_empty() {
        return false;
    }
    if let Some(chatter) = line.strip_prefix('*') {
        debug!("adapter protocol line for {device_uuid}: {}", chatter.trim());
        return false;
    }
    agent.ingest_line(device_uuid, line);
    true
}
