//! Online/offline signal for the offline banner.
//!
//! The monitor is purely informational: fetches are never gated or retried
//! on it, they simply fail fast when the network is gone.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::poll::PollMsg;

/// Platform-level reachability check.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn check(&self) -> bool;
}

/// Opens (and drops) a TCP connection to a well-known address.
pub struct TcpProbe {
    addr: String,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            timeout,
        }
    }
}

#[async_trait]
impl Probe for TcpProbe {
    async fn check(&self) -> bool {
        let connect = TcpStream::connect(&self.addr);
        matches!(timeout(self.timeout, connect).await, Ok(Ok(_)))
    }
}

/// Current connectivity as shown by the UI.  Starts online.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectivityState {
    online: bool,
}

impl Default for ConnectivityState {
    fn default() -> Self {
        Self { online: true }
    }
}

impl ConnectivityState {
    pub fn is_online(self) -> bool {
        self.online
    }

    pub fn is_offline(self) -> bool {
        !self.online
    }

    /// Record a transition; returns whether anything changed.
    pub fn apply(&mut self, online: bool) -> bool {
        let changed = self.online != online;
        self.online = online;
        changed
    }
}

/// Poll `probe` every `period` and report transitions only.
pub fn spawn(
    probe: Arc<dyn Probe>,
    period: Duration,
    tx: UnboundedSender<PollMsg>,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last = ConnectivityState::default();
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = ticker.tick() => {
                    let online = probe.check().await;
                    if last.apply(online) {
                        tracing::info!(online, "connectivity changed");
                        if tx.send(PollMsg::Connectivity(online)).is_err() {
                            return;
                        }
                    }
                }
            }
        }
    })
}
