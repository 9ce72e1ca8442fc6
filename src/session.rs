//! Application session state
//!
//! One `Session` is created at startup and owned by the UI. It holds the
//! amplitude tracker, the latest decoded record, the bridge subprocess and
//! the consumer end of its line queue.

use std::time::Duration;

use crate::amplitude::{AmplitudeTracker, ChannelSet};
use crate::bridge::{Bridge, BridgeChannel, BridgeConfig};
use crate::protocol::{self, GestureRecord};

/// Lifecycle of the bridge as seen from the UI
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BridgeStatus {
    /// No bridge attached yet
    Idle,
    /// Lines may still arrive
    Running,
    /// The bridge stopped sending data
    Stopped,
    /// The bridge could not be started
    Failed(String),
}

/// What one poll tick did
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PollSummary {
    /// Records decoded and applied
    pub records: usize,
    /// Lines dropped by the codec
    pub malformed: usize,
    /// Channels whose maximum opening moved this tick
    pub updated: ChannelSet,
}

/// Running totals since startup
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub records: u64,
    pub malformed: u64,
}

pub struct Session {
    tracker: AmplitudeTracker,
    latest: Option<GestureRecord>,
    channel: Option<BridgeChannel>,
    bridge: Option<Bridge>,
    status: BridgeStatus,
    stats: SessionStats,
}

impl Session {
    pub fn new() -> Self {
        Self {
            tracker: AmplitudeTracker::new(),
            latest: None,
            channel: None,
            bridge: None,
            status: BridgeStatus::Idle,
            stats: SessionStats::default(),
        }
    }

    /// Spawn the bridge and start consuming its output.
    ///
    /// A bridge that fails to start is logged and leaves the session in a
    /// degraded state: the UI keeps working, it just never gets data.
    pub fn start_bridge(&mut self, config: &BridgeConfig, shutdown_timeout: Duration) {
        match Bridge::start(config) {
            Ok((mut bridge, channel)) => {
                bridge.set_shutdown_timeout(shutdown_timeout);
                self.bridge = Some(bridge);
                self.attach(channel);
            }
            Err(e) => {
                log::error!("{}", e);
                log::error!(
                    "Make sure the glove bridge is built and the path is correct. Running without live data."
                );
                self.status = BridgeStatus::Failed(e.to_string());
            }
        }
    }

    /// Consume lines from an already-connected channel.
    pub fn attach(&mut self, channel: BridgeChannel) {
        self.channel = Some(channel);
        self.status = BridgeStatus::Running;
    }

    /// Drain every queued line and apply it, in arrival order.
    ///
    /// Never blocks: with nothing queued this returns an empty summary.
    pub fn poll(&mut self) -> PollSummary {
        let mut summary = PollSummary::default();
        let Some(channel) = self.channel.as_mut() else {
            return summary;
        };

        for line in channel.drain() {
            match protocol::parse_line(&line) {
                Some(record) => {
                    summary.updated = summary.updated.union(self.tracker.update(&record.reading));
                    self.latest = Some(record);
                    summary.records += 1;
                }
                None => summary.malformed += 1,
            }
        }

        if channel.is_closed() && self.status == BridgeStatus::Running {
            log::warn!("Glove bridge disconnected; keeping the last received values on screen");
            self.status = BridgeStatus::Stopped;
        }

        self.stats.records += summary.records as u64;
        self.stats.malformed += summary.malformed as u64;
        summary
    }

    /// Operator-triggered start of a new opening session
    pub fn reset_amplitude(&mut self) {
        self.tracker.reset();
    }

    pub fn tracker(&self) -> &AmplitudeTracker {
        &self.tracker
    }

    /// The most recent valid record, if any arrived yet
    pub fn latest(&self) -> Option<&GestureRecord> {
        self.latest.as_ref()
    }

    pub fn status(&self) -> &BridgeStatus {
        &self.status
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Stop the bridge subprocess, if one is running.
    pub fn shutdown(&mut self) {
        if let Some(mut bridge) = self.bridge.take() {
            log::info!("Closing application, shutting down the glove bridge...");
            bridge.shutdown();
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
