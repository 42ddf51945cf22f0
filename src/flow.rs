// Copyright (c) 2023 The TQUIC Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::sync::Arc;
use std::time::Duration;

use log::*;
use parking_lot::Mutex;

use crate::congestion_control::build_congestion_controller;
use crate::congestion_control::AckEvent;
use crate::congestion_control::CongestionController;
use crate::congestion_control::CongestionStats;
use crate::ticker::Ticker;
use crate::time::MonotonicClock;
use crate::time::TimeSource;
use crate::Config;
use crate::Error;
use crate::Result;

type SharedController = Arc<Mutex<Box<dyn CongestionController + Send>>>;

/// Congestion control of a single flow.
///
/// The transport reports sent datagrams, acks and timeouts; a ticker task
/// started by `start()` drives the periodic control decision. Both paths
/// go through one mutex, so the estimators are never observed half updated.
/// Queries never block on anything but that mutex.
pub struct FlowController {
    /// The congestion controller shared with the ticker.
    cc: SharedController,

    /// Sender clock used for control ticks.
    clock: Arc<dyn TimeSource>,

    /// Period of the control tick.
    tick_interval: Duration,

    /// The running ticker, if started.
    ticker: Option<Ticker>,
}

impl FlowController {
    /// Create a flow controller using a monotonic clock.
    pub fn new(conf: &Config) -> Result<Self> {
        Self::with_clock(conf, Arc::new(MonotonicClock::new()))
    }

    /// Create a flow controller reading tick times from `clock`.
    ///
    /// The clock must be the one the transport uses for send and ack
    /// timestamps.
    pub fn with_clock(conf: &Config, clock: Arc<dyn TimeSource>) -> Result<Self> {
        conf.validate()?;

        let cc = build_congestion_controller(conf);
        debug!("flow created with {:?}", cc);

        Ok(FlowController {
            cc: Arc::new(Mutex::new(cc)),
            clock,
            tick_interval: conf.tick_interval(),
            ticker: None,
        })
    }

    /// Start the periodic control tick on the current tokio runtime.
    pub fn start(&mut self) -> Result<()> {
        if self.ticker.as_ref().map_or(false, |t| t.is_running()) {
            return Err(Error::InvalidState("flow already started".into()));
        }

        let cc = self.cc.clone();
        let clock = self.clock.clone();
        let ticker = Ticker::spawn(self.tick_interval, move || {
            let now = clock.now_ms();
            cc.lock().on_tick(now);
        })?;

        self.ticker = Some(ticker);
        Ok(())
    }

    /// Whether the control ticker is running.
    pub fn is_started(&self) -> bool {
        self.ticker.as_ref().map_or(false, |t| t.is_running())
    }

    /// Current time on the sender clock in milliseconds.
    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Record a sent datagram.
    pub fn on_datagram_sent(&self, sequence: u64, send_time: u64) {
        self.cc.lock().on_sent(sequence, send_time);
    }

    /// Process an ack. `send_time` and `ack_time` are on the sender clock,
    /// `recv_time` on the receiver clock.
    pub fn on_ack_received(&self, sequence: u64, send_time: u64, recv_time: u64, ack_time: u64) {
        let ack = AckEvent {
            sequence,
            send_time,
            recv_time,
            ack_time,
        };
        self.cc.lock().on_ack(&ack);
    }

    /// Report that no ack arrived within `next_timeout_ms()`.
    pub fn on_timeout(&self) {
        self.cc.lock().on_timeout();
    }

    /// Run one control decision at the current clock time.
    ///
    /// This is what the ticker does every period. It may also be called
    /// directly by transports that drive their own timers.
    pub fn on_tick(&self) {
        let now = self.clock.now_ms();
        self.cc.lock().on_tick(now);
    }

    /// Number of datagrams allowed to be outstanding, at least one.
    pub fn current_window(&self) -> u64 {
        self.cc.lock().congestion_window().max(1)
    }

    /// Pacing rate in bits per second.
    pub fn current_send_rate(&self) -> u64 {
        self.cc.lock().send_rate()
    }

    /// Milliseconds to wait for an ack before calling `on_timeout()`.
    pub fn next_timeout_ms(&self) -> u64 {
        self.cc.lock().timeout_ms().max(1)
    }

    /// Name of the congestion control algorithm.
    pub fn algorithm(&self) -> String {
        self.cc.lock().name().to_string()
    }

    /// Snapshot of the congestion control statistics.
    pub fn stats(&self) -> CongestionStats {
        self.cc.lock().stats().clone()
    }

    /// Stop the ticker and wait for it to exit.
    pub async fn shutdown(mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.stop().await;
        }
        debug!("flow shut down, stats {:?}", self.stats());
    }
}

impl std::fmt::Debug for FlowController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowController")
            .field("cc", &self.algorithm())
            .field("tick_interval", &self.tick_interval)
            .field("started", &self.is_started())
            .finish()
    }
}
