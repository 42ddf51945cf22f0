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

#![allow(unused_variables)]

use log::*;

use super::AckEvent;
use super::CongestionController;
use super::CongestionStats;

/// Fixed is a simple congestion controller with a static window and rate.
/// It is intended to be used for testing and experiments.
#[derive(Debug)]
pub struct Fixed {
    /// Congestion window in datagrams.
    cwnd: u64,

    /// Sending rate in bits per second.
    rate: u64,

    /// Retransmission timeout in milliseconds.
    timeout: u64,

    /// Congestion statistics.
    stats: CongestionStats,
}

impl Fixed {
    pub fn new(cwnd: u64, rate: u64, timeout: u64) -> Self {
        Self {
            cwnd: cwnd.max(1),
            rate,
            timeout: timeout.max(1),
            stats: Default::default(),
        }
    }
}

impl CongestionController for Fixed {
    fn name(&self) -> &str {
        "FIXED"
    }

    fn on_sent(&mut self, sequence: u64, send_time: u64) {
        self.stats.datagrams_sent = self.stats.datagrams_sent.saturating_add(1);
        trace!("{}. sent datagram {} at {}", self.name(), sequence, send_time);
    }

    fn on_ack(&mut self, ack: &AckEvent) {
        self.stats.acks_received = self.stats.acks_received.saturating_add(1);
    }

    fn on_timeout(&mut self) {
        self.stats.timeouts = self.stats.timeouts.saturating_add(1);
    }

    fn on_tick(&mut self, now: u64) {
        self.stats.ticks = self.stats.ticks.saturating_add(1);
    }

    fn congestion_window(&self) -> u64 {
        self.cwnd
    }

    fn send_rate(&self) -> u64 {
        self.rate
    }

    fn timeout_ms(&self) -> u64 {
        self.timeout
    }

    fn initial_window(&self) -> u64 {
        self.cwnd
    }

    fn minimal_window(&self) -> u64 {
        self.cwnd
    }

    fn stats(&self) -> &CongestionStats {
        &self.stats
    }
}
