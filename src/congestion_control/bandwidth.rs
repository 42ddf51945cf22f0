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

//! Delivery rate over a trailing time window.
//!
//! The estimator keeps the arrival timestamps of the last `W` milliseconds
//! and reports
//!
//! ```text
//! rate = (count - 1) / ((last - first) / 1000)   samples per second
//! ```
//!
//! An estimate needs at least two samples spanning a non-zero interval.

use std::collections::VecDeque;

/// Bandwidth estimator.
#[derive(Debug)]
pub struct BandwidthEstimator {
    /// Trailing window length in milliseconds.
    window_ms: u64,

    /// Arrival timestamps in non-decreasing order.
    arrivals: VecDeque<u64>,
}

impl BandwidthEstimator {
    pub fn new(window_ms: u64) -> Self {
        Self {
            window_ms,
            arrivals: VecDeque::new(),
        }
    }

    /// Record an arrival. Timestamps older than the newest one are dropped.
    pub fn on_arrival(&mut self, time: u64) {
        if self.arrivals.back().map_or(false, |&last| time < last) {
            return;
        }

        self.arrivals.push_back(time);
        self.trim(time);
    }

    /// Return the delivery rate in samples per second, or None if the window
    /// holds less than two distinct timestamps.
    pub fn estimate(&mut self, now: u64) -> Option<f64> {
        self.trim(now);

        if self.arrivals.len() < 2 {
            return None;
        }

        let first = *self.arrivals.front()?;
        let last = *self.arrivals.back()?;
        if last <= first {
            return None;
        }

        let span_secs = (last - first) as f64 / 1000.0;
        Some((self.arrivals.len() - 1) as f64 / span_secs)
    }

    /// Return the delivery rate in bits per second for datagrams of
    /// `payload_size` bytes.
    pub fn estimate_bps(&mut self, now: u64, payload_size: usize) -> Option<f64> {
        self.estimate(now).map(|rate| rate * payload_size as f64 * 8.0)
    }

    /// Number of retained arrivals.
    pub fn len(&self) -> usize {
        self.arrivals.len()
    }

    /// Whether the window is empty.
    pub fn is_empty(&self) -> bool {
        self.arrivals.is_empty()
    }

    /// Drop arrivals older than `now - W`.
    fn trim(&mut self, now: u64) {
        let horizon = now.saturating_sub(self.window_ms);
        while self.arrivals.front().map_or(false, |&t| t < horizon) {
            self.arrivals.pop_front();
        }
    }

    #[cfg(test)]
    fn oldest(&self) -> Option<u64> {
        self.arrivals.front().copied()
    }
}
