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

//! Grouping of acks into timing samples.
//!
//! For two consecutive accepted samples the relative inter-arrival time is
//!
//! ```text
//! relative = (recv_i - recv_{i-1}) - (send_i - send_{i-1})
//! ```
//!
//! Each bracket is a difference within a single clock, so the receiver and
//! sender clocks never need to be synchronized. The running sum of the
//! relative inter-arrival times is the one-way delay variation of the path.
//!
//! Acks whose receive times are closer than the burst threshold and which
//! arrived earlier than their send spacing predicts belong to the same burst;
//! they update the snapshot and the delay variation without producing a
//! timing sample, so the next forwarded sample carries the delay change
//! of the whole burst.

/// The most recent accepted sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacketSnapshot {
    /// Send time on the sender's clock.
    pub send_time: u64,

    /// Receive time on the receiver's clock.
    pub recv_time: u64,
}

/// A timing sample forwarded to the gradient estimator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingSample {
    /// Accumulated one-way delay variation in milliseconds.
    pub delay_variation: f64,

    /// Receiver-side spacing to the previous accepted sample.
    pub elapsed_ms: u64,
}

/// Outcome of feeding a sample to the aggregator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BurstOutcome {
    /// The sample became the first snapshot.
    First,

    /// The sample was merged into the current burst.
    Coalesced,

    /// The sample closes a burst and carries a timing sample.
    Forward(TimingSample),

    /// The sample was out of order and has been dropped.
    Discarded,
}

/// Burst aggregator.
#[derive(Debug)]
pub struct BurstAggregator {
    /// Receive times closer than this may be coalesced.
    threshold_ms: u64,

    /// Most recent accepted sample.
    snapshot: Option<PacketSnapshot>,

    /// Sum of the relative inter-arrival times of all accepted samples.
    delay_variation: i64,
}

impl BurstAggregator {
    pub fn new(threshold_ms: u64) -> Self {
        Self {
            threshold_ms,
            snapshot: None,
            delay_variation: 0,
        }
    }

    /// Feed an acknowledged datagram's send and receive time.
    pub fn on_sample(&mut self, send_time: u64, recv_time: u64) -> BurstOutcome {
        let prev = match self.snapshot {
            Some(prev) => prev,
            None => {
                self.snapshot = Some(PacketSnapshot {
                    send_time,
                    recv_time,
                });
                return BurstOutcome::First;
            }
        };

        if recv_time < prev.recv_time || send_time < prev.send_time {
            return BurstOutcome::Discarded;
        }

        let recv_delta = recv_time - prev.recv_time;
        let send_delta = send_time - prev.send_time;
        let relative = Self::signed(recv_delta).saturating_sub(Self::signed(send_delta));

        self.snapshot = Some(PacketSnapshot {
            send_time,
            recv_time,
        });

        self.delay_variation = self.delay_variation.saturating_add(relative);

        if recv_delta < self.threshold_ms && relative < 0 {
            return BurstOutcome::Coalesced;
        }

        BurstOutcome::Forward(TimingSample {
            delay_variation: self.delay_variation as f64,
            elapsed_ms: recv_delta,
        })
    }

    /// Forget the snapshot so that stale timing data is not compared with the
    /// next sample. The accumulated delay variation is kept.
    pub fn reset(&mut self) {
        self.snapshot = None;
    }

    /// Return the most recent accepted sample.
    pub fn snapshot(&self) -> Option<PacketSnapshot> {
        self.snapshot
    }

    /// Return the accumulated one-way delay variation in milliseconds.
    pub fn delay_variation(&self) -> i64 {
        self.delay_variation
    }

    fn signed(v: u64) -> i64 {
        i64::try_from(v).unwrap_or(i64::MAX)
    }
}
