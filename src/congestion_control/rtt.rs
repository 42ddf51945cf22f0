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

use std::cmp;
use std::time::Duration;

use crate::TIMER_GRANULARITY;

/// Max number of doublings applied to the retransmission timeout.
const MAX_BACKOFF_SHIFT: u32 = 16;

/// RTT estimation for a flow, computed from the sender's send and ack times.
/// See RFC 9002 Section 5
#[derive(Debug)]
pub struct RttEstimator {
    /// The most recent RTT sample.
    latest_rtt: Duration,

    /// The smoothed RTT of the flow is an exponentially weighted moving
    /// average of the RTT samples
    smoothed_rtt: Option<Duration>,

    /// The RTT variance estimates the variation in the RTT samples using a
    /// mean variation
    rttvar: Duration,

    /// The minimum RTT observed on the flow.
    min_rtt: Duration,
}

impl RttEstimator {
    pub fn new(initial_rtt: Duration) -> Self {
        Self {
            latest_rtt: initial_rtt,
            smoothed_rtt: None,
            rttvar: initial_rtt / 2,
            min_rtt: initial_rtt,
        }
    }

    /// Return the current best RTT estimation.
    pub fn smoothed_rtt(&self) -> Duration {
        self.smoothed_rtt.unwrap_or(self.latest_rtt)
    }

    /// Return the latest rtt sample
    pub fn latest_rtt(&self) -> Duration {
        self.latest_rtt
    }

    /// Return the Minimum RTT observed so far for this estimator.
    pub fn min_rtt(&self) -> Duration {
        self.min_rtt
    }

    /// Return the variation in the RTT samples using a mean variation.
    pub fn rttvar(&self) -> Duration {
        self.rttvar
    }

    /// Whether a real RTT sample has been recorded.
    pub fn has_sample(&self) -> bool {
        self.smoothed_rtt.is_some()
    }

    /// Return the retransmission timeout before backoff.
    pub fn rto_base(&self) -> Duration {
        self.smoothed_rtt() + cmp::max(4 * self.rttvar, TIMER_GRANULARITY)
    }

    /// Return the retransmission timeout doubled `backoff` times.
    pub fn rto(&self, backoff: u32) -> Duration {
        self.rto_base()
            .saturating_mul(1_u32 << cmp::min(backoff, MAX_BACKOFF_SHIFT))
    }

    /// Update estimator with the given RTT sample
    pub fn update(&mut self, rtt: Duration) {
        self.latest_rtt = rtt;

        if let Some(smoothed_rtt) = self.smoothed_rtt {
            self.min_rtt = cmp::min(self.min_rtt, rtt);

            let var_sample = if smoothed_rtt > rtt {
                smoothed_rtt - rtt
            } else {
                rtt - smoothed_rtt
            };

            self.rttvar = (3 * self.rttvar + var_sample) / 4;
            self.smoothed_rtt = Some((7 * smoothed_rtt + rtt) / 8);
        } else {
            self.smoothed_rtt = Some(rtt);
            self.rttvar = rtt / 2;
            self.min_rtt = rtt;
        }
    }
}
