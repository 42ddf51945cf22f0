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

use core::str::FromStr;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::Config;
use crate::Error;
use crate::Result;
pub use bandwidth::BandwidthEstimator;
pub use burst::BurstAggregator;
pub use burst::BurstOutcome;
pub use burst::PacketSnapshot;
pub use burst::TimingSample;
pub use delay_gradient::DelayGradient;
pub use delay_gradient::DelayGradientConfig;
pub use fixed::Fixed;
pub use gradient::GradientEstimator;
pub use rtt::RttEstimator;
pub use state::ControlState;
pub use state::Signal;

/// Available congestion control algorithm
#[repr(C)]
#[derive(Eq, PartialEq, Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CongestionControlAlgorithm {
    /// DelayGradient reacts to the smoothed trend of the one-way queueing
    /// delay. A three-state machine with hysteresis grows the controlled
    /// quantity multiplicatively and, on overuse, converges it to the
    /// measured delivery rate.
    #[default]
    DelayGradient,

    /// Fixed keeps a static window and sending rate. It is intended to be
    /// used as a baseline for experiments.
    Fixed,
}

impl FromStr for CongestionControlAlgorithm {
    type Err = Error;

    fn from_str(algor: &str) -> Result<CongestionControlAlgorithm> {
        if algor.eq_ignore_ascii_case("delay_gradient") || algor.eq_ignore_ascii_case("gradient")
        {
            Ok(CongestionControlAlgorithm::DelayGradient)
        } else if algor.eq_ignore_ascii_case("fixed") {
            Ok(CongestionControlAlgorithm::Fixed)
        } else {
            Err(Error::InvalidConfig("unknown".into()))
        }
    }
}

/// The quantity a controller mutates on every control tick.
///
/// Only one of them is authoritative for a flow. The other output of the
/// controller is derived from it using the smoothed rtt and payload size.
#[repr(C)]
#[derive(Eq, PartialEq, Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlMode {
    /// Number of datagrams allowed to be outstanding.
    #[default]
    Window,

    /// Pacing rate in bits per second.
    Rate,
}

impl FromStr for ControlMode {
    type Err = Error;

    fn from_str(mode: &str) -> Result<ControlMode> {
        if mode.eq_ignore_ascii_case("window") {
            Ok(ControlMode::Window)
        } else if mode.eq_ignore_ascii_case("rate") {
            Ok(ControlMode::Rate)
        } else {
            Err(Error::InvalidConfig("unknown".into()))
        }
    }
}

/// An acknowledgement as reported by the transport.
///
/// `send_time` and `ack_time` are on the sender's clock, `recv_time` is on
/// the receiver's clock. All values are in milliseconds. The two clocks are
/// never compared with each other.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AckEvent {
    /// Sequence number of the acknowledged datagram.
    pub sequence: u64,

    /// When the acknowledged datagram was sent (sender's clock).
    pub send_time: u64,

    /// When the acknowledged datagram was received (receiver's clock).
    pub recv_time: u64,

    /// When the ack was received (sender's clock).
    pub ack_time: u64,
}

/// Congestion control statistics.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CongestionStats {
    /// Total datagrams sent.
    pub datagrams_sent: u64,

    /// Total acks received.
    pub acks_received: u64,

    /// Timing samples forwarded to the gradient estimator.
    pub samples_forwarded: u64,

    /// Timing samples coalesced into a burst.
    pub samples_coalesced: u64,

    /// Timing samples discarded as out of order.
    pub samples_discarded: u64,

    /// Retransmission timeouts.
    pub timeouts: u64,

    /// Control ticks processed.
    pub ticks: u64,

    /// Control state changes.
    pub state_changes: u64,
}

/// Congestion control interfaces shared by different algorithms.
///
/// All callbacks are synchronous and never block. Implementations never
/// return errors from these callbacks; invalid input is neutralized.
pub trait CongestionController {
    /// Name of congestion control algorithm.
    fn name(&self) -> &str;

    /// Callback after a datagram was sent out.
    fn on_sent(&mut self, sequence: u64, send_time: u64);

    /// Callback for processing an ack.
    fn on_ack(&mut self, ack: &AckEvent);

    /// Callback when no ack arrived within the retransmission timeout.
    fn on_timeout(&mut self) {}

    /// Callback of the periodic control tick. `now` is on the sender's clock.
    fn on_tick(&mut self, now: u64) {}

    /// Current congestion window in datagrams, at least one.
    fn congestion_window(&self) -> u64;

    /// Current sending rate in bits per second.
    fn send_rate(&self) -> u64;

    /// Duration in milliseconds to wait before declaring the oldest
    /// outstanding datagram lost.
    fn timeout_ms(&self) -> u64;

    /// Initial congestion window.
    fn initial_window(&self) -> u64;

    /// Minimal congestion window.
    fn minimal_window(&self) -> u64;

    /// Congestion stats.
    fn stats(&self) -> &CongestionStats;
}

impl fmt::Debug for dyn CongestionController + Send {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "congestion controller {}.", self.name())
    }
}

/// Build a congestion controller.
pub fn build_congestion_controller(conf: &Config) -> Box<dyn CongestionController + Send> {
    match conf.congestion_control_algorithm {
        CongestionControlAlgorithm::DelayGradient => {
            Box::new(DelayGradient::new(DelayGradientConfig::from(conf)))
        }
        CongestionControlAlgorithm::Fixed => Box::new(Fixed::new(
            conf.initial_window,
            conf.initial_send_rate,
            conf.initial_timeout_ms,
        )),
    }
}


mod bandwidth;
mod burst;
mod delay_gradient;
mod fixed;
mod gradient;
mod rtt;
mod state;
