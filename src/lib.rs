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

//! GRADCC is a per-flow delay-gradient congestion controller.
//!
//! It consumes acknowledgement events carrying a send timestamp (sender's
//! clock), a receive timestamp (receiver's clock) and an ack-arrival
//! timestamp (sender's clock), and decides how many datagrams may be
//! outstanding and at what rate the sender should pace.
//!
//! ## Design
//!
//! * **Delay based**: the controller reacts to the trend of the one-way queueing
//!   delay, measured as the change in relative inter-arrival times, instead of
//!   waiting for loss.
//! * **Hysteresis**: a three-state machine (Increase, Hold, Decrease) keeps the
//!   controlled quantity from oscillating. Leaving Decrease always passes
//!   through Hold.
//! * **Delivery-rate aware**: decreases converge on the measured delivery rate
//!   rather than a fraction of the previous sending rate.
//! * **Two triggers, one lock**: acks and a periodic ticker mutate the same
//!   state through a single mutex held by [`FlowController`].
//!
//! ## Get started
//!
//! ```no_run
//! # async fn run() -> gradcc::Result<()> {
//! let mut conf = gradcc::Config::new();
//! conf.set_tick_interval(20);
//!
//! let mut flow = gradcc::FlowController::new(&conf)?;
//! flow.start()?;
//!
//! let now = flow.now_ms();
//! flow.on_datagram_sent(0, now);
//! flow.on_ack_received(0, now, 1_000, now + 40);
//! let _window = flow.current_window();
//!
//! flow.shutdown().await;
//! # Ok(())
//! # }
//! ```

use std::cmp;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

/// Result type for controller operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Default datagram payload size in bytes.
pub const DEFAULT_PAYLOAD_SIZE: usize = 1500;

/// The timer granularity used for timeout computation.
pub const TIMER_GRANULARITY: Duration = Duration::from_millis(1);

/// The initial rtt, used before real rtt is estimated.
const INITIAL_RTT: Duration = Duration::from_millis(100);

/// The retransmission timeout used before any rtt sample arrives.
const INITIAL_TIMEOUT: Duration = Duration::from_secs(1);

/// Lower limit of the retransmission timeout.
const MIN_TIMEOUT: Duration = Duration::from_millis(100);

/// Upper limit of the retransmission timeout.
const MAX_TIMEOUT: Duration = Duration::from_secs(60);

/// Default control tick interval.
const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(20);

/// Default sending rate before any measurement, in bits per second.
const DEFAULT_INITIAL_SEND_RATE: u64 = 3_000_000;

/// Configurations about a controlled flow.
///
/// All values are externally settable; none of the controller constants are
/// hard coded. Time values are in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The congestion control algorithm used for a flow.
    pub(crate) congestion_control_algorithm: CongestionControlAlgorithm,

    /// The primary quantity the controller mutates.
    pub(crate) control_mode: ControlMode,

    /// Smoothing factor of the delay gradient EWMA.
    pub(crate) ewma_alpha: f64,

    /// Gradient threshold separating overuse and underuse from normal.
    pub(crate) gradient_threshold: f64,

    /// Acks whose receive times are closer than this are coalesced into
    /// a burst.
    pub(crate) burst_threshold_ms: u64,

    /// Length of the trailing window of the bandwidth estimator.
    pub(crate) bandwidth_window_ms: u64,

    /// Multiplicative growth cap per second in Increase state.
    pub(crate) increase_growth_rate: f64,

    /// Fraction of the delivery rate to converge on in Decrease state.
    pub(crate) decrease_factor: f64,

    /// Multiplicative shrink applied on a retransmission timeout.
    pub(crate) timeout_decrease_factor: f64,

    /// Interval of the periodic control tick.
    pub(crate) tick_interval_ms: u64,

    /// The initial congestion window in datagrams.
    pub(crate) initial_window: u64,

    /// The minimal congestion window in datagrams.
    pub(crate) min_window: u64,

    /// The maximal congestion window in datagrams.
    pub(crate) max_window: u64,

    /// The initial sending rate in bits per second.
    pub(crate) initial_send_rate: u64,

    /// The minimal sending rate in bits per second.
    pub(crate) min_send_rate: u64,

    /// The maximal sending rate in bits per second.
    pub(crate) max_send_rate: u64,

    /// Datagram payload size in bytes, used to convert sample rates to bits.
    pub(crate) payload_size: usize,

    /// The initial rtt, used before real rtt is estimated.
    pub(crate) initial_rtt_ms: u64,

    /// The retransmission timeout used before any rtt sample.
    pub(crate) initial_timeout_ms: u64,

    /// Lower limit of the retransmission timeout.
    pub(crate) min_timeout_ms: u64,

    /// Upper limit of the retransmission timeout.
    pub(crate) max_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            congestion_control_algorithm: CongestionControlAlgorithm::DelayGradient,
            control_mode: ControlMode::Window,
            ewma_alpha: 0.15,
            gradient_threshold: 0.25,
            burst_threshold_ms: 5,
            bandwidth_window_ms: 500,
            increase_growth_rate: 1.25,
            decrease_factor: 0.85,
            timeout_decrease_factor: 0.5,
            tick_interval_ms: DEFAULT_TICK_INTERVAL.as_millis() as u64,
            initial_window: 10,
            min_window: 1,
            max_window: 10_000,
            initial_send_rate: DEFAULT_INITIAL_SEND_RATE,
            min_send_rate: 100_000,
            max_send_rate: 10_000_000_000,
            payload_size: DEFAULT_PAYLOAD_SIZE,
            initial_rtt_ms: INITIAL_RTT.as_millis() as u64,
            initial_timeout_ms: INITIAL_TIMEOUT.as_millis() as u64,
            min_timeout_ms: MIN_TIMEOUT.as_millis() as u64,
            max_timeout_ms: MAX_TIMEOUT.as_millis() as u64,
        }
    }
}

impl Config {
    /// Create default configuration.
    ///
    /// The configuration may be customized by calling related set methods.
    ///
    /// ## Examples:
    ///
    /// ```
    /// let mut conf = gradcc::Config::new();
    /// conf.set_control_mode(gradcc::ControlMode::Rate);
    /// conf.set_decrease_factor(0.9);
    /// conf.validate()?;
    /// # Ok::<(), gradcc::error::Error>(())
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration from a JSON document. Missing fields take their
    /// default values.
    pub fn from_json(json: &str) -> Result<Self> {
        let conf: Config =
            serde_json::from_str(json).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        conf.validate()?;
        Ok(conf)
    }

    /// Set congestion control algorithm that the flow would use.
    /// The default value is DelayGradient.
    pub fn set_congestion_control_algorithm(&mut self, cca: CongestionControlAlgorithm) {
        self.congestion_control_algorithm = cca;
    }

    /// Set the quantity the controller mutates. The other output is derived.
    /// The default value is Window.
    pub fn set_control_mode(&mut self, mode: ControlMode) {
        self.control_mode = mode;
    }

    /// Set the smoothing factor of the delay gradient, in (0, 1].
    /// The default value is 0.15.
    pub fn set_ewma_alpha(&mut self, v: f64) {
        self.ewma_alpha = v;
    }

    /// Set the overuse/underuse threshold of the smoothed gradient.
    /// The default value is 0.25.
    pub fn set_gradient_threshold(&mut self, v: f64) {
        self.gradient_threshold = v;
    }

    /// Set the burst coalescing interval in milliseconds.
    /// The default value is 5.
    pub fn set_burst_threshold(&mut self, millis: u64) {
        self.burst_threshold_ms = millis;
    }

    /// Set the length of the bandwidth estimation window in milliseconds.
    /// The default value is 500.
    pub fn set_bandwidth_window(&mut self, millis: u64) {
        self.bandwidth_window_ms = cmp::max(millis, 1);
    }

    /// Set the multiplicative growth cap per second in Increase state.
    /// The default value is 1.25.
    pub fn set_increase_growth_rate(&mut self, v: f64) {
        self.increase_growth_rate = v;
    }

    /// Set the fraction of the delivery rate used in Decrease state.
    /// The default value is 0.85.
    pub fn set_decrease_factor(&mut self, v: f64) {
        self.decrease_factor = v;
    }

    /// Set the multiplicative shrink applied on a retransmission timeout.
    /// The default value is 0.5.
    pub fn set_timeout_decrease_factor(&mut self, v: f64) {
        self.timeout_decrease_factor = v;
    }

    /// Set the control tick interval in milliseconds.
    /// The default value is 20.
    pub fn set_tick_interval(&mut self, millis: u64) {
        self.tick_interval_ms = cmp::max(millis, TIMER_GRANULARITY.as_millis() as u64);
    }

    /// Set the initial congestion window in datagrams.
    /// The default value is 10.
    pub fn set_initial_window(&mut self, packets: u64) {
        self.initial_window = packets;
    }

    /// Set the minimal congestion window in datagrams. Values below one are
    /// raised to one.
    /// The default value is 1.
    pub fn set_min_window(&mut self, packets: u64) {
        self.min_window = cmp::max(packets, 1);
    }

    /// Set the maximal congestion window in datagrams.
    /// The default value is 10000.
    pub fn set_max_window(&mut self, packets: u64) {
        self.max_window = packets;
    }

    /// Set the initial sending rate in bits per second.
    /// The default value is 3000000.
    pub fn set_initial_send_rate(&mut self, bps: u64) {
        self.initial_send_rate = bps;
    }

    /// Set the minimal sending rate in bits per second.
    /// The default value is 100000.
    pub fn set_min_send_rate(&mut self, bps: u64) {
        self.min_send_rate = bps;
    }

    /// Set the maximal sending rate in bits per second.
    /// The default value is 10000000000.
    pub fn set_max_send_rate(&mut self, bps: u64) {
        self.max_send_rate = bps;
    }

    /// Set the datagram payload size in bytes.
    /// The default value is 1500.
    pub fn set_payload_size(&mut self, bytes: usize) {
        self.payload_size = cmp::max(bytes, 1);
    }

    /// Set the initial RTT in milliseconds. The default value is 100ms.
    pub fn set_initial_rtt(&mut self, millis: u64) {
        self.initial_rtt_ms = cmp::max(millis, TIMER_GRANULARITY.as_millis() as u64);
    }

    /// Set the retransmission timeout used before any rtt sample, in
    /// milliseconds. The default value is 1000ms.
    pub fn set_initial_timeout(&mut self, millis: u64) {
        self.initial_timeout_ms = cmp::max(millis, TIMER_GRANULARITY.as_millis() as u64);
    }

    /// Set the lower limit of the retransmission timeout in milliseconds.
    /// The default value is 100ms.
    pub fn set_min_timeout(&mut self, millis: u64) {
        self.min_timeout_ms = cmp::max(millis, TIMER_GRANULARITY.as_millis() as u64);
    }

    /// Set the upper limit of the retransmission timeout in milliseconds.
    /// The default value is 60000ms.
    pub fn set_max_timeout(&mut self, millis: u64) {
        self.max_timeout_ms = cmp::max(millis, TIMER_GRANULARITY.as_millis() as u64);
    }

    /// Return the congestion control algorithm.
    pub fn congestion_control_algorithm(&self) -> CongestionControlAlgorithm {
        self.congestion_control_algorithm
    }

    /// Return the control mode.
    pub fn control_mode(&self) -> ControlMode {
        self.control_mode
    }

    /// Return the control tick interval.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Check that all values are usable by a controller.
    pub fn validate(&self) -> Result<()> {
        if !(self.ewma_alpha > 0.0 && self.ewma_alpha <= 1.0) {
            return Err(Error::InvalidConfig("ewma_alpha".into()));
        }
        if !(self.gradient_threshold.is_finite() && self.gradient_threshold > 0.0) {
            return Err(Error::InvalidConfig("gradient_threshold".into()));
        }
        if !(self.increase_growth_rate.is_finite() && self.increase_growth_rate >= 1.0) {
            return Err(Error::InvalidConfig("increase_growth_rate".into()));
        }
        if !(self.decrease_factor > 0.0 && self.decrease_factor <= 1.0) {
            return Err(Error::InvalidConfig("decrease_factor".into()));
        }
        if !(self.timeout_decrease_factor > 0.0 && self.timeout_decrease_factor <= 1.0) {
            return Err(Error::InvalidConfig("timeout_decrease_factor".into()));
        }
        if self.tick_interval_ms == 0 {
            return Err(Error::InvalidConfig("tick_interval_ms".into()));
        }
        if self.bandwidth_window_ms == 0 {
            return Err(Error::InvalidConfig("bandwidth_window_ms".into()));
        }
        if self.payload_size == 0 {
            return Err(Error::InvalidConfig("payload_size".into()));
        }
        if self.min_window == 0 || self.min_window > self.max_window {
            return Err(Error::InvalidConfig("min_window".into()));
        }
        if !(self.min_window..=self.max_window).contains(&self.initial_window) {
            return Err(Error::InvalidConfig("initial_window".into()));
        }
        if self.min_send_rate == 0 || self.min_send_rate > self.max_send_rate {
            return Err(Error::InvalidConfig("min_send_rate".into()));
        }
        if !(self.min_send_rate..=self.max_send_rate).contains(&self.initial_send_rate) {
            return Err(Error::InvalidConfig("initial_send_rate".into()));
        }
        if self.min_timeout_ms == 0 || self.min_timeout_ms > self.max_timeout_ms {
            return Err(Error::InvalidConfig("min_timeout_ms".into()));
        }
        if self.initial_rtt_ms == 0 || self.initial_timeout_ms == 0 {
            return Err(Error::InvalidConfig("initial_timeout_ms".into()));
        }

        Ok(())
    }
}


pub use crate::congestion_control::build_congestion_controller;
pub use crate::congestion_control::AckEvent;
pub use crate::congestion_control::CongestionControlAlgorithm;
pub use crate::congestion_control::CongestionController;
pub use crate::congestion_control::CongestionStats;
pub use crate::congestion_control::ControlMode;
pub use crate::congestion_control::ControlState;
pub use crate::congestion_control::DelayGradient;
pub use crate::congestion_control::Signal;
pub use crate::error::Error;
pub use crate::flow::FlowController;
pub use crate::ticker::Ticker;
pub use crate::time::MonotonicClock;
pub use crate::time::TimeSource;

#[path = "congestion_control/congestion_control.rs"]
pub mod congestion_control;

pub mod error;
mod flow;
mod ticker;
mod time;
