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

//! Delay-gradient congestion control.
//!
//! Every ack feeds three estimators: the burst aggregator and the gradient
//! estimator track the trend of the one-way queueing delay, the bandwidth
//! estimator tracks the ack arrival rate and the rtt estimator tracks the
//! round trip time on the sender's clock.
//!
//! The controlled quantity only moves on control ticks. Each tick classifies
//! the smoothed gradient, advances the Increase/Hold/Decrease state machine
//! and then:
//!
//! * Increase: grows the quantity by `growth_rate ^ elapsed_seconds`.
//! * Decrease: sets the quantity to `decrease_factor` times the measured
//!   delivery rate (or the bandwidth-delay product in window mode), so the
//!   flow converges on what the path actually delivered.
//! * Hold: leaves the quantity alone.
//!
//! A retransmission timeout is handled as a stronger overuse signal: the
//! state is forced to Decrease and the quantity shrinks by a separate factor.

use std::time::Duration;

use log::*;

use super::AckEvent;
use super::BandwidthEstimator;
use super::BurstAggregator;
use super::BurstOutcome;
use super::CongestionController;
use super::CongestionStats;
use super::ControlMode;
use super::ControlState;
use super::GradientEstimator;
use super::RttEstimator;
use super::Signal;
use crate::Config;
use crate::TIMER_GRANULARITY;

/// DelayGradient configurable parameters.
#[derive(Debug, Clone)]
pub struct DelayGradientConfig {
    /// Which quantity is controlled.
    mode: ControlMode,

    /// Smoothing factor of the gradient.
    ewma_alpha: f64,

    /// Overuse/underuse threshold of the smoothed gradient.
    gradient_threshold: f64,

    /// Burst coalescing interval in milliseconds.
    burst_threshold_ms: u64,

    /// Bandwidth estimation window in milliseconds.
    bandwidth_window_ms: u64,

    /// Growth cap per second in Increase state.
    increase_growth_rate: f64,

    /// Fraction of the delivery rate used in Decrease state.
    decrease_factor: f64,

    /// Shrink factor on timeout.
    timeout_decrease_factor: f64,

    /// Nominal tick interval in milliseconds, used for the first tick.
    tick_interval_ms: u64,

    /// Window bounds in datagrams.
    initial_window: u64,
    min_window: u64,
    max_window: u64,

    /// Rate bounds in bits per second.
    initial_send_rate: u64,
    min_send_rate: u64,
    max_send_rate: u64,

    /// Datagram payload size in bytes.
    payload_size: usize,

    /// Initial smoothed rtt.
    initial_rtt: Duration,

    /// Retransmission timeout before any rtt sample, in milliseconds.
    initial_timeout_ms: u64,

    /// Retransmission timeout bounds in milliseconds.
    min_timeout_ms: u64,
    max_timeout_ms: u64,
}

impl From<&Config> for DelayGradientConfig {
    fn from(conf: &Config) -> Self {
        let min_window = conf.min_window.max(1);
        let min_send_rate = conf.min_send_rate.max(1);

        Self {
            mode: conf.control_mode,
            ewma_alpha: conf.ewma_alpha,
            gradient_threshold: conf.gradient_threshold,
            burst_threshold_ms: conf.burst_threshold_ms,
            bandwidth_window_ms: conf.bandwidth_window_ms,
            increase_growth_rate: conf.increase_growth_rate,
            decrease_factor: conf.decrease_factor,
            timeout_decrease_factor: conf.timeout_decrease_factor,
            tick_interval_ms: conf.tick_interval_ms,
            initial_window: conf.initial_window,
            min_window,
            max_window: conf.max_window.max(min_window),
            initial_send_rate: conf.initial_send_rate,
            min_send_rate,
            max_send_rate: conf.max_send_rate.max(min_send_rate),
            payload_size: conf.payload_size.max(1),
            initial_rtt: Duration::from_millis(conf.initial_rtt_ms).max(TIMER_GRANULARITY),
            initial_timeout_ms: conf.initial_timeout_ms,
            min_timeout_ms: conf.min_timeout_ms,
            max_timeout_ms: conf.max_timeout_ms.max(conf.min_timeout_ms),
        }
    }
}

impl Default for DelayGradientConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl DelayGradientConfig {
    /// Floor and ceiling of the controlled quantity.
    fn bounds(&self) -> (f64, f64) {
        match self.mode {
            ControlMode::Window => (self.min_window as f64, self.max_window as f64),
            ControlMode::Rate => (self.min_send_rate as f64, self.max_send_rate as f64),
        }
    }

    fn initial_quantity(&self) -> f64 {
        match self.mode {
            ControlMode::Window => self.initial_window as f64,
            ControlMode::Rate => self.initial_send_rate as f64,
        }
    }

    /// Bits carried by one datagram.
    fn datagram_bits(&self) -> f64 {
        self.payload_size as f64 * 8.0
    }
}

/// Delay-gradient congestion controller.
#[derive(Debug)]
pub struct DelayGradient {
    /// Config
    config: DelayGradientConfig,

    /// Statistics.
    stats: CongestionStats,

    /// The controlled quantity, in datagrams or bits per second.
    quantity: f64,

    /// Rate control state.
    state: ControlState,

    /// Groups acks into timing samples.
    burst: BurstAggregator,

    /// Smoothed one-way delay gradient.
    gradient: GradientEstimator,

    /// Ack arrival rate.
    bandwidth: BandwidthEstimator,

    /// Round trip time on the sender's clock.
    rtt: RttEstimator,

    /// Time of the last control tick.
    last_tick: Option<u64>,

    /// Timeouts since the last ack.
    consecutive_timeouts: u32,
}

impl DelayGradient {
    pub fn new(config: DelayGradientConfig) -> Self {
        let (floor, ceiling) = config.bounds();
        let quantity = config.initial_quantity().clamp(floor, ceiling);

        Self {
            stats: Default::default(),
            quantity,
            state: ControlState::default(),
            burst: BurstAggregator::new(config.burst_threshold_ms),
            gradient: GradientEstimator::new(config.ewma_alpha),
            bandwidth: BandwidthEstimator::new(config.bandwidth_window_ms),
            rtt: RttEstimator::new(config.initial_rtt),
            last_tick: None,
            consecutive_timeouts: 0,
            config,
        }
    }

    /// Current rate control state.
    pub fn control_state(&self) -> ControlState {
        self.state
    }

    /// Current smoothed delay gradient.
    pub fn smoothed_gradient(&self) -> f64 {
        self.gradient.smoothed()
    }

    /// Classification of the current smoothed gradient.
    pub fn signal(&self) -> Signal {
        Signal::classify(self.gradient.smoothed(), self.config.gradient_threshold)
    }

    /// The controlled quantity, in datagrams (window mode) or bits per
    /// second (rate mode).
    pub fn quantity(&self) -> f64 {
        self.quantity
    }

    /// The quantity this controller mutates.
    pub fn control_mode(&self) -> ControlMode {
        self.config.mode
    }

    /// Delivery rate in bits per second measured over the bandwidth window
    /// ending at `now`.
    pub fn delivery_rate(&mut self, now: u64) -> Option<f64> {
        self.bandwidth
            .estimate_bps(now, self.config.payload_size)
    }

    /// The rtt estimator.
    pub fn rtt(&self) -> &RttEstimator {
        &self.rtt
    }

    /// The value the quantity converges to in Decrease state, or None if no
    /// delivery rate is available.
    fn delivery_target(&mut self, now: u64) -> Option<f64> {
        let rate = self.bandwidth.estimate(now)?;

        let target = match self.config.mode {
            ControlMode::Rate => rate * self.config.datagram_bits(),
            ControlMode::Window => {
                if !self.rtt.has_sample() {
                    return None;
                }
                rate * self.rtt.min_rtt().as_secs_f64()
            }
        };

        Some(target * self.config.decrease_factor)
    }

    fn set_state(&mut self, next: ControlState) {
        if next == self.state {
            return;
        }

        debug!(
            "{}. state {:?} -> {:?}, gradient={:.4}, quantity={:.2}",
            self.name(),
            self.state,
            next,
            self.gradient.smoothed(),
            self.quantity
        );
        self.state = next;
        self.stats.state_changes = self.stats.state_changes.saturating_add(1);
    }

    fn clamp_quantity(&mut self) {
        let (floor, ceiling) = self.config.bounds();
        if self.quantity.is_nan() {
            self.quantity = floor;
        }
        self.quantity = self.quantity.clamp(floor, ceiling);
    }

    /// Smoothed rtt in seconds, never zero.
    fn srtt_secs(&self) -> f64 {
        self.rtt
            .smoothed_rtt()
            .max(TIMER_GRANULARITY)
            .as_secs_f64()
    }
}

impl CongestionController for DelayGradient {
    fn name(&self) -> &str {
        "DELAY_GRADIENT"
    }

    fn on_sent(&mut self, sequence: u64, send_time: u64) {
        self.stats.datagrams_sent = self.stats.datagrams_sent.saturating_add(1);
        trace!(
            "{}. ON_SENT. seq={}, send_time={}",
            self.name(),
            sequence,
            send_time
        );
    }

    fn on_ack(&mut self, ack: &AckEvent) {
        self.stats.acks_received = self.stats.acks_received.saturating_add(1);
        self.consecutive_timeouts = 0;

        // Both times are on the sender's clock.
        match ack.ack_time.checked_sub(ack.send_time) {
            Some(rtt) => self.rtt.update(Duration::from_millis(rtt)),
            None => trace!(
                "{}. ack {} arrived before it was sent, skip rtt sample",
                self.name(),
                ack.sequence
            ),
        }
        self.bandwidth.on_arrival(ack.ack_time);

        match self.burst.on_sample(ack.send_time, ack.recv_time) {
            BurstOutcome::Forward(sample) => {
                self.stats.samples_forwarded = self.stats.samples_forwarded.saturating_add(1);
                let gradient = self
                    .gradient
                    .record_sample(sample.delay_variation, sample.elapsed_ms);

                trace!(
                    "{}. ON_ACK. seq={}, delay_variation={}ms, elapsed={}ms, gradient={:.4}",
                    self.name(),
                    ack.sequence,
                    sample.delay_variation,
                    sample.elapsed_ms,
                    gradient
                );
            }
            BurstOutcome::Coalesced => {
                self.stats.samples_coalesced = self.stats.samples_coalesced.saturating_add(1);
            }
            BurstOutcome::Discarded => {
                self.stats.samples_discarded = self.stats.samples_discarded.saturating_add(1);
                debug!(
                    "{}. ack {} out of order (send={}, recv={}), sample discarded",
                    self.name(),
                    ack.sequence,
                    ack.send_time,
                    ack.recv_time
                );
            }
            BurstOutcome::First => (),
        }
    }

    fn on_timeout(&mut self) {
        self.stats.timeouts = self.stats.timeouts.saturating_add(1);
        self.consecutive_timeouts = self.consecutive_timeouts.saturating_add(1);

        self.set_state(ControlState::Decrease);
        self.quantity *= self.config.timeout_decrease_factor;
        self.clamp_quantity();
        self.burst.reset();

        debug!(
            "{}. ON_TIMEOUT. consecutive={}, quantity={:.2}",
            self.name(),
            self.consecutive_timeouts,
            self.quantity
        );
    }

    fn on_tick(&mut self, now: u64) {
        self.stats.ticks = self.stats.ticks.saturating_add(1);

        let elapsed_ms = match self.last_tick {
            Some(last) => now.saturating_sub(last),
            None => self.config.tick_interval_ms,
        };
        self.last_tick = Some(self.last_tick.map_or(now, |last| last.max(now)));

        let signal = self.signal();
        self.set_state(self.state.transition(signal));

        match self.state {
            ControlState::Increase => {
                let elapsed_secs = elapsed_ms as f64 / 1000.0;
                let growth = self.config.increase_growth_rate.powf(elapsed_secs);
                let (_, ceiling) = self.config.bounds();
                // Long idle gaps overflow the growth to infinity.
                self.quantity = (self.quantity * growth).min(ceiling);
            }
            ControlState::Decrease => match self.delivery_target(now) {
                Some(target) => self.quantity = target,
                None => trace!(
                    "{}. delivery rate unavailable, hold {:.2}",
                    self.name(),
                    self.quantity
                ),
            },
            ControlState::Hold => (),
        }
        self.clamp_quantity();

        trace!(
            "{}. ON_TICK. now={}, elapsed={}ms, signal={:?}, state={:?}, quantity={:.2}",
            self.name(),
            now,
            elapsed_ms,
            signal,
            self.state,
            self.quantity
        );
    }

    fn congestion_window(&self) -> u64 {
        let window = match self.config.mode {
            ControlMode::Window => self.quantity,
            ControlMode::Rate => self.quantity * self.srtt_secs() / self.config.datagram_bits(),
        };

        (window as u64).clamp(self.config.min_window, self.config.max_window)
    }

    fn send_rate(&self) -> u64 {
        match self.config.mode {
            ControlMode::Rate => self.quantity as u64,
            ControlMode::Window => {
                (self.quantity * self.config.datagram_bits() / self.srtt_secs()) as u64
            }
        }
    }

    fn timeout_ms(&self) -> u64 {
        let backoff = self.consecutive_timeouts;
        let timeout = if self.rtt.has_sample() {
            self.rtt.rto(backoff).as_millis() as u64
        } else {
            let shift = backoff.min(16);
            self.config.initial_timeout_ms.saturating_mul(1 << shift)
        };

        timeout.clamp(self.config.min_timeout_ms, self.config.max_timeout_ms)
    }

    fn initial_window(&self) -> u64 {
        self.config.initial_window
    }

    fn minimal_window(&self) -> u64 {
        self.config.min_window
    }

    fn stats(&self) -> &CongestionStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    /// Receiver clock offset. Only differences on each clock are meaningful.
    const RECV_EPOCH: u64 = 7_000_000;

    fn ack(sequence: u64, send_time: u64, recv_time: u64, ack_time: u64) -> AckEvent {
        AckEvent {
            sequence,
            send_time,
            recv_time: RECV_EPOCH + recv_time,
            ack_time,
        }
    }

    fn new_controller(conf: &Config) -> DelayGradient {
        DelayGradient::new(DelayGradientConfig::from(conf))
    }

    /// Ten acks with constant 50ms rtt and equal spacing on both clocks,
    /// acked at 1050..=1140.
    fn feed_steady(cc: &mut DelayGradient) {
        for i in 0..10 {
            let send = 1_000 + i * 10;
            cc.on_ack(&ack(i, send, 10 * i, send + 50));
        }
    }

    /// Ten acks whose receive spacing is 3x the send spacing, acked at
    /// 1170..=1440. Returns the time of the last ack.
    fn feed_queueing(cc: &mut DelayGradient) -> u64 {
        let mut last = 0;
        for j in 1..=10 {
            let send = 1_090 + 10 * j;
            let recv = 90 + 30 * j;
            last = send + 50 + 20 * j;
            cc.on_ack(&ack(10 + j, send, recv, last));
        }
        last
    }

    #[test]
    fn delay_gradient_init() {
        let conf = Config::new();
        let cc = new_controller(&conf);

        assert_eq!(cc.name(), "DELAY_GRADIENT");
        assert_eq!(cc.control_state(), ControlState::Increase);
        assert_eq!(cc.congestion_window(), 10);
        assert_eq!(cc.initial_window(), 10);
        assert_eq!(cc.minimal_window(), 1);
        assert_eq!(cc.timeout_ms(), 1000);
        assert_eq!(cc.smoothed_gradient(), 0.0);
        assert_eq!(cc.control_mode(), ControlMode::Window);

        // 10 datagrams of 1500 bytes per initial rtt of 100ms.
        assert!((cc.send_rate() as i64 - 1_200_000).abs() <= 1);
    }

    #[test]
    fn delay_gradient_steady_path_increases() {
        let conf = Config::new();
        let mut cc = new_controller(&conf);

        let mut last_quantity = cc.quantity();
        for i in 0..50 {
            let send = 1_000 + i * 10;
            cc.on_ack(&ack(i, send, 10 * i, send + 50));

            if i % 2 == 1 {
                cc.on_tick(send + 50);
                assert_eq!(cc.signal(), Signal::Normal);
                assert_eq!(cc.control_state(), ControlState::Increase);
                assert!(cc.quantity() > last_quantity);
                last_quantity = cc.quantity();
            }
        }

        assert_eq!(cc.smoothed_gradient(), 0.0);
        assert_eq!(cc.stats().samples_forwarded, 49);
        assert_eq!(cc.stats().ticks, 25);
        assert_eq!(cc.stats().state_changes, 0);
    }

    #[test]
    fn delay_gradient_increase_growth() {
        let conf = Config::new();
        let mut cc = new_controller(&conf);

        cc.on_tick(0);
        cc.on_tick(1_000);
        let expected = 10.0 * 1.25_f64.powf(0.02) * 1.25;
        assert!((cc.quantity() - expected).abs() < 1e-9);

        // Time going backwards does not grow the window.
        let quantity = cc.quantity();
        cc.on_tick(500);
        assert_eq!(cc.quantity(), quantity);

        // Nor is the regressed span counted again afterwards.
        cc.on_tick(1_000);
        assert_eq!(cc.quantity(), quantity);
        cc.on_tick(2_000);
        assert!((cc.quantity() - quantity * 1.25).abs() < 1e-9);
    }

    #[test]
    fn delay_gradient_increase_after_long_idle() {
        let conf = Config::new();
        let mut cc = new_controller(&conf);

        cc.on_tick(0);
        cc.on_tick(4_000_000);
        assert_eq!(cc.control_state(), ControlState::Increase);
        assert_eq!(cc.quantity(), 10_000.0);
        assert_eq!(cc.congestion_window(), 10_000);

        let mut conf = Config::new();
        conf.set_control_mode(ControlMode::Rate);
        let mut cc = new_controller(&conf);
        cc.on_tick(0);
        cc.on_tick(u64::MAX);
        assert_eq!(cc.send_rate(), 10_000_000_000);
    }

    #[test]
    fn delay_gradient_paired_arrivals_are_normal() {
        let conf = Config::new();
        let mut cc = new_controller(&conf);

        // Flat one-way delay, but the receiver sees datagrams in pairs 2ms
        // apart with an 18ms gap between pairs.
        for i in 0..40 {
            let send = 1_000 + i * 10;
            let recv = 5_000 + 20 * (i / 2) + 2 * (i % 2);
            cc.on_ack(&ack(i, send, recv, send + 50));
        }

        assert_eq!(cc.stats().samples_coalesced, 20);
        assert_eq!(cc.stats().samples_forwarded, 19);
        assert_eq!(cc.smoothed_gradient(), 0.0);
        assert_eq!(cc.signal(), Signal::Normal);

        cc.on_tick(1_440);
        assert_eq!(cc.control_state(), ControlState::Increase);
        assert!(cc.quantity() > 10.0);
    }

    #[test]
    fn delay_gradient_increase_clamped_to_ceiling() {
        let mut conf = Config::new();
        conf.set_max_window(12);
        let mut cc = new_controller(&conf);

        for i in 0..100 {
            cc.on_tick(i * 1_000);
        }
        assert_eq!(cc.quantity(), 12.0);
        assert_eq!(cc.congestion_window(), 12);
    }

    #[test]
    fn delay_gradient_queueing_decreases_window() {
        let conf = Config::new();
        let mut cc = new_controller(&conf);

        feed_steady(&mut cc);
        assert_eq!(cc.signal(), Signal::Normal);

        let now = feed_queueing(&mut cc);
        assert!(cc.smoothed_gradient() > 0.25);
        assert_eq!(cc.signal(), Signal::Overuse);

        cc.on_tick(now);
        assert_eq!(cc.control_state(), ControlState::Decrease);

        // 20 acks spanning 1050..=1440, min rtt 50ms.
        let rate = 19.0 / 0.39;
        let expected = rate * 0.05 * 0.85;
        assert!(
            (cc.quantity() - expected).abs() < 1e-6,
            "{} != {}",
            cc.quantity(),
            expected
        );
        assert_eq!(cc.congestion_window(), 2);
    }

    #[test]
    fn delay_gradient_queueing_decreases_rate() {
        let mut conf = Config::new();
        conf.set_control_mode(ControlMode::Rate);
        let mut cc = new_controller(&conf);
        assert_eq!(cc.send_rate(), 3_000_000);

        feed_steady(&mut cc);
        let now = feed_queueing(&mut cc);
        cc.on_tick(now);
        assert_eq!(cc.control_state(), ControlState::Decrease);

        let expected = 19.0 / 0.39 * 1500.0 * 8.0 * 0.85;
        assert!((cc.quantity() - expected).abs() < 1e-3);
        assert!((cc.send_rate() as f64 - expected).abs() < 1.0);

        // Repeated overuse does not compound the decrease.
        cc.on_tick(now + 20);
        assert_eq!(cc.control_state(), ControlState::Decrease);
        assert!((cc.quantity() - expected).abs() < 1e-3);
    }

    #[test]
    fn delay_gradient_decrease_without_bandwidth_holds() {
        let conf = Config::new();
        let mut cc = new_controller(&conf);

        feed_steady(&mut cc);
        let now = feed_queueing(&mut cc);

        // All arrivals fell out of the bandwidth window.
        cc.on_tick(now + 10_000);
        assert_eq!(cc.control_state(), ControlState::Decrease);
        assert_eq!(cc.quantity(), 10.0);
        assert_eq!(cc.delivery_rate(now + 10_000), None);
    }

    #[test]
    fn delay_gradient_decrease_recovers_through_hold() {
        let conf = Config::new();
        let mut cc = new_controller(&conf);

        feed_steady(&mut cc);
        let mut now = feed_queueing(&mut cc);
        cc.on_tick(now);
        assert_eq!(cc.control_state(), ControlState::Decrease);

        // The queue drains: receive spacing equals send spacing again.
        let mut states = vec![];
        for k in 1..=60 {
            let send = 1_190 + 10 * k;
            let recv = 390 + 10 * k;
            now = 1_440 + 10 * k;
            cc.on_ack(&ack(20 + k, send, recv, now));
            if k % 2 == 0 {
                cc.on_tick(now);
                states.push(cc.control_state());
            }
        }

        let first_increase = states
            .iter()
            .position(|s| *s == ControlState::Increase)
            .unwrap();
        assert!(first_increase > 0);
        assert_eq!(states[first_increase - 1], ControlState::Hold);
    }

    #[test]
    fn delay_gradient_timeout() {
        let conf = Config::new();
        let mut cc = new_controller(&conf);

        cc.on_timeout();
        assert_eq!(cc.control_state(), ControlState::Decrease);
        assert_eq!(cc.quantity(), 5.0);
        assert_eq!(cc.congestion_window(), 5);
        assert_eq!(cc.stats().timeouts, 1);
        assert_eq!(cc.stats().state_changes, 1);
    }

    #[test]
    fn delay_gradient_timeout_respects_floor() {
        let mut conf = Config::new();
        conf.set_min_window(8);
        let mut cc = new_controller(&conf);

        cc.on_timeout();
        assert_eq!(cc.quantity(), 8.0);

        for _ in 0..10 {
            cc.on_timeout();
        }
        assert_eq!(cc.congestion_window(), 8);
    }

    #[test]
    fn delay_gradient_timeout_resets_burst() {
        let conf = Config::new();
        let mut cc = new_controller(&conf);

        feed_steady(&mut cc);
        let forwarded = cc.stats().samples_forwarded;
        assert_eq!(forwarded, 9);

        cc.on_timeout();

        // The first ack after the timeout only becomes the new snapshot.
        cc.on_ack(&ack(100, 5_000, 4_000, 5_050));
        assert_eq!(cc.stats().samples_forwarded, forwarded);
        cc.on_ack(&ack(101, 5_010, 4_010, 5_060));
        assert_eq!(cc.stats().samples_forwarded, forwarded + 1);
    }

    #[test]
    fn delay_gradient_timeout_backoff() {
        let conf = Config::new();
        let mut cc = new_controller(&conf);

        // No rtt sample yet.
        assert_eq!(cc.timeout_ms(), 1000);
        cc.on_timeout();
        assert_eq!(cc.timeout_ms(), 2000);
        cc.on_timeout();
        assert_eq!(cc.timeout_ms(), 4000);

        // Ack resets the backoff and provides an rtt sample of 40ms.
        cc.on_ack(&ack(0, 1_000, 0, 1_040));
        assert_eq!(cc.timeout_ms(), 120);
        cc.on_timeout();
        assert_eq!(cc.timeout_ms(), 240);

        for _ in 0..64 {
            cc.on_timeout();
        }
        assert_eq!(cc.timeout_ms(), 60_000);
    }

    #[test]
    fn delay_gradient_out_of_order_ack() {
        let conf = Config::new();
        let mut cc = new_controller(&conf);

        feed_steady(&mut cc);
        let gradient = cc.smoothed_gradient();

        // Reordered by the transport: sent before the previous ack.
        cc.on_ack(&ack(3, 1_030, 30, 1_150));
        assert_eq!(cc.stats().samples_discarded, 1);
        assert_eq!(cc.smoothed_gradient(), gradient);

        // Ack time before send time yields no rtt sample.
        let srtt = cc.rtt().smoothed_rtt();
        cc.on_ack(&ack(11, 2_000, 1_000, 1_990));
        assert_eq!(cc.rtt().smoothed_rtt(), srtt);
    }

    #[test]
    fn delay_gradient_duplicate_sample_is_noop() {
        let conf = Config::new();
        let mut cc = new_controller(&conf);

        feed_steady(&mut cc);
        feed_queueing(&mut cc);
        let gradient = cc.smoothed_gradient();
        let quantity = cc.quantity();

        // Same send and receive time as the last ack: zero elapsed.
        for _ in 0..5 {
            cc.on_ack(&ack(20, 1_190, 390, 1_440));
            assert_eq!(cc.smoothed_gradient(), gradient);
            assert_eq!(cc.quantity(), quantity);
        }
    }

    #[test]
    fn delay_gradient_rate_mode_window() {
        let mut conf = Config::new();
        conf.set_control_mode(ControlMode::Rate);
        conf.set_initial_send_rate(1_200_000);
        let mut cc = new_controller(&conf);

        // 1.2Mbit/s over an initial rtt of 100ms is 10 datagrams.
        assert_eq!(cc.congestion_window(), 10);

        cc.on_ack(&ack(0, 1_000, 0, 1_200));
        assert_eq!(cc.congestion_window(), 20);
    }

    #[test]
    fn delay_gradient_floor_under_decreases() {
        let mut rng = rand::thread_rng();

        for mode in [ControlMode::Window, ControlMode::Rate] {
            let mut conf = Config::new();
            conf.set_control_mode(mode);
            conf.set_min_window(4);
            conf.set_min_send_rate(200_000);
            let floor = match mode {
                ControlMode::Window => 4.0,
                ControlMode::Rate => 200_000.0,
            };
            let mut cc = new_controller(&conf);

            let mut send = 1_000;
            let mut recv = 0;
            for seq in 0..2_000 {
                send += rng.gen_range(1..20);
                recv += rng.gen_range(0..80);
                let ack_time = send + rng.gen_range(0..200);
                cc.on_ack(&ack(seq, send, recv, ack_time));

                match rng.gen_range(0..10) {
                    0 => cc.on_timeout(),
                    1..=4 => cc.on_tick(ack_time),
                    _ => (),
                }

                assert!(cc.quantity() >= floor, "{} < {}", cc.quantity(), floor);
                assert!(cc.congestion_window() >= 1);
            }
        }
    }
}
