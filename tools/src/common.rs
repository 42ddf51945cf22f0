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

use std::fs::OpenOptions;

use clap::builder::PossibleValue;
use clap::ValueEnum;
use log::debug;
use serde::Serialize;

use gradcc::AckEvent;
use gradcc::CongestionController;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

/// Build the env_logger target: the given file in append mode, or `stderr`.
pub fn log_target(log_file: &Option<String>) -> Result<env_logger::Target> {
    match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Ok(env_logger::Target::Pipe(Box::new(file)))
        }
        None => Ok(env_logger::Target::Stderr),
    }
}

/// Output format of the replay reports.
#[derive(Clone, Copy, Default, PartialEq, Debug)]
pub enum OutputFormat {
    /// One human readable line per report.
    #[default]
    Text,

    /// One JSON object per line.
    Json,
}

impl ValueEnum for OutputFormat {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::Text, Self::Json]
    }

    fn to_possible_value(&self) -> Option<PossibleValue> {
        match self {
            Self::Text => Some(PossibleValue::new("text")),
            Self::Json => Some(PossibleValue::new("json")),
        }
    }
}

/// An event of a flow trace.
///
/// A trace is a text file with one event per line:
///
/// ```text
/// sent <seq> <send_ms>
/// ack <seq> <send_ms> <recv_ms> <ack_ms>
/// timeout <time_ms>
/// ```
///
/// Empty lines and lines starting with `#` are ignored.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TraceEvent {
    Sent { sequence: u64, send_time: u64 },
    Ack(AckEvent),
    Timeout { time: u64 },
}

impl TraceEvent {
    /// Parse one trace line. Returns None for blank lines and comments.
    pub fn parse(line: &str) -> Result<Option<TraceEvent>> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let mut fields = line.split_whitespace();
        let kind = fields.next().unwrap_or_default();
        let values = fields
            .map(|v| v.parse::<u64>())
            .collect::<std::result::Result<Vec<u64>, _>>()
            .map_err(|e| format!("invalid number in {:?}: {}", line, e))?;

        let event = match (kind.to_ascii_lowercase().as_str(), values.as_slice()) {
            ("sent", &[sequence, send_time]) => TraceEvent::Sent {
                sequence,
                send_time,
            },
            ("ack", &[sequence, send_time, recv_time, ack_time]) => TraceEvent::Ack(AckEvent {
                sequence,
                send_time,
                recv_time,
                ack_time,
            }),
            ("timeout", &[time]) => TraceEvent::Timeout { time },
            _ => return Err(format!("malformed trace line {:?}", line).into()),
        };

        Ok(Some(event))
    }

    /// Time of the event on the sender clock.
    pub fn time(&self) -> u64 {
        match self {
            TraceEvent::Sent { send_time, .. } => *send_time,
            TraceEvent::Ack(ack) => ack.ack_time,
            TraceEvent::Timeout { time } => *time,
        }
    }
}

/// Controller outputs after a control tick.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TickReport {
    /// Tick time on the sender clock.
    pub time: u64,

    /// Congestion window in datagrams.
    pub window: u64,

    /// Sending rate in bits per second.
    pub send_rate: u64,

    /// Retransmission timeout in milliseconds.
    pub timeout_ms: u64,
}

impl TickReport {
    pub fn format(&self, format: OutputFormat) -> String {
        match format {
            OutputFormat::Text => format!(
                "{:>10} cwnd={} rate={} rto={}",
                self.time, self.window, self.send_rate, self.timeout_ms
            ),
            OutputFormat::Json => serde_json::to_string(self).unwrap_or_default(),
        }
    }
}

/// Drives a controller with trace events, ticking it at a fixed period of
/// the sender clock.
pub struct Replay {
    cc: Box<dyn CongestionController + Send>,
    tick_interval: u64,
    next_tick: Option<u64>,
}

impl Replay {
    pub fn new(cc: Box<dyn CongestionController + Send>, tick_interval: u64) -> Self {
        Self {
            cc,
            tick_interval: tick_interval.max(1),
            next_tick: None,
        }
    }

    /// Apply an event. All ticks due before the event are run first and
    /// their reports returned.
    pub fn on_event(&mut self, event: &TraceEvent) -> Vec<TickReport> {
        let reports = self.advance(event.time());

        match event {
            TraceEvent::Sent {
                sequence,
                send_time,
            } => self.cc.on_sent(*sequence, *send_time),
            TraceEvent::Ack(ack) => self.cc.on_ack(ack),
            TraceEvent::Timeout { .. } => self.cc.on_timeout(),
        }

        reports
    }

    /// Run all ticks due at or before `now`.
    pub fn advance(&mut self, now: u64) -> Vec<TickReport> {
        let mut reports = Vec::new();
        let mut next = match self.next_tick {
            Some(next) => next,
            None => {
                self.next_tick = Some(now.saturating_add(self.tick_interval));
                return reports;
            }
        };

        while next <= now {
            self.cc.on_tick(next);
            reports.push(TickReport {
                time: next,
                window: self.cc.congestion_window(),
                send_rate: self.cc.send_rate(),
                timeout_ms: self.cc.timeout_ms(),
            });
            let following = next.saturating_add(self.tick_interval);
            if following == next {
                break;
            }
            next = following;
        }
        self.next_tick = Some(next);

        if !reports.is_empty() {
            debug!("{} ticks up to {}", reports.len(), now);
        }
        reports
    }

    /// The replayed controller.
    pub fn controller(&self) -> &(dyn CongestionController + Send) {
        self.cc.as_ref()
    }
}
