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

use serde::Deserialize;
use serde::Serialize;
use strum_macros::EnumIter;

/// Network condition derived from the smoothed delay gradient.
#[derive(Eq, PartialEq, Debug, Clone, Copy, EnumIter, Serialize, Deserialize)]
pub enum Signal {
    /// Queueing delay is growing.
    Overuse,

    /// Queueing delay is stable.
    Normal,

    /// Queueing delay is shrinking.
    Underuse,
}

impl Signal {
    /// Classify a smoothed gradient against the threshold `T`.
    ///
    /// Gradients above `+T` are overuse, below `-T` underuse, anything else
    /// (including the boundaries) is normal.
    pub fn classify(gradient: f64, threshold: f64) -> Signal {
        if gradient > threshold {
            Signal::Overuse
        } else if gradient < -threshold {
            Signal::Underuse
        } else {
            Signal::Normal
        }
    }
}

/// State of the rate control.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Default, EnumIter, Serialize, Deserialize)]
pub enum ControlState {
    /// Grow the controlled quantity.
    #[default]
    Increase,

    /// Keep the controlled quantity.
    Hold,

    /// Converge the controlled quantity to the delivery rate.
    Decrease,
}

impl ControlState {
    /// Next state on `signal`.
    ///
    /// Overuse forces Decrease from any state. Decrease only leaves through
    /// Hold, so the quantity cannot flip between decreasing and increasing
    /// on consecutive ticks.
    pub fn transition(self, signal: Signal) -> ControlState {
        match (self, signal) {
            (_, Signal::Overuse) => ControlState::Decrease,

            (ControlState::Increase, Signal::Normal) => ControlState::Increase,
            (ControlState::Increase, Signal::Underuse) => ControlState::Hold,

            (ControlState::Hold, Signal::Normal) => ControlState::Increase,
            (ControlState::Hold, Signal::Underuse) => ControlState::Increase,

            (ControlState::Decrease, Signal::Normal) => ControlState::Hold,
            (ControlState::Decrease, Signal::Underuse) => ControlState::Hold,
        }
    }
}
