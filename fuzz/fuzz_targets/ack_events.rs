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

#![no_main]

use libfuzzer_sys::fuzz_target;

use gradcc::build_congestion_controller;
use gradcc::AckEvent;
use gradcc::Config;
use gradcc::ControlMode;

/// Each event is an opcode byte followed by three little-endian u16 deltas.
const EVENT_LEN: usize = 7;

fuzz_target!(|data: &[u8]| {
    let mut conf = Config::new();
    if data.first().map_or(false, |b| b & 1 == 1) {
        conf.set_control_mode(ControlMode::Rate);
    }
    let mut cc = build_congestion_controller(&conf);

    let mut seq = 0_u64;
    let mut send = 0_u64;
    let mut recv = 0_u64;
    let mut now = 0_u64;

    for ev in data.chunks_exact(EVENT_LEN) {
        let d1 = u16::from_le_bytes([ev[1], ev[2]]) as u64;
        let d2 = u16::from_le_bytes([ev[3], ev[4]]) as u64;
        let d3 = u16::from_le_bytes([ev[5], ev[6]]) as u64;

        match ev[0] % 5 {
            0 => {
                send += d1;
                cc.on_sent(seq, send);
                seq += 1;
            }
            1 => {
                // Timestamps may move backwards on either clock.
                let ack = AckEvent {
                    sequence: seq,
                    send_time: send.wrapping_sub(d1 & 0xff),
                    recv_time: recv.wrapping_add(d2).wrapping_sub(d3 & 0xff),
                    ack_time: now + d3,
                };
                recv = recv.wrapping_add(d2);
                cc.on_ack(&ack);
            }
            2 => cc.on_timeout(),
            _ => {
                now += d1;
                cc.on_tick(now);
            }
        }

        assert!(cc.congestion_window() >= 1);
        assert!(cc.timeout_ms() > 0);
    }
});
