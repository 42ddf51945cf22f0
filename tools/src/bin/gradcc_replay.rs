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

//! Replay a flow trace through a congestion controller and print the
//! controller outputs after every control tick.

use std::fs::File;
use std::io::stdin;
use std::io::stdout;
use std::io::BufRead;
use std::io::BufReader;
use std::io::Write;

use clap::Parser;
use log::*;

use gradcc::build_congestion_controller;
use gradcc::CongestionControlAlgorithm;
use gradcc::Config;
use gradcc::ControlMode;
use gradcc_tools::OutputFormat;
use gradcc_tools::Replay;
use gradcc_tools::Result;
use gradcc_tools::TraceEvent;

#[derive(Parser, Debug, Clone)]
#[clap(name = "gradcc_replay")]
pub struct ReplayOpt {
    /// Trace file. If no file is specified, the trace is read from `stdin`.
    #[clap(value_name = "FILE")]
    pub trace: Option<String>,

    /// Controller configuration in JSON. Missing fields use their defaults.
    #[clap(short, long, value_name = "FILE")]
    pub config: Option<String>,

    /// Congestion control algorithm, support DELAY_GRADIENT/FIXED.
    #[clap(long, value_name = "STR")]
    pub congestion_control_algor: Option<CongestionControlAlgorithm>,

    /// Controlled quantity, support WINDOW/RATE.
    #[clap(long, value_name = "STR")]
    pub control_mode: Option<ControlMode>,

    /// Control tick interval in milliseconds.
    #[clap(long, value_name = "TIME")]
    pub tick_interval: Option<u64>,

    /// Output format of the tick reports.
    #[clap(long, default_value = "text", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Log level, support OFF/ERROR/WARN/INFO/DEBUG/TRACE.
    #[clap(long, default_value = "INFO", value_name = "STR")]
    pub log_level: log::LevelFilter,

    /// Log file path. If no file is specified, logs will be written to `stderr`.
    #[clap(long, value_name = "FILE")]
    pub log_file: Option<String>,
}

fn load_config(option: &ReplayOpt) -> Result<Config> {
    let mut conf = match &option.config {
        Some(path) => Config::from_json(&std::fs::read_to_string(path)?)?,
        None => Config::new(),
    };

    if let Some(cca) = option.congestion_control_algor {
        conf.set_congestion_control_algorithm(cca);
    }
    if let Some(mode) = option.control_mode {
        conf.set_control_mode(mode);
    }
    if let Some(interval) = option.tick_interval {
        conf.set_tick_interval(interval);
    }

    conf.validate()?;
    Ok(conf)
}

fn main() -> Result<()> {
    let option = ReplayOpt::parse();

    env_logger::builder()
        .target(gradcc_tools::log_target(&option.log_file)?)
        .filter_level(option.log_level)
        .format_timestamp_millis()
        .init();

    let conf = load_config(&option)?;
    let tick_interval = conf.tick_interval().as_millis() as u64;
    let mut replay = Replay::new(build_congestion_controller(&conf), tick_interval);
    info!(
        "replay with {}, tick interval {}ms",
        replay.controller().name(),
        tick_interval
    );

    let input: Box<dyn BufRead> = match &option.trace {
        Some(path) => Box::new(BufReader::new(File::open(path)?)),
        None => Box::new(BufReader::new(stdin())),
    };

    let mut out = stdout().lock();
    for (lineno, line) in input.lines().enumerate() {
        let line = line?;
        let event = match TraceEvent::parse(&line) {
            Ok(Some(event)) => event,
            Ok(None) => continue,
            Err(e) => {
                warn!("line {}: {}", lineno + 1, e);
                continue;
            }
        };

        for report in replay.on_event(&event) {
            writeln!(out, "{}", report.format(option.format))?;
        }
    }

    info!("replay done, stats {:?}", replay.controller().stats());
    Ok(())
}
