// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Open the source, wrap it in a generator, run one battery, report.

use std::{io, time::Duration, time::Instant};

use chrono::{DateTime, Local};
use log::{debug, info};

use crate::{
    battery::{Battery, BatteryKind, CommandBattery, WriterBattery},
    config::{HarnessConfig, Target},
    error::Result,
    source::{self, OpenedSource},
    strings, utils,
    words::{BufferedWordReader, Generator, WordReader, WordSource},
};

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub generator: String,
    pub battery: String,
    pub source: String,
    pub source_len: Option<u64>,
    pub started: DateTime<Local>,
    pub elapsed: Duration,
    pub words: u64,
    pub wraps: u64,
}

impl RunSummary {
    pub fn format(&self) -> String {
        let mut lines = vec![
            format!(
                "Summary for: {} ({} on {})",
                self.generator, self.battery, self.source
            ),
            format!("Started: {}", self.started.format("%Y-%m-%d %H:%M:%S")),
            format!(
                "Words pulled: {} ({})",
                self.words,
                utils::format_byte_count(self.words * 4)
            ),
        ];
        if let Some(len) = self.source_len.filter(|len| *len >= 4) {
            lines.push(format!(
                "Passes over source: {:.2}",
                self.words as f64 / (len / 4) as f64
            ));
        }
        lines.push(format!("Source restarts: {}", self.wraps));
        lines.push(format!(
            "Total runtime: {}",
            utils::format_elapsed_time(self.elapsed)
        ));
        lines.join("\n")
    }
}

#[cfg(feature = "testu01")]
fn testu01_battery(kind: BatteryKind) -> Result<Box<dyn Battery>> {
    Ok(Box::new(crate::testu01::TestU01Battery::new(kind)))
}

#[cfg(not(feature = "testu01"))]
fn testu01_battery(kind: BatteryKind) -> Result<Box<dyn Battery>> {
    Err(crate::error::Error::BatteryUnavailable(kind))
}

fn select_battery(config: &HarnessConfig) -> Result<Box<dyn Battery>> {
    match &config.target {
        Target::TestU01(kind) => testu01_battery(*kind),
        Target::Stdout => Ok(Box::new(
            WriterBattery::new(
                strings::STDOUT_NAME,
                io::stdout(),
                config.order,
                config.chunk_words,
            )
            .with_limit(config.limit),
        )),
        Target::Command { program, args } => Ok(Box::new(
            CommandBattery::new(
                program.clone(),
                args.clone(),
                config.order,
                config.chunk_words,
            )
            .with_limit(config.limit),
        )),
    }
}

/// Full run as configured on the command line.
pub fn run(config: &HarnessConfig) -> Result<RunSummary> {
    let opened = source::open(&config.source)?;
    let mut battery = select_battery(config)?;
    drive(config, opened, battery.as_mut())
}

/// Run `battery` against an already opened source.
/// An empty source is detected before the battery starts.
pub fn drive(
    config: &HarnessConfig,
    opened: OpenedSource,
    battery: &mut dyn Battery,
) -> Result<RunSummary> {
    let started = Local::now();
    let start = Instant::now();
    let OpenedSource { reader, label, len } = opened;
    let mut words: Box<dyn WordSource> = match config.buffer_words {
        Some(capacity) => {
            let buffered = BufferedWordReader::new(reader, capacity, config.order);
            debug!("Prefetching {} words per read", buffered.capacity());
            Box::new(buffered)
        }
        None => Box::new(WordReader::new(reader, config.order)),
    };
    let mut gen = Generator::new(config.name.as_str(), words.as_mut());
    gen.peek()?;
    info!("Feeding {} from {} into {}", gen.name(), label, battery.name());
    battery.run(&mut gen)?;
    Ok(RunSummary {
        generator: gen.name().to_owned(),
        battery: battery.name().to_owned(),
        source: label,
        source_len: len,
        started,
        elapsed: start.elapsed(),
        words: gen.pulled(),
        wraps: gen.wraps(),
    })
}
