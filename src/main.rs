// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Feeds 32-bit words from a file or stdin into a randomness test battery.

pub mod battery;
pub mod config;
pub mod error;
pub mod harness;
pub mod source;
mod strings;
#[cfg(feature = "testu01")]
pub mod testu01;
pub mod utils;
pub mod words;

use std::process::ExitCode;

use clap::Parser;
use log::info;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = config::Cli::parse();
    match cli.into_config().and_then(|config| harness::run(&config)) {
        Ok(summary) => {
            info!("\n{}", summary.format());
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{}", err);
            ExitCode::from(err.exit_code())
        }
    }
}
