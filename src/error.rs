// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Error type shared by the sources, the word adapter and the batteries.

use std::{io, path::PathBuf, process::ExitStatus};

use thiserror::Error;

use crate::battery::BatteryKind;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Error opening file {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Source contains no complete 32-bit word")]
    EmptySource,

    #[error("Stream cannot be rewound: more than {limit} bytes went through the replay capture")]
    NotRestartable { limit: usize },

    #[error("Battery {0} is not available: build with the `testu01` feature")]
    BatteryUnavailable(BatteryKind),

    #[error("Battery {name} failed: {status}")]
    BatteryFailed { name: String, status: ExitStatus },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Process exit status for this error.
    /// Only a source that cannot be opened is distinguished.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::Open { .. } => 1,
            _ => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_failure_exits_with_one() {
        let err = Error::Open {
            path: PathBuf::from("missing.bin"),
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        assert_eq!(err.exit_code(), 1);
        assert!(err.to_string().starts_with("Error opening file missing.bin"));
    }

    #[test]
    fn other_failures_exit_with_two() {
        assert_eq!(Error::EmptySource.exit_code(), 2);
        assert_eq!(Error::NotRestartable { limit: 8 }.exit_code(), 2);
        assert_eq!(Error::Io(io::ErrorKind::Other.into()).exit_code(), 2);
    }
}
