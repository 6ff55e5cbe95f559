// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Command line options and the validated harness configuration built from them.

use std::path::PathBuf;

use clap::Parser;

use crate::{
    battery::{BatteryKind, DEFAULT_CHUNK_WORDS},
    error::{Error, Result},
    source::{SourceSpec, DEFAULT_REPLAY_LIMIT},
    strings,
    words::WordOrder,
};

/// Upper bound for `--chunk-words` and `--buffer-words`: 1 GiB of words.
pub const MAX_WORDS_PER_READ: usize = (1 << 30) / 4;

fn check_word_count(flag: &str, words: usize) -> Result<()> {
    if words > MAX_WORDS_PER_READ {
        return Err(Error::Config(format!(
            "{} must be at most {} words",
            flag, MAX_WORDS_PER_READ
        )));
    }
    Ok(())
}

#[derive(Parser, Debug)]
#[command(name = "wordfeed", version)]
#[command(
    about = "Feed 32-bit words from a file or stdin into a randomness test battery",
    long_about = None
)]
pub struct Cli {
    /// Read words from this file
    #[arg(long, conflicts_with = "stdin", required_unless_present = "stdin")]
    pub file: Option<PathBuf>,

    /// Read words from standard input
    #[arg(long)]
    pub stdin: bool,

    /// TestU01 battery to run [default: small-crush]
    #[arg(long, value_enum, conflicts_with_all = ["stdout", "command"])]
    pub battery: Option<BatteryKind>,

    /// Stream the words to standard output instead of running a battery
    #[arg(long, conflicts_with = "command")]
    pub stdout: bool,

    /// Stop after this many words (stdout and command targets only)
    #[arg(long)]
    pub limit: Option<u64>,

    /// Words per chunk written to stdout or a command
    #[arg(long, default_value_t = DEFAULT_CHUNK_WORDS)]
    pub chunk_words: usize,

    /// Prefetch this many words per read, 0 reads one word at a time
    #[arg(long, default_value_t = 0)]
    pub buffer_words: usize,

    /// Byte order of the words in the source
    #[arg(long, value_enum, default_value_t = WordOrder::Native)]
    pub byte_order: WordOrder,

    /// Name the generator is reported under
    #[arg(long, default_value = strings::DEFAULT_GENERATOR_NAME)]
    pub name: String,

    /// Bytes of stdin kept so the stream can be replayed [default: 64 MiB]
    #[arg(long, requires = "stdin")]
    pub replay_limit: Option<usize>,

    /// External test program and its arguments, given after `--`
    #[arg(last = true)]
    pub command: Vec<String>,
}

/// Who consumes the words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    TestU01(BatteryKind),
    Stdout,
    Command { program: String, args: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    pub source: SourceSpec,
    pub target: Target,
    pub name: String,
    pub order: WordOrder,
    /// Prefetch capacity in words, `None` for the unbuffered reader.
    pub buffer_words: Option<usize>,
    pub chunk_words: usize,
    pub limit: Option<u64>,
}

impl Cli {
    pub fn into_config(self) -> Result<HarnessConfig> {
        let source = match self.file {
            Some(path) => SourceSpec::File(path),
            None => SourceSpec::Stdin {
                replay_limit: self.replay_limit.unwrap_or(DEFAULT_REPLAY_LIMIT),
            },
        };
        let mut command = self.command.into_iter();
        let target = match command.next() {
            Some(program) => Target::Command {
                program,
                args: command.collect(),
            },
            None if self.stdout => Target::Stdout,
            None => Target::TestU01(self.battery.unwrap_or(BatteryKind::SmallCrush)),
        };
        if self.chunk_words == 0 {
            return Err(Error::Config("--chunk-words must be at least 1".to_owned()));
        }
        check_word_count("--chunk-words", self.chunk_words)?;
        check_word_count("--buffer-words", self.buffer_words)?;
        if self.limit.is_some() && matches!(target, Target::TestU01(_)) {
            return Err(Error::Config(
                "--limit only applies to --stdout or an external command".to_owned(),
            ));
        }
        Ok(HarnessConfig {
            source,
            target,
            name: self.name,
            order: self.byte_order,
            buffer_words: (self.buffer_words > 0).then_some(self.buffer_words),
            chunk_words: self.chunk_words,
            limit: self.limit,
        })
    }
}
