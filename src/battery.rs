// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Test batteries a generator can be handed to.
//! The tests themselves run elsewhere: in TestU01 when linked,
//! or in whatever program reads the words we stream out.

use std::{
    fmt,
    io::{self, Write},
    process::{Child, ChildStdin, Command, Stdio},
    time::Instant,
};

use log::{debug, info, trace};

use crate::{
    error::{Error, Result},
    strings, utils,
    words::{Generator, WordOrder},
};

/// Words per written chunk.
pub const DEFAULT_CHUNK_WORDS: usize = 8192;
/// Chunks between progress log lines.
const PROGRESS_EVERY: u64 = 4000;

/// Interface every battery implements.
pub trait Battery {
    fn name(&self) -> &str;
    /// Pull words from `gen` until the battery is done with it.
    fn run(&mut self, gen: &mut Generator<'_>) -> Result<()>;
}

/// TestU01 batteries, from quick to exhaustive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum BatteryKind {
    SmallCrush,
    Crush,
    BigCrush,
}

impl BatteryKind {
    pub fn label(self) -> &'static str {
        strings::BATTERY_NAMES[self as usize]
    }
}

impl fmt::Display for BatteryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Streams words into a writer in fixed size chunks.
/// Without a limit it keeps going until the reader hangs up.
pub struct WriterBattery<W> {
    name: String,
    writer: W,
    order: WordOrder,
    chunk_words: usize,
    limit: Option<u64>,
    progress_every: u64,
}

impl<W: Write> WriterBattery<W> {
    pub fn new(name: impl Into<String>, writer: W, order: WordOrder, chunk_words: usize) -> Self {
        assert!(chunk_words > 0);
        WriterBattery {
            name: name.into(),
            writer,
            order,
            chunk_words,
            limit: None,
            progress_every: PROGRESS_EVERY,
        }
    }

    /// Stop after `words` words.
    pub fn with_limit(mut self, words: Option<u64>) -> Self {
        self.limit = words;
        self
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn log_progress(&self, sent: u64, start: Instant) {
        let rate = utils::word_rate(sent, start.elapsed());
        match self.limit {
            Some(limit) => info!(
                "{:.3}% Sent {}/{} words ({:.0} words/s)",
                100.0 * sent as f64 / limit as f64,
                sent,
                limit,
                rate
            ),
            None => info!(
                "Sent {} words ({}) at {:.0} words/s",
                sent,
                utils::format_byte_count(sent * 4),
                rate
            ),
        }
    }
}

impl<W: Write> Battery for WriterBattery<W> {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&mut self, gen: &mut Generator<'_>) -> Result<()> {
        info!("--- {} initialized ---", self.name);
        info!("Chunk size = {} words", self.chunk_words);
        if let Some(limit) = self.limit {
            info!("Total words to send = {}", limit);
        }
        let start = Instant::now();
        let chunk_words = match self.limit {
            Some(limit) => limit.min(self.chunk_words as u64) as usize,
            None => self.chunk_words,
        };
        let mut chunk = vec![0u8; chunk_words * 4];
        let mut sent: u64 = 0;
        let mut chunks: u64 = 0;
        loop {
            let n = match self.limit {
                Some(limit) => (limit - sent).min(chunk_words as u64) as usize,
                None => chunk_words,
            };
            if n == 0 {
                break;
            }
            for slot in chunk[..n * 4].chunks_exact_mut(4) {
                let word = gen.next_bits()?;
                trace!("{}", word);
                self.order.encode(word, slot);
            }
            match self
                .writer
                .write_all(&chunk[..n * 4])
                .and_then(|_| self.writer.flush())
            {
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                    info!(
                        "--- {} after {} words. ---",
                        strings::STREAM_CLOSED_STR,
                        sent
                    );
                    return Ok(());
                }
                result => result?,
            }
            sent += n as u64;
            chunks += 1;
            if chunks % self.progress_every == 0 {
                self.log_progress(sent, start);
            }
        }
        info!("--- {} {} words. ---", strings::COMPLETED_STR, sent);
        Ok(())
    }
}

/// Spawns an external test program and streams words into its stdin,
/// e.g. `dieharder -a -g 200` or `RNG_test stdin32`.
pub struct CommandBattery {
    program: String,
    args: Vec<String>,
    order: WordOrder,
    chunk_words: usize,
    limit: Option<u64>,
}

impl CommandBattery {
    pub fn new(program: String, args: Vec<String>, order: WordOrder, chunk_words: usize) -> Self {
        CommandBattery {
            program,
            args,
            order,
            chunk_words,
            limit: None,
        }
    }

    pub fn with_limit(mut self, words: Option<u64>) -> Self {
        self.limit = words;
        self
    }

    fn spawn(&self) -> Result<(Child, ChildStdin)> {
        debug!("Spawning {} {:?}", self.program, self.args);
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .spawn()?;
        match child.stdin.take() {
            Some(stdin) => Ok((child, stdin)),
            None => {
                let _ = child.kill();
                Err(io::Error::new(io::ErrorKind::Other, "child stdin was not captured").into())
            }
        }
    }
}

impl Battery for CommandBattery {
    fn name(&self) -> &str {
        &self.program
    }

    fn run(&mut self, gen: &mut Generator<'_>) -> Result<()> {
        let (mut child, stdin) = self.spawn()?;
        let mut writer = WriterBattery::new(self.program.clone(), stdin, self.order, self.chunk_words)
            .with_limit(self.limit);
        if let Err(err) = writer.run(gen) {
            let _ = child.kill();
            let _ = child.wait();
            return Err(err);
        }
        // Closing the pipe lets the child see end of input.
        drop(writer);
        let status = child.wait()?;
        if !status.success() {
            return Err(Error::BatteryFailed {
                name: self.program.clone(),
                status,
            });
        }
        Ok(())
    }
}
