// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Byte sources that can be restarted from their first byte.
//! Files restart by seeking, standard input by replaying a captured copy.

use std::{
    fs::File,
    io::{self, Read, Seek, SeekFrom},
    path::PathBuf,
};

use log::{debug, info};

use crate::{
    error::{Error, Result},
    utils,
};

/// Default number of stdin bytes kept for replay: 64 MiB.
pub const DEFAULT_REPLAY_LIMIT: usize = 1 << 26;

/// Where the words come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    File(PathBuf),
    Stdin { replay_limit: usize },
}

/// A stream that can be moved back to its first byte.
pub trait Restart {
    fn restart(&mut self) -> Result<()>;
}

/// Everything the word readers need from a source.
pub trait ByteSource: Read + Restart {}

impl<T: Read + Restart + ?Sized> ByteSource for T {}

impl Restart for File {
    fn restart(&mut self) -> Result<()> {
        self.seek(SeekFrom::Start(0))?;
        Ok(())
    }
}

impl<T: AsRef<[u8]>> Restart for io::Cursor<T> {
    fn restart(&mut self) -> Result<()> {
        self.set_position(0);
        Ok(())
    }
}

impl<S: Restart + ?Sized> Restart for Box<S> {
    fn restart(&mut self) -> Result<()> {
        (**self).restart()
    }
}

/// Makes a forward-only reader restartable by keeping every byte it yields.
/// Capturing stops once more than `limit` bytes went through,
/// after that a restart fails with `Error::NotRestartable`.
pub struct Replay<R> {
    inner: R,
    captured: Vec<u8>,
    pos: usize,
    limit: usize,
    overflowed: bool,
}

impl<R: Read> Replay<R> {
    pub fn new(inner: R, limit: usize) -> Self {
        Replay {
            inner,
            captured: Vec::new(),
            pos: 0,
            limit,
            overflowed: false,
        }
    }
}

impl<R: Read> Read for Replay<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos < self.captured.len() {
            let n = buf.len().min(self.captured.len() - self.pos);
            buf[..n].copy_from_slice(&self.captured[self.pos..self.pos + n]);
            self.pos += n;
            return Ok(n);
        }
        let n = self.inner.read(buf)?;
        if !self.overflowed {
            if self.captured.len() + n <= self.limit {
                self.captured.extend_from_slice(&buf[..n]);
                self.pos = self.captured.len();
            } else {
                debug!(
                    "Replay capture exceeded {}, stream is no longer restartable",
                    utils::format_byte_count(self.limit as u64)
                );
                self.overflowed = true;
                self.captured = Vec::new();
                self.pos = 0;
            }
        }
        Ok(n)
    }
}

impl<R: Read> Restart for Replay<R> {
    fn restart(&mut self) -> Result<()> {
        if self.overflowed {
            return Err(Error::NotRestartable { limit: self.limit });
        }
        debug!("Replaying {} captured bytes", self.captured.len());
        self.pos = 0;
        Ok(())
    }
}

/// An opened source together with what is known about its size.
pub struct OpenedSource {
    pub reader: Box<dyn ByteSource>,
    pub label: String,
    /// Byte length, when the source is a file.
    pub len: Option<u64>,
}

/// Open the configured source.
/// Only a file can fail to open, that failure is `Error::Open`.
pub fn open(spec: &SourceSpec) -> Result<OpenedSource> {
    match spec {
        SourceSpec::File(path) => {
            let file = File::open(path).map_err(|source| Error::Open {
                path: path.clone(),
                source,
            })?;
            let len = file.metadata()?.len();
            info!(
                "Reading words from {} ({}, {} full words per pass)",
                path.display(),
                utils::format_byte_count(len),
                len / 4
            );
            if len % 4 != 0 {
                debug!("{} trailing bytes will never be read", len % 4);
            }
            Ok(OpenedSource {
                reader: Box::new(file),
                label: path.display().to_string(),
                len: Some(len),
            })
        }
        SourceSpec::Stdin { replay_limit } => {
            info!(
                "Reading words from stdin (replay capture up to {})",
                utils::format_byte_count(*replay_limit as u64)
            );
            Ok(OpenedSource {
                reader: Box::new(Replay::new(io::stdin(), *replay_limit)),
                label: "stdin".to_owned(),
                len: None,
            })
        }
    }
}
