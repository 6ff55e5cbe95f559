// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Readers that turn a byte source into an endless stream of u32 words.
//! When the source runs out it is restarted, so a finite capture
//! can feed a battery that asks for more words than it holds.
//! The output then repeats with a period of the source length.

use std::io::{self, Read};

use byteorder::{BigEndian, ByteOrder, LittleEndian, NativeEndian};
use log::{debug, warn};

use crate::{
    error::{Error, Result},
    source::ByteSource,
};

/// 2^-32, maps a word onto [0, 1).
const INV32: f64 = 1.0 / 4294967296.0;

/// Byte order used to decode words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum WordOrder {
    #[default]
    Native,
    Little,
    Big,
}

impl WordOrder {
    pub fn decode(self, bytes: &[u8]) -> u32 {
        match self {
            WordOrder::Native => NativeEndian::read_u32(bytes),
            WordOrder::Little => LittleEndian::read_u32(bytes),
            WordOrder::Big => BigEndian::read_u32(bytes),
        }
    }

    pub fn encode(self, word: u32, bytes: &mut [u8]) {
        match self {
            WordOrder::Native => NativeEndian::write_u32(bytes, word),
            WordOrder::Little => LittleEndian::write_u32(bytes, word),
            WordOrder::Big => BigEndian::write_u32(bytes, word),
        }
    }
}

/// General trait for word streams.
pub trait WordSource {
    /// Return the next word and advance one step.
    /// Restarts the source once when it is exhausted.
    fn next_word(&mut self) -> Result<u32>;
    /// Return the next word without advancing.
    fn peek_word(&mut self) -> Result<u32>;
    /// Number of times the source was restarted.
    fn wraps(&self) -> u64;
}

/// Read until `buf` is full or the reader reports end of stream.
/// Returns the number of bytes read.
fn read_full<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn note_wrap(wraps: u64, words_read: u64) {
    if wraps == 0 && words_read > 0 {
        warn!(
            "Source exhausted after {} words, output repeats from here on",
            words_read
        );
    } else {
        debug!("Source restarted ({} wraps)", wraps + 1);
    }
}

/// Reads one word per call straight from the source.
pub struct WordReader<S> {
    source: S,
    order: WordOrder,
    pending: Option<u32>,
    words_read: u64,
    wraps: u64,
}

impl<S: ByteSource> WordReader<S> {
    pub fn new(source: S, order: WordOrder) -> Self {
        WordReader {
            source,
            order,
            pending: None,
            words_read: 0,
            wraps: 0,
        }
    }

    fn try_read(&mut self) -> Result<Option<u32>> {
        let mut bytes = [0u8; 4];
        match read_full(&mut self.source, &mut bytes)? {
            4 => {
                self.words_read += 1;
                Ok(Some(self.order.decode(&bytes)))
            }
            0 => Ok(None),
            partial => {
                debug!("Dropping {} trailing bytes", partial);
                Ok(None)
            }
        }
    }

    fn read_word(&mut self) -> Result<u32> {
        if let Some(word) = self.try_read()? {
            return Ok(word);
        }
        self.source.restart()?;
        let word = self.try_read()?.ok_or(Error::EmptySource)?;
        note_wrap(self.wraps, self.words_read - 1);
        self.wraps += 1;
        Ok(word)
    }
}

impl<S: ByteSource> WordSource for WordReader<S> {
    fn next_word(&mut self) -> Result<u32> {
        match self.pending.take() {
            Some(word) => Ok(word),
            None => self.read_word(),
        }
    }

    fn peek_word(&mut self) -> Result<u32> {
        if let Some(word) = self.pending {
            return Ok(word);
        }
        let word = self.read_word()?;
        self.pending = Some(word);
        Ok(word)
    }

    fn wraps(&self) -> u64 {
        self.wraps
    }
}

/// Reads words in bulk into a fixed prefetch buffer.
/// Produces exactly the sequence a `WordReader` would.
pub struct BufferedWordReader<S> {
    source: S,
    order: WordOrder,
    bytes: Vec<u8>,
    buf: Vec<u32>,
    buf_pos: usize,
    buf_len: usize,
    words_read: u64,
    wraps: u64,
}

impl<S: ByteSource> BufferedWordReader<S> {
    /// `capacity` is counted in words and must not be zero.
    pub fn new(source: S, capacity: usize, order: WordOrder) -> Self {
        assert!(capacity > 0, "prefetch buffer needs room for a word");
        BufferedWordReader {
            source,
            order,
            bytes: vec![0; capacity * 4],
            buf: vec![0; capacity],
            buf_pos: 0,
            buf_len: 0,
            words_read: 0,
            wraps: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    fn refill(&mut self) -> Result<usize> {
        let got = read_full(&mut self.source, &mut self.bytes)?;
        if got % 4 != 0 {
            debug!("Dropping {} trailing bytes", got % 4);
        }
        let order = self.order;
        let words = got / 4;
        for (slot, chunk) in self.buf.iter_mut().zip(self.bytes[..words * 4].chunks_exact(4)) {
            *slot = order.decode(chunk);
        }
        self.buf_pos = 0;
        self.buf_len = words;
        self.words_read += words as u64;
        Ok(words)
    }

    /// Make sure at least one word is waiting in the buffer.
    fn fill(&mut self) -> Result<()> {
        if self.buf_pos < self.buf_len || self.refill()? > 0 {
            return Ok(());
        }
        let words_before = self.words_read;
        self.source.restart()?;
        if self.refill()? == 0 {
            return Err(Error::EmptySource);
        }
        note_wrap(self.wraps, words_before);
        self.wraps += 1;
        Ok(())
    }
}

impl<S: ByteSource> WordSource for BufferedWordReader<S> {
    fn next_word(&mut self) -> Result<u32> {
        self.fill()?;
        let word = self.buf[self.buf_pos];
        self.buf_pos += 1;
        Ok(word)
    }

    fn peek_word(&mut self) -> Result<u32> {
        self.fill()?;
        Ok(self.buf[self.buf_pos])
    }

    fn wraps(&self) -> u64 {
        self.wraps
    }
}

/// Named generator handed to a battery.
/// Borrows the word source for the duration of a run.
pub struct Generator<'a> {
    name: String,
    source: &'a mut dyn WordSource,
    pulled: u64,
}

impl<'a> Generator<'a> {
    pub fn new(name: impl Into<String>, source: &'a mut dyn WordSource) -> Self {
        Generator {
            name: name.into(),
            source,
            pulled: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Pull the next 32 random bits.
    pub fn next_bits(&mut self) -> Result<u32> {
        let word = self.source.next_word()?;
        self.pulled += 1;
        Ok(word)
    }

    /// Pull the next word scaled to [0, 1).
    pub fn next_u01(&mut self) -> Result<f64> {
        Ok(self.next_bits()? as f64 * INV32)
    }

    /// Check that a word is available without consuming it.
    pub fn peek(&mut self) -> Result<u32> {
        self.source.peek_word()
    }

    /// Words handed out so far.
    pub fn pulled(&self) -> u64 {
        self.pulled
    }

    pub fn wraps(&self) -> u64 {
        self.source.wraps()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Replay;
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use rstest::rstest;
    use std::io::{Cursor, Write};

    fn le_bytes(words: &[u32]) -> Vec<u8> {
        words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    fn take(source: &mut dyn WordSource, n: usize) -> Vec<u32> {
        (0..n).map(|_| source.next_word().unwrap()).collect()
    }

    fn readers(bytes: Vec<u8>, capacity: usize) -> Vec<Box<dyn WordSource>> {
        vec![
            Box::new(WordReader::new(Cursor::new(bytes.clone()), WordOrder::Little)),
            Box::new(BufferedWordReader::new(
                Cursor::new(bytes),
                capacity,
                WordOrder::Little,
            )),
        ]
    }

    #[test]
    fn three_words_wrap_with_period_three() {
        let bytes = vec![1, 0, 0, 0, 2, 0, 0, 0, 3, 0, 0, 0];
        for mut reader in readers(bytes, 2) {
            assert_eq!(take(reader.as_mut(), 5), vec![1, 2, 3, 1, 2]);
            assert_eq!(reader.wraps(), 1);
        }
    }

    #[rstest]
    #[case(2, 1)]
    #[case(5, 3)]
    #[case(7, 16)]
    #[case(64, 8)]
    fn wraparound_is_cyclic(#[case] n: usize, #[case] capacity: usize) {
        let words: Vec<u32> = (0..n as u32).map(|i| i.wrapping_mul(0x9e3779b9)).collect();
        let expected: Vec<u32> = words.iter().cycle().take(3 * n + 2).copied().collect();
        for mut reader in readers(le_bytes(&words), capacity) {
            assert_eq!(take(reader.as_mut(), 3 * n + 2), expected);
            assert_eq!(reader.wraps(), 3);
        }
    }

    #[rstest]
    #[case(1)]
    #[case(2)]
    #[case(3)]
    fn trailing_bytes_never_surface(#[case] r: usize) {
        let mut bytes = le_bytes(&[10, 20, 30]);
        bytes.extend(std::iter::repeat(0xff).take(r));
        for mut reader in readers(bytes, 2) {
            assert_eq!(take(reader.as_mut(), 7), vec![10, 20, 30, 10, 20, 30, 10]);
        }
    }

    #[rstest]
    #[case(0)]
    #[case(3)]
    fn source_without_a_full_word_is_an_error(#[case] len: usize) {
        for mut reader in readers(vec![0xab; len], 4) {
            assert!(matches!(reader.next_word(), Err(Error::EmptySource)));
            assert!(matches!(reader.peek_word(), Err(Error::EmptySource)));
            assert_eq!(reader.wraps(), 0);
        }
    }

    /// Yields one byte per read, like a slow pipe.
    struct Dribble(Cursor<Vec<u8>>);

    impl Read for Dribble {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let end = buf.len().min(1);
            self.0.read(&mut buf[..end])
        }
    }

    fn piped(bytes: Vec<u8>, limit: usize, capacity: usize) -> Vec<Box<dyn WordSource>> {
        vec![
            Box::new(WordReader::new(
                Replay::new(Dribble(Cursor::new(bytes.clone())), limit),
                WordOrder::Little,
            )),
            Box::new(BufferedWordReader::new(
                Replay::new(Dribble(Cursor::new(bytes)), limit),
                capacity,
                WordOrder::Little,
            )),
        ]
    }

    #[test]
    fn stdin_replay_wraps_past_trailing_bytes() {
        let mut bytes = le_bytes(&[1, 2, 3]);
        bytes.push(0xee);
        for mut reader in piped(bytes, 13, 2) {
            assert_eq!(take(reader.as_mut(), 8), vec![1, 2, 3, 1, 2, 3, 1, 2]);
            assert_eq!(reader.wraps(), 2);
        }
    }

    #[test]
    fn stdin_replay_overflow_is_not_restartable() {
        let mut bytes = le_bytes(&[1, 2, 3]);
        bytes.push(0xee);
        for mut reader in piped(bytes, 12, 2) {
            assert_eq!(take(reader.as_mut(), 3), vec![1, 2, 3]);
            assert!(matches!(
                reader.next_word(),
                Err(Error::NotRestartable { limit: 12 })
            ));
        }
    }

    #[test]
    fn buffered_matches_unbuffered() {
        let mut rng = StdRng::seed_from_u64(1931571603);
        let words: Vec<u32> = (0..1000).map(|_| rng.random()).collect();
        let bytes = le_bytes(&words);
        let mut plain = WordReader::new(Cursor::new(bytes.clone()), WordOrder::Native);
        for capacity in [1, 3, 64, 999, 1000, 4096] {
            let mut buffered =
                BufferedWordReader::new(Cursor::new(bytes.clone()), capacity, WordOrder::Native);
            assert_eq!(buffered.capacity(), capacity);
            let mut fresh = WordReader::new(Cursor::new(bytes.clone()), WordOrder::Native);
            assert_eq!(take(&mut buffered, 2500), take(&mut fresh, 2500));
        }
        assert_eq!(take(&mut plain, 1000), {
            let mut native = vec![0u32; 1000];
            NativeEndian::read_u32_into(&bytes, &mut native);
            native
        });
    }

    #[test]
    fn peek_does_not_consume() {
        for mut reader in readers(le_bytes(&[4, 5]), 1) {
            assert_eq!(reader.peek_word().unwrap(), 4);
            assert_eq!(reader.peek_word().unwrap(), 4);
            assert_eq!(take(reader.as_mut(), 3), vec![4, 5, 4]);
            assert_eq!(reader.peek_word().unwrap(), 5);
        }
    }

    #[test]
    fn big_endian_decoding() {
        let mut reader = WordReader::new(Cursor::new(vec![0, 0, 1, 2]), WordOrder::Big);
        assert_eq!(reader.next_word().unwrap(), 0x0102);
        let mut out = [0u8; 4];
        WordOrder::Big.encode(0x0102, &mut out);
        assert_eq!(out, [0, 0, 1, 2]);
    }

    #[test]
    fn reads_from_a_file_past_its_end() {
        let mut tmp = tempfile::tempfile().unwrap();
        tmp.write_all(&le_bytes(&[7, 8, 9])).unwrap();
        let mut reader = BufferedWordReader::new(tmp, 2, WordOrder::Little);
        // The write left the cursor at the end, so the first pull already wraps.
        assert_eq!(take(&mut reader, 4), vec![7, 8, 9, 7]);
        assert_eq!(reader.wraps(), 2);
    }

    #[test]
    fn generator_counts_pulls() {
        let mut reader = WordReader::new(Cursor::new(le_bytes(&[0, u32::MAX])), WordOrder::Little);
        let mut gen = Generator::new("pipe_gen", &mut reader);
        assert_eq!(gen.name(), "pipe_gen");
        assert_eq!(gen.peek().unwrap(), 0);
        assert_eq!(gen.next_u01().unwrap(), 0.0);
        let top = gen.next_u01().unwrap();
        assert!(top < 1.0 && top > 0.999_999_999);
        assert_eq!(gen.next_bits().unwrap(), 0);
        assert_eq!(gen.pulled(), 3);
        assert_eq!(gen.wraps(), 1);
    }
}
