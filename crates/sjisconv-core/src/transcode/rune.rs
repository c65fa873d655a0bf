//! Rune-at-a-time output adapter.
//!
//! This module provides the [`RuneSink`] trait and [`RuneWriter`], the
//! adapter that owns the placeholder substitution policy. A rune that the
//! destination encoding cannot represent, or whose bytes fail to reach the
//! sink, is replaced by a single placeholder byte and the stream goes on.
//! Only a failure to write the placeholder itself is reported.

use encoding_rs::{Encoder, EncoderResult, Encoding};
use std::io::{self, Write};
use tracing::trace;

/// Upper bound on the bytes a single rune produces in either supported
/// destination encoding (UTF-8 needs four, Shift-JIS two).
const MAX_RUNE_BYTES: usize = 8;

/// Placeholder written for runes the destination cannot hold
pub const DEFAULT_PLACEHOLDER: u8 = b'?';

/// Accepts decoded code points one by one.
///
/// Implementations turn each rune into zero or more destination bytes and
/// must not fail the stream because a single rune could not be written.
pub trait RuneSink {
    /// Write one decoded code point
    fn put_rune(&mut self, rune: char) -> io::Result<()>;

    /// Write every code point of `text` in order
    fn put_str(&mut self, text: &str) -> io::Result<()> {
        for rune in text.chars() {
            self.put_rune(rune)?;
        }
        Ok(())
    }
}

/// Counters kept by a [`RuneWriter`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuneCounts {
    /// Runes encoded and written as-is
    pub written: u64,
    /// Runes replaced by the placeholder byte
    pub substituted: u64,
}

/// Encodes runes into a destination encoding, substituting a placeholder
/// byte whenever a rune cannot be encoded or written.
pub struct RuneWriter<W: Write> {
    inner: W,
    encoder: Encoder,
    placeholder: u8,
    counts: RuneCounts,
}

impl<W: Write> RuneWriter<W> {
    /// Creates a writer producing `encoding` with the default `'?'` placeholder
    pub fn new(inner: W, encoding: &'static Encoding) -> Self {
        Self::with_placeholder(inner, encoding, DEFAULT_PLACEHOLDER)
    }

    /// Creates a writer with a custom placeholder byte
    pub fn with_placeholder(inner: W, encoding: &'static Encoding, placeholder: u8) -> Self {
        Self {
            inner,
            encoder: encoding.new_encoder(),
            placeholder,
            counts: RuneCounts::default(),
        }
    }

    /// Counters accumulated so far
    pub fn counts(&self) -> RuneCounts {
        self.counts
    }

    /// Borrow the wrapped sink
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Write the placeholder byte directly, without attempting an encode.
    pub fn put_placeholder(&mut self) -> io::Result<()> {
        self.inner.write_all(&[self.placeholder])?;
        self.counts.substituted += 1;
        Ok(())
    }

    /// Finish the encoder, flush the sink and hand it back.
    pub fn finish(mut self) -> io::Result<(W, RuneCounts)> {
        let mut out = [0u8; MAX_RUNE_BYTES];
        let (_, _, written) = self
            .encoder
            .encode_from_utf8_without_replacement("", &mut out, true);
        self.inner.write_all(&out[..written])?;
        self.inner.flush()?;
        Ok((self.inner, self.counts))
    }

    /// Encode a rune, or `None` when the destination has no mapping for it.
    fn encode(&mut self, rune: char) -> Option<([u8; MAX_RUNE_BYTES], usize)> {
        let mut utf8 = [0u8; 4];
        let mut out = [0u8; MAX_RUNE_BYTES];
        let (result, _, written) = self.encoder.encode_from_utf8_without_replacement(
            rune.encode_utf8(&mut utf8),
            &mut out,
            false,
        );
        match result {
            EncoderResult::InputEmpty => Some((out, written)),
            EncoderResult::Unmappable(_) | EncoderResult::OutputFull => None,
        }
    }
}

impl<W: Write> RuneSink for RuneWriter<W> {
    fn put_rune(&mut self, rune: char) -> io::Result<()> {
        match self.encode(rune) {
            Some((bytes, len)) => match self.inner.write_all(&bytes[..len]) {
                Ok(()) => {
                    self.counts.written += 1;
                    return Ok(());
                }
                Err(e) => trace!("write of U+{:04X} failed, substituting: {}", rune as u32, e),
            },
            None => trace!("U+{:04X} is unmappable, substituting", rune as u32),
        }
        self.put_placeholder()
    }
}
