//! Streaming transcoder between UTF-8 and Shift-JIS.
//!
//! ## Algorithm Overview
//!
//! 1. Read the source in fixed-size chunks
//! 2. Decode each chunk in the source encoding without replacement
//! 3. Hand every decoded rune to a [`RuneWriter`] for the destination encoding
//! 4. On a malformed source sequence, apply the [`MalformedPolicy`]
//!
//! The decoder keeps partial sequences across chunk boundaries, so a rune
//! split between two reads is decoded once the second read arrives.

mod rune;

use crate::detect::CharsetVerdict;
use crate::error::{Error, Result};
use encoding_rs::{Decoder, DecoderResult, Encoding, SHIFT_JIS, UTF_8};
use std::fmt;
use std::io::{self, Read, Write};
use tracing::{debug, trace};

pub use rune::{RuneCounts, RuneSink, RuneWriter, DEFAULT_PLACEHOLDER};

/// Default read size for the source stream
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;

/// Direction of a conversion, fixed by the detector's verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Decode UTF-8, encode Shift-JIS
    Utf8ToShiftJis,
    /// Decode Shift-JIS, encode UTF-8
    ShiftJisToUtf8,
}

impl Direction {
    /// UTF-8 sources are always converted to Shift-JIS; everything else is
    /// assumed to be Shift-JIS and converted to UTF-8.
    pub fn from_verdict(verdict: &CharsetVerdict) -> Self {
        if verdict.is_utf8() {
            Self::Utf8ToShiftJis
        } else {
            Self::ShiftJisToUtf8
        }
    }

    /// Source encoding
    pub fn source(self) -> &'static Encoding {
        match self {
            Self::Utf8ToShiftJis => UTF_8,
            Self::ShiftJisToUtf8 => SHIFT_JIS,
        }
    }

    /// Destination encoding
    pub fn target(self) -> &'static Encoding {
        match self {
            Self::Utf8ToShiftJis => SHIFT_JIS,
            Self::ShiftJisToUtf8 => UTF_8,
        }
    }

    /// The opposite direction
    pub fn reverse(self) -> Self {
        match self {
            Self::Utf8ToShiftJis => Self::ShiftJisToUtf8,
            Self::ShiftJisToUtf8 => Self::Utf8ToShiftJis,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source().name(), self.target().name())
    }
}

/// What to do with a malformed sequence in a UTF-8 source.
///
/// Shift-JIS sources are not validated: malformed bytes decode to U+FFFD
/// whatever the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MalformedPolicy {
    /// Stop at the malformed sequence and drop the rest of the input
    #[default]
    Truncate,
    /// Write the placeholder for the malformed sequence and carry on
    Replace,
}

/// Configuration for the transcoder
#[derive(Debug, Clone)]
pub struct TranscodeOptions {
    /// Byte written in place of runes that cannot be encoded
    pub placeholder: u8,
    /// Handling of malformed UTF-8 input
    pub on_malformed: MalformedPolicy,
    /// Size of each read from the source
    pub chunk_size: usize,
}

impl Default for TranscodeOptions {
    fn default() -> Self {
        Self {
            placeholder: DEFAULT_PLACEHOLDER,
            on_malformed: MalformedPolicy::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl TranscodeOptions {
    /// Creates options with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the placeholder byte
    pub fn placeholder(mut self, placeholder: u8) -> Self {
        self.placeholder = placeholder;
        self
    }

    /// Sets the malformed-input policy
    pub fn on_malformed(mut self, policy: MalformedPolicy) -> Self {
        self.on_malformed = policy;
        self
    }

    /// Sets the read chunk size (at least one byte)
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }
}

/// Per-stream results of a transcode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranscodeStats {
    /// Direction the stream was converted in
    pub direction: Direction,
    /// Bytes read from the source
    pub bytes_read: u64,
    /// Runes written unchanged
    pub runes: u64,
    /// Runes (or malformed sequences) replaced by the placeholder
    pub placeholders: u64,
    /// Source offset where decoding stopped on malformed input
    pub truncated_at: Option<u64>,
}

impl TranscodeStats {
    fn new(direction: Direction) -> Self {
        Self {
            direction,
            bytes_read: 0,
            runes: 0,
            placeholders: 0,
            truncated_at: None,
        }
    }

    /// Returns true if the tail of the source was dropped
    pub fn is_truncated(&self) -> bool {
        self.truncated_at.is_some()
    }
}

/// Action taken for one malformed source sequence
enum Recovery {
    Stop,
    Placeholder,
    ReplacementCharacter,
}

/// Streaming UTF-8 / Shift-JIS transcoder
#[derive(Debug, Clone, Default)]
pub struct Transcoder {
    options: TranscodeOptions,
}

impl Transcoder {
    /// Creates a transcoder with default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transcoder with custom options
    pub fn with_options(options: TranscodeOptions) -> Self {
        Self { options }
    }

    /// Options in use
    pub fn options(&self) -> &TranscodeOptions {
        &self.options
    }

    /// Stream `src` into `dst`, converting in `direction`.
    ///
    /// The source is read to end of stream (or to the first malformed
    /// sequence under [`MalformedPolicy::Truncate`]). Read errors are
    /// returned as [`Error::StreamRead`]; a failed placeholder write or
    /// final flush as [`Error::StreamWrite`].
    pub fn transcode<R: Read, W: Write>(
        &self,
        mut src: R,
        dst: W,
        direction: Direction,
    ) -> Result<TranscodeStats> {
        let mut decoder = direction.source().new_decoder_without_bom_handling();
        let mut writer =
            RuneWriter::with_placeholder(dst, direction.target(), self.options.placeholder);
        let mut stats = TranscodeStats::new(direction);

        let mut input = vec![0u8; self.options.chunk_size];
        let mut decoded = String::with_capacity(decoded_capacity(&decoder, self.options.chunk_size));
        let mut consumed: u64 = 0;

        trace!("Transcoding {}", direction);

        'read: loop {
            let n = read_chunk(&mut src, &mut input).map_err(Error::StreamRead)?;
            stats.bytes_read += n as u64;
            let last = n == 0;
            let mut pending = &input[..n];

            loop {
                decoded.clear();
                let (result, read) =
                    decoder.decode_to_string_without_replacement(pending, &mut decoded, last);
                pending = &pending[read..];
                consumed += read as u64;
                writer.put_str(&decoded).map_err(Error::StreamWrite)?;

                match result {
                    DecoderResult::InputEmpty => break,
                    DecoderResult::OutputFull => continue,
                    DecoderResult::Malformed(bad, extra) => {
                        let offset = consumed.saturating_sub(u64::from(bad) + u64::from(extra));
                        match self.recovery(direction) {
                            Recovery::Stop => {
                                debug!(
                                    "Malformed {} at offset {}, dropping remaining input",
                                    direction.source().name(),
                                    offset
                                );
                                stats.truncated_at = Some(offset);
                                break 'read;
                            }
                            Recovery::Placeholder => {
                                trace!("Malformed sequence at offset {}, substituting", offset);
                                writer.put_placeholder().map_err(Error::StreamWrite)?;
                            }
                            Recovery::ReplacementCharacter => {
                                writer
                                    .put_rune(char::REPLACEMENT_CHARACTER)
                                    .map_err(Error::StreamWrite)?;
                            }
                        }
                    }
                }
            }

            if last {
                break;
            }
        }

        let (_, counts) = writer.finish().map_err(Error::StreamWrite)?;
        stats.runes = counts.written;
        stats.placeholders = counts.substituted;

        debug!(
            "Transcoded {} bytes ({}): {} runes, {} placeholders",
            stats.bytes_read, direction, stats.runes, stats.placeholders
        );
        Ok(stats)
    }

    /// Transcode an in-memory buffer.
    pub fn transcode_to_vec(
        &self,
        input: &[u8],
        direction: Direction,
    ) -> Result<(Vec<u8>, TranscodeStats)> {
        let mut out = Vec::with_capacity(input.len() + input.len() / 2);
        let stats = self.transcode(input, &mut out, direction)?;
        Ok((out, stats))
    }

    fn recovery(&self, direction: Direction) -> Recovery {
        match (direction, self.options.on_malformed) {
            (Direction::ShiftJisToUtf8, _) => Recovery::ReplacementCharacter,
            (Direction::Utf8ToShiftJis, MalformedPolicy::Truncate) => Recovery::Stop,
            (Direction::Utf8ToShiftJis, MalformedPolicy::Replace) => Recovery::Placeholder,
        }
    }
}

/// Read into `buf`, retrying on interruption. Returns 0 at end of stream.
fn read_chunk<R: Read>(src: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match src.read(buf) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

fn decoded_capacity(decoder: &Decoder, chunk_size: usize) -> usize {
    decoder
        .max_utf8_buffer_length_without_replacement(chunk_size)
        .unwrap_or(chunk_size.saturating_mul(3))
        .max(16)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{ChardetDetector, CharsetDetector, Confidence};
    use pretty_assertions::assert_eq;

    /// Reader that yields its data and then fails
    struct FailingReader<'a> {
        data: &'a [u8],
    }

    impl Read for FailingReader<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.data.is_empty() {
                return Err(io::Error::new(io::ErrorKind::Other, "device gone"));
            }
            let n = self.data.len().min(buf.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    /// Writer that rejects everything
    struct BrokenWriter;

    impl Write for BrokenWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "disk full"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_utf8_to_shift_jis_scenario() {
        let (out, stats) = Transcoder::new()
            .transcode_to_vec("あAB".as_bytes(), Direction::Utf8ToShiftJis)
            .unwrap();

        assert_eq!(out, vec![0x82, 0xA0, b'A', b'B']);
        assert_eq!(stats.runes, 3);
        assert_eq!(stats.placeholders, 0);
        assert!(!stats.is_truncated());
    }

    #[test]
    fn test_shift_jis_to_utf8_scenario() {
        let (out, stats) = Transcoder::new()
            .transcode_to_vec(&[0x82, 0xA0], Direction::ShiftJisToUtf8)
            .unwrap();

        assert_eq!(out, "あ".as_bytes().to_vec());
        assert_eq!(out.len(), 3);
        assert_eq!(stats.bytes_read, 2);
    }

    #[test]
    fn test_ascii_round_trip() {
        let ascii: Vec<u8> = (0u8..0x80).cycle().take(1000).collect();
        let transcoder = Transcoder::new();

        let (sjis, _) = transcoder
            .transcode_to_vec(&ascii, Direction::Utf8ToShiftJis)
            .unwrap();
        let (back, _) = transcoder
            .transcode_to_vec(&sjis, Direction::ShiftJisToUtf8)
            .unwrap();

        assert_eq!(sjis, ascii);
        assert_eq!(back, ascii);
    }

    #[test]
    fn test_unmappable_code_points_become_placeholder() {
        let transcoder = Transcoder::new();
        for rune in ['\u{1F600}', '\u{00E9}', '\u{0100}', '\u{00A0}', '\u{AC00}'] {
            let input = format!("前{}後", rune);
            let (out, stats) = transcoder
                .transcode_to_vec(input.as_bytes(), Direction::Utf8ToShiftJis)
                .unwrap();

            let (expected, _, _) = SHIFT_JIS.encode("前?後");
            assert_eq!(out, expected.into_owned(), "rune U+{:04X}", rune as u32);
            assert_eq!(stats.placeholders, 1);
        }
    }

    #[test]
    fn test_custom_placeholder_option() {
        let transcoder = Transcoder::with_options(TranscodeOptions::new().placeholder(b'*'));
        let (out, _) = transcoder
            .transcode_to_vec("x😀y".as_bytes(), Direction::Utf8ToShiftJis)
            .unwrap();
        assert_eq!(out, b"x*y".to_vec());
    }

    #[test]
    fn test_malformed_utf8_truncates() {
        let input = [b'a', b'b', 0xFF, b'c', b'd'];
        let (out, stats) = Transcoder::new()
            .transcode_to_vec(&input, Direction::Utf8ToShiftJis)
            .unwrap();

        assert_eq!(out, b"ab".to_vec());
        assert_eq!(stats.truncated_at, Some(2));
    }

    #[test]
    fn test_incomplete_utf8_at_end_truncates() {
        // "あ" is E3 81 82; cut after the second byte.
        let input = [b'o', b'k', 0xE3, 0x81];
        let (out, stats) = Transcoder::new()
            .transcode_to_vec(&input, Direction::Utf8ToShiftJis)
            .unwrap();

        assert_eq!(out, b"ok".to_vec());
        assert!(stats.is_truncated());
    }

    #[test]
    fn test_malformed_utf8_replace_policy() {
        let input = [b'a', b'b', 0xFF, b'c', b'd'];
        let transcoder =
            Transcoder::with_options(TranscodeOptions::new().on_malformed(MalformedPolicy::Replace));
        let (out, stats) = transcoder
            .transcode_to_vec(&input, Direction::Utf8ToShiftJis)
            .unwrap();

        assert_eq!(out, b"ab?cd".to_vec());
        assert_eq!(stats.placeholders, 1);
        assert!(!stats.is_truncated());
    }

    #[test]
    fn test_malformed_shift_jis_passes_replacement_character() {
        // 0x82 followed by an ASCII byte is not a valid double-byte pair.
        let (out, stats) = Transcoder::new()
            .transcode_to_vec(&[b'x', 0x82, b'!'], Direction::ShiftJisToUtf8)
            .unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with('x'));
        assert!(text.contains('\u{FFFD}'));
        assert!(!stats.is_truncated());
    }

    #[test]
    fn test_rune_split_across_chunks() {
        let text = "かなカナ漢字".repeat(50);
        let transcoder = Transcoder::with_options(TranscodeOptions::new().chunk_size(7));

        let (sjis, stats) = transcoder
            .transcode_to_vec(text.as_bytes(), Direction::Utf8ToShiftJis)
            .unwrap();
        let (expected, _, _) = SHIFT_JIS.encode(&text);

        assert_eq!(sjis, expected.into_owned());
        assert!(!stats.is_truncated());

        let (utf8, _) = transcoder
            .transcode_to_vec(&sjis, Direction::ShiftJisToUtf8)
            .unwrap();
        assert_eq!(String::from_utf8(utf8).unwrap(), text);
    }

    #[test]
    fn test_read_error_is_fatal() {
        let reader = FailingReader { data: b"partial" };
        let err = Transcoder::new()
            .transcode(reader, Vec::new(), Direction::Utf8ToShiftJis)
            .unwrap_err();
        assert!(matches!(err, Error::StreamRead(_)));
    }

    #[test]
    fn test_placeholder_write_failure_is_fatal() {
        let err = Transcoder::new()
            .transcode(&b"abc"[..], BrokenWriter, Direction::Utf8ToShiftJis)
            .unwrap_err();
        assert!(matches!(err, Error::StreamWrite(_)));
    }

    #[test]
    fn test_direction_follows_verdict() {
        let detector = ChardetDetector::new();
        for sample in [&b""[..], &b"ascii only"[..], "あAB".as_bytes(), "漢字".as_bytes()] {
            let verdict = detector.detect(sample).unwrap();
            assert!(verdict.is_utf8());
            assert_eq!(Direction::from_verdict(&verdict), Direction::Utf8ToShiftJis);
        }

        let legacy = CharsetVerdict::new("Shift_JIS", Confidence::High);
        assert_eq!(Direction::from_verdict(&legacy), Direction::ShiftJisToUtf8);
        let other = CharsetVerdict::new("windows-1252", Confidence::Low);
        assert_eq!(Direction::from_verdict(&other), Direction::ShiftJisToUtf8);
    }

    #[test]
    fn test_direction_display() {
        assert_eq!(Direction::Utf8ToShiftJis.to_string(), "UTF-8 -> Shift_JIS");
        assert_eq!(Direction::Utf8ToShiftJis.reverse(), Direction::ShiftJisToUtf8);
    }
}
