//! Charset detection.
//!
//! The converter only ever asks one question of a buffer: is it UTF-8?
//! Detection still runs a full statistical classifier (`chardetng`) so the
//! verdict carries a real label, but every label other than `"UTF-8"` is
//! treated as Shift-JIS downstream.
//!
//! ## Extensibility
//!
//! The [`CharsetDetector`] trait allows a different classifier:
//!
//! ```no_run
//! use sjisconv_core::detect::{CharsetDetector, CharsetVerdict, Confidence};
//! use sjisconv_core::Result;
//!
//! struct AlwaysLegacy;
//!
//! impl CharsetDetector for AlwaysLegacy {
//!     fn detect(&self, _buffer: &[u8]) -> Result<CharsetVerdict> {
//!         Ok(CharsetVerdict::new("Shift_JIS", Confidence::Low))
//!     }
//! }
//! ```

use crate::error::Result;
use chardetng::EncodingDetector;
use encoding_rs::UTF_8;
use std::fmt;
use std::io::{Read, Seek, SeekFrom};
use tracing::{debug, trace};

/// Label reported for UTF-8 input
pub const UTF8_LABEL: &str = "UTF-8";

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// How much the classifier trusts its label
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Confidence {
    /// The guessed encoding does not decode the buffer cleanly
    Low,
    /// The guessed encoding decodes the whole buffer without errors
    High,
    /// ASCII-only input, or an explicit byte order mark
    Certain,
}

/// Outcome of running a detector over a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharsetVerdict {
    /// Encoding label, e.g. `"UTF-8"` or `"Shift_JIS"`
    pub label: &'static str,
    /// Confidence ranking of the label
    pub confidence: Confidence,
}

impl CharsetVerdict {
    /// Creates a new verdict
    pub fn new(label: &'static str, confidence: Confidence) -> Self {
        Self { label, confidence }
    }

    /// The verdict used when classification is impossible
    pub fn legacy_fallback() -> Self {
        Self::new(encoding_rs::SHIFT_JIS.name(), Confidence::Low)
    }

    /// Returns true if the label is exactly UTF-8
    pub fn is_utf8(&self) -> bool {
        self.label == UTF8_LABEL
    }
}

impl fmt::Display for CharsetVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?})", self.label, self.confidence)
    }
}

/// Trait for pluggable charset classifiers
pub trait CharsetDetector {
    /// Classify the buffer. Must produce a label for every input,
    /// including empty and binary buffers.
    fn detect(&self, buffer: &[u8]) -> Result<CharsetVerdict>;
}

/// Default detector backed by `chardetng`
#[derive(Debug, Clone, Copy, Default)]
pub struct ChardetDetector;

impl ChardetDetector {
    /// Creates a new detector
    pub fn new() -> Self {
        Self
    }
}

impl CharsetDetector for ChardetDetector {
    fn detect(&self, buffer: &[u8]) -> Result<CharsetVerdict> {
        if buffer.starts_with(UTF8_BOM) {
            trace!("UTF-8 byte order mark present");
            return Ok(CharsetVerdict::new(UTF8_LABEL, Confidence::Certain));
        }

        let mut detector = EncodingDetector::new();
        let non_ascii = detector.feed(buffer, true);
        if !non_ascii {
            // Empty and 7-bit input are valid UTF-8 as-is.
            trace!("no non-ASCII bytes in {} byte buffer", buffer.len());
            return Ok(CharsetVerdict::new(UTF8_LABEL, Confidence::Certain));
        }

        let encoding = detector.guess(None, true);
        let confidence = if encoding == UTF_8
            || encoding
                .decode_without_bom_handling_and_without_replacement(buffer)
                .is_some()
        {
            Confidence::High
        } else {
            Confidence::Low
        };

        let verdict = CharsetVerdict::new(encoding.name(), confidence);
        debug!("Detected {} for {} bytes", verdict, buffer.len());
        Ok(verdict)
    }
}

/// Collapse a detector's answer to the single predicate the converter uses.
///
/// A detector error counts as "not UTF-8".
pub fn is_utf8<D: CharsetDetector + ?Sized>(detector: &D, buffer: &[u8]) -> bool {
    resolve_verdict(detector, buffer).is_utf8()
}

/// Run the detector, degrading any failure to the legacy fallback verdict.
pub fn resolve_verdict<D: CharsetDetector + ?Sized>(detector: &D, buffer: &[u8]) -> CharsetVerdict {
    match detector.detect(buffer) {
        Ok(verdict) => verdict,
        Err(e) => {
            debug!("Detection failed, assuming Shift-JIS: {}", e);
            CharsetVerdict::legacy_fallback()
        }
    }
}

/// Read the whole source, classify it and rewind the source to its start.
///
/// Returns the verdict together with the buffer that was classified.
/// I/O failures are returned as-is; only classification errors degrade.
pub fn detect_reader<D, R>(detector: &D, reader: &mut R) -> std::io::Result<(CharsetVerdict, Vec<u8>)>
where
    D: CharsetDetector + ?Sized,
    R: Read + Seek,
{
    let mut buffer = Vec::new();
    reader.read_to_end(&mut buffer)?;
    reader.seek(SeekFrom::Start(0))?;
    let verdict = resolve_verdict(detector, &buffer);
    Ok((verdict, buffer))
}
