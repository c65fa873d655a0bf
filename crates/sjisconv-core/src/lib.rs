//! # sjisconv-core
//!
//! A library for converting text files between UTF-8 and Shift-JIS.
//!
//! This crate provides the core functionality for:
//! - Guessing whether a byte buffer is UTF-8 with a statistical classifier
//! - Streaming a file through a decoder and a rune-at-a-time encoder,
//!   substituting `'?'` for characters the destination cannot represent
//! - Walking an input tree and converting every file into a flat output directory
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`detect`]: Charset detection
//! - [`transcode`]: Streaming transcoding and placeholder substitution
//! - [`walk`]: Tree traversal and per-file conversion
//! - [`config`]: Explicit run configuration
//! - [`error`]: Error types and handling
//!
//! ## Example
//!
//! ```no_run
//! use sjisconv_core::{ConvertConfig, TreeWalker};
//!
//! let config = ConvertConfig::resolve("./docs", "./converted")?;
//! let summary = TreeWalker::new(config).walk()?;
//! println!("converted {} files", summary.files);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Extensibility
//!
//! - [`CharsetDetector`]: Plug in a different classifier
//! - [`RuneSink`]: Customize how decoded runes reach the destination

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod config;
pub mod detect;
pub mod error;
pub mod transcode;
pub mod walk;

// Re-export primary types for convenience
pub use config::ConvertConfig;
pub use detect::{ChardetDetector, CharsetDetector, CharsetVerdict, Confidence};
pub use error::{Error, Result};
pub use transcode::{
    Direction, MalformedPolicy, RuneSink, RuneWriter, TranscodeOptions, TranscodeStats, Transcoder,
};
pub use walk::{ConversionJob, FileReport, TreeWalker, WalkSummary};

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
