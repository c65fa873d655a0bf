//! Error types for the sjisconv-core library.
//!
//! Only conditions that stop a run are represented here. Unmappable
//! characters and malformed source bytes are handled inside the transcoder
//! and never become an [`Error`].

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for sjisconv operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for all sjisconv operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Input path does not exist or cannot be inspected
    #[error("input path '{path}' cannot be accessed: {source}")]
    InputNotFound {
        /// The input path given by the caller
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Input is a directory but the output looks like a file name
    #[error("input '{input}' is a directory but output '{output}' has a file extension")]
    InvalidPathCombination {
        /// Input directory
        input: PathBuf,
        /// Offending output path
        output: PathBuf,
    },

    /// Failed to create output directory
    #[error("failed to create directory '{path}': {source}")]
    DirectoryCreate {
        /// Path to the directory that failed to create
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed while enumerating the input tree
    #[error("failed to walk directory '{path}': {source}")]
    DirectoryWalk {
        /// Root of the walk
        path: PathBuf,
        /// Underlying walkdir error
        #[source]
        source: walkdir::Error,
    },

    /// Failed to read input file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        /// Path to the file that failed to read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to create (or truncate) output file
    #[error("failed to create file '{path}': {source}")]
    FileCreate {
        /// Path to the file that failed to create
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to write output file
    #[error("failed to write file '{path}': {source}")]
    FileWrite {
        /// Path to the file that failed to write
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Charset classifier failed
    #[error("charset detection failed: {0}")]
    Detection(String),

    /// Reading the source stream failed mid-transcode
    #[error("failed to read source stream: {0}")]
    StreamRead(#[source] std::io::Error),

    /// Writing the placeholder or flushing the destination failed
    #[error("failed to write destination stream: {0}")]
    StreamWrite(#[source] std::io::Error),
}

impl Error {
    /// Creates a new input-not-found error
    pub fn input_not_found(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::InputNotFound {
            path: path.into(),
            source,
        }
    }

    /// Creates a new invalid path combination error
    pub fn invalid_path_combination(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self::InvalidPathCombination {
            input: input.into(),
            output: output.into(),
        }
    }

    /// Creates a new directory creation error
    pub fn directory_create(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::DirectoryCreate {
            path: path.into(),
            source,
        }
    }

    /// Creates a new directory walk error
    pub fn directory_walk(path: impl Into<PathBuf>, source: walkdir::Error) -> Self {
        Self::DirectoryWalk {
            path: path.into(),
            source,
        }
    }

    /// Creates a new file read error
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Creates a new file create error
    pub fn file_create(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileCreate {
            path: path.into(),
            source,
        }
    }

    /// Creates a new file write error
    pub fn file_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileWrite {
            path: path.into(),
            source,
        }
    }

    /// Attach file paths to a stream error raised while converting
    /// `input` into `output`. Other errors are returned unchanged.
    pub fn with_paths(self, input: &Path, output: &Path) -> Self {
        match self {
            Self::StreamRead(source) => Self::file_read(input, source),
            Self::StreamWrite(source) => Self::file_write(output, source),
            other => other,
        }
    }

    /// Creates a new detection error
    pub fn detection(msg: impl Into<String>) -> Self {
        Self::Detection(msg.into())
    }

    /// Returns true if the error was caused by bad input/output arguments,
    /// before any conversion work started
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InputNotFound { .. } | Self::InvalidPathCombination { .. }
        )
    }

    /// Returns true if this error can be absorbed without stopping the run.
    ///
    /// Only a classifier failure qualifies; it degrades to "not UTF-8".
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Detection(_))
    }
}
