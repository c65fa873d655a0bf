//! Run configuration.
//!
//! The walker never looks at process arguments or the working directory;
//! the caller resolves a [`ConvertConfig`] once and passes it in.

use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Output location used when none is given
pub const DEFAULT_OUTPUT: &str = "convert";

/// Validated input/output pair for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertConfig {
    /// File or directory to convert
    pub input: PathBuf,
    /// Output file, or directory receiving converted files by base name
    pub output: PathBuf,
    /// Whether `output` is a directory
    pub output_is_dir: bool,
}

impl ConvertConfig {
    /// Build a config without touching the filesystem.
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>, output_is_dir: bool) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            output_is_dir,
        }
    }

    /// Validate the paths and prepare the output location.
    ///
    /// - the input must exist
    /// - a directory input requires an output without a file extension
    /// - a missing output is created as a directory
    pub fn resolve(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Result<Self> {
        let input = input.as_ref();
        let output = output.as_ref();

        let input_meta = fs::metadata(input).map_err(|e| Error::input_not_found(input, e))?;
        if input_meta.is_dir() && output.extension().is_some() {
            return Err(Error::invalid_path_combination(input, output));
        }

        let output_meta = match fs::metadata(output) {
            Ok(meta) => meta,
            Err(_) => {
                info!("Creating output directory {}", output.display());
                fs::create_dir_all(output).map_err(|e| Error::directory_create(output, e))?;
                fs::metadata(output).map_err(|e| Error::directory_create(output, e))?
            }
        };

        let config = Self::new(input, output, output_meta.is_dir());
        debug!(
            "Resolved config: input={} output={} output_is_dir={}",
            config.input.display(),
            config.output.display(),
            config.output_is_dir
        );
        Ok(config)
    }

    /// Returns true if the input is a directory tree rather than one file
    pub fn input_is_dir(&self) -> bool {
        self.input.is_dir()
    }
}
