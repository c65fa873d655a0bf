//! Input tree traversal and per-file conversion.
//!
//! Every non-directory entry under the input root becomes a
//! [`ConversionJob`]. When the output is a directory, jobs write to
//! `output/<base name>`: the input's subdirectory structure is flattened,
//! and files sharing a base name overwrite each other in walk order.

use crate::config::ConvertConfig;
use crate::detect::{detect_reader, ChardetDetector, CharsetDetector, CharsetVerdict};
use crate::error::{Error, Result};
use crate::transcode::{Direction, TranscodeStats, Transcoder};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};
use walkdir::WalkDir;

/// One input file and where its converted bytes go
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionJob {
    /// File to read
    pub input: PathBuf,
    /// File to create (truncating any existing file)
    pub output: PathBuf,
}

impl ConversionJob {
    /// Creates a job, resolving the output path from the output root
    pub fn new(input: impl Into<PathBuf>, output_root: &Path, output_is_dir: bool) -> Self {
        let input = input.into();
        let output = resolve_output(&input, output_root, output_is_dir);
        Self { input, output }
    }
}

/// Output path for `input`: `output_root/<base name>` for directory
/// outputs, `output_root` itself otherwise.
pub fn resolve_output(input: &Path, output_root: &Path, output_is_dir: bool) -> PathBuf {
    if !output_is_dir {
        return output_root.to_path_buf();
    }
    match input.file_name() {
        Some(name) => output_root.join(name),
        None => output_root.to_path_buf(),
    }
}

/// What happened to one job
#[derive(Debug, Clone)]
pub struct FileReport {
    /// The job that was run
    pub job: ConversionJob,
    /// Detector verdict for the input
    pub verdict: CharsetVerdict,
    /// Conversion direction chosen from the verdict
    pub direction: Direction,
    /// Transcode results; `None` on a dry run
    pub stats: Option<TranscodeStats>,
    /// Whether an earlier job in the same walk already wrote this output
    pub overwrote_previous: bool,
}

/// Totals across a walk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkSummary {
    /// Files visited
    pub files: usize,
    /// Files converted UTF-8 -> Shift-JIS
    pub to_shift_jis: usize,
    /// Files converted Shift-JIS -> UTF-8
    pub to_utf8: usize,
    /// Placeholders written across all files
    pub placeholders: u64,
    /// Files whose tail was dropped at a malformed sequence
    pub truncated: usize,
    /// Outputs overwritten by a later file with the same base name
    pub collisions: usize,
}

impl WalkSummary {
    fn record(&mut self, report: &FileReport) {
        self.files += 1;
        match report.direction {
            Direction::Utf8ToShiftJis => self.to_shift_jis += 1,
            Direction::ShiftJisToUtf8 => self.to_utf8 += 1,
        }
        if let Some(stats) = &report.stats {
            self.placeholders += stats.placeholders;
            if stats.is_truncated() {
                self.truncated += 1;
            }
        }
        if report.overwrote_previous {
            self.collisions += 1;
        }
    }
}

/// Detect and convert a single file.
///
/// The input is read in full for detection, rewound, then streamed through
/// the transcoder into a freshly created output file. Both handles are
/// closed on return, including on error.
pub fn convert_file<D: CharsetDetector + ?Sized>(
    job: &ConversionJob,
    detector: &D,
    transcoder: &Transcoder,
) -> Result<(CharsetVerdict, TranscodeStats)> {
    let mut src = File::open(&job.input).map_err(|e| Error::file_read(&job.input, e))?;
    let (verdict, buffer) =
        detect_reader(detector, &mut src).map_err(|e| Error::file_read(&job.input, e))?;
    trace!("Read {} bytes from {}", buffer.len(), job.input.display());
    drop(buffer);

    let direction = Direction::from_verdict(&verdict);
    let dst = File::create(&job.output).map_err(|e| Error::file_create(&job.output, e))?;
    let stats = transcoder
        .transcode(&mut src, BufWriter::new(dst), direction)
        .map_err(|e| e.with_paths(&job.input, &job.output))?;

    Ok((verdict, stats))
}

/// Detect a single file without writing anything.
pub fn inspect_file<D: CharsetDetector + ?Sized>(path: &Path, detector: &D) -> Result<CharsetVerdict> {
    let mut src = File::open(path).map_err(|e| Error::file_read(path, e))?;
    let (verdict, _) = detect_reader(detector, &mut src).map_err(|e| Error::file_read(path, e))?;
    Ok(verdict)
}

/// Recursive converter over an input tree
#[derive(Debug)]
pub struct TreeWalker<D: CharsetDetector = ChardetDetector> {
    config: ConvertConfig,
    detector: D,
    transcoder: Transcoder,
    dry_run: bool,
}

impl TreeWalker<ChardetDetector> {
    /// Creates a walker with the default detector and transcoder
    pub fn new(config: ConvertConfig) -> Self {
        Self::with_detector(config, ChardetDetector::new())
    }
}

impl<D: CharsetDetector> TreeWalker<D> {
    /// Creates a walker with a custom detector
    pub fn with_detector(config: ConvertConfig, detector: D) -> Self {
        Self {
            config,
            detector,
            transcoder: Transcoder::new(),
            dry_run: false,
        }
    }

    /// Replaces the transcoder
    pub fn transcoder(mut self, transcoder: Transcoder) -> Self {
        self.transcoder = transcoder;
        self
    }

    /// Detect only; never create output files
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// The configuration this walker runs with
    pub fn config(&self) -> &ConvertConfig {
        &self.config
    }

    /// Enumerate the jobs for the input tree, in walk order.
    ///
    /// Entries within a directory are visited by file name. A walk error
    /// ends the iteration with that error.
    pub fn jobs(&self) -> impl Iterator<Item = Result<ConversionJob>> + '_ {
        WalkDir::new(&self.config.input)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(move |entry| match entry {
                Ok(entry) if entry.file_type().is_dir() => None,
                Ok(entry) => Some(Ok(ConversionJob::new(
                    entry.into_path(),
                    &self.config.output,
                    self.config.output_is_dir,
                ))),
                Err(e) => Some(Err(Error::directory_walk(&self.config.input, e))),
            })
    }

    /// Convert every file under the input root.
    pub fn walk(&self) -> Result<WalkSummary> {
        self.walk_with(|_| {})
    }

    /// Convert every file under the input root, calling `on_file` after
    /// each one. The first error stops the walk.
    pub fn walk_with<F: FnMut(&FileReport)>(&self, mut on_file: F) -> Result<WalkSummary> {
        if self.config.output_is_dir && !self.dry_run {
            fs::create_dir_all(&self.config.output)
                .map_err(|e| Error::directory_create(&self.config.output, e))?;
        }

        let mut summary = WalkSummary::default();
        let mut written: HashSet<PathBuf> = HashSet::new();

        for job in self.jobs() {
            let job = job?;
            debug!("Processing {}", job.input.display());

            let overwrote_previous = !written.insert(job.output.clone());
            if overwrote_previous {
                warn!(
                    "{} overwrites earlier output {}",
                    job.input.display(),
                    job.output.display()
                );
            }

            let report = if self.dry_run {
                let verdict = inspect_file(&job.input, &self.detector)?;
                FileReport {
                    direction: Direction::from_verdict(&verdict),
                    verdict,
                    stats: None,
                    job,
                    overwrote_previous,
                }
            } else {
                let (verdict, stats) = convert_file(&job, &self.detector, &self.transcoder)?;
                FileReport {
                    direction: stats.direction,
                    verdict,
                    stats: Some(stats),
                    job,
                    overwrote_previous,
                }
            };

            summary.record(&report);
            on_file(&report);
        }

        debug!("Walk complete: {} files", summary.files);
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::Confidence;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    struct Broken;

    impl CharsetDetector for Broken {
        fn detect(&self, _buffer: &[u8]) -> Result<CharsetVerdict> {
            Err(Error::detection("no model"))
        }
    }

    fn dir_config(input: &Path, output: &Path) -> ConvertConfig {
        ConvertConfig::new(input, output, true)
    }

    #[test]
    fn test_resolve_output_uses_base_name() {
        let out = resolve_output(Path::new("in/a/b/x.txt"), Path::new("out"), true);
        assert_eq!(out, PathBuf::from("out/x.txt"));

        let out = resolve_output(Path::new("in/a/b/x.txt"), Path::new("single.txt"), false);
        assert_eq!(out, PathBuf::from("single.txt"));
    }

    #[test]
    fn test_walk_converts_nested_files_flat() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("in");
        let output = temp.path().join("out");
        fs::create_dir_all(input.join("deep/deeper")).unwrap();
        fs::write(input.join("top.txt"), "あAB").unwrap();
        fs::write(input.join("deep/deeper/legacy.txt"), [0x82, 0xA0]).unwrap();

        let summary = TreeWalker::new(dir_config(&input, &output)).walk().unwrap();

        assert_eq!(summary.files, 2);
        assert_eq!(summary.to_shift_jis, 1);
        assert_eq!(summary.to_utf8, 1);
        assert_eq!(fs::read(output.join("top.txt")).unwrap(), vec![0x82, 0xA0, b'A', b'B']);
        assert_eq!(fs::read(output.join("legacy.txt")).unwrap(), "あ".as_bytes().to_vec());
        assert!(!output.join("deep").exists());
    }

    #[test]
    fn test_same_base_name_collides_last_wins() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("in");
        let output = temp.path().join("out");
        fs::create_dir_all(input.join("a")).unwrap();
        fs::create_dir_all(input.join("b")).unwrap();
        fs::write(input.join("a/x.txt"), "from a").unwrap();
        fs::write(input.join("b/x.txt"), "from b").unwrap();

        let walker = TreeWalker::new(dir_config(&input, &output));
        let order: Vec<PathBuf> = walker.jobs().map(|job| job.unwrap().input).collect();
        let summary = walker.walk().unwrap();

        let entries: Vec<_> = fs::read_dir(&output).unwrap().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(summary.collisions, 1);

        let last = order.last().unwrap();
        let expected = if last.starts_with(input.join("a")) { "from a" } else { "from b" };
        assert_eq!(fs::read_to_string(output.join("x.txt")).unwrap(), expected);
    }

    #[test]
    fn test_single_file_input() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("note.txt");
        let output = temp.path().join("note.sjis");
        fs::write(&input, "テスト").unwrap();

        let config = ConvertConfig::new(&input, &output, false);
        let summary = TreeWalker::new(config).walk().unwrap();

        let (expected, _, _) = encoding_rs::SHIFT_JIS.encode("テスト");
        assert_eq!(summary.files, 1);
        assert_eq!(fs::read(&output).unwrap(), expected.into_owned());
    }

    #[test]
    fn test_existing_output_is_truncated() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("in");
        let output = temp.path().join("out");
        fs::create_dir_all(&input).unwrap();
        fs::create_dir_all(&output).unwrap();
        fs::write(input.join("short.txt"), "ok").unwrap();
        fs::write(output.join("short.txt"), "a much longer stale file").unwrap();

        TreeWalker::new(dir_config(&input, &output)).walk().unwrap();
        assert_eq!(fs::read(output.join("short.txt")).unwrap(), b"ok".to_vec());
    }

    #[test]
    fn test_detector_failure_assumes_shift_jis() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("in");
        let output = temp.path().join("out");
        fs::create_dir_all(&input).unwrap();
        fs::write(input.join("plain.txt"), "plain").unwrap();

        let mut reports = Vec::new();
        TreeWalker::with_detector(dir_config(&input, &output), Broken)
            .walk_with(|report| reports.push(report.clone()))
            .unwrap();

        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].direction, Direction::ShiftJisToUtf8);
        assert_eq!(reports[0].verdict.confidence, Confidence::Low);
        assert_eq!(fs::read(output.join("plain.txt")).unwrap(), b"plain".to_vec());
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("in");
        let output = temp.path().join("out");
        fs::create_dir_all(&input).unwrap();
        fs::write(input.join("a.txt"), "あ").unwrap();

        let mut reports = Vec::new();
        let summary = TreeWalker::new(dir_config(&input, &output))
            .dry_run(true)
            .walk_with(|report| reports.push(report.clone()))
            .unwrap();

        assert_eq!(summary.files, 1);
        assert!(reports[0].stats.is_none());
        assert!(reports[0].verdict.is_utf8());
        assert!(!output.exists());
    }

    #[test]
    fn test_missing_input_root_is_fatal() {
        let temp = TempDir::new().unwrap();
        let config = dir_config(&temp.path().join("gone"), &temp.path().join("out"));
        let err = TreeWalker::new(config).walk().unwrap_err();
        assert!(matches!(err, Error::DirectoryWalk { .. }));
    }
}
