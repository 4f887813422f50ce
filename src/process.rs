use crate::config::{Config, Layout, LineAction, Output};
use crate::rules::evaluate;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;

/// Why a single file could not be processed.
#[derive(Debug)]
pub enum ProcessError {
    InvalidPath(String),
    NotFound(PathBuf),
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for ProcessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessError::InvalidPath(msg) => write!(f, "invalid path: {}", msg),
            ProcessError::NotFound(p) => write!(f, "{} not found", p.display()),
            ProcessError::Io { path, source } => write!(f, "{}: {}", path.display(), source),
        }
    }
}

impl std::error::Error for ProcessError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProcessError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Number of source lines that ended up under each action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionCounts {
    pub keep: usize,
    pub delete: usize,
    pub modify: usize,
}

impl ActionCounts {
    pub fn get(&self, action: LineAction) -> usize {
        match action {
            LineAction::Keep => self.keep,
            LineAction::Delete => self.delete,
            LineAction::Modify => self.modify,
        }
    }

    pub fn record(&mut self, action: LineAction) {
        match action {
            LineAction::Keep => self.keep += 1,
            LineAction::Delete => self.delete += 1,
            LineAction::Modify => self.modify += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.keep + self.delete + self.modify
    }

    pub fn iter(&self) -> impl Iterator<Item = (LineAction, usize)> + '_ {
        LineAction::ALL.into_iter().map(move |a| (a, self.get(a)))
    }
}

/// Outcome of processing one file.
#[derive(Debug)]
pub struct ProcessFileResult {
    pub original_path: PathBuf,
    /// `None` when processing failed before the destination was resolved.
    pub output_path: Option<PathBuf>,
    pub error: Option<ProcessError>,
    pub duration: Duration,
    pub counts: ActionCounts,
}

impl ProcessFileResult {
    fn new(original_path: &Path) -> Self {
        Self {
            original_path: original_path.to_path_buf(),
            output_path: None,
            error: None,
            duration: Duration::ZERO,
            counts: ActionCounts::default(),
        }
    }

    pub fn success(&self) -> bool {
        self.error.is_none()
    }

    pub fn original_line_count(&self) -> usize {
        self.counts.total()
    }

    pub fn new_line_count(&self) -> usize {
        self.original_line_count() - self.counts.delete
    }
}

/// Process a single existing file. Failures are reported in the result,
/// never returned.
pub fn process_file(config: &Config, path: &Path) -> ProcessFileResult {
    process(config, path, true, None)
}

/// `root` is the directory being walked, used to derive mirrored output paths.
pub(crate) fn process(
    config: &Config,
    path: &Path,
    must_exist: bool,
    root: Option<&Path>,
) -> ProcessFileResult {
    let start = Instant::now();
    let mut result = ProcessFileResult::new(path);

    if let Err(e) = run(config, path, must_exist, root, &mut result) {
        tracing::warn!("{}", e);
        result.error = Some(e);
    }

    result.duration = start.elapsed();
    result
}

fn run(
    config: &Config,
    path: &Path,
    must_exist: bool,
    root: Option<&Path>,
    result: &mut ProcessFileResult,
) -> Result<(), ProcessError> {
    validate_file_path(path, must_exist)?;

    let dest = destination(config, path, root)?;
    result.output_path = Some(dest.clone());

    let scratch = rewrite_to_scratch(config, path, &dest, &mut result.counts)?;
    publish(config, path, scratch, &dest)?;

    tracing::debug!(
        "{} -> {} ({} lines, {} deleted, {} modified)",
        path.display(),
        dest.display(),
        result.counts.total(),
        result.counts.delete,
        result.counts.modify
    );
    Ok(())
}

pub(crate) fn is_blank(path: &Path) -> bool {
    path.as_os_str().to_string_lossy().trim().is_empty()
}

fn validate_file_path(path: &Path, must_exist: bool) -> Result<(), ProcessError> {
    if is_blank(path) {
        return Err(ProcessError::InvalidPath("file path cannot be blank".into()));
    }
    if must_exist && !path.is_file() {
        return Err(ProcessError::NotFound(path.to_path_buf()));
    }
    Ok(())
}

/// Resolve where the processed file goes, creating output directories as
/// needed. `create_dir_all` succeeds if another worker created them first.
fn destination(config: &Config, path: &Path, root: Option<&Path>) -> Result<PathBuf, ProcessError> {
    let (dir, layout) = match &config.output {
        Output::InPlace => return in_place_target(path),
        Output::Directory { dir, layout } => (dir, *layout),
    };

    let file_name = path
        .file_name()
        .ok_or_else(|| ProcessError::InvalidPath(format!("{} has no file name", path.display())))?;

    let dest = match (layout, root) {
        (Layout::Mirrored, Some(root)) => match path.strip_prefix(root) {
            Ok(rel) => dir.join(rel),
            Err(_) => dir.join(file_name),
        },
        _ => dir.join(file_name),
    };

    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }
    Ok(dest)
}

/// Publishing renames over the destination, so a symlink is followed to the
/// file it points at instead of being replaced.
fn in_place_target(path: &Path) -> Result<PathBuf, ProcessError> {
    if path.is_symlink() {
        fs::canonicalize(path).map_err(io_error(path))
    } else {
        Ok(path.to_path_buf())
    }
}

/// Stream `path` through the rules into a scratch file next to `dest`.
/// Every source line is counted, including deleted ones.
fn rewrite_to_scratch(
    config: &Config,
    path: &Path,
    dest: &Path,
    counts: &mut ActionCounts,
) -> Result<NamedTempFile, ProcessError> {
    let scratch_dir = dest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut scratch = tempfile::Builder::new()
        .prefix(".textfiddle-")
        .tempfile_in(scratch_dir)
        .map_err(io_error(scratch_dir))?;

    let source = File::open(path).map_err(io_error(path))?;
    let mut reader = BufReader::new(source);
    let mut writer = BufWriter::new(&mut scratch);
    let mut raw = Vec::new();
    let mut first_chunk = true;

    loop {
        raw.clear();
        if reader.read_until(b'\n', &mut raw).map_err(io_error(path))? == 0 {
            break;
        }

        let mut chunk = std::str::from_utf8(&raw).map_err(|e| ProcessError::Io {
            path: path.to_path_buf(),
            source: io::Error::new(io::ErrorKind::InvalidData, e),
        })?;
        if first_chunk {
            first_chunk = false;
            if let Some(rest) = chunk.strip_prefix(BOM) {
                writer.write_all(BOM.as_bytes()).map_err(io_error(dest))?;
                chunk = rest;
            }
        }

        for (line, ending) in split_lines(chunk) {
            let outcome = evaluate(line, &config.rules);
            counts.record(outcome.action);

            if let Some(out) = outcome.line {
                writer
                    .write_all(out.as_bytes())
                    .and_then(|_| writer.write_all(ending.as_bytes()))
                    .map_err(io_error(dest))?;
            }
        }
    }

    writer.flush().map_err(io_error(dest))?;
    drop(writer);
    scratch.as_file().sync_all().map_err(io_error(dest))?;
    Ok(scratch)
}

/// Atomically move the scratch file onto `dest`. The rename replaces an
/// existing file, so publishing over the source itself needs no delete.
fn publish(
    config: &Config,
    path: &Path,
    scratch: NamedTempFile,
    dest: &Path,
) -> Result<(), ProcessError> {
    if config.keep_permissions {
        let permissions = fs::metadata(path).map_err(io_error(path))?.permissions();
        scratch
            .as_file()
            .set_permissions(permissions)
            .map_err(io_error(dest))?;
    }

    scratch.persist(dest).map_err(|e| ProcessError::Io {
        path: dest.to_path_buf(),
        source: e.error,
    })?;
    Ok(())
}

const BOM: &str = "\u{FEFF}";

/// Split text into lines paired with their terminator: `\r\n`, `\n`, a lone
/// `\r`, or nothing for a final unterminated line.
fn split_lines(text: &str) -> impl Iterator<Item = (&str, &str)> {
    let mut rest = text;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        let item = match rest.find(|c: char| c == '\r' || c == '\n') {
            None => (rest, ""),
            Some(i) => {
                let len = if rest[i..].starts_with("\r\n") { 2 } else { 1 };
                (&rest[..i], &rest[i..i + len])
            }
        };
        rest = &rest[item.0.len() + item.1.len()..];
        Some(item)
    })
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> ProcessError + '_ {
    move |source| ProcessError::Io {
        path: path.to_path_buf(),
        source,
    }
}
