use crate::config::Config;
use crate::process::{self, is_blank, ProcessFileResult};
use globset::{Glob, GlobMatcher};
use ignore::WalkBuilder;
use rayon::prelude::*;
use std::fmt;
use std::path::{Path, PathBuf};

/// Errors that abort a whole `process_path`/`process_directory` call, as
/// opposed to per-file errors carried in each `ProcessFileResult`.
#[derive(Debug)]
pub enum DispatchError {
    InvalidPath(String),
    NotFound(PathBuf),
    InvalidGlob(globset::Error),
    ThreadPool(rayon::ThreadPoolBuildError),
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::InvalidPath(msg) => write!(f, "invalid path: {}", msg),
            DispatchError::NotFound(p) => {
                write!(f, "{} is neither a file nor a directory", p.display())
            }
            DispatchError::InvalidGlob(e) => write!(f, "invalid file pattern: {}", e),
            DispatchError::ThreadPool(e) => write!(f, "failed to start worker pool: {}", e),
        }
    }
}

impl std::error::Error for DispatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DispatchError::InvalidGlob(e) => Some(e),
            DispatchError::ThreadPool(e) => Some(e),
            _ => None,
        }
    }
}

enum PathKind {
    File,
    Directory,
}

/// Classify a root. Only a path that is neither a file nor a directory is
/// an error.
fn classify(path: &Path) -> Result<PathKind, DispatchError> {
    if is_blank(path) {
        return Err(DispatchError::InvalidPath("path cannot be blank".into()));
    }
    if path.is_file() {
        Ok(PathKind::File)
    } else if path.is_dir() {
        Ok(PathKind::Directory)
    } else {
        Err(DispatchError::NotFound(path.to_path_buf()))
    }
}

/// Check every root before anything is processed, so a bad root fails the
/// call before any file on disk has been rewritten.
pub fn check_roots(paths: &[PathBuf]) -> Result<(), DispatchError> {
    for path in paths {
        classify(path)?;
    }
    Ok(())
}

fn compile_pattern(pattern: &str) -> Result<GlobMatcher, DispatchError> {
    Ok(Glob::new(pattern)
        .map_err(DispatchError::InvalidGlob)?
        .compile_matcher())
}

/// Check a file-name glob without walking anything.
pub fn check_pattern(pattern: &str) -> Result<(), DispatchError> {
    compile_pattern(pattern).map(|_| ())
}

/// Process `path` as a single file if it is one, otherwise as a directory
/// tree (every file, recursively). A path that is neither is a fatal error.
pub fn process_path(config: &Config, path: &Path) -> Result<Vec<ProcessFileResult>, DispatchError> {
    match classify(path)? {
        PathKind::File => Ok(vec![process::process_file(config, path)]),
        PathKind::Directory => process_directory(config, path, "*", true),
    }
}

/// Run `process_path` over several roots, in order. All roots are checked
/// first; if any is missing or blank nothing is processed.
pub fn process_paths(
    config: &Config,
    paths: &[PathBuf],
) -> Result<Vec<ProcessFileResult>, DispatchError> {
    check_roots(paths)?;
    let mut results = Vec::new();
    for path in paths {
        results.append(&mut process_path(config, path)?);
    }
    Ok(results)
}

/// Process every file under `dir` whose name matches the glob `pattern`.
///
/// Hidden files and ignore files are not special: everything is visited.
/// Results are sorted by original path whatever order the workers finish in.
pub fn process_directory(
    config: &Config,
    dir: &Path,
    pattern: &str,
    recursive: bool,
) -> Result<Vec<ProcessFileResult>, DispatchError> {
    validate_directory(dir)?;
    let matcher = compile_pattern(pattern)?;

    let files = collect_files(dir, &matcher, recursive);
    tracing::info!(
        "processing {} file(s) under {} with {} rule(s)",
        files.len(),
        dir.display(),
        config.rules.len()
    );

    // Sequential is a one-thread pool so every policy shares this path.
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.parallelism.num_threads())
        .build()
        .map_err(DispatchError::ThreadPool)?;

    let mut results: Vec<ProcessFileResult> = pool.install(|| {
        files
            .par_iter()
            .map(|file| process::process(config, file, false, Some(dir)))
            .collect()
    });
    results.sort_by(|a, b| a.original_path.cmp(&b.original_path));

    let failed = results.iter().filter(|r| !r.success()).count();
    tracing::info!(
        "{} file(s) processed under {}, {} failed",
        results.len(),
        dir.display(),
        failed
    );
    Ok(results)
}

fn validate_directory(dir: &Path) -> Result<(), DispatchError> {
    if is_blank(dir) {
        return Err(DispatchError::InvalidPath("directory path cannot be blank".into()));
    }
    if !dir.is_dir() {
        return Err(DispatchError::NotFound(dir.to_path_buf()));
    }
    Ok(())
}

fn collect_files(dir: &Path, matcher: &GlobMatcher, recursive: bool) -> Vec<PathBuf> {
    let mut builder = WalkBuilder::new(dir);
    builder.standard_filters(false);
    if !recursive {
        builder.max_depth(Some(1));
    }

    let mut files = Vec::new();
    for entry in builder.build() {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!("skipping unreadable entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            continue;
        }
        let matches = entry
            .path()
            .file_name()
            .is_some_and(|name| matcher.is_match(name));
        if matches {
            files.push(entry.into_path());
        }
    }
    files
}
