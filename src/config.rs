use crate::rules::Rule;
use std::fmt;
use std::num::NonZeroUsize;
use std::path::PathBuf;

/// What happened to a single line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LineAction {
    Keep,
    Delete,
    Modify,
}

impl LineAction {
    pub const ALL: [LineAction; 3] = [LineAction::Keep, LineAction::Delete, LineAction::Modify];

    pub fn as_str(self) -> &'static str {
        match self {
            LineAction::Keep => "keep",
            LineAction::Delete => "delete",
            LineAction::Modify => "modify",
        }
    }
}

impl fmt::Display for LineAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unvalidated rule description, as read from a rules file.
#[derive(Debug, Clone, Default)]
pub struct RuleConfig {
    /// `keep`, `delete` or `modify`, case-insensitive.
    pub action: String,
    /// Regex the line must match.
    pub positive: Option<String>,
    /// Regex the line must not match.
    pub negative: Option<String>,
    /// Template for `modify`; may reference capture groups of `positive`.
    pub replacement: Option<String>,
}

/// How output paths are derived when writing into an output directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Layout {
    /// `<dir>/<file name>`. Files with the same name from different
    /// subdirectories overwrite each other.
    #[default]
    Flat,
    /// `<dir>/<path relative to the walked root>`.
    Mirrored,
}

/// Where processed files are published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    /// Replace each source file with its processed version.
    InPlace,
    Directory { dir: PathBuf, layout: Layout },
}

/// Concurrency policy for directory processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Parallelism {
    /// One worker thread. Runs through the same pool code path as `Threads`.
    Sequential,
    Threads(NonZeroUsize),
    /// Let rayon pick (one thread per logical CPU).
    #[default]
    Auto,
}

impl Parallelism {
    /// `0` means auto, `1` means sequential.
    pub fn from_thread_count(threads: usize) -> Self {
        match threads {
            0 => Parallelism::Auto,
            1 => Parallelism::Sequential,
            n => NonZeroUsize::new(n).map_or(Parallelism::Auto, Parallelism::Threads),
        }
    }

    /// Thread count to hand to rayon; `0` lets rayon choose.
    pub fn num_threads(self) -> usize {
        match self {
            Parallelism::Sequential => 1,
            Parallelism::Threads(n) => n.get(),
            Parallelism::Auto => 0,
        }
    }
}

/// Everything a run needs.
///
/// Built once before processing and only ever shared by reference afterwards:
/// worker threads read it concurrently, so it must not be mutated while a
/// run is in progress.
#[derive(Debug, Clone)]
pub struct Config {
    /// Evaluated in order; the first applying rule wins.
    pub rules: Vec<Rule>,
    pub output: Output,
    pub parallelism: Parallelism,
    /// Give published files the permission bits of their source.
    pub keep_permissions: bool,
}

impl Config {
    pub fn new(rules: Vec<Rule>, output: Output) -> Self {
        Self {
            rules,
            output,
            parallelism: Parallelism::default(),
            keep_permissions: true,
        }
    }

    pub fn with_parallelism(mut self, parallelism: Parallelism) -> Self {
        self.parallelism = parallelism;
        self
    }

    pub fn overwrites_original(&self) -> bool {
        matches!(self.output, Output::InPlace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_count_mapping() {
        assert_eq!(Parallelism::from_thread_count(0), Parallelism::Auto);
        assert_eq!(Parallelism::from_thread_count(1), Parallelism::Sequential);
        assert_eq!(Parallelism::from_thread_count(4).num_threads(), 4);
        assert_eq!(Parallelism::Sequential.num_threads(), 1);
        assert_eq!(Parallelism::Auto.num_threads(), 0);
    }

    #[test]
    fn config_defaults() {
        let config = Config::new(Vec::new(), Output::InPlace);
        assert!(config.overwrites_original());
        assert!(config.keep_permissions);
        assert_eq!(config.parallelism, Parallelism::Auto);
    }

    #[test]
    fn action_names() {
        let names: Vec<_> = LineAction::ALL.iter().map(|a| a.to_string()).collect();
        assert_eq!(names, ["keep", "delete", "modify"]);
    }
}
