//! textfiddle rewrites text files line by line.
//!
//! Each line is run through an ordered list of [`Rule`]s; the first rule that
//! applies decides whether the line is kept, deleted or modified. The result
//! is written to a scratch file and atomically moved over the original (or
//! into an output directory). Directories are processed file by file on a
//! rayon pool, and a failing file never stops its siblings.

pub mod cli;
pub mod config;
pub mod dispatch;
pub mod process;
pub mod rules;

pub use config::{Config, Layout, LineAction, Output, Parallelism, RuleConfig};
pub use dispatch::{process_directory, process_path, process_paths, DispatchError};
pub use process::{process_file, ActionCounts, ProcessError, ProcessFileResult};
pub use rules::{evaluate, LineOutcome, Rule, RuleAction, RuleBuildError};
