use crate::process::ProcessFileResult;
use serde_json::json;
use std::time::Duration;

/// Totals over a batch of results.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub files: usize,
    pub failed: usize,
    pub lines_in: usize,
    pub lines_out: usize,
    pub deleted: usize,
    pub modified: usize,
}

impl Summary {
    pub fn from_results(results: &[ProcessFileResult]) -> Self {
        let mut summary = Summary {
            files: results.len(),
            ..Default::default()
        };
        for r in results {
            if !r.success() {
                summary.failed += 1;
            }
            summary.lines_in += r.original_line_count();
            summary.lines_out += r.new_line_count();
            summary.deleted += r.counts.delete;
            summary.modified += r.counts.modify;
        }
        summary
    }
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Print one line per file with ANSI colors, then a summary.
pub fn print_pretty(results: &[ProcessFileResult]) {
    for r in results {
        match &r.error {
            None => {
                let dest = r
                    .output_path
                    .as_ref()
                    .filter(|p| **p != r.original_path)
                    .map(|p| format!(" \x1b[90m->\x1b[0m {}", p.display()))
                    .unwrap_or_default();
                println!(
                    "\x1b[32m✓\x1b[0m {}{}  \x1b[90m{} -> {} lines ({} deleted, {} modified) {:.1}ms\x1b[0m",
                    r.original_path.display(),
                    dest,
                    r.original_line_count(),
                    r.new_line_count(),
                    r.counts.delete,
                    r.counts.modify,
                    millis(r.duration)
                );
            }
            Some(e) => {
                println!(
                    "\x1b[31m✗\x1b[0m {}  \x1b[31m{}\x1b[0m",
                    r.original_path.display(),
                    e
                );
            }
        }
    }

    let s = Summary::from_results(results);
    println!();
    print!("\x1b[1m{} file{}", s.files, if s.files == 1 { "" } else { "s" });
    if s.failed > 0 {
        print!(", \x1b[31m{} failed\x1b[0m\x1b[1m", s.failed);
    }
    println!(
        " ({} -> {} lines, {} deleted, {} modified)\x1b[0m",
        s.lines_in, s.lines_out, s.deleted, s.modified
    );
}

/// Build the JSON document for a batch of results.
pub fn to_json(results: &[ProcessFileResult]) -> serde_json::Value {
    let files: Vec<_> = results
        .iter()
        .map(|r| {
            let counts: serde_json::Map<String, serde_json::Value> = r
                .counts
                .iter()
                .map(|(action, n)| (action.to_string(), json!(n)))
                .collect();
            json!({
                "original_path": r.original_path.display().to_string(),
                "output_path": r.output_path.as_ref().map(|p| p.display().to_string()),
                "success": r.success(),
                "error": r.error.as_ref().map(|e| e.to_string()),
                "duration_ms": millis(r.duration),
                "line_counts": counts,
                "original_line_count": r.original_line_count(),
                "new_line_count": r.new_line_count(),
            })
        })
        .collect();

    let s = Summary::from_results(results);
    json!({
        "files": files,
        "summary": {
            "files": s.files,
            "failed": s.failed,
            "lines_in": s.lines_in,
            "lines_out": s.lines_out,
            "deleted": s.deleted,
            "modified": s.modified,
        },
    })
}

/// Print results as structured JSON.
pub fn print_json(results: &[ProcessFileResult]) {
    match serde_json::to_string_pretty(&to_json(results)) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("\x1b[31merror\x1b[0m: failed to serialize results: {}", e),
    }
}
