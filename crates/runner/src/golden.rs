//! Golden files, staged files and fixation
//!
//! The canonical output of every compared case is first written next to its
//! golden file with a `.tmp` suffix. An exact match removes the staged file
//! again; anything else leaves it for inspection until [`fixate`] promotes it.

use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use difference::{Changeset, Difference};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::TowelResult;

/// Suffix of staged files
pub const STAGED_SUFFIX: &str = ".tmp";

/// Context lines around each diff hunk
const CONTEXT_LINES: usize = 3;

/// Outcome of comparing canonical output with its golden file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparison {
    pub matched: bool,
    /// Unified diff; empty when matched
    pub diff: String,
}

/// `<golden>.tmp`
pub fn staged_path(golden: &Path) -> PathBuf {
    let mut path = OsString::from(golden.as_os_str());
    path.push(STAGED_SUFFIX);
    PathBuf::from(path)
}

/// Stage `actual` next to `golden` and diff the two.
///
/// A missing golden file counts as empty.
pub fn compare(golden: &Path, actual: &str) -> TowelResult<Comparison> {
    let expected = match fs::read_to_string(golden) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };

    let staged = staged_path(golden);
    if let Some(parent) = staged.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&staged, actual)?;
    let staged_text = fs::read_to_string(&staged)?;

    let diff = unified_diff(
        &expected,
        &staged_text,
        &golden.display().to_string(),
        &staged.display().to_string(),
    );

    if diff.is_empty() {
        fs::remove_file(&staged)?;
        debug!("{} matches", golden.display());
        return Ok(Comparison {
            matched: true,
            diff,
        });
    }

    debug!("Staged {}", staged.display());
    Ok(Comparison {
        matched: false,
        diff,
    })
}

/// Promote every staged file under `dir` to its golden path, overwriting.
///
/// Returns the promoted golden paths in sorted order.
pub fn fixate(dir: &Path) -> TowelResult<Vec<PathBuf>> {
    let mut promoted = Vec::new();

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let Some(golden_name) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_suffix(STAGED_SUFFIX))
            .filter(|n| !n.is_empty())
        else {
            continue;
        };

        let golden = path.with_file_name(golden_name);
        fs::rename(path, &golden)?;
        info!("Fixated {}", golden.display());
        promoted.push(golden);
    }

    promoted.sort();
    Ok(promoted)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Keep,
    Remove,
    Add,
}

/// Line-oriented unified diff; empty when the texts are equal.
pub fn unified_diff(expected: &str, actual: &str, expected_name: &str, actual_name: &str) -> String {
    if expected == actual {
        return String::new();
    }

    let ops = line_ops(expected, actual);
    let mut out = format!("--- {}\n+++ {}\n", expected_name, actual_name);
    for (start, end) in hunks(&ops) {
        render_hunk(&ops, start, end, &mut out);
    }
    out
}

fn split_lines(text: &str) -> impl Iterator<Item = &str> {
    text.strip_suffix('\n').unwrap_or(text).split('\n')
}

fn line_ops(expected: &str, actual: &str) -> Vec<(Op, String)> {
    if expected.is_empty() {
        return split_lines(actual).map(|l| (Op::Add, l.to_string())).collect();
    }
    if actual.is_empty() {
        return split_lines(expected).map(|l| (Op::Remove, l.to_string())).collect();
    }

    // A shared trailing newline would show up as an empty context line
    let (expected, actual) = match (expected.strip_suffix('\n'), actual.strip_suffix('\n')) {
        (Some(e), Some(a)) => (e, a),
        _ => (expected, actual),
    };

    let mut ops = Vec::new();
    for chunk in Changeset::new(expected, actual, "\n").diffs {
        let (op, text) = match chunk {
            Difference::Same(text) => (Op::Keep, text),
            Difference::Rem(text) => (Op::Remove, text),
            Difference::Add(text) => (Op::Add, text),
        };
        ops.extend(text.split('\n').map(|line| (op, line.to_string())));
    }
    ops
}

/// Half-open op ranges, each change padded with context and overlapping
/// ranges merged.
fn hunks(ops: &[(Op, String)]) -> Vec<(usize, usize)> {
    let mut ranges: Vec<(usize, usize)> = Vec::new();

    for (i, (op, _)) in ops.iter().enumerate() {
        if *op == Op::Keep {
            continue;
        }
        let start = i.saturating_sub(CONTEXT_LINES);
        let end = (i + CONTEXT_LINES + 1).min(ops.len());
        match ranges.last_mut() {
            Some(last) if start <= last.1 => last.1 = end,
            _ => ranges.push((start, end)),
        }
    }

    ranges
}

fn render_hunk(ops: &[(Op, String)], start: usize, end: usize, out: &mut String) {
    let old_before = ops[..start].iter().filter(|(op, _)| *op != Op::Add).count();
    let new_before = ops[..start].iter().filter(|(op, _)| *op != Op::Remove).count();
    let old_len = ops[start..end].iter().filter(|(op, _)| *op != Op::Add).count();
    let new_len = ops[start..end].iter().filter(|(op, _)| *op != Op::Remove).count();

    out.push_str(&format!(
        "@@ -{} +{} @@\n",
        hunk_range(old_before, old_len),
        hunk_range(new_before, new_len)
    ));

    for (op, line) in &ops[start..end] {
        let prefix = match op {
            Op::Keep => ' ',
            Op::Remove => '-',
            Op::Add => '+',
        };
        out.push(prefix);
        out.push_str(line);
        out.push('\n');
    }
}

fn hunk_range(before: usize, len: usize) -> String {
    match len {
        0 => format!("{},0", before),
        1 => format!("{}", before + 1),
        _ => format!("{},{}", before + 1, len),
    }
}
