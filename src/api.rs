use std::collections::HashSet;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, warn};

use crate::error::SqlshapeError;
use crate::highlight::{strip_ansi, HighlightingFormatter};
use crate::mode::Mode;
use crate::report::{FileResult, FileStatus, Report};
use crate::style::{FormatStyle, Formatter};
use crate::token::{significant_tokens, split_statements, tokenize};

/// Format a SQL script according to the given mode.
/// This is the core API function.
pub fn format_string(source: &str, mode: &Mode) -> Result<String, SqlshapeError> {
    let mut result = String::with_capacity(source.len() + source.len() / 2);

    for statement in split_statements(source) {
        let style = mode.style(statement.text)?;
        let mut formatted = style.formatter().format(statement.text);
        if mode.highlight && style != FormatStyle::Highlight {
            formatted = HighlightingFormatter::DEFAULT.format(&formatted);
        }
        let formatted = formatted.strip_prefix('\n').unwrap_or(formatted.as_str());

        if mode.should_safety_check() {
            safety_check(statement.text, formatted)?;
        }

        result.push_str(formatted);
        if statement.terminated {
            // Keep the terminator out of a trailing line comment
            if ends_with_line_comment(statement.text) && !formatted.ends_with('\n') {
                result.push('\n');
            }
            result.push(';');
        }
        result.push('\n');
    }

    Ok(result)
}

fn ends_with_line_comment(sql: &str) -> bool {
    tokenize(sql).last().is_some_and(|t| t.is_line_comment())
}

/// Run the formatter on a collection of files.
pub fn run(files: &[PathBuf], mode: &Mode) -> Result<Report, SqlshapeError> {
    let matching_paths = get_matching_paths(files, mode)?;
    let mut report = Report::new();
    let progress = progress_bar(matching_paths.len(), mode);

    let format_one = |path: &PathBuf| {
        let result = format_file(path, mode);
        progress.inc(1);
        result
    };

    if mode.single_process || matching_paths.len() <= 1 {
        for path in &matching_paths {
            report.add(format_one(path));
        }
    } else {
        // Parallel processing with rayon
        use rayon::prelude::*;

        // rayon treats 0 as "all available cores"
        match rayon::ThreadPoolBuilder::new()
            .num_threads(mode.threads)
            .build()
        {
            Ok(pool) => {
                let results: Vec<FileResult> =
                    pool.install(|| matching_paths.par_iter().map(format_one).collect());
                for result in results {
                    report.add(result);
                }
            }
            Err(e) => {
                warn!("Failed to build thread pool, formatting sequentially: {}", e);
                for path in &matching_paths {
                    report.add(format_one(path));
                }
            }
        }
    }

    progress.finish_and_clear();
    Ok(report)
}

fn progress_bar(len: usize, mode: &Mode) -> ProgressBar {
    if mode.no_progressbar || mode.quiet || len <= 1 {
        return ProgressBar::hidden();
    }
    let style = ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} files")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    ProgressBar::new(len as u64).with_style(style)
}

/// Format a single file.
fn format_file(path: &Path, mode: &Mode) -> FileResult {
    debug!("Formatting {}", path.display());
    let source = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => return FileResult::error(path, format!("Read error: {}", e)),
    };

    let formatted = match format_string(&source, mode) {
        Ok(f) => f,
        Err(e) => return FileResult::error(path, e.to_string()),
    };

    if source == formatted {
        return FileResult::new(path, FileStatus::Unchanged);
    }

    if mode.check || mode.diff {
        if mode.diff {
            print_diff(path, &source, &formatted);
        }
        return FileResult::new(path, FileStatus::Changed);
    }

    // Write formatted output
    match std::fs::write(path, &formatted) {
        Ok(_) => FileResult::new(path, FileStatus::Changed),
        Err(e) => FileResult::error(path, format!("Write error: {}", e)),
    }
}

/// Get all SQL file paths that match the given inputs.
pub fn get_matching_paths(paths: &[PathBuf], mode: &Mode) -> Result<Vec<PathBuf>, SqlshapeError> {
    let extensions = mode.sql_extensions();
    let exclude = build_exclude_set(&mode.exclude)?;
    let mut result = HashSet::new();

    for path in paths {
        if path.is_file() {
            if is_sql_file(path, extensions) {
                result.insert(path.clone());
            }
        } else if path.is_dir() {
            collect_sql_files(path, extensions, &exclude, &mut result);
        } else {
            // Not a file or directory: treat as a glob pattern
            let pattern = path.to_string_lossy();
            match glob::glob(&pattern) {
                Ok(entries) => {
                    for entry in entries.flatten() {
                        if entry.is_file() && is_sql_file(&entry, extensions) {
                            result.insert(entry);
                        }
                    }
                }
                Err(e) => {
                    return Err(SqlshapeError::Config(format!(
                        "Invalid path pattern {}: {}",
                        pattern, e
                    )))
                }
            }
        }
    }

    let mut sorted: Vec<PathBuf> = result.into_iter().collect();
    sorted.sort();
    Ok(sorted)
}

fn build_exclude_set(patterns: &[String]) -> Result<GlobSet, SqlshapeError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| {
            SqlshapeError::Config(format!("Invalid exclude pattern {}: {}", pattern, e))
        })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| SqlshapeError::Config(format!("Invalid exclude patterns: {}", e)))
}

/// Check if a file has a SQL extension.
fn is_sql_file(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| extensions.contains(&ext.as_str()))
}

/// Recursively collect SQL files from a directory.
fn collect_sql_files(
    dir: &Path,
    extensions: &[&str],
    exclude: &GlobSet,
    result: &mut HashSet<PathBuf>,
) {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            warn!("Cannot read {}: {}", dir.display(), e);
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let name = entry.file_name();

        // Skip hidden entries and excluded patterns
        if name.to_string_lossy().starts_with('.') {
            continue;
        }
        if exclude.is_match(&name) || exclude.is_match(&path) {
            debug!("Excluding {}", path.display());
            continue;
        }

        if path.is_dir() {
            collect_sql_files(&path, extensions, exclude, result);
        } else if is_sql_file(&path, extensions) {
            result.insert(path);
        }
    }
}

/// Verify that formatting changed only whitespace: the non-whitespace tokens
/// of the statement must come back in the same order.
fn safety_check(original: &str, formatted: &str) -> Result<(), SqlshapeError> {
    let plain = strip_ansi(formatted);
    let before = significant_tokens(original);
    let after = significant_tokens(&plain);

    if before.len() != after.len() {
        return Err(SqlshapeError::Equivalence(format!(
            "Token count mismatch: original has {} tokens, formatted has {}",
            before.len(),
            after.len()
        )));
    }

    for (i, (t1, t2)) in before.iter().zip(after.iter()).enumerate() {
        if t1 != t2 {
            return Err(SqlshapeError::Equivalence(format!(
                "Token mismatch at position {}: original '{}', formatted '{}'",
                i, t1, t2
            )));
        }
    }

    Ok(())
}

/// Print a diff between original and formatted content.
fn print_diff(path: &Path, original: &str, formatted: &str) {
    use similar::{ChangeTag, TextDiff};

    eprintln!("--- {}", path.display());
    eprintln!("+++ {}", path.display());

    let diff = TextDiff::from_lines(original, formatted);
    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => "-",
            ChangeTag::Insert => "+",
            ChangeTag::Equal => " ",
        };
        eprint!("{}{}", sign, change);
    }
}
