//! Locating the workbooks that belong to a class.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::analyzers::aggregate::AveragesSource;
use crate::analyzers::types::{ClassLabel, PeriodScheme};
use crate::config::LayoutConfig;
use crate::error::{ReconcileError, Result};
use crate::parser::parse_period_label;

const XLSX: &str = "xlsx";

/// Fails with [`ReconcileError::UnsupportedFormat`] unless `path` is an
/// `.xlsx` file.
pub fn ensure_xlsx(path: &Path) -> Result<()> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    if extension.eq_ignore_ascii_case(XLSX) {
        Ok(())
    } else {
        Err(ReconcileError::UnsupportedFormat(extension.to_string()))
    }
}

/// Whether `file_name` mentions `label` as a whole token, so `7-А` matches
/// `... 7-А класс.xlsx` but not `17-А` or `7-АБ`.
pub fn mentions_class(file_name: &str, label: &str) -> bool {
    file_name.match_indices(label).any(|(idx, _)| {
        let before = file_name[..idx].chars().next_back();
        let after = file_name[idx + label.len()..].chars().next();
        !before.is_some_and(|c| c.is_ascii_digit()) && !after.is_some_and(char::is_alphabetic)
    })
}

/// Reads the period from the end of a file stem, e.g.
/// `Отчёт по средним баллам 7-А класс. IIтр.xlsx` is the second term. Only
/// the last two words are looked at, so class numbers earlier in the name
/// never count.
pub fn period_from_file_name(file_name: &str, scheme: PeriodScheme) -> Option<usize> {
    let stem = file_name.rsplit_once('.').map_or(file_name, |(stem, _)| stem);
    let words: Vec<&str> = stem
        .split(|c: char| c.is_whitespace() || c == '.')
        .filter(|w| !w.is_empty())
        .collect();
    let tail = words[words.len().saturating_sub(2)..].join(" ");
    match parse_period_label(&tail) {
        Some((kind, period)) if kind == scheme => Some(period),
        _ => None,
    }
}

/// Finds the averages workbooks of `class` in `dir`, ordered by period.
///
/// The finals workbook and earlier outputs are skipped. When no file name
/// carries a period, files are numbered by name order. A mix of tagged and
/// untagged names is a layout error.
pub fn discover_averages(
    dir: &Path,
    class: &ClassLabel,
    scheme: PeriodScheme,
    finals: &Path,
    layout: &LayoutConfig,
) -> Result<Vec<AveragesSource>> {
    let finals_name = finals.file_name();
    let mut candidates: Vec<(String, PathBuf)> = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type()?.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
            continue;
        };
        if ensure_xlsx(&path).is_err()
            || name.starts_with("~$")
            || name.starts_with(&layout.output_prefix)
            || path.file_name() == finals_name
            || !mentions_class(&name, class.as_str())
        {
            continue;
        }
        candidates.push((name, path));
    }
    candidates.sort();

    let periods: Vec<Option<usize>> = candidates
        .iter()
        .map(|(name, _)| period_from_file_name(name, scheme))
        .collect();

    let sources: Vec<AveragesSource> = if periods.iter().all(Option::is_none) {
        if !candidates.is_empty() {
            warn!(class = %class, "Averages file names carry no period, ordering by name");
        }
        candidates
            .into_iter()
            .enumerate()
            .map(|(period, (_, path))| AveragesSource { path, period })
            .collect()
    } else {
        let mut sources = Vec::with_capacity(candidates.len());
        for ((name, path), period) in candidates.into_iter().zip(periods) {
            let Some(period) = period else {
                return Err(ReconcileError::Layout(format!(
                    "averages workbook {name} names no period while others of class {class} do"
                )));
            };
            sources.push(AveragesSource { path, period });
        }
        sources.sort_by_key(|s| s.period);
        if sources.windows(2).any(|w| w[0].period == w[1].period) {
            return Err(ReconcileError::Layout(format!(
                "more than one averages workbook for the same period of class {class}"
            )));
        }
        sources
    };

    debug!(class = %class, found = sources.len(), "Discovered averages workbooks");
    Ok(sources)
}
