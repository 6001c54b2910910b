use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info, warn};

use crate::analyzers::aggregate::Aggregator;
use crate::analyzers::discrepancy::find_discrepancies;
use crate::analyzers::types::{ClassLabel, PeriodScheme};
use crate::config::LayoutConfig;
use crate::error::Result;
use crate::output::{append_record, output_path, write_workbook};
use crate::sources::{discover_averages, ensure_xlsx};
use crate::summary::ClassSummary;

/// Inputs shared by every class of a run.
#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    /// The finals workbook.
    pub finals: PathBuf,
    /// Where averages workbooks live; defaults to the finals' directory.
    pub averages_dir: Option<PathBuf>,
    pub output_dir: PathBuf,
    /// Whether to add the discrepancy sheet.
    pub include_report: bool,
    pub layout: LayoutConfig,
}

impl ReconcileOptions {
    pub fn new(finals: impl Into<PathBuf>) -> Self {
        Self {
            finals: finals.into(),
            averages_dir: None,
            output_dir: PathBuf::from("."),
            include_report: true,
            layout: LayoutConfig::default(),
        }
    }

    fn averages_dir(&self) -> PathBuf {
        match (&self.averages_dir, self.finals.parent()) {
            (Some(dir), _) => dir.clone(),
            (None, Some(parent)) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}

/// Reconciles one class: loads its averages and finals into `aggregator`,
/// detects discrepancies and writes the result workbook.
///
/// The aggregator is reset first, so one instance can serve a whole batch.
#[tracing::instrument(skip(aggregator, options), fields(finals = %options.finals.display()))]
pub fn reconcile_class(
    aggregator: &mut Aggregator,
    class: &str,
    options: &ReconcileOptions,
) -> Result<ClassSummary> {
    let started = Instant::now();

    ensure_xlsx(&options.finals)?;
    let class = ClassLabel::parse(class)?;
    let scheme = PeriodScheme::for_grade_level(class.grade_level(), &options.layout.half_year_levels);

    aggregator.reset();

    let sources = discover_averages(
        &options.averages_dir(),
        &class,
        scheme,
        &options.finals,
        &options.layout,
    )?;
    aggregator.load_averages(&class, scheme, &sources, &options.layout)?;
    aggregator.load_finals(&options.finals, &class, scheme, &options.layout)?;

    let discrepancies = find_discrepancies(aggregator, scheme);
    info!(
        students = aggregator.students().len(),
        subjects = aggregator.subjects().len(),
        discrepancies = discrepancies.len(),
        ?scheme,
        "Class reconciled"
    );

    std::fs::create_dir_all(&options.output_dir)?;
    let path = output_path(&options.output_dir, &class, &options.layout);
    let report = options.include_report.then_some(discrepancies.as_slice());
    write_workbook(&path, aggregator, scheme, report, &options.layout)?;

    Ok(ClassSummary::from_run(class.as_str(), aggregator, &discrepancies, &path)
        .with_elapsed(started.elapsed()))
}

/// Reconciles `class` and records the outcome in the run log, if any.
/// Failures are turned into error records rather than returned.
pub fn reconcile_logged(
    aggregator: &mut Aggregator,
    class: &str,
    options: &ReconcileOptions,
    run_log: Option<&Path>,
) -> ClassSummary {
    let started = Instant::now();

    let summary = match reconcile_class(aggregator, class, options) {
        Ok(summary) => {
            info!(
                class,
                output = summary.output.as_deref().unwrap_or_default(),
                elapsed_ms = summary.elapsed_ms,
                "Class processed successfully"
            );
            summary
        }
        Err(e) => {
            error!(class, error = %e, "Class failed");
            ClassSummary::from_error(class.trim(), &e).with_elapsed(started.elapsed())
        }
    };

    if let Some(run_log) = run_log {
        if let Err(e) = append_record(run_log, &summary) {
            warn!(path = %run_log.display(), error = %e, "Failed to write run log");
        }
    }

    summary
}

/// Reconciles each class in turn. A failing class is logged and recorded
/// without stopping the rest of the batch.
#[tracing::instrument(skip_all, fields(classes = classes.len()))]
pub fn reconcile_batch(
    classes: &[String],
    options: &ReconcileOptions,
    run_log: Option<&Path>,
) -> Vec<ClassSummary> {
    let mut aggregator = Aggregator::new();
    let mut summaries = Vec::with_capacity(classes.len());

    for class in classes {
        let span = tracing::info_span!("class", class = %class);
        let _entered = span.enter();
        summaries.push(reconcile_logged(&mut aggregator, class, options, run_log));
    }

    let failed = summaries.iter().filter(|s| !s.is_ok()).count();
    info!(
        total = summaries.len(),
        succeeded = summaries.len() - failed,
        failed,
        "Batch finished"
    );
    summaries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReconcileError;

    #[test]
    fn test_averages_dir_defaults_to_finals_parent() {
        let options = ReconcileOptions::new("data/finals.xlsx");
        assert_eq!(options.averages_dir(), PathBuf::from("data"));

        let options = ReconcileOptions::new("finals.xlsx");
        assert_eq!(options.averages_dir(), PathBuf::from("."));

        let mut options = ReconcileOptions::new("data/finals.xlsx");
        options.averages_dir = Some(PathBuf::from("averages"));
        assert_eq!(options.averages_dir(), PathBuf::from("averages"));
    }

    #[test]
    fn test_reconcile_class_rejects_wrong_extension() {
        let mut agg = Aggregator::new();
        let options = ReconcileOptions::new("finals.xls");
        assert!(matches!(
            reconcile_class(&mut agg, "7-А", &options),
            Err(ReconcileError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_reconcile_class_rejects_malformed_label() {
        let mut agg = Aggregator::new();
        let options = ReconcileOptions::new("finals.xlsx");
        assert!(matches!(
            reconcile_class(&mut agg, "7А", &options),
            Err(ReconcileError::MalformedClassLabel(_))
        ));
    }

    #[test]
    fn test_batch_continues_after_failures() {
        let options = ReconcileOptions::new("finals.xlsx");
        let classes = vec!["7А".to_string(), "".to_string()];
        let summaries = reconcile_batch(&classes, &options, None);

        assert_eq!(summaries.len(), 2);
        assert!(summaries.iter().all(|s| !s.is_ok()));
        assert_eq!(summaries[0].error_type.as_deref(), Some("malformed_class_label"));
    }
}
