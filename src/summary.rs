use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

use crate::analyzers::aggregate::Aggregator;
use crate::analyzers::types::Discrepancy;
use crate::error::ReconcileError;

/// One row of the run log: what happened to a class.
#[derive(Debug, Default, Serialize)]
pub struct ClassSummary {
    pub timestamp: DateTime<Utc>,
    pub class: String,
    pub status: String,
    pub students: usize,
    pub subjects: usize,
    pub discrepancies: usize,
    pub output: Option<String>,
    pub elapsed_ms: u64,

    // error tracking
    pub error_type: Option<String>,
    pub error_message: Option<String>,
}

impl ClassSummary {
    pub fn from_run(
        class: &str,
        aggregator: &Aggregator,
        discrepancies: &[Discrepancy],
        output: &Path,
    ) -> Self {
        ClassSummary {
            timestamp: Utc::now(),
            class: class.to_string(),
            status: "ok".to_string(),
            students: aggregator.students().len(),
            subjects: aggregator.subjects().len(),
            discrepancies: discrepancies.len(),
            output: Some(output.display().to_string()),
            ..Default::default()
        }
    }

    /// Create an error record with timestamp and error information
    pub fn from_error(class: &str, error: &ReconcileError) -> Self {
        ClassSummary {
            timestamp: Utc::now(),
            class: class.to_string(),
            status: "error".to_string(),
            error_type: Some(error.kind().to_string()),
            error_message: Some(error.to_string()),
            ..Default::default()
        }
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn is_ok(&self) -> bool {
        self.error_type.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::types::MarkValue;

    #[test]
    fn test_from_run_counts() {
        let mut agg = Aggregator::new();
        agg.record_average("Иванов Пётр", "Алгебра", 0, MarkValue::Numeric(4.0));
        agg.record_average("Петрова Анна", "История", 0, MarkValue::Numeric(4.0));

        let summary = ClassSummary::from_run("7-А", &agg, &[], Path::new("result_7-А.xlsx"));
        assert!(summary.is_ok());
        assert_eq!(summary.status, "ok");
        assert_eq!(summary.students, 2);
        assert_eq!(summary.subjects, 2);
        assert_eq!(summary.discrepancies, 0);
        assert_eq!(summary.output.as_deref(), Some("result_7-А.xlsx"));
    }

    #[test]
    fn test_from_error() {
        let error = ReconcileError::MissingSource {
            class: "7-А".into(),
        };
        let summary =
            ClassSummary::from_error("7-А", &error).with_elapsed(Duration::from_millis(1500));

        assert!(!summary.is_ok());
        assert_eq!(summary.error_type.as_deref(), Some("missing_source"));
        assert_eq!(
            summary.error_message.as_deref(),
            Some("no averages workbook found for class 7-А")
        );
        assert_eq!(summary.elapsed_ms, 1500);
    }
}
