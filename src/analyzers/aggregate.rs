use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::analyzers::types::{ClassLabel, MarkValue, PERIOD_SLOTS, PeriodScheme, StudentRecord};
use crate::config::LayoutConfig;
use crate::error::{ReconcileError, Result};
use crate::parser::{self, AveragesSheet, FinalsBlock};

/// An averages workbook together with the period it covers.
#[derive(Debug, Clone, PartialEq)]
pub struct AveragesSource {
    pub path: PathBuf,
    /// 0-based period slot.
    pub period: usize,
}

/// Which half of a [`PeriodSlot`](crate::analyzers::types::PeriodSlot) a
/// value goes into.
#[derive(Debug, Clone, Copy)]
enum SlotField {
    Average,
    Actual,
}

/// Merges averages and final grades into one map per class.
///
/// Students are kept sorted by name. Subjects are kept in the order they
/// were first seen in either source.
#[derive(Debug, Default)]
pub struct Aggregator {
    students: BTreeMap<String, StudentRecord>,
    subjects: Vec<String>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets everything loaded so far.
    pub fn reset(&mut self) {
        self.students.clear();
        self.subjects.clear();
    }

    pub fn students(&self) -> &BTreeMap<String, StudentRecord> {
        &self.students
    }

    /// Every subject seen in either source, in first-seen order.
    pub fn subjects(&self) -> &[String] {
        &self.subjects
    }

    pub fn is_empty(&self) -> bool {
        self.students.is_empty()
    }

    /// Reads every averages workbook of `class` into the average slots.
    #[tracing::instrument(skip(self, class, sources, layout), fields(class = %class, sources = sources.len()))]
    pub fn load_averages(
        &mut self,
        class: &ClassLabel,
        scheme: PeriodScheme,
        sources: &[AveragesSource],
        layout: &LayoutConfig,
    ) -> Result<()> {
        if sources.is_empty() {
            return Err(ReconcileError::MissingSource {
                class: class.to_string(),
            });
        }

        for source in sources {
            if source.period >= scheme.active_periods() {
                return Err(ReconcileError::Layout(format!(
                    "{} covers period {}, but class {} has only {}",
                    source.path.display(),
                    source.period + 1,
                    class,
                    scheme.active_periods()
                )));
            }
            let range = parser::read_first_sheet(&source.path)?;
            let sheet = parser::parse_averages(&range, layout)?;
            info!(
                path = %source.path.display(),
                period = source.period + 1,
                students = sheet.rows.len(),
                "Loaded averages"
            );
            self.merge_averages(&sheet, source.period);
        }

        Ok(())
    }

    /// Reads `class`'s block of the finals workbook into the actual slots.
    #[tracing::instrument(skip(self, path, class, layout), fields(class = %class, path = %path.display()))]
    pub fn load_finals(
        &mut self,
        path: &std::path::Path,
        class: &ClassLabel,
        scheme: PeriodScheme,
        layout: &LayoutConfig,
    ) -> Result<()> {
        let range = parser::read_grade_sheet(path, class)?;
        let block = parser::parse_finals(&range, class, scheme, layout)?;
        info!(
            columns = block.columns.len(),
            students = block.rows.len(),
            "Loaded finals"
        );
        self.merge_finals(&block);
        Ok(())
    }

    /// Stores one averages sheet as the averages of `period`.
    pub fn merge_averages(&mut self, sheet: &AveragesSheet, period: usize) {
        for row in &sheet.rows {
            for (subject, mark) in sheet.subjects.iter().zip(&row.marks) {
                self.record(&row.student, subject, period, SlotField::Average, mark);
            }
        }
    }

    /// Stores the grades of one finals block.
    pub fn merge_finals(&mut self, block: &FinalsBlock) {
        for row in &block.rows {
            for (column, grade) in block.columns.iter().zip(&row.grades) {
                self.record(&row.student, &column.subject, column.period, SlotField::Actual, grade);
            }
        }
    }

    /// Stores an average for a student directly.
    pub fn record_average(&mut self, student: &str, subject: &str, period: usize, mark: MarkValue) {
        self.record(student, subject, period, SlotField::Average, &mark);
    }

    /// Stores an actual grade for a student directly.
    pub fn record_actual(&mut self, student: &str, subject: &str, period: usize, mark: MarkValue) {
        self.record(student, subject, period, SlotField::Actual, &mark);
    }

    fn record(
        &mut self,
        student: &str,
        subject: &str,
        period: usize,
        field: SlotField,
        mark: &MarkValue,
    ) {
        if period >= PERIOD_SLOTS {
            debug!(student, subject, period, "Period outside slot range, ignoring");
            return;
        }
        if !self.subjects.iter().any(|s| s == subject) {
            debug!(subject, "New subject");
            self.subjects.push(subject.to_string());
        }

        let slots = self
            .students
            .entry(student.to_string())
            .or_default()
            .entry(subject.to_string())
            .or_default();

        // Blank cells create the subject entry without clearing earlier data.
        if mark.is_missing() {
            return;
        }
        let slot = &mut slots[period];
        match field {
            SlotField::Average => slot.average = mark.clone(),
            SlotField::Actual => slot.actual = mark.clone(),
        }
    }
}
