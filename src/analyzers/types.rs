//! Data types used by the reconciliation pipeline.

use std::collections::HashMap;
use std::fmt;

use crate::error::{ReconcileError, Result};

/// Number of period slots kept per subject, whatever the scheme.
pub const PERIOD_SLOTS: usize = 3;

/// Tolerance used when comparing two numeric marks.
const MARK_EPSILON: f64 = 1e-9;

/// A single mark cell: a number, a textual marker such as an exemption
/// code, or nothing at all.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum MarkValue {
    Numeric(f64),
    Marker(String),
    #[default]
    Missing,
}

impl MarkValue {
    /// Parses the text of a cell. Decimal commas are accepted.
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return MarkValue::Missing;
        }
        match trimmed.replace(',', ".").parse::<f64>() {
            Ok(value) if value.is_finite() => MarkValue::Numeric(value),
            _ => MarkValue::Marker(trimmed.to_string()),
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, MarkValue::Missing)
    }

    /// Missing marks count as zero when grades are compared.
    pub fn or_zero(&self) -> MarkValue {
        match self {
            MarkValue::Missing => MarkValue::Numeric(0.0),
            other => other.clone(),
        }
    }

    /// Compares two marks: numbers within a small tolerance, markers by
    /// text ignoring case and padding.
    pub fn same_grade(&self, other: &MarkValue) -> bool {
        match (self, other) {
            (MarkValue::Numeric(a), MarkValue::Numeric(b)) => (a - b).abs() < MARK_EPSILON,
            (MarkValue::Marker(a), MarkValue::Marker(b)) => {
                a.trim().to_lowercase() == b.trim().to_lowercase()
            }
            (MarkValue::Missing, MarkValue::Missing) => true,
            _ => false,
        }
    }
}

impl fmt::Display for MarkValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarkValue::Numeric(v) if v.fract() == 0.0 => write!(f, "{}", *v as i64),
            MarkValue::Numeric(v) => write!(f, "{v}"),
            MarkValue::Marker(code) => f.write_str(code),
            MarkValue::Missing => Ok(()),
        }
    }
}

/// The average and the recorded final grade for one period.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeriodSlot {
    pub average: MarkValue,
    pub actual: MarkValue,
}

/// Subject name to its period slots, for a single student.
pub type StudentRecord = HashMap<String, [PeriodSlot; PERIOD_SLOTS]>;

/// How the school year is split for a grade level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodScheme {
    /// Three terms, slots 0..3.
    Terms,
    /// Two half-years, slots 0..2; slot 2 stays unused.
    HalfYears,
}

impl PeriodScheme {
    pub fn for_grade_level(level: u8, half_year_levels: &[u8]) -> Self {
        if half_year_levels.contains(&level) {
            PeriodScheme::HalfYears
        } else {
            PeriodScheme::Terms
        }
    }

    /// Number of slots in use.
    pub fn active_periods(self) -> usize {
        match self {
            PeriodScheme::Terms => 3,
            PeriodScheme::HalfYears => 2,
        }
    }

    /// Human readable label of a period, e.g. `Term 2`.
    pub fn period_label(self, period: usize) -> String {
        match self {
            PeriodScheme::Terms => format!("Term {}", period + 1),
            PeriodScheme::HalfYears => format!("Half-year {}", period + 1),
        }
    }
}

/// A class identifier such as `7-А`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassLabel {
    label: String,
    grade_level: u8,
}

impl ClassLabel {
    /// Parses `<grade level>-<letter>`.
    pub fn parse(raw: &str) -> Result<Self> {
        let label = raw.trim();
        let Some((level, letter)) = label.split_once('-') else {
            return Err(ReconcileError::MalformedClassLabel(raw.to_string()));
        };
        let grade_level = level
            .trim()
            .parse::<u8>()
            .map_err(|_| ReconcileError::MalformedClassLabel(raw.to_string()))?;
        if letter.trim().is_empty() {
            return Err(ReconcileError::MalformedClassLabel(raw.to_string()));
        }
        Ok(Self {
            label: label.to_string(),
            grade_level,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.label
    }

    pub fn grade_level(&self) -> u8 {
        self.grade_level
    }
}

impl fmt::Display for ClassLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

/// A period where the recommended grade differs from the actual one.
#[derive(Debug, Clone, PartialEq)]
pub struct Discrepancy {
    pub student: String,
    pub subject: String,
    pub period: usize,
    pub average: MarkValue,
    pub recommended: MarkValue,
    pub actual: MarkValue,
}
