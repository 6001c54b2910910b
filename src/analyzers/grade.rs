use crate::analyzers::types::MarkValue;

/// Converts a period average into the recommended grade.
///
/// | Average          | Grade |
/// |------------------|-------|
/// | == 0             | 0     |
/// | < 2.5            | 2     |
/// | < 3.5            | 3     |
/// | < 4.5            | 4     |
/// | >= 4.5           | 5     |
pub fn grade(average: f64) -> u8 {
    match average {
        a if a == 0.0 => 0,
        a if a < 2.5 => 2,
        a if a < 3.5 => 3,
        a if a < 4.5 => 4,
        _ => 5,
    }
}

/// Applies [`grade`] to numeric marks; markers and missing marks pass
/// through unchanged.
pub fn recommended_grade(average: &MarkValue) -> MarkValue {
    match average {
        MarkValue::Numeric(a) => MarkValue::Numeric(f64::from(grade(*a))),
        other => other.clone(),
    }
}
