//! Workbook readers for the averages and finals layouts.
//!
//! Both readers work on a `calamine` [`Range`] with absolute, 0-based
//! coordinates, so they can be fed either a sheet read from disk or a
//! range built in memory.

use calamine::{Data, Range, Reader, open_workbook_auto};
use std::path::Path;
use tracing::{debug, warn};

use crate::analyzers::types::{ClassLabel, MarkValue, PeriodScheme};
use crate::analyzers::utility::{normalize_name, period_number};
use crate::config::LayoutConfig;
use crate::error::{ReconcileError, Result};

/// Subjects and student rows read from one averages workbook.
#[derive(Debug, Default, PartialEq)]
pub struct AveragesSheet {
    pub subjects: Vec<String>,
    pub rows: Vec<AveragesRow>,
}

/// One student's averages, aligned with [`AveragesSheet::subjects`].
#[derive(Debug, PartialEq)]
pub struct AveragesRow {
    pub student: String,
    pub marks: Vec<MarkValue>,
}

/// A grade column of a finals block.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalsColumn {
    pub subject: String,
    /// 0-based period slot.
    pub period: usize,
}

/// The block of one class inside a finals sheet.
#[derive(Debug, Default, PartialEq)]
pub struct FinalsBlock {
    pub columns: Vec<FinalsColumn>,
    pub rows: Vec<FinalsRow>,
}

/// One student's grades, aligned with [`FinalsBlock::columns`].
#[derive(Debug, PartialEq)]
pub struct FinalsRow {
    pub student: String,
    pub grades: Vec<MarkValue>,
}

/// Reads the first sheet of the workbook at `path`.
pub fn read_first_sheet(path: &Path) -> Result<Range<Data>> {
    let mut workbook = open_workbook_auto(path)?;
    let names = workbook.sheet_names();
    let Some(first) = names.first() else {
        return Err(ReconcileError::Layout(format!(
            "{} contains no sheets",
            path.display()
        )));
    };
    debug!(path = %path.display(), sheet = %first, "Reading averages sheet");
    Ok(workbook.worksheet_range(first)?)
}

/// Reads the sheet of the finals workbook that holds `class`'s grade level.
pub fn read_grade_sheet(path: &Path, class: &ClassLabel) -> Result<Range<Data>> {
    let mut workbook = open_workbook_auto(path)?;
    let names = workbook.sheet_names();
    let sheet = select_grade_sheet(&names, class.grade_level()).ok_or_else(|| {
        ReconcileError::ClassNotFound {
            class: class.to_string(),
            reason: format!("no sheet for grade level {}", class.grade_level()),
        }
    })?;
    debug!(path = %path.display(), sheet = %sheet, "Reading finals sheet");
    Ok(workbook.worksheet_range(&sheet)?)
}

/// Picks the sheet whose name starts with the grade level, e.g. `7` or
/// `7 классы` for level 7 (but not `17`).
pub fn select_grade_sheet(names: &[String], grade_level: u8) -> Option<String> {
    names
        .iter()
        .find(|name| {
            let digits: String = name
                .trim()
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect();
            digits.parse::<u8>().ok() == Some(grade_level)
        })
        .cloned()
}

/// Converts a cell into a mark.
pub fn cell_mark(cell: &Data) -> MarkValue {
    match cell {
        Data::Empty => MarkValue::Missing,
        Data::Float(v) => MarkValue::Numeric(*v),
        Data::Int(v) => MarkValue::Numeric(*v as f64),
        Data::String(s) => MarkValue::parse(s),
        other => MarkValue::parse(&other.to_string()),
    }
}

/// Trimmed text of a cell; numbers are written without a trailing `.0`.
pub fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(v) if v.fract() == 0.0 => format!("{}", *v as i64),
        other => other.to_string().trim().to_string(),
    }
}

fn text_at(range: &Range<Data>, row: u32, col: u32) -> String {
    range.get_value((row, col)).map(cell_text).unwrap_or_default()
}

fn mark_at(range: &Range<Data>, row: u32, col: u32) -> MarkValue {
    range.get_value((row, col)).map(cell_mark).unwrap_or_default()
}

/// Parses an averages sheet: subject names on the header row, then one
/// student per row until the first blank name.
pub fn parse_averages(range: &Range<Data>, layout: &LayoutConfig) -> Result<AveragesSheet> {
    let Some((last_row, last_col)) = range.end() else {
        return Err(ReconcileError::Layout("averages sheet is empty".to_string()));
    };
    let header_row = layout.averages_header_index();
    let name_col = layout.averages_name_index();

    if header_row > last_row {
        return Err(ReconcileError::Layout(format!(
            "averages sheet ends before header row {}",
            layout.averages_header_row
        )));
    }

    let mut subject_columns = Vec::new();
    for col in name_col + 1..=last_col {
        let subject = text_at(range, header_row, col);
        if subject.is_empty() {
            continue;
        }
        subject_columns.push((col, subject));
    }

    let mut sheet = AveragesSheet {
        subjects: subject_columns.iter().map(|(_, s)| s.clone()).collect(),
        rows: Vec::new(),
    };

    for row in header_row + 1..=last_row {
        let student = normalize_name(&text_at(range, row, name_col));
        if student.is_empty() {
            break;
        }
        let marks = subject_columns
            .iter()
            .map(|(col, _)| mark_at(range, row, *col))
            .collect();
        sheet.rows.push(AveragesRow { student, marks });
    }

    debug!(
        subjects = sheet.subjects.len(),
        students = sheet.rows.len(),
        "Parsed averages sheet"
    );
    Ok(sheet)
}

/// Parses a period header such as `1 триместр`, `IIтр`, `2-е полугодие` or
/// `Term 3` into its scheme and 0-based slot. Anything else (annual or exam
/// columns) yields `None`.
pub fn parse_period_label(label: &str) -> Option<(PeriodScheme, usize)> {
    let lower = label.trim().to_lowercase();
    let scheme = if lower.contains("тр") || lower.contains("term") || lower.contains("trim") {
        PeriodScheme::Terms
    } else if lower.contains("пол") || lower.contains("пг") || lower.contains("half") {
        PeriodScheme::HalfYears
    } else {
        return None;
    };

    // The last in-range numeral wins, so `7-А класс IIтр` reads as term 2.
    let number = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .filter_map(|token| {
            let digits: String = token.chars().take_while(char::is_ascii_digit).collect();
            if !digits.is_empty() {
                return period_number(&digits);
            }
            let roman: String = token
                .chars()
                .take_while(|c| matches!(c, 'i' | 'v' | 'і'))
                .collect();
            let rest = &token[roman.len()..];
            // `iiтр` is a numeral with a suffix, `item` is a word.
            if roman.is_empty() || rest.starts_with(|c: char| c.is_ascii_alphabetic()) {
                return None;
            }
            period_number(&roman)
        })
        .filter(|number| (1..=scheme.active_periods()).contains(number))
        .last()?;

    Some((scheme, number - 1))
}

/// Finds `class`'s block in a finals sheet and reads its grade columns and
/// student rows.
pub fn parse_finals(
    range: &Range<Data>,
    class: &ClassLabel,
    scheme: PeriodScheme,
    layout: &LayoutConfig,
) -> Result<FinalsBlock> {
    let not_found = |reason: &str| ReconcileError::ClassNotFound {
        class: class.to_string(),
        reason: reason.to_string(),
    };

    let (Some((first_row, _)), Some((last_row, last_col))) = (range.start(), range.end()) else {
        return Err(not_found("finals sheet is empty"));
    };
    let name_col = layout.finals_name_index();

    let label_row = (first_row..=last_row)
        .find(|row| text_at(range, *row, name_col) == class.as_str())
        .ok_or_else(|| not_found("no block with this label"))?;
    let subject_row = label_row + 1;
    let period_row = label_row + 2;

    let mut columns = Vec::new();
    let mut positions = Vec::new();
    let mut current_subject: Option<String> = None;
    for col in name_col + 1..=last_col {
        let subject = text_at(range, subject_row, col);
        if !subject.is_empty() {
            current_subject = Some(subject);
        }
        let label = text_at(range, period_row, col);
        if label.is_empty() {
            continue;
        }
        let Some(subject) = current_subject.clone() else {
            warn!(column = col + 1, "Period column before any subject, skipping");
            continue;
        };
        match parse_period_label(&label) {
            Some((kind, period)) if kind == scheme => {
                columns.push(FinalsColumn { subject, period });
                positions.push(col);
            }
            Some((kind, _)) => {
                warn!(column = col + 1, label = %label, ?kind, ?scheme, "Period scheme mismatch, skipping");
            }
            None => {
                debug!(column = col + 1, label = %label, "Not a period column, skipping");
            }
        }
    }

    if columns.is_empty() {
        return Err(not_found("block has no period columns"));
    }

    let mut rows = Vec::new();
    for row in period_row + 1..=last_row {
        let raw_name = text_at(range, row, name_col);
        if raw_name.is_empty() || ClassLabel::parse(&raw_name).is_ok() {
            break;
        }
        let grades = positions
            .iter()
            .map(|col| mark_at(range, row, *col))
            .collect();
        rows.push(FinalsRow {
            student: normalize_name(&raw_name),
            grades,
        });
    }

    debug!(
        class = %class,
        label_row = label_row + 1,
        columns = columns.len(),
        students = rows.len(),
        "Parsed finals block"
    );
    Ok(FinalsBlock { columns, rows })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn put(range: &mut Range<Data>, row: u32, col: u32, text: &str) {
        range.set_value((row, col), Data::String(text.to_string()));
    }

    fn averages_range() -> Range<Data> {
        let mut range = Range::new((0, 0), (9, 3));
        put(&mut range, 0, 0, "Отчёт по средним баллам");
        put(&mut range, 5, 1, "Алгебра");
        put(&mut range, 5, 2, "История");
        put(&mut range, 5, 3, "Физкультура");
        put(&mut range, 6, 0, "Иванов Пётр Сергеевич");
        range.set_value((6, 1), Data::Float(3.4));
        range.set_value((6, 2), Data::Float(4.5));
        put(&mut range, 6, 3, "осв");
        put(&mut range, 7, 0, "Петрова Анна");
        range.set_value((7, 1), Data::Int(5));
        put(&mut range, 8, 0, "");
        put(&mut range, 9, 0, "Итого");
        range
    }

    #[test]
    fn test_parse_averages_reads_until_blank_name() {
        let sheet = parse_averages(&averages_range(), &LayoutConfig::default()).unwrap();

        assert_eq!(sheet.subjects, vec!["Алгебра", "История", "Физкультура"]);
        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(sheet.rows[0].student, "Иванов Пётр");
        assert_eq!(
            sheet.rows[0].marks,
            vec![
                MarkValue::Numeric(3.4),
                MarkValue::Numeric(4.5),
                MarkValue::Marker("осв".into())
            ]
        );
        assert_eq!(sheet.rows[1].marks[0], MarkValue::Numeric(5.0));
        assert_eq!(sheet.rows[1].marks[1], MarkValue::Missing);
    }

    #[test]
    fn test_parse_averages_rejects_short_sheet() {
        let range = Range::new((0, 0), (2, 2));
        assert!(matches!(
            parse_averages(&range, &LayoutConfig::default()),
            Err(ReconcileError::Layout(_))
        ));
    }

    #[test]
    fn test_parse_period_label() {
        assert_eq!(parse_period_label("1 триместр"), Some((PeriodScheme::Terms, 0)));
        assert_eq!(parse_period_label("IIтр"), Some((PeriodScheme::Terms, 1)));
        assert_eq!(parse_period_label("3-й триместр"), Some((PeriodScheme::Terms, 2)));
        assert_eq!(parse_period_label("2 полугодие"), Some((PeriodScheme::HalfYears, 1)));
        assert_eq!(parse_period_label("I пг"), Some((PeriodScheme::HalfYears, 0)));
        assert_eq!(parse_period_label("Term 3"), Some((PeriodScheme::Terms, 2)));
        assert_eq!(parse_period_label("год"), None);
        assert_eq!(parse_period_label("3 полугодие"), None);
        assert_eq!(parse_period_label("4 триместр"), None);
        assert_eq!(parse_period_label("7-А класс IIтр"), Some((PeriodScheme::Terms, 1)));
        assert_eq!(parse_period_label("Iтр 2023"), Some((PeriodScheme::Terms, 0)));
    }

    #[test]
    fn test_select_grade_sheet() {
        let names: Vec<String> = ["5", "7 классы", "17", "10"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(select_grade_sheet(&names, 7).as_deref(), Some("7 классы"));
        assert_eq!(select_grade_sheet(&names, 10).as_deref(), Some("10"));
        assert_eq!(select_grade_sheet(&names, 1), None);
    }

    fn finals_range() -> Range<Data> {
        let mut range = Range::new((0, 0), (12, 5));
        // Block of another class first.
        put(&mut range, 0, 0, "7-Б");
        put(&mut range, 1, 1, "Алгебра");
        put(&mut range, 2, 1, "1 тр");
        put(&mut range, 3, 0, "Сидоров Олег");
        put(&mut range, 3, 1, "5");

        put(&mut range, 5, 0, "7-А");
        put(&mut range, 6, 1, "Алгебра");
        put(&mut range, 7, 1, "1 тр");
        put(&mut range, 7, 2, "2 тр");
        put(&mut range, 7, 3, "год");
        put(&mut range, 6, 4, "История");
        put(&mut range, 7, 4, "I тр");
        put(&mut range, 7, 5, "II тр");
        put(&mut range, 8, 0, "Иванов Пётр Сергеевич");
        put(&mut range, 8, 1, "4");
        range.set_value((8, 2), Data::Float(3.0));
        put(&mut range, 8, 3, "4");
        put(&mut range, 8, 4, "осв");
        put(&mut range, 9, 0, "Петрова Анна");
        put(&mut range, 9, 2, "5");
        put(&mut range, 11, 0, "Лишний Ученик");
        range
    }

    #[test]
    fn test_parse_finals_finds_block_and_columns() {
        let class = ClassLabel::parse("7-А").unwrap();
        let block =
            parse_finals(&finals_range(), &class, PeriodScheme::Terms, &LayoutConfig::default())
                .unwrap();

        assert_eq!(
            block.columns,
            vec![
                FinalsColumn { subject: "Алгебра".into(), period: 0 },
                FinalsColumn { subject: "Алгебра".into(), period: 1 },
                FinalsColumn { subject: "История".into(), period: 0 },
                FinalsColumn { subject: "История".into(), period: 1 },
            ]
        );
        assert_eq!(block.rows.len(), 2);
        assert_eq!(block.rows[0].student, "Иванов Пётр");
        assert_eq!(
            block.rows[0].grades,
            vec![
                MarkValue::Numeric(4.0),
                MarkValue::Numeric(3.0),
                MarkValue::Marker("осв".into()),
                MarkValue::Missing,
            ]
        );
        assert_eq!(block.rows[1].grades[0], MarkValue::Missing);
        assert_eq!(block.rows[1].grades[1], MarkValue::Numeric(5.0));
    }

    #[test]
    fn test_parse_finals_stops_at_next_label() {
        let class = ClassLabel::parse("7-Б").unwrap();
        let block =
            parse_finals(&finals_range(), &class, PeriodScheme::Terms, &LayoutConfig::default())
                .unwrap();
        assert_eq!(block.rows.len(), 1);
        assert_eq!(block.rows[0].student, "Сидоров Олег");
    }

    #[test]
    fn test_parse_finals_unknown_class() {
        let class = ClassLabel::parse("7-В").unwrap();
        let result =
            parse_finals(&finals_range(), &class, PeriodScheme::Terms, &LayoutConfig::default());
        assert!(matches!(result, Err(ReconcileError::ClassNotFound { .. })));
    }

    #[test]
    fn test_parse_finals_skips_other_scheme() {
        let class = ClassLabel::parse("7-А").unwrap();
        let result = parse_finals(
            &finals_range(),
            &class,
            PeriodScheme::HalfYears,
            &LayoutConfig::default(),
        );
        assert!(matches!(result, Err(ReconcileError::ClassNotFound { .. })));
    }
}
