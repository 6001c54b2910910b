//! Output formatting and persistence.
//!
//! Writes the summary workbook with its discrepancy sheet, and appends
//! per-class records to the CSV run log.

use csv::WriterBuilder;
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook, Worksheet};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::analyzers::aggregate::Aggregator;
use crate::analyzers::discrepancy::{is_mismatch, slot_recommendation, sort_by_subject};
use crate::analyzers::types::{
    ClassLabel, Discrepancy, MarkValue, PERIOD_SLOTS, PeriodScheme, PeriodSlot,
};
use crate::config::LayoutConfig;
use crate::error::{ReconcileError, Result};
use crate::summary::ClassSummary;

/// Fill of a period whose grades disagree.
const MISMATCH_FILL: u32 = 0xFF4040;

/// Columns per subject: three periods of average, recommended and actual.
const SUBJECT_WIDTH: usize = PERIOD_SLOTS * 3;

/// Header rows above the first student.
const HEADER_ROWS: u32 = 3;

/// Column of the first subject, after the number and name columns.
const FIRST_SUBJECT_COL: usize = 2;

/// Where the workbook of `class` goes inside `dir`.
pub fn output_path(dir: &Path, class: &ClassLabel, layout: &LayoutConfig) -> PathBuf {
    dir.join(format!("{}{}.xlsx", layout.output_prefix, class))
}

/// Logs a run summary as pretty-printed JSON.
pub fn print_json(summary: &ClassSummary) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(summary)?);
    Ok(())
}

/// Appends a [`ClassSummary`] record as a row to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_record(path: &Path, summary: &ClassSummary) -> Result<()> {
    let file_exists = path.exists();
    debug!(path = %path.display(), file_exists, "Appending CSV record");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // header only on a new file
        .from_writer(file);

    writer.serialize(summary)?;
    writer.flush()?;

    Ok(())
}

/// Writes the summary sheet and, when `discrepancies` is given, the
/// discrepancy sheet to `path`.
#[tracing::instrument(skip_all, fields(path = %path.display()))]
pub fn write_workbook(
    path: &Path,
    aggregator: &Aggregator,
    scheme: PeriodScheme,
    discrepancies: Option<&[Discrepancy]>,
    layout: &LayoutConfig,
) -> Result<()> {
    let mut workbook = Workbook::new();

    let summary = workbook.add_worksheet();
    summary.set_name(&layout.summary_sheet_name)?;
    write_summary_sheet(summary, aggregator, scheme)?;

    if let Some(discrepancies) = discrepancies {
        let report = workbook.add_worksheet();
        report.set_name(&layout.report_sheet_name)?;
        write_report_sheet(report, discrepancies, scheme)?;
    }

    workbook.save(path)?;
    info!(
        students = aggregator.students().len(),
        subjects = aggregator.subjects().len(),
        "Workbook written"
    );
    Ok(())
}

fn column(index: usize) -> Result<u16> {
    u16::try_from(index)
        .map_err(|_| ReconcileError::Layout(format!("column {index} is out of range")))
}

fn row(index: usize) -> Result<u32> {
    u32::try_from(index).map_err(|_| ReconcileError::Layout(format!("row {index} is out of range")))
}

/// Right border separating a column from the next: thin inside a period,
/// double between periods, thick between subjects.
fn right_border(offset: usize) -> FormatBorder {
    match offset {
        o if o + 1 == SUBJECT_WIDTH => FormatBorder::Thick,
        o if o % 3 == 2 => FormatBorder::Double,
        _ => FormatBorder::Thin,
    }
}

fn cell_format(offset: usize, flagged: bool, last_row: bool) -> Format {
    let mut format = Format::new()
        .set_align(FormatAlign::Center)
        .set_border_right(right_border(offset));
    if last_row {
        format = format.set_border_bottom(FormatBorder::Thin);
    }
    if flagged {
        format = format
            .set_bold()
            .set_background_color(Color::RGB(MISMATCH_FILL));
    }
    format
}

fn write_mark(
    sheet: &mut Worksheet,
    row: u32,
    col: u16,
    mark: &MarkValue,
    format: &Format,
) -> Result<()> {
    match mark {
        MarkValue::Numeric(v) => {
            sheet.write_number_with_format(row, col, *v, format)?;
        }
        MarkValue::Marker(code) => {
            sheet.write_string_with_format(row, col, code, format)?;
        }
        MarkValue::Missing => {
            sheet.write_blank(row, col, format)?;
        }
    }
    Ok(())
}

fn write_summary_header(
    sheet: &mut Worksheet,
    subjects: &[String],
    scheme: PeriodScheme,
) -> Result<()> {
    let centered = Format::new()
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter);

    sheet.merge_range(
        0,
        0,
        HEADER_ROWS - 1,
        0,
        "No.",
        &centered
            .clone()
            .set_border_right(FormatBorder::Thin)
            .set_border_bottom(FormatBorder::Thin),
    )?;
    sheet.merge_range(
        0,
        1,
        HEADER_ROWS - 1,
        1,
        "Student",
        &centered
            .clone()
            .set_border_right(FormatBorder::Thick)
            .set_border_bottom(FormatBorder::Thin),
    )?;
    sheet.set_column_width(0, 8)?;
    sheet.set_column_width(1, 45)?;

    for (idx, subject) in subjects.iter().enumerate() {
        let base = FIRST_SUBJECT_COL + idx * SUBJECT_WIDTH;
        sheet.merge_range(
            0,
            column(base)?,
            0,
            column(base + SUBJECT_WIDTH - 1)?,
            subject,
            &centered.clone().set_border_right(FormatBorder::Thick),
        )?;

        for period in 0..PERIOD_SLOTS {
            let first = period * 3;
            let label = if period < scheme.active_periods() {
                scheme.period_label(period)
            } else {
                "-".to_string()
            };
            sheet.merge_range(
                1,
                column(base + first)?,
                1,
                column(base + first + 2)?,
                &label,
                &centered
                    .clone()
                    .set_border_top(FormatBorder::Thin)
                    .set_border_bottom(FormatBorder::Thin)
                    .set_border_right(right_border(first + 2)),
            )?;

            for (offset, caption) in ["avg", "rec", "actual"].into_iter().enumerate() {
                let format = centered
                    .clone()
                    .set_border_bottom(FormatBorder::Thin)
                    .set_border_right(right_border(first + offset));
                sheet.write_string_with_format(
                    2,
                    column(base + first + offset)?,
                    caption,
                    &format,
                )?;
            }
        }
    }

    sheet.set_freeze_panes(HEADER_ROWS, column(FIRST_SUBJECT_COL)?)?;
    Ok(())
}

fn write_summary_sheet(
    sheet: &mut Worksheet,
    aggregator: &Aggregator,
    scheme: PeriodScheme,
) -> Result<()> {
    let subjects = aggregator.subjects();
    write_summary_header(sheet, subjects, scheme)?;

    let total = aggregator.students().len();
    let empty = [PeriodSlot::default(), PeriodSlot::default(), PeriodSlot::default()];

    for (idx, (student, record)) in aggregator.students().iter().enumerate() {
        let r = HEADER_ROWS + row(idx)?;
        let last_row = idx + 1 == total;

        let mut number = Format::new()
            .set_align(FormatAlign::Left)
            .set_border_right(FormatBorder::Thin);
        let mut name = Format::new().set_border_right(FormatBorder::Thick);
        if last_row {
            number = number.set_border_bottom(FormatBorder::Thin);
            name = name.set_border_bottom(FormatBorder::Thin);
        }
        sheet.write_number_with_format(r, 0, (idx + 1) as f64, &number)?;
        sheet.write_string_with_format(r, 1, student, &name)?;

        for (subject_idx, subject) in subjects.iter().enumerate() {
            let base = FIRST_SUBJECT_COL + subject_idx * SUBJECT_WIDTH;
            let slots = record.get(subject).unwrap_or(&empty);

            for (period, slot) in slots.iter().enumerate() {
                let first = period * 3;
                if period >= scheme.active_periods() {
                    for offset in first..first + 3 {
                        let format = cell_format(offset, false, last_row);
                        sheet.write_blank(r, column(base + offset)?, &format)?;
                    }
                    continue;
                }

                let flagged = is_mismatch(slot);
                let marks = [
                    slot.average.or_zero(),
                    slot_recommendation(slot),
                    slot.actual.or_zero(),
                ];
                for (offset, mark) in marks.iter().enumerate() {
                    let format = cell_format(first + offset, flagged, last_row);
                    write_mark(sheet, r, column(base + first + offset)?, mark, &format)?;
                }
            }
        }
    }

    Ok(())
}

fn write_report_sheet(
    sheet: &mut Worksheet,
    discrepancies: &[Discrepancy],
    scheme: PeriodScheme,
) -> Result<()> {
    let header = Format::new()
        .set_bold()
        .set_align(FormatAlign::Center)
        .set_border_bottom(FormatBorder::Thin);
    let centered = Format::new().set_align(FormatAlign::Center);
    let text = Format::new();

    for (col, caption) in ["Student", "Subject", "Period", "Average", "Recommended", "Actual"]
        .into_iter()
        .enumerate()
    {
        sheet.write_string_with_format(0, column(col)?, caption, &header)?;
    }
    sheet.set_column_width(0, 45)?;
    sheet.set_column_width(1, 30)?;
    sheet.set_column_width(2, 14)?;
    sheet.set_column_width(3, 10)?;
    sheet.set_column_width(4, 14)?;
    sheet.set_column_width(5, 10)?;

    let mut sorted = discrepancies.to_vec();
    sort_by_subject(&mut sorted);

    for (idx, d) in sorted.iter().enumerate() {
        let r = row(idx + 1)?;
        sheet.write_string_with_format(r, 0, &d.student, &text)?;
        sheet.write_string_with_format(r, 1, &d.subject, &text)?;
        sheet.write_string_with_format(r, 2, scheme.period_label(d.period), &centered)?;
        write_mark(sheet, r, 3, &d.average, &centered)?;
        write_mark(sheet, r, 4, &d.recommended, &centered)?;
        write_mark(sheet, r, 5, &d.actual, &centered)?;
    }

    Ok(())
}
