//! Workbook layout settings.
//!
//! Defaults describe the school's usual exports. A JSON file can override
//! any subset of them:
//! ```json
//! {
//!   "averages_header_row": 6,
//!   "half_year_levels": [10, 11],
//!   "report_sheet_name": "Discrepancies"
//! }
//! ```
//! Row and column numbers are 1-based, the way they appear in a spreadsheet.

use serde::Deserialize;
use std::path::Path;

use crate::error::{ReconcileError, Result};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LayoutConfig {
    /// Row holding subject names in an averages workbook.
    pub averages_header_row: u32,
    /// Column holding student names in an averages workbook; subjects start
    /// in the next column.
    pub averages_name_column: u32,
    /// Column holding class labels and student names in the finals workbook;
    /// grades start in the next column.
    pub finals_name_column: u32,
    /// Grade levels split into two half-years instead of three terms.
    pub half_year_levels: Vec<u8>,
    /// Prefix of generated workbooks; also used to skip them during discovery.
    pub output_prefix: String,
    pub summary_sheet_name: String,
    pub report_sheet_name: String,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            averages_header_row: 6,
            averages_name_column: 1,
            finals_name_column: 1,
            half_year_levels: vec![10, 11],
            output_prefix: "result_".to_string(),
            summary_sheet_name: "Summary".to_string(),
            report_sheet_name: "Discrepancies".to_string(),
        }
    }
}

impl LayoutConfig {
    /// Loads the layout from a JSON file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: LayoutConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` when given, otherwise returns the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.averages_header_row == 0
            || self.averages_name_column == 0
            || self.finals_name_column == 0
        {
            return Err(ReconcileError::Layout(
                "rows and columns are numbered from 1".to_string(),
            ));
        }
        if self.summary_sheet_name == self.report_sheet_name {
            return Err(ReconcileError::Layout(
                "summary and report sheets need different names".to_string(),
            ));
        }
        Ok(())
    }

    /// 0-based header row of an averages sheet.
    pub(crate) fn averages_header_index(&self) -> u32 {
        self.averages_header_row - 1
    }

    pub(crate) fn averages_name_index(&self) -> u32 {
        self.averages_name_column - 1
    }

    pub(crate) fn finals_name_index(&self) -> u32 {
        self.finals_name_column - 1
    }
}
