//! Mark aggregation and grade reconciliation.
//!
//! This module merges per-period averages with the final grades from the
//! finals workbook, derives the recommended grade for each period and reports where
//! the two disagree.

pub mod aggregate;
pub mod analyzer;
pub mod discrepancy;
pub mod grade;
pub mod types;
pub mod utility;
