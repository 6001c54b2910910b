//! Error type shared by the reconciliation pipeline.

/// Everything that can stop a single class from being reconciled.
#[derive(thiserror::Error, Debug)]
pub enum ReconcileError {
    /// No averages workbook was found for the class.
    #[error("no averages workbook found for class {class}")]
    MissingSource { class: String },

    /// The class label does not look like `<grade level>-<letter>`.
    #[error("malformed class label `{0}`, expected a grade level and a letter separated by `-`")]
    MalformedClassLabel(String),

    /// Only `.xlsx` workbooks are supported.
    #[error("unsupported file extension: `{0}`")]
    UnsupportedFormat(String),

    /// The finals workbook has no block for the class.
    #[error("class {class} not found in the finals workbook: {reason}")]
    ClassNotFound { class: String, reason: String },

    /// A workbook does not have the expected layout.
    #[error("unexpected workbook layout: {0}")]
    Layout(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Read(#[from] calamine::Error),

    #[error(transparent)]
    Write(#[from] rust_xlsxwriter::XlsxError),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ReconcileError {
    /// Short machine-friendly name of the error, used in the run log.
    pub fn kind(&self) -> &'static str {
        match self {
            ReconcileError::MissingSource { .. } => "missing_source",
            ReconcileError::MalformedClassLabel(_) => "malformed_class_label",
            ReconcileError::UnsupportedFormat(_) => "unsupported_format",
            ReconcileError::ClassNotFound { .. } => "class_not_found",
            ReconcileError::Layout(_) => "layout",
            ReconcileError::Io(_) => "io",
            ReconcileError::Read(_) => "read",
            ReconcileError::Write(_) => "write",
            ReconcileError::Csv(_) => "csv",
            ReconcileError::Json(_) => "json",
        }
    }
}

pub type Result<T> = std::result::Result<T, ReconcileError>;
