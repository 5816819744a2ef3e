use table_loader::LoadError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Every way a report run can fail. Nothing is partially produced on error.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid file format for {file}. Please upload CSV or Excel files.")]
    Format { file: String },

    #[error("Error reading file {file}: {reason}")]
    Parse { file: String, reason: String },

    #[error("Sheet '{sheet}' not found in {file}.")]
    SheetNotFound { file: String, sheet: String },

    #[error("File {input} is empty.")]
    EmptyInput { input: String },

    #[error("Error: '{column}' column not found in {location}.")]
    MissingColumn { column: String, location: String },

    #[error("Error: {0}")]
    Schema(String),

    #[error("Error: Required sections (MTM, Capital Deployed, Max SL, AVG %) not found in file3: {detail}")]
    SectionNotFound { detail: String },

    #[error("Error converting Date column in file1: {0}")]
    DateParse(String),

    #[error("Invalid date format: {0}. Please use YYYY-MM-DD.")]
    InvalidDate(String),

    #[error("No data found for date {date} in {input}.")]
    NoDataForDate { date: String, input: String },

    #[error("Error processing file2 at row {row}: {reason}")]
    BlockShape { row: usize, reason: String },

    #[error("Error: Capital Deployed has {capital} rows but Max SL has {max_loss}; rows cannot be paired by position.")]
    Misaligned { capital: usize, max_loss: usize },

    #[error("Error processing files: {0}")]
    Internal(String),
}

impl PipelineError {
    pub fn missing_column(column: &str, location: &str) -> Self {
        PipelineError::MissingColumn {
            column: column.to_string(),
            location: location.to_string(),
        }
    }

    /// HTTP-style status class: 400 for bad input, 500 for everything unexpected.
    pub fn status_code(&self) -> u16 {
        match self {
            PipelineError::Internal(_) => 500,
            _ => 400,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Format { .. } => "FormatError",
            PipelineError::Parse { .. } => "ParseError",
            PipelineError::SheetNotFound { .. } => "SheetNotFoundError",
            PipelineError::EmptyInput { .. } => "EmptyInputError",
            PipelineError::MissingColumn { .. } | PipelineError::Schema(_) => "SchemaError",
            PipelineError::SectionNotFound { .. } => "SectionNotFoundError",
            PipelineError::DateParse(_) => "DateParseError",
            PipelineError::InvalidDate(_) => "InvalidDateError",
            PipelineError::NoDataForDate { .. } => "NoDataForDateError",
            PipelineError::BlockShape { .. } => "BlockShapeError",
            PipelineError::Misaligned { .. } => "MisalignedError",
            PipelineError::Internal(_) => "InternalError",
        }
    }
}

impl From<LoadError> for PipelineError {
    fn from(err: LoadError) -> Self {
        match err {
            LoadError::UnsupportedFormat { file } => PipelineError::Format { file },
            LoadError::Parse { file, reason } => PipelineError::Parse { file, reason },
            LoadError::SheetNotFound { file, sheet } => PipelineError::SheetNotFound { file, sheet },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(PipelineError::InvalidDate("x".into()).status_code(), 400);
        assert_eq!(
            PipelineError::missing_column("IDs", "MTM section of file3").status_code(),
            400
        );
        assert_eq!(PipelineError::Internal("boom".into()).status_code(), 500);
    }

    #[test]
    fn test_load_error_conversion_keeps_kind() {
        let err: PipelineError = LoadError::SheetNotFound {
            file: "alloc.xlsx".into(),
            sheet: "Record".into(),
        }
        .into();
        assert_eq!(err.kind(), "SheetNotFoundError");
        assert_eq!(err.to_string(), "Sheet 'Record' not found in alloc.xlsx.");
    }

    #[test]
    fn test_missing_column_message_names_column() {
        let err = PipelineError::missing_column("MTM (All)", "file1");
        assert_eq!(err.to_string(), "Error: 'MTM (All)' column not found in file1.");
        assert_eq!(err.kind(), "SchemaError");
    }
}
