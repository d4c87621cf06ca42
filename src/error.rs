// ⚠️ Pipeline Errors - typed failures for dataset construction
// Dialogue turns never surface these: see dialogue::Reply

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// A cell could not be coerced to the type its column requires.
    /// Fatal: the record cannot be keyed or computed.
    #[error("row {row}: value {value:?} in column '{column}' is not a valid {expected}")]
    DataType {
        row: usize,
        column: String,
        value: String,
        expected: &'static str,
    },

    /// Company or Year column absent from the input table
    #[error("required key column '{0}' is missing from the input table")]
    MissingKeyColumn(String),

    /// A raw column needed by one ratio is absent.
    /// Isolated: only that ratio is skipped.
    #[error("cannot compute '{ratio}': required column '{column}' is missing")]
    MissingColumn { ratio: String, column: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Whether this error aborts the batch pipeline
    pub fn is_fatal(&self) -> bool {
        !matches!(self, PipelineError::MissingColumn { .. })
    }
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_column_is_not_fatal() {
        let err = PipelineError::MissingColumn {
            ratio: "ROA (%)".to_string(),
            column: "Total Assets".to_string(),
        };
        assert!(!err.is_fatal(), "MissingColumn must be isolated per ratio");

        let err = PipelineError::MissingKeyColumn("Year".to_string());
        assert!(err.is_fatal());
    }

    #[test]
    fn test_data_type_message_names_row_and_value() {
        let err = PipelineError::DataType {
            row: 3,
            column: "Year".to_string(),
            value: "FY23".to_string(),
            expected: "integer",
        };
        let msg = err.to_string();
        assert!(msg.contains("row 3"));
        assert!(msg.contains("\"FY23\""));
        assert!(msg.contains("integer"));
    }
}
