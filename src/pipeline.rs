// 🔄 Pipeline - raw table → normalized → ratio-augmented dataset

use crate::dataset::Dataset;
use crate::error::PipelineResult;
use crate::normalizer::{DatasetNormalizer, NormalizationReport};
use crate::ratios::{RatioEngine, RatioReport};
use crate::table::RawTable;

#[derive(Debug)]
pub struct PipelineOutput {
    pub dataset: Dataset,
    pub normalization: NormalizationReport,
    pub ratios: RatioReport,
}

/// Run the full batch pipeline. Fatal errors abort; a ratio with a missing
/// input column is reported in `ratios.failures` and skipped.
pub fn run_pipeline(table: RawTable) -> PipelineResult<PipelineOutput> {
    let (mut dataset, normalization) = DatasetNormalizer::new().normalize(table)?;
    let ratios = RatioEngine::new().calculate(&mut dataset);

    tracing::info!(
        rows = dataset.len(),
        companies = dataset.companies().len(),
        "pipeline complete"
    );

    Ok(PipelineOutput {
        dataset,
        normalization,
        ratios,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;

    #[test]
    fn test_output_schema_and_order() {
        let table = RawTable::from_strs(
            &["Company ", "Year", "Total Revenue", "Net Income", "Total Assets", "Total Liabilities", "Cash Flow from Operating Activities"],
            &[
                &["B", "2024", "10", "1", "20", "5", "2"],
                &["A", "2023", "10", "", "20", "5", "2"],
                &["B", "2024", "99", "9", "99", "9", "9"],
            ],
        );
        let out = run_pipeline(table).unwrap();

        assert_eq!(out.dataset.len(), 2, "same row count as the cleaned table");
        assert_eq!(out.dataset.records()[0].company, "B");
        assert_eq!(out.dataset.records()[1].company, "A");
        assert_eq!(out.dataset.columns().len(), 7 + 4);
        assert_eq!(out.normalization.duplicates_removed, 1);
        assert!(out.ratios.failures.is_empty());
    }

    #[test]
    fn test_fatal_error_aborts() {
        let table = RawTable::from_strs(&["Company", "Year"], &[&["A", "soon"]]);
        let err = run_pipeline(table).unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(err, PipelineError::DataType { .. }));
    }
}
