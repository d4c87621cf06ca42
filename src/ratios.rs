// 📐 Ratio Engine - derived metrics with safe division
//
// A zero denominator makes the ratio undefined for that row (None),
// never infinity and never a fault.

use crate::dataset::Dataset;
use crate::error::PipelineError;
use crate::table::RawField;
use serde::{Deserialize, Serialize};

// ============================================================================
// RATIO DEFINITIONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Ratio {
    /// Profitability
    NetProfitMargin,
    /// Leverage
    DebtRatio,
    /// Cash flow quality
    CfoToNetIncome,
    Roa,
}

impl Ratio {
    pub const ALL: [Ratio; 4] = [
        Ratio::NetProfitMargin,
        Ratio::DebtRatio,
        Ratio::CfoToNetIncome,
        Ratio::Roa,
    ];

    pub fn column_name(&self) -> &'static str {
        match self {
            Ratio::NetProfitMargin => "Net Profit Margin (%)",
            Ratio::DebtRatio => "Debt Ratio (%)",
            Ratio::CfoToNetIncome => "CFO / Net Income",
            Ratio::Roa => "ROA (%)",
        }
    }

    pub fn from_column_name(name: &str) -> Option<Self> {
        Ratio::ALL.into_iter().find(|r| r.column_name() == name)
    }

    /// (numerator, denominator)
    pub fn inputs(&self) -> (RawField, RawField) {
        match self {
            Ratio::NetProfitMargin => (RawField::NetIncome, RawField::TotalRevenue),
            Ratio::DebtRatio => (RawField::TotalLiabilities, RawField::TotalAssets),
            Ratio::CfoToNetIncome => (RawField::OperatingCashFlow, RawField::NetIncome),
            Ratio::Roa => (RawField::NetIncome, RawField::TotalAssets),
        }
    }

    /// Percentages are scaled x100; CFO / Net Income stays a raw ratio
    pub fn scale(&self) -> f64 {
        match self {
            Ratio::CfoToNetIncome => 1.0,
            _ => 100.0,
        }
    }
}

/// numerator / denominator, or None when the denominator is exactly zero
/// or the quotient overflows
pub fn safe_divide(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 {
        None
    } else {
        Some(numerator / denominator).filter(|q| q.is_finite())
    }
}

// ============================================================================
// RATIO REPORT
// ============================================================================

#[derive(Debug, Default)]
pub struct RatioReport {
    pub computed: Vec<Ratio>,
    /// One MissingColumn per ratio that could not be computed
    pub failures: Vec<PipelineError>,
    /// Rows whose ratio came out undefined, per computed ratio
    pub undefined_rows: Vec<(Ratio, usize)>,
}

impl RatioReport {
    pub fn summary(&self) -> String {
        format!(
            "Ratios computed: {}, skipped: {}, undefined cells: {}",
            self.computed.len(),
            self.failures.len(),
            self.undefined_rows.iter().map(|(_, n)| n).sum::<usize>()
        )
    }
}

// ============================================================================
// RATIO ENGINE
// ============================================================================

pub struct RatioEngine {
    ratios: Vec<Ratio>,
}

impl RatioEngine {
    /// Engine computing all four standard ratios
    pub fn new() -> Self {
        RatioEngine {
            ratios: Ratio::ALL.to_vec(),
        }
    }

    /// Engine restricted to a subset of ratios
    pub fn with_ratios(ratios: Vec<Ratio>) -> Self {
        RatioEngine { ratios }
    }

    /// Compute one ratio for every record, element-wise
    pub fn compute_column(&self, ratio: Ratio, dataset: &Dataset) -> Result<Vec<Option<f64>>, PipelineError> {
        let (numerator, denominator) = ratio.inputs();

        for field in [numerator, denominator] {
            if !dataset.has_raw_field(field) {
                return Err(PipelineError::MissingColumn {
                    ratio: ratio.column_name().to_string(),
                    column: field.column_name().to_string(),
                });
            }
        }

        let scale = ratio.scale();
        Ok(dataset
            .records()
            .iter()
            .map(|record| {
                let n = record.raw(numerator).unwrap_or(0.0);
                let d = record.raw(denominator).unwrap_or(0.0);
                safe_divide(n, d)
                    .map(|v| v * scale)
                    .filter(|v| v.is_finite())
            })
            .collect())
    }

    /// Extend the dataset with every ratio that can be computed.
    /// A missing input column skips that ratio only.
    pub fn calculate(&self, dataset: &mut Dataset) -> RatioReport {
        let mut report = RatioReport::default();

        for &ratio in &self.ratios {
            match self.compute_column(ratio, dataset) {
                Ok(values) => {
                    let undefined = values.iter().filter(|v| v.is_none()).count();
                    if undefined > 0 {
                        tracing::debug!(ratio = ratio.column_name(), undefined, "zero denominators");
                    }
                    dataset.set_ratio_column(ratio, values);
                    report.computed.push(ratio);
                    report.undefined_rows.push((ratio, undefined));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "ratio skipped");
                    report.failures.push(e);
                }
            }
        }

        tracing::info!("Financial ratios calculation complete. {}", report.summary());
        report
    }
}

impl Default for RatioEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{FieldValue, FinancialRecord};
    use proptest::prelude::*;

    fn record(company: &str, year: i32, values: &[(RawField, f64)]) -> FinancialRecord {
        values
            .iter()
            .fold(FinancialRecord::new(company, year), |r, &(f, v)| r.with_raw(f, v))
    }

    fn dataset(records: Vec<FinancialRecord>, fields: &[RawField]) -> Dataset {
        let mut columns = vec!["Company".to_string(), "Year".to_string()];
        columns.extend(fields.iter().map(|f| f.column_name().to_string()));
        Dataset::new(columns, records, fields.to_vec())
    }

    #[test]
    fn test_safe_divide() {
        assert_eq!(safe_divide(10.0, 4.0), Some(2.5));
        assert_eq!(safe_divide(10.0, 0.0), None);
        assert_eq!(safe_divide(0.0, 0.0), None);
        assert_eq!(safe_divide(-3.0, -0.0), None, "negative zero is still zero");
        assert_eq!(safe_divide(1e300, 1e-310), None, "overflow is undefined, not infinite");
        assert_eq!(safe_divide(f64::INFINITY, 1e-320), None);
    }

    #[test]
    fn test_extreme_inputs_never_yield_non_finite_ratio() {
        let fields = [RawField::TotalRevenue, RawField::NetIncome, RawField::TotalAssets];
        let mut ds = dataset(
            vec![
                record(
                    "A",
                    2023,
                    &[
                        (RawField::TotalRevenue, 1e-310),
                        (RawField::NetIncome, 1e300),
                        (RawField::TotalAssets, 1e-320),
                    ],
                ),
                // Quotient is finite, scaling by 100 overflows
                record(
                    "A",
                    2024,
                    &[
                        (RawField::TotalRevenue, 1.0),
                        (RawField::NetIncome, f64::MAX),
                        (RawField::TotalAssets, 2.0),
                    ],
                ),
            ],
            &fields,
        );

        let report = RatioEngine::with_ratios(vec![Ratio::NetProfitMargin, Ratio::Roa]).calculate(&mut ds);
        assert!(report.failures.is_empty());

        for year in [2023, 2024] {
            let rec = ds.get("A", year).unwrap();
            assert_eq!(rec.ratio(Ratio::NetProfitMargin), Some(None), "{year} margin");
            assert_eq!(rec.ratio(Ratio::Roa), Some(None), "{year} roa");
        }
    }

    #[test]
    fn test_all_four_ratios() {
        let mut ds = dataset(
            vec![record(
                "Apple",
                2024,
                &[
                    (RawField::TotalRevenue, 400.0),
                    (RawField::NetIncome, 100.0),
                    (RawField::TotalLiabilities, 300.0),
                    (RawField::TotalAssets, 500.0),
                    (RawField::OperatingCashFlow, 120.0),
                ],
            )],
            &[
                RawField::TotalRevenue,
                RawField::NetIncome,
                RawField::TotalLiabilities,
                RawField::TotalAssets,
                RawField::OperatingCashFlow,
            ],
        );

        let report = RatioEngine::new().calculate(&mut ds);
        assert_eq!(report.computed, Ratio::ALL.to_vec());
        assert!(report.failures.is_empty());

        let rec = ds.get("Apple", 2024).unwrap();
        assert_eq!(rec.ratio(Ratio::NetProfitMargin), Some(Some(25.0)));
        assert_eq!(rec.ratio(Ratio::DebtRatio), Some(Some(60.0)));
        assert_eq!(rec.ratio(Ratio::CfoToNetIncome), Some(Some(1.2)));
        assert_eq!(rec.ratio(Ratio::Roa), Some(Some(20.0)));

        assert_eq!(
            &ds.columns()[ds.columns().len() - 4..],
            &[
                "Net Profit Margin (%)".to_string(),
                "Debt Ratio (%)".to_string(),
                "CFO / Net Income".to_string(),
                "ROA (%)".to_string(),
            ]
        );
    }

    #[test]
    fn test_zero_denominator_is_undefined_per_row() {
        let fields = [RawField::NetIncome, RawField::TotalAssets];
        let mut ds = dataset(
            vec![
                record("A", 2023, &[(RawField::NetIncome, 5.0), (RawField::TotalAssets, 0.0)]),
                record("A", 2024, &[(RawField::NetIncome, 5.0), (RawField::TotalAssets, 50.0)]),
            ],
            &fields,
        );

        RatioEngine::with_ratios(vec![Ratio::Roa]).calculate(&mut ds);

        assert_eq!(ds.get("A", 2023).unwrap().value("ROA (%)"), Some(FieldValue::Number(None)));
        assert_eq!(ds.get("A", 2024).unwrap().value("ROA (%)"), Some(FieldValue::Number(Some(10.0))));
    }

    #[test]
    fn test_missing_column_isolates_one_ratio() {
        // No Cash Flow column: CFO / Net Income fails, the rest compute
        let fields = [
            RawField::TotalRevenue,
            RawField::NetIncome,
            RawField::TotalLiabilities,
            RawField::TotalAssets,
        ];
        let mut ds = dataset(
            vec![record(
                "Tesla",
                2024,
                &[
                    (RawField::TotalRevenue, 10.0),
                    (RawField::NetIncome, 1.0),
                    (RawField::TotalLiabilities, 4.0),
                    (RawField::TotalAssets, 8.0),
                ],
            )],
            &fields,
        );

        let report = RatioEngine::new().calculate(&mut ds);

        assert_eq!(report.computed.len(), 3);
        assert_eq!(report.failures.len(), 1);
        match &report.failures[0] {
            PipelineError::MissingColumn { ratio, column } => {
                assert_eq!(ratio, "CFO / Net Income");
                assert_eq!(column, "Cash Flow from Operating Activities");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!ds.columns().iter().any(|c| c == "CFO / Net Income"));
        assert_eq!(ds.get("Tesla", 2024).unwrap().value("CFO / Net Income"), None);
    }

    proptest! {
        #[test]
        fn prop_ratios_never_infinite(
            rows in prop::collection::vec((-1e12f64..1e12, prop_oneof![Just(0.0f64), -1e12f64..1e12]), 1..40)
        ) {
            let fields = [RawField::NetIncome, RawField::TotalRevenue];
            let records = rows
                .iter()
                .enumerate()
                .map(|(i, &(n, d))| record("P", i as i32, &[(RawField::NetIncome, n), (RawField::TotalRevenue, d)]))
                .collect();
            let mut ds = dataset(records, &fields);
            RatioEngine::with_ratios(vec![Ratio::NetProfitMargin]).calculate(&mut ds);

            for (i, &(n, d)) in rows.iter().enumerate() {
                let value = ds.get("P", i as i32).unwrap().ratio(Ratio::NetProfitMargin).unwrap();
                if d == 0.0 {
                    prop_assert_eq!(value, None);
                } else if (n / d * 100.0).is_finite() {
                    let v = value.expect("nonzero denominator must be defined");
                    prop_assert_eq!(v, n / d * 100.0);
                } else {
                    prop_assert_eq!(value, None);
                }
            }
        }
    }
}
