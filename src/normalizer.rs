// 🧹 Dataset Normalizer - cleaning invariants for raw financial tables
//
// 1. Trim column names
// 2. Coerce Year to integer (fatal on failure)
// 3. Drop duplicate (Company, Year) rows, keeping the first
// 4. Zero-fill missing values in the raw financial columns that exist

use crate::dataset::{Dataset, FinancialRecord};
use crate::error::{PipelineError, PipelineResult};
use crate::table::{RawField, RawTable, COMPANY_COLUMN, YEAR_COLUMN};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

// ============================================================================
// NORMALIZATION REPORT
// ============================================================================

#[derive(Debug, Clone, Default, Serialize)]
pub struct NormalizationReport {
    pub input_rows: usize,
    pub output_rows: usize,
    pub duplicates_removed: usize,
    /// Missing cells replaced with zero, per raw column
    pub filled_cells: BTreeMap<RawField, usize>,
    /// Raw columns not present in the input (never computed downstream)
    pub absent_fields: Vec<RawField>,
}

impl NormalizationReport {
    pub fn summary(&self) -> String {
        format!(
            "Rows: {} → {}, duplicates removed: {}, cells zero-filled: {}, absent columns: {}",
            self.input_rows,
            self.output_rows,
            self.duplicates_removed,
            self.filled_cells.values().sum::<usize>(),
            self.absent_fields.len()
        )
    }
}

// ============================================================================
// VALUE COERCION
// ============================================================================

/// Integer year; integral decimal forms such as "2023.0" are accepted
pub fn parse_year(text: &str) -> Option<i32> {
    let text = text.trim();
    if let Ok(year) = text.parse::<i32>() {
        return Some(year);
    }
    let value = text.parse::<f64>().ok()?;
    if value.fract() == 0.0 && value >= i32::MIN as f64 && value <= i32::MAX as f64 {
        Some(value as i32)
    } else {
        None
    }
}

/// Statement amount: tolerates "$", thousands separators and whitespace
pub fn parse_amount(text: &str) -> Option<f64> {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| *c != ',' && *c != '$')
        .collect();
    cleaned.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

// ============================================================================
// NORMALIZER
// ============================================================================

pub struct DatasetNormalizer {
    raw_fields: Vec<RawField>,
}

impl DatasetNormalizer {
    pub fn new() -> Self {
        DatasetNormalizer {
            raw_fields: RawField::ALL.to_vec(),
        }
    }

    /// Clean a raw table into a keyed Dataset
    pub fn normalize(&self, mut table: RawTable) -> PipelineResult<(Dataset, NormalizationReport)> {
        for header in table.headers.iter_mut() {
            *header = header.trim().to_string();
        }

        let company_idx = table
            .column_index(COMPANY_COLUMN)
            .ok_or_else(|| PipelineError::MissingKeyColumn(COMPANY_COLUMN.to_string()))?;
        let year_idx = table
            .column_index(YEAR_COLUMN)
            .ok_or_else(|| PipelineError::MissingKeyColumn(YEAR_COLUMN.to_string()))?;

        // Coerce every year before deduplicating: one bad cell aborts the batch
        let years = (0..table.len())
            .map(|row| {
                let raw = table.cell(row, year_idx).unwrap_or("");
                parse_year(raw).ok_or_else(|| PipelineError::DataType {
                    row: row + 1,
                    column: YEAR_COLUMN.to_string(),
                    value: raw.to_string(),
                    expected: "integer",
                })
            })
            .collect::<PipelineResult<Vec<i32>>>()?;

        let present: Vec<(RawField, usize)> = self
            .raw_fields
            .iter()
            .filter_map(|&f| table.column_index(f.column_name()).map(|i| (f, i)))
            .collect();

        let extra_columns: Vec<(String, usize)> = table
            .headers
            .iter()
            .enumerate()
            .filter(|(i, h)| {
                *i != company_idx
                    && *i != year_idx
                    && !present.iter().any(|(_, pi)| pi == i)
                    && !h.is_empty()
            })
            .map(|(i, h)| (h.clone(), i))
            .collect();

        let mut report = NormalizationReport {
            input_rows: table.len(),
            absent_fields: self
                .raw_fields
                .iter()
                .copied()
                .filter(|f| !present.iter().any(|(p, _)| p == f))
                .collect(),
            ..Default::default()
        };

        let mut seen: HashSet<(String, i32)> = HashSet::new();
        let mut records = Vec::with_capacity(table.len());

        for (row, &year) in years.iter().enumerate() {
            let company = table
                .rows
                .get(row)
                .and_then(|r| r.get(company_idx))
                .cloned()
                .unwrap_or_default();

            if !seen.insert((company.clone(), year)) {
                report.duplicates_removed += 1;
                continue;
            }

            let mut record = FinancialRecord::new(company, year);

            for &(field, idx) in &present {
                let value = match table.cell(row, idx) {
                    Some(text) => parse_amount(text).ok_or_else(|| PipelineError::DataType {
                        row: row + 1,
                        column: field.column_name().to_string(),
                        value: text.to_string(),
                        expected: "number",
                    })?,
                    None => {
                        *report.filled_cells.entry(field).or_insert(0) += 1;
                        0.0
                    }
                };
                record = record.with_raw(field, value);
            }

            for (name, idx) in &extra_columns {
                if let Some(text) = table.rows.get(row).and_then(|r| r.get(*idx)) {
                    record = record.with_extra(name.clone(), text.clone());
                }
            }

            records.push(record);
        }

        report.output_rows = records.len();
        if report.duplicates_removed > 0 {
            tracing::info!(
                duplicates = report.duplicates_removed,
                "removed duplicate (Company, Year) rows, kept first occurrence"
            );
        }
        tracing::debug!("{}", report.summary());

        let raw_fields = present.iter().map(|(f, _)| *f).collect();
        let columns = table.headers.into_iter().filter(|h| !h.is_empty()).collect();

        Ok((Dataset::new(columns, records, raw_fields), report))
    }
}

impl Default for DatasetNormalizer {
    fn default() -> Self {
        Self::new()
    }
}
