// 🗂️ Dataset - cleaned, ratio-augmented records keyed by (Company, Year)
//
// Built by the normalizer, extended by the ratio engine, then frozen and
// shared read-only (Arc) with every dialogue session.

use crate::ratios::Ratio;
use crate::table::{RawField, COMPANY_COLUMN, YEAR_COLUMN};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

// ============================================================================
// FIELD VALUE
// ============================================================================

/// A projected cell: numeric (possibly undefined) or carried-through text
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Number(Option<f64>),
    Text(&'a str),
}

// ============================================================================
// FINANCIAL RECORD
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinancialRecord {
    pub company: String,
    pub year: i32,

    /// Zero-filled raw line items; only columns present in the input
    raw: BTreeMap<RawField, f64>,

    /// Derived ratios; None = undefined (zero denominator)
    ratios: BTreeMap<Ratio, Option<f64>>,

    /// Columns the pipeline does not interpret, kept verbatim for export
    extras: BTreeMap<String, String>,
}

impl FinancialRecord {
    pub fn new(company: impl Into<String>, year: i32) -> Self {
        FinancialRecord {
            company: company.into(),
            year,
            raw: BTreeMap::new(),
            ratios: BTreeMap::new(),
            extras: BTreeMap::new(),
        }
    }

    /// Builder: set a raw line item
    pub fn with_raw(mut self, field: RawField, value: f64) -> Self {
        self.raw.insert(field, value);
        self
    }

    /// Builder: set a pass-through column
    pub fn with_extra(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.extras.insert(column.into(), value.into());
        self
    }

    pub fn raw(&self, field: RawField) -> Option<f64> {
        self.raw.get(&field).copied()
    }

    /// Outer None: ratio not computed; inner None: undefined for this row
    pub fn ratio(&self, ratio: Ratio) -> Option<Option<f64>> {
        self.ratios.get(&ratio).copied()
    }

    pub fn extra(&self, column: &str) -> Option<&str> {
        self.extras.get(column).map(String::as_str)
    }

    /// Project a column by its header name
    pub fn value(&self, column: &str) -> Option<FieldValue<'_>> {
        if column == COMPANY_COLUMN {
            return Some(FieldValue::Text(&self.company));
        }
        if column == YEAR_COLUMN {
            return Some(FieldValue::Number(Some(self.year as f64)));
        }
        if let Some(ratio) = Ratio::from_column_name(column) {
            if let Some(v) = self.ratio(ratio) {
                return Some(FieldValue::Number(v));
            }
        }
        if let Some(field) = RawField::from_column_name(column) {
            if let Some(v) = self.raw(field) {
                return Some(FieldValue::Number(Some(v)));
            }
        }
        self.extra(column).map(FieldValue::Text)
    }
}

// ============================================================================
// DATASET
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct Dataset {
    /// Export column order: input headers, then computed ratio columns
    columns: Vec<String>,
    records: Vec<FinancialRecord>,
    index: HashMap<(String, i32), usize>,
    raw_fields: Vec<RawField>,
    ratios: Vec<Ratio>,
}

impl Dataset {
    /// Build from already-deduplicated records.
    /// If a key repeats anyway, the first record keeps the index slot.
    pub fn new(columns: Vec<String>, records: Vec<FinancialRecord>, raw_fields: Vec<RawField>) -> Self {
        let mut index = HashMap::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            index
                .entry((record.company.clone(), record.year))
                .or_insert(i);
        }

        Dataset {
            columns,
            records,
            index,
            raw_fields,
            ratios: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn records(&self) -> &[FinancialRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Raw columns that were present in the input
    pub fn raw_fields(&self) -> &[RawField] {
        &self.raw_fields
    }

    pub fn has_raw_field(&self, field: RawField) -> bool {
        self.raw_fields.contains(&field)
    }

    /// Ratio columns that were successfully computed
    pub fn ratios(&self) -> &[Ratio] {
        &self.ratios
    }

    pub fn get(&self, company: &str, year: i32) -> Option<&FinancialRecord> {
        self.index
            .get(&(company.to_string(), year))
            .map(|&i| &self.records[i])
    }

    /// Distinct companies in first-seen order
    pub fn companies(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for record in &self.records {
            if !seen.contains(&record.company) {
                seen.push(record.company.clone());
            }
        }
        seen
    }

    /// Most recent year on file for one company
    pub fn latest_year(&self, company: &str) -> Option<i32> {
        self.records
            .iter()
            .filter(|r| r.company == company)
            .map(|r| r.year)
            .max()
    }

    /// Columns whose projection is numeric for every record
    pub fn numeric_columns(&self) -> Vec<String> {
        let mut columns = vec![YEAR_COLUMN.to_string()];
        columns.extend(self.raw_fields.iter().map(|f| f.column_name().to_string()));
        columns.extend(self.ratios.iter().map(|r| r.column_name().to_string()));
        columns
    }

    pub fn is_numeric_column(&self, column: &str) -> bool {
        self.numeric_columns().iter().any(|c| c == column)
    }

    /// Attach one computed ratio column, value-per-record in record order
    pub(crate) fn set_ratio_column(&mut self, ratio: Ratio, values: Vec<Option<f64>>) {
        debug_assert_eq!(values.len(), self.records.len());

        let name = ratio.column_name();
        for (record, value) in self.records.iter_mut().zip(values) {
            // A same-named input column is overwritten by the computed one
            record.extras.remove(name);
            record.ratios.insert(ratio, value);
        }
        if !self.columns.iter().any(|c| c == name) {
            self.columns.push(name.to_string());
        }
        if !self.ratios.contains(&ratio) {
            self.ratios.push(ratio);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset {
        let records = vec![
            FinancialRecord::new("Apple", 2023)
                .with_raw(RawField::NetIncome, 97.0)
                .with_extra("Sector", "Tech"),
            FinancialRecord::new("Apple", 2024).with_raw(RawField::NetIncome, 94.0),
            FinancialRecord::new("Tesla", 2022).with_raw(RawField::NetIncome, 12.5),
        ];
        Dataset::new(
            vec!["Company".into(), "Year".into(), "Net Income".into(), "Sector".into()],
            records,
            vec![RawField::NetIncome],
        )
    }

    #[test]
    fn test_keyed_lookup() {
        let ds = sample();
        let rec = ds.get("Apple", 2024).expect("Apple 2024 should exist");
        assert_eq!(rec.raw(RawField::NetIncome), Some(94.0));
        assert!(ds.get("Apple", 2019).is_none());
        assert!(ds.get("apple", 2024).is_none(), "lookup is case-sensitive");
    }

    #[test]
    fn test_latest_year_is_scoped_to_company() {
        let ds = sample();
        assert_eq!(ds.latest_year("Apple"), Some(2024));
        assert_eq!(ds.latest_year("Tesla"), Some(2022));
        assert_eq!(ds.latest_year("Google"), None);
    }

    #[test]
    fn test_value_projection() {
        let ds = sample();
        let rec = ds.get("Apple", 2023).unwrap();

        assert_eq!(rec.value("Net Income"), Some(FieldValue::Number(Some(97.0))));
        assert_eq!(rec.value("Year"), Some(FieldValue::Number(Some(2023.0))));
        assert_eq!(rec.value("Company"), Some(FieldValue::Text("Apple")));
        assert_eq!(rec.value("Sector"), Some(FieldValue::Text("Tech")));
        assert_eq!(rec.value("Total Assets"), None, "absent raw column projects to None");
        assert_eq!(rec.value("ROA (%)"), None, "uncomputed ratio projects to None");
    }

    #[test]
    fn test_set_ratio_column_appends_once() {
        let mut ds = sample();
        ds.set_ratio_column(Ratio::Roa, vec![Some(1.0), None, Some(2.0)]);
        ds.set_ratio_column(Ratio::Roa, vec![Some(1.0), None, Some(2.0)]);

        assert_eq!(ds.columns().iter().filter(|c| *c == "ROA (%)").count(), 1);
        assert_eq!(ds.ratios(), &[Ratio::Roa]);
        assert_eq!(
            ds.get("Apple", 2024).unwrap().value("ROA (%)"),
            Some(FieldValue::Number(None))
        );
        assert!(ds.is_numeric_column("ROA (%)"));
        assert!(!ds.is_numeric_column("Sector"));
    }

    #[test]
    fn test_companies_first_seen_order() {
        assert_eq!(sample().companies(), vec!["Apple".to_string(), "Tesla".to_string()]);
    }
}
