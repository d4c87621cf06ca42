// 📋 Raw Table - ingestion boundary
// Ordered header + rows of text cells, exactly as a loader produced them

use serde::{Deserialize, Serialize};

/// Key column holding the company name
pub const COMPANY_COLUMN: &str = "Company";

/// Key column holding the fiscal year
pub const YEAR_COLUMN: &str = "Year";

// ============================================================================
// RAW FINANCIAL FIELDS
// ============================================================================

/// The seven raw statement line items the pipeline knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RawField {
    TotalRevenue,
    NetIncome,
    TotalLiabilities,
    TotalAssets,
    OperatingCashFlow,
    TotalCurrentAssets,
    TotalCurrentLiabilities,
}

impl RawField {
    pub const ALL: [RawField; 7] = [
        RawField::TotalRevenue,
        RawField::NetIncome,
        RawField::TotalLiabilities,
        RawField::TotalAssets,
        RawField::OperatingCashFlow,
        RawField::TotalCurrentAssets,
        RawField::TotalCurrentLiabilities,
    ];

    /// Column header used in input and export tables
    pub fn column_name(&self) -> &'static str {
        match self {
            RawField::TotalRevenue => "Total Revenue",
            RawField::NetIncome => "Net Income",
            RawField::TotalLiabilities => "Total Liabilities",
            RawField::TotalAssets => "Total Assets",
            RawField::OperatingCashFlow => "Cash Flow from Operating Activities",
            RawField::TotalCurrentAssets => "Total Current Assets",
            RawField::TotalCurrentLiabilities => "Total Current Liabilities",
        }
    }

    pub fn from_column_name(name: &str) -> Option<Self> {
        RawField::ALL.into_iter().find(|f| f.column_name() == name)
    }
}

// ============================================================================
// RAW TABLE
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new<H, S>(headers: H, rows: Vec<Vec<String>>) -> Self
    where
        H: IntoIterator<Item = S>,
        S: Into<String>,
    {
        RawTable {
            headers: headers.into_iter().map(Into::into).collect(),
            rows,
        }
    }

    /// Build a table from string literals (handy for fixtures and demos)
    pub fn from_strs(headers: &[&str], rows: &[&[&str]]) -> Self {
        RawTable {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: rows
                .iter()
                .map(|row| row.iter().map(|c| c.to_string()).collect())
                .collect(),
        }
    }

    /// Position of a header, compared exactly
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Cell text, or None when the cell is absent or blank
    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
