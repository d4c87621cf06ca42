// 📖 Metric Vocabulary - free-text synonyms → canonical metric names
// Exact match on the lowercased phrase. No stemming, no fuzzy matching.

use std::collections::{BTreeMap, BTreeSet};

/// Default synonym table
pub const DEFAULT_SYNONYMS: &[(&str, &str)] = &[
    ("total revenue", "Total Revenue"),
    ("revenue", "Total Revenue"),
    ("sales", "Total Revenue"),
    ("top line", "Total Revenue"),
    ("net income", "Net Income"),
    ("profit", "Net Income"),
    ("earnings", "Net Income"),
    ("bottom line", "Net Income"),
    ("debt ratio", "Debt Ratio (%)"),
    ("leverage", "Debt Ratio (%)"),
    ("debt", "Debt Ratio (%)"),
    ("roa", "ROA (%)"),
    ("return on assets", "ROA (%)"),
    ("cfo", "CFO / Net Income"),
    ("cash flow quality", "CFO / Net Income"),
    ("current ratio", "Current Ratio"),
    ("liquidity", "Current Ratio"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricVocabulary {
    entries: BTreeMap<String, String>,
}

impl MetricVocabulary {
    /// Vocabulary seeded with the default synonym table
    pub fn new() -> Self {
        DEFAULT_SYNONYMS
            .iter()
            .fold(Self::empty(), |v, (phrase, canonical)| v.with_synonym(*phrase, *canonical))
    }

    pub fn empty() -> Self {
        MetricVocabulary {
            entries: BTreeMap::new(),
        }
    }

    /// Builder: add or replace one synonym
    pub fn with_synonym(mut self, phrase: impl AsRef<str>, canonical: impl Into<String>) -> Self {
        self.insert(phrase, canonical);
        self
    }

    pub fn insert(&mut self, phrase: impl AsRef<str>, canonical: impl Into<String>) {
        let phrase = phrase.as_ref().trim().to_lowercase();
        if phrase.is_empty() {
            return;
        }
        self.entries.insert(phrase, canonical.into());
    }

    /// Canonical metric for a phrase, case-insensitive
    pub fn canonical(&self, phrase: &str) -> Option<&str> {
        self.entries.get(&phrase.to_lowercase()).map(String::as_str)
    }

    /// Every phrase the recognizer must be seeded with
    pub fn phrases(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Distinct canonical names
    pub fn canonical_metrics(&self) -> BTreeSet<&str> {
        self.entries.values().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for MetricVocabulary {
    fn default() -> Self {
        Self::new()
    }
}
