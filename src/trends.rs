// 📈 Trend Series - per-company metric history for charts
// Sorted by company, then year. Rendering is left to the caller.

use crate::dataset::{Dataset, FieldValue};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub year: i32,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendSeries {
    pub company: String,
    pub points: Vec<TrendPoint>,
}

impl TrendSeries {
    /// Defined points only, as (year, value) pairs for plotting
    pub fn plot_points(&self) -> Vec<(f64, f64)> {
        self.points
            .iter()
            .filter_map(|p| p.value.map(|v| (p.year as f64, v)))
            .collect()
    }
}

/// One series per company for a numeric metric; None if the metric is not
/// a numeric column of the dataset
pub fn trend_series(dataset: &Dataset, metric: &str) -> Option<Vec<TrendSeries>> {
    if !dataset.is_numeric_column(metric) {
        return None;
    }

    let mut by_company: BTreeMap<&str, Vec<TrendPoint>> = BTreeMap::new();
    for record in dataset.records() {
        let value = match record.value(metric) {
            Some(FieldValue::Number(v)) => v,
            _ => None,
        };
        by_company
            .entry(record.company.as_str())
            .or_default()
            .push(TrendPoint {
                year: record.year,
                value,
            });
    }

    Some(
        by_company
            .into_iter()
            .map(|(company, mut points)| {
                points.sort_by_key(|p| p.year);
                TrendSeries {
                    company: company.to_string(),
                    points,
                }
            })
            .collect(),
    )
}

/// (min, max) over all defined values of all series
pub fn value_bounds(series: &[TrendSeries]) -> Option<(f64, f64)> {
    series
        .iter()
        .flat_map(|s| s.points.iter().filter_map(|p| p.value))
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}
