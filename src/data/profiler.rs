//! Schema profile of a loaded table: shape, per-column dtype and missingness, and
//! name-based time/geo tagging.
//!
//! Tagging only looks at the normalized column name, never at the values. A column can be
//! tagged time-like and geo-like at the same time; the two checks do not interact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::data::table::{DataType, Table};

/// Name fragments that mark a column as time-like.
pub const TIME_KEYWORDS: &[&str] = &["year", "date", "fiscal_year", "time", "period", "fy"];

/// Name fragments that mark a column as geo-like.
pub const GEO_KEYWORDS: &[&str] = &[
    "state", "fips", "zip", "county", "region", "geo", "location", "city",
];

/// Decimal places kept in `missing_ratio`.
pub const RATIO_DECIMALS: i32 = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnHeuristics {
    pub time_keywords: Vec<String>,
    pub geo_keywords: Vec<String>,
}

impl Default for ColumnHeuristics {
    fn default() -> Self {
        ColumnHeuristics {
            time_keywords: TIME_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            geo_keywords: GEO_KEYWORDS.iter().map(|k| k.to_string()).collect(),
        }
    }
}

impl ColumnHeuristics {
    pub fn is_time_like(&self, column_name: &str) -> bool {
        matches_any(column_name, &self.time_keywords)
    }

    pub fn is_geo_like(&self, column_name: &str) -> bool {
        matches_any(column_name, &self.geo_keywords)
    }
}

fn matches_any(column_name: &str, keywords: &[String]) -> bool {
    let name = column_name.to_lowercase();
    keywords
        .iter()
        .any(|keyword| name.contains(&keyword.to_lowercase()))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub name: String,
    pub dtype: DataType,
    pub missing_count: usize,
    pub missing_ratio: f64,
    pub is_time_like: bool,
    pub is_geo_like: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetProfile {
    pub dataset_name: String,
    pub row_count: usize,
    pub column_count: usize,
    pub columns: Vec<ColumnProfile>,
    pub time_columns: Vec<String>,
    pub geo_columns: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

impl DatasetProfile {
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|column| column.name.clone()).collect()
    }

    pub fn total_missing(&self) -> usize {
        self.columns.iter().map(|column| column.missing_count).sum()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SchemaProfiler {
    heuristics: ColumnHeuristics,
}

impl SchemaProfiler {
    pub fn new(heuristics: ColumnHeuristics) -> Self {
        SchemaProfiler { heuristics }
    }

    pub fn profile(&self, table: &Table, dataset_name: &str) -> DatasetProfile {
        let row_count = table.row_count();
        let columns: Vec<ColumnProfile> = table
            .columns()
            .iter()
            .map(|column| {
                let missing_count = column.missing_count();
                ColumnProfile {
                    name: column.name.clone(),
                    dtype: column.dtype,
                    missing_count,
                    missing_ratio: missing_ratio(missing_count, row_count),
                    is_time_like: self.heuristics.is_time_like(&column.name),
                    is_geo_like: self.heuristics.is_geo_like(&column.name),
                }
            })
            .collect();

        let time_columns: Vec<String> = columns
            .iter()
            .filter(|column| column.is_time_like)
            .map(|column| column.name.clone())
            .collect();
        let geo_columns: Vec<String> = columns
            .iter()
            .filter(|column| column.is_geo_like)
            .map(|column| column.name.clone())
            .collect();

        info!(
            dataset = dataset_name,
            rows = row_count,
            columns = columns.len(),
            time_columns = time_columns.len(),
            geo_columns = geo_columns.len(),
            "profile generated"
        );

        DatasetProfile {
            dataset_name: dataset_name.to_string(),
            row_count,
            column_count: table.column_count(),
            columns,
            time_columns,
            geo_columns,
            generated_at: Utc::now(),
        }
    }
}

/// Profile `table` with the built-in keyword lists.
pub fn profile(table: &Table, dataset_name: &str) -> DatasetProfile {
    SchemaProfiler::default().profile(table, dataset_name)
}

fn missing_ratio(missing: usize, rows: usize) -> f64 {
    if rows == 0 {
        return 0.0;
    }
    let scale = 10_f64.powi(RATIO_DECIMALS);
    (missing as f64 / rows as f64 * scale).round() / scale
}
