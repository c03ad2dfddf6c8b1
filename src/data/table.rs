//! In-memory table produced by the loader: ordered named columns of typed cells.
//! Column names are expected to be normalized (unique, lowercase, underscore-separated)
//! before a table is built; cells are never rewritten after the reader produced them.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Missing,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl CellValue {
    /// Null, empty and NaN cells all count as missing.
    pub fn is_missing(&self) -> bool {
        match self {
            Self::Missing => true,
            Self::Float(value) => value.is_nan(),
            _ => false,
        }
    }

    fn kind(&self) -> Option<DataType> {
        match self {
            _ if self.is_missing() => None,
            Self::Bool(_) => Some(DataType::Boolean),
            Self::Int(_) => Some(DataType::Integer),
            Self::Float(_) => Some(DataType::Float),
            Self::Text(_) => Some(DataType::String),
            Self::Missing => None,
        }
    }
}

/// Column dtype label as written to the profile document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Integer,
    Float,
    Boolean,
    String,
    /// Non-missing cells of more than one kind (e.g. numbers next to text).
    Mixed,
    /// Every cell is missing.
    Null,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::String => "string",
            Self::Mixed => "mixed",
            Self::Null => "null",
        }
    }

    fn unify(self, other: DataType) -> DataType {
        match (self, other) {
            (a, b) if a == b => a,
            (DataType::Null, b) => b,
            (a, DataType::Null) => a,
            (DataType::Integer, DataType::Float) | (DataType::Float, DataType::Integer) => {
                DataType::Float
            }
            _ => DataType::Mixed,
        }
    }

    /// Infer the dtype of a column from its non-missing cells.
    pub fn infer(values: &[CellValue]) -> DataType {
        values
            .iter()
            .filter_map(CellValue::kind)
            .fold(DataType::Null, DataType::unify)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub dtype: DataType,
    pub values: Vec<CellValue>,
}

impl Column {
    /// Build a column and infer its dtype. Integers in a column that also holds floats are
    /// widened to floats, the same way a numeric reader would store them.
    pub fn new(name: impl Into<String>, values: Vec<CellValue>) -> Self {
        let dtype = DataType::infer(&values);
        let values = if dtype == DataType::Float {
            values
                .into_iter()
                .map(|value| match value {
                    CellValue::Int(i) => CellValue::Float(i as f64),
                    other => other,
                })
                .collect()
        } else {
            values
        };
        Column {
            name: name.into(),
            dtype,
            values,
        }
    }

    pub fn missing_count(&self) -> usize {
        self.values.iter().filter(|value| value.is_missing()).count()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Self {
        debug_assert!(
            columns
                .windows(2)
                .all(|pair| pair[0].values.len() == pair[1].values.len()),
            "all columns must have the same length"
        );
        Table { columns }
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map_or(0, |column| column.values.len())
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|column| column.name.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }
}
