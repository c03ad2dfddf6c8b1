//! Read a raw dataset file into a [`Table`] and normalize its column labels.
//! Format is chosen by extension; cell values are kept as the reader typed them.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use calamine::{Data, Range, Reader};
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::data::table::{CellValue, Column, Table};
use crate::error::{IngestError, Result};

/// Extensions accepted by the loader, lower-case and without the dot.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["csv", "json", "ods", "tsv", "xls", "xlsb", "xlsm", "xlsx"];

/// Cell texts a delimited file uses for "no value".
pub const NA_TOKENS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

const TRUE_TOKENS: &[&str] = &["True", "TRUE", "true"];
const FALSE_TOKENS: &[&str] = &["False", "FALSE", "false"];
const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Delimited { delimiter: u8 },
    Spreadsheet,
    Json,
}

impl FileFormat {
    pub fn from_path(path: &Path) -> Result<FileFormat> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("")
            .to_lowercase();
        match extension.as_str() {
            "csv" => Ok(FileFormat::Delimited { delimiter: b',' }),
            "tsv" => Ok(FileFormat::Delimited { delimiter: b'\t' }),
            "xls" | "xlsx" | "xlsm" | "xlsb" | "ods" => Ok(FileFormat::Spreadsheet),
            "json" => Ok(FileFormat::Json),
            _ => Err(IngestError::UnsupportedFormat {
                path: path.to_path_buf(),
                extension,
                supported: SUPPORTED_EXTENSIONS.join(", "),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileFormat::Delimited { delimiter: b'\t' } => "tsv",
            FileFormat::Delimited { .. } => "csv",
            FileFormat::Spreadsheet => "spreadsheet",
            FileFormat::Json => "json",
        }
    }
}

/// Loader bound to one source file. Construction checks that the file exists and that its
/// extension is supported; [`DatasetLoader::load`] does the actual read.
#[derive(Debug, Clone)]
pub struct DatasetLoader {
    path: PathBuf,
    format: FileFormat,
}

impl DatasetLoader {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(IngestError::FileNotFound(path.to_path_buf()));
        }
        let path = fs::canonicalize(path).map_err(|err| IngestError::file_read(path, err))?;
        let format = FileFormat::from_path(&path)?;
        info!(path = %path.display(), format = format.as_str(), "loader initialized");
        Ok(DatasetLoader { path, format })
    }

    /// Absolute path of the source file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> FileFormat {
        self.format
    }

    pub fn load(&self) -> Result<Table> {
        let (headers, columns) = match self.format {
            FileFormat::Delimited { delimiter } => {
                let text = read_text(&self.path)?;
                read_delimited(&self.path, &text, delimiter)?
            }
            FileFormat::Spreadsheet => read_spreadsheet(&self.path)?,
            FileFormat::Json => {
                let text = read_text(&self.path)?;
                read_json(&self.path, &text)?
            }
        };

        let table = Table::new(
            normalize_column_names(&headers)
                .into_iter()
                .zip(columns)
                .map(|(name, values)| Column::new(name, values))
                .collect(),
        );
        debug!(columns = ?table.column_names(), "normalized column names");

        if table.column_count() == 0 || table.is_empty() {
            return Err(IngestError::EmptyDataset(self.path.clone()));
        }
        for column in table.columns() {
            debug!(
                column = %column.name,
                dtype = %column.dtype,
                missing = column.missing_count(),
                "typed column"
            );
        }

        let file_size = fs::metadata(&self.path).map(|meta| meta.len()).unwrap_or(0);
        info!(
            file_size,
            rows = table.row_count(),
            columns = table.column_count(),
            "load complete"
        );
        Ok(table)
    }
}

/// Load `path` into a normalized [`Table`].
pub fn load(path: impl AsRef<Path>) -> Result<Table> {
    DatasetLoader::new(path)?.load()
}

/// Normalize one column label: trim, lowercase, collapse every run of non-alphanumeric
/// characters into one `_`, and drop leading/trailing separators. Idempotent.
pub fn normalize_column_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_separator = false;
    for ch in raw.trim().chars().flat_map(char::to_lowercase) {
        if ch.is_alphanumeric() {
            if pending_separator && !out.is_empty() {
                out.push('_');
            }
            pending_separator = false;
            out.push(ch);
        } else {
            pending_separator = true;
        }
    }
    out
}

/// Normalize a whole header. Labels with no alphanumeric content become `unnamed_<index>`;
/// repeated names get `_1`, `_2`, ... so every name in the result is unique.
pub fn normalize_column_names(headers: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut names = Vec::with_capacity(headers.len());
    for (index, header) in headers.iter().enumerate() {
        let mut base = normalize_column_name(header);
        if base.is_empty() {
            base = format!("unnamed_{index}");
        }
        let mut name = base.clone();
        let mut suffix = 0;
        while seen.contains(&name) {
            suffix += 1;
            name = format!("{base}_{suffix}");
        }
        seen.insert(name.clone());
        names.push(name);
    }
    names
}

type RawColumns = (Vec<String>, Vec<Vec<CellValue>>);

fn read_text(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|err| IngestError::file_read(path, err))?;
    let (text, encoding) = decode_text(path, &bytes)?;
    info!(encoding = encoding.name(), "decoded source text");
    Ok(text)
}

/// Decode with UTF-8, then once more with windows-1252 (the Latin-1 superset) before giving up.
pub(crate) fn decode_text(path: &Path, bytes: &[u8]) -> Result<(String, &'static Encoding)> {
    let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    if let Some(text) = UTF_8.decode_without_bom_handling_and_without_replacement(body) {
        return Ok((text.into_owned(), UTF_8));
    }
    warn!(
        file = %path.display(),
        fallback = WINDOWS_1252.name(),
        "source is not valid UTF-8, retrying with fallback encoding"
    );
    match WINDOWS_1252.decode_without_bom_handling_and_without_replacement(body) {
        Some(text) => Ok((text.into_owned(), WINDOWS_1252)),
        None => Err(IngestError::file_read(
            path,
            "could not decode as UTF-8 or windows-1252",
        )),
    }
}

fn read_delimited(path: &Path, text: &str, delimiter: u8) -> Result<RawColumns> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|err| IngestError::file_read(path, err))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut raw: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
    for result in reader.records() {
        let record = result.map_err(|err| IngestError::file_read(path, err))?;
        if record.len() > headers.len() {
            let line = record.position().map_or(0, |pos| pos.line());
            return Err(IngestError::file_read(
                path,
                format!(
                    "line {line}: expected {} fields, found {}",
                    headers.len(),
                    record.len()
                ),
            ));
        }
        for (index, column) in raw.iter_mut().enumerate() {
            column.push(record.get(index).unwrap_or("").to_string());
        }
    }

    let columns = raw.into_iter().map(infer_text_column).collect();
    Ok((headers, columns))
}

/// Type the cells of one delimited-text column: integers if every present cell is an
/// integer, floats if every present cell is numeric, booleans if every present cell is a
/// boolean token, otherwise the original text.
pub(crate) fn infer_text_column(raw: Vec<String>) -> Vec<CellValue> {
    let is_na = |cell: &String| NA_TOKENS.contains(&cell.as_str());
    let mut present = raw.iter().filter(|cell| !is_na(cell)).peekable();
    if present.peek().is_none() {
        return raw.iter().map(|_| CellValue::Missing).collect();
    }

    let present: Vec<&String> = present.collect();
    let typed = |convert: &dyn Fn(&str) -> Option<CellValue>| -> Option<Vec<CellValue>> {
        if !present.iter().all(|cell| convert(cell.as_str()).is_some()) {
            return None;
        }
        Some(
            raw.iter()
                .map(|cell| {
                    if is_na(cell) {
                        CellValue::Missing
                    } else {
                        convert(cell.as_str()).unwrap_or(CellValue::Missing)
                    }
                })
                .collect(),
        )
    };

    typed(&|cell: &str| cell.trim().parse::<i64>().ok().map(CellValue::Int))
        .or_else(|| typed(&|cell: &str| cell.trim().parse::<f64>().ok().map(CellValue::Float)))
        .or_else(|| typed(&parse_bool_token))
        .unwrap_or_else(|| {
            raw.iter()
                .map(|cell| {
                    if is_na(cell) {
                        CellValue::Missing
                    } else {
                        CellValue::Text(cell.clone())
                    }
                })
                .collect()
        })
}

fn parse_bool_token(cell: &str) -> Option<CellValue> {
    if TRUE_TOKENS.contains(&cell) {
        Some(CellValue::Bool(true))
    } else if FALSE_TOKENS.contains(&cell) {
        Some(CellValue::Bool(false))
    } else {
        None
    }
}

fn read_spreadsheet(path: &Path) -> Result<RawColumns> {
    let mut workbook =
        calamine::open_workbook_auto(path).map_err(|err| IngestError::file_read(path, err))?;
    let sheet_names = workbook.sheet_names();
    let Some(sheet_name) = sheet_names.first() else {
        return Err(IngestError::EmptyDataset(path.to_path_buf()));
    };
    info!(sheet = %sheet_name, sheets = sheet_names.len(), "reading first worksheet");
    let range = workbook
        .worksheet_range(sheet_name)
        .map_err(|err| IngestError::file_read(path, err))?;
    Ok(columns_from_range(&range))
}

/// Split a worksheet range into its header row and typed columns.
pub(crate) fn columns_from_range(range: &Range<Data>) -> RawColumns {
    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return (Vec::new(), Vec::new());
    };
    let headers: Vec<String> = header_row
        .iter()
        .map(|cell| match cell {
            Data::Empty => String::new(),
            other => other.to_string(),
        })
        .collect();

    let mut columns: Vec<Vec<CellValue>> = vec![Vec::new(); headers.len()];
    for row in rows {
        for (index, column) in columns.iter_mut().enumerate() {
            column.push(row.get(index).map_or(CellValue::Missing, spreadsheet_cell));
        }
    }
    (headers, columns)
}

fn spreadsheet_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty | Data::Error(_) => CellValue::Missing,
        Data::String(s) if s.is_empty() => CellValue::Missing,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Int(i) => CellValue::Int(*i),
        Data::Float(f) => CellValue::Float(*f),
        Data::Bool(b) => CellValue::Bool(*b),
        other => CellValue::Text(other.to_string()),
    }
}

/// Accepts an array of record objects, or an object of column name to an array of values
/// (or to an object of row index to value).
pub(crate) fn read_json(path: &Path, text: &str) -> Result<RawColumns> {
    let payload: Value =
        serde_json::from_str(text).map_err(|err| IngestError::file_read(path, err))?;
    match payload {
        Value::Array(records) => json_records(path, records),
        Value::Object(by_column) => json_columns(path, by_column),
        _ => Err(IngestError::file_read(
            path,
            "expected a JSON array of records or an object of columns",
        )),
    }
}

/// Column orientation. Rows are lined up by index label: array positions are labels `0..n`,
/// and the row order is ascending when every label is an integer, first-seen otherwise.
/// A label absent from a column is a missing cell; value arrays must all have one length.
fn json_columns(path: &Path, by_column: Map<String, Value>) -> Result<RawColumns> {
    let mut headers = Vec::with_capacity(by_column.len());
    let mut keyed: Vec<Vec<(String, Value)>> = Vec::with_capacity(by_column.len());
    let mut array_len: Option<(String, usize)> = None;
    for (name, values) in by_column {
        let cells: Vec<(String, Value)> = match values {
            Value::Array(items) => {
                let len = items.len();
                let (first, expected) = array_len.get_or_insert_with(|| (name.clone(), len));
                if *expected != len {
                    return Err(IngestError::file_read(
                        path,
                        format!(
                            "column '{name}' has {len} values but column '{first}' has {expected}"
                        ),
                    ));
                }
                items
                    .into_iter()
                    .enumerate()
                    .map(|(position, value)| (position.to_string(), value))
                    .collect()
            }
            Value::Object(items) => items.into_iter().collect(),
            _ => {
                return Err(IngestError::file_read(
                    path,
                    format!("column '{name}' is not an array or object of values"),
                ))
            }
        };
        headers.push(name);
        keyed.push(cells);
    }

    let mut index: Vec<String> = Vec::new();
    let mut seen = HashSet::new();
    for (label, _) in keyed.iter().flatten() {
        if seen.insert(label.as_str()) {
            index.push(label.clone());
        }
    }
    let numeric: Option<Vec<i64>> = index.iter().map(|label| label.parse().ok()).collect();
    if let Some(numeric) = numeric {
        let mut ordered: Vec<(i64, String)> = numeric.into_iter().zip(index).collect();
        ordered.sort_by_key(|(position, _)| *position);
        index = ordered.into_iter().map(|(_, label)| label).collect();
    }

    let columns = keyed
        .into_iter()
        .map(|cells| {
            let by_label: HashMap<String, Value> = cells.into_iter().collect();
            index
                .iter()
                .map(|label| by_label.get(label).map_or(CellValue::Missing, json_cell))
                .collect()
        })
        .collect();
    Ok((headers, columns))
}

fn json_records(path: &Path, records: Vec<Value>) -> Result<RawColumns> {
    let mut headers: Vec<String> = Vec::new();
    let mut seen = HashSet::new();
    let mut objects = Vec::with_capacity(records.len());
    for (index, record) in records.into_iter().enumerate() {
        let Value::Object(object) = record else {
            return Err(IngestError::file_read(
                path,
                format!("record {index} is not a JSON object"),
            ));
        };
        for key in object.keys() {
            if seen.insert(key.clone()) {
                headers.push(key.clone());
            }
        }
        objects.push(object);
    }

    let columns = headers
        .iter()
        .map(|name| {
            objects
                .iter()
                .map(|object| object.get(name).map_or(CellValue::Missing, json_cell))
                .collect()
        })
        .collect();
    Ok((headers, columns))
}

fn json_cell(value: &Value) -> CellValue {
    match value {
        Value::Null => CellValue::Missing,
        Value::Bool(b) => CellValue::Bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => CellValue::Int(i),
            None => n.as_f64().map_or(CellValue::Missing, CellValue::Float),
        },
        Value::String(s) if s.is_empty() => CellValue::Missing,
        Value::String(s) => CellValue::Text(s.clone()),
        other => CellValue::Text(other.to_string()),
    }
}
