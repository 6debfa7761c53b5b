//! Tabular dataset model and CSV/Excel ingestion.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use thiserror::Error;
use tracing::info;
use unicode_width::UnicodeWidthStr;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {reason}")]
    Parse { path: String, reason: String },
    #[error("unsupported file type '{0}' (expected .csv, .xlsx or .xls)")]
    UnsupportedFormat(String),
    #[error("{path}: file contains no data")]
    Empty { path: String },
}

/// A single typed cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Datum {
    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Datum::Int(v) => Some(*v as f64),
            Datum::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Datum::Null => "null",
            Datum::Bool(_) => "bool",
            Datum::Int(_) => "int",
            Datum::Float(_) => "float",
            Datum::Str(_) => "str",
        }
    }

    /// Total ordering used for group keys and min/max. Nulls sort first,
    /// then bools, then numbers, then strings.
    pub fn compare(&self, other: &Datum) -> std::cmp::Ordering {
        use std::cmp::Ordering;
        fn rank(d: &Datum) -> u8 {
            match d {
                Datum::Null => 0,
                Datum::Bool(_) => 1,
                Datum::Int(_) | Datum::Float(_) => 2,
                Datum::Str(_) => 3,
            }
        }
        match (self, other) {
            (Datum::Bool(a), Datum::Bool(b)) => a.cmp(b),
            (Datum::Str(a), Datum::Str(b)) => a.cmp(b),
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a.total_cmp(&b),
                _ => rank(self).cmp(&rank(other)),
            },
        }
    }

    /// Equality with numeric cross-type coercion (`1 == 1.0`).
    pub fn loose_eq(&self, other: &Datum) -> bool {
        match (self.as_f64(), other.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => self == other,
        }
    }
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Datum::Null => write!(f, "NaN"),
            Datum::Bool(true) => write!(f, "True"),
            Datum::Bool(false) => write!(f, "False"),
            Datum::Int(v) => write!(f, "{}", v),
            Datum::Float(v) => write!(f, "{}", format_float(*v)),
            Datum::Str(v) => write!(f, "{}", v),
        }
    }
}

/// Float rendering that keeps a trailing `.0` on whole numbers, so means
/// and sums read as floats rather than silently degrading to integers.
pub fn format_float(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{:.1}", v)
    } else {
        format!("{}", v)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<Datum>,
}

impl Column {
    pub fn non_null(&self) -> usize {
        self.values.iter().filter(|d| !d.is_null()).count()
    }

    /// The dominant cell type, after numeric promotion.
    pub fn dtype(&self) -> &'static str {
        let mut dtype = "null";
        for d in &self.values {
            match d {
                Datum::Null => {}
                other => {
                    let t = other.type_name();
                    if dtype == "null" || dtype == t {
                        dtype = t;
                    } else if (dtype == "int" && t == "float") || (dtype == "float" && t == "int") {
                        dtype = "float";
                    } else {
                        return "str";
                    }
                }
            }
        }
        dtype
    }
}

/// The in-memory table handed to every execution. Columns are equal-length.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    columns: Vec<Column>,
}

impl Frame {
    pub fn new(columns: Vec<Column>) -> Result<Self, String> {
        if let Some(first) = columns.first() {
            let len = first.values.len();
            for c in &columns {
                if c.values.len() != len {
                    return Err(format!(
                        "column '{}' has {} values, expected {}",
                        c.name,
                        c.values.len(),
                        len
                    ));
                }
            }
        }
        Ok(Self { columns })
    }

    /// Load a dataset from disk, dispatching on the file extension.
    pub fn load(path: &Path) -> Result<Self, DatasetError> {
        let display = path.display().to_string();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        let frame = match ext.as_str() {
            "csv" => {
                let file = File::open(path).map_err(|source| DatasetError::Io {
                    path: display.clone(),
                    source,
                })?;
                Self::from_csv(file).map_err(|reason| DatasetError::Parse {
                    path: display.clone(),
                    reason,
                })?
            }
            "xlsx" | "xls" => Self::from_workbook(path)?,
            other => return Err(DatasetError::UnsupportedFormat(format!(".{}", other))),
        };
        if frame.n_rows() == 0 || frame.n_cols() == 0 {
            return Err(DatasetError::Empty { path: display });
        }
        info!(
            rows = frame.n_rows(),
            columns = frame.n_cols(),
            "dataset loaded"
        );
        Ok(frame)
    }

    /// Parse CSV text: first record is the header, cell types are inferred
    /// per column (int, float, bool, else string; empty cells are null).
    pub fn from_csv<R: Read>(reader: R) -> Result<Self, String> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers: Vec<String> = rdr
            .headers()
            .map_err(|e| e.to_string())?
            .iter()
            .map(|h| h.to_string())
            .collect();
        let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
        for record in rdr.records() {
            let record = record.map_err(|e| e.to_string())?;
            for (i, cell) in record.iter().enumerate() {
                if i < cells.len() {
                    cells[i].push(cell.to_string());
                }
            }
            // short records pad with nulls
            for column in cells.iter_mut().skip(record.len()) {
                column.push(String::new());
            }
        }
        let columns = headers
            .into_iter()
            .zip(cells)
            .map(|(name, raw)| Column {
                name,
                values: infer_column(&raw),
            })
            .collect();
        Self::new(columns)
    }

    fn from_workbook(path: &Path) -> Result<Self, DatasetError> {
        let display = path.display().to_string();
        let mut workbook = open_workbook_auto(path).map_err(|e| DatasetError::Parse {
            path: display.clone(),
            reason: e.to_string(),
        })?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| DatasetError::Parse {
                path: display.clone(),
                reason: "workbook has no sheets".into(),
            })?
            .map_err(|e| DatasetError::Parse {
                path: display.clone(),
                reason: e.to_string(),
            })?;
        let mut rows = range.rows();
        let headers: Vec<String> = match rows.next() {
            Some(row) => row.iter().map(cell_to_string).collect(),
            None => return Err(DatasetError::Empty { path: display }),
        };
        let mut columns: Vec<Column> = headers
            .into_iter()
            .map(|name| Column {
                name,
                values: Vec::new(),
            })
            .collect();
        for row in rows {
            for (i, column) in columns.iter_mut().enumerate() {
                column.values.push(match row.get(i) {
                    Some(cell) => cell_to_datum(cell),
                    None => Datum::Null,
                });
            }
        }
        for column in &mut columns {
            promote_numeric(&mut column.values);
        }
        Self::new(columns).map_err(|reason| DatasetError::Parse {
            path: display,
            reason,
        })
    }

    pub fn n_rows(&self) -> usize {
        self.columns.first().map(|c| c.values.len()).unwrap_or(0)
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Insert or replace a column. Length must match the frame.
    pub fn set_column(&mut self, name: &str, values: Vec<Datum>) -> Result<(), String> {
        if self.n_cols() > 0 && values.len() != self.n_rows() {
            return Err(format!(
                "cannot assign {} values to a frame of {} rows",
                values.len(),
                self.n_rows()
            ));
        }
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(existing) => existing.values = values,
            None => self.columns.push(Column {
                name: name.to_string(),
                values,
            }),
        }
        Ok(())
    }

    pub fn head(&self, n: usize) -> Frame {
        Frame {
            columns: self
                .columns
                .iter()
                .map(|c| Column {
                    name: c.name.clone(),
                    values: c.values.iter().take(n).cloned().collect(),
                })
                .collect(),
        }
    }

    /// Keep rows where the mask is true. Mask length must match.
    pub fn filter(&self, mask: &[bool]) -> Result<Frame, String> {
        if mask.len() != self.n_rows() {
            return Err(format!(
                "boolean mask of length {} does not match {} rows",
                mask.len(),
                self.n_rows()
            ));
        }
        Ok(Frame {
            columns: self
                .columns
                .iter()
                .map(|c| Column {
                    name: c.name.clone(),
                    values: c
                        .values
                        .iter()
                        .zip(mask)
                        .filter(|(_, keep)| **keep)
                        .map(|(v, _)| v.clone())
                        .collect(),
                })
                .collect(),
        })
    }

    /// Width-aligned plain-text preview of the first `n` rows.
    pub fn preview(&self, n: usize) -> String {
        let shown = n.min(self.n_rows());
        let mut widths: Vec<usize> = self
            .columns
            .iter()
            .map(|c| UnicodeWidthStr::width(c.name.as_str()))
            .collect();
        let mut rendered: Vec<Vec<String>> = Vec::with_capacity(shown);
        for row in 0..shown {
            let mut line = Vec::with_capacity(self.n_cols());
            for (i, c) in self.columns.iter().enumerate() {
                let cell = c.values[row].to_string();
                widths[i] = widths[i].max(UnicodeWidthStr::width(cell.as_str()));
                line.push(cell);
            }
            rendered.push(line);
        }
        let mut out = String::new();
        for (i, c) in self.columns.iter().enumerate() {
            if i > 0 {
                out.push_str("  ");
            }
            out.push_str(&pad(&c.name, widths[i]));
        }
        out.push('\n');
        for line in rendered {
            for (i, cell) in line.iter().enumerate() {
                if i > 0 {
                    out.push_str("  ");
                }
                out.push_str(&pad(cell, widths[i]));
            }
            out.push('\n');
        }
        if self.n_rows() > shown {
            out.push_str(&format!("... ({} more rows)\n", self.n_rows() - shown));
        }
        out
    }

    /// Summary in the spirit of a dataframe `info()` call.
    pub fn info(&self) -> String {
        let mut out = format!("{} rows x {} columns\n", self.n_rows(), self.n_cols());
        let name_width = self
            .columns
            .iter()
            .map(|c| UnicodeWidthStr::width(c.name.as_str()))
            .max()
            .unwrap_or(0);
        for c in &self.columns {
            out.push_str(&format!(
                "  {}  {:<6} {} non-null\n",
                pad(&c.name, name_width),
                c.dtype(),
                c.non_null()
            ));
        }
        out
    }
}

fn pad(s: &str, width: usize) -> String {
    let w = UnicodeWidthStr::width(s);
    let mut out = s.to_string();
    for _ in w..width {
        out.push(' ');
    }
    out
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn cell_to_datum(cell: &Data) -> Datum {
    match cell {
        Data::Empty => Datum::Null,
        Data::Int(v) => Datum::Int(*v),
        Data::Float(v) => Datum::Float(*v),
        Data::Bool(v) => Datum::Bool(*v),
        Data::String(s) => {
            if s.trim().is_empty() {
                Datum::Null
            } else {
                Datum::Str(s.clone())
            }
        }
        other => Datum::Str(other.to_string()),
    }
}

/// Column-wise type inference for raw CSV cells.
fn infer_column(raw: &[String]) -> Vec<Datum> {
    let present: Vec<&String> = raw.iter().filter(|s| !s.is_empty()).collect();
    let all_int = !present.is_empty() && present.iter().all(|s| s.parse::<i64>().is_ok());
    let all_float = !present.is_empty() && present.iter().all(|s| s.parse::<f64>().is_ok());
    let all_bool = !present.is_empty()
        && present
            .iter()
            .all(|s| matches!(s.to_ascii_lowercase().as_str(), "true" | "false"));
    raw.iter()
        .map(|s| {
            if s.is_empty() {
                Datum::Null
            } else if all_int {
                Datum::Int(s.parse().unwrap_or_default())
            } else if all_float {
                Datum::Float(s.parse().unwrap_or_default())
            } else if all_bool {
                Datum::Bool(s.eq_ignore_ascii_case("true"))
            } else {
                Datum::Str(s.clone())
            }
        })
        .collect()
}

/// Promote mixed int/float columns (as produced by spreadsheets) to float.
fn promote_numeric(values: &mut [Datum]) {
    let has_float = values.iter().any(|d| matches!(d, Datum::Float(_)));
    let has_int = values.iter().any(|d| matches!(d, Datum::Int(_)));
    if has_float && has_int {
        for d in values.iter_mut() {
            if let Datum::Int(v) = d {
                *d = Datum::Float(*v as f64);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "gender,purchase_amount,age\nFemale,101.5,23\nMale,80,31\nFemale,105.0,\n";

    fn sample() -> Frame {
        Frame::from_csv(CSV.as_bytes()).unwrap()
    }

    #[test]
    fn csv_types_are_inferred_per_column() {
        let f = sample();
        assert_eq!(f.n_rows(), 3);
        assert_eq!(f.column("gender").unwrap().dtype(), "str");
        assert_eq!(f.column("purchase_amount").unwrap().dtype(), "float");
        assert_eq!(f.column("age").unwrap().dtype(), "int");
        assert_eq!(f.column("age").unwrap().values[2], Datum::Null);
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let err = Frame::load(Path::new("data.parquet")).unwrap_err();
        assert!(matches!(err, DatasetError::UnsupportedFormat(_)));
        assert!(err.to_string().contains(".parquet"));
    }

    #[test]
    fn missing_csv_is_an_io_error() {
        let err = Frame::load(Path::new("no_such_file.csv")).unwrap_err();
        assert!(matches!(err, DatasetError::Io { .. }));
    }

    #[test]
    fn filter_respects_mask() {
        let f = sample();
        let filtered = f.filter(&[true, false, true]).unwrap();
        assert_eq!(filtered.n_rows(), 2);
        assert_eq!(
            filtered.column("gender").unwrap().values,
            vec![Datum::Str("Female".into()), Datum::Str("Female".into())]
        );
        assert!(f.filter(&[true]).is_err());
    }

    #[test]
    fn set_column_replaces_and_appends() {
        let mut f = sample();
        f.set_column("age", vec![Datum::Int(1), Datum::Int(2), Datum::Int(3)])
            .unwrap();
        assert_eq!(f.n_cols(), 3);
        f.set_column("flag", vec![Datum::Bool(true); 3]).unwrap();
        assert_eq!(f.n_cols(), 4);
        assert!(f.set_column("bad", vec![Datum::Int(0)]).is_err());
    }

    #[test]
    fn preview_is_aligned_and_truncated() {
        let f = sample();
        let p = f.preview(2);
        let lines: Vec<&str> = p.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("gender"));
        assert!(lines[3].contains("1 more row"));
    }

    #[test]
    fn info_reports_dtypes_and_nulls() {
        let info = sample().info();
        assert!(info.contains("3 rows x 3 columns"));
        assert!(info.contains("age"));
        assert!(info.contains("2 non-null"));
    }

    #[test]
    fn float_formatting_keeps_decimal_point() {
        assert_eq!(format_float(20.0), "20.0");
        assert_eq!(format_float(103.33333333333333), "103.33333333333333");
    }
}
