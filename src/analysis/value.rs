//! Runtime values of the analysis dialect.

use std::cmp::Ordering;

use unicode_width::UnicodeWidthStr;

use crate::dataset::{format_float, Datum, Frame};

/// The module-like handles bound into the execution namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handle {
    /// `plt`: figure state manipulation.
    Pyplot,
    /// `sns`: statistical chart builders.
    Seaborn,
    /// `st`: registers artifacts with the display collaborator.
    Display,
    /// Bound by a runtime `import pandas`; carries no operations of its own.
    Pandas,
}

impl Handle {
    pub fn name(&self) -> &'static str {
        match self {
            Handle::Pyplot => "pyplot",
            Handle::Seaborn => "seaborn",
            Handle::Display => "display",
            Handle::Pandas => "pandas",
        }
    }
}

/// A labelled 1-D vector: a plain column (integer index) or an
/// aggregation result (group-key index).
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub name: String,
    pub index: Vec<Datum>,
    pub values: Vec<Datum>,
}

impl Series {
    pub fn from_column(name: &str, values: Vec<Datum>) -> Self {
        let index = (0..values.len() as i64).map(Datum::Int).collect();
        Self {
            name: name.to_string(),
            index,
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn lookup(&self, key: &Datum) -> Option<&Datum> {
        self.index
            .iter()
            .position(|k| k.loose_eq(key))
            .map(|i| &self.values[i])
    }

    pub fn repr(&self) -> String {
        if self.is_empty() {
            return format!("(empty series: {})", self.name);
        }
        let width = self
            .index
            .iter()
            .map(|k| UnicodeWidthStr::width(k.to_string().as_str()))
            .max()
            .unwrap_or(0);
        let mut out = String::new();
        for (k, v) in self.index.iter().zip(&self.values) {
            let key = k.to_string();
            out.push_str(&key);
            for _ in UnicodeWidthStr::width(key.as_str())..width {
                out.push(' ');
            }
            out.push_str("    ");
            out.push_str(&v.to_string());
            out.push('\n');
        }
        out.pop();
        out
    }
}

/// `df.groupby(key)` before column selection.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupBy {
    pub frame: Frame,
    pub key: String,
}

/// `df.groupby(key)[column]`.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedSeries {
    pub frame: Frame,
    pub key: String,
    pub column: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    Series(Series),
    Frame(Frame),
    GroupBy(GroupBy),
    GroupedSeries(GroupedSeries),
    Module(Handle),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Series(_) => "Series",
            Value::Frame(_) => "DataFrame",
            Value::GroupBy(_) | Value::GroupedSeries(_) => "GroupBy",
            Value::Module(_) => "module",
        }
    }

    pub fn from_datum(d: &Datum) -> Value {
        match d {
            Datum::Null => Value::None,
            Datum::Bool(b) => Value::Bool(*b),
            Datum::Int(v) => Value::Int(*v),
            Datum::Float(v) => Value::Float(*v),
            Datum::Str(s) => Value::Str(s.clone()),
        }
    }

    /// Scalar conversion for storing into a frame cell.
    pub fn to_datum(&self) -> Result<Datum, String> {
        match self {
            Value::None => Ok(Datum::Null),
            Value::Bool(b) => Ok(Datum::Bool(*b)),
            Value::Int(v) => Ok(Datum::Int(*v)),
            Value::Float(v) => Ok(Datum::Float(*v)),
            Value::Str(s) => Ok(Datum::Str(s.clone())),
            other => Err(format!(
                "cannot store a {} value in a column cell",
                other.type_name()
            )),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::Bool(b) => Some(*b as i64 as f64),
            _ => None,
        }
    }

    /// Truthiness. Frames and series refuse, as their truth is ambiguous.
    pub fn truthy(&self) -> Result<bool, String> {
        match self {
            Value::None => Ok(false),
            Value::Bool(b) => Ok(*b),
            Value::Int(v) => Ok(*v != 0),
            Value::Float(v) => Ok(*v != 0.0),
            Value::Str(s) => Ok(!s.is_empty()),
            Value::List(items) | Value::Tuple(items) => Ok(!items.is_empty()),
            Value::Module(_) => Ok(true),
            Value::Series(_) | Value::Frame(_) => Err(format!(
                "the truth value of a {} is ambiguous",
                self.type_name()
            )),
            Value::GroupBy(_) | Value::GroupedSeries(_) => {
                Err("the truth value of grouped data is ambiguous".into())
            }
        }
    }

    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self.as_number(), other.as_number()) {
            (Some(a), Some(b)) => a == b,
            _ => match (self, other) {
                (Value::Str(a), Value::Str(b)) => a == b,
                (Value::None, Value::None) => true,
                (Value::List(a), Value::List(b)) | (Value::Tuple(a), Value::Tuple(b)) => {
                    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_eq(y))
                }
                _ => self == other,
            },
        }
    }

    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self.as_number(), other.as_number()) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => match (self, other) {
                (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
                _ => None,
            },
        }
    }
}

/// Informal string rendering, as `print` uses.
pub fn py_str(v: &Value) -> String {
    match v {
        Value::None => "None".into(),
        Value::Bool(true) => "True".into(),
        Value::Bool(false) => "False".into(),
        Value::Int(n) => n.to_string(),
        Value::Float(n) => format_float(*n),
        Value::Str(s) => s.clone(),
        Value::List(items) => {
            let inner: Vec<String> = items.iter().map(py_repr).collect();
            format!("[{}]", inner.join(", "))
        }
        Value::Tuple(items) => {
            let inner: Vec<String> = items.iter().map(py_repr).collect();
            if items.len() == 1 {
                format!("({},)", inner[0])
            } else {
                format!("({})", inner.join(", "))
            }
        }
        Value::Series(s) => s.repr(),
        Value::Frame(f) => {
            let mut p = f.preview(10);
            while p.ends_with('\n') {
                p.pop();
            }
            p
        }
        Value::GroupBy(g) => format!("(grouped by '{}')", g.key),
        Value::GroupedSeries(g) => format!("(column '{}' grouped by '{}')", g.column, g.key),
        Value::Module(h) => format!("(module: {})", h.name()),
    }
}

/// Formal rendering used inside containers: strings are quoted.
pub fn py_repr(v: &Value) -> String {
    match v {
        Value::Str(s) => format!("'{}'", s),
        other => py_str(other),
    }
}

/// Aggregations shared by grouped and flat data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggOp {
    Mean,
    Sum,
    Count,
    Min,
    Max,
}

impl AggOp {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "mean" => Some(AggOp::Mean),
            "sum" => Some(AggOp::Sum),
            "count" => Some(AggOp::Count),
            "min" => Some(AggOp::Min),
            "max" => Some(AggOp::Max),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AggOp::Mean => "mean",
            AggOp::Sum => "sum",
            AggOp::Count => "count",
            AggOp::Min => "min",
            AggOp::Max => "max",
        }
    }
}

/// Aggregate one slice of cells to a single datum.
pub fn aggregate(values: &[Datum], op: AggOp, label: &str) -> Result<Datum, String> {
    let present: Vec<&Datum> = values.iter().filter(|d| !d.is_null()).collect();
    match op {
        AggOp::Count => Ok(Datum::Int(present.len() as i64)),
        AggOp::Min | AggOp::Max => {
            let mut iter = present.into_iter();
            let Some(first) = iter.next() else {
                return Ok(Datum::Null);
            };
            let mut best = first;
            for d in iter {
                let swap = match op {
                    AggOp::Min => d.compare(best) == Ordering::Less,
                    _ => d.compare(best) == Ordering::Greater,
                };
                if swap {
                    best = d;
                }
            }
            Ok(best.clone())
        }
        AggOp::Mean | AggOp::Sum => {
            let mut total = 0f64;
            let mut all_int = true;
            for d in &present {
                match d.as_f64() {
                    Some(v) => {
                        if !matches!(d, Datum::Int(_)) {
                            all_int = false;
                        }
                        total += v;
                    }
                    None => {
                        return Err(format!(
                            "cannot compute {} of non-numeric column '{}'",
                            op.name(),
                            label
                        ))
                    }
                }
            }
            if present.is_empty() {
                return Ok(Datum::Null);
            }
            if op == AggOp::Mean {
                Ok(Datum::Float(total / present.len() as f64))
            } else if all_int {
                Ok(Datum::Int(total as i64))
            } else {
                Ok(Datum::Float(total))
            }
        }
    }
}

/// Distinct non-null group keys in sorted order.
pub fn group_keys(frame: &Frame, key: &str) -> Result<Vec<Datum>, String> {
    let column = frame
        .column(key)
        .ok_or_else(|| format!("unknown column '{}'", key))?;
    let mut keys: Vec<Datum> = Vec::new();
    for d in &column.values {
        if d.is_null() {
            continue;
        }
        if !keys.iter().any(|k| k.loose_eq(d)) {
            keys.push(d.clone());
        }
    }
    keys.sort_by(|a, b| a.compare(b));
    Ok(keys)
}

/// Aggregate `column` per distinct value of `key`.
pub fn aggregate_grouped(
    frame: &Frame,
    key: &str,
    column: &str,
    op: AggOp,
) -> Result<Series, String> {
    let keys = group_keys(frame, key)?;
    let key_cells = &frame
        .column(key)
        .ok_or_else(|| format!("unknown column '{}'", key))?
        .values;
    let cells = &frame
        .column(column)
        .ok_or_else(|| format!("unknown column '{}'", column))?
        .values;
    let mut out = Vec::with_capacity(keys.len());
    for k in &keys {
        let members: Vec<Datum> = key_cells
            .iter()
            .zip(cells)
            .filter(|(kc, _)| kc.loose_eq(k))
            .map(|(_, v)| v.clone())
            .collect();
        out.push(aggregate(&members, op, column)?);
    }
    Ok(Series {
        name: column.to_string(),
        index: keys,
        values: out,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Column;

    fn frame() -> Frame {
        Frame::new(vec![
            Column {
                name: "gender".into(),
                values: vec![
                    Datum::Str("Female".into()),
                    Datum::Str("Male".into()),
                    Datum::Str("Female".into()),
                    Datum::Str("Male".into()),
                ],
            },
            Column {
                name: "purchase_amount".into(),
                values: vec![
                    Datum::Float(120.0),
                    Datum::Float(80.0),
                    Datum::Float(100.0),
                    Datum::Float(60.0),
                ],
            },
        ])
        .unwrap()
    }

    #[test]
    fn grouped_mean_is_keyed_and_sorted() {
        let s = aggregate_grouped(&frame(), "gender", "purchase_amount", AggOp::Mean).unwrap();
        assert_eq!(s.index, vec![Datum::Str("Female".into()), Datum::Str("Male".into())]);
        assert_eq!(s.values, vec![Datum::Float(110.0), Datum::Float(70.0)]);
        assert_eq!(s.lookup(&Datum::Str("Male".into())), Some(&Datum::Float(70.0)));
    }

    #[test]
    fn count_ignores_nulls_and_mean_rejects_text() {
        let vals = vec![Datum::Int(1), Datum::Null, Datum::Int(3)];
        assert_eq!(aggregate(&vals, AggOp::Count, "x").unwrap(), Datum::Int(2));
        assert_eq!(aggregate(&vals, AggOp::Sum, "x").unwrap(), Datum::Int(4));
        let text = vec![Datum::Str("a".into())];
        assert!(aggregate(&text, AggOp::Mean, "x").is_err());
    }

    #[test]
    fn py_str_renders_python_like() {
        assert_eq!(py_str(&Value::Float(20.0)), "20.0");
        assert_eq!(py_str(&Value::Bool(true)), "True");
        assert_eq!(
            py_str(&Value::List(vec![Value::Str("a".into()), Value::Int(1)])),
            "['a', 1]"
        );
        assert_eq!(
            py_str(&Value::Tuple(vec![Value::Int(8), Value::Int(6)])),
            "(8, 6)"
        );
    }

    #[test]
    fn truthiness_of_series_is_ambiguous() {
        let s = Series::from_column("x", vec![Datum::Int(1)]);
        assert!(Value::Series(s).truthy().is_err());
        assert!(!Value::Str(String::new()).truthy().unwrap());
        assert!(Value::Int(2).truthy().unwrap());
    }
}
