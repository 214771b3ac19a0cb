//! Columnar table model shared by every stage.
//!
//! A [`Table`] is an ordered set of equally long, named, typed columns.
//! Tables leave the process only as row records (`Vec<serde_json::Map>`),
//! and are rebuilt from records when workflow state is reloaded.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number};
use thiserror::Error;

/// Canonical ISO-8601 layout for temporal cells
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

const TIMESTAMP_INPUT_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TableError {
    #[error("Column {column} has {actual} rows, expected {expected}")]
    RaggedColumn {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("Duplicate column name: {0}")]
    DuplicateColumn(String),
}

/// A single cell
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(NaiveDateTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Parse a raw text cell, trying integer, float, boolean, then timestamp.
    /// Empty text is a missing value.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case("nan") || raw.eq_ignore_ascii_case("null") {
            return Value::Null;
        }
        if let Ok(i) = raw.parse::<i64>() {
            return Value::Int(i);
        }
        if let Ok(f) = raw.parse::<f64>() {
            // inf/-inf have no use downstream and no JSON form
            return if f.is_finite() { Value::Float(f) } else { Value::Null };
        }
        match raw {
            "true" | "True" | "TRUE" => return Value::Bool(true),
            "false" | "False" | "FALSE" => return Value::Bool(false),
            _ => {}
        }
        if let Some(ts) = parse_timestamp(raw) {
            return Value::Timestamp(ts);
        }
        Value::Text(raw.to_string())
    }

    /// JSON form used in row records
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::Number((*i).into()),
            Value::Float(f) => Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Timestamp(ts) => serde_json::Value::String(ts.format(TIMESTAMP_FORMAT).to_string()),
        }
    }

    /// Inverse of [`Value::to_json`]. Strings in ISO-8601 layout come back as
    /// timestamps; nested arrays and objects are kept as their JSON text.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
            },
            serde_json::Value::String(s) => match parse_timestamp(s) {
                Some(ts) => Value::Timestamp(ts),
                None => Value::Text(s.clone()),
            },
            other => Value::Text(other.to_string()),
        }
    }

    /// Plain text form, used for CSV output and plot labels
    pub fn render(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Text(s) => s.clone(),
            Value::Timestamp(ts) => ts.format(TIMESTAMP_FORMAT).to_string(),
        }
    }
}

/// Parse an ISO-8601 date or datetime
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    for format in TIMESTAMP_INPUT_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(ts);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Storage type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Integer,
    Float,
    Boolean,
    Categorical,
    Temporal,
}

impl ColumnType {
    /// Infer the narrowest type holding every non-null value.
    /// A column with no values at all is float, like an all-NaN column.
    pub fn infer(values: &[Value]) -> Self {
        let mut non_null = values.iter().filter(|v| !v.is_null()).peekable();
        if non_null.peek().is_none() {
            return ColumnType::Float;
        }

        let (mut ints, mut floats, mut bools, mut stamps, mut other) = (0, 0, 0, 0, 0);
        for value in non_null {
            match value {
                Value::Int(_) => ints += 1,
                Value::Float(_) => floats += 1,
                Value::Bool(_) => bools += 1,
                Value::Timestamp(_) => stamps += 1,
                _ => other += 1,
            }
        }

        if other > 0 {
            ColumnType::Categorical
        } else if floats == 0 && bools == 0 && stamps == 0 {
            ColumnType::Integer
        } else if bools == 0 && stamps == 0 {
            ColumnType::Float
        } else if ints == 0 && floats == 0 && stamps == 0 {
            ColumnType::Boolean
        } else if ints == 0 && floats == 0 && bools == 0 {
            ColumnType::Temporal
        } else {
            ColumnType::Categorical
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub dtype: ColumnType,
    pub values: Vec<Value>,
}

impl Column {
    /// Build a column and infer its type from the values
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        let dtype = ColumnType::infer(&values);
        Self::with_type(name, dtype, values)
    }

    /// Build a column with an explicit type. Cells are normalized so that a
    /// float column holds only floats and a categorical column only text.
    pub fn with_type(name: impl Into<String>, dtype: ColumnType, values: Vec<Value>) -> Self {
        let values = values
            .into_iter()
            .map(|v| match (dtype, v) {
                (_, Value::Null) => Value::Null,
                (ColumnType::Float, Value::Int(i)) => Value::Float(i as f64),
                (ColumnType::Categorical, Value::Text(s)) => Value::Text(s),
                (ColumnType::Categorical, other) => Value::Text(other.render()),
                (_, other) => other,
            })
            .collect();

        Self { name: name.into(), dtype, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.dtype, ColumnType::Integer | ColumnType::Float)
    }

    pub fn null_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_null()).count()
    }

    /// Numeric view; `None` for non-numeric cells and nulls
    pub fn f64_values(&self) -> Vec<Option<f64>> {
        self.values.iter().map(Value::as_f64).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_columns(columns: Vec<Column>) -> Result<Self, TableError> {
        let mut table = Self::new();
        for column in columns {
            table.push_column(column)?;
        }
        Ok(table)
    }

    pub fn push_column(&mut self, column: Column) -> Result<(), TableError> {
        if self.column(&column.name).is_some() {
            return Err(TableError::DuplicateColumn(column.name));
        }
        if let Some(first) = self.columns.first() {
            if first.len() != column.len() {
                let actual = column.len();
                return Err(TableError::RaggedColumn {
                    column: column.name,
                    expected: first.len(),
                    actual,
                });
            }
        }
        self.columns.push(column);
        Ok(())
    }

    pub fn n_rows(&self) -> usize {
        self.columns.first().map(Column::len).unwrap_or(0)
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Cells of one row, in column order
    pub fn row(&self, index: usize) -> Vec<&Value> {
        self.columns.iter().map(|c| &c.values[index]).collect()
    }

    /// Remove rows identical to an earlier row. Returns the number removed.
    pub fn drop_duplicate_rows(&mut self) -> usize {
        let mut seen = std::collections::HashSet::new();
        let keep: Vec<bool> = (0..self.n_rows())
            .map(|i| {
                let key: Vec<String> = self
                    .row(i)
                    .iter()
                    .map(|v| format!("{:?}", v))
                    .collect();
                seen.insert(key)
            })
            .collect();

        let removed = keep.iter().filter(|k| !**k).count();
        if removed > 0 {
            for column in &mut self.columns {
                let mut flags = keep.iter();
                column.values.retain(|_| *flags.next().unwrap_or(&true));
            }
        }
        removed
    }

    /// Row-oriented form: one JSON object per row, keys in column order
    pub fn to_records(&self) -> Vec<Map<String, serde_json::Value>> {
        (0..self.n_rows())
            .map(|i| {
                self.columns
                    .iter()
                    .map(|c| (c.name.clone(), c.values[i].to_json()))
                    .collect()
            })
            .collect()
    }

    /// Rebuild a table from row records. Column order follows the first
    /// appearance of each key; keys missing from a row become nulls.
    pub fn from_records(records: &[Map<String, serde_json::Value>]) -> Self {
        let mut names: Vec<&String> = vec![];
        for record in records {
            for key in record.keys() {
                if !names.contains(&key) {
                    names.push(key);
                }
            }
        }

        let columns = names
            .into_iter()
            .map(|name| {
                let values = records
                    .iter()
                    .map(|r| r.get(name).map(Value::from_json).unwrap_or(Value::Null))
                    .collect();
                Column::new(name.clone(), values)
            })
            .collect();

        Self { columns }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Table {
        Table::from_columns(vec![
            Column::new("id", vec![Value::Int(1), Value::Int(2), Value::Int(2)]),
            Column::new("score", vec![Value::Float(0.5), Value::Float(1.5), Value::Float(1.5)]),
            Column::new(
                "city",
                vec![
                    Value::Text("Oslo".into()),
                    Value::Text("Lima".into()),
                    Value::Text("Lima".into()),
                ],
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_parse_cells() {
        assert_eq!(Value::parse("42"), Value::Int(42));
        assert_eq!(Value::parse("4.5"), Value::Float(4.5));
        assert_eq!(Value::parse(""), Value::Null);
        assert_eq!(Value::parse("false"), Value::Bool(false));
        assert!(matches!(Value::parse("2024-03-01"), Value::Timestamp(_)));
        assert_eq!(Value::parse("north"), Value::Text("north".into()));
    }

    #[test]
    fn test_infer_column_types() {
        assert_eq!(ColumnType::infer(&[Value::Int(1), Value::Null]), ColumnType::Integer);
        assert_eq!(ColumnType::infer(&[Value::Int(1), Value::Float(2.5)]), ColumnType::Float);
        assert_eq!(ColumnType::infer(&[Value::Int(1), Value::Text("a".into())]), ColumnType::Categorical);
        assert_eq!(ColumnType::infer(&[Value::Null]), ColumnType::Float);
        assert_eq!(ColumnType::infer(&[Value::Bool(true)]), ColumnType::Boolean);
    }

    #[test]
    fn test_float_column_normalizes_ints() {
        let col = Column::new("x", vec![Value::Int(1), Value::Float(2.5)]);
        assert_eq!(col.values, vec![Value::Float(1.0), Value::Float(2.5)]);
    }

    #[test]
    fn test_ragged_column_rejected() {
        let mut table = sample();
        let err = table
            .push_column(Column::new("short", vec![Value::Int(1)]))
            .unwrap_err();
        assert!(matches!(err, TableError::RaggedColumn { expected: 3, actual: 1, .. }));

        let err = table.push_column(Column::new("id", vec![Value::Null; 3])).unwrap_err();
        assert_eq!(err, TableError::DuplicateColumn("id".into()));
    }

    #[test]
    fn test_drop_duplicate_rows() {
        let mut table = sample();
        assert_eq!(table.drop_duplicate_rows(), 1);
        assert_eq!(table.n_rows(), 2);
        assert_eq!(table.drop_duplicate_rows(), 0);
    }

    #[test]
    fn test_records_reconstitute_table() {
        let mut table = sample();
        let stamps = vec![
            Value::parse("2024-01-01"),
            Value::parse("2024-01-02 10:30:00"),
            Value::Null,
        ];
        table.push_column(Column::new("at", stamps)).unwrap();

        let records = table.to_records();
        assert_eq!(records[0]["city"], json!("Oslo"));
        assert_eq!(records[1]["at"], json!("2024-01-02T10:30:00"));
        assert_eq!(records[0].keys().collect::<Vec<_>>(), vec!["id", "score", "city", "at"]);

        let rebuilt = Table::from_records(&records);
        assert_eq!(rebuilt, table);
        assert_eq!(rebuilt.column("at").unwrap().dtype, ColumnType::Temporal);
    }

    #[test]
    fn test_from_records_fills_missing_keys() {
        let records: Vec<Map<String, serde_json::Value>> = vec![
            json!({"a": 1}).as_object().unwrap().clone(),
            json!({"a": 2, "b": "x"}).as_object().unwrap().clone(),
        ];
        let table = Table::from_records(&records);
        assert_eq!(table.column_names(), vec!["a", "b"]);
        assert_eq!(table.column("b").unwrap().values[0], Value::Null);
    }
}
