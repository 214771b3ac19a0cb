//! Artifact serializer
//!
//! [`Artifact`] is the union of every value a stage can hand to the workflow
//! state: primitives, sequences, string-keyed mappings, tables, columnar
//! vectors, timestamps, durations and opaque objects. [`serialize`] flattens
//! an artifact into plain JSON (primitive / array / object) so the state store
//! can write it.
//!
//! Serialization is total and idempotent. Tables come out as row records and
//! are rebuilt explicitly by the state store on reload; every other shape
//! round-trips exactly.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{NaiveDateTime, TimeDelta};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Number;

use crate::table::{Column, Table, Value, TIMESTAMP_FORMAT};

/// A value with no structured form; serialized through `Display`
#[derive(Clone)]
pub struct Opaque(Arc<dyn fmt::Display + Send + Sync>);

impl fmt::Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Opaque({})", self.0)
    }
}

#[derive(Debug, Clone)]
pub enum Artifact {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    Seq(Vec<Artifact>),
    Map(IndexMap<String, Artifact>),
    Table(Table),
    Column(Column),
    Timestamp(NaiveDateTime),
    Duration(TimeDelta),
    Opaque(Opaque),
}

impl Artifact {
    pub fn opaque(value: impl fmt::Display + Send + Sync + 'static) -> Self {
        Artifact::Opaque(Opaque(Arc::new(value)))
    }

    /// Lift any serde-serializable value into the artifact union.
    /// A value serde refuses (e.g. a map with non-string keys) falls back
    /// to its error text so this never fails.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(json) => Artifact::from(json),
            Err(e) => Artifact::Str(e.to_string()),
        }
    }

    pub fn map<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<Artifact>,
        I: IntoIterator<Item = (K, V)>,
    {
        Artifact::Map(entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Flatten an artifact into plain JSON
pub fn serialize(artifact: &Artifact) -> serde_json::Value {
    use serde_json::Value as Json;

    match artifact {
        Artifact::Table(table) => Json::Array(
            table.to_records().into_iter().map(Json::Object).collect(),
        ),
        Artifact::Column(column) => Json::Array(
            column.values.iter().map(|v| serialize(&Artifact::from(v))).collect(),
        ),
        Artifact::Timestamp(ts) => Json::String(ts.format(TIMESTAMP_FORMAT).to_string()),
        Artifact::Duration(d) => Json::String(d.to_string()),
        Artifact::Null => Json::Null,
        Artifact::Bool(b) => Json::Bool(*b),
        Artifact::Int(i) => Json::Number((*i).into()),
        Artifact::UInt(u) => Json::Number((*u).into()),
        // NaN and infinities have no JSON form
        Artifact::Float(f) => Number::from_f64(*f).map(Json::Number).unwrap_or(Json::Null),
        Artifact::Str(s) => Json::String(s.clone()),
        Artifact::Map(entries) => Json::Object(
            entries.iter().map(|(k, v)| (k.clone(), serialize(v))).collect(),
        ),
        Artifact::Seq(items) => Json::Array(items.iter().map(serialize).collect()),
        Artifact::Opaque(Opaque(inner)) => Json::String(inner.to_string()),
    }
}

impl From<serde_json::Value> for Artifact {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;

        match json {
            Json::Null => Artifact::Null,
            Json::Bool(b) => Artifact::Bool(b),
            Json::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Artifact::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Artifact::UInt(u)
                } else {
                    n.as_f64().map(Artifact::Float).unwrap_or(Artifact::Null)
                }
            }
            Json::String(s) => Artifact::Str(s),
            Json::Array(items) => Artifact::Seq(items.into_iter().map(Artifact::from).collect()),
            Json::Object(entries) => {
                Artifact::Map(entries.into_iter().map(|(k, v)| (k, Artifact::from(v))).collect())
            }
        }
    }
}

impl From<&Value> for Artifact {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Artifact::Null,
            Value::Bool(b) => Artifact::Bool(*b),
            Value::Int(i) => Artifact::Int(*i),
            Value::Float(f) => Artifact::Float(*f),
            Value::Text(s) => Artifact::Str(s.clone()),
            Value::Timestamp(ts) => Artifact::Timestamp(*ts),
        }
    }
}

macro_rules! narrow_signed {
    ($($t:ty),*) => {
        $(impl From<$t> for Artifact {
            fn from(v: $t) -> Self {
                Artifact::Int(v as i64)
            }
        })*
    };
}

macro_rules! narrow_unsigned {
    ($($t:ty),*) => {
        $(impl From<$t> for Artifact {
            fn from(v: $t) -> Self {
                match i64::try_from(v) {
                    Ok(i) => Artifact::Int(i),
                    Err(_) => Artifact::UInt(v as u64),
                }
            }
        })*
    };
}

narrow_signed!(i8, i16, i32, i64, isize);
narrow_unsigned!(u8, u16, u32, u64, usize);

impl From<f32> for Artifact {
    fn from(v: f32) -> Self {
        Artifact::Float(v as f64)
    }
}

impl From<f64> for Artifact {
    fn from(v: f64) -> Self {
        Artifact::Float(v)
    }
}

impl From<bool> for Artifact {
    fn from(v: bool) -> Self {
        Artifact::Bool(v)
    }
}

impl From<&str> for Artifact {
    fn from(v: &str) -> Self {
        Artifact::Str(v.to_string())
    }
}

impl From<String> for Artifact {
    fn from(v: String) -> Self {
        Artifact::Str(v)
    }
}

impl From<&Path> for Artifact {
    fn from(v: &Path) -> Self {
        Artifact::Str(v.display().to_string())
    }
}

impl From<PathBuf> for Artifact {
    fn from(v: PathBuf) -> Self {
        Artifact::from(v.as_path())
    }
}

impl From<Table> for Artifact {
    fn from(v: Table) -> Self {
        Artifact::Table(v)
    }
}

impl From<Column> for Artifact {
    fn from(v: Column) -> Self {
        Artifact::Column(v)
    }
}

impl From<NaiveDateTime> for Artifact {
    fn from(v: NaiveDateTime) -> Self {
        Artifact::Timestamp(v)
    }
}

impl From<TimeDelta> for Artifact {
    fn from(v: TimeDelta) -> Self {
        Artifact::Duration(v)
    }
}

impl<T: Into<Artifact>> From<Option<T>> for Artifact {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Artifact::Null)
    }
}

impl<T: Into<Artifact>> From<Vec<T>> for Artifact {
    fn from(v: Vec<T>) -> Self {
        Artifact::Seq(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Artifact>> From<IndexMap<String, T>> for Artifact {
    fn from(v: IndexMap<String, T>) -> Self {
        Artifact::map(v)
    }
}
