//! Column-type classification used at stage boundaries.
//!
//! The orchestrator partitions every table once per dispatch so that the
//! analyzer and visualizer receive ready-made column lists.

use serde::{Deserialize, Serialize};

use crate::table::{ColumnType, Table};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Numeric,
    Categorical,
    Temporal,
}

impl From<ColumnType> for ColumnKind {
    fn from(dtype: ColumnType) -> Self {
        match dtype {
            ColumnType::Integer | ColumnType::Float => ColumnKind::Numeric,
            ColumnType::Boolean | ColumnType::Categorical => ColumnKind::Categorical,
            ColumnType::Temporal => ColumnKind::Temporal,
        }
    }
}

/// Column names of a table grouped by kind, each list in table order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnPartition {
    pub numeric: Vec<String>,
    pub categorical: Vec<String>,
    pub temporal: Vec<String>,
}

impl ColumnPartition {
    pub fn of(table: &Table) -> Self {
        let mut partition = Self::default();
        for column in table.columns() {
            let bucket = match ColumnKind::from(column.dtype) {
                ColumnKind::Numeric => &mut partition.numeric,
                ColumnKind::Categorical => &mut partition.categorical,
                ColumnKind::Temporal => &mut partition.temporal,
            };
            bucket.push(column.name.clone());
        }
        partition
    }

    pub fn kind_of(&self, column: &str) -> Option<ColumnKind> {
        let has = |names: &[String]| names.iter().any(|n| n == column);
        if has(&self.numeric) {
            Some(ColumnKind::Numeric)
        } else if has(&self.categorical) {
            Some(ColumnKind::Categorical)
        } else if has(&self.temporal) {
            Some(ColumnKind::Temporal)
        } else {
            None
        }
    }

    pub fn has_numeric(&self) -> bool {
        !self.numeric.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Column, Value};

    #[test]
    fn test_partition_preserves_column_order() {
        let table = Table::from_columns(vec![
            Column::new("b", vec![Value::Float(1.0)]),
            Column::new("label", vec![Value::Text("x".into())]),
            Column::new("a", vec![Value::Int(3)]),
            Column::new("flag", vec![Value::Bool(true)]),
            Column::new("when", vec![Value::parse("2024-05-01")]),
        ])
        .unwrap();

        let partition = ColumnPartition::of(&table);
        assert_eq!(partition.numeric, vec!["b", "a"]);
        assert_eq!(partition.categorical, vec!["label", "flag"]);
        assert_eq!(partition.temporal, vec!["when"]);
        assert_eq!(partition.kind_of("a"), Some(ColumnKind::Numeric));
        assert_eq!(partition.kind_of("missing"), None);
    }

    #[test]
    fn test_all_text_table_has_no_numeric() {
        let table = Table::from_columns(vec![Column::new("name", vec![Value::Text("n".into())])]).unwrap();
        assert!(!ColumnPartition::of(&table).has_numeric());
    }
}
