use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, WriterBuilder};
use indexmap::IndexMap;

use super::stats;
use super::Loader;
use crate::error::LoadError;
use crate::table::{Column, ColumnType, Table, Value};

/// Loads every CSV file in a directory, cleans it and writes the processed
/// copy next to the other derived tables.
#[derive(Debug, Clone)]
pub struct CsvLoader {
    pub processed_dir: PathBuf,
    /// Add an integer `<column>_encoded` column per categorical column
    pub encode_categorical: bool,
}

impl CsvLoader {
    pub fn new(processed_dir: impl Into<PathBuf>) -> Self {
        Self {
            processed_dir: processed_dir.into(),
            encode_categorical: true,
        }
    }

    pub fn with_encoding(mut self, encode_categorical: bool) -> Self {
        self.encode_categorical = encode_categorical;
        self
    }

    /// Path of the processed copy of `dataset`
    pub fn processed_path(&self, dataset: &str) -> PathBuf {
        self.processed_dir.join(format!("{}_processed.csv", dataset))
    }

    /// Fill missing values, drop duplicate rows, log outliers and encode
    /// categorical columns.
    pub fn preprocess(&self, dataset: &str, table: Table) -> Table {
        let mut table = fill_missing(dataset, table);

        let removed = table.drop_duplicate_rows();
        tracing::debug!("{}: {} duplicate rows removed", dataset, removed);

        for column in table.columns().iter().filter(|c| c.is_numeric()) {
            let values: Vec<f64> = column.f64_values().into_iter().flatten().collect();
            let outliers = stats::iqr_outliers(&values);
            if !outliers.is_empty() {
                tracing::debug!("{}: {} outliers in {}", dataset, outliers.len(), column.name);
            }
        }

        if self.encode_categorical {
            encode_categorical(&mut table);
        }
        table
    }

    fn write_processed(&self, dataset: &str, table: &Table) -> Result<PathBuf, LoadError> {
        let path = self.processed_path(dataset);
        let write_failed = |reason: String| LoadError::WriteFailed { path: path.clone(), reason };

        fs::create_dir_all(&self.processed_dir).map_err(|e| write_failed(e.to_string()))?;
        let mut writer = WriterBuilder::new()
            .from_path(&path)
            .map_err(|e| write_failed(e.to_string()))?;

        writer
            .write_record(table.column_names())
            .map_err(|e| write_failed(e.to_string()))?;
        for i in 0..table.n_rows() {
            let row: Vec<String> = table.row(i).iter().map(|v| v.render()).collect();
            writer.write_record(&row).map_err(|e| write_failed(e.to_string()))?;
        }
        writer.flush().map_err(|e| write_failed(e.to_string()))?;

        Ok(path)
    }
}

impl Loader for CsvLoader {
    fn load(&self, input_dir: &Path) -> Result<IndexMap<String, Table>, LoadError> {
        let entries = fs::read_dir(input_dir).map_err(|source| LoadError::UnreadableDirectory {
            path: input_dir.to_path_buf(),
            source,
        })?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_file()
                    && path
                        .extension()
                        .and_then(|ext| ext.to_str())
                        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
            })
            .collect();
        files.sort();

        if files.is_empty() {
            tracing::info!("No CSV files found in {}", input_dir.display());
            return Ok(IndexMap::new());
        }

        let mut datasets = IndexMap::new();
        for path in &files {
            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let table = match read_csv(path) {
                Ok(table) => table,
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", path.display(), e);
                    continue;
                }
            };
            tracing::info!(
                "Loaded {} ({} rows, {} columns)",
                path.display(),
                table.n_rows(),
                table.n_cols()
            );

            let table = self.preprocess(name, table);
            let out = self.write_processed(name, &table)?;
            tracing::info!("Saved processed data to {}", out.display());

            datasets.insert(name.to_string(), table);
        }

        if datasets.is_empty() {
            return Err(LoadError::NoValidFiles(input_dir.to_path_buf()));
        }
        Ok(datasets)
    }
}

/// Parse one CSV file with a header row into a typed table
pub fn read_csv(path: &Path) -> Result<Table, LoadError> {
    let malformed = |reason: String| LoadError::Malformed { path: path.to_path_buf(), reason };

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| malformed(e.to_string()))?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| malformed(e.to_string()))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    if headers.is_empty() || headers.iter().all(String::is_empty) {
        return Err(malformed("no header row".to_string()));
    }

    let mut cells: Vec<Vec<Value>> = vec![vec![]; headers.len()];
    for record in reader.records() {
        let record = record.map_err(|e| malformed(e.to_string()))?;
        for (i, raw) in record.iter().enumerate() {
            cells[i].push(Value::parse(raw));
        }
    }

    let columns = headers
        .into_iter()
        .zip(cells)
        .map(|(name, values)| Column::new(name, values))
        .collect();
    Table::from_columns(columns).map_err(|e| malformed(e.to_string()))
}

/// Numeric nulls get the column median, categorical nulls the column mode.
/// Columns with no values at all are dropped.
fn fill_missing(dataset: &str, table: Table) -> Table {
    let n_rows = table.n_rows();
    let mut filled = Table::new();

    for column in table.columns() {
        let nulls = column.null_count();
        if nulls == 0 {
            push(&mut filled, column.clone());
            continue;
        }
        if nulls == n_rows {
            tracing::warn!("{}: dropping empty column {}", dataset, column.name);
            continue;
        }

        let fill = match column.dtype {
            ColumnType::Integer | ColumnType::Float => {
                let values: Vec<f64> = column.f64_values().into_iter().flatten().collect();
                stats::median(&values).map(Value::Float)
            }
            ColumnType::Categorical | ColumnType::Boolean => mode(&column.values),
            ColumnType::Temporal => None,
        };

        let column = match fill {
            Some(fill) => {
                tracing::debug!("{}: filled {} missing values in {}", dataset, nulls, column.name);
                let values = column
                    .values
                    .iter()
                    .map(|v| if v.is_null() { fill.clone() } else { v.clone() })
                    .collect();
                // Re-infer: an integer column filled with a median becomes float
                Column::new(column.name.clone(), values)
            }
            None => column.clone(),
        };
        push(&mut filled, column);
    }

    filled
}

fn push(table: &mut Table, column: Column) {
    // Columns come from a valid table, so names are unique and lengths match
    if let Err(e) = table.push_column(column) {
        tracing::warn!("{}", e);
    }
}

/// Most frequent non-null value; ties go to the smallest rendered value
fn mode(values: &[Value]) -> Option<Value> {
    let mut counts: HashMap<String, (usize, &Value)> = HashMap::new();
    for value in values.iter().filter(|v| !v.is_null()) {
        counts.entry(value.render()).or_insert((0, value)).0 += 1;
    }
    counts
        .into_iter()
        .max_by(|(ka, (ca, _)), (kb, (cb, _))| ca.cmp(cb).then_with(|| kb.cmp(ka)))
        .map(|(_, (_, value))| value.clone())
}

/// Append `<name>_encoded` for each categorical column: codes in order of
/// first appearance, -1 for missing cells.
fn encode_categorical(table: &mut Table) {
    let encoded: Vec<Column> = table
        .columns()
        .iter()
        .filter(|c| c.dtype == ColumnType::Categorical)
        .map(|column| {
            let mut codes: IndexMap<String, i64> = IndexMap::new();
            let values = column
                .values
                .iter()
                .map(|v| match v {
                    Value::Null => Value::Int(-1),
                    other => {
                        let next = codes.len() as i64;
                        Value::Int(*codes.entry(other.render()).or_insert(next))
                    }
                })
                .collect();
            Column::with_type(format!("{}_encoded", column.name), ColumnType::Integer, values)
        })
        .collect();

    for column in encoded {
        if table.column(&column.name).is_some() {
            continue;
        }
        push(table, column);
    }
}
