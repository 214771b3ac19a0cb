use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use super::plot::{self, FigureConfig};
use super::stats;
use super::types::VisualizationFiles;
use super::{VisualizationRequest, Visualizer};
use crate::classify::ColumnKind;
use crate::error::VisualizationError;
use crate::table::{Table, Value};

/// Writes SVG plots and standalone HTML plots under
/// `<output_dir>/<dataset>/`
#[derive(Debug, Clone)]
pub struct SvgVisualizer {
    pub output_dir: PathBuf,
    pub figure: FigureConfig,
}

impl SvgVisualizer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            figure: FigureConfig::default(),
        }
    }

    fn write(&self, dir: &Path, name: String, content: String) -> Result<PathBuf, VisualizationError> {
        let path = dir.join(name);
        fs::write(&path, content).map_err(|source| VisualizationError::Io { path: path.clone(), source })?;
        tracing::debug!("Wrote {}", path.display());
        Ok(path)
    }
}

fn numeric(table: &Table, column: &str) -> Result<Vec<Option<f64>>, VisualizationError> {
    table
        .column(column)
        .map(|c| c.f64_values())
        .ok_or_else(|| VisualizationError::MissingColumn(column.to_string()))
}

fn present(values: &[Option<f64>]) -> Vec<f64> {
    values.iter().flatten().copied().collect()
}

/// Rows where both cells are present
fn pairs(xs: &[Option<f64>], ys: &[Option<f64>]) -> Vec<(f64, f64)> {
    xs.iter()
        .zip(ys)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect()
}

impl Visualizer for SvgVisualizer {
    fn visualize(&self, request: &VisualizationRequest<'_>) -> Result<VisualizationFiles, VisualizationError> {
        let dir = self.output_dir.join(request.dataset);
        fs::create_dir_all(&dir).map_err(|source| VisualizationError::Io { path: dir.clone(), source })?;

        let table = request.table;
        let partition = request.partition;
        let config = &self.figure;
        let mut files = VisualizationFiles::default();

        if partition.numeric.len() > 1 {
            let columns = partition
                .numeric
                .iter()
                .map(|name| numeric(table, name).map(|v| (name.clone(), present(&v))))
                .collect::<Result<Vec<_>, _>>()?;
            let first = &partition.numeric[0];

            let svg = plot::pairplot_svg(&columns, config);
            files.static_files.push(self.write(&dir, format!("static_pairplot_{}.svg", first), svg)?);

            let raw = partition
                .numeric
                .iter()
                .map(|name| numeric(table, name))
                .collect::<Result<Vec<_>, _>>()?;
            let matrix: Vec<Vec<f64>> = raw
                .iter()
                .enumerate()
                .map(|(i, a)| {
                    raw.iter()
                        .enumerate()
                        .map(|(j, b)| {
                            if i == j {
                                return 1.0;
                            }
                            let (xs, ys): (Vec<f64>, Vec<f64>) = pairs(a, b).into_iter().unzip();
                            stats::pearson(&xs, &ys)
                        })
                        .collect()
                })
                .collect();
            let svg = plot::heatmap_svg(&partition.numeric, &matrix, config);
            files.static_files.push(self.write(&dir, format!("static_heatmap_{}.svg", first), svg)?);
        }

        let target_kind = request.target.and_then(|t| partition.kind_of(t));

        for column in request.columns {
            let kind = partition
                .kind_of(column)
                .ok_or_else(|| VisualizationError::MissingColumn(column.clone()))?;

            match kind {
                ColumnKind::Numeric => {
                    let values = numeric(table, column)?;
                    let svg = plot::histogram_svg(column, &present(&values), config);
                    files.static_files.push(self.write(&dir, format!("static_histogram_{}.svg", column), svg)?);

                    match (request.target, target_kind) {
                        (Some(target), Some(ColumnKind::Categorical)) => {
                            let groups = grouped(table, target, &values)?;
                            let svg = plot::boxplot_svg(column, target, &groups, config);
                            files
                                .static_files
                                .push(self.write(&dir, format!("static_boxplot_{}_{}.svg", target, column), svg)?);
                        }
                        (Some(target), Some(ColumnKind::Numeric)) if target != column.as_str() => {
                            let points = pairs(&values, &numeric(table, target)?);
                            let html = plot::interactive_scatter_html(column, target, &points, config);
                            files
                                .interactive
                                .push(self.write(&dir, format!("interactive_scatter_{}_{}.html", column, target), html)?);
                        }
                        _ => {}
                    }
                }
                ColumnKind::Categorical => {
                    let counts = value_counts(table, column)?;
                    let svg = plot::bar_svg(column, &counts, config);
                    files.static_files.push(self.write(&dir, format!("static_bar_{}.svg", column), svg)?);
                }
                ColumnKind::Temporal => {
                    let Some(target) = request.target.filter(|_| target_kind == Some(ColumnKind::Numeric)) else {
                        continue;
                    };
                    let points = time_series(table, column, target)?;
                    let html = plot::interactive_line_html(column, target, &points, config);
                    files
                        .interactive
                        .push(self.write(&dir, format!("interactive_line_{}_{}.html", column, target), html)?);
                }
            }
        }

        tracing::debug!(
            "{}: {} static, {} interactive plots",
            request.dataset,
            files.static_files.len(),
            files.interactive.len()
        );
        Ok(files)
    }
}

/// Numeric values split by the categories of `group`, first-appearance order
fn grouped(table: &Table, group: &str, values: &[Option<f64>]) -> Result<Vec<(String, Vec<f64>)>, VisualizationError> {
    let labels = table
        .column(group)
        .ok_or_else(|| VisualizationError::MissingColumn(group.to_string()))?;

    let mut groups: IndexMap<String, Vec<f64>> = IndexMap::new();
    for (label, value) in labels.values.iter().zip(values) {
        if let (false, Some(v)) = (label.is_null(), value) {
            groups.entry(label.render()).or_default().push(*v);
        }
    }
    Ok(groups.into_iter().collect())
}

/// Category counts, most frequent first
fn value_counts(table: &Table, column: &str) -> Result<Vec<(String, usize)>, VisualizationError> {
    let col = table
        .column(column)
        .ok_or_else(|| VisualizationError::MissingColumn(column.to_string()))?;

    let mut counts: IndexMap<String, usize> = IndexMap::new();
    for value in col.values.iter().filter(|v| !v.is_null()) {
        *counts.entry(value.render()).or_default() += 1;
    }
    let mut counts: Vec<(String, usize)> = counts.into_iter().collect();
    // Stable sort keeps first-appearance order among ties
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    Ok(counts)
}

/// (timestamp label, target) sorted by timestamp
fn time_series(table: &Table, column: &str, target: &str) -> Result<Vec<(String, f64)>, VisualizationError> {
    let stamps = table
        .column(column)
        .ok_or_else(|| VisualizationError::MissingColumn(column.to_string()))?;
    let ys = numeric(table, target)?;

    let mut points: Vec<_> = stamps
        .values
        .iter()
        .zip(ys)
        .filter_map(|(stamp, y)| match (stamp, y) {
            (Value::Timestamp(ts), Some(y)) => Some((*ts, y)),
            _ => None,
        })
        .collect();
    if points.is_empty() && !stamps.is_empty() {
        return Err(VisualizationError::Unsupported {
            plot: "line",
            detail: format!("{} has no timestamps paired with {}", column, target),
        });
    }
    points.sort_by_key(|(ts, _)| *ts);

    Ok(points
        .into_iter()
        .map(|(ts, y)| (Value::Timestamp(ts).render(), y))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ColumnPartition;
    use crate::table::Column;
    use tempfile::TempDir;

    fn table() -> Table {
        Table::from_columns(vec![
            Column::new("x", (0..10).map(|i| Value::Float(i as f64)).collect()),
            Column::new("y", (0..10).map(|i| Value::Float((i * i) as f64)).collect()),
            Column::new(
                "group",
                (0..10).map(|i| Value::Text(if i % 2 == 0 { "even" } else { "odd" }.into())).collect(),
            ),
            Column::new(
                "day",
                (0..10).rev().map(|i| Value::parse(&format!("2024-01-{:02}", i + 1))).collect(),
            ),
        ])
        .unwrap()
    }

    fn names(files: &[PathBuf]) -> Vec<String> {
        files
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(String::from))
            .collect()
    }

    #[test]
    fn test_numeric_target() {
        let dir = TempDir::new().unwrap();
        let table = table();
        let partition = ColumnPartition::of(&table);
        let columns = vec!["x".to_string(), "group".to_string(), "day".to_string()];

        let files = SvgVisualizer::new(dir.path())
            .visualize(&VisualizationRequest {
                dataset: "sales",
                table: &table,
                columns: &columns,
                partition: &partition,
                target: Some("y"),
            })
            .unwrap();

        assert_eq!(
            names(&files.static_files),
            vec!["static_pairplot_x.svg", "static_heatmap_x.svg", "static_histogram_x.svg", "static_bar_group.svg"]
        );
        assert_eq!(
            names(&files.interactive),
            vec!["interactive_scatter_x_y.html", "interactive_line_day_y.html"]
        );
        assert!(files.all().all(|p| p.starts_with(dir.path().join("sales")) && p.exists()));
    }

    #[test]
    fn test_categorical_target_gives_boxplots() {
        let dir = TempDir::new().unwrap();
        let table = table();
        let partition = ColumnPartition::of(&table);
        let columns = vec!["x".to_string(), "day".to_string()];

        let files = SvgVisualizer::new(dir.path())
            .visualize(&VisualizationRequest {
                dataset: "sales",
                table: &table,
                columns: &columns,
                partition: &partition,
                target: Some("group"),
            })
            .unwrap();

        assert!(names(&files.static_files).contains(&"static_boxplot_group_x.svg".to_string()));
        assert!(files.interactive.is_empty());
    }

    #[test]
    fn test_single_numeric_column_has_no_pairplot() {
        let dir = TempDir::new().unwrap();
        let table = Table::from_columns(vec![Column::new("x", vec![Value::Int(1), Value::Int(2)])]).unwrap();
        let partition = ColumnPartition::of(&table);
        let columns = vec!["x".to_string()];

        let files = SvgVisualizer::new(dir.path())
            .visualize(&VisualizationRequest {
                dataset: "one",
                table: &table,
                columns: &columns,
                partition: &partition,
                target: None,
            })
            .unwrap();
        assert_eq!(names(&files.static_files), vec!["static_histogram_x.svg"]);
    }

    #[test]
    fn test_datasets_sharing_a_column_do_not_overwrite() {
        let dir = TempDir::new().unwrap();
        let visualizer = SvgVisualizer::new(dir.path());
        let columns = vec!["x".to_string()];

        let mut written = vec![];
        for (dataset, values) in [("a", [1, 2, 3]), ("b", [10, 20, 30])] {
            let table = Table::from_columns(vec![Column::new("x", values.iter().map(|v| Value::Int(*v)).collect())])
                .unwrap();
            let partition = ColumnPartition::of(&table);
            let files = visualizer
                .visualize(&VisualizationRequest {
                    dataset,
                    table: &table,
                    columns: &columns,
                    partition: &partition,
                    target: None,
                })
                .unwrap();
            written.push(files.static_files[0].clone());
        }

        assert_eq!(written[0], dir.path().join("a").join("static_histogram_x.svg"));
        assert_eq!(written[1], dir.path().join("b").join("static_histogram_x.svg"));
        assert_ne!(fs::read_to_string(&written[0]).unwrap(), fs::read_to_string(&written[1]).unwrap());
    }

    #[test]
    fn test_unknown_column() {
        let dir = TempDir::new().unwrap();
        let table = table();
        let partition = ColumnPartition::of(&table);
        let columns = vec!["nope".to_string()];

        let err = SvgVisualizer::new(dir.path())
            .visualize(&VisualizationRequest {
                dataset: "sales",
                table: &table,
                columns: &columns,
                partition: &partition,
                target: None,
            })
            .unwrap_err();
        assert!(matches!(err, VisualizationError::MissingColumn(c) if c == "nope"));
    }

    #[test]
    fn test_time_series_sorted() {
        let points = time_series(&table(), "day", "y").unwrap();
        assert!(points.windows(2).all(|w| w[0].0 <= w[1].0));
        assert_eq!(points[0].1, 81.0);
    }
}
