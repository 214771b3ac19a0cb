use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use super::types::{DatasetAnalysis, ReportKind};
use super::{ReportRequest, Reporter};
use crate::error::ReportError;

/// Correlations stronger than this (in absolute value) are called out in
/// business reports
pub const STRONG_CORRELATION: f64 = 0.7;

/// Writes one Markdown document per (dataset, kind) into `reports_dir`
#[derive(Debug, Clone)]
pub struct MarkdownReporter {
    pub reports_dir: PathBuf,
}

impl MarkdownReporter {
    pub fn new(reports_dir: impl Into<PathBuf>) -> Self {
        Self { reports_dir: reports_dir.into() }
    }

    /// Render the report body
    pub fn render(&self, request: &ReportRequest<'_>, generated: DateTime<Local>) -> String {
        let mut doc = String::new();
        let kind = request.kind.as_str();
        let mut title = kind.to_string();
        title[..1].make_ascii_uppercase();

        doc.push_str(&format!("# Data Analysis Report ({})\n\n", title));
        doc.push_str(&format!("Dataset: `{}`  \n", request.dataset));
        doc.push_str(&format!("Generated: {}\n\n", generated.format("%Y-%m-%d %H:%M:%S")));

        doc.push_str("## Executive Summary\n\n");
        let summary = summary(request.analysis);
        if summary.is_empty() {
            doc.push_str("No analysis results are available for this dataset.\n\n");
        }
        for line in summary {
            doc.push_str(&line);
            doc.push_str("\n\n");
        }

        match request.kind {
            ReportKind::Technical => technical_details(&mut doc, request.analysis),
            ReportKind::Business => business_insights(&mut doc, request.analysis),
        }

        doc.push_str("## Visualizations\n\n");
        if request.visualizations.is_empty() {
            doc.push_str("No visualizations were produced.\n");
        }
        for (label, files) in [
            ("Static", &request.visualizations.static_files),
            ("Interactive", &request.visualizations.interactive),
        ] {
            if files.is_empty() {
                continue;
            }
            doc.push_str(&format!("### {} Visualizations\n\n", label));
            for file in files {
                let name = file.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
                doc.push_str(&format!("- [{}]({})\n", name, file.display()));
            }
            doc.push('\n');
        }

        doc
    }
}

/// One line per artifact present
fn summary(analysis: &DatasetAnalysis) -> Vec<String> {
    let mut lines = vec![];
    if analysis.descriptive.is_some() {
        lines.push("Statistical analysis: key metrics computed for every numeric variable.".to_string());
    }
    if analysis.correlation.is_some() {
        lines.push("Correlation analysis: relationships between variables examined.".to_string());
    }
    if let Some(regression) = &analysis.regression {
        lines.push(format!(
            "Regression analysis: the model reaches an R-squared of {:.2}.",
            regression.r_squared
        ));
    }
    if let Some(clustering) = &analysis.clustering {
        lines.push(format!(
            "Clustering analysis: the data splits into {} distinct groups.",
            clustering.cluster_centers.len()
        ));
    }
    lines
}

fn technical_details(doc: &mut String, analysis: &DatasetAnalysis) {
    if let Some(descriptive) = &analysis.descriptive {
        doc.push_str("## Descriptive Statistics\n\n");
        for (column, stats) in descriptive {
            doc.push_str(&format!("### Variable: {}\n\n", column));
            doc.push_str("| Statistic | Value |\n|---|---|\n");
            for (stat, value) in stats {
                doc.push_str(&format!("| {} | {:.4} |\n", stat, value));
            }
            doc.push('\n');
        }
    }

    if let Some(regression) = &analysis.regression {
        doc.push_str("## Regression Analysis\n\n");
        doc.push_str(&format!("R-squared: {:.4}  \n", regression.r_squared));
        doc.push_str(&format!("Intercept: {:.4}\n\n", regression.intercept));
        doc.push_str("### Coefficients\n\n");
        for (feature, coef) in &regression.coefficients {
            doc.push_str(&format!("- {}: {:.4}\n", feature, coef));
        }
        doc.push('\n');
    }

    if let Some(clustering) = &analysis.clustering {
        doc.push_str("## Clustering Analysis\n\n");
        doc.push_str(&format!("Inertia: {:.4}\n\n", clustering.inertia));
        for (i, (name, center)) in clustering.cluster_centers.iter().enumerate() {
            let size = clustering.clusters.iter().filter(|label| **label == i).count();
            let coords: Vec<String> = center.iter().map(|(f, v)| format!("{} = {:.4}", f, v)).collect();
            doc.push_str(&format!("- {} ({} rows): {}\n", name, size, coords.join(", ")));
        }
        doc.push('\n');
    }
}

fn business_insights(doc: &mut String, analysis: &DatasetAnalysis) {
    doc.push_str("## Key Insights\n\n");

    let Some(correlations) = &analysis.correlation else {
        doc.push_str("No correlation results are available.\n\n");
        return;
    };

    let mut strong = vec![];
    for (a, row) in correlations {
        for (b, r) in row {
            if a < b && r.abs() > STRONG_CORRELATION {
                let sign = if *r > 0.0 { "positive" } else { "negative" };
                strong.push(format!(
                    "- Strong {} relationship between {} and {} (correlation: {:.2})",
                    sign, a, b, r
                ));
            }
        }
    }

    if strong.is_empty() {
        doc.push_str("No strong relationships between variables were found.\n\n");
        return;
    }
    doc.push_str("Key relationships:\n\n");
    for line in strong {
        doc.push_str(&line);
        doc.push('\n');
    }
    doc.push('\n');
}

/// Create `<stem>.md`, or `<stem>_<n>.md` for the first free `n`
fn create_unique(dir: &Path, stem: &str) -> Result<(PathBuf, fs::File), ReportError> {
    let mut n = 0;
    loop {
        let name = if n == 0 { format!("{}.md", stem) } else { format!("{}_{}.md", stem, n) };
        let path = dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => n += 1,
            Err(source) => return Err(ReportError::Io { path, source }),
        }
    }
}

impl Reporter for MarkdownReporter {
    fn report(&self, request: &ReportRequest<'_>) -> Result<PathBuf, ReportError> {
        fs::create_dir_all(&self.reports_dir).map_err(|source| ReportError::Io {
            path: self.reports_dir.clone(),
            source,
        })?;

        let now = Local::now();
        let stem = format!("analysis_report_{}_{}", request.kind, now.format("%Y%m%d_%H%M%S"));
        let (path, mut file) = create_unique(&self.reports_dir, &stem)?;

        let body = self.render(request, now);
        file.write_all(body.as_bytes())
            .map_err(|source| ReportError::Io { path: path.clone(), source })?;

        tracing::debug!("{}: {} report written to {}", request.dataset, request.kind, path.display());
        Ok(path)
    }
}
