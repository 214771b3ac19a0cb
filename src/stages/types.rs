//! Result types produced by the stage collaborators

use std::fmt;
use std::path::PathBuf;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// column -> statistic -> value
pub type DescriptiveStats = IndexMap<String, IndexMap<String, f64>>;

/// column -> column -> Pearson coefficient
pub type CorrelationMatrix = IndexMap<String, IndexMap<String, f64>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    Descriptive,
    Correlation,
    Regression,
    Clustering,
}

impl AnalysisKind {
    pub const ALL: [AnalysisKind; 4] = [
        AnalysisKind::Descriptive,
        AnalysisKind::Correlation,
        AnalysisKind::Regression,
        AnalysisKind::Clustering,
    ];

    /// Kinds that need at least one numeric feature column
    pub fn requires_numeric(&self) -> bool {
        !matches!(self, AnalysisKind::Descriptive)
    }

    /// Key under which the artifact is stored in a dataset's results
    pub fn result_key(&self) -> &'static str {
        match self {
            AnalysisKind::Descriptive => "descriptive_statistics",
            AnalysisKind::Correlation => "correlation_analysis",
            AnalysisKind::Regression => "regression_analysis",
            AnalysisKind::Clustering => "clustering_analysis",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisKind::Descriptive => "descriptive",
            AnalysisKind::Correlation => "correlation",
            AnalysisKind::Regression => "regression",
            AnalysisKind::Clustering => "clustering",
        }
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionFit {
    pub coefficients: IndexMap<String, f64>,
    pub intercept: f64,
    /// In-sample coefficient of determination
    pub r_squared: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringFit {
    /// Cluster label per row
    pub clusters: Vec<usize>,
    /// "cluster_<i>" -> feature -> center coordinate
    pub cluster_centers: IndexMap<String, IndexMap<String, f64>>,
    pub inertia: f64,
}

/// One analysis result, tagged by kind
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisArtifact {
    Descriptive(DescriptiveStats),
    Correlation(CorrelationMatrix),
    Regression(RegressionFit),
    Clustering(ClusteringFit),
}

/// All analysis artifacts for one dataset. Persisted as a mapping from
/// result key (e.g. `correlation_analysis`) to artifact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetAnalysis {
    #[serde(rename = "descriptive_statistics", default, skip_serializing_if = "Option::is_none")]
    pub descriptive: Option<DescriptiveStats>,

    #[serde(rename = "correlation_analysis", default, skip_serializing_if = "Option::is_none")]
    pub correlation: Option<CorrelationMatrix>,

    #[serde(rename = "regression_analysis", default, skip_serializing_if = "Option::is_none")]
    pub regression: Option<RegressionFit>,

    #[serde(rename = "clustering_analysis", default, skip_serializing_if = "Option::is_none")]
    pub clustering: Option<ClusteringFit>,
}

impl DatasetAnalysis {
    pub fn insert(&mut self, artifact: AnalysisArtifact) {
        match artifact {
            AnalysisArtifact::Descriptive(a) => self.descriptive = Some(a),
            AnalysisArtifact::Correlation(a) => self.correlation = Some(a),
            AnalysisArtifact::Regression(a) => self.regression = Some(a),
            AnalysisArtifact::Clustering(a) => self.clustering = Some(a),
        }
    }

    /// Kinds present, in canonical order
    pub fn kinds(&self) -> Vec<AnalysisKind> {
        AnalysisKind::ALL
            .into_iter()
            .filter(|kind| match kind {
                AnalysisKind::Descriptive => self.descriptive.is_some(),
                AnalysisKind::Correlation => self.correlation.is_some(),
                AnalysisKind::Regression => self.regression.is_some(),
                AnalysisKind::Clustering => self.clustering.is_some(),
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds().is_empty()
    }

    /// Dotted path of the first NaN or infinite number, e.g.
    /// `descriptive_statistics.x.kurtosis`. Such values have no JSON form.
    pub fn first_non_finite(&self) -> Option<String> {
        fn nested(prefix: &str, map: &IndexMap<String, IndexMap<String, f64>>) -> Option<String> {
            map.iter().find_map(|(outer, row)| {
                row.iter()
                    .find(|(_, v)| !v.is_finite())
                    .map(|(inner, _)| format!("{}.{}.{}", prefix, outer, inner))
            })
        }

        if let Some(path) = self.descriptive.as_ref().and_then(|d| nested("descriptive_statistics", d)) {
            return Some(path);
        }
        if let Some(path) = self.correlation.as_ref().and_then(|c| nested("correlation_analysis", c)) {
            return Some(path);
        }
        if let Some(fit) = &self.regression {
            let scalars = [("intercept", fit.intercept), ("r_squared", fit.r_squared)];
            if let Some((name, _)) = scalars.iter().find(|(_, v)| !v.is_finite()) {
                return Some(format!("regression_analysis.{}", name));
            }
            if let Some((name, _)) = fit.coefficients.iter().find(|(_, v)| !v.is_finite()) {
                return Some(format!("regression_analysis.coefficients.{}", name));
            }
        }
        if let Some(fit) = &self.clustering {
            if !fit.inertia.is_finite() {
                return Some("clustering_analysis.inertia".to_string());
            }
            return nested("clustering_analysis.cluster_centers", &fit.cluster_centers);
        }
        None
    }
}

impl FromIterator<AnalysisArtifact> for DatasetAnalysis {
    fn from_iter<I: IntoIterator<Item = AnalysisArtifact>>(iter: I) -> Self {
        let mut analysis = Self::default();
        for artifact in iter {
            analysis.insert(artifact);
        }
        analysis
    }
}

/// Plot files written for one dataset
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualizationFiles {
    #[serde(rename = "static", default)]
    pub static_files: Vec<PathBuf>,
    #[serde(default)]
    pub interactive: Vec<PathBuf>,
}

impl VisualizationFiles {
    pub fn is_empty(&self) -> bool {
        self.static_files.is_empty() && self.interactive.is_empty()
    }

    pub fn all(&self) -> impl Iterator<Item = &PathBuf> {
        self.static_files.iter().chain(self.interactive.iter())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    Technical,
    Business,
}

impl ReportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::Technical => "technical",
            ReportKind::Business => "business",
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dataset_analysis_keys() {
        let mut stats = IndexMap::new();
        stats.insert("x".to_string(), IndexMap::from([("mean".to_string(), 2.0)]));

        let analysis: DatasetAnalysis = vec![
            AnalysisArtifact::Descriptive(stats),
            AnalysisArtifact::Regression(RegressionFit {
                coefficients: IndexMap::from([("x".to_string(), 0.5)]),
                intercept: 1.0,
                r_squared: 0.9,
            }),
        ]
        .into_iter()
        .collect();

        assert_eq!(analysis.kinds(), vec![AnalysisKind::Descriptive, AnalysisKind::Regression]);
        let value = serde_json::to_value(&analysis).unwrap();
        assert_eq!(value["descriptive_statistics"]["x"]["mean"], json!(2.0));
        assert_eq!(value["regression_analysis"]["r_squared"], json!(0.9));
        assert!(value.get("clustering_analysis").is_none());

        let back: DatasetAnalysis = serde_json::from_value(value).unwrap();
        assert_eq!(back, analysis);
    }

    #[test]
    fn test_first_non_finite() {
        let mut analysis = DatasetAnalysis {
            descriptive: Some(IndexMap::from([(
                "x".to_string(),
                IndexMap::from([("mean".to_string(), 1.0), ("kurtosis".to_string(), f64::NAN)]),
            )])),
            ..Default::default()
        };
        assert_eq!(analysis.first_non_finite().as_deref(), Some("descriptive_statistics.x.kurtosis"));

        analysis.descriptive = None;
        analysis.regression = Some(RegressionFit {
            coefficients: IndexMap::from([("x".to_string(), f64::INFINITY)]),
            intercept: 0.0,
            r_squared: 0.5,
        });
        assert_eq!(analysis.first_non_finite().as_deref(), Some("regression_analysis.coefficients.x"));

        assert_eq!(DatasetAnalysis::default().first_non_finite(), None);
    }

    #[test]
    fn test_empty_analysis_is_empty_object() {
        let analysis = DatasetAnalysis::default();
        assert!(analysis.is_empty());
        assert_eq!(serde_json::to_value(&analysis).unwrap(), json!({}));
    }

    #[test]
    fn test_visualization_files_shape() {
        let files = VisualizationFiles {
            static_files: vec![PathBuf::from("a.svg")],
            interactive: vec![],
        };
        assert_eq!(
            serde_json::to_value(&files).unwrap(),
            json!({"static": ["a.svg"], "interactive": []})
        );
    }
}
