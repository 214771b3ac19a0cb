use super::stats::{self, KMeansParams};
use super::types::{
    AnalysisArtifact, AnalysisKind, ClusteringFit, CorrelationMatrix, DatasetAnalysis,
    DescriptiveStats, RegressionFit,
};
use super::{AnalysisRequest, Analyzer};
use crate::error::AnalysisError;
use crate::table::Table;

/// Seed for k-means++ initialisation
const KMEANS_SEED: u64 = 42;

/// In-process statistics analyzer
#[derive(Debug, Clone)]
pub struct StatsAnalyzer {
    pub n_clusters: usize,
}

impl StatsAnalyzer {
    pub fn new(n_clusters: usize) -> Self {
        Self { n_clusters }
    }

    fn descriptive(&self, features: &[(String, Vec<f64>)]) -> DescriptiveStats {
        features
            .iter()
            .map(|(name, xs)| {
                let entries = [
                    ("mean", stats::mean(xs)),
                    ("median", stats::median(xs)),
                    ("std", stats::std_dev(xs)),
                    ("min", stats::min(xs)),
                    ("max", stats::max(xs)),
                    ("skewness", stats::skewness(xs)),
                    ("kurtosis", stats::kurtosis(xs)),
                ];
                // Undefined or overflowed statistics are left out
                let column = entries
                    .into_iter()
                    .filter_map(|(stat, v)| v.filter(|v| v.is_finite()).map(|v| (stat.to_string(), v)))
                    .collect();
                (name.clone(), column)
            })
            .collect()
    }

    fn correlation(&self, features: &[(String, Vec<f64>)]) -> CorrelationMatrix {
        features
            .iter()
            .map(|(a, xs)| {
                let row = features
                    .iter()
                    .map(|(b, ys)| {
                        let r = if a == b { 1.0 } else { stats::pearson(xs, ys) };
                        (b.clone(), r)
                    })
                    .collect();
                (a.clone(), row)
            })
            .collect()
    }

    fn regression(
        &self,
        features: &[(String, Vec<f64>)],
        target: &(String, Vec<f64>),
    ) -> Result<RegressionFit, AnalysisError> {
        let predictors: Vec<&(String, Vec<f64>)> =
            features.iter().filter(|(name, _)| *name != target.0).collect();
        if predictors.is_empty() {
            return Err(AnalysisError::Numerical {
                kind: "regression",
                reason: "no predictor columns besides the target".to_string(),
            });
        }

        let n = target.1.len();
        let required = predictors.len() + 1;
        if n < required {
            return Err(AnalysisError::InsufficientRows { kind: "regression", required, actual: n });
        }

        let rows: Vec<Vec<f64>> = (0..n)
            .map(|i| predictors.iter().map(|(_, xs)| xs[i]).collect())
            .collect();

        let fit = stats::ols(&rows, &target.1).ok_or_else(|| AnalysisError::Numerical {
            kind: "regression",
            reason: "singular or ill-conditioned design matrix".to_string(),
        })?;

        Ok(RegressionFit {
            coefficients: predictors
                .iter()
                .map(|(name, _)| name.clone())
                .zip(fit.coefficients)
                .collect(),
            intercept: fit.intercept,
            r_squared: fit.r_squared,
        })
    }

    fn clustering(&self, features: &[(String, Vec<f64>)]) -> Result<ClusteringFit, AnalysisError> {
        let n = features.first().map(|(_, xs)| xs.len()).unwrap_or(0);
        if n == 0 {
            return Err(AnalysisError::InsufficientRows { kind: "clustering", required: 1, actual: 0 });
        }

        let rows: Vec<Vec<f64>> = (0..n)
            .map(|i| features.iter().map(|(_, xs)| xs[i]).collect())
            .collect();
        let (scaled, params) = stats::standardize(&rows);

        let fit = stats::kmeans(
            &scaled,
            KMeansParams {
                k: self.n_clusters.max(1),
                seed: KMEANS_SEED,
                ..Default::default()
            },
        )
        .ok_or_else(|| AnalysisError::Numerical {
            kind: "clustering",
            reason: "k-means produced no clusters".to_string(),
        })?;

        // Centers back in original units
        let cluster_centers = fit
            .centers
            .iter()
            .enumerate()
            .map(|(i, center)| {
                let coords = features
                    .iter()
                    .zip(center.iter().zip(&params))
                    .map(|((name, _), (z, (mean, scale)))| (name.clone(), z * scale + mean))
                    .collect();
                (format!("cluster_{}", i), coords)
            })
            .collect();

        Ok(ClusteringFit {
            clusters: fit.labels,
            cluster_centers,
            inertia: fit.inertia,
        })
    }
}

impl Default for StatsAnalyzer {
    fn default() -> Self {
        Self::new(3)
    }
}

/// Numeric values of a column with no missing cells
fn numeric_column(table: &Table, name: &str) -> Result<Vec<f64>, AnalysisError> {
    let column = table
        .column(name)
        .ok_or_else(|| AnalysisError::MissingColumn(name.to_string()))?;
    if !column.is_numeric() {
        return Err(AnalysisError::NonNumeric(name.to_string()));
    }
    column
        .f64_values()
        .into_iter()
        .collect::<Option<Vec<f64>>>()
        .ok_or_else(|| AnalysisError::MissingValues(name.to_string()))
}

impl Analyzer for StatsAnalyzer {
    fn analyze(&self, request: &AnalysisRequest<'_>) -> Result<DatasetAnalysis, AnalysisError> {
        let features = request
            .features
            .iter()
            .map(|name| numeric_column(request.table, name).map(|xs| (name.clone(), xs)))
            .collect::<Result<Vec<_>, _>>()?;

        let mut analysis = DatasetAnalysis::default();
        for kind in &request.kinds {
            if kind.requires_numeric() && features.is_empty() {
                return Err(AnalysisError::Numerical {
                    kind: kind.as_str(),
                    reason: "no numeric feature columns".to_string(),
                });
            }

            let artifact = match kind {
                AnalysisKind::Descriptive => AnalysisArtifact::Descriptive(self.descriptive(&features)),
                AnalysisKind::Correlation => AnalysisArtifact::Correlation(self.correlation(&features)),
                AnalysisKind::Regression => {
                    let target = request
                        .target
                        .ok_or_else(|| AnalysisError::MissingColumn("<target>".to_string()))?;
                    let values = numeric_column(request.table, target)?;
                    AnalysisArtifact::Regression(self.regression(&features, &(target.to_string(), values))?)
                }
                AnalysisKind::Clustering => AnalysisArtifact::Clustering(self.clustering(&features)?),
            };

            tracing::debug!("{}: {} analysis done", request.dataset, kind);
            analysis.insert(artifact);
        }

        Ok(analysis)
    }
}
