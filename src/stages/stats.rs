//! Numeric routines behind the default analyzer and loader.
//!
//! Moment statistics follow the bias-corrected definitions used by common
//! dataframe libraries (sample standard deviation, adjusted Fisher-Pearson
//! skewness, excess kurtosis). Undefined statistics return `None`.

use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Arithmetic mean. Falls back to summing `x / n` when the plain sum
/// overflows.
pub fn mean(xs: &[f64]) -> Option<f64> {
    if xs.is_empty() {
        return None;
    }
    let n = xs.len() as f64;
    let plain = xs.iter().sum::<f64>() / n;
    if plain.is_finite() {
        return Some(plain);
    }
    Some(xs.iter().map(|x| x / n).sum())
}

/// Linear-interpolated quantile, `q` in [0, 1]
pub fn quantile(xs: &[f64], q: f64) -> Option<f64> {
    if xs.is_empty() {
        return None;
    }
    let mut sorted = xs.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

pub fn median(xs: &[f64]) -> Option<f64> {
    quantile(xs, 0.5)
}

pub fn min(xs: &[f64]) -> Option<f64> {
    xs.iter().copied().reduce(f64::min)
}

pub fn max(xs: &[f64]) -> Option<f64> {
    xs.iter().copied().reduce(f64::max)
}

/// Deviations from `mean` divided by the largest absolute deviation, and
/// that divisor. Powers of the scaled deviations stay within [-1, 1].
fn scaled_deviations(xs: &[f64], mean: f64) -> (Vec<f64>, f64) {
    let scale = xs.iter().map(|x| (x - mean).abs()).fold(0.0, f64::max);
    if scale == 0.0 {
        return (vec![0.0; xs.len()], 0.0);
    }
    (xs.iter().map(|x| (x - mean) / scale).collect(), scale)
}

/// Central moment of order `k` of scaled deviations, population normalization
fn moment(devs: &[f64], k: i32) -> f64 {
    devs.iter().map(|d| d.powi(k)).sum::<f64>() / devs.len() as f64
}

/// Sample standard deviation (n - 1 denominator)
pub fn std_dev(xs: &[f64]) -> Option<f64> {
    let n = xs.len();
    if n < 2 {
        return None;
    }
    let (devs, scale) = scaled_deviations(xs, mean(xs)?);
    let ss: f64 = devs.iter().map(|d| d * d).sum();
    Some(scale * (ss / (n - 1) as f64).sqrt())
}

/// Population standard deviation (n denominator)
pub fn population_std(xs: &[f64]) -> Option<f64> {
    let (devs, scale) = scaled_deviations(xs, mean(xs)?);
    Some(scale * moment(&devs, 2).sqrt())
}

/// Adjusted Fisher-Pearson skewness
pub fn skewness(xs: &[f64]) -> Option<f64> {
    let n = xs.len() as f64;
    if xs.len() < 3 {
        return None;
    }
    let (devs, _) = scaled_deviations(xs, mean(xs)?);
    let m2 = moment(&devs, 2);
    if m2 == 0.0 {
        return Some(0.0);
    }
    let g1 = moment(&devs, 3) / m2.powf(1.5);
    Some((n * (n - 1.0)).sqrt() / (n - 2.0) * g1)
}

/// Bias-corrected excess kurtosis
pub fn kurtosis(xs: &[f64]) -> Option<f64> {
    let n = xs.len() as f64;
    if xs.len() < 4 {
        return None;
    }
    let (devs, _) = scaled_deviations(xs, mean(xs)?);
    let m2 = moment(&devs, 2);
    if m2 == 0.0 {
        return Some(0.0);
    }
    let g2 = moment(&devs, 4) / (m2 * m2) - 3.0;
    Some(((n + 1.0) * g2 + 6.0) * (n - 1.0) / ((n - 2.0) * (n - 3.0)))
}

/// Pearson correlation. Zero-variance or non-finite input yields 0.
pub fn pearson(xs: &[f64], ys: &[f64]) -> f64 {
    let (Some(mx), Some(my)) = (mean(xs), mean(ys)) else {
        return 0.0;
    };
    let (dx, _) = scaled_deviations(xs, mx);
    let (dy, _) = scaled_deviations(ys, my);

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (x, y) in dx.iter().zip(&dy) {
        sxy += x * y;
        sxx += x * x;
        syy += y * y;
    }
    if sxx == 0.0 || syy == 0.0 {
        return 0.0;
    }
    let r = sxy / (sxx * syy).sqrt();
    if r.is_finite() {
        r.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

/// Interquartile-range outlier indices (1.5 x IQR fences)
pub fn iqr_outliers(xs: &[f64]) -> Vec<usize> {
    let (Some(q1), Some(q3)) = (quantile(xs, 0.25), quantile(xs, 0.75)) else {
        return vec![];
    };
    let iqr = q3 - q1;
    let (lo, hi) = (q1 - 1.5 * iqr, q3 + 1.5 * iqr);
    xs.iter()
        .enumerate()
        .filter(|(_, x)| **x < lo || **x > hi)
        .map(|(i, _)| i)
        .collect()
}

/// Ordinary least squares with intercept.
#[derive(Debug, Clone, PartialEq)]
pub struct OlsFit {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
    pub r_squared: f64,
}

/// Singular values below this fraction of the largest count as zero
const RANK_TOLERANCE: f64 = 1e-10;

/// Fit `y ~ 1 + x` where `x` is one row of features per observation.
/// Returns `None` for a rank-deficient design or a non-finite fit.
pub fn ols(x: &[Vec<f64>], y: &[f64]) -> Option<OlsFit> {
    let n = y.len();
    let p = x.first().map(Vec::len)? + 1;
    if x.len() != n || n < p {
        return None;
    }

    let design = DMatrix::from_fn(n, p, |i, j| if j == 0 { 1.0 } else { x[i][j - 1] });
    let target = DVector::from_column_slice(y);

    let svd = design.clone().svd(true, true);
    let eps = svd.singular_values.max() * RANK_TOLERANCE;
    if eps.is_nan() || eps <= 0.0 || svd.rank(eps) < p {
        return None;
    }
    let beta = svd.solve(&target, eps).ok()?;

    let residuals = &target - &design * &beta;
    let ss_res = residuals.norm_squared();
    let y_mean = mean(y)?;
    let ss_tot: f64 = y.iter().map(|v| (v - y_mean).powi(2)).sum();
    let r_squared = if ss_tot == 0.0 {
        if ss_res < 1e-12 { 1.0 } else { 0.0 }
    } else {
        (1.0 - ss_res / ss_tot).clamp(0.0, 1.0)
    };

    if !r_squared.is_finite() || beta.iter().any(|b| !b.is_finite()) {
        return None;
    }

    Some(OlsFit {
        intercept: beta[0],
        coefficients: beta.iter().skip(1).copied().collect(),
        r_squared,
    })
}

/// Column-wise z-score scaling. Returns scaled rows plus (mean, scale) per
/// column; zero-variance columns get scale 1.
pub fn standardize(rows: &[Vec<f64>]) -> (Vec<Vec<f64>>, Vec<(f64, f64)>) {
    let dims = rows.first().map(Vec::len).unwrap_or(0);
    let params: Vec<(f64, f64)> = (0..dims)
        .map(|d| {
            let col: Vec<f64> = rows.iter().map(|r| r[d]).collect();
            let m = mean(&col).unwrap_or(0.0);
            let s = population_std(&col).filter(|s| *s > 0.0).unwrap_or(1.0);
            (m, s)
        })
        .collect();

    let scaled = rows
        .iter()
        .map(|r| r.iter().zip(&params).map(|(x, (m, s))| (x - m) / s).collect())
        .collect();

    (scaled, params)
}

fn sq_dist(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

#[derive(Debug, Clone, PartialEq)]
pub struct KMeansFit {
    pub labels: Vec<usize>,
    pub centers: Vec<Vec<f64>>,
    pub inertia: f64,
}

/// Parameters for [`kmeans`]
#[derive(Debug, Clone, Copy)]
pub struct KMeansParams {
    pub k: usize,
    pub seed: u64,
    pub n_init: usize,
    pub max_iter: usize,
}

impl Default for KMeansParams {
    fn default() -> Self {
        Self { k: 3, seed: 42, n_init: 10, max_iter: 300 }
    }
}

/// Lloyd's k-means with k-means++ seeding. The best of `n_init` runs (by
/// inertia) is returned. `k` is capped at the number of points.
pub fn kmeans(points: &[Vec<f64>], params: KMeansParams) -> Option<KMeansFit> {
    if points.is_empty() || params.k == 0 {
        return None;
    }
    let k = params.k.min(points.len());
    let mut rng = StdRng::seed_from_u64(params.seed);

    (0..params.n_init.max(1))
        .map(|_| {
            let centers = kmeans_plus_plus(points, k, &mut rng);
            lloyd(points, centers, params.max_iter)
        })
        .min_by(|a, b| a.inertia.total_cmp(&b.inertia))
}

fn kmeans_plus_plus(points: &[Vec<f64>], k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let mut centers = vec![points[rng.gen_range(0..points.len())].clone()];

    while centers.len() < k {
        let dists: Vec<f64> = points
            .iter()
            .map(|p| centers.iter().map(|c| sq_dist(p, c)).fold(f64::INFINITY, f64::min))
            .collect();
        let total: f64 = dists.iter().sum();

        let next = if total <= 0.0 {
            // Every point already sits on a center
            rng.gen_range(0..points.len())
        } else {
            let mut target = rng.gen::<f64>() * total;
            let mut chosen = points.len() - 1;
            for (i, d) in dists.iter().enumerate() {
                if target < *d {
                    chosen = i;
                    break;
                }
                target -= d;
            }
            chosen
        };
        centers.push(points[next].clone());
    }
    centers
}

fn lloyd(points: &[Vec<f64>], mut centers: Vec<Vec<f64>>, max_iter: usize) -> KMeansFit {
    let dims = points[0].len();
    let mut labels = vec![0; points.len()];

    for _ in 0..max_iter.max(1) {
        let mut changed = false;
        for (i, p) in points.iter().enumerate() {
            let best = nearest(p, &centers);
            if labels[i] != best {
                labels[i] = best;
                changed = true;
            }
        }

        let mut sums = vec![vec![0.0; dims]; centers.len()];
        let mut counts = vec![0usize; centers.len()];
        for (p, &label) in points.iter().zip(&labels) {
            counts[label] += 1;
            for d in 0..dims {
                sums[label][d] += p[d];
            }
        }
        for (c, (sum, count)) in centers.iter_mut().zip(sums.into_iter().zip(counts)) {
            // Empty clusters keep their previous center
            if count > 0 {
                *c = sum.into_iter().map(|s| s / count as f64).collect();
            }
        }

        if !changed {
            break;
        }
    }

    // Final assignment against the final centers
    for (i, p) in points.iter().enumerate() {
        labels[i] = nearest(p, &centers);
    }
    let inertia = points
        .iter()
        .zip(&labels)
        .map(|(p, &l)| sq_dist(p, &centers[l]))
        .sum();

    KMeansFit { labels, centers, inertia }
}

fn nearest(point: &[f64], centers: &[Vec<f64>]) -> usize {
    centers
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| sq_dist(point, a).total_cmp(&sq_dist(point, b)))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_moments() {
        let xs = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!(close(mean(&xs).unwrap(), 5.0));
        assert!(close(median(&xs).unwrap(), 4.5));
        assert!(close(population_std(&xs).unwrap(), 2.0));
        assert!(close(std_dev(&xs).unwrap(), (32.0f64 / 7.0).sqrt()));
        assert_eq!(min(&xs), Some(2.0));
        assert_eq!(max(&xs), Some(9.0));
    }

    #[test]
    fn test_small_samples_have_undefined_moments() {
        assert_eq!(std_dev(&[1.0]), None);
        assert_eq!(skewness(&[1.0, 2.0]), None);
        assert_eq!(kurtosis(&[1.0, 2.0, 3.0]), None);
        assert_eq!(mean(&[]), None);
    }

    #[test]
    fn test_symmetric_data_has_zero_skew() {
        let xs = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert!(close(skewness(&xs).unwrap(), 0.0));
        // Uniform-like sample: excess kurtosis of 1..5 is -1.2
        assert!(close(kurtosis(&xs).unwrap(), -1.2));
    }

    #[test]
    fn test_pearson() {
        let xs = [1.0, 2.0, 3.0, 4.0];
        assert!(close(pearson(&xs, &[2.0, 4.0, 6.0, 8.0]), 1.0));
        assert!(close(pearson(&xs, &[8.0, 6.0, 4.0, 2.0]), -1.0));
        assert_eq!(pearson(&xs, &[3.0, 3.0, 3.0, 3.0]), 0.0);
    }

    #[test]
    fn test_iqr_outliers() {
        let xs = [10.0, 11.0, 12.0, 11.0, 10.0, 95.0];
        assert_eq!(iqr_outliers(&xs), vec![5]);
    }

    #[test]
    fn test_ols_recovers_exact_line() {
        let x: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64, (i * i) as f64]).collect();
        let y: Vec<f64> = x.iter().map(|r| 3.0 + 2.0 * r[0] - 0.5 * r[1]).collect();

        let fit = ols(&x, &y).unwrap();
        assert!((fit.intercept - 3.0).abs() < 1e-6);
        assert!((fit.coefficients[0] - 2.0).abs() < 1e-6);
        assert!((fit.coefficients[1] + 0.5).abs() < 1e-6);
        assert!(close(fit.r_squared, 1.0));
    }

    #[test]
    fn test_ols_singular_design() {
        let x: Vec<Vec<f64>> = (0..5).map(|i| vec![i as f64, 2.0 * i as f64]).collect();
        let y: Vec<f64> = (0..5).map(|i| i as f64).collect();
        assert!(ols(&x, &y).is_none());
    }

    #[test]
    fn test_large_magnitudes_stay_finite() {
        let xs: Vec<f64> = (0..10).map(|i| i as f64 * 1e80).collect();
        let ys: Vec<f64> = xs.iter().map(|x| 3.0 * x + 1e80).collect();

        let sd = std_dev(&xs).unwrap();
        assert!((sd / 1e80 - std_dev(&(0..10).map(f64::from).collect::<Vec<_>>()).unwrap()).abs() < 1e-9);
        assert!(skewness(&xs).unwrap().abs() < 1e-9);
        assert!(close(kurtosis(&xs).unwrap(), -1.2));
        assert!(close(pearson(&xs, &ys), 1.0));

        let huge = [1e300, -1e300, 1e300, -1e300, 5e299];
        assert!(kurtosis(&huge).unwrap().is_finite());
        assert!(population_std(&huge).unwrap().is_finite());
    }

    #[test]
    fn test_kmeans_separates_blobs() {
        let mut points = vec![];
        for i in 0..10 {
            let jitter = i as f64 * 0.01;
            points.push(vec![0.0 + jitter, 0.0]);
            points.push(vec![10.0 + jitter, 10.0]);
        }

        let fit = kmeans(&points, KMeansParams { k: 2, ..Default::default() }).unwrap();
        assert_eq!(fit.labels.len(), 20);
        assert_ne!(fit.labels[0], fit.labels[1]);
        assert!(fit.labels.iter().step_by(2).all(|l| *l == fit.labels[0]));
        assert!(fit.inertia < 1.0);
    }

    #[test]
    fn test_kmeans_is_deterministic_and_caps_k() {
        let points = vec![vec![1.0], vec![2.0]];
        let a = kmeans(&points, KMeansParams::default()).unwrap();
        let b = kmeans(&points, KMeansParams::default()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.centers.len(), 2);
        assert!(close(a.inertia, 0.0));
    }
}
