//! Seeded k-means with k-means++ initialisation and restarts.

use crate::error::{Error, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KMeansParams {
    pub n_clusters: usize,
    /// Independent initialisations; the lowest inertia wins
    pub n_init: usize,
    pub max_iter: usize,
    /// Convergence tolerance, relative to the mean per-feature variance
    pub tol: f64,
    pub seed: u64,
}

impl KMeansParams {
    pub fn new(n_clusters: usize) -> Self {
        Self {
            n_clusters,
            n_init: 10,
            max_iter: 300,
            tol: 1e-4,
            seed: 42,
        }
    }
}

/// A fitted clustering over fixed-dimension vectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KMeansModel {
    pub centroids: Vec<Vec<f32>>,
    /// Cluster id per training vector
    pub labels: Vec<usize>,
    pub n_clusters: usize,
    /// Sum of squared distances to the assigned centroids
    pub inertia: f64,
}

impl KMeansModel {
    pub fn dimension(&self) -> usize {
        self.centroids.first().map(Vec::len).unwrap_or(0)
    }

    /// Nearest-centroid id for each vector.
    pub fn predict(&self, data: &[Vec<f32>]) -> Result<Vec<usize>> {
        let dim = self.dimension();
        if let Some(bad) = data.iter().find(|v| v.len() != dim) {
            return Err(Error::Clustering(format!(
                "vector dimension {} does not match model dimension {dim}",
                bad.len()
            )));
        }
        let centroids = to_f64(&self.centroids);
        Ok(data
            .iter()
            .map(|v| nearest(&to_f64_row(v), &centroids).0)
            .collect())
    }
}

/// Fit `params.n_clusters` clusters to `data`.
pub fn fit(data: &[Vec<f32>], params: &KMeansParams) -> Result<KMeansModel> {
    let n = data.len();
    let k = params.n_clusters;
    if n == 0 {
        return Err(Error::Clustering("no vectors to cluster".to_string()));
    }
    if k == 0 || k > n {
        return Err(Error::Clustering(format!(
            "cannot form {k} clusters from {n} vectors"
        )));
    }
    let dim = data[0].len();
    if dim == 0 || data.iter().any(|v| v.len() != dim) {
        return Err(Error::Clustering(
            "vectors must share a non-zero dimension".to_string(),
        ));
    }

    let points = to_f64(data);
    let tol = params.tol * mean_variance(&points);
    let mut rng = StdRng::seed_from_u64(params.seed);

    let mut best: Option<Run> = None;
    for init in 0..params.n_init.max(1) {
        let run = lloyd(&points, init_plus_plus(&points, k, &mut rng), params.max_iter, tol);
        tracing::debug!(init, inertia = run.inertia, iterations = run.iterations, "k-means run");
        if best.as_ref().map_or(true, |b| run.inertia < b.inertia) {
            best = Some(run);
        }
    }

    let best = best.ok_or_else(|| Error::Clustering("k-means produced no run".to_string()))?;
    Ok(KMeansModel {
        centroids: best
            .centroids
            .iter()
            .map(|c| c.iter().map(|&x| x as f32).collect())
            .collect(),
        labels: best.labels,
        n_clusters: k,
        inertia: best.inertia,
    })
}

struct Run {
    centroids: Vec<Vec<f64>>,
    labels: Vec<usize>,
    inertia: f64,
    iterations: usize,
}

fn init_plus_plus(points: &[Vec<f64>], k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let n = points.len();
    let mut centroids = Vec::with_capacity(k);
    centroids.push(points[rng.gen_range(0..n)].clone());

    let mut closest: Vec<f64> = points.iter().map(|p| sq_dist(p, &centroids[0])).collect();
    while centroids.len() < k {
        let total: f64 = closest.iter().sum();
        let chosen = if total > 0.0 {
            let mut target = rng.gen::<f64>() * total;
            let mut idx = n - 1;
            for (i, d) in closest.iter().enumerate() {
                if target < *d {
                    idx = i;
                    break;
                }
                target -= d;
            }
            idx
        } else {
            rng.gen_range(0..n)
        };

        let centroid = points[chosen].clone();
        for (d, p) in closest.iter_mut().zip(points) {
            *d = d.min(sq_dist(p, &centroid));
        }
        centroids.push(centroid);
    }
    centroids
}

fn lloyd(points: &[Vec<f64>], mut centroids: Vec<Vec<f64>>, max_iter: usize, tol: f64) -> Run {
    let k = centroids.len();
    let dim = points[0].len();
    let mut labels = vec![usize::MAX; points.len()];
    let mut iterations = 0;

    for _ in 0..max_iter.max(1) {
        iterations += 1;
        let mut changed = false;
        for (label, p) in labels.iter_mut().zip(points) {
            let (nearest_id, _) = nearest(p, &centroids);
            if *label != nearest_id {
                *label = nearest_id;
                changed = true;
            }
        }

        let mut sums = vec![vec![0.0; dim]; k];
        let mut counts = vec![0usize; k];
        for (p, &label) in points.iter().zip(&labels) {
            counts[label] += 1;
            for (s, x) in sums[label].iter_mut().zip(p) {
                *s += x;
            }
        }

        let mut shift = 0.0;
        for c in 0..k {
            let updated = if counts[c] > 0 {
                sums[c].iter().map(|s| s / counts[c] as f64).collect()
            } else {
                // Re-seed an empty cluster at the point worst served by its centroid.
                let far = farthest_point(points, &labels, &centroids);
                points[far].clone()
            };
            shift += sq_dist(&centroids[c], &updated);
            centroids[c] = updated;
        }

        if !changed || shift <= tol {
            break;
        }
    }

    let mut inertia = 0.0;
    for (label, p) in labels.iter_mut().zip(points) {
        let (id, d) = nearest(p, &centroids);
        *label = id;
        inertia += d;
    }

    Run {
        centroids,
        labels,
        inertia,
        iterations,
    }
}

fn farthest_point(points: &[Vec<f64>], labels: &[usize], centroids: &[Vec<f64>]) -> usize {
    points
        .iter()
        .zip(labels)
        .map(|(p, &l)| sq_dist(p, &centroids[l]))
        .enumerate()
        .fold((0, f64::MIN), |best, (i, d)| if d > best.1 { (i, d) } else { best })
        .0
}

/// Index of, and squared distance to, the closest centroid (lowest index on ties).
fn nearest(point: &[f64], centroids: &[Vec<f64>]) -> (usize, f64) {
    centroids
        .iter()
        .map(|c| sq_dist(point, c))
        .enumerate()
        .fold((0, f64::INFINITY), |best, (i, d)| if d < best.1 { (i, d) } else { best })
}

fn sq_dist(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn mean_variance(points: &[Vec<f64>]) -> f64 {
    let n = points.len() as f64;
    let dim = points[0].len();
    let mut total = 0.0;
    for j in 0..dim {
        let mean = points.iter().map(|p| p[j]).sum::<f64>() / n;
        total += points.iter().map(|p| (p[j] - mean).powi(2)).sum::<f64>() / n;
    }
    total / dim as f64
}

fn to_f64(data: &[Vec<f32>]) -> Vec<Vec<f64>> {
    data.iter().map(|v| to_f64_row(v)).collect()
}

fn to_f64_row(v: &[f32]) -> Vec<f64> {
    v.iter().map(|&x| f64::from(x)).collect()
}
