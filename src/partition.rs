//! Initial partition policies.
//!
//! A partitioner either labels every point with a starting cluster or picks
//! the starting centroids directly. Which of the two it does is carried by the
//! returned [`InitialPartition`] variant, so the engine handles both without
//! the caller knowing which kind of partitioner it was given.

use crate::distance::{EuclideanDistance, Metric};
use crate::error::KMeansError;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Output of an [`InitialPartitioner`].
#[derive(Debug, Clone, PartialEq)]
pub enum InitialPartition {
    /// One cluster label per point, shape `(n_samples,)`.
    Assignments(Array1<usize>),
    /// Starting centroids, shape `(k, n_features)`.
    Centroids(Array2<f64>),
}

/// Produces the starting state of a clustering run.
pub trait InitialPartitioner {
    /// Partition `data` (one point per row) into `k` clusters.
    ///
    /// Only called with `k > 0`.
    fn partition(
        &mut self,
        data: &ArrayView2<f64>,
        k: usize,
    ) -> Result<InitialPartition, KMeansError>;
}

impl<P: InitialPartitioner + ?Sized> InitialPartitioner for &mut P {
    fn partition(
        &mut self,
        data: &ArrayView2<f64>,
        k: usize,
    ) -> Result<InitialPartition, KMeansError> {
        (**self).partition(data, k)
    }
}

/// Average the points assigned to each cluster.
///
/// Clusters without points keep an all-zero centroid. Every label must be
/// below `k`.
pub fn centroids_from_assignments(
    data: &ArrayView2<f64>,
    assignments: &ArrayView1<usize>,
    k: usize,
) -> Result<Array2<f64>, KMeansError> {
    let n_samples = data.nrows();
    if assignments.len() != n_samples {
        return Err(KMeansError::InvalidAssignmentLength {
            expected: n_samples,
            actual: assignments.len(),
        });
    }

    let mut centroids = Array2::zeros((k, data.ncols()));
    let mut counts = vec![0usize; k];

    for (point, (row, &cluster)) in data.outer_iter().zip(assignments.iter()).enumerate() {
        if cluster >= k {
            return Err(KMeansError::AssignmentOutOfRange { point, cluster, k });
        }
        let mut centroid = centroids.row_mut(cluster);
        centroid += &row;
        counts[cluster] += 1;
    }

    for (mut centroid, &count) in centroids.outer_iter_mut().zip(counts.iter()) {
        if count > 0 {
            centroid /= count as f64;
        }
    }

    Ok(centroids)
}

/// Assigns every point to a uniformly random cluster.
///
/// The generator is re-seeded on every call, so repeated runs start from the
/// same partition.
#[derive(Debug, Clone)]
pub struct RandomPartition {
    seed: u64,
}

impl RandomPartition {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }
}

impl Default for RandomPartition {
    fn default() -> Self {
        Self::new(0)
    }
}

impl InitialPartitioner for RandomPartition {
    fn partition(
        &mut self,
        data: &ArrayView2<f64>,
        k: usize,
    ) -> Result<InitialPartition, KMeansError> {
        if k == 0 {
            if data.nrows() > 0 {
                return Err(KMeansError::InvalidParameter(
                    "cannot partition points into zero clusters".to_string(),
                ));
            }
            return Ok(InitialPartition::Assignments(Array1::zeros(0)));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let labels = (0..data.nrows())
            .map(|_| rng.gen_range(0..k))
            .collect::<Array1<usize>>();
        Ok(InitialPartition::Assignments(labels))
    }
}

/// Uses `k` randomly chosen points as the starting centroids.
///
/// Points are drawn without replacement. When `k` exceeds the number of
/// points, every point is used once and the remaining centroids are drawn
/// with replacement; with no points at all the centroids are zero.
#[derive(Debug, Clone)]
pub struct SampleInitialization {
    seed: u64,
}

impl SampleInitialization {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }
}

impl Default for SampleInitialization {
    fn default() -> Self {
        Self::new(0)
    }
}

impl InitialPartitioner for SampleInitialization {
    fn partition(
        &mut self,
        data: &ArrayView2<f64>,
        k: usize,
    ) -> Result<InitialPartition, KMeansError> {
        let n_samples = data.nrows();
        let mut centroids = Array2::zeros((k, data.ncols()));
        if n_samples == 0 {
            return Ok(InitialPartition::Centroids(centroids));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut selected = index::sample(&mut rng, n_samples, k.min(n_samples)).into_vec();
        while selected.len() < k {
            selected.push(rng.gen_range(0..n_samples));
        }

        for (mut centroid, &data_idx) in centroids.outer_iter_mut().zip(selected.iter()) {
            centroid.assign(&data.row(data_idx));
        }

        Ok(InitialPartition::Centroids(centroids))
    }
}

/// k-means++ seeding: each new centroid is a data point drawn with probability
/// proportional to its squared distance from the nearest centroid chosen so
/// far.
#[derive(Debug, Clone)]
pub struct KMeansPlusPlus<M = EuclideanDistance> {
    metric: M,
    seed: u64,
}

impl KMeansPlusPlus<EuclideanDistance> {
    pub fn new(seed: u64) -> Self {
        Self::with_metric(EuclideanDistance, seed)
    }
}

impl Default for KMeansPlusPlus<EuclideanDistance> {
    fn default() -> Self {
        Self::new(0)
    }
}

impl<M: Metric> KMeansPlusPlus<M> {
    pub fn with_metric(metric: M, seed: u64) -> Self {
        Self { metric, seed }
    }
}

impl<M: Metric> InitialPartitioner for KMeansPlusPlus<M> {
    fn partition(
        &mut self,
        data: &ArrayView2<f64>,
        k: usize,
    ) -> Result<InitialPartition, KMeansError> {
        let n_samples = data.nrows();
        let mut centroids = Array2::zeros((k, data.ncols()));
        if n_samples == 0 || k == 0 {
            return Ok(InitialPartition::Centroids(centroids));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let first = rng.gen_range(0..n_samples);
        centroids.row_mut(0).assign(&data.row(first));

        let mut min_dists = Array1::from_elem(n_samples, f64::INFINITY);

        for c in 1..k {
            let last = centroids.row(c - 1);
            let mut total = 0.0f64;
            for (point, min_dist) in data.axis_iter(Axis(0)).zip(min_dists.iter_mut()) {
                let d = self.metric.evaluate(point, last);
                let d = d * d;
                if d < *min_dist {
                    *min_dist = d;
                }
                total += *min_dist;
            }

            // Every point already sits on a centroid: fall back to uniform draws.
            let chosen = if !(total > 0.0) || !total.is_finite() {
                rng.gen_range(0..n_samples)
            } else {
                let threshold = rng.gen::<f64>() * total;
                let mut cumulative = 0.0f64;
                let mut chosen = n_samples - 1;
                for (i, &d) in min_dists.iter().enumerate() {
                    cumulative += d;
                    if cumulative >= threshold && d > 0.0 {
                        chosen = i;
                        break;
                    }
                }
                chosen
            };

            centroids.row_mut(c).assign(&data.row(chosen));
        }

        Ok(InitialPartition::Centroids(centroids))
    }
}
