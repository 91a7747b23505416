use crate::distance::{nearest_centroid, Metric};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use rayon::prelude::*;

/// One Lloyd update over a fixed dataset.
///
/// Each call assigns every point to its nearest centroid, rebuilds the
/// centroids as the means of their points and reports how far the centroids
/// moved. Cost is O(n_samples * k * n_features) per call.
pub struct LloydStep<'a, M: ?Sized> {
    data: ArrayView2<'a, f64>,
    metric: &'a M,
    parallel: bool,
    chunk_size_data: usize,
    distance_calculations: usize,
}

impl<'a, M: Metric + ?Sized> LloydStep<'a, M> {
    /// # Arguments
    /// * `data` - Dataset, one point per row (n_samples, n_features)
    /// * `metric` - Distance used for the nearest-centroid search and the residual
    /// * `parallel` - Split the scan across the rayon pool
    /// * `chunk_size_data` - Points per parallel work item (must be > 0)
    pub fn new(
        data: ArrayView2<'a, f64>,
        metric: &'a M,
        parallel: bool,
        chunk_size_data: usize,
    ) -> Self {
        Self {
            data,
            metric,
            parallel,
            chunk_size_data: chunk_size_data.max(1),
            distance_calculations: 0,
        }
    }

    /// Run one update from `centroids` into `new_centroids`.
    ///
    /// `new_centroids` and `counts` are overwritten (and resized if needed).
    /// Clusters that receive no points are left at zero in `new_centroids`
    /// with a count of zero.
    ///
    /// # Returns
    /// The residual `sqrt(sum_i metric(centroids[i], new_centroids[i])^2)`.
    pub fn iterate(
        &mut self,
        centroids: &ArrayView2<f64>,
        new_centroids: &mut Array2<f64>,
        counts: &mut Array1<usize>,
    ) -> f64 {
        let k = centroids.nrows();
        let n_features = self.data.ncols();

        if new_centroids.dim() == (k, n_features) {
            new_centroids.fill(0.0);
        } else {
            *new_centroids = Array2::zeros((k, n_features));
        }
        if counts.len() == k {
            counts.fill(0);
        } else {
            *counts = Array1::zeros(k);
        }

        if k == 0 {
            return 0.0;
        }

        if self.parallel {
            self.accumulate_parallel(centroids, new_centroids, counts);
        } else {
            self.accumulate_serial(centroids, new_centroids, counts);
        }
        self.distance_calculations += self.data.nrows() * k;

        for (mut centroid, &count) in new_centroids.outer_iter_mut().zip(counts.iter()) {
            if count > 0 {
                centroid /= count as f64;
            }
        }

        self.residual(centroids, &new_centroids.view())
    }

    /// Centroid movement `sqrt(sum_i metric(old[i], new[i])^2)`.
    pub fn residual(&mut self, old: &ArrayView2<f64>, new: &ArrayView2<f64>) -> f64 {
        let mut residual = 0.0f64;
        for (old_c, new_c) in old.outer_iter().zip(new.outer_iter()) {
            let d = self.metric.evaluate(old_c, new_c);
            residual += d * d;
        }
        self.distance_calculations += old.nrows();

        residual.sqrt()
    }

    /// Number of metric evaluations performed so far.
    pub fn distance_calculations(&self) -> usize {
        self.distance_calculations
    }

    fn accumulate_serial(
        &self,
        centroids: &ArrayView2<f64>,
        sums: &mut Array2<f64>,
        counts: &mut Array1<usize>,
    ) {
        for point in self.data.outer_iter() {
            if let Some((label, _)) = nearest_centroid(point, centroids, self.metric) {
                let mut sum = sums.row_mut(label);
                sum += &point;
                counts[label] += 1;
            }
        }
    }

    /// Partition-and-reduce: each chunk of points accumulates its own partial
    /// sums and counts, then partials are merged in chunk order.
    fn accumulate_parallel(
        &self,
        centroids: &ArrayView2<f64>,
        sums: &mut Array2<f64>,
        counts: &mut Array1<usize>,
    ) {
        let k = centroids.nrows();
        let n_features = self.data.ncols();
        let metric = self.metric;

        let chunks: Vec<ArrayView2<f64>> = self
            .data
            .axis_chunks_iter(Axis(0), self.chunk_size_data)
            .collect();

        let partials: Vec<(Array2<f64>, Array1<usize>)> = chunks
            .par_iter()
            .map(|chunk| {
                let mut chunk_sums = Array2::zeros((k, n_features));
                let mut chunk_counts = Array1::zeros(k);
                for point in chunk.outer_iter() {
                    if let Some((label, _)) = nearest_centroid(point, centroids, metric) {
                        let mut sum = chunk_sums.row_mut(label);
                        sum += &point;
                        chunk_counts[label] += 1;
                    }
                }
                (chunk_sums, chunk_counts)
            })
            .collect();

        for (chunk_sums, chunk_counts) in partials {
            *sums += &chunk_sums;
            *counts += &chunk_counts;
        }
    }
}

/// Assign every point to its nearest centroid (ties go to the lowest index).
///
/// # Arguments
/// * `data` - Points to assign (n_samples, n_features)
/// * `centroids` - Centroids (k, n_features), `k > 0`
/// * `metric` - Distance used for the comparison
/// * `parallel` - Split the scan across the rayon pool
///
/// # Returns
/// Labels in `[0, k)` of shape (n_samples,). With no centroids every label is 0.
pub fn assign_points<M: Metric + ?Sized>(
    data: &ArrayView2<f64>,
    centroids: &ArrayView2<f64>,
    metric: &M,
    parallel: bool,
) -> Array1<usize> {
    let label_of = |i: usize| {
        nearest_centroid(data.row(i), centroids, metric).map_or(0, |(label, _)| label)
    };

    if parallel {
        let labels: Vec<usize> = (0..data.nrows()).into_par_iter().map(label_of).collect();
        Array1::from(labels)
    } else {
        (0..data.nrows()).map(label_of).collect()
    }
}
