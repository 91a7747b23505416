//! Empty-cluster recovery policies.
//!
//! After each Lloyd pass the engine hands every cluster that ended up with no
//! points to an [`EmptyClusterPolicy`]. The policy may move a point into the
//! cluster (making its count nonzero) or deliberately leave it empty.

use crate::distance::{nearest_centroid, Metric};
use ndarray::{Array1, Array2, ArrayView2, Zip};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// State handed to an [`EmptyClusterPolicy`] for a single empty cluster.
pub struct EmptyClusterContext<'a, M: ?Sized> {
    /// The dataset, one point per row.
    pub data: ArrayView2<'a, f64>,
    /// Index of the cluster with no points.
    pub cluster: usize,
    /// Centroids the points were assigned against in this iteration.
    pub old_centroids: ArrayView2<'a, f64>,
    /// Centroids produced by this iteration; the row of `cluster` is zero.
    pub new_centroids: &'a mut Array2<f64>,
    /// Per-cluster point counts produced by this iteration.
    pub counts: &'a mut Array1<usize>,
    pub metric: &'a M,
    /// Iteration number, starting at 1.
    pub iteration: usize,
}

/// Recovery strategy for clusters that lose all their points.
pub trait EmptyClusterPolicy {
    /// Handle the empty cluster described by `ctx`, returning how many points
    /// were moved into it.
    ///
    /// Returning `0` means the cluster stays empty. A policy that moves points
    /// must keep `ctx.counts` summing to the number of points and keep every
    /// touched centroid equal to the mean of its points.
    fn empty_cluster<M: Metric + ?Sized>(&mut self, ctx: EmptyClusterContext<'_, M>) -> usize;

    /// Called once at the start of every clustering run, before any
    /// iteration. Policies that cache per-iteration state drop it here.
    fn reset(&mut self) {}
}

impl<E: EmptyClusterPolicy + ?Sized> EmptyClusterPolicy for &mut E {
    fn empty_cluster<M: Metric + ?Sized>(&mut self, ctx: EmptyClusterContext<'_, M>) -> usize {
        (**self).empty_cluster(ctx)
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}

/// Leaves empty clusters empty. The centroid keeps its previous position
/// rather than collapsing to the origin.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowEmptyClusters;

impl EmptyClusterPolicy for AllowEmptyClusters {
    fn empty_cluster<M: Metric + ?Sized>(&mut self, ctx: EmptyClusterContext<'_, M>) -> usize {
        keep_previous(ctx);
        0
    }
}

/// Splits the cluster with the largest variance.
///
/// The point of that cluster farthest from its centroid is moved into the
/// empty cluster and the donor centroid is corrected in place. Variances and
/// point assignments are computed once per iteration and then kept up to date
/// incrementally, so several empty clusters in the same iteration cost a single
/// pass over the data. Only clusters with at least two points can donate; if
/// there is none the empty cluster keeps its previous centroid and stays empty.
#[derive(Debug, Clone, Default)]
pub struct MaxVarianceNewCluster {
    iteration: Option<usize>,
    variances: Array1<f64>,
    assignments: Array1<usize>,
}

impl MaxVarianceNewCluster {
    pub fn new() -> Self {
        Self::default()
    }

    fn precalculate<M: Metric + ?Sized>(&mut self, ctx: &EmptyClusterContext<'_, M>) {
        let k = ctx.old_centroids.nrows();
        self.variances = Array1::zeros(k);
        self.assignments = Array1::zeros(ctx.data.nrows());

        for (point, label) in ctx.data.outer_iter().zip(self.assignments.iter_mut()) {
            let Some((closest, _)) = nearest_centroid(point, &ctx.old_centroids, ctx.metric)
            else {
                continue;
            };
            *label = closest;
            let d = ctx
                .metric
                .evaluate(point, ctx.new_centroids.row(closest));
            self.variances[closest] += d * d;
        }

        Zip::from(&mut self.variances)
            .and(&*ctx.counts)
            .for_each(|variance, &count| {
                if count <= 1 {
                    *variance = 0.0;
                } else {
                    *variance /= count as f64;
                }
            });

        self.iteration = Some(ctx.iteration);
    }
}

impl EmptyClusterPolicy for MaxVarianceNewCluster {
    fn empty_cluster<M: Metric + ?Sized>(&mut self, ctx: EmptyClusterContext<'_, M>) -> usize {
        if self.iteration != Some(ctx.iteration)
            || self.assignments.len() != ctx.data.nrows()
            || self.variances.len() != ctx.counts.len()
        {
            self.precalculate(&ctx);
        }

        // Largest variance among clusters that can spare a point; first wins ties.
        let mut donor = None;
        let mut max_variance = f64::NEG_INFINITY;
        for (cluster, (&variance, &count)) in
            self.variances.iter().zip(ctx.counts.iter()).enumerate()
        {
            if count >= 2 && variance > max_variance {
                max_variance = variance;
                donor = Some(cluster);
            }
        }
        let Some(donor) = donor else {
            keep_previous(ctx);
            return 0;
        };

        let mut farthest = None;
        let mut max_distance = f64::NEG_INFINITY;
        for (i, point) in ctx.data.outer_iter().enumerate() {
            if self.assignments[i] != donor {
                continue;
            }
            let d = ctx.metric.evaluate(point, ctx.new_centroids.row(donor));
            let d = d * d;
            if d > max_distance {
                max_distance = d;
                farthest = Some(i);
            }
        }
        let Some(farthest) = farthest else {
            keep_previous(ctx);
            return 0;
        };

        let point = ctx.data.row(farthest);
        remove_from_mean(ctx.new_centroids, donor, ctx.counts[donor], point);
        ctx.counts[donor] -= 1;
        ctx.counts[ctx.cluster] += 1;
        ctx.new_centroids.row_mut(ctx.cluster).assign(&point);
        self.assignments[farthest] = ctx.cluster;

        self.variances[ctx.cluster] = 0.0;
        let remaining = ctx.counts[donor] as f64;
        self.variances[donor] = if ctx.counts[donor] <= 1 {
            0.0
        } else {
            ((remaining + 1.0) * self.variances[donor] - max_distance) / remaining
        };

        1
    }

    fn reset(&mut self) {
        self.iteration = None;
    }
}

/// Reseeds an empty cluster from a random data point.
///
/// The point is taken from a cluster holding at least two points, so no other
/// cluster is emptied in the process. If no such point exists the cluster keeps
/// its previous centroid and stays empty. The generator restarts from the seed
/// at the beginning of every run.
#[derive(Debug, Clone)]
pub struct RandomReseed {
    seed: u64,
    rng: ChaCha8Rng,
    iteration: Option<usize>,
    assignments: Array1<usize>,
}

impl RandomReseed {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
            iteration: None,
            assignments: Array1::zeros(0),
        }
    }
}

impl Default for RandomReseed {
    fn default() -> Self {
        Self::new(0)
    }
}

impl EmptyClusterPolicy for RandomReseed {
    fn empty_cluster<M: Metric + ?Sized>(&mut self, ctx: EmptyClusterContext<'_, M>) -> usize {
        if self.iteration != Some(ctx.iteration) || self.assignments.len() != ctx.data.nrows() {
            self.assignments = ctx
                .data
                .outer_iter()
                .map(|point| {
                    nearest_centroid(point, &ctx.old_centroids, ctx.metric).map_or(0, |(c, _)| c)
                })
                .collect();
            self.iteration = Some(ctx.iteration);
        }

        let candidates: Vec<usize> = self
            .assignments
            .iter()
            .enumerate()
            .filter(|&(_, &cluster)| ctx.counts[cluster] >= 2)
            .map(|(i, _)| i)
            .collect();
        let Some(&chosen) = candidates.choose(&mut self.rng) else {
            keep_previous(ctx);
            return 0;
        };

        let donor = self.assignments[chosen];
        let point = ctx.data.row(chosen);
        remove_from_mean(ctx.new_centroids, donor, ctx.counts[donor], point);
        ctx.counts[donor] -= 1;
        ctx.counts[ctx.cluster] += 1;
        ctx.new_centroids.row_mut(ctx.cluster).assign(&point);
        self.assignments[chosen] = ctx.cluster;

        1
    }

    fn reset(&mut self) {
        self.rng = ChaCha8Rng::seed_from_u64(self.seed);
        self.iteration = None;
    }
}

fn keep_previous<M: ?Sized>(ctx: EmptyClusterContext<'_, M>) {
    ctx.new_centroids
        .row_mut(ctx.cluster)
        .assign(&ctx.old_centroids.row(ctx.cluster));
}

/// Drop `point` from the mean stored in row `cluster`, which currently
/// averages `count` points (`count >= 2`).
fn remove_from_mean(
    centroids: &mut Array2<f64>,
    cluster: usize,
    count: usize,
    point: ndarray::ArrayView1<f64>,
) {
    let count = count as f64;
    let mut centroid = centroids.row_mut(cluster);
    Zip::from(&mut centroid).and(&point).for_each(|c, &x| {
        *c = (*c * count - x) / (count - 1.0);
    });
}
