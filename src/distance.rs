use ndarray::{ArrayView1, ArrayView2, Zip};

/// A dissimilarity between two points.
///
/// The engine makes no assumption about symmetry or the triangle inequality;
/// it only ever asks for `evaluate(point, centroid)` and compares the results.
pub trait Metric: Send + Sync {
    /// Compute the distance between `a` and `b`. Both views have the same length.
    fn evaluate(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64;
}

impl<T: Metric + ?Sized> Metric for &T {
    #[inline]
    fn evaluate(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        (**self).evaluate(a, b)
    }
}

/// Minkowski distance of arbitrary integer power.
///
/// With `take_root == false` the final root is skipped, which keeps the
/// ordering of distances but saves a `powf` per evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LMetric {
    pub power: i32,
    pub take_root: bool,
}

impl LMetric {
    /// # Panics
    ///
    /// Panics if `power` is not positive.
    pub fn new(power: i32, take_root: bool) -> Self {
        assert!(power > 0, "LMetric power must be positive");
        Self { power, take_root }
    }
}

impl Metric for LMetric {
    fn evaluate(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        let mut sum = 0.0f64;
        Zip::from(&a).and(&b).for_each(|&x, &y| {
            sum += (x - y).abs().powi(self.power);
        });
        if self.take_root {
            sum.powf(1.0 / self.power as f64)
        } else {
            sum
        }
    }
}

/// L1 distance
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ManhattanDistance;

impl Metric for ManhattanDistance {
    #[inline]
    fn evaluate(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        let mut sum = 0.0f64;
        Zip::from(&a).and(&b).for_each(|&x, &y| sum += (x - y).abs());
        sum
    }
}

/// L2 distance
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EuclideanDistance;

impl Metric for EuclideanDistance {
    #[inline]
    fn evaluate(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        squared_l2(a, b).sqrt()
    }
}

/// Squared L2 distance. Not a true metric, but it orders points exactly as
/// [`EuclideanDistance`] does.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SquaredEuclideanDistance;

impl Metric for SquaredEuclideanDistance {
    #[inline]
    fn evaluate(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        squared_l2(a, b)
    }
}

/// L-infinity distance
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChebyshevDistance;

impl Metric for ChebyshevDistance {
    #[inline]
    fn evaluate(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        let mut max = 0.0f64;
        Zip::from(&a).and(&b).for_each(|&x, &y| max = max.max((x - y).abs()));
        max
    }
}

#[inline]
fn squared_l2(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    let mut sum = 0.0f64;
    Zip::from(&a).and(&b).for_each(|&x, &y| {
        let d = x - y;
        sum += d * d;
    });
    sum
}

/// Find the centroid (row of `centroids`) closest to `point`.
///
/// Ties go to the lowest index: a later centroid only wins if it is strictly
/// closer. Returns `None` when there are no centroids. If every distance is
/// NaN the point falls back to centroid 0.
#[inline]
pub fn nearest_centroid<M: Metric + ?Sized>(
    point: ArrayView1<f64>,
    centroids: &ArrayView2<f64>,
    metric: &M,
) -> Option<(usize, f64)> {
    if centroids.nrows() == 0 {
        return None;
    }

    let mut best_idx = 0;
    let mut best_dist = f64::INFINITY;
    for (j, centroid) in centroids.outer_iter().enumerate() {
        let dist = metric.evaluate(point, centroid);
        if dist < best_dist {
            best_dist = dist;
            best_idx = j;
        }
    }

    Some((best_idx, best_dist))
}
