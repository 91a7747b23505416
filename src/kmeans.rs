use crate::config::{KMeansConfig, CONVERGENCE_TOLERANCE, NUMERIC_ANOMALY_RESIDUAL};
use crate::distance::{EuclideanDistance, Metric};
use crate::empty_cluster::{EmptyClusterContext, EmptyClusterPolicy, MaxVarianceNewCluster};
use crate::error::KMeansError;
use crate::lloyd::{assign_points, LloydStep};
use crate::observer::{
    DegenerateConfiguration, InitialSource, KMeansEvent, KMeansObserver, TracingObserver,
};
use crate::partition::{
    centroids_from_assignments, InitialPartition, InitialPartitioner, SampleInitialization,
};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use std::sync::Arc;

/// Optional inputs of a clustering run.
#[derive(Debug, Clone)]
pub struct ClusterOptions<'a> {
    /// Starting label for every point. Takes precedence over
    /// `initial_centroids` when both are given.
    pub initial_assignments: Option<ArrayView1<'a, usize>>,

    /// Starting centroids, shape (k, n_features).
    pub initial_centroids: Option<ArrayView2<'a, f64>>,

    /// Compute the final assignment of every point.
    pub return_assignments: bool,
}

impl Default for ClusterOptions<'_> {
    fn default() -> Self {
        Self {
            initial_assignments: None,
            initial_centroids: None,
            return_assignments: true,
        }
    }
}

impl<'a> ClusterOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from these centroids instead of calling the partitioner
    pub fn with_initial_centroids(mut self, centroids: ArrayView2<'a, f64>) -> Self {
        self.initial_centroids = Some(centroids);
        self
    }

    /// Start from the means of these assignments instead of calling the partitioner
    pub fn with_initial_assignments(mut self, assignments: ArrayView1<'a, usize>) -> Self {
        self.initial_assignments = Some(assignments);
        self
    }

    /// Set whether final assignments are computed
    pub fn with_assignments(mut self, return_assignments: bool) -> Self {
        self.return_assignments = return_assignments;
        self
    }
}

/// Outcome of a clustering run
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansResult {
    /// Final centroids, shape (k, n_features)
    pub centroids: Array2<f64>,

    /// Nearest centroid of every point, shape (n_samples,). `None` when not
    /// requested, or when `k == 0` and no label exists.
    pub assignments: Option<Array1<usize>>,

    /// Number of Lloyd iterations performed
    pub iterations: usize,

    /// Whether the run stopped because the residual fell below
    /// [`CONVERGENCE_TOLERANCE`] rather than at the iteration cap
    pub converged: bool,

    /// Metric evaluations performed by the Lloyd steps and the final assignment pass
    pub distance_calculations: usize,

    /// Degenerate-configuration conditions detected for this run
    pub warnings: Vec<DegenerateConfiguration>,
}

/// Lloyd's k-means over a dataset with one point per row.
///
/// The engine is assembled from a [`Metric`], an [`InitialPartitioner`] and an
/// [`EmptyClusterPolicy`]. Diagnostics go to a [`KMeansObserver`]
/// ([`TracingObserver`] unless replaced).
///
/// # Example
///
/// ```
/// use lloyd_kmeans::KMeans;
/// use ndarray::array;
///
/// let data = array![[0.0, 0.0], [0.1, 0.0], [10.0, 10.0], [10.1, 10.0]];
///
/// let mut kmeans = KMeans::new(100);
/// let result = kmeans.cluster(&data.view(), 2).unwrap();
///
/// assert_eq!(result.centroids.dim(), (2, 2));
/// let labels = result.assignments.unwrap();
/// assert_eq!(labels[0], labels[1]);
/// assert_ne!(labels[0], labels[2]);
/// ```
pub struct KMeans<M = EuclideanDistance, P = SampleInitialization, E = MaxVarianceNewCluster> {
    config: KMeansConfig,
    metric: M,
    partitioner: P,
    empty_cluster_policy: E,
    observer: Arc<dyn KMeansObserver>,
}

impl KMeans {
    /// Create an engine with the default policies: Euclidean distance, random
    /// sample initialization and max-variance empty-cluster splitting.
    ///
    /// # Arguments
    ///
    /// * `max_iterations` - Iteration cap; `0` disables it
    pub fn new(max_iterations: usize) -> Self {
        Self::with_config(KMeansConfig::new(max_iterations))
    }

    /// Create an engine with the default policies and a custom configuration.
    pub fn with_config(config: KMeansConfig) -> Self {
        Self::with_policies(
            config,
            EuclideanDistance,
            SampleInitialization::default(),
            MaxVarianceNewCluster::default(),
        )
    }
}

impl Default for KMeans {
    fn default() -> Self {
        Self::with_config(KMeansConfig::default())
    }
}

impl<M, P, E> KMeans<M, P, E>
where
    M: Metric,
    P: InitialPartitioner,
    E: EmptyClusterPolicy,
{
    /// Create an engine from explicit policies.
    pub fn with_policies(
        config: KMeansConfig,
        metric: M,
        partitioner: P,
        empty_cluster_policy: E,
    ) -> Self {
        Self {
            config,
            metric,
            partitioner,
            empty_cluster_policy,
            observer: Arc::new(TracingObserver),
        }
    }

    /// Replace the diagnostics observer.
    pub fn with_observer(mut self, observer: Arc<dyn KMeansObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Cluster `data` into `k` clusters, starting from the partitioner and
    /// returning final assignments.
    ///
    /// # Errors
    ///
    /// See [`KMeans::cluster_with`].
    pub fn cluster(
        &mut self,
        data: &ArrayView2<f64>,
        k: usize,
    ) -> Result<KMeansResult, KMeansError> {
        self.cluster_with(data, k, ClusterOptions::default())
    }

    /// Cluster `data` into `k` clusters.
    ///
    /// # Arguments
    ///
    /// * `data` - Dataset of shape (n_samples, n_features); only read
    /// * `k` - Number of clusters
    /// * `options` - Optional initial guesses and whether to compute assignments
    ///
    /// # Errors
    ///
    /// Returns an error before any iteration runs if:
    /// - The initial centroids are not of shape (k, n_features)
    /// - The initial assignments are not one label in `[0, k)` per point
    /// - The partitioner output does not fit the dataset
    /// - The configuration is invalid
    ///
    /// `k == 0`, `k > n_samples` and `max_iterations == 0` are not errors: they
    /// are reported through the observer and in [`KMeansResult::warnings`].
    pub fn cluster_with(
        &mut self,
        data: &ArrayView2<f64>,
        k: usize,
        options: ClusterOptions<'_>,
    ) -> Result<KMeansResult, KMeansError> {
        self.config.validate()?;
        self.validate_guesses(data, k, &options)?;

        let warnings = self.degenerate_conditions(data.nrows(), k);
        for &condition in &warnings {
            self.observer.on_event(&KMeansEvent::Degenerate(condition));
        }

        let (mut centroids, from) = self.initial_centroids(data, k, &options)?;
        self.observer.on_event(&KMeansEvent::Initialized { from });

        self.empty_cluster_policy.reset();

        let mut next_centroids = Array2::zeros(centroids.dim());
        let mut counts = Array1::zeros(k);
        let mut step = LloydStep::new(
            data.view(),
            &self.metric,
            self.config.parallel,
            self.config.chunk_size_data,
        );

        let mut iteration = 0;
        let converged = loop {
            iteration += 1;

            let mut residual = step.iterate(&centroids.view(), &mut next_centroids, &mut counts);

            let mut recovered = false;
            for cluster in 0..k {
                if counts[cluster] != 0 {
                    continue;
                }
                recovered = true;
                let points_changed = self.empty_cluster_policy.empty_cluster(EmptyClusterContext {
                    data: data.view(),
                    cluster,
                    old_centroids: centroids.view(),
                    new_centroids: &mut next_centroids,
                    counts: &mut counts,
                    metric: &self.metric,
                    iteration,
                });
                self.observer.on_event(&KMeansEvent::EmptyCluster {
                    iteration,
                    cluster,
                    points_changed,
                });
            }

            // Empty rows were zero when the step measured movement; measure
            // again now that the policy has decided where they sit.
            if recovered {
                residual = step.residual(&centroids.view(), &next_centroids.view());
            }

            // The freshly written buffer becomes current; the old one is reused next pass.
            std::mem::swap(&mut centroids, &mut next_centroids);

            self.observer
                .on_event(&KMeansEvent::IterationComplete { iteration, residual });

            if !residual.is_finite() {
                self.observer
                    .on_event(&KMeansEvent::NumericAnomaly { iteration, residual });
                residual = NUMERIC_ANOMALY_RESIDUAL;
            }

            if residual <= CONVERGENCE_TOLERANCE {
                break true;
            }
            if iteration == self.config.max_iterations {
                break false;
            }
        };

        let mut distance_calculations = step.distance_calculations();

        let assignments = if options.return_assignments && k > 0 {
            distance_calculations += data.nrows() * k;
            Some(assign_points(
                data,
                &centroids.view(),
                &self.metric,
                self.config.parallel,
            ))
        } else {
            None
        };

        self.observer.on_event(&KMeansEvent::Finished {
            iterations: iteration,
            converged,
            distance_calculations,
        });

        Ok(KMeansResult {
            centroids,
            assignments,
            iterations: iteration,
            converged,
            distance_calculations,
            warnings,
        })
    }

    /// Assign new points to the nearest of the given centroids.
    ///
    /// # Errors
    ///
    /// Returns an error if there are no centroids or if the centroids and the
    /// data differ in dimensionality.
    pub fn assign(
        &self,
        data: &ArrayView2<f64>,
        centroids: &ArrayView2<f64>,
    ) -> Result<Array1<usize>, KMeansError> {
        if centroids.ncols() != data.ncols() {
            return Err(KMeansError::InvalidCentroidDimensions {
                expected: data.ncols(),
                actual: centroids.ncols(),
            });
        }
        if centroids.nrows() == 0 {
            return Err(KMeansError::InvalidParameter(
                "cannot assign points without centroids".to_string(),
            ));
        }

        Ok(assign_points(
            data,
            centroids,
            &self.metric,
            self.config.parallel,
        ))
    }

    fn validate_guesses(
        &self,
        data: &ArrayView2<f64>,
        k: usize,
        options: &ClusterOptions<'_>,
    ) -> Result<(), KMeansError> {
        if let Some(centroids) = &options.initial_centroids {
            if centroids.nrows() != k {
                return Err(KMeansError::InvalidCentroidCount {
                    expected: k,
                    actual: centroids.nrows(),
                });
            }
            if centroids.ncols() != data.ncols() {
                return Err(KMeansError::InvalidCentroidDimensions {
                    expected: data.ncols(),
                    actual: centroids.ncols(),
                });
            }
        }

        if let Some(assignments) = &options.initial_assignments {
            if assignments.len() != data.nrows() {
                return Err(KMeansError::InvalidAssignmentLength {
                    expected: data.nrows(),
                    actual: assignments.len(),
                });
            }
            if let Some((point, &cluster)) =
                assignments.iter().enumerate().find(|&(_, &c)| c >= k)
            {
                return Err(KMeansError::AssignmentOutOfRange { point, cluster, k });
            }
        }

        Ok(())
    }

    fn degenerate_conditions(&self, n_samples: usize, k: usize) -> Vec<DegenerateConfiguration> {
        let mut warnings = Vec::new();
        if k == 0 {
            warnings.push(DegenerateConfiguration::ZeroClusters);
        } else if k > n_samples {
            warnings.push(DegenerateConfiguration::MoreClustersThanPoints { k, n: n_samples });
        }
        if self.config.max_iterations == 0 {
            warnings.push(DegenerateConfiguration::UnboundedIterations);
        }
        warnings
    }

    fn initial_centroids(
        &mut self,
        data: &ArrayView2<f64>,
        k: usize,
        options: &ClusterOptions<'_>,
    ) -> Result<(Array2<f64>, InitialSource), KMeansError> {
        if let Some(assignments) = &options.initial_assignments {
            let centroids = centroids_from_assignments(data, assignments, k)?;
            return Ok((centroids, InitialSource::AssignmentGuess));
        }
        if let Some(centroids) = &options.initial_centroids {
            return Ok((centroids.to_owned(), InitialSource::CentroidGuess));
        }
        if k == 0 {
            return Ok((Array2::zeros((0, data.ncols())), InitialSource::NoClusters));
        }

        match self.partitioner.partition(data, k)? {
            InitialPartition::Assignments(assignments) => {
                if assignments.len() != data.nrows() {
                    return Err(KMeansError::InvalidPartition(format!(
                        "expected {} assignments, got {}",
                        data.nrows(),
                        assignments.len()
                    )));
                }
                let centroids = centroids_from_assignments(data, &assignments.view(), k)?;
                Ok((centroids, InitialSource::PartitionerAssignments))
            }
            InitialPartition::Centroids(centroids) => {
                if centroids.dim() != (k, data.ncols()) {
                    return Err(KMeansError::InvalidPartition(format!(
                        "expected centroids of shape ({}, {}), got {:?}",
                        k,
                        data.ncols(),
                        centroids.dim()
                    )));
                }
                Ok((centroids, InitialSource::PartitionerCentroids))
            }
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &KMeansConfig {
        &self.config
    }

    /// Get the iteration cap.
    pub fn max_iterations(&self) -> usize {
        self.config.max_iterations
    }

    /// Set the iteration cap.
    pub fn set_max_iterations(&mut self, max_iterations: usize) {
        self.config.max_iterations = max_iterations;
    }

    pub fn metric(&self) -> &M {
        &self.metric
    }

    pub fn partitioner(&self) -> &P {
        &self.partitioner
    }

    pub fn partitioner_mut(&mut self) -> &mut P {
        &mut self.partitioner
    }

    pub fn empty_cluster_policy(&self) -> &E {
        &self.empty_cluster_policy
    }

    pub fn empty_cluster_policy_mut(&mut self) -> &mut E {
        &mut self.empty_cluster_policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::ManhattanDistance;
    use crate::empty_cluster::AllowEmptyClusters;
    use crate::observer::RecordingObserver;
    use crate::partition::RandomPartition;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn two_blobs() -> Array2<f64> {
        array![
            [0.0, 0.0],
            [0.1, 0.0],
            [0.0, 0.1],
            [10.0, 10.0],
            [10.1, 10.0],
            [10.0, 10.1]
        ]
    }

    /// Records every call, then behaves like `AllowEmptyClusters`.
    #[derive(Default)]
    struct CountingPolicy {
        calls: Vec<(usize, usize)>,
    }

    impl EmptyClusterPolicy for CountingPolicy {
        fn empty_cluster<M: Metric + ?Sized>(&mut self, ctx: EmptyClusterContext<'_, M>) -> usize {
            self.calls.push((ctx.iteration, ctx.cluster));
            AllowEmptyClusters.empty_cluster(ctx)
        }
    }

    /// Partitioner that returns a fixed result.
    struct Fixed(InitialPartition);

    impl InitialPartitioner for Fixed {
        fn partition(
            &mut self,
            _data: &ArrayView2<f64>,
            _k: usize,
        ) -> Result<InitialPartition, KMeansError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_two_blobs_from_centroid_guess() {
        let data = two_blobs();
        let guess = array![[1.0, 1.0], [9.0, 9.0]];
        let mut kmeans = KMeans::with_config(KMeansConfig::new(50).with_parallel(false));

        let result = kmeans
            .cluster_with(
                &data.view(),
                2,
                ClusterOptions::new().with_initial_centroids(guess.view()),
            )
            .unwrap();

        assert!(result.converged);
        assert_abs_diff_eq!(result.centroids[[0, 0]], 0.1 / 3.0, epsilon = 1e-9);
        assert_abs_diff_eq!(result.centroids[[1, 0]], 30.1 / 3.0, epsilon = 1e-9);
        assert_eq!(result.assignments.unwrap(), array![0usize, 0, 0, 1, 1, 1]);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_assignment_producing_partitioner() {
        let data = two_blobs();
        let mut kmeans = KMeans::with_policies(
            KMeansConfig::new(50),
            EuclideanDistance,
            Fixed(InitialPartition::Assignments(array![0usize, 0, 1, 1, 1, 1])),
            MaxVarianceNewCluster::new(),
        );

        let result = kmeans.cluster(&data.view(), 2).unwrap();
        let labels = result.assignments.unwrap();

        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[0], labels[2]);
        assert_eq!(labels[3], labels[4]);
        assert_eq!(labels[3], labels[5]);
        assert_ne!(labels[0], labels[3]);
    }

    #[test]
    fn test_wrong_centroid_guess_is_fatal_before_iterating() {
        let data = two_blobs();
        let observer = Arc::new(RecordingObserver::new());
        let mut kmeans = KMeans::new(10).with_observer(observer.clone());

        let guess = array![[0.0, 0.0], [1.0, 1.0], [2.0, 2.0]];
        let result = kmeans.cluster_with(
            &data.view(),
            2,
            ClusterOptions::new().with_initial_centroids(guess.view()),
        );
        assert_eq!(
            result,
            Err(KMeansError::InvalidCentroidCount {
                expected: 2,
                actual: 3
            })
        );

        let guess = array![[0.0, 0.0, 0.0], [1.0, 1.0, 1.0]];
        let result = kmeans.cluster_with(
            &data.view(),
            2,
            ClusterOptions::new().with_initial_centroids(guess.view()),
        );
        assert_eq!(
            result,
            Err(KMeansError::InvalidCentroidDimensions {
                expected: 2,
                actual: 3
            })
        );

        assert!(observer.events().is_empty(), "no iteration may run");
    }

    #[test]
    fn test_wrong_assignment_guess_is_fatal() {
        let data = two_blobs();
        let mut kmeans = KMeans::new(10);

        let short = array![0usize, 1];
        let result = kmeans.cluster_with(
            &data.view(),
            2,
            ClusterOptions::new().with_initial_assignments(short.view()),
        );
        assert!(matches!(
            result,
            Err(KMeansError::InvalidAssignmentLength {
                expected: 6,
                actual: 2
            })
        ));

        let out_of_range = array![0usize, 0, 0, 1, 1, 2];
        let result = kmeans.cluster_with(
            &data.view(),
            2,
            ClusterOptions::new().with_initial_assignments(out_of_range.view()),
        );
        assert!(matches!(
            result,
            Err(KMeansError::AssignmentOutOfRange { point: 5, .. })
        ));
    }

    #[test]
    fn test_bad_partitioner_output_is_fatal() {
        let data = two_blobs();
        let mut kmeans = KMeans::with_policies(
            KMeansConfig::new(10),
            EuclideanDistance,
            Fixed(InitialPartition::Centroids(Array2::zeros((3, 2)))),
            AllowEmptyClusters,
        );

        assert!(matches!(
            kmeans.cluster(&data.view(), 2),
            Err(KMeansError::InvalidPartition(_))
        ));
    }

    #[test]
    fn test_iteration_cap_is_respected() {
        let data = ndarray::Array2::from_shape_fn((60, 2), |(i, j)| ((i * 7 + j * 3) % 11) as f64);
        for cap in 1..4 {
            let mut kmeans = KMeans::with_policies(
                KMeansConfig::new(cap),
                EuclideanDistance,
                RandomPartition::new(3),
                MaxVarianceNewCluster::new(),
            );
            let result = kmeans.cluster(&data.view(), 5).unwrap();
            assert!(result.iterations <= cap);
            if !result.converged {
                assert_eq!(result.iterations, cap);
            }
        }
    }

    #[test]
    fn test_empty_cluster_policy_called_once_per_iteration() {
        let data = two_blobs();
        let guess = array![[0.0, 0.0], [10.0, 10.0], [100.0, 100.0]];
        let mut kmeans = KMeans::with_policies(
            KMeansConfig::new(20),
            EuclideanDistance,
            SampleInitialization::new(0),
            CountingPolicy::default(),
        );

        let result = kmeans
            .cluster_with(
                &data.view(),
                3,
                ClusterOptions::new().with_initial_centroids(guess.view()),
            )
            .unwrap();

        let expected: Vec<(usize, usize)> = (1..=result.iterations).map(|i| (i, 2)).collect();
        assert_eq!(kmeans.empty_cluster_policy().calls, expected);
        // Left empty on purpose, centroid kept in place
        assert_eq!(result.centroids.row(2).to_vec(), vec![100.0, 100.0]);
        assert!(result.assignments.unwrap().iter().all(|&l| l < 2));
    }

    #[test]
    fn test_zero_clusters_warns_and_completes() {
        let data = two_blobs();
        let observer = Arc::new(RecordingObserver::new());
        let mut kmeans = KMeans::new(10).with_observer(observer.clone());

        let result = kmeans.cluster(&data.view(), 0).unwrap();

        assert_eq!(result.centroids.dim(), (0, 2));
        assert!(result.assignments.is_none());
        assert_eq!(result.warnings, vec![DegenerateConfiguration::ZeroClusters]);
        assert!(observer
            .events()
            .contains(&KMeansEvent::Degenerate(DegenerateConfiguration::ZeroClusters)));
    }

    #[test]
    fn test_nan_residual_keeps_iterating_until_cap() {
        let data = array![[f64::NAN, 0.0], [1.0, 1.0], [2.0, 2.0]];
        let observer = Arc::new(RecordingObserver::new());
        let mut kmeans = KMeans::with_policies(
            KMeansConfig::new(4),
            ManhattanDistance,
            SampleInitialization::new(1),
            AllowEmptyClusters,
        )
        .with_observer(observer.clone());

        let result = kmeans.cluster(&data.view(), 1).unwrap();

        assert_eq!(result.iterations, 4);
        assert!(!result.converged);
        let anomalies = observer
            .events()
            .iter()
            .filter(|e| matches!(e, KMeansEvent::NumericAnomaly { .. }))
            .count();
        assert_eq!(anomalies, 4);
    }

    #[test]
    fn test_assign_validates_dimensions() {
        let kmeans = KMeans::new(10);
        let data = two_blobs();

        let result = kmeans.assign(&data.view(), &array![[0.0, 0.0, 0.0]].view());
        assert!(matches!(
            result,
            Err(KMeansError::InvalidCentroidDimensions { .. })
        ));

        let labels = kmeans
            .assign(&data.view(), &array![[10.0, 10.0], [0.0, 0.0]].view())
            .unwrap();
        assert_eq!(labels, array![1usize, 1, 1, 0, 0, 0]);
    }
}
