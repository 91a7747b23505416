//! # lloyd-kmeans
//!
//! Lloyd's k-means clustering over ndarray matrices, assembled from pluggable
//! policies.
//!
//! ## Features
//!
//! - **Pluggable metric**: any [`Metric`]; L1, L2, squared L2, L-infinity and
//!   general Minkowski distances are provided
//! - **Pluggable initialization**: partitioners may return either starting
//!   assignments or starting centroids ([`InitialPartition`])
//! - **Pluggable empty-cluster recovery**: split the highest-variance cluster,
//!   reseed at random, or leave clusters empty
//! - **Parallel computation**: the nearest-centroid scans use rayon with a
//!   deterministic partition-and-reduce merge
//! - **Structured diagnostics**: degenerate configurations, empty clusters and
//!   per-iteration residuals are reported through a [`KMeansObserver`]
//!   (forwarded to `tracing` by default)
//!
//! ## Example
//!
//! ```rust
//! use lloyd_kmeans::KMeans;
//! use ndarray::array;
//!
//! let data = array![
//!     [0.0, 0.0], [0.1, 0.0], [0.0, 0.1],
//!     [10.0, 10.0], [10.1, 10.0], [10.0, 10.1],
//! ];
//!
//! let mut kmeans = KMeans::new(100);
//! let result = kmeans.cluster(&data.view(), 2).unwrap();
//!
//! assert_eq!(result.centroids.dim(), (2, 2));
//! assert_eq!(result.assignments.unwrap().len(), 6);
//! ```
//!
//! ## Custom Policies
//!
//! ```rust
//! use lloyd_kmeans::{
//!     ClusterOptions, KMeans, KMeansConfig, KMeansPlusPlus, ManhattanDistance, RandomReseed,
//! };
//! use ndarray::array;
//!
//! let data = array![[1.0, 2.0], [1.5, 1.8], [8.0, 8.0], [8.5, 9.0], [9.0, 8.0]];
//!
//! let mut kmeans = KMeans::with_policies(
//!     KMeansConfig::new(50).with_parallel(false),
//!     ManhattanDistance,
//!     KMeansPlusPlus::new(42),
//!     RandomReseed::new(42),
//! );
//!
//! let first = kmeans.cluster(&data.view(), 2).unwrap();
//!
//! // Restarting from converged centroids needs a single iteration
//! let again = kmeans
//!     .cluster_with(
//!         &data.view(),
//!         2,
//!         ClusterOptions::new().with_initial_centroids(first.centroids.view()),
//!     )
//!     .unwrap();
//! assert_eq!(again.iterations, 1);
//! ```

mod config;
mod distance;
mod empty_cluster;
mod error;
mod kmeans;
mod lloyd;
mod observer;
mod partition;

pub use config::{KMeansConfig, CONVERGENCE_TOLERANCE, NUMERIC_ANOMALY_RESIDUAL};
pub use distance::{
    nearest_centroid, ChebyshevDistance, EuclideanDistance, LMetric, ManhattanDistance, Metric,
    SquaredEuclideanDistance,
};
pub use empty_cluster::{
    AllowEmptyClusters, EmptyClusterContext, EmptyClusterPolicy, MaxVarianceNewCluster,
    RandomReseed,
};
pub use error::KMeansError;
pub use kmeans::{ClusterOptions, KMeans, KMeansResult};
pub use lloyd::{assign_points, LloydStep};
pub use observer::{
    DegenerateConfiguration, InitialSource, KMeansEvent, KMeansObserver, NoopObserver,
    RecordingObserver, TracingObserver,
};
pub use partition::{
    centroids_from_assignments, InitialPartition, InitialPartitioner, KMeansPlusPlus,
    RandomPartition, SampleInitialization,
};
