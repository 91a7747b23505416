use thiserror::Error;

/// Error types for the lloyd-kmeans library.
///
/// Every variant is a fatal configuration error: it is raised before the
/// first iteration and no partial output is produced.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum KMeansError {
    /// The initial centroid guess holds the wrong number of centroids
    #[error("Wrong number of initial centroids: expected {expected}, got {actual}")]
    InvalidCentroidCount { expected: usize, actual: usize },

    /// The initial centroid guess has the wrong dimensionality
    #[error("Initial centroids have wrong dimensionality: expected {expected}, got {actual}")]
    InvalidCentroidDimensions { expected: usize, actual: usize },

    /// The initial assignment guess is not one label per point
    #[error("Initial assignments have length {actual}, but the dataset has {expected} points")]
    InvalidAssignmentLength { expected: usize, actual: usize },

    /// An initial assignment names a cluster that does not exist
    #[error("Point {point} is assigned to cluster {cluster}, but only {k} clusters were requested")]
    AssignmentOutOfRange { point: usize, cluster: usize, k: usize },

    /// An initial partitioner returned output of the wrong shape
    #[error("Invalid initial partition: {0}")]
    InvalidPartition(String),

    /// A configuration or policy parameter is out of range
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}
