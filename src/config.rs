use crate::error::KMeansError;

/// Residual at or below which the clustering loop is considered converged.
pub const CONVERGENCE_TOLERANCE: f64 = 1e-5;

/// Residual substituted for a NaN or infinite residual so that iteration
/// continues without being mistaken for convergence.
pub const NUMERIC_ANOMALY_RESIDUAL: f64 = 1e-4;

/// Configuration for the k-means engine
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansConfig {
    /// Maximum number of Lloyd iterations. `0` removes the iteration cap, so
    /// the run only stops once the residual falls below
    /// [`CONVERGENCE_TOLERANCE`].
    pub max_iterations: usize,

    /// Split the nearest-centroid scans across the rayon thread pool.
    ///
    /// Partial sums are merged in a fixed order, so repeated parallel runs are
    /// bit-identical to each other, but may differ from a serial run in the
    /// last bits of the floating-point sums.
    pub parallel: bool,

    /// Number of points handled by one parallel work item.
    pub chunk_size_data: usize,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            parallel: true,
            chunk_size_data: 4096,
        }
    }
}

impl KMeansConfig {
    /// Create a new configuration with the specified iteration cap
    pub fn new(max_iterations: usize) -> Self {
        Self {
            max_iterations,
            ..Default::default()
        }
    }

    /// Set the maximum number of iterations
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Enable or disable the parallel scans
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Set the data chunk size used by the parallel scans
    pub fn with_chunk_size_data(mut self, chunk_size: usize) -> Self {
        self.chunk_size_data = chunk_size;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), KMeansError> {
        if self.chunk_size_data == 0 {
            return Err(KMeansError::InvalidParameter(
                "chunk_size_data must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
