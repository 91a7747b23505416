//! Diagnostic events emitted while clustering.
//!
//! The engine reports everything it would otherwise log through a
//! [`KMeansObserver`]. [`TracingObserver`] forwards events to `tracing` and is
//! installed by default.

use std::fmt;
use std::sync::Mutex;

use tracing::{debug, info, warn};

/// A configuration the engine can run with, but which is unlikely to give
/// meaningful clusters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegenerateConfiguration {
    /// Zero clusters were requested.
    ZeroClusters,
    /// More clusters were requested than there are points; some clusters will
    /// be empty.
    MoreClustersThanPoints { k: usize, n: usize },
    /// `max_iterations == 0`: only convergence can end the run.
    UnboundedIterations,
}

impl fmt::Display for DegenerateConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroClusters => write!(f, "zero clusters requested"),
            Self::MoreClustersThanPoints { k, n } => {
                write!(f, "more clusters requested ({k}) than points given ({n})")
            }
            Self::UnboundedIterations => {
                write!(f, "no iteration limit, run ends only on convergence")
            }
        }
    }
}

/// Where the starting centroids came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitialSource {
    CentroidGuess,
    AssignmentGuess,
    PartitionerCentroids,
    PartitionerAssignments,
    /// `k == 0`: there is nothing to initialize.
    NoClusters,
}

#[derive(Debug, Clone, PartialEq)]
pub enum KMeansEvent {
    Degenerate(DegenerateConfiguration),
    Initialized {
        from: InitialSource,
    },
    EmptyCluster {
        iteration: usize,
        cluster: usize,
        points_changed: usize,
    },
    IterationComplete {
        iteration: usize,
        residual: f64,
    },
    /// The residual was NaN or infinite and has been replaced by the sentinel.
    NumericAnomaly {
        iteration: usize,
        residual: f64,
    },
    Finished {
        iterations: usize,
        converged: bool,
        distance_calculations: usize,
    },
}

/// Receiver for [`KMeansEvent`]s.
pub trait KMeansObserver: Send + Sync {
    fn on_event(&self, event: &KMeansEvent);
}

/// Forwards events to the `tracing` subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl KMeansObserver for TracingObserver {
    fn on_event(&self, event: &KMeansEvent) {
        match event {
            KMeansEvent::Degenerate(condition) => {
                warn!(%condition, "degenerate k-means configuration");
            }
            KMeansEvent::Initialized { from } => {
                debug!(?from, "initial centroids ready");
            }
            KMeansEvent::EmptyCluster {
                iteration,
                cluster,
                points_changed,
            } => {
                debug!(iteration, cluster, points_changed, "cluster is empty");
            }
            KMeansEvent::IterationComplete {
                iteration,
                residual,
            } => {
                debug!(iteration, residual, "k-means iteration complete");
            }
            KMeansEvent::NumericAnomaly {
                iteration,
                residual,
            } => {
                debug!(iteration, residual, "non-finite residual, continuing");
            }
            KMeansEvent::Finished {
                iterations,
                converged,
                distance_calculations,
            } => {
                if *converged {
                    info!(iterations, distance_calculations, "k-means converged");
                } else {
                    info!(
                        iterations,
                        distance_calculations, "k-means terminated at iteration limit"
                    );
                }
            }
        }
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl KMeansObserver for NoopObserver {
    fn on_event(&self, _event: &KMeansEvent) {}
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<KMeansEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events recorded so far.
    pub fn events(&self) -> Vec<KMeansEvent> {
        self.lock().clone()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<KMeansEvent>> {
        // A poisoned lock only means another recorder panicked mid-push.
        self.events.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl KMeansObserver for RecordingObserver {
    fn on_event(&self, event: &KMeansEvent) {
        self.lock().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_observer_keeps_order() {
        let observer = RecordingObserver::new();
        observer.on_event(&KMeansEvent::Degenerate(DegenerateConfiguration::ZeroClusters));
        observer.on_event(&KMeansEvent::IterationComplete {
            iteration: 1,
            residual: 0.5,
        });

        let events = observer.events();
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0],
            KMeansEvent::Degenerate(DegenerateConfiguration::ZeroClusters)
        );

        observer.clear();
        assert!(observer.events().is_empty());
    }

    #[test]
    fn test_degenerate_display() {
        let text = DegenerateConfiguration::MoreClustersThanPoints { k: 10, n: 3 }.to_string();
        assert!(text.contains("10"));
        assert!(text.contains('3'));
    }
}
