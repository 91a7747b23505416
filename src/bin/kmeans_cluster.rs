//! Cluster the rows of a .npy matrix and save the centroids (and optionally the
//! assignments) as .npy files.
//!
//! Usage: `kmeans-cluster <input.npy> <centroids.npy> <k> <max_iterations> [assignments.npy]`
//!
//! Diagnostics are written to stderr; set `RUST_LOG=debug` to see every iteration.

use lloyd_kmeans::{ClusterOptions, KMeans, KMeansConfig};
use ndarray::{Array1, Array2};
use ndarray_npy::{ReadNpyExt, WriteNpyExt};
use std::env;
use std::fs::File;
use std::io::BufReader;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();

    if args.len() != 5 && args.len() != 6 {
        eprintln!(
            "Usage: {} <input.npy> <centroids.npy> <k> <max_iterations> [assignments.npy]",
            args[0]
        );
        std::process::exit(1);
    }

    let input_path = &args[1];
    let centroids_path = &args[2];
    let k: usize = args[3].parse()?;
    let max_iterations: usize = args[4].parse()?;
    let assignments_path = args.get(5);

    let reader = BufReader::new(File::open(input_path)?);
    let data: Array2<f64> = Array2::read_npy(reader)?;

    tracing::info!(
        n_samples = data.nrows(),
        n_features = data.ncols(),
        k,
        max_iterations,
        "loaded data"
    );

    let mut kmeans = KMeans::with_config(KMeansConfig::new(max_iterations));
    let options = ClusterOptions::new().with_assignments(assignments_path.is_some());
    let result = kmeans.cluster_with(&data.view(), k, options)?;

    let writer = File::create(centroids_path)?;
    result.centroids.write_npy(writer)?;
    tracing::info!(path = %centroids_path, shape = ?result.centroids.shape(), "saved centroids");

    if let (Some(path), Some(assignments)) = (assignments_path, result.assignments) {
        let labels: Array1<u64> = assignments.mapv(|label| label as u64);
        let writer = File::create(path)?;
        labels.write_npy(writer)?;
        tracing::info!(path = %path, "saved assignments");
    }

    Ok(())
}
