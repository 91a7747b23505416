//! Basic example demonstrating lloyd-kmeans usage
//!
//! Run with: cargo run --example basic --release

use lloyd_kmeans::{EuclideanDistance, KMeans, KMeansConfig, KMeansPlusPlus, MaxVarianceNewCluster};
use ndarray::Array2;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;

fn main() {
    println!("=== lloyd-kmeans example ===\n");

    // Generate synthetic data: 3 clusters in 2D for easy visualization
    let n_samples = 300;
    let n_features = 2;
    let n_clusters = 3;

    println!("Generating {} samples with {} features...", n_samples, n_features);

    let mut data = Array2::<f64>::zeros((n_samples, n_features));

    // Cluster centers
    let centers = [[-5.0f64, -5.0], [0.0, 5.0], [5.0, -5.0]];

    for i in 0..n_samples {
        let cluster_idx = i % 3;
        let noise = Array2::random((1, n_features), Uniform::new(-1.0f64, 1.0));
        data[[i, 0]] = centers[cluster_idx][0] + noise[[0, 0]];
        data[[i, 1]] = centers[cluster_idx][1] + noise[[0, 1]];
    }

    println!("True cluster centers:");
    for (i, center) in centers.iter().enumerate() {
        println!("  Cluster {}: ({:.2}, {:.2})", i, center[0], center[1]);
    }
    println!();

    println!("Running k-means with k={}...\n", n_clusters);

    let mut kmeans = KMeans::with_policies(
        KMeansConfig::new(100),
        EuclideanDistance,
        KMeansPlusPlus::new(42),
        MaxVarianceNewCluster::new(),
    );
    let result = kmeans
        .cluster(&data.view(), n_clusters)
        .expect("Clustering failed");

    println!(
        "Finished after {} iterations ({}), {} distance calculations",
        result.iterations,
        if result.converged { "converged" } else { "iteration limit" },
        result.distance_calculations
    );

    println!("\nLearned centroids:");
    for (i, centroid) in result.centroids.outer_iter().enumerate() {
        println!("  Centroid {}: ({:.4}, {:.4})", i, centroid[0], centroid[1]);
    }
    println!();

    let labels = result.assignments.expect("assignments were requested");

    let mut cluster_counts = vec![0usize; n_clusters];
    for &label in labels.iter() {
        cluster_counts[label] += 1;
    }

    println!("Cluster distribution:");
    for (i, count) in cluster_counts.iter().enumerate() {
        println!(
            "  Cluster {}: {} samples ({:.1}%)",
            i,
            count,
            (*count as f64 / n_samples as f64) * 100.0
        );
    }
    println!();

    println!("First 10 sample assignments:");
    for i in 0..10 {
        println!(
            "  Sample {} at ({:.2}, {:.2}) -> Cluster {}",
            i,
            data[[i, 0]],
            data[[i, 1]],
            labels[i]
        );
    }

    println!("\n=== Done! ===");
}
