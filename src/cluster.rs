use crate::analytics::student_averages;
use crate::data::Record;
use crate::error::{AnalyticsError, Result};
use crate::model::ClusterAssignment;
use linfa::prelude::*;
use linfa_clustering::KMeans;
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};

pub const DEFAULT_CLUSTERS: usize = 3;

/// Seed for the k-means initialisation. Same input and seed, same labels.
pub const DEFAULT_SEED: u64 = 42;

const MAX_ITERATIONS: u64 = 300;
const TOLERANCE: f64 = 1e-4;

pub fn cluster(records: &[Record], k: usize) -> Result<Vec<ClusterAssignment>> {
    cluster_with_seed(records, k, DEFAULT_SEED)
}

/// Groups students into `k` clusters by standardized average Marks.
/// Labels are arbitrary; only equality between labels carries meaning.
pub fn cluster_with_seed(records: &[Record], k: usize, seed: u64) -> Result<Vec<ClusterAssignment>> {
    if k == 0 {
        return Err(AnalyticsError::InvalidArgument(
            "number of clusters must be at least 1".to_string(),
        ));
    }
    let averages = student_averages(records);
    if averages.is_empty() {
        return Err(AnalyticsError::EmptyInput("no students to cluster".to_string()));
    }
    if k > averages.len() {
        return Err(AnalyticsError::InvalidArgument(format!(
            "cannot form {} clusters from {} students",
            k,
            averages.len()
        )));
    }

    let marks: Array1<f64> = averages.iter().map(|e| e.average_marks).collect();
    let scaled = standardize(&marks);
    let labels = fit_labels(&scaled, k, seed)?;
    info!(students = averages.len(), k, seed, "clustered students");

    Ok(averages
        .into_iter()
        .zip(labels)
        .map(|(entry, cluster)| ClusterAssignment {
            name: entry.name,
            marks: entry.average_marks,
            cluster,
        })
        .collect())
}

/// Zero mean, unit variance. With zero variance the values are only
/// centred, never divided.
pub fn standardize(values: &Array1<f64>) -> Array1<f64> {
    let mean = match values.mean() {
        Some(m) => m,
        None => return values.clone(),
    };
    let std = values.std(0.0);
    if std > 0.0 && std.is_finite() {
        values.mapv(|v| (v - mean) / std)
    } else {
        values.mapv(|v| v - mean)
    }
}

fn fit_labels(scaled: &Array1<f64>, k: usize, seed: u64) -> Result<Vec<usize>> {
    // k-means++ cannot seed more centroids than there are distinct points
    let mut distinct = scaled.to_vec();
    distinct.sort_by(|a, b| a.total_cmp(b));
    distinct.dedup();
    let k = k.min(distinct.len());
    if k == 1 {
        debug!("single distinct score, assigning every student to cluster 0");
        return Ok(vec![0; scaled.len()]);
    }

    let features = Array2::from_shape_vec((scaled.len(), 1), scaled.to_vec())
        .map_err(|e| AnalyticsError::Clustering(e.to_string()))?;
    let dataset = DatasetBase::from(features.clone());
    let rng = StdRng::seed_from_u64(seed);
    let model = KMeans::params_with_rng(k, rng)
        .max_n_iterations(MAX_ITERATIONS)
        .tolerance(TOLERANCE)
        .fit(&dataset)
        .map_err(|e| AnalyticsError::Clustering(e.to_string()))?;

    let labels: Array1<usize> = model.predict(&features);
    Ok(labels.to_vec())
}
