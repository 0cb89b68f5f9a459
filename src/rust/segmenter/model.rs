use std::fmt::Debug;
use std::path::Path;

use log::info;
use ndarray::{Array2, ArrayView1};
use serde::Deserialize;

use super::error::SegmentError;
use super::input::NUM_FEATURES;
use super::utils::{all_finite, argmin, squared_distance};
use super::ClusterId;
use crate::artifact_manager::{read_json, ArtifactError};

/// A fitted cluster-assignment function over scaled feature vectors.
pub trait ClusterModel: Debug + Send + Sync {
    /// Number of clusters the model can assign, when the artifact exposes it
    fn n_clusters(&self) -> Option<usize>;

    /// Assigns a scaled feature vector to a cluster
    fn predict(&self, scaled: &ArrayView1<f64>) -> Result<ClusterId, SegmentError>;

    /// Distance from the scaled vector to every cluster center, if the model has centers
    fn distances(&self, _scaled: &ArrayView1<f64>) -> Option<Vec<f64>> {
        None
    }
}

#[derive(Debug, Deserialize)]
struct KMeansFile {
    #[serde(alias = "cluster_centers_")]
    cluster_centers: Vec<Vec<f64>>,
    #[serde(default)]
    n_clusters: Option<usize>,
}

/// Nearest-centroid assignment using the centers of a fitted k-means model.
#[derive(Debug, Clone, PartialEq)]
pub struct KMeansModel {
    centers: Array2<f64>,
}

impl KMeansModel {
    /// Creates a model from its cluster centers (one row per cluster).
    pub fn new(centers: Vec<Vec<f64>>) -> Result<Self, ArtifactError> {
        Self::validated(Path::new("<memory>"), centers, None)
    }

    /// Loads exported k-means centers from a JSON artifact.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ArtifactError> {
        let path = path.as_ref();
        let raw: KMeansFile = read_json(path)?;
        let model = Self::validated(path, raw.cluster_centers, raw.n_clusters)?;
        info!("K-means model loaded from {:?} ({} clusters)", path, model.centers.nrows());
        Ok(model)
    }

    fn validated(path: &Path, centers: Vec<Vec<f64>>, declared: Option<usize>) -> Result<Self, ArtifactError> {
        if centers.is_empty() {
            return Err(ArtifactError::invalid(path, "model must have at least one cluster center"));
        }
        if let Some(declared) = declared {
            if declared != centers.len() {
                return Err(ArtifactError::invalid(path, format!(
                    "n_clusters is {} but {} centers were provided", declared, centers.len()
                )));
            }
        }
        if let Some(pos) = centers.iter().position(|c| c.len() != NUM_FEATURES) {
            return Err(ArtifactError::invalid(path, format!(
                "center {} has {} dimensions, expected {}", pos, centers[pos].len(), NUM_FEATURES
            )));
        }

        let k = centers.len();
        let flat: Vec<f64> = centers.into_iter().flatten().collect();
        if !all_finite(&flat) {
            return Err(ArtifactError::invalid(path, "cluster centers must be finite"));
        }
        let centers = Array2::from_shape_vec((k, NUM_FEATURES), flat)
            .map_err(|e| ArtifactError::invalid(path, format!("failed to shape centers: {}", e)))?;

        Ok(Self { centers })
    }

    fn center_distances(&self, scaled: &ArrayView1<f64>) -> Vec<f64> {
        self.centers.rows()
            .into_iter()
            .map(|center| squared_distance(scaled, &center))
            .collect()
    }
}

impl ClusterModel for KMeansModel {
    fn n_clusters(&self) -> Option<usize> {
        Some(self.centers.nrows())
    }

    fn predict(&self, scaled: &ArrayView1<f64>) -> Result<ClusterId, SegmentError> {
        if scaled.len() != NUM_FEATURES {
            return Err(SegmentError::PredictionError(format!(
                "expected {} scaled features, got {}", NUM_FEATURES, scaled.len()
            )));
        }
        let distances = self.center_distances(scaled);
        argmin(&distances)
            .map(|i| ClusterId(i as i64))
            .ok_or_else(|| SegmentError::PredictionError("model has no cluster centers".into()))
    }

    fn distances(&self, scaled: &ArrayView1<f64>) -> Option<Vec<f64>> {
        Some(self.center_distances(scaled).into_iter().map(f64::sqrt).collect())
    }
}

#[cfg(feature = "onnx")]
pub use self::onnx::OnnxClusterModel;

#[cfg(feature = "onnx")]
mod onnx {
    use std::collections::HashMap;
    use std::path::Path;

    use log::info;
    use ndarray::{Array2, ArrayView1};
    use ort::session::Session;
    use ort::value::Tensor;

    use super::ClusterModel;
    use crate::artifact_manager::ArtifactError;
    use crate::runtime::{create_session_builder, RuntimeConfig};
    use crate::segmenter::error::SegmentError;
    use crate::segmenter::input::NUM_FEATURES;
    use crate::segmenter::ClusterId;

    /// A clustering model exported to ONNX.
    ///
    /// The graph is expected to take one float input of shape `[N, 3]` and to
    /// return the int64 cluster labels as its first output.
    #[derive(Debug)]
    pub struct OnnxClusterModel {
        session: Session,
        input_name: String,
    }

    impl OnnxClusterModel {
        pub fn from_file<P: AsRef<Path>>(path: P, config: &RuntimeConfig) -> Result<Self, ArtifactError> {
            let path = path.as_ref();
            let session = create_session_builder(config)
                .and_then(|builder| builder.commit_from_file(path))
                .map_err(|e| ArtifactError::invalid(path, format!("failed to load ONNX model: {}", e)))?;

            let input_name = session.inputs.first()
                .map(|input| input.name.clone())
                .ok_or_else(|| ArtifactError::invalid(path, "model must have one input"))?;
            if session.outputs.is_empty() {
                return Err(ArtifactError::invalid(path, "model must have at least 1 output for labels"));
            }

            info!("ONNX cluster model loaded from {:?} (input '{}')", path, input_name);
            Ok(Self { session, input_name })
        }
    }

    impl ClusterModel for OnnxClusterModel {
        fn n_clusters(&self) -> Option<usize> {
            None
        }

        fn predict(&self, scaled: &ArrayView1<f64>) -> Result<ClusterId, SegmentError> {
            let input_array = Array2::from_shape_vec((1, NUM_FEATURES),
                scaled.iter().map(|&x| x as f32).collect())
                .map_err(|e| SegmentError::PredictionError(format!("Failed to create input array: {}", e)))?;
            let input_dyn = input_array.into_dyn();
            let input = input_dyn.as_standard_layout();

            let mut input_tensors = HashMap::new();
            input_tensors.insert(self.input_name.as_str(), Tensor::from_array(&input)
                .map_err(|e| SegmentError::PredictionError(format!("Failed to create input tensor: {}", e)))?);

            let outputs = self.session.run(input_tensors)?;
            let labels = outputs[0].try_extract_tensor::<i64>()?;
            labels.iter()
                .next()
                .map(|&label| ClusterId(label))
                .ok_or_else(|| SegmentError::PredictionError("Model returned no label".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn two_cluster_model() -> KMeansModel {
        KMeansModel::new(vec![vec![0.0, 0.0, 0.0], vec![10.0, 10.0, 10.0]]).unwrap()
    }

    #[test]
    fn test_nearest_center() {
        let model = two_cluster_model();
        assert_eq!(model.predict(&array![1.0, 1.0, 1.0].view()).unwrap(), ClusterId(0));
        assert_eq!(model.predict(&array![9.0, 8.0, 9.5].view()).unwrap(), ClusterId(1));
    }

    #[test]
    fn test_equidistant_goes_to_lowest_id() {
        let model = two_cluster_model();
        assert_eq!(model.predict(&array![5.0, 5.0, 5.0].view()).unwrap(), ClusterId(0));
    }

    #[test]
    fn test_distances() {
        let model = two_cluster_model();
        let distances = model.distances(&array![0.0, 0.0, 0.0].view()).unwrap();
        assert_eq!(distances.len(), 2);
        assert_eq!(distances[0], 0.0);
        assert!((distances[1] - 300f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_centers() {
        assert!(KMeansModel::new(vec![]).is_err());
        assert!(KMeansModel::new(vec![vec![1.0, 2.0]]).is_err());
        assert!(KMeansModel::new(vec![vec![1.0, f64::INFINITY, 2.0]]).is_err());
    }

    #[test]
    fn test_declared_cluster_count_must_match() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("kmeans_model.json");
        std::fs::write(&path, r#"{"cluster_centers_": [[0, 0, 0]], "n_clusters": 4}"#)?;
        assert!(matches!(KMeansModel::from_file(&path), Err(ArtifactError::Invalid { .. })));
        Ok(())
    }

    #[cfg(feature = "onnx")]
    #[test]
    fn test_onnx_model_rejects_malformed_graph() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("kmeans_model.onnx");
        std::fs::write(&path, b"\x80\x04 not a protobuf graph")?;

        let result = OnnxClusterModel::from_file(&path, &crate::runtime::RuntimeConfig::default());
        match result {
            Err(ArtifactError::Invalid { path: p, reason }) => {
                assert_eq!(p, path);
                assert!(reason.contains("failed to load ONNX model"));
            }
            Err(other) => panic!("expected an invalid artifact, got {}", other),
            Ok(_) => panic!("a malformed graph should not load"),
        }
        Ok(())
    }
}
