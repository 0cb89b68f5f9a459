use std::fmt;

use serde::{Deserialize, Serialize};

mod error;
mod input;
mod scaler;
mod model;
mod segmenter;
pub mod builder;
mod utils;

pub use error::SegmentError;
pub use input::{CustomerInput, FEATURE_NAMES, NUM_FEATURES};
pub use scaler::{FeatureScaler, StandardScaler};
pub use model::{ClusterModel, KMeansModel};
#[cfg(feature = "onnx")]
pub use model::OnnxClusterModel;
pub use segmenter::{predict_segment, Segmenter};
pub use builder::SegmenterBuilder;

/// Identifier of a customer segment as numbered by the clustering model.
///
/// Signed so that every integer, including ones a model could never emit,
/// can still be handed to the persona resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterId(pub i64);

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ClusterId {
    fn from(id: i64) -> Self {
        ClusterId(id)
    }
}

/// Information about the artifacts a segmenter was built from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmenterInfo {
    /// Path to the scaler artifact
    pub scaler_path: String,
    /// Path to the clustering model artifact
    pub model_path: String,
    /// Number of clusters, when the model exposes it
    pub num_clusters: Option<usize>,
    /// Feature names in the order the scaler expects them
    pub feature_names: Vec<String>,
}
