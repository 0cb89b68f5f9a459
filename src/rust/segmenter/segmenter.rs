use std::sync::Arc;

use log::debug;

use super::error::SegmentError;
use super::input::CustomerInput;
use super::model::ClusterModel;
use super::scaler::FeatureScaler;
use super::{ClusterId, SegmenterInfo};

/// Assigns a customer to a segment: validate, scale, then nearest-centroid.
///
/// This is a pure function of its arguments. Passing `None` for either
/// artifact means it failed to load; the call then fails with
/// `ModelUnavailable` without touching the input any further.
///
/// # Errors
/// - `InvalidInput` naming the first field outside its domain
/// - `ModelUnavailable` if the scaler or the model is missing
/// - `PredictionError` if the model cannot produce a label
pub fn predict_segment(
    input: &CustomerInput,
    scaler: Option<&dyn FeatureScaler>,
    model: Option<&dyn ClusterModel>,
) -> Result<ClusterId, SegmentError> {
    input.validate()?;

    let scaler = scaler.ok_or_else(|| SegmentError::ModelUnavailable("scaler is not loaded".into()))?;
    let model = model.ok_or_else(|| SegmentError::ModelUnavailable("clustering model is not loaded".into()))?;

    let scaled = scaler.transform(&input.features());
    debug!("Scaled features: {:?}", scaled);
    model.predict(&scaled.view())
}

/// A thread-safe customer segmenter holding a fitted scaler and clustering model.
///
/// Both artifacts are immutable once loaded, so a single segmenter can be
/// shared across sessions behind an `Arc`.
///
/// ```rust
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use segmenta::{CustomerInput, KMeansModel, Segmenter, StandardScaler};
///
/// let segmenter = Segmenter::builder()
///     .with_scaler(StandardScaler::new(vec![0.0; 3], vec![1.0; 3])?)
///     .with_model(KMeansModel::new(vec![vec![0.0; 3], vec![1000.0; 3]])?)
///     .build()?;
///
/// let cluster = segmenter.predict(&CustomerInput::new(900, 950.0, 1100.0))?;
/// assert_eq!(cluster.0, 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Segmenter {
    pub(crate) scaler_path: String,
    pub(crate) model_path: String,
    pub(crate) scaler: Arc<dyn FeatureScaler>,
    pub(crate) model: Arc<dyn ClusterModel>,
}

// Compile-time verification of thread-safety
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn verify_thread_safety() {
        assert_send_sync::<Segmenter>();
    }
};

impl Segmenter {
    /// Creates a new SegmenterBuilder for fluent construction
    pub fn builder() -> super::builder::SegmenterBuilder {
        super::builder::SegmenterBuilder::new()
    }

    /// Returns information about the loaded artifacts
    pub fn info(&self) -> SegmenterInfo {
        SegmenterInfo {
            scaler_path: self.scaler_path.clone(),
            model_path: self.model_path.clone(),
            num_clusters: self.model.n_clusters(),
            feature_names: self.scaler.feature_names(),
        }
    }

    /// Predicts the segment of one customer
    pub fn predict(&self, input: &CustomerInput) -> Result<ClusterId, SegmentError> {
        predict_segment(input, Some(self.scaler.as_ref()), Some(self.model.as_ref()))
    }

    /// Distance from the customer to every cluster center in scaled space.
    ///
    /// Returns `None` for models that do not expose their centers.
    pub fn distances(&self, input: &CustomerInput) -> Result<Option<Vec<f64>>, SegmentError> {
        input.validate()?;
        let scaled = self.scaler.transform(&input.features());
        Ok(self.model.distances(&scaled.view()))
    }
}
