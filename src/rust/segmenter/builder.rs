use std::path::Path;
use std::sync::Arc;

use log::info;

use super::model::{ClusterModel, KMeansModel};
use super::scaler::{FeatureScaler, StandardScaler};
use super::segmenter::Segmenter;
use crate::artifact_manager::{ArtifactError, ArtifactManager};
#[cfg(feature = "onnx")]
use crate::runtime::RuntimeConfig;

const IN_MEMORY: &str = "<memory>";

/// A builder for constructing a Segmenter with a fluent interface.
#[derive(Default, Debug)]
pub struct SegmenterBuilder {
    scaler_path: Option<String>,
    model_path: Option<String>,
    scaler: Option<Arc<dyn FeatureScaler>>,
    model: Option<Arc<dyn ClusterModel>>,
    #[cfg(feature = "onnx")]
    runtime_config: RuntimeConfig,
}

impl SegmenterBuilder {
    /// Creates a new empty SegmenterBuilder
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the runtime configuration used when the model is an ONNX graph
    #[cfg(feature = "onnx")]
    pub fn with_runtime_config(mut self, config: RuntimeConfig) -> Self {
        self.runtime_config = config;
        self
    }

    /// Loads the scaler and the model from an artifacts directory.
    ///
    /// When the directory carries a manifest, every file it lists is checked
    /// against its recorded SHA-256 before anything is loaded.
    ///
    /// # Returns
    /// * `Result<Self, ArtifactError>` - The builder instance if successful, or an error if:
    ///   - Artifacts were already set on this builder
    ///   - A manifest is present and a file does not match its digest
    ///   - The scaler or model file is missing or malformed
    pub fn with_artifacts(self, manager: &ArtifactManager) -> Result<Self, ArtifactError> {
        if self.scaler.is_some() || self.model.is_some() {
            return Err(ArtifactError::AlreadySet);
        }
        if let Some(manifest) = manager.load_manifest()? {
            manager.verify_manifest(&manifest)?;
            info!("Artifacts verified against manifest version {}", manifest.version);
        }
        self.with_scaler_file(manager.scaler_path())?
            .with_model_file(manager.model_path())
    }

    /// Loads a standard scaler exported as JSON
    pub fn with_scaler_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ArtifactError> {
        let path = path.as_ref();
        if self.scaler.is_some() {
            return Err(ArtifactError::AlreadySet);
        }
        if !path.exists() {
            return Err(ArtifactError::NotFound(path.to_path_buf()));
        }
        let scaler = StandardScaler::from_file(path)?;
        self.scaler_path = Some(path.to_string_lossy().to_string());
        self.scaler = Some(Arc::new(scaler));
        Ok(self)
    }

    /// Loads a clustering model, picking the backend from the file extension
    ///
    /// `.json` files hold k-means centers; `.onnx` graphs need the `onnx` feature.
    pub fn with_model_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ArtifactError> {
        let path = path.as_ref();
        if self.model.is_some() {
            return Err(ArtifactError::AlreadySet);
        }
        if !path.exists() {
            return Err(ArtifactError::NotFound(path.to_path_buf()));
        }

        let model: Arc<dyn ClusterModel> = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Arc::new(KMeansModel::from_file(path)?),
            #[cfg(feature = "onnx")]
            Some("onnx") => Arc::new(super::model::OnnxClusterModel::from_file(path, &self.runtime_config)?),
            _ => return Err(ArtifactError::UnsupportedFormat(path.to_path_buf())),
        };

        self.model_path = Some(path.to_string_lossy().to_string());
        self.model = Some(model);
        Ok(self)
    }

    /// Uses an already constructed scaler
    pub fn with_scaler(mut self, scaler: impl FeatureScaler + 'static) -> Self {
        self.scaler = Some(Arc::new(scaler));
        self.scaler_path = Some(IN_MEMORY.to_string());
        self
    }

    /// Uses an already constructed clustering model
    pub fn with_model(mut self, model: impl ClusterModel + 'static) -> Self {
        self.model = Some(Arc::new(model));
        self.model_path = Some(IN_MEMORY.to_string());
        self
    }

    /// Builds and returns the final Segmenter instance
    ///
    /// # Returns
    /// * `Result<Segmenter, ArtifactError>` - `Missing` if the scaler or the model was never set
    pub fn build(self) -> Result<Segmenter, ArtifactError> {
        let scaler = self.scaler.ok_or(ArtifactError::Missing("scaler"))?;
        let model = self.model.ok_or(ArtifactError::Missing("clustering model"))?;

        Ok(Segmenter {
            scaler_path: self.scaler_path.unwrap_or_else(|| IN_MEMORY.to_string()),
            model_path: self.model_path.unwrap_or_else(|| IN_MEMORY.to_string()),
            scaler,
            model,
        })
    }
}
