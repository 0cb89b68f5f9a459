use std::fmt::Debug;
use std::path::Path;

use log::info;
use ndarray::Array1;
use serde::Deserialize;

use super::input::{FEATURE_NAMES, NUM_FEATURES};
use super::utils::all_finite;
use crate::artifact_manager::{read_json, ArtifactError};

/// A fitted transform that maps raw customer features into the space the
/// clustering model was trained in.
///
/// Implementations must be pure: the same features always produce the same output.
pub trait FeatureScaler: Debug + Send + Sync {
    /// Applies the fitted transform to one raw feature vector
    fn transform(&self, features: &[f64; NUM_FEATURES]) -> Array1<f64>;

    /// Names of the features, in the order `transform` expects them
    fn feature_names(&self) -> Vec<String>;
}

/// On-disk layout of an exported standard scaler.
#[derive(Debug, Deserialize)]
struct ScalerFile {
    #[serde(default)]
    feature_names: Option<Vec<String>>,
    #[serde(alias = "mean_")]
    mean: Vec<f64>,
    #[serde(alias = "scale_")]
    scale: Vec<f64>,
}

/// Zero-mean / unit-variance scaler with parameters frozen at training time.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    feature_names: Vec<String>,
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl StandardScaler {
    /// Creates a scaler from its fitted parameters.
    ///
    /// A scale of exactly zero (a constant feature during training) is
    /// replaced by 1.0 so the transform stays finite.
    ///
    /// # Errors
    /// - `Invalid` if either vector does not have one entry per feature
    /// - `Invalid` if any parameter is NaN or infinite
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> Result<Self, ArtifactError> {
        Self::validated(Path::new("<memory>"), None, mean, scale)
    }

    /// Loads an exported scaler from a JSON artifact.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ArtifactError> {
        let path = path.as_ref();
        let raw: ScalerFile = read_json(path)?;
        let scaler = Self::validated(path, raw.feature_names, raw.mean, raw.scale)?;
        info!("Scaler loaded from {:?}", path);
        Ok(scaler)
    }

    fn validated(
        path: &Path,
        feature_names: Option<Vec<String>>,
        mean: Vec<f64>,
        scale: Vec<f64>,
    ) -> Result<Self, ArtifactError> {
        if mean.len() != NUM_FEATURES || scale.len() != NUM_FEATURES {
            return Err(ArtifactError::invalid(path, format!(
                "scaler must have {} means and scales, found {} and {}",
                NUM_FEATURES, mean.len(), scale.len()
            )));
        }
        if !all_finite(&mean) || !all_finite(&scale) {
            return Err(ArtifactError::invalid(path, "scaler parameters must be finite"));
        }

        let feature_names = match feature_names {
            Some(names) if names.len() != NUM_FEATURES => {
                return Err(ArtifactError::invalid(path, format!(
                    "expected {} feature names, found {}", NUM_FEATURES, names.len()
                )));
            }
            Some(names) => names,
            None => FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
        };

        let scale = scale.into_iter()
            .map(|s| if s == 0.0 { 1.0 } else { s })
            .collect();

        Ok(Self {
            feature_names,
            mean: Array1::from_vec(mean),
            scale: Array1::from_vec(scale),
        })
    }
}

impl FeatureScaler for StandardScaler {
    fn transform(&self, features: &[f64; NUM_FEATURES]) -> Array1<f64> {
        let raw = Array1::from_iter(features.iter().copied());
        (raw - &self.mean) / &self.scale
    }

    fn feature_names(&self) -> Vec<String> {
        self.feature_names.clone()
    }
}
