use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use log;

use crate::dataset::{DatasetError, SampleDataset};
use crate::persona::{Persona, PersonaTable};
use crate::segmenter::ClusterId;

pub const SCALER_FILE: &str = "scaler.json";
pub const MODEL_FILE: &str = "kmeans_model.json";
pub const ONNX_MODEL_FILE: &str = "kmeans_model.onnx";
pub const SAMPLE_DATA_FILE: &str = "cluster_data.csv";
pub const MANIFEST_FILE: &str = "manifest.json";

/// Environment variable overriding the artifacts directory
pub const HOME_ENV: &str = "SEGMENTA_HOME";

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("Artifact not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
    #[error("Invalid artifact {}: {reason}", path.display())]
    Invalid { path: PathBuf, reason: String },
    #[error("Hash mismatch: expected {expected}, got {actual} for {file}")]
    HashMismatch {
        file: String,
        expected: String,
        actual: String,
    },
    #[error("Unsupported artifact format: {}", .0.display())]
    UnsupportedFormat(PathBuf),
    #[error("No {0} loaded")]
    Missing(&'static str),
    #[error("Artifacts already set")]
    AlreadySet,
}

impl ArtifactError {
    pub(crate) fn invalid(path: &Path, reason: impl Into<String>) -> Self {
        ArtifactError::Invalid {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

/// Reads and deserializes one JSON artifact, attributing failures to the file.
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let bytes = fs::read(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => ArtifactError::NotFound(path.to_path_buf()),
        _ => ArtifactError::IoError(e),
    })?;
    serde_json::from_slice(&bytes).map_err(|e| ArtifactError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Version pin for a set of artifacts.
///
/// The cluster numbering of a k-means model changes whenever it is retrained,
/// so the persona mapping travels with the artifacts it was calibrated on.
#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactManifest {
    pub version: String,
    /// File name (relative to the artifacts directory) to lowercase hex SHA-256
    #[serde(default)]
    pub files: BTreeMap<String, String>,
    /// Cluster id to persona mapping calibrated on these files
    #[serde(default)]
    pub personas: Option<BTreeMap<ClusterId, Persona>>,
}

#[derive(Debug, Clone)]
pub struct ArtifactManager {
    artifacts_dir: PathBuf,
}

impl ArtifactManager {
    /// Creates an ArtifactManager over the default artifacts directory
    pub fn new_default() -> Self {
        Self::new(Self::get_default_artifacts_dir())
    }

    /// Returns the default artifacts directory path
    pub fn get_default_artifacts_dir() -> PathBuf {
        // 1. Check environment variable
        if let Ok(path) = env::var(HOME_ENV) {
            return PathBuf::from(path).join("artifacts");
        }

        // 2. Artifacts next to the working directory, as the dashboard ships them
        let local = PathBuf::from("artifacts");
        if local.join(SCALER_FILE).exists() {
            return local;
        }

        // 3. Use platform-specific data directory
        if let Some(data_dir) = dirs::data_dir() {
            return data_dir.join("segmenta").join("artifacts");
        }

        // 4. If all else fails, stay relative to the working directory
        local
    }

    pub fn new<P: AsRef<Path>>(artifacts_dir: P) -> Self {
        Self {
            artifacts_dir: artifacts_dir.as_ref().to_path_buf(),
        }
    }

    pub fn artifacts_dir(&self) -> &Path {
        &self.artifacts_dir
    }

    pub fn scaler_path(&self) -> PathBuf {
        self.artifacts_dir.join(SCALER_FILE)
    }

    /// Path of the clustering model; a JSON export wins over an ONNX one
    pub fn model_path(&self) -> PathBuf {
        let json = self.artifacts_dir.join(MODEL_FILE);
        let onnx = self.artifacts_dir.join(ONNX_MODEL_FILE);
        if !json.exists() && onnx.exists() {
            onnx
        } else {
            json
        }
    }

    pub fn sample_data_path(&self) -> PathBuf {
        self.artifacts_dir.join(SAMPLE_DATA_FILE)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.artifacts_dir.join(MANIFEST_FILE)
    }

    /// Reads the manifest if the directory has one
    pub fn load_manifest(&self) -> Result<Option<ArtifactManifest>, ArtifactError> {
        let path = self.manifest_path();
        if !path.exists() {
            log::debug!("No manifest at {:?}", path);
            return Ok(None);
        }
        let manifest: ArtifactManifest = read_json(&path)?;
        log::info!("Loaded manifest version {} ({} files)", manifest.version, manifest.files.len());
        Ok(Some(manifest))
    }

    /// Persona mapping for these artifacts: the manifest's, or the built-in one.
    ///
    /// A pinned mapping must assign each of the four personas to exactly one
    /// of the ids `0..4`; anything else is `Invalid`.
    pub fn persona_table(&self) -> Result<PersonaTable, ArtifactError> {
        match self.load_manifest()?.and_then(|manifest| manifest.personas) {
            Some(mapping) => PersonaTable::try_from(mapping)
                .map_err(|e| ArtifactError::invalid(&self.manifest_path(), e.to_string())),
            None => Ok(PersonaTable::default()),
        }
    }

    pub fn file_hash(&self, path: &Path) -> Result<String, ArtifactError> {
        let bytes = fs::read(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ArtifactError::NotFound(path.to_path_buf()),
            _ => ArtifactError::IoError(e),
        })?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(format!("{:x}", hasher.finalize()))
    }

    fn verify_file(&self, path: &Path, expected_hash: &str) -> Result<bool, ArtifactError> {
        log::info!("Verifying file: {:?}", path);
        let hash = self.file_hash(path)?;
        log::debug!("Calculated hash: {}", hash);
        log::debug!("Expected hash:   {}", expected_hash);
        Ok(hash.eq_ignore_ascii_case(expected_hash))
    }

    /// Checks every file listed in the manifest against its digest
    pub fn verify_manifest(&self, manifest: &ArtifactManifest) -> Result<(), ArtifactError> {
        for (file, expected) in &manifest.files {
            let path = self.artifacts_dir.join(file);
            if !self.verify_file(&path, expected)? {
                let actual = self.file_hash(&path)?;
                log::error!("{} hash mismatch: expected {}, got {}", file, expected, actual);
                return Err(ArtifactError::HashMismatch {
                    file: file.clone(),
                    expected: expected.clone(),
                    actual,
                });
            }
        }
        Ok(())
    }

    /// Loads the sample dataset used for the comparison plot.
    ///
    /// A missing or unreadable file only degrades the display; callers turn
    /// the error into a warning rather than failing.
    pub fn load_sample_dataset(&self, personas: &PersonaTable) -> Result<SampleDataset, DatasetError> {
        let path = self.sample_data_path();
        let dataset = SampleDataset::from_file(&path, personas).map_err(|e| {
            log::warn!("Sample dataset unavailable: {}", e);
            e
        })?;
        log::info!("Loaded {} sample rows from {:?}", dataset.len(), path);
        Ok(dataset)
    }
}
