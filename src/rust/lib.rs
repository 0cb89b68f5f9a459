//! Customer segmentation: a fitted scaler and k-means model assign a customer
//! to a cluster, and each cluster is read as a marketing persona.
//!
//! # Basic Usage
//!
//! ```rust
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use segmenta::{CustomerInput, KMeansModel, Segmenter, StandardScaler, resolve_persona};
//!
//! let segmenter = Segmenter::builder()
//!     .with_scaler(StandardScaler::new(vec![300.0, 15.0, 1500.0], vec![400.0, 10.0, 2000.0])?)
//!     .with_model(KMeansModel::new(vec![
//!         vec![0.25, 0.5, 2.25],
//!         vec![-0.6, -1.1, -0.6],
//!         vec![-0.625, 3.0, -0.15],
//!         vec![3.75, -1.0, 3.75],
//!     ])?)
//!     .build()?;
//!
//! let cluster = segmenter.predict(&CustomerInput::new(1800, 6.0, 10500.0))?;
//! let persona = resolve_persona(cluster);
//! assert_eq!(persona.name, "The Whales");
//! # Ok(())
//! # }
//! ```
//!
//! # Loading artifacts
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use segmenta::{AppContext, ArtifactManager, Session};
//!
//! let ctx = Arc::new(AppContext::load(&ArtifactManager::new("artifacts")));
//! let mut session = Session::new(ctx);
//! session.randomize();
//! match session.predict() {
//!     Ok(payload) => println!("{}", payload.persona.name),
//!     Err(e) => eprintln!("{}", e),
//! }
//! ```

pub mod segmenter;
#[cfg(feature = "onnx")]
mod runtime;
pub mod artifact_manager;
pub mod persona;
pub mod dataset;
pub mod dashboard;

pub use segmenter::{
    predict_segment, ClusterId, ClusterModel, CustomerInput, FeatureScaler, KMeansModel,
    SegmentError, Segmenter, SegmenterBuilder, SegmenterInfo, StandardScaler,
};
#[cfg(feature = "onnx")]
pub use segmenter::OnnxClusterModel;
#[cfg(feature = "onnx")]
pub use runtime::{create_session_builder, OptimizationLevel, RuntimeConfig};
pub use artifact_manager::{ArtifactError, ArtifactManager, ArtifactManifest};
pub use persona::{resolve_persona, Persona, PersonaRecord, PersonaTable, PersonaTableError};
pub use dataset::{DatasetError, SampleDataset, SampleRow, ScatterPlot};
pub use dashboard::{AppContext, DashboardError, DisplayPayload, Session, View};

pub fn init_logger() {
    env_logger::init();
}
