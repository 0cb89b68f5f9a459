use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use segmenta::{
    AppContext, ArtifactError, ArtifactManager, ClusterId, CustomerInput, DashboardError, Segmenter, Session,
};

fn shipped_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("artifacts")
}

/// Copies the named shipped artifacts into a fresh directory.
fn artifacts_with(files: &[&str]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for file in files {
        fs::copy(shipped_dir().join(file), dir.path().join(file)).unwrap();
    }
    dir
}

fn write(dir: &Path, file: &str, contents: &str) {
    fs::write(dir.join(file), contents).unwrap();
}

#[test]
fn test_missing_model_blocks_prediction() {
    let dir = artifacts_with(&["scaler.json", "cluster_data.csv"]);
    let ctx = AppContext::load(&ArtifactManager::new(dir.path()));

    assert!(!ctx.can_predict());
    assert!(matches!(ctx.load_error(), Some(ArtifactError::NotFound(_))));

    let mut session = Session::new(Arc::new(ctx));
    let err = session.predict().unwrap_err();
    assert!(matches!(err, DashboardError::ArtifactLoad(_)));
}

#[test]
fn test_corrupt_scaler_blocks_prediction() {
    let dir = artifacts_with(&["kmeans_model.json"]);
    write(dir.path(), "scaler.json", "\u{80}\u{4}joblib pickle");
    let ctx = AppContext::load(&ArtifactManager::new(dir.path()));

    assert!(matches!(ctx.load_error(), Some(ArtifactError::Parse { .. })));
    assert!(matches!(
        ctx.predict(&CustomerInput::new(1800, 6.0, 10500.0)),
        Err(DashboardError::ArtifactLoad(_))
    ));
}

#[test]
fn test_missing_sample_data_only_warns() -> Result<(), DashboardError> {
    let dir = artifacts_with(&["scaler.json", "kmeans_model.json"]);
    let ctx = AppContext::load(&ArtifactManager::new(dir.path()));

    assert!(ctx.can_predict());
    assert!(ctx.sample().is_none());
    assert_eq!(ctx.warnings().len(), 1);

    let payload = ctx.predict(&CustomerInput::new(1800, 6.0, 10500.0))?;
    assert_eq!(payload.persona.name, "The Whales");
    assert!(payload.scatter.is_none());
    Ok(())
}

#[test]
fn test_manifest_hash_mismatch_is_rejected() {
    let dir = artifacts_with(&["scaler.json", "kmeans_model.json", "manifest.json"]);
    write(dir.path(), "kmeans_model.json", r#"{"cluster_centers": [[0, 0, 0], [1, 1, 1]]}"#);

    let result = Segmenter::builder().with_artifacts(&ArtifactManager::new(dir.path()));
    match result {
        Err(ArtifactError::HashMismatch { file, .. }) => assert_eq!(file, "kmeans_model.json"),
        other => panic!("expected hash mismatch, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_manifest_pins_persona_mapping() -> Result<(), DashboardError> {
    let dir = artifacts_with(&["scaler.json", "kmeans_model.json"]);
    // Mapping calibrated for some other training run.
    write(
        dir.path(),
        "manifest.json",
        r#"{"version": "retrained", "personas": {"0": "the_whales", "1": "quality_seekers", "2": "big_spender", "3": "budget_shoppers"}}"#,
    );
    let ctx = AppContext::load(&ArtifactManager::new(dir.path()));
    assert!(ctx.can_predict());

    let payload = ctx.predict(&CustomerInput::new(1800, 6.0, 10500.0))?;
    assert_eq!(payload.cluster, ClusterId(3));
    assert_eq!(payload.persona.name, "Budget Shoppers");

    let payload = ctx.predict(&CustomerInput::new(50, 48.0, 1100.0))?;
    assert_eq!(payload.cluster, ClusterId(2));
    assert_eq!(payload.persona.name, "Big Spender");
    Ok(())
}

#[test]
fn test_partial_persona_mapping_is_rejected() {
    let dir = artifacts_with(&["scaler.json", "kmeans_model.json", "cluster_data.csv"]);
    write(dir.path(), "manifest.json", r#"{"version": "retrained", "personas": {"0": "big_spender", "3": "budget_shoppers"}}"#);
    let ctx = AppContext::load(&ArtifactManager::new(dir.path()));

    assert!(!ctx.can_predict());
    assert!(matches!(ctx.load_error(), Some(ArtifactError::Invalid { .. })));
}

#[test]
fn test_duplicate_persona_mapping_is_rejected() {
    let dir = artifacts_with(&["scaler.json", "kmeans_model.json"]);
    write(
        dir.path(),
        "manifest.json",
        r#"{"version": "retrained", "personas": {"0": "the_whales", "1": "the_whales", "2": "the_whales", "3": "the_whales"}}"#,
    );
    let ctx = AppContext::load(&ArtifactManager::new(dir.path()));

    assert!(!ctx.can_predict());
    match ctx.load_error() {
        Some(ArtifactError::Invalid { path, reason }) => {
            assert!(path.ends_with("manifest.json"));
            assert!(reason.contains("The Whales"));
        }
        other => panic!("expected invalid persona mapping, got {:?}", other),
    }
    assert!(matches!(
        ctx.predict(&CustomerInput::new(50, 48.0, 1100.0)),
        Err(DashboardError::ArtifactLoad(_))
    ));
}

#[test]
fn test_model_cluster_count_must_match_persona_mapping() {
    let dir = artifacts_with(&["scaler.json"]);
    write(dir.path(), "kmeans_model.json", r#"{"cluster_centers": [[0, 0, 0], [1, 1, 1], [2, 2, 2]]}"#);
    let ctx = AppContext::load(&ArtifactManager::new(dir.path()));

    assert!(!ctx.can_predict());
    match ctx.load_error() {
        Some(ArtifactError::Invalid { reason, .. }) => assert!(reason.contains("3 clusters"), "{}", reason),
        other => panic!("expected cluster count mismatch, got {:?}", other),
    }
}

#[test]
fn test_corrupt_sample_data_warning_names_the_cause() {
    let dir = artifacts_with(&["scaler.json", "kmeans_model.json"]);
    write(dir.path(), "cluster_data.csv", "TotalQuantity,AvgTransactionValue,AvgUnitPrice,Cluster\nabc,1,1,0\n");
    let ctx = AppContext::load(&ArtifactManager::new(dir.path()));

    assert!(ctx.can_predict());
    assert!(ctx.sample().is_none());
    assert_eq!(ctx.warnings().len(), 1);
    assert!(ctx.warnings()[0].contains("CSV parse error at line 2"), "{}", ctx.warnings()[0]);
    assert!(!ctx.warnings()[0].contains("not found"));
}

#[test]
fn test_sample_rows_without_persona_column_get_one() {
    let dir = artifacts_with(&["scaler.json", "kmeans_model.json", "cluster_data.csv"]);
    let ctx = AppContext::load(&ArtifactManager::new(dir.path()));
    let sample = ctx.sample().expect("sample data present");
    assert!(sample.rows().iter().all(|row| row.persona.is_some()));
}
