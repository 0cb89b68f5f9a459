use std::path::PathBuf;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use segmenta::{
    predict_segment, AppContext, ArtifactManager, ClusterId, CustomerInput, DashboardError,
    SegmentError, Segmenter, Session, View,
};

fn shipped_artifacts() -> ArtifactManager {
    ArtifactManager::new(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("artifacts"))
}

fn shipped_segmenter() -> Segmenter {
    Segmenter::builder()
        .with_artifacts(&shipped_artifacts())
        .and_then(|builder| builder.build())
        .expect("Failed to load shipped artifacts")
}

#[test]
fn test_bulk_buyer_is_a_whale() -> Result<(), Box<dyn std::error::Error>> {
    let ctx = AppContext::load(&shipped_artifacts());
    let payload = ctx.predict(&CustomerInput::new(1800, 6.0, 10500.0))?;
    assert_eq!(payload.cluster, ClusterId(3));
    assert_eq!(payload.persona.name, "The Whales");
    Ok(())
}

#[test]
fn test_each_persona_is_reachable() -> Result<(), SegmentError> {
    let segmenter = shipped_segmenter();
    assert_eq!(segmenter.predict(&CustomerInput::new(420, 22.0, 6500.0))?, ClusterId(0));
    assert_eq!(segmenter.predict(&CustomerInput::default())?, ClusterId(1));
    assert_eq!(segmenter.predict(&CustomerInput::new(50, 48.0, 1100.0))?, ClusterId(2));
    assert_eq!(segmenter.predict(&CustomerInput::new(1800, 6.0, 10500.0))?, ClusterId(3));
    Ok(())
}

#[test]
fn test_prediction_is_deterministic() -> Result<(), SegmentError> {
    let segmenter = shipped_segmenter();
    let mut rng = StdRng::seed_from_u64(2024);
    for _ in 0..200 {
        let input = CustomerInput::random(&mut rng);
        let first = segmenter.predict(&input)?;
        assert_eq!(segmenter.predict(&input)?, first);
        assert!((0..4).contains(&first.0));
    }
    Ok(())
}

#[test]
fn test_validation_boundaries() {
    let segmenter = shipped_segmenter();

    for (input, field) in [
        (CustomerInput::new(0, 12.5, 1500.0), "total_quantity"),
        (CustomerInput::new(100, -1.0, 1500.0), "avg_unit_price"),
        (CustomerInput::new(100, 12.5, -0.01), "avg_transaction_value"),
    ] {
        let err = segmenter.predict(&input).unwrap_err();
        assert_eq!(err.field(), Some(field));
    }

    assert!(segmenter.predict(&CustomerInput::new(1, 0.0, 0.0)).is_ok());
}

#[test]
fn test_free_function_matches_segmenter() -> Result<(), Box<dyn std::error::Error>> {
    let manager = shipped_artifacts();
    let scaler = segmenta::StandardScaler::from_file(manager.scaler_path())?;
    let model = segmenta::KMeansModel::from_file(manager.model_path())?;
    let segmenter = shipped_segmenter();

    let input = CustomerInput::new(640, 17.25, 2300.0);
    assert_eq!(predict_segment(&input, Some(&scaler), Some(&model))?, segmenter.predict(&input)?);
    Ok(())
}

#[test]
fn test_resolved_view_carries_scatter() -> Result<(), DashboardError> {
    let ctx = Arc::new(AppContext::load(&shipped_artifacts()));
    let sample_rows = ctx.sample().map(|s| s.len()).unwrap_or(0);
    assert!(sample_rows > 0);
    assert!(ctx.warnings().is_empty());

    let mut session = Session::new(ctx);
    session.set_input(CustomerInput::new(1800, 6.0, 10500.0));
    session.predict()?;

    match session.view() {
        View::Resolved(payload) => {
            let plot = payload.scatter.as_ref().expect("sample data is shipped");
            assert_eq!(plot.num_points(), sample_rows);
            assert_eq!(plot.traces.len(), 4);
            assert_eq!(plot.highlight.position.x, 1800.0);
            assert_eq!(payload.input, CustomerInput::new(1800, 6.0, 10500.0));
        }
        View::Idle => panic!("expected a resolved view"),
    }
    Ok(())
}

#[test]
fn test_landing_previews_ten_rows() {
    let ctx = AppContext::load(&shipped_artifacts());
    let text = segmenta::dashboard::render_landing(&ctx);
    for name in ["Big Spender", "The Whales", "Quality Seekers", "Budget Shoppers"] {
        assert!(text.contains(name));
    }
    let header = text.lines().position(|l| l.contains("AvgTransactionValue")).unwrap();
    let rows = text.lines().skip(header + 1).filter(|l| !l.trim().is_empty()).count();
    assert_eq!(rows, 10);
}

#[test]
fn test_payload_serializes_for_renderer() -> Result<(), Box<dyn std::error::Error>> {
    let ctx = AppContext::load(&shipped_artifacts());
    let payload = ctx.predict(&CustomerInput::new(50, 48.0, 1100.0))?;
    let json: serde_json::Value = serde_json::to_value(&payload)?;
    assert_eq!(json["cluster"], 2);
    assert_eq!(json["persona"]["name"], "Quality Seekers");
    assert_eq!(json["persona"]["display_color"], "#ff7f0e");
    assert_eq!(json["scatter"]["highlight"]["symbol"], "x");
    Ok(())
}
