//! Session layer of the segmentation dashboard.
//!
//! [`AppContext`] holds what is loaded once per process (segmenter, persona
//! table, sample dataset) and is shared read-only. [`Session`] holds what one
//! user changes: the three input fields and the current [`View`].

use std::fmt::Write as _;
use std::io::{self, BufRead, Write};
use std::sync::Arc;

use log::{error, info, warn};
use rand::Rng;
use serde::Serialize;

use crate::artifact_manager::{ArtifactError, ArtifactManager, SAMPLE_DATA_FILE};
use crate::dataset::{DatasetError, SampleDataset, SampleRow, ScatterPlot, PREVIEW_ROWS};
use crate::persona::{Persona, PersonaRecord, PersonaTable};
use crate::segmenter::{ClusterId, CustomerInput, SegmentError, Segmenter};

#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    #[error("Model or scaler not loaded: {0}")]
    ArtifactLoad(Arc<ArtifactError>),
    #[error(transparent)]
    Segment(#[from] SegmentError),
}

/// Process-wide, immutable state of the dashboard.
#[derive(Debug)]
pub struct AppContext {
    segmenter: Result<Arc<Segmenter>, Arc<ArtifactError>>,
    sample: Option<SampleDataset>,
    personas: PersonaTable,
    warnings: Vec<String>,
}

impl AppContext {
    /// Loads every artifact once. Never fails: a broken scaler, model or
    /// persona mapping disables prediction, a missing or unreadable sample
    /// dataset only adds a warning.
    pub fn load(manager: &ArtifactManager) -> Self {
        info!("Loading artifacts from {:?}", manager.artifacts_dir());
        let (personas, segmenter) = match manager.persona_table() {
            Ok(personas) => {
                let segmenter = build_segmenter(manager, &personas);
                (personas, segmenter)
            }
            Err(e) => {
                warn!("Persona mapping rejected, prediction disabled: {}", e);
                (PersonaTable::default(), Err(e))
            }
        };
        let sample = manager.load_sample_dataset(&personas);
        Self::from_parts(segmenter, sample, personas)
    }

    pub fn from_parts(
        segmenter: Result<Segmenter, ArtifactError>,
        sample: Result<SampleDataset, DatasetError>,
        personas: PersonaTable,
    ) -> Self {
        let mut warnings = Vec::new();
        let sample = match sample {
            Ok(sample) => Some(sample),
            Err(e) => {
                warnings.push(sample_warning(&e));
                None
            }
        };
        let segmenter = match segmenter {
            Ok(segmenter) => Ok(Arc::new(segmenter)),
            Err(e) => {
                error!("Error loading artifacts: {}", e);
                Err(Arc::new(e))
            }
        };
        Self {
            segmenter,
            sample,
            personas,
            warnings,
        }
    }

    pub fn segmenter(&self) -> Result<&Segmenter, DashboardError> {
        self.segmenter
            .as_deref()
            .map_err(|e| DashboardError::ArtifactLoad(Arc::clone(e)))
    }

    /// Whether the predict action is enabled
    pub fn can_predict(&self) -> bool {
        self.segmenter.is_ok()
    }

    pub fn load_error(&self) -> Option<&ArtifactError> {
        self.segmenter.as_ref().err().map(|e| &**e)
    }

    pub fn sample(&self) -> Option<&SampleDataset> {
        self.sample.as_ref()
    }

    pub fn personas(&self) -> &PersonaTable {
        &self.personas
    }

    /// Non-fatal problems found while loading
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Runs the whole pipeline for one customer: infer, resolve, plot.
    pub fn predict(&self, input: &CustomerInput) -> Result<DisplayPayload, DashboardError> {
        let segmenter = self.segmenter()?;
        let cluster = segmenter.predict(input)?;
        let persona = self.personas.resolve(cluster).into_owned();
        info!("Customer {:?} assigned to cluster {} ({})", input, cluster, persona.name);

        Ok(DisplayPayload {
            input: *input,
            cluster,
            persona,
            distances: segmenter.distances(input)?,
            scatter: self.sample.as_ref().map(|s| s.scatter(input, &self.personas)),
        })
    }
}

/// Builds the segmenter and checks that the persona mapping covers every
/// cluster the model can assign.
fn build_segmenter(manager: &ArtifactManager, personas: &PersonaTable) -> Result<Segmenter, ArtifactError> {
    let segmenter = Segmenter::builder().with_artifacts(manager)?.build()?;
    match segmenter.info().num_clusters {
        Some(n) if n != personas.len() => Err(ArtifactError::invalid(
            &manager.model_path(),
            format!("model has {} clusters but the persona mapping covers {}", n, personas.len()),
        )),
        _ => Ok(segmenter),
    }
}

fn sample_warning(err: &DatasetError) -> String {
    match err {
        DatasetError::NotFound(_) => format!(
            "Visualization data ({}) not found. Make sure the file is in the artifacts directory.",
            SAMPLE_DATA_FILE
        ),
        other => format!("Visualization data ({}) could not be read: {}", SAMPLE_DATA_FILE, other),
    }
}

/// Everything shown after a successful prediction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayPayload {
    pub input: CustomerInput,
    pub cluster: ClusterId,
    pub persona: PersonaRecord,
    /// Distance to each cluster center in scaled space, when the model has centers
    pub distances: Option<Vec<f64>>,
    /// Comparison plot; `None` when no sample dataset was loaded
    pub scatter: Option<ScatterPlot>,
}

/// What the session currently shows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum View<'a> {
    /// Landing page, nothing predicted yet
    Idle,
    Resolved(&'a DisplayPayload),
}

/// One user's interaction with the dashboard.
#[derive(Debug)]
pub struct Session {
    ctx: Arc<AppContext>,
    input: CustomerInput,
    resolved: Option<DisplayPayload>,
}

impl Session {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self {
            ctx,
            input: CustomerInput::default(),
            resolved: None,
        }
    }

    pub fn context(&self) -> &AppContext {
        &self.ctx
    }

    pub fn input(&self) -> &CustomerInput {
        &self.input
    }

    pub fn view(&self) -> View<'_> {
        match &self.resolved {
            Some(payload) => View::Resolved(payload),
            None => View::Idle,
        }
    }

    pub fn set_input(&mut self, input: CustomerInput) {
        self.input = input;
    }

    pub fn set_total_quantity(&mut self, value: i64) {
        self.input.total_quantity = value;
    }

    pub fn set_avg_unit_price(&mut self, value: f64) {
        self.input.avg_unit_price = value;
    }

    pub fn set_avg_transaction_value(&mut self, value: f64) {
        self.input.avg_transaction_value = value;
    }

    /// Replaces the input fields with a random plausible customer
    pub fn randomize(&mut self) -> &CustomerInput {
        self.randomize_with(&mut rand::thread_rng())
    }

    pub fn randomize_with<R: Rng + ?Sized>(&mut self, rng: &mut R) -> &CustomerInput {
        self.input = CustomerInput::random(rng);
        &self.input
    }

    /// Runs the prediction for the current inputs.
    ///
    /// On failure the view is left as it was.
    pub fn predict(&mut self) -> Result<&DisplayPayload, DashboardError> {
        let payload = self.ctx.predict(&self.input)?;
        let payload: &DisplayPayload = self.resolved.insert(payload);
        Ok(payload)
    }

    /// Back to the landing page
    pub fn reset(&mut self) {
        self.resolved = None;
    }

    pub fn render(&self) -> String {
        match self.view() {
            View::Idle => render_landing(&self.ctx),
            View::Resolved(payload) => render_resolved(&self.ctx, payload),
        }
    }
}

/// Text of the landing view: the personas and a peek at the sample data.
pub fn render_landing(ctx: &AppContext) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Welcome to the Customer Segmentation Dashboard");
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "This app uses machine learning (K-Means clustering) to group customers into {} personas:",
        Persona::ALL.len()
    );
    for (i, persona) in Persona::ALL.iter().enumerate() {
        let _ = writeln!(out, "  {}. {:<16}: {}", i + 1, persona.name(), persona.headline());
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "Enter the customer's transaction data to start a prediction.");

    if let Some(err) = ctx.load_error() {
        let _ = writeln!(out);
        let _ = writeln!(out, "ERROR: {}", err);
        let _ = writeln!(out, "Prediction is disabled until the scaler and model load.");
    }

    match ctx.sample() {
        Some(sample) => {
            let _ = writeln!(out);
            let _ = writeln!(out, "Current customer data (sample)");
            out.push_str(&render_rows(sample.preview(PREVIEW_ROWS)));
        }
        None => warnings_section(ctx, &mut out),
    }
    out
}

/// Text of the result view for one prediction.
pub fn render_resolved(ctx: &AppContext, payload: &DisplayPayload) -> String {
    let persona = &payload.persona;
    let mut out = String::new();
    let _ = writeln!(out, "Customer Segmentation Result");
    let _ = writeln!(out);
    let _ = writeln!(out, "[{}] {} (cluster {})", persona.display_color, persona.name, payload.cluster);
    let _ = writeln!(out, "{}", persona.short_description);
    let _ = writeln!(out);
    let _ = writeln!(out, "> {}", persona.recommended_action);
    let _ = writeln!(out);
    let _ = writeln!(out, "Full strategy: {}", persona.name);
    let _ = writeln!(out, "{}", persona.full_strategy_text.trim_end());
    let _ = writeln!(out);
    let _ = writeln!(out, "Customer position in the distribution map");

    match &payload.scatter {
        Some(plot) => {
            let marker = &plot.highlight.position;
            let _ = writeln!(
                out,
                "  {}: {} = {}, {} = {:.2}, {} = {:.2}",
                plot.highlight.name, plot.axes.x, marker.x, plot.axes.y, marker.y, plot.axes.z, marker.z
            );
            for trace in &plot.traces {
                let n = trace.points.len().max(1) as f64;
                let (sx, sy, sz) = trace.points.iter()
                    .fold((0.0, 0.0, 0.0), |(x, y, z), p| (x + p.x, y + p.y, z + p.z));
                let _ = writeln!(
                    out,
                    "  {:<16} {} {:>5} customers, mean ({:.1}, {:.2}, {:.2})",
                    trace.name, trace.color, trace.points.len(), sx / n, sy / n, sz / n
                );
            }
        }
        None => warnings_section(ctx, &mut out),
    }
    out
}

fn warnings_section(ctx: &AppContext, out: &mut String) {
    for warning in ctx.warnings() {
        let _ = writeln!(out, "WARNING: {}", warning);
    }
}

fn render_rows(rows: &[SampleRow]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>13}  {:>19}  {:>12}  {:>7}  Persona",
        "TotalQuantity", "AvgTransactionValue", "AvgUnitPrice", "Cluster"
    );
    for row in rows {
        let _ = writeln!(
            out,
            "{:>13}  {:>19.2}  {:>12.2}  {:>7}  {}",
            row.total_quantity,
            row.avg_transaction_value,
            row.avg_unit_price,
            row.cluster,
            row.persona.as_deref().unwrap_or("")
        );
    }
    out
}

/// A line typed into the interactive session
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Quantity(i64),
    UnitPrice(f64),
    TransactionValue(f64),
    Random,
    Predict,
    Show,
    Home,
    Help,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Result<Command, String> {
        let mut parts = line.split_whitespace();
        let verb = parts.next().ok_or_else(|| "empty command".to_string())?;
        let arg = parts.next();
        if parts.next().is_some() {
            return Err(format!("too many arguments for '{}'", verb));
        }

        match (verb.to_ascii_lowercase().as_str(), arg) {
            ("qty" | "quantity", Some(v)) => v.parse()
                .map(Command::Quantity)
                .map_err(|_| format!("'{}' is not a whole number", v)),
            ("price", Some(v)) => parse_amount(v).map(Command::UnitPrice),
            ("trx" | "value", Some(v)) => parse_amount(v).map(Command::TransactionValue),
            ("qty" | "quantity" | "price" | "trx" | "value", None) => Err(format!("'{}' needs a value", verb)),
            ("random", None) => Ok(Command::Random),
            ("predict", None) => Ok(Command::Predict),
            ("show", None) => Ok(Command::Show),
            ("home", None) => Ok(Command::Home),
            ("help" | "?", None) => Ok(Command::Help),
            ("quit" | "exit", None) => Ok(Command::Quit),
            (other, _) => Err(format!("unknown command '{}'", other)),
        }
    }
}

fn parse_amount(v: &str) -> Result<f64, String> {
    v.parse().map_err(|_| format!("'{}' is not a number", v))
}

const HELP: &str = "\
Commands:
  qty N        set total quantity
  price P      set average unit price
  trx V        set average transaction value
  random       randomize the three inputs
  predict      predict the segment for the current inputs
  show         show the current inputs
  home         back to the landing view
  quit         leave the session
";

fn describe_input(input: &CustomerInput) -> String {
    format!(
        "Total quantity: {}, avg unit price: {:.2}, avg transaction value: {:.2}",
        input.total_quantity, input.avg_unit_price, input.avg_transaction_value
    )
}

/// Line-oriented dashboard session over any reader/writer pair.
pub fn run_interactive<R: BufRead, W: Write>(session: &mut Session, reader: R, out: &mut W) -> io::Result<()> {
    write!(out, "{}", session.render())?;
    if !session.context().can_predict() {
        writeln!(out, "Predict is disabled: the model or scaler failed to load.")?;
    }
    writeln!(out, "Type 'help' for commands.")?;

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let command = match Command::parse(&line) {
            Ok(command) => command,
            Err(msg) => {
                writeln!(out, "error: {}", msg)?;
                continue;
            }
        };

        match command {
            Command::Quantity(v) => session.set_total_quantity(v),
            Command::UnitPrice(v) => session.set_avg_unit_price(v),
            Command::TransactionValue(v) => session.set_avg_transaction_value(v),
            Command::Random => {
                let input = *session.randomize();
                writeln!(out, "Data randomized! {}", describe_input(&input))?;
            }
            Command::Predict => match session.predict() {
                Ok(_) => write!(out, "{}", session.render())?,
                Err(e) => writeln!(out, "error: {}", e)?,
            },
            Command::Show => writeln!(out, "{}", describe_input(session.input()))?,
            Command::Home => {
                session.reset();
                write!(out, "{}", session.render())?;
            }
            Command::Help => write!(out, "{}", HELP)?,
            Command::Quit => break,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{KMeansModel, StandardScaler};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn segmenter() -> Segmenter {
        Segmenter::builder()
            .with_scaler(StandardScaler::new(vec![0.0; 3], vec![1.0; 3]).unwrap())
            .with_model(KMeansModel::new(vec![
                vec![0.0, 0.0, 0.0],
                vec![10.0, 1.0, 10.0],
                vec![10.0, 100.0, 1000.0],
                vec![2000.0, 5.0, 10000.0],
            ]).unwrap())
            .build()
            .unwrap()
    }

    fn ctx_without_sample() -> Arc<AppContext> {
        let missing = DatasetError::NotFound(SAMPLE_DATA_FILE.into());
        Arc::new(AppContext::from_parts(Ok(segmenter()), Err(missing), PersonaTable::default()))
    }

    #[test]
    fn test_session_starts_idle_with_defaults() {
        let session = Session::new(ctx_without_sample());
        assert_eq!(session.view(), View::Idle);
        assert_eq!(session.input(), &CustomerInput::default());
    }

    #[test]
    fn test_predict_resolves_view() -> Result<(), DashboardError> {
        let mut session = Session::new(ctx_without_sample());
        session.set_input(CustomerInput::new(1800, 6.0, 10500.0));
        let payload = session.predict()?;
        assert_eq!(payload.cluster, ClusterId(3));
        assert_eq!(payload.persona.name, "The Whales");
        assert!(payload.scatter.is_none());
        assert!(matches!(session.view(), View::Resolved(_)));

        session.reset();
        assert_eq!(session.view(), View::Idle);
        Ok(())
    }

    #[test]
    fn test_failed_predict_keeps_view() {
        let mut session = Session::new(ctx_without_sample());
        session.set_total_quantity(0);
        let err = session.predict().unwrap_err();
        assert!(matches!(err, DashboardError::Segment(SegmentError::InvalidInput { .. })));
        assert_eq!(session.view(), View::Idle);
    }

    #[test]
    fn test_unloaded_artifacts_disable_predict() {
        let ctx = AppContext::from_parts(
            Err(ArtifactError::Missing("scaler")),
            Err(DatasetError::NotFound(SAMPLE_DATA_FILE.into())),
            PersonaTable::default(),
        );
        assert!(!ctx.can_predict());
        let err = ctx.predict(&CustomerInput::default()).unwrap_err();
        assert!(matches!(err, DashboardError::ArtifactLoad(_)));
        assert!(render_landing(&ctx).contains("Prediction is disabled"));
    }

    #[test]
    fn test_randomize_with_seed() {
        let mut a = Session::new(ctx_without_sample());
        let mut b = Session::new(ctx_without_sample());
        let first = *a.randomize_with(&mut StdRng::seed_from_u64(9));
        let second = *b.randomize_with(&mut StdRng::seed_from_u64(9));
        assert_eq!(first, second);
        assert!(first.validate().is_ok());
    }

    #[test]
    fn test_missing_sample_warns_on_result_view() -> Result<(), DashboardError> {
        let mut session = Session::new(ctx_without_sample());
        session.predict()?;
        let text = session.render();
        assert!(text.contains("Full strategy: Quality Seekers"));
        assert!(text.contains("WARNING: Visualization data (cluster_data.csv) not found"));
        Ok(())
    }

    #[test]
    fn test_unreadable_sample_warning_names_the_cause() {
        let corrupt = DatasetError::Parse { line: 2, message: "invalid digit found in string".into() };
        let ctx = AppContext::from_parts(Ok(segmenter()), Err(corrupt), PersonaTable::default());
        assert!(ctx.can_predict());
        assert_eq!(ctx.warnings().len(), 1);
        assert!(ctx.warnings()[0].contains("CSV parse error at line 2"));
        assert!(!ctx.warnings()[0].contains("not found"));
    }

    #[test]
    fn test_predict_returns_the_stored_payload() -> Result<(), DashboardError> {
        let mut session = Session::new(ctx_without_sample());
        let returned = session.predict()?.clone();
        assert_eq!(session.view(), View::Resolved(&returned));
        Ok(())
    }

    #[test]
    fn test_command_parsing() {
        assert_eq!(Command::parse("qty 250"), Ok(Command::Quantity(250)));
        assert_eq!(Command::parse("PRICE 9.99"), Ok(Command::UnitPrice(9.99)));
        assert_eq!(Command::parse("trx 1500"), Ok(Command::TransactionValue(1500.0)));
        assert_eq!(Command::parse("  predict "), Ok(Command::Predict));
        assert!(Command::parse("qty").is_err());
        assert!(Command::parse("qty ten").is_err());
        assert!(Command::parse("predict now").is_err());
        assert!(Command::parse("fly").is_err());
    }

    #[test]
    fn test_interactive_session() -> io::Result<()> {
        let mut session = Session::new(ctx_without_sample());
        let script = "qty 1800\nprice 6\ntrx 10500\nshow\nbogus\npredict\nquit\npredict\n";
        let mut out = Vec::new();
        run_interactive(&mut session, script.as_bytes(), &mut out)?;

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Welcome to the Customer Segmentation Dashboard"));
        assert!(text.contains("Total quantity: 1800"));
        assert!(text.contains("error: unknown command 'bogus'"));
        assert!(text.contains("The Whales (cluster 3)"));
        assert_eq!(text.matches("Customer Segmentation Result").count(), 1);
        Ok(())
    }
}
