//! Sample customers with known clusters, used only to give a new prediction
//! some visual context.
//!
//! Expected CSV columns:
//!   TotalQuantity, AvgTransactionValue, AvgUnitPrice, Cluster[, Persona]
//! Any other column is ignored.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::persona::{PersonaTable, FALLBACK_COLOR};
use crate::segmenter::{ClusterId, CustomerInput};

/// Number of rows shown on the landing view.
pub const PREVIEW_ROWS: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("Sample dataset not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Failed to open {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("CSV parse error at line {line}: {message}")]
    Parse { line: usize, message: String },
}

/// One row of the sample CSV
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRow {
    #[serde(rename = "TotalQuantity")]
    pub total_quantity: i64,
    #[serde(rename = "AvgTransactionValue")]
    pub avg_transaction_value: f64,
    #[serde(rename = "AvgUnitPrice")]
    pub avg_unit_price: f64,
    #[serde(rename = "Cluster")]
    pub cluster: ClusterId,
    #[serde(rename = "Persona", default)]
    pub persona: Option<String>,
}

/// Read-only sample of already segmented customers.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SampleDataset {
    rows: Vec<SampleRow>,
}

impl SampleDataset {
    /// Parses sample rows from CSV, filling in missing persona names from `personas`.
    pub fn from_reader<R: Read>(reader: R, personas: &PersonaTable) -> Result<Self, DatasetError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut rows = Vec::new();
        for (line_num, result) in csv_reader.deserialize().enumerate() {
            let mut row: SampleRow = result.map_err(|e| DatasetError::Parse {
                line: line_num + 2,
                message: e.to_string(),
            })?;
            if row.persona.as_deref().map_or(true, str::is_empty) {
                row.persona = Some(personas.name_for(row.cluster).into_owned());
            }
            rows.push(row);
        }

        Ok(Self { rows })
    }

    pub fn from_file<P: AsRef<Path>>(path: P, personas: &PersonaTable) -> Result<Self, DatasetError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(DatasetError::NotFound(path.to_path_buf()));
        }
        let file = std::fs::File::open(path).map_err(|source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(file, personas)
    }

    pub fn rows(&self) -> &[SampleRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First `n` rows, for the landing view
    pub fn preview(&self, n: usize) -> &[SampleRow] {
        &self.rows[..n.min(self.rows.len())]
    }

    /// Builds the 3D comparison plot: the sample colored by persona plus one
    /// highlighted marker for the new customer.
    pub fn scatter(&self, input: &CustomerInput, personas: &PersonaTable) -> ScatterPlot {
        let mut traces: BTreeMap<String, ScatterTrace> = BTreeMap::new();
        for row in &self.rows {
            let name = row.persona.clone()
                .unwrap_or_else(|| personas.name_for(row.cluster).into_owned());
            let trace = traces.entry(name.clone()).or_insert_with(|| ScatterTrace {
                color: persona_color(&name, row.cluster, personas),
                name,
                opacity: TRACE_OPACITY,
                points: Vec::new(),
            });
            trace.points.push(Point3 {
                x: row.total_quantity as f64,
                y: row.avg_transaction_value,
                z: row.avg_unit_price,
            });
        }

        ScatterPlot {
            title: "3D Customer Cluster Visualization".to_string(),
            axes: Axes::default(),
            traces: traces.into_values().collect(),
            highlight: Marker::for_input(input),
        }
    }
}

const TRACE_OPACITY: f32 = 0.3;

fn persona_color(name: &str, cluster: ClusterId, personas: &PersonaTable) -> String {
    crate::persona::Persona::from_name(name)
        .or_else(|| personas.persona(cluster))
        .map(|p| p.record().display_color.to_string())
        .unwrap_or_else(|| FALLBACK_COLOR.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Axis titles; x, y and z carry quantity, transaction value and unit price.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Axes {
    pub x: String,
    pub y: String,
    pub z: String,
}

impl Default for Axes {
    fn default() -> Self {
        Self {
            x: "Total Qty".to_string(),
            y: "Trx Value".to_string(),
            z: "Unit Price".to_string(),
        }
    }
}

/// All sample points belonging to one persona
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScatterTrace {
    pub name: String,
    pub color: String,
    pub opacity: f32,
    pub points: Vec<Point3>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub name: String,
    pub position: Point3,
    pub size: u32,
    pub color: String,
    pub symbol: String,
}

impl Marker {
    fn for_input(input: &CustomerInput) -> Self {
        Self {
            name: "New customer (input)".to_string(),
            position: Point3 {
                x: input.total_quantity as f64,
                y: input.avg_transaction_value,
                z: input.avg_unit_price,
            },
            size: 20,
            color: "black".to_string(),
            symbol: "x".to_string(),
        }
    }
}

/// Renderer-agnostic description of the comparison chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScatterPlot {
    pub title: String,
    pub axes: Axes,
    pub traces: Vec<ScatterTrace>,
    pub highlight: Marker,
}

impl ScatterPlot {
    pub fn num_points(&self) -> usize {
        self.traces.iter().map(|t| t.points.len()).sum()
    }
}
