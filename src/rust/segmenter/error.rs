use std::fmt;

/// Represents the different types of errors that can occur while assigning a segment.
#[derive(Debug, Clone, PartialEq)]
pub enum SegmentError {
    /// One of the customer metrics is outside its domain
    InvalidInput {
        field: &'static str,
        reason: String,
    },
    /// The scaler or the clustering model was never loaded
    ModelUnavailable(String),
    /// The model ran but produced something unusable
    PredictionError(String),
}

impl SegmentError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidInput { field, reason: reason.into() }
    }

    /// Name of the offending input field, if this is a validation failure
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::InvalidInput { field, .. } => Some(field),
            _ => None,
        }
    }
}

impl fmt::Display for SegmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput { field, reason } => write!(f, "Invalid input for {}: {}", field, reason),
            Self::ModelUnavailable(msg) => write!(f, "Model unavailable: {}", msg),
            Self::PredictionError(msg) => write!(f, "Prediction error: {}", msg),
        }
    }
}

impl std::error::Error for SegmentError {}

#[cfg(feature = "onnx")]
impl From<ort::Error> for SegmentError {
    fn from(err: ort::Error) -> Self {
        SegmentError::PredictionError(err.to_string())
    }
}
