use rand::Rng;
use serde::{Deserialize, Serialize};

use super::error::SegmentError;

/// Number of features the scaler and the clustering model operate on.
pub const NUM_FEATURES: usize = 3;

/// Feature order expected by the fitted artifacts.
pub const FEATURE_NAMES: [&str; NUM_FEATURES] = ["TotalQuantity", "AvgUnitPrice", "AvgTransactionValue"];

/// The three purchasing metrics describing one customer.
///
/// No relationship between the fields is enforced: unit price times quantity
/// does not have to equal the transaction value, they are independently
/// observed features.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CustomerInput {
    /// Number of items purchased
    pub total_quantity: i64,
    /// Average price per unit
    pub avg_unit_price: f64,
    /// Average value of one transaction
    pub avg_transaction_value: f64,
}

impl Default for CustomerInput {
    fn default() -> Self {
        Self {
            total_quantity: 100,
            avg_unit_price: 12.5,
            avg_transaction_value: 1500.0,
        }
    }
}

impl CustomerInput {
    pub fn new(total_quantity: i64, avg_unit_price: f64, avg_transaction_value: f64) -> Self {
        Self {
            total_quantity,
            avg_unit_price,
            avg_transaction_value,
        }
    }

    /// Draws a plausible customer from the ranges seen in the training data.
    ///
    /// # Example
    /// ```
    /// use rand::SeedableRng;
    /// use segmenta::CustomerInput;
    ///
    /// let mut rng = rand::rngs::StdRng::seed_from_u64(7);
    /// let input = CustomerInput::random(&mut rng);
    /// assert!((5..2000).contains(&input.total_quantity));
    /// ```
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            total_quantity: rng.gen_range(5..2000),
            avg_unit_price: round2(rng.gen_range(5.0..=50.0)),
            avg_transaction_value: round2(rng.gen_range(300.0..=5000.0)),
        }
    }

    /// Checks every field against its domain and reports the first one that fails.
    ///
    /// # Errors
    /// - `InvalidInput` if `total_quantity < 1`
    /// - `InvalidInput` if either price is negative, NaN or infinite
    pub fn validate(&self) -> Result<(), SegmentError> {
        if self.total_quantity < 1 {
            return Err(SegmentError::invalid(
                "total_quantity",
                format!("must be at least 1, got {}", self.total_quantity),
            ));
        }
        check_amount("avg_unit_price", self.avg_unit_price)?;
        check_amount("avg_transaction_value", self.avg_transaction_value)?;
        Ok(())
    }

    /// Feature vector in the order the artifacts were fitted on.
    pub fn features(&self) -> [f64; NUM_FEATURES] {
        [
            self.total_quantity as f64,
            self.avg_unit_price,
            self.avg_transaction_value,
        ]
    }
}

fn check_amount(field: &'static str, value: f64) -> Result<(), SegmentError> {
    if !value.is_finite() {
        return Err(SegmentError::invalid(field, format!("must be a finite number, got {}", value)));
    }
    if value < 0.0 {
        return Err(SegmentError::invalid(field, format!("cannot be negative, got {}", value)));
    }
    Ok(())
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
