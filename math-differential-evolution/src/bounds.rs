use ndarray::Array1;

use crate::error::{DEError, Result};

/// Per-dimension box `[lower, upper]` used by the built-in initializers.
#[derive(Debug, Clone, PartialEq)]
pub struct Bounds {
    lower: Array1<f64>,
    upper: Array1<f64>,
}

impl Bounds {
    /// Creates bounds from explicit lower/upper vectors.
    ///
    /// # Errors
    ///
    /// Returns `DEError::BoundsMismatch` if `lower` and `upper` have different lengths.
    /// Returns `DEError::InvalidBounds` if any lower bound exceeds its corresponding upper bound.
    pub fn new(lower: Array1<f64>, upper: Array1<f64>) -> Result<Self> {
        if lower.len() != upper.len() {
            return Err(DEError::BoundsMismatch {
                lower_len: lower.len(),
                upper_len: upper.len(),
            });
        }
        for i in 0..lower.len() {
            if lower[i] > upper[i] {
                return Err(DEError::InvalidBounds {
                    index: i,
                    lower: lower[i],
                    upper: upper[i],
                });
            }
        }
        Ok(Self { lower, upper })
    }

    /// Creates bounds from `(lower, upper)` pairs, one per dimension.
    pub fn from_pairs(pairs: &[(f64, f64)]) -> Result<Self> {
        let lower = pairs.iter().map(|&(lo, _)| lo).collect::<Array1<f64>>();
        let upper = pairs.iter().map(|&(_, hi)| hi).collect::<Array1<f64>>();
        Self::new(lower, upper)
    }

    /// Same `[low, high]` interval on every one of `dim` dimensions.
    pub fn cube(low: f64, high: f64, dim: usize) -> Result<Self> {
        Self::new(Array1::from_elem(dim, low), Array1::from_elem(dim, high))
    }

    /// Number of dimensions.
    pub fn dim(&self) -> usize {
        self.lower.len()
    }

    /// Lower bounds.
    pub fn lower(&self) -> &Array1<f64> {
        &self.lower
    }

    /// Upper bounds.
    pub fn upper(&self) -> &Array1<f64> {
        &self.upper
    }
}
