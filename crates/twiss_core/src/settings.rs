use crate::error::{Result, TwissError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TwissSettings {
    /// Fail when a propagated beta is zero or negative.
    pub strict_beta: bool,
    /// Relative pivot size below which `(I - M)` counts as singular.
    pub singularity_tolerance: f64,
    /// Allowed deviation of a 2x2 determinant from one before a row is reported.
    pub symplectic_tolerance: f64,
    pub courant_snyder_tolerance: f64,
}

impl Default for TwissSettings {
    fn default() -> Self {
        Self {
            strict_beta: false,
            singularity_tolerance: 1e-12,
            symplectic_tolerance: 1e-9,
            courant_snyder_tolerance: 1e-9,
        }
    }
}

impl TwissSettings {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("singularity_tolerance", self.singularity_tolerance),
            ("symplectic_tolerance", self.symplectic_tolerance),
            ("courant_snyder_tolerance", self.courant_snyder_tolerance),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(TwissError::InvalidSettings(format!(
                    "{name} must be positive and finite (got {value})."
                )));
            }
        }
        Ok(())
    }
}
