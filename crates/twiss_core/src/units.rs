//! Values with an attached physical dimension.
//!
//! Only lengths and their powers appear in linear optics, so a dimension is
//! the integer exponent of the metre. Phase advance is measured in radians and
//! treated as dimensionless.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Div, Mul, Neg};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimension {
    length: i8,
}

impl Dimension {
    pub const DIMENSIONLESS: Dimension = Dimension { length: 0 };
    pub const LENGTH: Dimension = Dimension { length: 1 };
    pub const INVERSE_LENGTH: Dimension = Dimension { length: -1 };

    pub const fn length_exponent(self) -> i8 {
        self.length
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.length {
            0 => write!(f, "1"),
            1 => write!(f, "m"),
            n => write!(f, "m^{n}"),
        }
    }
}

/// A magnitude together with its dimension.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    magnitude: f64,
    dimension: Dimension,
}

impl Quantity {
    pub const fn new(magnitude: f64, dimension: Dimension) -> Self {
        Self {
            magnitude,
            dimension,
        }
    }

    pub const fn meters(magnitude: f64) -> Self {
        Self::new(magnitude, Dimension::LENGTH)
    }

    pub const fn per_meter(magnitude: f64) -> Self {
        Self::new(magnitude, Dimension::INVERSE_LENGTH)
    }

    pub const fn dimensionless(magnitude: f64) -> Self {
        Self::new(magnitude, Dimension::DIMENSIONLESS)
    }

    pub fn magnitude(&self) -> f64 {
        self.magnitude
    }

    pub fn dimension(&self) -> Dimension {
        self.dimension
    }

    /// Raw magnitude, only if the value carries `expected`.
    pub fn magnitude_as(&self, expected: Dimension) -> Option<f64> {
        (self.dimension == expected).then_some(self.magnitude)
    }

    pub fn is_finite(&self) -> bool {
        self.magnitude.is_finite()
    }
}

impl Mul for Quantity {
    type Output = Quantity;
    fn mul(self, rhs: Quantity) -> Quantity {
        Quantity::new(
            self.magnitude * rhs.magnitude,
            Dimension {
                length: self.dimension.length + rhs.dimension.length,
            },
        )
    }
}

impl Div for Quantity {
    type Output = Quantity;
    fn div(self, rhs: Quantity) -> Quantity {
        Quantity::new(
            self.magnitude / rhs.magnitude,
            Dimension {
                length: self.dimension.length - rhs.dimension.length,
            },
        )
    }
}

impl Mul<f64> for Quantity {
    type Output = Quantity;
    fn mul(self, rhs: f64) -> Quantity {
        Quantity::new(self.magnitude * rhs, self.dimension)
    }
}

impl Neg for Quantity {
    type Output = Quantity;
    fn neg(self) -> Quantity {
        Quantity::new(-self.magnitude, self.dimension)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.dimension == Dimension::DIMENSIONLESS {
            write!(f, "{}", self.magnitude)
        } else {
            write!(f, "{} {}", self.magnitude, self.dimension)
        }
    }
}
