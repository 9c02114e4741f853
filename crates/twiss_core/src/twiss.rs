//! The Twiss parameter record.
//!
//! A record holds the Courant-Snyder parameters of both transverse planes and
//! the dispersion vector. Records produced by the periodic solver also carry
//! the one-period phase advance of each plane. Every dimensioned field is
//! checked when the record is built, so a record that exists is well-formed.

use crate::error::{Result, TwissError};
use crate::matrix::Plane;
use crate::units::{Dimension, Quantity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f64::consts::TAU;

/// Courant-Snyder parameters of one plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaneTwiss {
    pub alpha: f64,
    pub beta: Quantity,
    pub gamma: Quantity,
}

impl PlaneTwiss {
    /// `alpha` dimensionless, `beta` in metres, `gamma` in inverse metres.
    pub fn from_si(alpha: f64, beta: f64, gamma: f64) -> Self {
        Self {
            alpha,
            beta: Quantity::meters(beta),
            gamma: Quantity::per_meter(gamma),
        }
    }

    /// `gamma` follows from `(1 + alpha^2) / beta`.
    pub fn from_alpha_beta(alpha: f64, beta: f64) -> Self {
        Self::from_si(alpha, beta, (1.0 + alpha * alpha) / beta)
    }

    /// `beta*gamma - alpha^2 - 1`, zero for a valid parameter set.
    pub fn courant_snyder_residual(&self) -> f64 {
        (self.beta * self.gamma).magnitude() - self.alpha * self.alpha - 1.0
    }
}

/// Dispersion vector `(D_x, D'_x, D_y, D'_y)`, also named `DISP1..DISP4`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dispersion {
    pub horizontal: Quantity,
    pub horizontal_prime: Quantity,
    pub vertical: Quantity,
    pub vertical_prime: Quantity,
}

impl Dispersion {
    pub fn zero() -> Self {
        Self::from_si([0.0; 4])
    }

    /// Lengths in metres, slopes dimensionless.
    pub fn from_si(values: [f64; 4]) -> Self {
        Self {
            horizontal: Quantity::meters(values[0]),
            horizontal_prime: Quantity::dimensionless(values[1]),
            vertical: Quantity::meters(values[2]),
            vertical_prime: Quantity::dimensionless(values[3]),
        }
    }

    /// `(D, D')` of one plane.
    pub fn for_plane(&self, plane: Plane) -> (Quantity, Quantity) {
        match plane {
            Plane::Horizontal => (self.horizontal, self.horizontal_prime),
            Plane::Vertical => (self.vertical, self.vertical_prime),
        }
    }
}

impl Default for Dispersion {
    fn default() -> Self {
        Self::zero()
    }
}

/// Stability of the betatron motion in one plane over one period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stability {
    Stable,
    Unstable,
}

/// One-period phase advance of a plane, from the trace of its 2x2 block.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeriodicPhase {
    pub cos_mu: f64,
    /// Radians; NaN when the plane is unstable.
    pub mu: f64,
    pub stability: Stability,
}

impl PeriodicPhase {
    /// Fractional tune `mu / 2pi`.
    pub fn tune(&self) -> f64 {
        self.mu / TAU
    }

    pub fn is_stable(&self) -> bool {
        self.stability == Stability::Stable
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTwissParameters")]
pub struct TwissParameters {
    horizontal: PlaneTwiss,
    vertical: PlaneTwiss,
    dispersion: Dispersion,
    periodic: Option<[PeriodicPhase; 2]>,
}

/// Deserialized fields, checked by `TwissParameters::new` before use.
#[derive(Deserialize)]
struct RawTwissParameters {
    horizontal: PlaneTwiss,
    vertical: PlaneTwiss,
    dispersion: Dispersion,
    #[serde(default)]
    periodic: Option<[PeriodicPhase; 2]>,
}

impl TryFrom<RawTwissParameters> for TwissParameters {
    type Error = TwissError;

    fn try_from(raw: RawTwissParameters) -> Result<Self> {
        let twiss = Self::new(raw.horizontal, raw.vertical, raw.dispersion)?;
        Ok(match raw.periodic {
            Some([horizontal, vertical]) => twiss.with_periodic_phase(horizontal, vertical),
            None => twiss,
        })
    }
}

impl TwissParameters {
    pub fn new(
        horizontal: PlaneTwiss,
        vertical: PlaneTwiss,
        dispersion: Dispersion,
    ) -> Result<Self> {
        for (plane, twiss) in [(Plane::Horizontal, &horizontal), (Plane::Vertical, &vertical)] {
            let v = plane.number();
            expect_dimension(&format!("BETA{v}{v}"), twiss.beta, Dimension::LENGTH)?;
            expect_dimension(&format!("GAMMA{v}{v}"), twiss.gamma, Dimension::INVERSE_LENGTH)?;
        }
        expect_dimension("DISP1", dispersion.horizontal, Dimension::LENGTH)?;
        expect_dimension("DISP2", dispersion.horizontal_prime, Dimension::DIMENSIONLESS)?;
        expect_dimension("DISP3", dispersion.vertical, Dimension::LENGTH)?;
        expect_dimension("DISP4", dispersion.vertical_prime, Dimension::DIMENSIONLESS)?;
        Ok(Self {
            horizontal,
            vertical,
            dispersion,
            periodic: None,
        })
    }

    pub(crate) fn with_periodic_phase(
        mut self,
        horizontal: PeriodicPhase,
        vertical: PeriodicPhase,
    ) -> Self {
        self.periodic = Some([horizontal, vertical]);
        self
    }

    /// Builds a seed from conventionally named entries (`ALPHA11`, `BETA11`,
    /// `GAMMA11`, `ALPHA22`, `BETA22`, `GAMMA22`, `DISP1`..`DISP4`).
    ///
    /// Every one of these keys is required. Other keys are ignored.
    pub fn from_entries<K, I>(entries: I) -> Result<Self>
    where
        K: AsRef<str>,
        I: IntoIterator<Item = (K, Quantity)>,
    {
        let map: BTreeMap<String, Quantity> = entries
            .into_iter()
            .map(|(key, value)| (key.as_ref().to_string(), value))
            .collect();

        let field = |name: &str, expected: Dimension| -> Result<Quantity> {
            let value = map.get(name).ok_or_else(|| TwissError::InvalidSeedDimension {
                field: name.to_string(),
                expected,
                found: None,
            })?;
            expect_dimension(name, *value, expected)?;
            Ok(*value)
        };
        let plane = |v: usize| -> Result<PlaneTwiss> {
            let alpha = field(&format!("ALPHA{v}{v}"), Dimension::DIMENSIONLESS)?;
            Ok(PlaneTwiss {
                alpha: alpha.magnitude(),
                beta: field(&format!("BETA{v}{v}"), Dimension::LENGTH)?,
                gamma: field(&format!("GAMMA{v}{v}"), Dimension::INVERSE_LENGTH)?,
            })
        };

        let horizontal = plane(1)?;
        let vertical = plane(2)?;
        let dispersion = Dispersion {
            horizontal: field("DISP1", Dimension::LENGTH)?,
            horizontal_prime: field("DISP2", Dimension::DIMENSIONLESS)?,
            vertical: field("DISP3", Dimension::LENGTH)?,
            vertical_prime: field("DISP4", Dimension::DIMENSIONLESS)?,
        };
        Self::new(horizontal, vertical, dispersion)
    }

    /// All named values of the record, including the periodic ones when set.
    pub fn entries(&self) -> BTreeMap<String, Quantity> {
        const KEYS: [&str; 18] = [
            "ALPHA11", "BETA11", "GAMMA11", "ALPHA22", "BETA22", "GAMMA22", "DISP1", "DISP2",
            "DISP3", "DISP4", "DY", "DYP", "DZ", "DZP", "CMU1", "MU1", "CMU2", "MU2",
        ];
        KEYS.iter()
            .filter_map(|key| self.get(key).map(|value| (key.to_string(), value)))
            .collect()
    }

    /// Looks a value up by its conventional name.
    pub fn get(&self, key: &str) -> Option<Quantity> {
        let d = &self.dispersion;
        let value = match key {
            "ALPHA11" => Quantity::dimensionless(self.horizontal.alpha),
            "BETA11" => self.horizontal.beta,
            "GAMMA11" => self.horizontal.gamma,
            "ALPHA22" => Quantity::dimensionless(self.vertical.alpha),
            "BETA22" => self.vertical.beta,
            "GAMMA22" => self.vertical.gamma,
            "DISP1" | "DY" => d.horizontal,
            "DISP2" | "DYP" => d.horizontal_prime,
            "DISP3" | "DZ" => d.vertical,
            "DISP4" | "DZP" => d.vertical_prime,
            "CMU1" => Quantity::dimensionless(self.periodic_phase(Plane::Horizontal)?.cos_mu),
            "MU1" => Quantity::dimensionless(self.periodic_phase(Plane::Horizontal)?.mu),
            "CMU2" => Quantity::dimensionless(self.periodic_phase(Plane::Vertical)?.cos_mu),
            "MU2" => Quantity::dimensionless(self.periodic_phase(Plane::Vertical)?.mu),
            _ => return None,
        };
        Some(value)
    }

    pub fn plane(&self, plane: Plane) -> &PlaneTwiss {
        match plane {
            Plane::Horizontal => &self.horizontal,
            Plane::Vertical => &self.vertical,
        }
    }

    pub fn alpha(&self, plane: Plane) -> f64 {
        self.plane(plane).alpha
    }

    pub fn beta(&self, plane: Plane) -> Quantity {
        self.plane(plane).beta
    }

    pub fn gamma(&self, plane: Plane) -> Quantity {
        self.plane(plane).gamma
    }

    pub fn dispersion(&self) -> &Dispersion {
        &self.dispersion
    }

    pub fn periodic_phase(&self, plane: Plane) -> Option<&PeriodicPhase> {
        self.periodic.as_ref().map(|phases| &phases[plane.number() - 1])
    }

    pub fn courant_snyder_residual(&self, plane: Plane) -> f64 {
        self.plane(plane).courant_snyder_residual()
    }

    /// Fails if either plane violates `alpha^2 + 1 = beta*gamma` by more than
    /// `tolerance` (NaN always fails).
    pub fn check_courant_snyder(&self, tolerance: f64) -> Result<()> {
        for plane in Plane::ALL {
            let residual = self.courant_snyder_residual(plane);
            if !(residual.abs() <= tolerance) {
                return Err(TwissError::CourantSnyderViolation { plane, residual });
            }
        }
        Ok(())
    }

    /// Seed values of one plane as raw SI numbers `(alpha, beta [m], gamma [1/m])`.
    pub(crate) fn optics_si(&self, plane: Plane) -> (f64, f64, f64) {
        let twiss = self.plane(plane);
        (twiss.alpha, twiss.beta.magnitude(), twiss.gamma.magnitude())
    }

    /// `(D [m], D')` of one plane as raw numbers.
    pub(crate) fn dispersion_si(&self, plane: Plane) -> (f64, f64) {
        let (d, dp) = self.dispersion.for_plane(plane);
        (d.magnitude(), dp.magnitude())
    }
}

fn expect_dimension(field: &str, value: Quantity, expected: Dimension) -> Result<()> {
    if value.dimension() == expected {
        Ok(())
    } else {
        Err(TwissError::InvalidSeedDimension {
            field: field.to_string(),
            expected,
            found: Some(value.dimension()),
        })
    }
}
