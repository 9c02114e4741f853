//! Step-by-step propagation of a Twiss seed through a transfer table.
//!
//! Every function returns one value per table row, in row order. Rows are
//! independent: each matrix maps the seed location to that row directly.

use crate::error::{Result, TwissError};
use crate::matrix::{Plane, TransferTable};
use crate::twiss::TwissParameters;
use crate::units::Quantity;

/// Twiss alpha at every step.
pub fn alpha(m: &TransferTable, twiss: &TwissParameters, plane: Plane) -> Vec<f64> {
    let (alpha0, beta0, gamma0) = twiss.optics_si(plane);
    m.plane_blocks(plane)
        .map(|r| {
            -r.r11 * r.r21 * beta0 + (r.r11 * r.r22 + r.r12 * r.r21) * alpha0
                - r.r12 * r.r22 * gamma0
        })
        .collect()
}

/// Twiss beta at every step.
///
/// With `strict` set, the first non-positive value is an error; otherwise
/// values are returned as computed, negative ones included.
pub fn beta(
    m: &TransferTable,
    twiss: &TwissParameters,
    plane: Plane,
    strict: bool,
) -> Result<Vec<Quantity>> {
    let (alpha0, beta0, gamma0) = twiss.optics_si(plane);
    let values: Vec<f64> = m
        .plane_blocks(plane)
        .map(|r| r.r11 * r.r11 * beta0 - 2.0 * r.r11 * r.r12 * alpha0 + r.r12 * r.r12 * gamma0)
        .collect();
    if strict {
        if let Some((row, &value)) = values.iter().enumerate().find(|&(_, &b)| !(b > 0.0)) {
            return Err(TwissError::NonPositiveBeta { plane, row, value });
        }
    }
    Ok(values.into_iter().map(Quantity::meters).collect())
}

/// Twiss gamma at every step.
pub fn gamma(m: &TransferTable, twiss: &TwissParameters, plane: Plane) -> Vec<Quantity> {
    let (alpha0, beta0, gamma0) = twiss.optics_si(plane);
    m.plane_blocks(plane)
        .map(|r| {
            Quantity::per_meter(
                r.r21 * r.r21 * beta0 - 2.0 * r.r21 * r.r22 * alpha0 + r.r22 * r.r22 * gamma0,
            )
        })
        .collect()
}

/// Phase advance from the seed to every step, in radians.
///
/// `atan2` keeps the quadrant, so advances beyond pi/2 keep their sign.
pub fn phase_advance(m: &TransferTable, twiss: &TwissParameters, plane: Plane) -> Vec<f64> {
    let (alpha0, beta0, _) = twiss.optics_si(plane);
    m.plane_blocks(plane)
        .map(|r| r.r12.atan2(r.r11 * beta0 - r.r12 * alpha0))
        .collect()
}

/// Determinant of each 2x2 block; one for a symplectic map.
pub fn jacobian(m: &TransferTable, plane: Plane) -> Vec<f64> {
    m.plane_blocks(plane).map(|r| r.determinant()).collect()
}

/// Dispersion at every step.
pub fn dispersion(m: &TransferTable, twiss: &TwissParameters, plane: Plane) -> Vec<Quantity> {
    let (d0, dp0) = twiss.dispersion_si(plane);
    m.plane_blocks(plane)
        .map(|r| Quantity::meters(d0 * r.r11 + dp0 * r.r12 + r.r15))
        .collect()
}

/// Dispersion slope at every step.
pub fn dispersion_prime(m: &TransferTable, twiss: &TwissParameters, plane: Plane) -> Vec<f64> {
    let (d0, dp0) = twiss.dispersion_si(plane);
    m.plane_blocks(plane)
        .map(|r| d0 * r.r21 + dp0 * r.r22 + r.r25)
        .collect()
}
