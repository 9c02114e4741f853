//! Lattice functions along a whole transfer table.

use crate::error::Result;
use crate::matrix::{Plane, RowSelector, TransferTable};
use crate::periodic::compute_periodic_twiss_with;
use crate::propagation;
use crate::settings::TwissSettings;
use crate::twiss::TwissParameters;
use crate::units::Quantity;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Optical functions of one plane at one step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaneFunctions {
    pub alpha: f64,
    pub beta: Quantity,
    pub gamma: Quantity,
    pub mu: f64,
    pub jacobian: f64,
    pub dispersion: Quantity,
    pub dispersion_prime: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatticeRow {
    pub label: Option<String>,
    pub horizontal: PlaneFunctions,
    pub vertical: PlaneFunctions,
}

impl LatticeRow {
    pub fn plane(&self, plane: Plane) -> &PlaneFunctions {
        match plane {
            Plane::Horizontal => &self.horizontal,
            Plane::Vertical => &self.vertical,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedLattice {
    pub periodic: TwissParameters,
    pub rows: Vec<LatticeRow>,
}

/// Propagates `seed` through every row of `table`.
pub fn compute_lattice_functions(
    table: &TransferTable,
    seed: &TwissParameters,
    settings: &TwissSettings,
) -> Result<Vec<LatticeRow>> {
    settings.validate()?;
    let horizontal = plane_functions(table, seed, Plane::Horizontal, settings)?;
    let vertical = plane_functions(table, seed, Plane::Vertical, settings)?;

    Ok(table
        .rows()
        .iter()
        .zip(horizontal.into_iter().zip(vertical))
        .map(|(row, (horizontal, vertical))| LatticeRow {
            label: row.label.clone(),
            horizontal,
            vertical,
        })
        .collect())
}

/// Solves for the periodic solution at `end` and propagates it through the
/// whole table.
pub fn compute_matched_lattice_functions(
    table: &TransferTable,
    end: &RowSelector,
    settings: &TwissSettings,
) -> Result<MatchedLattice> {
    let periodic = compute_periodic_twiss_with(table, end, settings)?;
    let rows = compute_lattice_functions(table, &periodic, settings)?;
    Ok(MatchedLattice { periodic, rows })
}

fn plane_functions(
    table: &TransferTable,
    seed: &TwissParameters,
    plane: Plane,
    settings: &TwissSettings,
) -> Result<Vec<PlaneFunctions>> {
    let alpha = propagation::alpha(table, seed, plane);
    let beta = propagation::beta(table, seed, plane, settings.strict_beta)?;
    let gamma = propagation::gamma(table, seed, plane);
    let mu = propagation::phase_advance(table, seed, plane);
    let jacobian = propagation::jacobian(table, plane);
    let dispersion = propagation::dispersion(table, seed, plane);
    let dispersion_prime = propagation::dispersion_prime(table, seed, plane);

    for (row, det) in jacobian.iter().enumerate() {
        if (det - 1.0).abs() > settings.symplectic_tolerance {
            warn!("Row {row} is not symplectic in the {plane} plane (det = {det}).");
        }
    }

    Ok((0..table.len())
        .map(|i| PlaneFunctions {
            alpha: alpha[i],
            beta: beta[i],
            gamma: gamma[i],
            mu: mu[i],
            jacobian: jacobian[i],
            dispersion: dispersion[i],
            dispersion_prime: dispersion_prime[i],
        })
        .collect())
}
