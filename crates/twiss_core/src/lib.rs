//! The `twiss_core` crate computes linear optics from step-by-step transfer
//! matrices of a beam line.
//!
//! Key components:
//! - **Matrix**: `TransferMatrix` (6x6 linear map), `TransferTable` (one map per step), `Plane`.
//! - **Twiss**: `TwissParameters`, the immutable record of alpha/beta/gamma and dispersion.
//! - **Propagation**: per-step alpha, beta, gamma, phase advance, Jacobian, dispersion.
//! - **Periodic**: the matched solution of a one-period map, including periodic dispersion.
//! - **Lattice**: periodic solve followed by propagation through the whole table.
pub mod error;
pub mod lattice;
pub mod matrix;
pub mod periodic;
pub mod propagation;
pub mod settings;
pub mod twiss;
pub mod units;

pub use error::{Result, TwissError};
pub use matrix::{Plane, RowSelector, TransferMatrix, TransferTable};
pub use periodic::compute_periodic_twiss;
pub use settings::TwissSettings;
pub use twiss::TwissParameters;
pub use units::{Dimension, Quantity};
