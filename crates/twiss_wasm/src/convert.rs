//! Conversions between flat JS-friendly inputs and core types.
//!
//! Kept free of `JsValue` so they can be tested natively.

use anyhow::{anyhow, bail, Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use twiss_core::twiss::Stability;
use twiss_core::{
    Dimension, Plane, Quantity, RowSelector, TransferMatrix, TransferTable, TwissParameters,
};

const ROW_LEN: usize = 36;

/// Builds a table from 36 row-major values per row; `labels` is empty or has
/// one entry per row (empty strings mean "no label").
pub(crate) fn build_table(elements: &[f64], labels: &[String]) -> Result<TransferTable> {
    if elements.is_empty() || elements.len() % ROW_LEN != 0 {
        bail!(
            "Transfer table needs a positive multiple of {} values, got {}.",
            ROW_LEN,
            elements.len()
        );
    }
    let rows = elements.len() / ROW_LEN;
    if !labels.is_empty() && labels.len() != rows {
        bail!(
            "Label count mismatch. Expected {} labels, got {}.",
            rows,
            labels.len()
        );
    }

    let mut table = TransferTable::new();
    for (i, chunk) in elements.chunks_exact(ROW_LEN).enumerate() {
        let matrix = TransferMatrix::from_row_slice(chunk)
            .with_context(|| format!("Invalid matrix at row {i}."))?;
        let label = labels.get(i).filter(|l| !l.is_empty()).cloned();
        table.push(label, matrix);
    }
    Ok(table)
}

/// Negative indices count from the end, so `-1` is the last row.
pub(crate) fn selector_from(label: Option<String>, index: Option<i32>) -> Result<RowSelector> {
    match (label, index) {
        (Some(_), Some(_)) => bail!("Pass either a label or an index, not both."),
        (Some(label), None) => Ok(RowSelector::Label(label)),
        (None, Some(index)) if index < 0 => Ok(RowSelector::FromEnd(index.unsigned_abs() as usize)),
        (None, Some(index)) => Ok(RowSelector::Index(index as usize)),
        (None, None) => Ok(RowSelector::Last),
    }
}

pub(crate) fn plane_from(number: u32) -> Result<Plane> {
    Plane::from_number(number as usize)
        .ok_or_else(|| anyhow!("Plane must be 1 or 2, got {number}."))
}

/// Attaches the conventional dimension to each SI number of a seed map.
pub(crate) fn seed_from_values(values: &BTreeMap<String, f64>) -> Result<TwissParameters> {
    let entries = values
        .iter()
        .filter_map(|(key, &value)| {
            seed_dimension(key).map(|dimension| (key.as_str(), Quantity::new(value, dimension)))
        });
    TwissParameters::from_entries(entries).context("Invalid Twiss seed.")
}

fn seed_dimension(key: &str) -> Option<Dimension> {
    match key {
        "ALPHA11" | "ALPHA22" | "DISP2" | "DISP4" => Some(Dimension::DIMENSIONLESS),
        "BETA11" | "BETA22" | "DISP1" | "DISP3" => Some(Dimension::LENGTH),
        "GAMMA11" | "GAMMA22" => Some(Dimension::INVERSE_LENGTH),
        _ => None,
    }
}

/// Record flattened to SI magnitudes for JS.
#[derive(Debug, Serialize)]
pub(crate) struct TwissOutput {
    pub values: BTreeMap<String, f64>,
    pub stable: Option<[bool; 2]>,
}

impl From<&TwissParameters> for TwissOutput {
    fn from(twiss: &TwissParameters) -> Self {
        let stable = match (
            twiss.periodic_phase(Plane::Horizontal),
            twiss.periodic_phase(Plane::Vertical),
        ) {
            (Some(h), Some(v)) => Some([
                h.stability == Stability::Stable,
                v.stability == Stability::Stable,
            ]),
            _ => None,
        };
        Self {
            values: twiss
                .entries()
                .into_iter()
                .map(|(key, value)| (key, value.magnitude()))
                .collect(),
            stable,
        }
    }
}
