//! Transfer table wrapper exposed to JavaScript.

use crate::convert::{build_table, plane_from, seed_from_values, selector_from, TwissOutput};
use js_sys::Float64Array;
use serde::Serialize;
use serde_wasm_bindgen::{from_value, to_value};
use std::collections::BTreeMap;
use twiss_core::lattice::{
    compute_lattice_functions, compute_matched_lattice_functions, LatticeRow,
};
use twiss_core::periodic::compute_periodic_twiss_with;
use twiss_core::propagation;
use twiss_core::{TransferTable, TwissSettings};
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
pub struct WasmTransferTable {
    table: TransferTable,
}

#[derive(Serialize)]
struct MatchedOutput {
    periodic: TwissOutput,
    rows: Vec<LatticeRow>,
}

fn settings(strict: bool) -> TwissSettings {
    TwissSettings {
        strict_beta: strict,
        ..TwissSettings::default()
    }
}

#[wasm_bindgen]
impl WasmTransferTable {
    #[wasm_bindgen(constructor)]
    pub fn new(elements: Vec<f64>, labels: Vec<String>) -> Result<WasmTransferTable, JsValue> {
        console_error_panic_hook::set_once();

        let table = build_table(&elements, &labels)
            .map_err(|e| JsValue::from_str(&format!("Invalid transfer table: {:#}", e)))?;
        Ok(WasmTransferTable { table })
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn periodic_twiss(
        &self,
        label: Option<String>,
        index: Option<i32>,
    ) -> Result<JsValue, JsValue> {
        let selector =
            selector_from(label, index).map_err(|e| JsValue::from_str(&e.to_string()))?;
        let twiss = compute_periodic_twiss_with(&self.table, &selector, &TwissSettings::default())
            .map_err(|e| JsValue::from_str(&format!("Periodic solve failed: {}", e)))?;

        to_value(&TwissOutput::from(&twiss))
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    pub fn lattice_functions(&self, seed: JsValue, strict: bool) -> Result<JsValue, JsValue> {
        let values: BTreeMap<String, f64> = from_value(seed)
            .map_err(|e| JsValue::from_str(&format!("Invalid seed object: {}", e)))?;
        let seed =
            seed_from_values(&values).map_err(|e| JsValue::from_str(&format!("{:#}", e)))?;
        let rows = compute_lattice_functions(&self.table, &seed, &settings(strict))
            .map_err(|e| JsValue::from_str(&format!("Propagation failed: {}", e)))?;

        to_value(&rows).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    pub fn matched_lattice_functions(
        &self,
        label: Option<String>,
        index: Option<i32>,
        strict: bool,
    ) -> Result<JsValue, JsValue> {
        let selector =
            selector_from(label, index).map_err(|e| JsValue::from_str(&e.to_string()))?;
        let matched = compute_matched_lattice_functions(&self.table, &selector, &settings(strict))
            .map_err(|e| JsValue::from_str(&format!("Matched lattice failed: {}", e)))?;

        let output = MatchedOutput {
            periodic: TwissOutput::from(&matched.periodic),
            rows: matched.rows,
        };
        to_value(&output).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    /// Determinant of the 2x2 block of `plane` (1 or 2) at every row.
    pub fn jacobian(&self, plane: u32) -> Result<Float64Array, JsValue> {
        let plane = plane_from(plane).map_err(|e| JsValue::from_str(&e.to_string()))?;
        let values = propagation::jacobian(&self.table, plane);
        Ok(Float64Array::from(values.as_slice()))
    }
}
