//! Linear transfer matrices and step-by-step transfer tables.
//!
//! Elements are addressed with 1-based `(row, col)` pairs so that `element(1, 2)`
//! is the conventional `R12`. Axes 1-2 are horizontal, 3-4 vertical, and column 5
//! holds the momentum coupling terms that generate dispersion.

use crate::error::{Result, TwissError};
use nalgebra::{Matrix4, Matrix6, Vector4};
use num_complex::Complex;
use serde::{Deserialize, Serialize};
use std::fmt;

const DIM: usize = 6;
const MOMENTUM_AXIS: usize = 4;

/// Transverse plane selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Plane {
    Horizontal,
    Vertical,
}

impl Plane {
    pub const ALL: [Plane; 2] = [Plane::Horizontal, Plane::Vertical];

    /// Plane number `v` used in Twiss names (`ALPHA{v}{v}`).
    pub const fn number(self) -> usize {
        match self {
            Plane::Horizontal => 1,
            Plane::Vertical => 2,
        }
    }

    pub fn from_number(number: usize) -> Option<Plane> {
        match number {
            1 => Some(Plane::Horizontal),
            2 => Some(Plane::Vertical),
            _ => None,
        }
    }

    /// Zero-based (position, slope) axes of the plane in the 6x6 matrix.
    const fn axes(self) -> (usize, usize) {
        match self {
            Plane::Horizontal => (0, 1),
            Plane::Vertical => (2, 3),
        }
    }
}

impl fmt::Display for Plane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Plane::Horizontal => write!(f, "horizontal"),
            Plane::Vertical => write!(f, "vertical"),
        }
    }
}

/// The 2x2 block of one plane plus its dispersion column entries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneBlock {
    pub r11: f64,
    pub r12: f64,
    pub r21: f64,
    pub r22: f64,
    pub r15: f64,
    pub r25: f64,
}

impl PlaneBlock {
    pub fn determinant(&self) -> f64 {
        self.r11 * self.r22 - self.r12 * self.r21
    }

    pub fn half_trace(&self) -> f64 {
        (self.r11 + self.r22) / 2.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransferMatrix(Matrix6<f64>);

impl TransferMatrix {
    pub fn identity() -> Self {
        Self(Matrix6::identity())
    }

    pub fn from_matrix(matrix: Matrix6<f64>) -> Self {
        Self(matrix)
    }

    /// Builds a matrix from 36 values in row-major order.
    pub fn from_row_slice(values: &[f64]) -> Result<Self> {
        if values.len() != DIM * DIM {
            return Err(TwissError::InvalidMatrixElement(format!(
                "expected {} row-major values, got {}",
                DIM * DIM,
                values.len()
            )));
        }
        Ok(Self(Matrix6::from_row_slice(values)))
    }

    /// Builds a matrix from `R{i}{j}` entries; unnamed elements keep their
    /// identity value.
    pub fn from_named_elements<'a, I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let mut matrix = Matrix6::identity();
        for (name, value) in entries {
            let (row, col) = parse_element_name(name)?;
            matrix[(row - 1, col - 1)] = value;
        }
        Ok(Self(matrix))
    }

    /// Element `R{row}{col}`, 1-based. Panics outside 1..=6 like any index.
    pub fn element(&self, row: usize, col: usize) -> f64 {
        self.0[(row - 1, col - 1)]
    }

    pub fn as_matrix(&self) -> &Matrix6<f64> {
        &self.0
    }

    /// The map "apply `self`, then `next`".
    pub fn then(&self, next: &TransferMatrix) -> TransferMatrix {
        TransferMatrix(next.0 * self.0)
    }

    pub fn plane_block(&self, plane: Plane) -> PlaneBlock {
        let (p, s) = plane.axes();
        PlaneBlock {
            r11: self.0[(p, p)],
            r12: self.0[(p, s)],
            r21: self.0[(s, p)],
            r22: self.0[(s, s)],
            r15: self.0[(p, MOMENTUM_AXIS)],
            r25: self.0[(s, MOMENTUM_AXIS)],
        }
    }

    /// Upper-left 4x4 transverse block.
    pub fn transverse_block(&self) -> Matrix4<f64> {
        self.0.fixed_view::<4, 4>(0, 0).into_owned()
    }

    /// `(R15, R25, R35, R45)`.
    pub fn dispersion_column(&self) -> Vector4<f64> {
        self.0.fixed_view::<4, 1>(0, MOMENTUM_AXIS).into_owned()
    }

    pub fn transverse_eigenvalues(&self) -> Vec<Complex<f64>> {
        self.transverse_block()
            .complex_eigenvalues()
            .iter()
            .cloned()
            .collect()
    }

    /// True when every transverse eigenvalue lies in the closed unit disk
    /// (within `tolerance`).
    pub fn is_linearly_stable(&self, tolerance: f64) -> bool {
        self.transverse_eigenvalues()
            .iter()
            .all(|lambda| lambda.norm() <= 1.0 + tolerance)
    }
}

fn parse_element_name(name: &str) -> Result<(usize, usize)> {
    let invalid =
        || TwissError::InvalidMatrixElement(format!("'{name}' is not of the form R<i><j>"));
    let digits = name.strip_prefix('R').ok_or_else(invalid)?;
    let mut chars = digits.chars();
    let (Some(row), Some(col), None) = (chars.next(), chars.next(), chars.next()) else {
        return Err(invalid());
    };
    let row = row.to_digit(10).ok_or_else(invalid)? as usize;
    let col = col.to_digit(10).ok_or_else(invalid)? as usize;
    if !(1..=DIM).contains(&row) || !(1..=DIM).contains(&col) {
        return Err(TwissError::InvalidMatrixElement(format!(
            "'{name}' has an index outside 1..={DIM}"
        )));
    }
    Ok((row, col))
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransferRow {
    pub label: Option<String>,
    pub matrix: TransferMatrix,
}

/// How the periodic solver picks its one-period row.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RowSelector {
    #[default]
    Last,
    /// Zero-based position from the start of the table.
    Index(usize),
    /// Position counted from the end; `FromEnd(1)` is the last row.
    FromEnd(usize),
    /// Matched against row labels; the last match wins.
    Label(String),
}

/// Step-by-step transfer matrices from the reference point, in propagation
/// order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransferTable {
    rows: Vec<TransferRow>,
}

impl TransferTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_matrices<I>(matrices: I) -> Self
    where
        I: IntoIterator<Item = TransferMatrix>,
    {
        Self {
            rows: matrices
                .into_iter()
                .map(|matrix| TransferRow {
                    label: None,
                    matrix,
                })
                .collect(),
        }
    }

    /// Turns per-element maps into cumulative maps from the start of the line.
    pub fn accumulate<I, S>(elements: I) -> Self
    where
        I: IntoIterator<Item = (Option<S>, TransferMatrix)>,
        S: Into<String>,
    {
        let mut table = Self::new();
        let mut total = TransferMatrix::identity();
        for (label, element) in elements {
            total = total.then(&element);
            table.push(label.map(Into::into), total);
        }
        table
    }

    pub fn push(&mut self, label: Option<String>, matrix: TransferMatrix) {
        self.rows.push(TransferRow { label, matrix });
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[TransferRow] {
        &self.rows
    }

    pub fn matrices(&self) -> impl Iterator<Item = &TransferMatrix> + '_ {
        self.rows.iter().map(|row| &row.matrix)
    }

    pub fn plane_blocks(&self, plane: Plane) -> impl Iterator<Item = PlaneBlock> + '_ {
        self.matrices().map(move |m| m.plane_block(plane))
    }

    pub fn select(&self, selector: &RowSelector) -> Result<&TransferRow> {
        if self.rows.is_empty() {
            return Err(TwissError::EmptyTable);
        }
        match selector {
            RowSelector::Last => self.rows.last().ok_or(TwissError::EmptyTable),
            RowSelector::Index(index) => self.rows.get(*index).ok_or(TwissError::RowOutOfRange {
                index: *index as i64,
                rows: self.rows.len(),
            }),
            RowSelector::FromEnd(offset) => self
                .rows
                .len()
                .checked_sub(*offset)
                .filter(|_| *offset > 0)
                .and_then(|index| self.rows.get(index))
                .ok_or(TwissError::RowOutOfRange {
                    index: -(*offset as i64),
                    rows: self.rows.len(),
                }),
            RowSelector::Label(label) => self
                .rows
                .iter()
                .rev()
                .find(|row| row.label.as_deref() == Some(label.as_str()))
                .ok_or_else(|| TwissError::LabelNotFound(label.clone())),
        }
    }
}
