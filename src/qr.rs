//! QR Matrix Resolver
//!
//! The encoder is an external collaborator: whatever produced the symbol, the
//! core only sees a square dark/light matrix and resamples it onto the module
//! count declared in the configuration. Physical module size, not symbol
//! density, governs scannability, so the target grid always wins.

use base64::Engine;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

use crate::hashing::sha256_hex;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QrError {
    #[error("Module grid is empty")]
    Empty,

    #[error("Module grid is not square: row {row} has {len} cells, expected {expected}")]
    NotSquare { row: usize, len: usize, expected: usize },

    #[error("Invalid module character {ch:?} at row {row}, column {col}")]
    InvalidCell { row: usize, col: usize, ch: char },

    #[error("Resample target size must be positive")]
    ZeroTarget,

    #[error("Encoder failed: {0}")]
    Encoder(String),
}

/// Square dark/light matrix, row-major, row 0 at the top.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "GridRecord")]
pub struct ModuleGrid {
    size: usize,
    cells: Vec<bool>,
}

/// Unchecked wire shape; only reaches a `ModuleGrid` through `from_cells`.
#[derive(Deserialize)]
struct GridRecord {
    size: usize,
    cells: Vec<bool>,
}

impl TryFrom<GridRecord> for ModuleGrid {
    type Error = QrError;

    fn try_from(r: GridRecord) -> Result<Self, Self::Error> {
        ModuleGrid::from_cells(r.size, r.cells)
    }
}

impl ModuleGrid {
    pub fn from_rows(rows: Vec<Vec<bool>>) -> Result<Self, QrError> {
        let size = rows.len();
        if size == 0 {
            return Err(QrError::Empty);
        }
        let mut cells = Vec::with_capacity(size * size);
        for (row, r) in rows.into_iter().enumerate() {
            if r.len() != size {
                return Err(QrError::NotSquare { row, len: r.len(), expected: size });
            }
            cells.extend(r);
        }
        Ok(Self { size, cells })
    }

    pub fn from_cells(size: usize, cells: Vec<bool>) -> Result<Self, QrError> {
        if size == 0 {
            return Err(QrError::Empty);
        }
        if cells.len() != size * size {
            return Err(QrError::NotSquare {
                row: cells.len() / size,
                len: cells.len() % size,
                expected: size,
            });
        }
        Ok(Self { size, cells })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn get(&self, row: usize, col: usize) -> bool {
        self.cells[row * self.size + col]
    }

    pub fn dark_count(&self) -> usize {
        self.cells.iter().filter(|&&d| d).count()
    }

    /// Dark cells as (row, col), row-major.
    pub fn dark_cells(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let size = self.size;
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, d)| **d)
            .map(move |(i, _)| (i / size, i % size))
    }

    /// One string per row, `#` dark and `.` light.
    pub fn to_row_strings(&self) -> Vec<String> {
        self.cells
            .chunks(self.size)
            .map(|row| row.iter().map(|&d| if d { '#' } else { '.' }).collect())
            .collect()
    }

    /// Row-major bits, MSB first, padded to whole bytes, base64 encoded.
    pub fn packed_base64(&self) -> String {
        let mut bytes = vec![0u8; self.cells.len().div_ceil(8)];
        for (i, _) in self.cells.iter().enumerate().filter(|(_, d)| **d) {
            bytes[i / 8] |= 0x80 >> (i % 8);
        }
        base64::engine::general_purpose::STANDARD.encode(bytes)
    }

    pub fn digest(&self) -> String {
        let mut data = (self.size as u64).to_be_bytes().to_vec();
        data.extend(self.cells.iter().map(|&d| u8::from(d)));
        sha256_hex(&data)
    }
}

/// Parses one row per line. `#`, `1`, `X` are dark; `.`, `0`, `-` are
/// light. Blank lines are skipped.
impl FromStr for ModuleGrid {
    type Err = QrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut rows = vec![];
        for (row, line) in s.lines().map(str::trim_end).filter(|l| !l.is_empty()).enumerate() {
            let mut cells = Vec::with_capacity(line.len());
            for (col, ch) in line.chars().enumerate() {
                let dark = match ch {
                    '#' | '1' | 'X' | 'x' => true,
                    '.' | '0' | '-' => false,
                    _ => return Err(QrError::InvalidCell { row, col, ch }),
                };
                cells.push(dark);
            }
            rows.push(cells);
        }
        Self::from_rows(rows)
    }
}

/// Source index for target index `i`: floor((i + 0.5) * source / target),
/// clamped. Integer form of the same expression, so no rounding drift.
fn sample_index(i: usize, source: usize, target: usize) -> usize {
    (((2 * i + 1) * source) / (2 * target)).min(source - 1)
}

/// Nearest-neighbour resample of a raw row-major matrix.
pub fn resolve_cells(
    source: &[bool],
    source_size: usize,
    target_size: usize,
) -> Result<Vec<bool>, QrError> {
    if source_size == 0 {
        return Err(QrError::Empty);
    }
    if target_size == 0 {
        return Err(QrError::ZeroTarget);
    }
    if source.len() != source_size * source_size {
        return Err(QrError::NotSquare {
            row: source.len() / source_size,
            len: source.len() % source_size,
            expected: source_size,
        });
    }

    let map: Vec<usize> = (0..target_size)
        .map(|i| sample_index(i, source_size, target_size))
        .collect();

    let mut out = Vec::with_capacity(target_size * target_size);
    for &sr in &map {
        for &sc in &map {
            out.push(source[sr * source_size + sc]);
        }
    }
    Ok(out)
}

pub fn resolve(source: &ModuleGrid, target_size: usize) -> Result<ModuleGrid, QrError> {
    let cells = resolve_cells(&source.cells, source.size, target_size)?;
    ModuleGrid::from_cells(target_size, cells)
}

/// What a resample did, for callers that must warn on lossy output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResampleReport {
    pub source_size: usize,
    pub target_size: usize,
    /// Target modules per source module.
    pub scale: f64,
    pub lossy: bool,
}

impl ResampleReport {
    pub fn new(source_size: usize, target_size: usize) -> Self {
        Self {
            source_size,
            target_size,
            scale: target_size as f64 / source_size.max(1) as f64,
            lossy: source_size != target_size,
        }
    }
}

/// Capability for turning a payload into a symbol matrix.
///
/// The core never encodes; adapters inject whatever encoder they have.
pub trait QrEncoder {
    fn encode(&self, payload: &str) -> Result<ModuleGrid, QrError>;
}

/// An already-encoded symbol, e.g. loaded from a matrix file.
#[derive(Debug, Clone)]
pub struct PrecomputedMatrix(pub ModuleGrid);

impl QrEncoder for PrecomputedMatrix {
    fn encode(&self, _payload: &str) -> Result<ModuleGrid, QrError> {
        Ok(self.0.clone())
    }
}

impl<F> QrEncoder for F
where
    F: Fn(&str) -> Result<ModuleGrid, QrError>,
{
    fn encode(&self, payload: &str) -> Result<ModuleGrid, QrError> {
        self(payload)
    }
}
