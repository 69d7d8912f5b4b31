//! Grid addressing for the light panels.
//!
//! A fixture's unit id is its row and column written next to each other in
//! decimal (row 3, column 7 is unit 37). Installed panels are addressed this
//! way, so the encoding has to stay exactly as it is even though it collides
//! once columns reach two digits (row 1 col 23 vs row 12 col 3).

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_GRID_SIZE: u32 = 10;
/// Grid size assumed by [`get_grid_position`].
pub const DEFAULT_INVERSE_GRID_SIZE: u32 = 9;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GridError {
    #[error("Row and column must be between 1 and {grid_size}")]
    OutOfRange { grid_size: u32 },

    #[error("Row {row} and column {col} do not fit in a unit id")]
    Overflow { row: u32, col: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridPosition {
    pub row: u32,
    pub col: u32,
}

impl GridPosition {
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    pub fn unit_id(&self, grid_size: u32) -> Result<u64, GridError> {
        calculate_grid_unit_id(self.row, self.col, grid_size)
    }
}

impl Default for GridPosition {
    fn default() -> Self {
        Self { row: 1, col: 1 }
    }
}

/// Unit id for a grid position, by decimal concatenation of row and column.
pub fn calculate_grid_unit_id(row: u32, col: u32, grid_size: u32) -> Result<u64, GridError> {
    if row < 1 || row > grid_size || col < 1 || col > grid_size {
        return Err(GridError::OutOfRange { grid_size });
    }

    let digits = col.ilog10() + 1;
    10u64
        .checked_pow(digits)
        .and_then(|shift| u64::from(row).checked_mul(shift))
        .and_then(|shifted| shifted.checked_add(u64::from(col)))
        .ok_or(GridError::Overflow { row, col })
}

/// Arithmetic row-major inverse: `row = (id - 1) / size + 1`,
/// `col = (id - 1) % size + 1`.
///
/// This is NOT the inverse of [`calculate_grid_unit_id`]: unit 37 maps back to
/// row 5, col 1 on a 9-wide grid. Callers that need the panel position of a
/// concatenated id must split the digits themselves.
pub fn get_grid_position(unit_id: u32, grid_size: u32) -> GridPosition {
    let index = unit_id as i64 - 1;
    let size = grid_size.max(1) as i64;
    GridPosition {
        row: (index.div_euclid(size) + 1) as u32,
        col: (index % size + 1) as u32,
    }
}
