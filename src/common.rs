//! Common types for the board layer: coordinates, shot outcomes and errors.

use thiserror::Error;

/// A `(row, col)` pair, 0-indexed.
pub type Coordinate = (usize, usize);

/// Handle of a ship owned by a [`Board`](crate::Board).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShipId(pub(crate) usize);

impl ShipId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Result of registering a shot on a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShotOutcome {
    /// The shot landed on a ship cell.
    pub is_hit: bool,
    /// This shot is the one that sank the ship.
    pub is_sunk: bool,
    /// The ship occupying the shot cell, if any.
    pub ship: Option<ShipId>,
}

impl ShotOutcome {
    pub(crate) fn miss() -> Self {
        Self {
            is_hit: false,
            is_sunk: false,
            ship: None,
        }
    }
}

/// Errors returned by board and ship operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoardError {
    #[error("ship {0:?} does not belong to this board")]
    UnknownShip(ShipId),
    #[error("ship is already placed on the board")]
    ShipAlreadyPlaced,
    #[error("ship is not placed on the board")]
    ShipNotPlaced,
    #[error("ship has no position")]
    ShipNotPositioned,
    #[error("ship placement overlaps or touches another ship, or leaves the board")]
    InvalidPlacement,
    #[error("coordinate ({row}, {col}) is outside the board")]
    OutOfBounds { row: usize, col: usize },
    #[error("unable to place ship of length {length} after {attempts} attempts")]
    UnableToPlaceShip { length: usize, attempts: usize },
    #[error("invalid board document: {0}")]
    InvalidDocument(String),
}
