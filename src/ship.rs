//! Ship definitions: length, anchor, orientation and hit tracking.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::common::{BoardError, Coordinate};

/// A ship with a length, an optional anchor and the set of its hit cells.
///
/// A ship is alive while fewer than `length` of its cells have been hit. Once
/// dead it stays dead: [`Ship::repair_coordinate`] only works on live ships.
#[derive(Clone, PartialEq, Eq)]
pub struct Ship {
    length: usize,
    anchor: Option<Coordinate>,
    is_horizontal: bool,
    is_alive: bool,
    sunk_coordinates: BTreeSet<Coordinate>,
}

impl Ship {
    /// Create an unplaced, horizontal ship.
    pub fn new(length: usize) -> Self {
        Self {
            length,
            anchor: None,
            is_horizontal: true,
            is_alive: true,
            sunk_coordinates: BTreeSet::new(),
        }
    }

    /// Create a ship anchored at (`row`, `col`).
    pub fn placed(length: usize, row: usize, col: usize, is_horizontal: bool) -> Self {
        let mut ship = Self::new(length);
        ship.move_to(row, col, is_horizontal);
        ship
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// Anchor cell, `None` while the ship has no position.
    pub fn anchor(&self) -> Option<Coordinate> {
        self.anchor
    }

    pub fn is_horizontal(&self) -> bool {
        self.is_horizontal
    }

    pub fn is_alive(&self) -> bool {
        self.is_alive
    }

    pub fn sunk_coordinates(&self) -> &BTreeSet<Coordinate> {
        &self.sunk_coordinates
    }

    /// Cells covered by the ship, empty when unplaced.
    pub fn coordinates(&self) -> Vec<Coordinate> {
        let Some((row, col)) = self.anchor else {
            return Vec::new();
        };
        (0..self.length)
            .map(|tile| {
                if self.is_horizontal {
                    (row, col.saturating_add(tile))
                } else {
                    (row.saturating_add(tile), col)
                }
            })
            .collect()
    }

    pub fn contains(&self, row: usize, col: usize) -> bool {
        let Some((r, c)) = self.anchor else {
            return false;
        };
        if self.is_horizontal {
            row == r && col >= c && col - c < self.length
        } else {
            col == c && row >= r && row - r < self.length
        }
    }

    /// Reposition the ship. Hits are kept as-is.
    pub fn move_to(&mut self, row: usize, col: usize, is_horizontal: bool) {
        self.anchor = Some((row, col));
        self.is_horizontal = is_horizontal;
    }

    pub fn flip(&mut self) {
        self.is_horizontal = !self.is_horizontal;
    }

    /// Mark a cell as hit. Returns `true` if the cell belongs to the ship.
    pub fn sink_coordinate(&mut self, row: usize, col: usize) -> bool {
        let part_of_ship = self.contains(row, col);
        if part_of_ship {
            self.sunk_coordinates.insert((row, col));
        }
        if self.is_sunk() {
            self.is_alive = false;
        }
        part_of_ship
    }

    /// Remove a hit from a live ship. Dead ships cannot be repaired.
    pub fn repair_coordinate(&mut self, row: usize, col: usize) -> bool {
        self.is_alive && self.sunk_coordinates.remove(&(row, col))
    }

    /// All cells have been hit.
    pub fn is_sunk(&self) -> bool {
        self.sunk_coordinates.len() >= self.length
    }

    /// Wire form of a positioned ship.
    pub fn to_document(&self) -> Result<ShipDocument, BoardError> {
        let (row, col) = self.anchor.ok_or(BoardError::ShipNotPositioned)?;
        Ok(ShipDocument {
            ship_length: self.length,
            row,
            col,
            is_horizontal: self.is_horizontal,
            is_alive: self.is_alive,
            sunk_coordinates: self.sunk_coordinates.iter().copied().collect(),
        })
    }
}

impl fmt::Debug for Ship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Ship {{ length: {}, anchor: {:?}, horizontal: {}, alive: {}, hits: {:?} }}",
            self.length, self.anchor, self.is_horizontal, self.is_alive, self.sunk_coordinates
        )
    }
}

/// Serialized ship as it appears inside a board document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipDocument {
    pub ship_length: usize,
    pub row: usize,
    pub col: usize,
    pub is_horizontal: bool,
    pub is_alive: bool,
    #[serde(default)]
    pub sunk_coordinates: Vec<Coordinate>,
}

impl TryFrom<&ShipDocument> for Ship {
    type Error = BoardError;

    /// Rebuild a ship, rejecting documents whose hit set contradicts the ship.
    fn try_from(doc: &ShipDocument) -> Result<Self, Self::Error> {
        if doc.ship_length == 0 {
            return Err(BoardError::InvalidDocument(
                "ship length must be positive".into(),
            ));
        }
        let mut ship = Ship::placed(doc.ship_length, doc.row, doc.col, doc.is_horizontal);
        for &(row, col) in &doc.sunk_coordinates {
            if !ship.sink_coordinate(row, col) {
                return Err(BoardError::InvalidDocument(format!(
                    "hit ({row}, {col}) is not part of the ship at ({}, {})",
                    doc.row, doc.col
                )));
            }
        }
        if ship.is_alive != doc.is_alive {
            return Err(BoardError::InvalidDocument(format!(
                "ship at ({}, {}) reports is_alive={} with {} of {} cells hit",
                doc.row,
                doc.col,
                doc.is_alive,
                ship.sunk_coordinates.len(),
                doc.ship_length
            )));
        }
        Ok(ship)
    }
}
