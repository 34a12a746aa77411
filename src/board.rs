//! Board state: ship placement with adjacency buffering, shots and hits.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::common::{BoardError, Coordinate, ShipId, ShotOutcome};
use crate::config::{
    BOARD_COLUMNS, BOARD_ROWS, MAX_BOARD_DIMENSION, MAX_PLACEMENT_ATTEMPTS, STANDARD_FLEET,
};
use crate::ship::{Ship, ShipDocument};

/// Serialized board: dimensions plus every placed ship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardDocument {
    pub rows_count: usize,
    pub columns_count: usize,
    pub ships: Vec<ShipDocument>,
}

impl BoardDocument {
    /// Parse a document from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, BoardError> {
        serde_json::from_str(json).map_err(|e| BoardError::InvalidDocument(e.to_string()))
    }

    /// Accept either a JSON-encoded string or an inline JSON object.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, BoardError> {
        match value {
            serde_json::Value::String(json) => Self::from_json(json),
            other => serde_json::from_value(other.clone())
                .map_err(|e| BoardError::InvalidDocument(e.to_string())),
        }
    }

    pub fn to_json(&self) -> String {
        // A document only holds integers, booleans and arrays.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// A grid of ships and shots.
///
/// Ships live in an arena and move between the unplaced set and the placed map
/// (keyed by anchor). Every placed ship increments `taken` for each in-board
/// cell of its 8-neighbourhood ring, own cells included; a candidate placement
/// is valid only when none of its cells carries a positive count.
#[derive(Clone)]
pub struct Board {
    rows: usize,
    columns: usize,
    ships: Vec<Ship>,
    unplaced: BTreeSet<ShipId>,
    placed: BTreeMap<Coordinate, Vec<ShipId>>,
    taken: HashMap<Coordinate, u32>,
    shots: HashMap<Coordinate, u32>,
    hit_coordinates: BTreeSet<Coordinate>,
}

impl Board {
    /// A 10x10 board holding the unplaced standard fleet.
    pub fn new() -> Self {
        Self::with_fleet(BOARD_ROWS, BOARD_COLUMNS, &STANDARD_FLEET)
    }

    /// A board holding one unplaced ship per entry of `lengths`.
    pub fn with_fleet(rows: usize, columns: usize, lengths: &[usize]) -> Self {
        let mut board = Self::empty(rows, columns);
        for &length in lengths {
            board.add_ship(Ship::new(length));
        }
        board
    }

    /// A board without any ship.
    pub fn empty(rows: usize, columns: usize) -> Self {
        Self {
            rows,
            columns,
            ships: Vec::new(),
            unplaced: BTreeSet::new(),
            placed: BTreeMap::new(),
            taken: HashMap::new(),
            shots: HashMap::new(),
            hit_coordinates: BTreeSet::new(),
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Take ownership of a ship; it starts in the unplaced set.
    pub fn add_ship(&mut self, ship: Ship) -> ShipId {
        let id = ShipId(self.ships.len());
        self.ships.push(ship);
        self.unplaced.insert(id);
        id
    }

    pub fn ship(&self, id: ShipId) -> Option<&Ship> {
        self.ships.get(id.0)
    }

    /// Ids of placed ships, ordered by anchor.
    pub fn placed_ship_ids(&self) -> Vec<ShipId> {
        self.placed.values().flatten().copied().collect()
    }

    pub fn unplaced_ship_ids(&self) -> Vec<ShipId> {
        self.unplaced.iter().copied().collect()
    }

    /// Placed ships, ordered by anchor.
    pub fn placed_ships(&self) -> impl Iterator<Item = &Ship> {
        self.placed.values().flatten().map(|id| &self.ships[id.0])
    }

    pub fn is_placed(&self, id: ShipId) -> bool {
        self.ships
            .get(id.0)
            .and_then(Ship::anchor)
            .and_then(|anchor| self.placed.get(&anchor))
            .is_some_and(|ids| ids.contains(&id))
    }

    pub fn is_coordinate_in_board(&self, row: usize, col: usize) -> bool {
        row < self.rows && col < self.columns
    }

    /// Every ship cell is on the board and none is in another ship's buffer.
    pub fn is_placement_valid(&self, ship: &Ship) -> bool {
        if ship.length() > self.rows.max(self.columns) {
            return false;
        }
        let cells = ship.coordinates();
        !cells.is_empty()
            && cells
                .iter()
                .all(|&(row, col)| self.is_coordinate_in_board(row, col))
            && cells.iter().all(|cell| self.taken_count(cell) == 0)
    }

    /// Number of placed ships whose buffer covers the cell.
    pub fn taken_count(&self, cell: &Coordinate) -> u32 {
        self.taken.get(cell).copied().unwrap_or(0)
    }

    /// Put a positioned, unplaced ship onto the board.
    pub fn place(&mut self, id: ShipId) -> Result<(), BoardError> {
        let ship = self.ships.get(id.0).ok_or(BoardError::UnknownShip(id))?;
        if self.is_placed(id) {
            return Err(BoardError::ShipAlreadyPlaced);
        }
        let anchor = ship.anchor().ok_or(BoardError::ShipNotPositioned)?;
        if !self.is_placement_valid(ship) {
            return Err(BoardError::InvalidPlacement);
        }
        self.occupy(id, 1);
        self.placed.entry(anchor).or_default().push(id);
        self.unplaced.remove(&id);
        Ok(())
    }

    /// Take a placed ship off the board; it returns to the unplaced set.
    pub fn remove(&mut self, id: ShipId) -> Result<(), BoardError> {
        let ship = self.ships.get(id.0).ok_or(BoardError::UnknownShip(id))?;
        let anchor = ship.anchor().ok_or(BoardError::ShipNotPlaced)?;
        let ids = self
            .placed
            .get_mut(&anchor)
            .ok_or(BoardError::ShipNotPlaced)?;
        let position = ids
            .iter()
            .position(|&other| other == id)
            .ok_or(BoardError::ShipNotPlaced)?;
        ids.remove(position);
        if ids.is_empty() {
            self.placed.remove(&anchor);
        }
        self.occupy(id, -1);
        self.unplaced.insert(id);
        Ok(())
    }

    /// Move a placed ship. An invalid target leaves it at its old position.
    pub fn move_ship(
        &mut self,
        id: ShipId,
        row: usize,
        col: usize,
        is_horizontal: bool,
    ) -> Result<(), BoardError> {
        self.remove(id)?;
        let ship = &mut self.ships[id.0];
        let (old_row, old_col) = ship.anchor().ok_or(BoardError::ShipNotPositioned)?;
        let old_is_horizontal = ship.is_horizontal();
        ship.move_to(row, col, is_horizontal);

        if self.place(id).is_ok() {
            return Ok(());
        }
        debug!("cannot move ship to ({row}, {col}), restoring ({old_row}, {old_col})");
        self.ships[id.0].move_to(old_row, old_col, old_is_horizontal);
        self.place(id)?;
        Err(BoardError::InvalidPlacement)
    }

    /// Rotate a placed ship around its anchor, with the same rollback as `move_ship`.
    pub fn flip(&mut self, id: ShipId) -> Result<(), BoardError> {
        let ship = self.ships.get(id.0).ok_or(BoardError::UnknownShip(id))?;
        let (row, col) = ship.anchor().ok_or(BoardError::ShipNotPlaced)?;
        let is_horizontal = !ship.is_horizontal();
        self.move_ship(id, row, col, is_horizontal)
    }

    pub fn remove_all_ships(&mut self) {
        for id in self.placed_ship_ids() {
            // Every id comes from the placed map.
            let _ = self.remove(id);
        }
    }

    /// Clear the board and place every ship at a random valid position,
    /// longest ships first.
    pub fn random_shuffle<R: Rng>(&mut self, rng: &mut R) -> Result<(), BoardError> {
        self.remove_all_ships();

        let mut pending = self.unplaced_ship_ids();
        pending.sort_by_key(|id| std::cmp::Reverse(self.ships[id.0].length()));

        for id in pending {
            let length = self.ships[id.0].length();
            let orientations: Vec<bool> = [true, false]
                .into_iter()
                .filter(|&horizontal| {
                    if horizontal {
                        length <= self.columns && self.rows > 0
                    } else {
                        length <= self.rows && self.columns > 0
                    }
                })
                .collect();
            if length == 0 || orientations.is_empty() {
                return Err(BoardError::UnableToPlaceShip {
                    length,
                    attempts: 0,
                });
            }

            let mut placed = false;
            for _ in 0..MAX_PLACEMENT_ATTEMPTS {
                let is_horizontal = orientations[rng.random_range(0..orientations.len())];
                let (max_row, max_col) = if is_horizontal {
                    (self.rows - 1, self.columns - length)
                } else {
                    (self.rows - length, self.columns - 1)
                };
                let row = rng.random_range(0..=max_row);
                let col = rng.random_range(0..=max_col);
                self.ships[id.0].move_to(row, col, is_horizontal);
                if self.place(id).is_ok() {
                    placed = true;
                    break;
                }
            }
            if !placed {
                return Err(BoardError::UnableToPlaceShip {
                    length,
                    attempts: MAX_PLACEMENT_ATTEMPTS,
                });
            }
        }
        Ok(())
    }

    /// Placed ship covering the cell.
    pub fn ship_at(&self, row: usize, col: usize) -> Option<ShipId> {
        self.placed
            .values()
            .flatten()
            .copied()
            .find(|id| self.ships[id.0].contains(row, col))
    }

    pub fn is_coordinate_shot_at(&self, row: usize, col: usize) -> bool {
        self.shot_count(row, col) > 0
    }

    /// Number of shot marks on the cell; 0 for cells never shot.
    pub fn shot_count(&self, row: usize, col: usize) -> u32 {
        self.shots.get(&(row, col)).copied().unwrap_or(0)
    }

    /// Every coordinate known to be a hit ship cell.
    pub fn hit_coordinates(&self) -> &BTreeSet<Coordinate> {
        &self.hit_coordinates
    }

    /// Record a shot. Sinking a ship also marks its whole ring as shot.
    pub fn register_shot(&mut self, row: usize, col: usize) -> Result<ShotOutcome, BoardError> {
        if !self.is_coordinate_in_board(row, col) {
            return Err(BoardError::OutOfBounds { row, col });
        }
        *self.shots.entry((row, col)).or_default() += 1;

        let Some(id) = self.ship_at(row, col) else {
            return Ok(ShotOutcome::miss());
        };

        let ship = &mut self.ships[id.0];
        let was_alive = ship.is_alive();
        ship.sink_coordinate(row, col);
        self.hit_coordinates
            .extend(ship.sunk_coordinates().iter().copied());

        let is_sunk = was_alive && !ship.is_alive();
        if is_sunk {
            for cell in self.adjacent_coordinates(&self.ships[id.0]) {
                *self.shots.entry(cell).or_default() += 1;
            }
        }

        Ok(ShotOutcome {
            is_hit: true,
            is_sunk,
            ship: Some(id),
        })
    }

    /// `true` when no placed ship is alive.
    pub fn are_all_ships_sunk(&self) -> bool {
        self.placed_ships().all(|ship| !ship.is_alive())
    }

    /// Placed ship lengths equal `lengths` as a multiset.
    pub fn matches_fleet(&self, lengths: &[usize]) -> bool {
        let mut expected = lengths.to_vec();
        expected.sort_unstable();
        let mut actual: Vec<usize> = self.placed_ships().map(Ship::length).collect();
        actual.sort_unstable();
        expected == actual
    }

    /// In-board cells of the 8-neighbourhood ring around a ship, own cells included.
    pub(crate) fn adjacent_coordinates(&self, ship: &Ship) -> BTreeSet<Coordinate> {
        let mut cells = BTreeSet::new();
        for (row, col) in ship.coordinates() {
            for d_row in -1isize..=1 {
                for d_col in -1isize..=1 {
                    let (Some(r), Some(c)) = (
                        row.checked_add_signed(d_row),
                        col.checked_add_signed(d_col),
                    ) else {
                        continue;
                    };
                    if self.is_coordinate_in_board(r, c) {
                        cells.insert((r, c));
                    }
                }
            }
        }
        cells
    }

    pub(crate) fn mark_shot(&mut self, row: usize, col: usize) {
        *self.shots.entry((row, col)).or_default() += 1;
    }

    pub(crate) fn mark_hit(&mut self, row: usize, col: usize) {
        self.hit_coordinates.insert((row, col));
    }

    fn occupy(&mut self, id: ShipId, delta: i32) {
        for cell in self.adjacent_coordinates(&self.ships[id.0]) {
            let count = self.taken.entry(cell).or_default();
            *count = count.saturating_add_signed(delta);
            if *count == 0 {
                self.taken.remove(&cell);
            }
        }
    }

    /// Serialize dimensions and every placed ship.
    pub fn to_document(&self) -> BoardDocument {
        BoardDocument {
            rows_count: self.rows,
            columns_count: self.columns,
            ships: self
                .placed_ships()
                .filter_map(|ship| ship.to_document().ok())
                .collect(),
        }
    }

    /// Rebuild a board, failing on the first invalid ship.
    pub fn from_document(doc: &BoardDocument) -> Result<Self, BoardError> {
        let dimensions = 1..=MAX_BOARD_DIMENSION;
        if !dimensions.contains(&doc.rows_count) || !dimensions.contains(&doc.columns_count) {
            return Err(BoardError::InvalidDocument(format!(
                "board dimensions {}x{} are not supported",
                doc.rows_count, doc.columns_count
            )));
        }

        let mut board = Self::empty(doc.rows_count, doc.columns_count);
        let longest = doc.rows_count.max(doc.columns_count);
        for ship_doc in &doc.ships {
            if ship_doc.ship_length > longest {
                return Err(BoardError::InvalidDocument(format!(
                    "ship length {} does not fit a {}x{} board",
                    ship_doc.ship_length, doc.rows_count, doc.columns_count
                )));
            }
            let ship = Ship::try_from(ship_doc)?;
            if !board.is_placement_valid(&ship) {
                return Err(BoardError::InvalidDocument(format!(
                    "invalid placement of ship of length {} at ({}, {})",
                    ship_doc.ship_length, ship_doc.row, ship_doc.col
                )));
            }
            let hits: Vec<Coordinate> = ship.sunk_coordinates().iter().copied().collect();
            let id = board.add_ship(ship);
            board.place(id)?;
            for (row, col) in hits {
                board.mark_shot(row, col);
                board.mark_hit(row, col);
            }
        }
        Ok(board)
    }

    pub fn to_json(&self) -> String {
        self.to_document().to_json()
    }

    pub fn from_json(json: &str) -> Result<Self, BoardError> {
        Self::from_document(&BoardDocument::from_json(json)?)
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Board")
            .field("rows", &self.rows)
            .field("columns", &self.columns)
            .field("placed", &self.placed_ships().collect::<Vec<_>>())
            .field("unplaced", &self.unplaced.len())
            .field("hits", &self.hit_coordinates)
            .finish()
    }
}

/// Grid rendering: ship lengths, `x` hits, `o` shot water, `+` buffer, `.` empty.
impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in 0..self.rows {
            let line: Vec<String> = (0..self.columns)
                .map(|col| {
                    if self.hit_coordinates.contains(&(row, col)) {
                        "x".to_string()
                    } else if let Some(id) = self.ship_at(row, col) {
                        self.ships[id.0].length().to_string()
                    } else if self.is_coordinate_shot_at(row, col) {
                        "o".to_string()
                    } else if self.taken_count(&(row, col)) > 0 {
                        "+".to_string()
                    } else {
                        ".".to_string()
                    }
                })
                .collect();
            writeln!(f, "{}", line.join(" "))?;
        }
        Ok(())
    }
}

/// What a player has learned about the opponent's board.
///
/// Starts with no ships; ships are revealed once their position is known and
/// shots are recorded with the hit flag reported by the server.
#[derive(Debug, Clone)]
pub struct EnemyView {
    board: Board,
}

impl EnemyView {
    pub fn new(rows: usize, columns: usize) -> Self {
        Self {
            board: Board::empty(rows, columns),
        }
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Place a ship whose position is now known. Returns `false` when the
    /// ship collides with an already revealed one.
    pub fn reveal_ship(&mut self, ship: Ship, reveal_adjacent: bool) -> bool {
        if !self.board.is_placement_valid(&ship) {
            return false;
        }
        let ring = self.board.adjacent_coordinates(&ship);
        let id = self.board.add_ship(ship);
        if self.board.place(id).is_err() {
            return false;
        }
        if reveal_adjacent {
            for (row, col) in ring {
                self.board.mark_shot(row, col);
            }
        }
        true
    }

    /// Record a shot whose outcome the server already decided.
    pub fn register_shot_on_view(&mut self, row: usize, col: usize, is_hit: bool) {
        self.board.mark_shot(row, col);
        if is_hit {
            self.board.mark_hit(row, col);
        }
    }

    /// Reveal every ship of a post-game board document. Ships that are already
    /// revealed or malformed are skipped.
    pub fn reveal_ships_from_document(&mut self, doc: &BoardDocument) -> usize {
        doc.ships
            .iter()
            .filter_map(|ship_doc| Ship::try_from(ship_doc).ok())
            .filter(|ship| self.reveal_ship(ship.clone(), false))
            .count()
    }

    pub fn is_coordinate_shot_at(&self, row: usize, col: usize) -> bool {
        self.board.is_coordinate_shot_at(row, col)
    }

    pub fn is_coordinate_in_board(&self, row: usize, col: usize) -> bool {
        self.board.is_coordinate_in_board(row, col)
    }
}
