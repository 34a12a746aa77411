//! Two-player rooms: turn arbitration, shot resolution, timeouts and win detection.

use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, SystemTime};

use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::board::{Board, BoardDocument};
use crate::clock::epoch_seconds;
use crate::common::BoardError;
use crate::ship::ShipDocument;

/// Opaque per-connection handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClientId(pub u64);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomError {
    #[error("client is not a member of this room")]
    NotAMember,
    #[error("room has no opponent")]
    NoOpponent,
    #[error("participant has not submitted a board")]
    MissingBoard,
    #[error("battle has already started")]
    BattleAlreadyStarted,
    #[error(transparent)]
    Board(#[from] BoardError),
}

/// A shot the opponent made, queued for the target to poll.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShotRecord {
    pub row: usize,
    pub col: usize,
    pub is_turn: bool,
    pub has_battle_ended: bool,
    pub is_winner: bool,
    pub turn_end_time: SystemTime,
}

/// Arguments of a successful `register_shot` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShotReport {
    pub has_hit_ship: bool,
    pub has_sunk_ship: bool,
    pub sunk_ship: Option<ShipDocument>,
    pub is_turn: bool,
    pub turn_end_time: f64,
    pub has_battle_ended: bool,
    pub is_winner: bool,
    pub is_timeout: bool,
}

/// Arguments of a successful `ask_to_receive_shot` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceivedShot {
    pub row: usize,
    pub col: usize,
    pub is_turn: bool,
    pub turn_end_time: f64,
    pub has_battle_ended: bool,
    pub is_winner: bool,
    pub is_timeout: bool,
}

/// Arguments of a successful `is_opponent_ready` response.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Readiness {
    pub is_turn: bool,
    pub turn_end_time: f64,
}

/// Arguments carried by a "battle has ended" error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleOutcome {
    pub has_battle_ended: bool,
    pub is_winner: bool,
    pub is_timeout: bool,
}

/// One participant of a room.
#[derive(Debug, Clone)]
pub struct RoomClient {
    id: ClientId,
    name: String,
    board: Option<Board>,
    shot_history: VecDeque<ShotRecord>,
    is_turn: bool,
}

impl RoomClient {
    pub fn new(id: ClientId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            board: None,
            shot_history: VecDeque::new(),
            is_turn: false,
        }
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn board(&self) -> Option<&Board> {
        self.board.as_ref()
    }

    pub fn has_board(&self) -> bool {
        self.board.is_some()
    }

    pub fn is_turn(&self) -> bool {
        self.is_turn
    }

    pub fn pending_shots(&self) -> usize {
        self.shot_history.len()
    }

    /// Install a board rebuilt from its document. The previous board, if any,
    /// is kept when the document is rejected.
    pub fn add_board(&mut self, doc: &BoardDocument) -> Result<(), BoardError> {
        let board = Board::from_document(doc)?;
        if board.placed_ships().next().is_none() {
            return Err(BoardError::InvalidDocument("board has no ships".into()));
        }
        self.board = Some(board);
        Ok(())
    }

    /// In the board and not shot before.
    pub fn is_shot_valid(&self, row: usize, col: usize) -> bool {
        self.board.as_ref().is_some_and(|board| {
            board.is_coordinate_in_board(row, col) && !board.is_coordinate_shot_at(row, col)
        })
    }

    pub fn are_all_ships_sunk(&self) -> bool {
        self.board.as_ref().is_some_and(Board::are_all_ships_sunk)
    }
}

/// A battle between at most two clients.
#[derive(Debug, Clone)]
pub struct Room {
    id: RoomId,
    clients: Vec<RoomClient>,
    is_private: bool,
    is_full: bool,
    has_battle_started: bool,
    has_battle_ended: bool,
    loser: Option<ClientId>,
    time_per_turn: Option<Duration>,
    turn_end_time: Option<SystemTime>,
    is_timeout: bool,
}

impl Room {
    pub const MAX_PLAYERS: usize = 2;

    pub fn new(
        id: RoomId,
        client: ClientId,
        name: impl Into<String>,
        time_per_turn: Option<Duration>,
    ) -> Self {
        Self {
            id,
            clients: vec![RoomClient::new(client, name)],
            is_private: false,
            is_full: false,
            has_battle_started: false,
            has_battle_ended: false,
            loser: None,
            time_per_turn,
            turn_end_time: None,
            is_timeout: false,
        }
    }

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    pub fn is_private(&self) -> bool {
        self.is_private
    }

    pub fn is_full(&self) -> bool {
        self.is_full
    }

    pub fn has_battle_started(&self) -> bool {
        self.has_battle_started
    }

    pub fn has_battle_ended(&self) -> bool {
        self.has_battle_ended
    }

    pub fn loser(&self) -> Option<ClientId> {
        self.loser
    }

    pub fn is_timeout(&self) -> bool {
        self.is_timeout
    }

    pub fn turn_end_time(&self) -> Option<SystemTime> {
        self.turn_end_time
    }

    pub fn client_ids(&self) -> Vec<ClientId> {
        self.clients.iter().map(RoomClient::id).collect()
    }

    pub fn contains(&self, client: ClientId) -> bool {
        self.clients.iter().any(|c| c.id == client)
    }

    pub fn client(&self, client: ClientId) -> Result<&RoomClient, RoomError> {
        self.clients
            .iter()
            .find(|c| c.id == client)
            .ok_or(RoomError::NotAMember)
    }

    fn client_mut(&mut self, client: ClientId) -> Result<&mut RoomClient, RoomError> {
        self.clients
            .iter_mut()
            .find(|c| c.id == client)
            .ok_or(RoomError::NotAMember)
    }

    /// The other participant, if one has joined.
    pub fn opponent(&self, client: ClientId) -> Option<&RoomClient> {
        self.clients.iter().find(|c| c.id != client)
    }

    fn opponent_mut(&mut self, client: ClientId) -> Option<&mut RoomClient> {
        self.clients.iter_mut().find(|c| c.id != client)
    }

    /// Toggle privacy and return the new value.
    pub fn change_publicity(&mut self) -> bool {
        self.is_private = !self.is_private;
        self.is_private
    }

    /// Returns `false` when the room is full or the client is already in it.
    pub fn add_player(&mut self, client: ClientId, name: impl Into<String>) -> bool {
        if self.clients.len() >= Self::MAX_PLAYERS || self.contains(client) {
            return false;
        }
        self.clients.push(RoomClient::new(client, name));
        self.is_full = self.clients.len() == Self::MAX_PLAYERS;
        true
    }

    pub fn add_board_for_client(
        &mut self,
        client: ClientId,
        doc: &BoardDocument,
    ) -> Result<(), RoomError> {
        if self.has_battle_started {
            return Err(RoomError::BattleAlreadyStarted);
        }
        self.client_mut(client)?.add_board(doc)?;
        Ok(())
    }

    pub fn does_client_have_board(&self, client: ClientId) -> bool {
        self.client(client).is_ok_and(RoomClient::has_board)
    }

    pub fn is_client_turn(&self, client: ClientId) -> bool {
        self.client(client).is_ok_and(RoomClient::is_turn)
    }

    fn end_of_turn(&self, now: SystemTime) -> SystemTime {
        match self.time_per_turn {
            Some(budget) => now + budget,
            None => now,
        }
    }

    /// Hand the turn to `client` and restart the deadline.
    pub fn give_client_turn(&mut self, client: ClientId, now: SystemTime) {
        for c in &mut self.clients {
            c.is_turn = c.id == client;
        }
        self.turn_end_time = Some(self.end_of_turn(now));
    }

    /// Pass the turn from `client` to the opponent and restart the deadline.
    pub fn take_client_turn(&mut self, client: ClientId, now: SystemTime) {
        for c in &mut self.clients {
            c.is_turn = c.id != client;
        }
        self.turn_end_time = Some(self.end_of_turn(now));
    }

    /// Whether `client` may fire at (`row`, `col`) on the opponent's board.
    pub fn is_client_shot_valid(&self, client: ClientId, row: usize, col: usize) -> bool {
        self.opponent(client)
            .is_some_and(|target| target.is_shot_valid(row, col))
    }

    /// Fire at the opponent's board. A hit keeps the turn, a miss passes it.
    /// The outcome is also queued on the target's shot history.
    pub fn register_shot_for_client(
        &mut self,
        client: ClientId,
        row: usize,
        col: usize,
        now: SystemTime,
    ) -> Result<ShotReport, RoomError> {
        self.client(client)?;
        let target = self.opponent_mut(client).ok_or(RoomError::NoOpponent)?;
        let target_id = target.id;
        let board = target.board.as_mut().ok_or(RoomError::MissingBoard)?;
        let outcome = board.register_shot(row, col)?;
        let sunk_ship = match outcome.ship {
            Some(id) if outcome.is_sunk => board.ship(id).and_then(|s| s.to_document().ok()),
            _ => None,
        };

        if outcome.is_hit {
            self.give_client_turn(client, now);
        } else {
            self.take_client_turn(client, now);
        }
        self.check_has_battle_ended();

        let turn_end_time = self.turn_end_time.unwrap_or(now);
        let record = ShotRecord {
            row,
            col,
            is_turn: self.is_client_turn(target_id),
            has_battle_ended: self.has_battle_ended,
            is_winner: self.is_client_winner(target_id),
            turn_end_time,
        };
        if let Some(target) = self.opponent_mut(client) {
            target.shot_history.push_back(record);
        }

        debug!(
            "room {}: {client} fired at ({row}, {col}) hit={} sunk={}",
            self.id, outcome.is_hit, outcome.is_sunk
        );

        Ok(ShotReport {
            has_hit_ship: outcome.is_hit,
            has_sunk_ship: outcome.is_sunk,
            sunk_ship,
            is_turn: self.is_client_turn(client),
            turn_end_time: epoch_seconds(turn_end_time),
            has_battle_ended: self.has_battle_ended,
            is_winner: self.is_client_winner(client),
            is_timeout: self.is_timeout,
        })
    }

    /// Pop the oldest shot made against `client`.
    pub fn pop_shot_history(&mut self, client: ClientId) -> Option<ReceivedShot> {
        let is_timeout = self.is_timeout;
        let record = self.client_mut(client).ok()?.shot_history.pop_front()?;
        Some(ReceivedShot {
            row: record.row,
            col: record.col,
            is_turn: record.is_turn,
            turn_end_time: epoch_seconds(record.turn_end_time),
            has_battle_ended: record.has_battle_ended,
            is_winner: record.is_winner,
            is_timeout,
        })
    }

    /// Start the battle once; the first participant gets the first turn.
    pub fn start_battle(&mut self, now: SystemTime) {
        if self.has_battle_started {
            return;
        }
        self.has_battle_started = true;
        if let Some(first) = self.clients.first().map(RoomClient::id) {
            self.give_client_turn(first, now);
        }
        info!("room {}: battle started", self.id);
    }

    /// Whether the current turn's deadline has passed. Untimed rooms are never
    /// late. A positive check marks the room as timed out.
    pub fn is_turn_late(&mut self, now: SystemTime) -> bool {
        if self.time_per_turn.is_none() || !self.has_battle_started {
            return false;
        }
        let late = self.turn_end_time.is_some_and(|end| now > end);
        if late {
            self.is_timeout = true;
        }
        late
    }

    /// End the battle; whoever holds the turn forfeits.
    pub fn end_battle_due_to_timeout(&mut self) {
        if self.has_battle_ended {
            return;
        }
        self.has_battle_ended = true;
        self.loser = self.clients.iter().find(|c| c.is_turn).map(RoomClient::id);
        info!("room {}: battle ended by timeout, loser {:?}", self.id, self.loser);
    }

    /// End the battle once a participant has no ship left afloat.
    pub fn check_has_battle_ended(&mut self) -> bool {
        if !self.has_battle_ended {
            if let Some(loser) = self.clients.iter().find(|c| c.are_all_ships_sunk()) {
                self.has_battle_ended = true;
                self.loser = Some(loser.id);
                info!("room {}: fleet of {} destroyed", self.id, loser.id);
            }
        }
        self.has_battle_ended
    }

    pub fn is_client_winner(&self, client: ClientId) -> bool {
        self.has_battle_ended && self.loser != Some(client)
    }

    pub fn outcome_for(&self, client: ClientId) -> BattleOutcome {
        BattleOutcome {
            has_battle_ended: self.has_battle_ended,
            is_winner: self.is_client_winner(client),
            is_timeout: self.is_timeout,
        }
    }

    pub fn readiness_for(&self, client: ClientId) -> Readiness {
        Readiness {
            is_turn: self.is_client_turn(client),
            turn_end_time: self.turn_end_time.map(epoch_seconds).unwrap_or(0.0),
        }
    }

    /// The opponent's full board, for the post-game reveal.
    pub fn enemy_board_document(&self, client: ClientId) -> Result<BoardDocument, RoomError> {
        let opponent = self.opponent(client).ok_or(RoomError::NoOpponent)?;
        let board = opponent.board.as_ref().ok_or(RoomError::MissingBoard)?;
        Ok(board.to_document())
    }
}
