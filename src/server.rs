//! Room directory and command surface shared by every connection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use log::{debug, info, warn};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::board::BoardDocument;
use crate::clock::{Clock, SystemClock};
use crate::config::{ServerConfig, BOARD_COLUMNS, BOARD_ROWS, ROOM_ID_RANGE, STANDARD_FLEET};
use crate::protocol::{Request, Response, ServerError};
use crate::room::{ClientId, Readiness, ReceivedShot, Room, RoomError, RoomId, ShotReport};

type SharedRoom = Arc<Mutex<Room>>;

fn lock(room: &SharedRoom) -> MutexGuard<'_, Room> {
    room.lock().unwrap_or_else(|e| e.into_inner())
}

/// Owns every open room and maps clients to the room they are in.
///
/// The directory maps sit behind `RwLock`s and each room behind its own
/// `Mutex`. A directory lock is never held while a room is locked.
pub struct GameServer {
    config: ServerConfig,
    rooms: RwLock<HashMap<RoomId, SharedRoom>>,
    clients_to_rooms: RwLock<HashMap<ClientId, RoomId>>,
    next_client: AtomicU64,
    rng: Mutex<SmallRng>,
    clock: Arc<dyn Clock>,
}

impl GameServer {
    pub fn new(config: ServerConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: ServerConfig, clock: Arc<dyn Clock>) -> Self {
        let rng = match config.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_rng(&mut rand::rng()),
        };
        Self {
            config,
            rooms: RwLock::new(HashMap::new()),
            clients_to_rooms: RwLock::new(HashMap::new()),
            next_client: AtomicU64::new(1),
            rng: Mutex::new(rng),
            clock,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Hand out a fresh opaque client handle.
    pub fn register_client(&self) -> ClientId {
        ClientId(self.next_client.fetch_add(1, Ordering::Relaxed))
    }

    pub fn room_count(&self) -> usize {
        self.rooms.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn does_room_exist(&self, room_id: &RoomId) -> bool {
        self.rooms
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(room_id)
    }

    pub fn is_client_in_room(&self, client: ClientId) -> bool {
        self.room_of(client).is_some()
    }

    /// Snapshot of a room, mostly for inspection in tests.
    pub fn room_snapshot(&self, room_id: &RoomId) -> Option<Room> {
        let room = self.find_room(room_id)?;
        let snapshot = lock(&room).clone();
        Some(snapshot)
    }

    fn find_room(&self, room_id: &RoomId) -> Option<SharedRoom> {
        self.rooms
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(room_id)
            .cloned()
    }

    /// The client's room. A mapping left behind by a deleted room is dropped.
    fn room_of(&self, client: ClientId) -> Option<(RoomId, SharedRoom)> {
        let room_id = self
            .clients_to_rooms
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&client)
            .cloned()?;
        match self.find_room(&room_id) {
            Some(room) => Some((room_id, room)),
            None => {
                self.clients_to_rooms
                    .write()
                    .unwrap_or_else(|e| e.into_inner())
                    .remove(&client);
                None
            }
        }
    }

    fn require_room(&self, client: ClientId) -> Result<(RoomId, SharedRoom), ServerError> {
        self.room_of(client).ok_or(ServerError::NotInRoom)
    }

    fn generate_unique_room_id(&self, rooms: &HashMap<RoomId, SharedRoom>) -> RoomId {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            let id = RoomId::new(rng.random_range(ROOM_ID_RANGE).to_string());
            if !rooms.contains_key(&id) {
                return id;
            }
        }
    }

    fn bind_client(&self, client: ClientId, room_id: RoomId) {
        self.clients_to_rooms
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(client, room_id);
    }

    pub fn create_room(&self, client: ClientId, client_name: &str) -> Result<RoomId, ServerError> {
        if self.is_client_in_room(client) {
            return Err(ServerError::AlreadyInRoom);
        }
        let room_id = {
            let mut rooms = self.rooms.write().unwrap_or_else(|e| e.into_inner());
            let room_id = self.generate_unique_room_id(&rooms);
            let room = Room::new(
                room_id.clone(),
                client,
                client_name,
                self.config.time_per_turn,
            );
            rooms.insert(room_id.clone(), Arc::new(Mutex::new(room)));
            room_id
        };
        self.bind_client(client, room_id.clone());
        info!("{client} ({client_name}) created room {room_id}");
        Ok(room_id)
    }

    /// Join a room by id; returns the opponent's name.
    pub fn join_room_with_id(
        &self,
        client: ClientId,
        room_id: &RoomId,
        client_name: &str,
    ) -> Result<String, ServerError> {
        if self.is_client_in_room(client) {
            return Err(ServerError::AlreadyInRoom);
        }
        let room = self.find_room(room_id).ok_or(ServerError::RoomNotFound)?;
        let opponent_name = {
            let mut room = lock(&room);
            if !room.add_player(client, client_name) {
                return Err(ServerError::RoomFull);
            }
            opponent_name(&room, client)
        };
        self.bind_client(client, room_id.clone());
        info!("{client} ({client_name}) joined room {room_id}");
        Ok(opponent_name)
    }

    /// Join the first public room with a free seat; returns its id and the
    /// opponent's name.
    pub fn join_random_room(
        &self,
        client: ClientId,
        client_name: &str,
    ) -> Result<(RoomId, String), ServerError> {
        if self.is_client_in_room(client) {
            return Err(ServerError::AlreadyInRoom);
        }
        let mut candidates: Vec<(RoomId, SharedRoom)> = self
            .rooms
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(id, room)| (id.clone(), Arc::clone(room)))
            .collect();
        candidates.sort_by(|a, b| a.0.cmp(&b.0));

        for (room_id, room) in candidates {
            let joined = {
                let mut room = lock(&room);
                if room.is_private() || !room.add_player(client, client_name) {
                    None
                } else {
                    Some(opponent_name(&room, client))
                }
            };
            if let Some(opponent_name) = joined {
                // The room may have been deleted while we were joining it.
                if !self.does_room_exist(&room_id) {
                    continue;
                }
                self.bind_client(client, room_id.clone());
                info!("{client} ({client_name}) joined random room {room_id}");
                return Ok((room_id, opponent_name));
            }
        }
        Err(ServerError::NoAvailableRooms)
    }

    /// Toggle privacy; returns the new `is_private`.
    pub fn change_room_publicity(&self, client: ClientId) -> Result<(RoomId, bool), ServerError> {
        let (room_id, room) = self.require_room(client)?;
        let is_private = lock(&room).change_publicity();
        Ok((room_id, is_private))
    }

    /// Delete the client's room. The opponent is removed from it as well.
    pub fn exit_room(&self, client: ClientId) -> Result<RoomId, ServerError> {
        let (room_id, room) = self.require_room(client)?;
        let members = lock(&room).client_ids();
        self.rooms
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&room_id);
        {
            let mut clients = self
                .clients_to_rooms
                .write()
                .unwrap_or_else(|e| e.into_inner());
            clients.remove(&client);
            for member in members {
                if clients.get(&member) == Some(&room_id) {
                    clients.remove(&member);
                }
            }
        }
        info!("{client} exited room {room_id}, room deleted");
        Ok(room_id)
    }

    /// Leave the client's room, if any, when its connection goes away.
    pub fn disconnect(&self, client: ClientId) {
        if let Ok(room_id) = self.exit_room(client) {
            info!("{client} disconnected, closed room {room_id}");
        }
    }

    /// Returns the opponent's name once the room is full.
    pub fn has_opponent_joined(&self, client: ClientId) -> Result<String, ServerError> {
        let (_, room) = self.require_room(client)?;
        let room = lock(&room);
        if !room.is_full() {
            return Err(ServerError::OpponentNotJoined);
        }
        Ok(opponent_name(&room, client))
    }

    pub fn receive_board(&self, client: ClientId, doc: &BoardDocument) -> Result<(), ServerError> {
        let (room_id, room) = self.require_room(client)?;
        if self.config.strict_fleet && !is_standard_document(doc) {
            warn!("room {room_id}: {client} sent a non-standard fleet");
            return Err(ServerError::InvalidBoard);
        }
        let mut room = lock(&room);
        room.add_board_for_client(client, doc).map_err(|err| {
            warn!("room {room_id}: rejected board from {client}: {err}");
            ServerError::InvalidBoard
        })
    }

    /// Start the battle once both sides have a board.
    pub fn is_opponent_ready(&self, client: ClientId) -> Result<Readiness, ServerError> {
        let (_, room) = self.require_room(client)?;
        let mut room = lock(&room);
        let opponent = room.opponent(client).ok_or(ServerError::NoOpponent)?;
        if !opponent.has_board() {
            return Err(ServerError::OpponentHasNoBoard);
        }
        if !room.does_client_have_board(client) {
            return Err(ServerError::ClientHasNoBoard);
        }
        room.start_battle(self.clock.now());
        Ok(room.readiness_for(client))
    }

    pub fn register_shot(
        &self,
        client: ClientId,
        row: i64,
        col: i64,
    ) -> Result<ShotReport, ServerError> {
        let (room_id, room) = self.require_room(client)?;
        let now = self.clock.now();
        let mut room = lock(&room);

        if room.has_battle_ended() {
            return Err(ServerError::BattleEnded(room.outcome_for(client)));
        }
        if !room.is_client_turn(client) {
            return Err(ServerError::NotPlayersTurn);
        }
        if room.is_turn_late(now) {
            room.end_battle_due_to_timeout();
            warn!("room {room_id}: {client} ran out of time");
            return Err(ServerError::BattleEnded(room.outcome_for(client)));
        }
        let (Ok(row), Ok(col)) = (usize::try_from(row), usize::try_from(col)) else {
            return Err(ServerError::InvalidShot);
        };
        if !room.is_client_shot_valid(client, row, col) {
            return Err(ServerError::InvalidShot);
        }

        room.register_shot_for_client(client, row, col, now)
            .map_err(|err| match err {
                RoomError::NoOpponent => ServerError::NoOpponent,
                RoomError::MissingBoard => ServerError::OpponentHasNoBoard,
                RoomError::Board(_) => ServerError::InvalidShot,
                RoomError::NotAMember | RoomError::BattleAlreadyStarted => ServerError::Internal,
            })
    }

    /// Pop the oldest shot the opponent made against this client.
    pub fn ask_to_receive_shot(&self, client: ClientId) -> Result<ReceivedShot, ServerError> {
        let (room_id, room) = self.require_room(client)?;
        let now = self.clock.now();
        let mut room = lock(&room);

        if room.is_timeout() {
            return Err(ServerError::BattleEnded(room.outcome_for(client)));
        }
        if !room.has_battle_ended() && room.is_turn_late(now) {
            room.end_battle_due_to_timeout();
            warn!("room {room_id}: turn expired, detected by {client}");
            return Err(ServerError::BattleEnded(room.outcome_for(client)));
        }
        room.pop_shot_history(client).ok_or(ServerError::NoShotYet)
    }

    /// The opponent's board, once the battle is over.
    pub fn send_enemy_board(&self, client: ClientId) -> Result<BoardDocument, ServerError> {
        let (_, room) = self.require_room(client)?;
        let room = lock(&room);
        if !room.has_battle_ended() {
            return Err(ServerError::BattleStillGoing);
        }
        room.enemy_board_document(client).map_err(|err| match err {
            RoomError::NoOpponent => ServerError::NoOpponent,
            _ => ServerError::OpponentHasNoBoard,
        })
    }

    /// Parse and execute one frame, always producing a response.
    pub fn handle_command(&self, client: ClientId, frame: &str) -> Response {
        let request = match Request::parse(frame) {
            Ok(request) => request,
            Err(err) => {
                warn!("{client}: rejected frame: {err}");
                return err.into_response();
            }
        };
        debug!("{client}: {}", request.command());
        self.dispatch(client, request)
            .unwrap_or_else(ServerError::into_response)
    }

    /// Execute a parsed request.
    pub fn dispatch(&self, client: ClientId, request: Request) -> Result<Response, ServerError> {
        let response = match request {
            Request::CreateRoom { client_name } => {
                let room_id = self.create_room(client, &client_name)?;
                Response::success(format!("Room {room_id} created!"))
                    .with_arg("room_id", room_id.as_str())
            }
            Request::JoinRoomWithId {
                room_id,
                client_name,
            } => {
                let opponent_name = self.join_room_with_id(client, &room_id, &client_name)?;
                Response::success(format!("Joined room {room_id}!"))
                    .with_arg("room_id", room_id.as_str())
                    .with_arg("opponent_name", opponent_name)
            }
            Request::JoinRandomRoom { client_name } => {
                let (room_id, opponent_name) = self.join_random_room(client, &client_name)?;
                Response::success(format!("Joined room {room_id}!"))
                    .with_arg("room_id", room_id.as_str())
                    .with_arg("opponent_name", opponent_name)
            }
            Request::ChangeRoomPublicity => {
                let (room_id, is_private) = self.change_room_publicity(client)?;
                Response::success(format!("Room {room_id} publicity changed!"))
                    .with_arg("is_private", is_private)
            }
            Request::ExitRoom => {
                let room_id = self.exit_room(client)?;
                Response::success(format!("Client exited from room {room_id}!"))
            }
            Request::HasOpponentJoined => {
                let opponent_name = self.has_opponent_joined(client)?;
                Response::success(format!("Opponent {opponent_name} has joined the room!"))
                    .with_arg("opponent_name", opponent_name)
            }
            Request::SendBoard { board_json } => {
                self.require_room(client)?;
                let doc = BoardDocument::from_value(&board_json).map_err(|err| {
                    warn!("{client}: unreadable board: {err}");
                    ServerError::InvalidBoard
                })?;
                self.receive_board(client, &doc)?;
                Response::success("Board added successfully!")
            }
            Request::IsOpponentReady => {
                let readiness = self.is_opponent_ready(client)?;
                Response::success("Starting game!").with_args(&readiness)
            }
            Request::RegisterShot { row, col } => {
                let report = self.register_shot(client, row, col)?;
                Response::success("Shot registered!").with_args(&report)
            }
            Request::AskToReceiveShot => {
                let shot = self.ask_to_receive_shot(client)?;
                Response::success("Shot was made by the opponent!").with_args(&shot)
            }
            Request::RequestEnemyBoard => {
                let doc = self.send_enemy_board(client)?;
                let data = serde_json::to_value(&doc).map_err(|_| ServerError::Internal)?;
                Response::success("Return the enemy board!").with_arg("enemy_board_data", data)
            }
        };
        Ok(response)
    }
}

impl Default for GameServer {
    fn default() -> Self {
        Self::new(ServerConfig::default())
    }
}

fn opponent_name(room: &Room, client: ClientId) -> String {
    room.opponent(client)
        .map(|opponent| opponent.name().to_string())
        .unwrap_or_default()
}

fn is_standard_document(doc: &BoardDocument) -> bool {
    let mut lengths: Vec<usize> = doc.ships.iter().map(|s| s.ship_length).collect();
    lengths.sort_unstable();
    let mut expected = STANDARD_FLEET.to_vec();
    expected.sort_unstable();
    doc.rows_count == BOARD_ROWS && doc.columns_count == BOARD_COLUMNS && lengths == expected
}
