//! JSON command protocol: request parsing, response envelopes and the
//! client-visible error taxonomy.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::board::BoardDocument;
use crate::room::{BattleOutcome, RoomId};

pub const COMMAND_CREATE_ROOM: &str = "create_room";
pub const COMMAND_JOIN_ROOM_WITH_ID: &str = "join_room_with_id";
pub const COMMAND_JOIN_RANDOM_ROOM: &str = "join_random_room";
pub const COMMAND_SEND_BOARD: &str = "send_board";
pub const COMMAND_EXIT_ROOM: &str = "exit_room";
pub const COMMAND_HAS_OPPONENT_JOINED: &str = "has_opponent_joined";
pub const COMMAND_IS_OPPONENT_READY: &str = "is_opponent_ready";
pub const COMMAND_REGISTER_SHOT: &str = "register_shot";
pub const COMMAND_ASK_TO_RECEIVE_SHOT: &str = "ask_to_receive_shot";
pub const COMMAND_CHANGE_ROOM_PUBLICITY: &str = "change_room_publicity";
pub const COMMAND_REQUEST_ENEMY_BOARD: &str = "request_enemy_board";

/// Every command with the argument keys it requires.
const COMMANDS: &[(&str, &[&str])] = &[
    (COMMAND_CREATE_ROOM, &["client_name"]),
    (COMMAND_JOIN_ROOM_WITH_ID, &["room_id", "client_name"]),
    (COMMAND_JOIN_RANDOM_ROOM, &["client_name"]),
    (COMMAND_SEND_BOARD, &["board_json"]),
    (COMMAND_EXIT_ROOM, &[]),
    (COMMAND_HAS_OPPONENT_JOINED, &[]),
    (COMMAND_IS_OPPONENT_READY, &[]),
    (COMMAND_REGISTER_SHOT, &["row", "col"]),
    (COMMAND_ASK_TO_RECEIVE_SHOT, &[]),
    (COMMAND_CHANGE_ROOM_PUBLICITY, &[]),
    (COMMAND_REQUEST_ENEMY_BOARD, &[]),
];

/// A validated client command.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    CreateRoom { client_name: String },
    JoinRoomWithId { room_id: RoomId, client_name: String },
    JoinRandomRoom { client_name: String },
    /// The board is kept raw; it is validated when installed.
    SendBoard { board_json: Value },
    ExitRoom,
    HasOpponentJoined,
    IsOpponentReady,
    /// Coordinates stay signed so that negative values surface as an invalid shot.
    RegisterShot { row: i64, col: i64 },
    AskToReceiveShot,
    ChangeRoomPublicity,
    RequestEnemyBoard,
}

impl Request {
    /// Parse one frame. Checks run in order: JSON syntax, `command` present,
    /// command known, required args present, arg types.
    pub fn parse(frame: &str) -> Result<Self, ServerError> {
        let value: Value = serde_json::from_str(frame).map_err(|_| ServerError::InvalidJson)?;
        let Value::Object(mut envelope) = value else {
            return Err(ServerError::MissingCommand);
        };
        let command = match envelope.remove("command") {
            Some(Value::String(command)) => command,
            Some(Value::Null) | None => return Err(ServerError::MissingCommand),
            Some(_) => return Err(ServerError::UnknownCommand),
        };
        let required = COMMANDS
            .iter()
            .find(|(name, _)| *name == command)
            .map(|(_, required)| *required)
            .ok_or(ServerError::UnknownCommand)?;

        let args = match envelope.remove("args") {
            Some(Value::Object(args)) => args,
            Some(Value::Null) | None => Map::new(),
            Some(_) => {
                return Err(ServerError::InvalidArguments(
                    "args must be an object".into(),
                ))
            }
        };
        let missing: Vec<String> = required
            .iter()
            .filter(|key| !args.contains_key(**key))
            .map(|key| key.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ServerError::MissingArguments(missing));
        }

        let request = match command.as_str() {
            COMMAND_CREATE_ROOM => Request::CreateRoom {
                client_name: string_arg(&args, "client_name")?,
            },
            COMMAND_JOIN_ROOM_WITH_ID => Request::JoinRoomWithId {
                room_id: room_id_arg(&args)?,
                client_name: string_arg(&args, "client_name")?,
            },
            COMMAND_JOIN_RANDOM_ROOM => Request::JoinRandomRoom {
                client_name: string_arg(&args, "client_name")?,
            },
            COMMAND_SEND_BOARD => Request::SendBoard {
                board_json: args.get("board_json").cloned().unwrap_or(Value::Null),
            },
            COMMAND_EXIT_ROOM => Request::ExitRoom,
            COMMAND_HAS_OPPONENT_JOINED => Request::HasOpponentJoined,
            COMMAND_IS_OPPONENT_READY => Request::IsOpponentReady,
            COMMAND_REGISTER_SHOT => Request::RegisterShot {
                row: int_arg(&args, "row")?,
                col: int_arg(&args, "col")?,
            },
            COMMAND_ASK_TO_RECEIVE_SHOT => Request::AskToReceiveShot,
            COMMAND_CHANGE_ROOM_PUBLICITY => Request::ChangeRoomPublicity,
            COMMAND_REQUEST_ENEMY_BOARD => Request::RequestEnemyBoard,
            _ => return Err(ServerError::UnknownCommand),
        };
        Ok(request)
    }

    pub fn command(&self) -> &'static str {
        match self {
            Request::CreateRoom { .. } => COMMAND_CREATE_ROOM,
            Request::JoinRoomWithId { .. } => COMMAND_JOIN_ROOM_WITH_ID,
            Request::JoinRandomRoom { .. } => COMMAND_JOIN_RANDOM_ROOM,
            Request::SendBoard { .. } => COMMAND_SEND_BOARD,
            Request::ExitRoom => COMMAND_EXIT_ROOM,
            Request::HasOpponentJoined => COMMAND_HAS_OPPONENT_JOINED,
            Request::IsOpponentReady => COMMAND_IS_OPPONENT_READY,
            Request::RegisterShot { .. } => COMMAND_REGISTER_SHOT,
            Request::AskToReceiveShot => COMMAND_ASK_TO_RECEIVE_SHOT,
            Request::ChangeRoomPublicity => COMMAND_CHANGE_ROOM_PUBLICITY,
            Request::RequestEnemyBoard => COMMAND_REQUEST_ENEMY_BOARD,
        }
    }

    /// Build a `send_board` request carrying the board as a JSON-encoded string.
    pub fn send_board(doc: &BoardDocument) -> Self {
        Request::SendBoard {
            board_json: Value::String(doc.to_json()),
        }
    }

    /// Encode as a single-line JSON frame (without the trailing newline).
    pub fn to_frame(&self) -> String {
        let args = match self {
            Request::CreateRoom { client_name } | Request::JoinRandomRoom { client_name } => {
                json!({ "client_name": client_name })
            }
            Request::JoinRoomWithId {
                room_id,
                client_name,
            } => json!({ "room_id": room_id, "client_name": client_name }),
            Request::SendBoard { board_json } => json!({ "board_json": board_json }),
            Request::RegisterShot { row, col } => json!({ "row": row, "col": col }),
            _ => json!({}),
        };
        json!({ "command": self.command(), "args": args }).to_string()
    }
}

fn string_arg(args: &Map<String, Value>, key: &str) -> Result<String, ServerError> {
    match args.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        _ => Err(ServerError::InvalidArguments(format!("{key} must be a string"))),
    }
}

fn int_arg(args: &Map<String, Value>, key: &str) -> Result<i64, ServerError> {
    args.get(key)
        .and_then(Value::as_i64)
        .ok_or_else(|| ServerError::InvalidArguments(format!("{key} must be an integer")))
}

fn room_id_arg(args: &Map<String, Value>) -> Result<RoomId, ServerError> {
    match args.get("room_id") {
        Some(Value::String(id)) => Ok(RoomId::new(id.trim())),
        Some(Value::Number(n)) if n.is_u64() => Ok(RoomId::new(n.to_string())),
        _ => Err(ServerError::InvalidArguments(
            "room_id must be a string or a non-negative integer".into(),
        )),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Success,
    Error,
}

/// Response envelope: `{"status", "message", "args"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status: Status,
    pub message: String,
    #[serde(default)]
    pub args: Map<String, Value>,
}

impl Response {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: Status::Success,
            message: message.into(),
            args: Map::new(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            message: message.into(),
            args: Map::new(),
        }
    }

    /// Greeting sent once when a connection is accepted.
    pub fn greeting() -> Self {
        Self::success("Connected")
    }

    pub fn with_arg(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.args.insert(key.to_string(), value.into());
        self
    }

    /// Merge the fields of a serializable struct into `args`.
    pub fn with_args<S: Serialize>(mut self, args: &S) -> Self {
        if let Ok(Value::Object(map)) = serde_json::to_value(args) {
            self.args.extend(map);
        }
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    pub fn arg(&self, key: &str) -> Option<&Value> {
        self.args.get(key)
    }

    pub fn bool_arg(&self, key: &str) -> Option<bool> {
        self.arg(key).and_then(Value::as_bool)
    }

    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.arg(key).and_then(Value::as_str)
    }

    /// Deserialize `args` into a typed payload.
    pub fn args_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.args.clone()))
    }

    pub fn to_frame(&self) -> String {
        // Keys are strings and values are already JSON.
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"status":"error","message":"Server error!","args":{}}"#.to_string()
        })
    }

    pub fn from_frame(frame: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(frame)
    }
}

/// A rejected command. Each variant renders the message sent to the client
/// and may carry structured flags in `args`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServerError {
    #[error("Client is already in a room!")]
    AlreadyInRoom,
    #[error("Client is not in a room!")]
    NotInRoom,
    #[error("Room ID not found!")]
    RoomNotFound,
    #[error("Room is full or player is already in the room!")]
    RoomFull,
    #[error("No available rooms to join!")]
    NoAvailableRooms,
    #[error("Opponent has not joined the room!")]
    OpponentNotJoined,
    #[error("Invalid board!")]
    InvalidBoard,
    #[error("No opponent found!")]
    NoOpponent,
    #[error("Opponent has no board yet!")]
    OpponentHasNoBoard,
    #[error("Client has no board yet!")]
    ClientHasNoBoard,
    #[error("Not player's turn!")]
    NotPlayersTurn,
    #[error("Invalid shot!")]
    InvalidShot,
    #[error("The battle has ended!")]
    BattleEnded(BattleOutcome),
    #[error("Client has not made a shot yet!")]
    NoShotYet,
    #[error("Battle is still going!")]
    BattleStillGoing,
    #[error("Missing command")]
    MissingCommand,
    #[error("Unknown command")]
    UnknownCommand,
    #[error("Missing arguments: {}", .0.join(", "))]
    MissingArguments(Vec<String>),
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("Invalid JSON format")]
    InvalidJson,
    #[error("Server error!")]
    Internal,
}

impl ServerError {
    /// Structured flags that let a client tell failures apart without
    /// matching on the message.
    pub fn args(&self) -> Map<String, Value> {
        let mut args = Map::new();
        match self {
            ServerError::NotPlayersTurn => {
                args.insert("is_player_turn".into(), Value::Bool(false));
            }
            ServerError::InvalidShot => {
                args.insert("is_shot_valid".into(), Value::Bool(false));
            }
            ServerError::BattleEnded(outcome) => {
                if let Ok(Value::Object(map)) = serde_json::to_value(outcome) {
                    args = map;
                }
            }
            _ => {}
        }
        args
    }

    pub fn into_response(self) -> Response {
        let args = self.args();
        Response {
            status: Status::Error,
            message: self.to_string(),
            args,
        }
    }
}

impl From<ServerError> for Response {
    fn from(err: ServerError) -> Self {
        err.into_response()
    }
}
