//! Client side of the command protocol.

use log::{debug, warn};

use crate::board::{Board, BoardDocument, EnemyView};
use crate::protocol::{Request, Response};
use crate::room::{BattleOutcome, Readiness, ReceivedShot, RoomId, ShotReport};
use crate::ship::Ship;
use crate::transport::Transport;

/// A player talking to a [`GameServer`](crate::GameServer) over some transport.
///
/// Keeps its own board, what it has learned about the opponent's board, and
/// the turn and battle state reported by the server.
pub struct GameClient<T: Transport> {
    name: String,
    transport: T,
    board: Board,
    enemy_view: EnemyView,
    room_id: Option<RoomId>,
    has_sent_board: bool,
    is_turn: bool,
    turn_end_time: Option<f64>,
    has_battle_ended: bool,
    is_winner: bool,
    is_timeout: bool,
}

impl<T: Transport> GameClient<T> {
    pub fn new(name: impl Into<String>, transport: T) -> Self {
        let board = Board::new();
        let enemy_view = EnemyView::new(board.rows(), board.columns());
        Self {
            name: name.into(),
            transport,
            board,
            enemy_view,
            room_id: None,
            has_sent_board: false,
            is_turn: false,
            turn_end_time: None,
            has_battle_ended: false,
            is_winner: false,
            is_timeout: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut Board {
        &mut self.board
    }

    pub fn enemy_view(&self) -> &EnemyView {
        &self.enemy_view
    }

    pub fn room_id(&self) -> Option<&RoomId> {
        self.room_id.as_ref()
    }

    pub fn has_sent_board(&self) -> bool {
        self.has_sent_board
    }

    pub fn is_turn(&self) -> bool {
        self.is_turn
    }

    /// Deadline of the current turn in seconds since the UNIX epoch.
    pub fn turn_end_time(&self) -> Option<f64> {
        self.turn_end_time
    }

    pub fn has_battle_ended(&self) -> bool {
        self.has_battle_ended
    }

    pub fn is_winner(&self) -> bool {
        self.is_winner
    }

    pub fn is_timeout(&self) -> bool {
        self.is_timeout
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Consume the greeting a TCP server sends on accept.
    pub async fn await_greeting(&mut self) -> anyhow::Result<()> {
        let frame = self.transport.recv().await?;
        let greeting = Response::from_frame(&frame)?;
        if !greeting.is_success() {
            return Err(anyhow::anyhow!("Unexpected greeting: {}", greeting.message));
        }
        Ok(())
    }

    /// Send a request and wait for its response.
    pub async fn send_command(&mut self, request: &Request) -> anyhow::Result<Response> {
        self.transport.send(&request.to_frame()).await?;
        let frame = self.transport.recv().await?;
        let response = Response::from_frame(&frame)?;
        debug!(
            "{} <- {}: {}",
            self.name,
            request.command(),
            response.message
        );
        Ok(response)
    }

    fn remember_room(&mut self, response: &Response) {
        if response.is_success() {
            self.room_id = response.str_arg("room_id").map(RoomId::new);
        }
    }

    pub async fn create_room(&mut self) -> anyhow::Result<Response> {
        let request = Request::CreateRoom {
            client_name: self.name.clone(),
        };
        let response = self.send_command(&request).await?;
        self.remember_room(&response);
        Ok(response)
    }

    pub async fn join_room_with_id(&mut self, room_id: &RoomId) -> anyhow::Result<Response> {
        let request = Request::JoinRoomWithId {
            room_id: room_id.clone(),
            client_name: self.name.clone(),
        };
        let response = self.send_command(&request).await?;
        self.remember_room(&response);
        Ok(response)
    }

    pub async fn join_random_room(&mut self) -> anyhow::Result<Response> {
        let request = Request::JoinRandomRoom {
            client_name: self.name.clone(),
        };
        let response = self.send_command(&request).await?;
        self.remember_room(&response);
        Ok(response)
    }

    pub async fn send_board(&mut self) -> anyhow::Result<Response> {
        let request = Request::send_board(&self.board.to_document());
        let response = self.send_command(&request).await?;
        self.has_sent_board = response.is_success();
        Ok(response)
    }

    /// Fetch the opponent's board after the battle and reveal its ships.
    pub async fn request_enemy_board(&mut self) -> anyhow::Result<Response> {
        let response = self.send_command(&Request::RequestEnemyBoard).await?;
        if response.is_success() {
            if let Some(data) = response.arg("enemy_board_data") {
                let doc = BoardDocument::from_value(data)?;
                self.enemy_view.reveal_ships_from_document(&doc);
            }
        }
        Ok(response)
    }

    pub async fn exit_room(&mut self) -> anyhow::Result<Response> {
        let response = self.send_command(&Request::ExitRoom).await?;
        if response.is_success() {
            self.room_id = None;
        }
        Ok(response)
    }

    pub async fn change_room_publicity(&mut self) -> anyhow::Result<Response> {
        self.send_command(&Request::ChangeRoomPublicity).await
    }

    pub async fn has_opponent_joined(&mut self) -> anyhow::Result<Response> {
        self.send_command(&Request::HasOpponentJoined).await
    }

    pub async fn is_opponent_ready(&mut self) -> anyhow::Result<Response> {
        let response = self.send_command(&Request::IsOpponentReady).await?;
        if response.is_success() {
            let readiness: Readiness = response.args_as()?;
            self.is_turn = readiness.is_turn;
            self.turn_end_time = Some(readiness.turn_end_time);
        }
        Ok(response)
    }

    /// Fire at the opponent and update the enemy view from the result.
    pub async fn shot(&mut self, row: usize, col: usize) -> anyhow::Result<Response> {
        let request = Request::RegisterShot {
            row: i64::try_from(row)?,
            col: i64::try_from(col)?,
        };
        let response = self.send_command(&request).await?;
        if !response.is_success() {
            if response.arg("has_battle_ended").is_some() {
                self.apply_outcome(&response.args_as()?);
            } else if response.bool_arg("is_player_turn") == Some(false) {
                self.is_turn = false;
            }
            return Ok(response);
        }

        let report: ShotReport = response.args_as()?;
        self.enemy_view
            .register_shot_on_view(row, col, report.has_hit_ship);
        if let Some(doc) = report.sunk_ship.as_ref().filter(|_| report.has_sunk_ship) {
            let ship = Ship::try_from(doc)?;
            if !self.enemy_view.reveal_ship(ship, true) {
                warn!("{}: sunk ship at ({}, {}) clashes with the enemy view", self.name, doc.row, doc.col);
            }
        }
        self.is_turn = report.is_turn;
        self.turn_end_time = Some(report.turn_end_time);
        self.apply_outcome(&BattleOutcome {
            has_battle_ended: report.has_battle_ended,
            is_winner: report.is_winner,
            is_timeout: report.is_timeout,
        });
        Ok(response)
    }

    /// Poll for the next shot the opponent made and apply it to the own board.
    pub async fn ask_to_receive_shot(&mut self) -> anyhow::Result<Response> {
        let response = self.send_command(&Request::AskToReceiveShot).await?;
        if !response.is_success() {
            if response.arg("has_battle_ended").is_some() {
                self.apply_outcome(&response.args_as()?);
            }
            return Ok(response);
        }

        let shot: ReceivedShot = response.args_as()?;
        if let Err(e) = self.board.register_shot(shot.row, shot.col) {
            warn!("{}: cannot mirror opponent shot: {e}", self.name);
        }
        self.is_turn = shot.is_turn;
        self.turn_end_time = Some(shot.turn_end_time);
        self.apply_outcome(&BattleOutcome {
            has_battle_ended: shot.has_battle_ended,
            is_winner: shot.is_winner,
            is_timeout: shot.is_timeout,
        });
        Ok(response)
    }

    fn apply_outcome(&mut self, outcome: &BattleOutcome) {
        self.has_battle_ended = outcome.has_battle_ended;
        self.is_winner = outcome.is_winner;
        self.is_timeout = outcome.is_timeout;
        if outcome.has_battle_ended {
            self.is_turn = false;
        }
    }
}
