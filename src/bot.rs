//! Automated players: target selection strategies and the bot that drives a
//! [`GameClient`] through a game.

use std::time::Duration;

use log::{debug, info};
use rand::rngs::SmallRng;
use rand::Rng;

use crate::board::EnemyView;
use crate::client::GameClient;
use crate::common::Coordinate;
use crate::protocol::ServerError;
use crate::transport::Transport;

/// Interface implemented by the different shot selection strategies.
pub trait Targeting: Send {
    /// Choose the next cell to fire at, or `None` once every cell is shot.
    fn select_target(&mut self, rng: &mut SmallRng, view: &EnemyView) -> Option<Coordinate>;

    /// Inform the strategy of the result of its last shot.
    fn handle_shot_result(&mut self, _coord: Coordinate, _is_hit: bool, _is_sunk: bool) {}
}

/// Uniformly random among the cells not shot yet.
fn random_unshot(rng: &mut SmallRng, view: &EnemyView) -> Option<Coordinate> {
    let board = view.board();
    let open: Vec<Coordinate> = (0..board.rows())
        .flat_map(|row| (0..board.columns()).map(move |col| (row, col)))
        .filter(|&(row, col)| !view.is_coordinate_shot_at(row, col))
        .collect();
    if open.is_empty() {
        return None;
    }
    Some(open[rng.random_range(0..open.len())])
}

/// Fires at random cells.
#[derive(Debug, Default)]
pub struct RandomTargeting;

impl Targeting for RandomTargeting {
    fn select_target(&mut self, rng: &mut SmallRng, view: &EnemyView) -> Option<Coordinate> {
        random_unshot(rng, view)
    }
}

/// Random search until a hit, then tries the neighbours of the hit. After a
/// second hit it follows the line the two hits define. A sink resets it.
#[derive(Debug, Default)]
pub struct HuntTargeting {
    hit_stack: Vec<Coordinate>,
    last_hit: Option<Coordinate>,
}

impl HuntTargeting {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_hunting(&self) -> bool {
        !self.hit_stack.is_empty()
    }

    fn reset(&mut self) {
        self.hit_stack.clear();
        self.last_hit = None;
    }

    fn push_neighbours(&mut self, (row, col): Coordinate, horizontal: Option<bool>) {
        let vertical = [(row.checked_sub(1), Some(col)), (row.checked_add(1), Some(col))];
        let horizontal_cells = [(Some(row), col.checked_sub(1)), (Some(row), col.checked_add(1))];
        let candidates: Vec<(Option<usize>, Option<usize>)> = match horizontal {
            Some(true) => horizontal_cells.to_vec(),
            Some(false) => vertical.to_vec(),
            None => vertical.into_iter().chain(horizontal_cells).collect(),
        };
        self.hit_stack.extend(
            candidates
                .into_iter()
                .filter_map(|(r, c)| Some((r?, c?))),
        );
    }
}

impl Targeting for HuntTargeting {
    fn select_target(&mut self, rng: &mut SmallRng, view: &EnemyView) -> Option<Coordinate> {
        while let Some((row, col)) = self.hit_stack.pop() {
            if view.is_coordinate_in_board(row, col) && !view.is_coordinate_shot_at(row, col) {
                return Some((row, col));
            }
        }
        random_unshot(rng, view)
    }

    fn handle_shot_result(&mut self, coord: Coordinate, is_hit: bool, is_sunk: bool) {
        if !is_hit {
            return;
        }
        if is_sunk {
            self.reset();
            return;
        }
        if let Some((last_row, _)) = self.last_hit {
            self.push_neighbours(coord, Some(coord.0 == last_row));
        } else {
            self.push_neighbours(coord, None);
        }
        self.last_hit = Some(coord);
    }
}

/// How a bot's game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BotReport {
    pub is_winner: bool,
    pub is_timeout: bool,
    pub shots_fired: usize,
    pub hits: usize,
}

/// Drives a [`GameClient`] with a [`Targeting`] strategy.
pub struct BattleBot<T: Transport> {
    client: GameClient<T>,
    targeting: Box<dyn Targeting>,
    rng: SmallRng,
    shots_fired: usize,
    hits: usize,
}

impl<T: Transport> BattleBot<T> {
    pub fn new(client: GameClient<T>, targeting: Box<dyn Targeting>, rng: SmallRng) -> Self {
        Self {
            client,
            targeting,
            rng,
            shots_fired: 0,
            hits: 0,
        }
    }

    pub fn client(&self) -> &GameClient<T> {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut GameClient<T> {
        &mut self.client
    }

    pub fn shots_fired(&self) -> usize {
        self.shots_fired
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn report(&self) -> BotReport {
        BotReport {
            is_winner: self.client.is_winner(),
            is_timeout: self.client.is_timeout(),
            shots_fired: self.shots_fired,
            hits: self.hits,
        }
    }

    /// Shuffle the fleet onto the bot's own board.
    pub fn prepare_board(&mut self) -> anyhow::Result<()> {
        self.client.board_mut().random_shuffle(&mut self.rng)?;
        Ok(())
    }

    /// Fire while the bot holds the turn.
    pub async fn perform_attacks(&mut self) -> anyhow::Result<()> {
        let board = self.client.enemy_view().board();
        let max_attempts = board.rows() * board.columns() * 2;
        let mut attempts = 0;

        while self.client.is_turn() && !self.client.has_battle_ended() {
            attempts += 1;
            if attempts > max_attempts {
                return Err(anyhow::anyhow!("{}: no valid shot found", self.client.name()));
            }
            let Some((row, col)) = self
                .targeting
                .select_target(&mut self.rng, self.client.enemy_view())
            else {
                return Err(anyhow::anyhow!("{}: every cell already shot", self.client.name()));
            };

            let response = self.client.shot(row, col).await?;
            if !response.is_success() {
                debug!("{}: shot at ({row}, {col}) rejected: {}", self.client.name(), response.message);
                continue;
            }
            let is_hit = response.bool_arg("has_hit_ship").unwrap_or(false);
            let is_sunk = response.bool_arg("has_sunk_ship").unwrap_or(false);
            self.shots_fired += 1;
            if is_hit {
                self.hits += 1;
            }
            self.targeting.handle_shot_result((row, col), is_hit, is_sunk);
        }
        Ok(())
    }

    /// Apply every queued opponent shot. Returns how many were received.
    pub async fn drain_received_shots(&mut self) -> anyhow::Result<usize> {
        let mut received = 0;
        loop {
            let response = self.client.ask_to_receive_shot().await?;
            if !response.is_success() {
                if response.message == ServerError::NotInRoom.to_string() {
                    return Err(anyhow::anyhow!("{}: room was closed", self.client.name()));
                }
                return Ok(received);
            }
            received += 1;
            if self.client.has_battle_ended() {
                return Ok(received);
            }
        }
    }

    /// Play a full networked game: join a public room (or open one), submit a
    /// shuffled board, then alternate between polling and firing.
    pub async fn play_online(&mut self, poll_interval: Duration) -> anyhow::Result<BotReport> {
        if !self.client.join_random_room().await?.is_success() {
            let response = self.client.create_room().await?;
            if !response.is_success() {
                return Err(anyhow::anyhow!("cannot create room: {}", response.message));
            }
        }
        info!(
            "{} playing in room {}",
            self.client.name(),
            self.client.room_id().map(|id| id.as_str()).unwrap_or("?")
        );

        while !self.client.has_opponent_joined().await?.is_success() {
            tokio::time::sleep(poll_interval).await;
        }

        self.prepare_board()?;
        let response = self.client.send_board().await?;
        if !response.is_success() {
            return Err(anyhow::anyhow!("board rejected: {}", response.message));
        }

        while !self.client.is_opponent_ready().await?.is_success() {
            tokio::time::sleep(poll_interval).await;
        }

        while !self.client.has_battle_ended() {
            if self.client.is_turn() {
                self.perform_attacks().await?;
            } else if self.drain_received_shots().await? == 0 {
                tokio::time::sleep(poll_interval).await;
            }
        }

        self.client.request_enemy_board().await?;
        let report = self.report();
        info!(
            "{} finished: winner={} shots={} hits={}",
            self.client.name(),
            report.is_winner,
            report.shots_fired,
            report.hits
        );
        Ok(report)
    }
}
