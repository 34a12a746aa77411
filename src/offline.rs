//! Single-process games: two bots sharing one untimed server.

use std::sync::Arc;

use log::info;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde::Serialize;

use crate::bot::{BattleBot, HuntTargeting, RandomTargeting, Targeting};
use crate::client::GameClient;
use crate::config::ServerConfig;
use crate::protocol::Response;
use crate::server::GameServer;
use crate::transport::local::LocalTransport;

/// Rounds after which a match is abandoned. A round is one side's volley.
const MAX_ROUNDS: usize = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Strategy {
    #[default]
    Hunt,
    Random,
}

impl Strategy {
    pub fn targeting(self) -> Box<dyn Targeting> {
        match self {
            Strategy::Hunt => Box::new(HuntTargeting::new()),
            Strategy::Random => Box::new(RandomTargeting),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerSummary {
    pub name: String,
    pub shots_fired: usize,
    pub hits: usize,
    pub is_winner: bool,
}

/// Result of an [`OfflineMatch`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchSummary {
    pub winner: Option<String>,
    pub rounds: usize,
    pub players: Vec<PlayerSummary>,
}

/// One bot-versus-bot game, deterministic for a given pair of seeds.
pub struct OfflineMatch {
    server: Arc<GameServer>,
    seeds: (u64, u64),
    strategies: (Strategy, Strategy),
}

impl OfflineMatch {
    pub fn new(seed1: u64, seed2: u64) -> Self {
        let config = ServerConfig {
            seed: Some(seed1 ^ seed2.rotate_left(32)),
            ..ServerConfig::offline()
        };
        Self {
            server: Arc::new(GameServer::new(config)),
            seeds: (seed1, seed2),
            strategies: (Strategy::Hunt, Strategy::Hunt),
        }
    }

    pub fn with_strategies(mut self, first: Strategy, second: Strategy) -> Self {
        self.strategies = (first, second);
        self
    }

    pub fn server(&self) -> &Arc<GameServer> {
        &self.server
    }

    fn bot(&self, name: &str, seed: u64, strategy: Strategy) -> BattleBot<LocalTransport> {
        let transport = LocalTransport::new(Arc::clone(&self.server));
        BattleBot::new(
            GameClient::new(name, transport),
            strategy.targeting(),
            SmallRng::seed_from_u64(seed),
        )
    }

    /// Play the game to the end.
    pub async fn run(&self) -> anyhow::Result<MatchSummary> {
        let mut first = self.bot("player1", self.seeds.0, self.strategies.0);
        let mut second = self.bot("player2", self.seeds.1, self.strategies.1);

        expect_success(first.client_mut().create_room().await?)?;
        expect_success(second.client_mut().join_random_room().await?)?;

        for bot in [&mut first, &mut second] {
            bot.prepare_board()?;
            expect_success(bot.client_mut().send_board().await?)?;
        }
        expect_success(first.client_mut().is_opponent_ready().await?)?;
        expect_success(second.client_mut().is_opponent_ready().await?)?;

        let mut rounds = 0;
        while !(first.client().has_battle_ended() && second.client().has_battle_ended()) {
            rounds += 1;
            if rounds > MAX_ROUNDS {
                return Err(anyhow::anyhow!("match did not finish after {MAX_ROUNDS} rounds"));
            }
            let (shooter, target) = if first.client().is_turn() {
                (&mut first, &mut second)
            } else if second.client().is_turn() {
                (&mut second, &mut first)
            } else {
                // Nobody holds the turn locally; let both catch up.
                first.drain_received_shots().await?;
                second.drain_received_shots().await?;
                continue;
            };
            shooter.perform_attacks().await?;
            target.drain_received_shots().await?;
        }

        for bot in [&mut first, &mut second] {
            expect_success(bot.client_mut().request_enemy_board().await?)?;
        }

        let players: Vec<PlayerSummary> = [&first, &second]
            .iter()
            .map(|bot| PlayerSummary {
                name: bot.client().name().to_string(),
                shots_fired: bot.shots_fired(),
                hits: bot.hits(),
                is_winner: bot.client().is_winner(),
            })
            .collect();
        let winner = players
            .iter()
            .find(|p| p.is_winner)
            .map(|p| p.name.clone());
        info!("offline match finished after {rounds} rounds, winner {winner:?}");

        Ok(MatchSummary {
            winner,
            rounds,
            players,
        })
    }
}

fn expect_success(response: Response) -> anyhow::Result<()> {
    if response.is_success() {
        Ok(())
    } else {
        Err(anyhow::anyhow!("unexpected error: {}", response.message))
    }
}
