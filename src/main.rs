use std::sync::Arc;

use clap::Parser;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use seabattle::{
    init_logging, serve, BattleBot, GameClient, GameServer, OfflineMatch, ServerConfig, Strategy,
    TcpTransport, DEFAULT_PORT, DEFAULT_TIME_PER_TURN,
};
use tokio::net::TcpListener;
use tokio::time::Duration;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Parser)]
enum Commands {
    /// Run the networked game server.
    Serve {
        #[arg(long, default_value_t = format!("0.0.0.0:{DEFAULT_PORT}"))]
        bind: String,
        #[arg(long, help = "Seconds per turn before the player on turn forfeits")]
        time_per_turn: Option<u64>,
        #[arg(long, conflicts_with = "time_per_turn", help = "Disable turn deadlines")]
        untimed: bool,
        #[arg(long, help = "Only accept the standard 10x10 fleet")]
        strict_fleet: bool,
        #[arg(long, help = "Fix RNG seed for reproducible room ids (e.g., --seed 12345)")]
        seed: Option<u64>,
    },
    /// Play a bot against a bot on the local machine.
    Local {
        #[arg(long, help = "Fix RNG seed for reproducible games (e.g., --seed 12345)")]
        seed: Option<u64>,
        #[arg(long, value_enum, default_value_t = Strategy::Hunt)]
        strategy: Strategy,
    },
    /// Connect a bot to a running server.
    Bot {
        #[arg(long, default_value_t = format!("127.0.0.1:{DEFAULT_PORT}"))]
        connect: String,
        #[arg(long, default_value = "BattleBot")]
        name: String,
        #[arg(long, value_enum, default_value_t = Strategy::Hunt)]
        strategy: Strategy,
        #[arg(long, help = "Fix RNG seed for reproducible games (e.g., --seed 12345)")]
        seed: Option<u64>,
    },
}

fn seeded_rng(seed: Option<u64>) -> SmallRng {
    match seed {
        Some(s) => SmallRng::seed_from_u64(s),
        None => SmallRng::from_rng(&mut rand::rng()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            bind,
            time_per_turn,
            untimed,
            strict_fleet,
            seed,
        } => {
            let time_per_turn = if untimed {
                None
            } else {
                Some(time_per_turn.map_or(DEFAULT_TIME_PER_TURN, Duration::from_secs))
            };
            let config = ServerConfig {
                time_per_turn,
                strict_fleet,
                seed,
                ..ServerConfig::networked()
            };
            println!("Starting server at {}...", bind);
            let listener = TcpListener::bind(&bind).await?;
            serve(listener, Arc::new(GameServer::new(config))).await?;
        }
        Commands::Local { seed, strategy } => {
            let mut rng = seeded_rng(seed);
            if let Some(s) = seed {
                println!("Using fixed seed: {} (game will be reproducible)", s);
            }
            let seed1: u64 = rng.random();
            let seed2: u64 = rng.random();
            let summary = OfflineMatch::new(seed1, seed2)
                .with_strategies(strategy, strategy)
                .run()
                .await?;
            for player in &summary.players {
                println!(
                    "{}: {} shots, {} hits{}",
                    player.name,
                    player.shots_fired,
                    player.hits,
                    if player.is_winner { " (winner)" } else { "" }
                );
            }
            println!("Finished after {} rounds", summary.rounds);
        }
        Commands::Bot {
            connect,
            name,
            strategy,
            seed,
        } => {
            println!("Connecting to {}...", connect);
            let transport = TcpTransport::connect(&connect).await?;
            let mut client = GameClient::new(name, transport);
            client.await_greeting().await?;
            println!("Connected successfully!");

            let mut bot = BattleBot::new(client, strategy.targeting(), seeded_rng(seed));
            let report = bot.play_online(Duration::from_millis(500)).await?;
            if report.is_winner {
                println!("Victory after {} shots!", report.shots_fired);
            } else if report.is_timeout {
                println!("Defeat: the turn timer ran out.");
            } else {
                println!("Defeat after {} shots.", report.shots_fired);
            }
            println!("{}", bot.client().enemy_view().board());
        }
    }
    Ok(())
}
