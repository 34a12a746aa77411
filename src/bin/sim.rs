use seabattle::OfflineMatch;
use serde_json::json;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 3 {
        eprintln!("Usage: {} <seed1> <seed2>", args[0]);
        std::process::exit(1);
    }
    let seed1: u64 = args[1].parse()?;
    let seed2: u64 = args[2].parse()?;

    let summary = OfflineMatch::new(seed1, seed2).run().await?;

    let player = |i: usize| {
        summary.players.get(i).map(|p| {
            json!({
                "name": p.name,
                "status": if p.is_winner { "Won" } else { "Lost" },
                "shots": p.shots_fired,
                "hits": p.hits,
            })
        })
    };

    let result = json!({
        "player1": player(0),
        "player2": player(1),
        "winner": summary.winner,
        "rounds": summary.rounds,
    });

    println!("{}", serde_json::to_string(&result)?);
    Ok(())
}
