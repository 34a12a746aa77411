use std::sync::Arc;

use seabattle::{
    GameClient, GameServer, LocalTransport, OfflineMatch, Response, ServerConfig, Strategy,
    Transport,
};

#[tokio::test(flavor = "multi_thread")]
async fn test_match_produces_exactly_one_winner() -> anyhow::Result<()> {
    let summary = OfflineMatch::new(1, 2).run().await?;
    assert_eq!(summary.players.len(), 2);
    let winners: Vec<_> = summary.players.iter().filter(|p| p.is_winner).collect();
    assert_eq!(winners.len(), 1);
    assert_eq!(summary.winner.as_deref(), Some(winners[0].name.as_str()));
    // the winner sank the whole standard fleet: 4 + 3 + 3 + 2 + 2 + 2 + 1 + 1 + 1 + 1
    assert_eq!(winners[0].hits, 20);
    assert!(summary.rounds > 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_same_seeds_replay_identically() -> anyhow::Result<()> {
    let first = OfflineMatch::new(42, 7).run().await?;
    let second = OfflineMatch::new(42, 7).run().await?;
    assert_eq!(first, second);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_mixed_strategies_finish() -> anyhow::Result<()> {
    for seed in 0..5 {
        let summary = OfflineMatch::new(seed, seed + 100)
            .with_strategies(Strategy::Hunt, Strategy::Random)
            .run()
            .await?;
        assert!(summary.winner.is_some());
        for player in &summary.players {
            assert!(player.hits <= player.shots_fired);
        }
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_match_leaves_no_room_behind() -> anyhow::Result<()> {
    let game = OfflineMatch::new(3, 4);
    game.run().await?;
    assert_eq!(game.server().room_count(), 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_local_transport_queues_responses() -> anyhow::Result<()> {
    let server = Arc::new(GameServer::new(ServerConfig::offline()));
    let mut transport = LocalTransport::new(Arc::clone(&server));
    assert!(transport.recv().await.is_err(), "nothing sent yet");

    transport.send(r#"{"command":"exit_room","args":{}}"#).await?;
    transport
        .send(r#"{"command":"create_room","args":{"client_name":"solo"}}"#)
        .await?;
    let first = Response::from_frame(&transport.recv().await?)?;
    let second = Response::from_frame(&transport.recv().await?)?;
    assert_eq!(first.message, "Client is not in a room!");
    assert!(second.is_success());
    assert_eq!(server.room_count(), 1);

    drop(transport);
    assert_eq!(server.room_count(), 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_local_clients_share_a_server() -> anyhow::Result<()> {
    let server = Arc::new(GameServer::new(ServerConfig::offline()));
    let mut host = GameClient::new("host", LocalTransport::new(Arc::clone(&server)));
    let mut guest = GameClient::new("guest", LocalTransport::new(Arc::clone(&server)));

    assert!(host.create_room().await?.is_success());
    let toggled = host.change_room_publicity().await?;
    assert_eq!(toggled.bool_arg("is_private"), Some(true));
    assert_eq!(
        guest.join_random_room().await?.message,
        "No available rooms to join!"
    );

    let room_id = host.room_id().cloned().unwrap();
    assert!(guest.join_room_with_id(&room_id).await?.is_success());
    let joined = host.has_opponent_joined().await?;
    assert_eq!(joined.str_arg("opponent_name"), Some("guest"));
    Ok(())
}
