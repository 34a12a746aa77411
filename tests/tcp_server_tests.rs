use std::net::SocketAddr;
use std::sync::Arc;

use rand::{rngs::SmallRng, SeedableRng};
use seabattle::{
    serve, BattleBot, Board, GameClient, GameServer, HuntTargeting, RandomTargeting, Response,
    ServerConfig, Ship, TcpTransport, Transport,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::Duration;

async fn start_server(config: ServerConfig) -> anyhow::Result<(SocketAddr, Arc<GameServer>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let server = Arc::new(GameServer::new(config));
    tokio::spawn(serve(listener, Arc::clone(&server)));
    Ok((addr, server))
}

async fn connect(addr: SocketAddr, name: &str) -> anyhow::Result<GameClient<TcpTransport>> {
    let transport = TcpTransport::connect(addr).await?;
    let mut client = GameClient::new(name, transport);
    client.await_greeting().await?;
    Ok(client)
}

fn single_ship_board(row: usize, col: usize) -> Board {
    let mut board = Board::empty(10, 10);
    let id = board.add_ship(Ship::placed(1, row, col, true));
    board.place(id).unwrap();
    board
}

async fn wait_for_rooms(server: &GameServer, count: usize) -> bool {
    for _ in 0..100 {
        if server.room_count() == count {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

#[tokio::test(flavor = "multi_thread")]
async fn test_greeting_on_connect() -> anyhow::Result<()> {
    let (addr, _server) = start_server(ServerConfig::default()).await?;
    let mut transport = TcpTransport::connect(addr).await?;
    let greeting = Response::from_frame(&transport.recv().await?)?;
    assert_eq!(greeting, Response::greeting());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_scripted_game_over_tcp() -> anyhow::Result<()> {
    let (addr, server) = start_server(ServerConfig::networked()).await?;
    let mut alice = connect(addr, "alice").await?;
    let mut bob = connect(addr, "bob").await?;

    assert!(alice.create_room().await?.is_success());
    let room_id = alice.room_id().cloned().unwrap();
    assert!(server.does_room_exist(&room_id));

    let joined = bob.join_room_with_id(&room_id).await?;
    assert_eq!(joined.str_arg("opponent_name"), Some("alice"));
    assert_eq!(bob.room_id(), Some(&room_id));

    *alice.board_mut() = single_ship_board(9, 9);
    *bob.board_mut() = single_ship_board(0, 0);
    assert!(alice.send_board().await?.is_success());

    let early = alice.is_opponent_ready().await?;
    assert_eq!(early.message, "Opponent has no board yet!");

    assert!(bob.send_board().await?.is_success());
    assert!(alice.is_opponent_ready().await?.is_success());
    assert!(bob.is_opponent_ready().await?.is_success());
    assert!(alice.is_turn());
    assert!(!bob.is_turn());
    assert!(alice.turn_end_time().is_some());

    let idle = bob.ask_to_receive_shot().await?;
    assert_eq!(idle.message, "Client has not made a shot yet!");

    let rejected = bob.shot(5, 5).await?;
    assert_eq!(rejected.message, "Not player's turn!");

    let shot = alice.shot(0, 0).await?;
    assert!(shot.is_success());
    assert!(alice.has_battle_ended());
    assert!(alice.is_winner());
    assert_eq!(alice.enemy_view().board().placed_ship_ids().len(), 1);

    let received = bob.ask_to_receive_shot().await?;
    assert!(received.is_success());
    assert!(bob.has_battle_ended());
    assert!(!bob.is_winner());
    assert!(bob.board().are_all_ships_sunk());

    assert!(bob.request_enemy_board().await?.is_success());
    assert_eq!(bob.enemy_view().board().placed_ship_ids().len(), 1);

    assert!(alice.exit_room().await?.is_success());
    assert!(alice.room_id().is_none());
    assert!(!server.does_room_exist(&room_id));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_malformed_frame_keeps_connection() -> anyhow::Result<()> {
    let (addr, _server) = start_server(ServerConfig::default()).await?;
    let mut transport = TcpTransport::connect(addr).await?;
    transport.recv().await?;

    transport.send("{this is not json").await?;
    let response = Response::from_frame(&transport.recv().await?)?;
    assert_eq!(response.message, "Invalid JSON format");

    transport
        .send(r#"{"command":"create_room","args":{"client_name":"carol"}}"#)
        .await?;
    let response = Response::from_frame(&transport.recv().await?)?;
    assert!(response.is_success());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_invalid_utf8_keeps_connection_and_room() -> anyhow::Result<()> {
    let (addr, server) = start_server(ServerConfig::default()).await?;
    let stream = TcpStream::connect(addr).await?;
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();
    lines.next_line().await?;

    write_half
        .write_all(b"{\"command\":\"create_room\",\"args\":{\"client_name\":\"dave\"}}\n")
        .await?;
    let created = Response::from_frame(&lines.next_line().await?.unwrap_or_default())?;
    assert!(created.is_success());
    assert_eq!(server.room_count(), 1);

    write_half.write_all(b"\xff\xfe garbage\n").await?;
    let rejected = Response::from_frame(&lines.next_line().await?.unwrap_or_default())?;
    assert_eq!(rejected.message, "Invalid JSON format");
    assert_eq!(server.room_count(), 1);

    write_half
        .write_all(b"{\"command\":\"change_room_publicity\",\"args\":{}}\n")
        .await?;
    let toggled = Response::from_frame(&lines.next_line().await?.unwrap_or_default())?;
    assert!(toggled.is_success());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_disconnect_closes_room() -> anyhow::Result<()> {
    let (addr, server) = start_server(ServerConfig::default()).await?;
    let mut alice = connect(addr, "alice").await?;
    let mut bob = connect(addr, "bob").await?;
    assert!(alice.create_room().await?.is_success());
    assert!(bob.join_random_room().await?.is_success());
    assert_eq!(server.room_count(), 1);

    drop(alice);
    assert!(wait_for_rooms(&server, 0).await, "room should close with the connection");

    let response = bob.has_opponent_joined().await?;
    assert_eq!(response.message, "Client is not in a room!");
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_oversized_frame_drops_connection() -> anyhow::Result<()> {
    let config = ServerConfig {
        max_frame_size: 128,
        ..ServerConfig::default()
    };
    let (addr, _server) = start_server(config).await?;
    let stream = TcpStream::connect(addr).await?;
    let mut transport = TcpTransport::with_config(stream, Duration::from_secs(5), 4096);
    transport.recv().await?;

    transport.send(&"a".repeat(1000)).await?;
    assert!(transport.recv().await.is_err());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_bots_play_online() -> anyhow::Result<()> {
    let (addr, server) = start_server(ServerConfig::default()).await?;
    let poll = Duration::from_millis(5);

    let mut first = BattleBot::new(
        connect(addr, "hunter").await?,
        Box::new(HuntTargeting::new()),
        SmallRng::seed_from_u64(11),
    );
    let first_task = tokio::spawn(async move {
        let report = first.play_online(poll).await;
        (first, report)
    });
    assert!(wait_for_rooms(&server, 1).await);

    let mut second = BattleBot::new(
        connect(addr, "gunner").await?,
        Box::new(RandomTargeting),
        SmallRng::seed_from_u64(12),
    );
    let second_task = tokio::spawn(async move {
        let report = second.play_online(poll).await;
        (second, report)
    });

    let ((first, first_report), (second, second_report)) =
        tokio::try_join!(first_task, second_task)?;
    let (first_report, second_report) = (first_report?, second_report?);

    assert_ne!(first_report.is_winner, second_report.is_winner);
    assert!(!first_report.is_timeout && !second_report.is_timeout);
    let loser = if first_report.is_winner { &second } else { &first };
    assert!(loser.client().board().are_all_ships_sunk());
    assert_eq!(
        first.client().room_id(),
        second.client().room_id(),
        "both bots must end up in the same room"
    );
    Ok(())
}
