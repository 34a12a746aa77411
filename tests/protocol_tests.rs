use seabattle::{
    Board, BattleOutcome, GameServer, Request, Response, RoomId, ServerConfig, ServerError, Ship,
    Status,
};
use serde_json::{json, Value};

#[test]
fn test_parse_checks_in_order() {
    assert_eq!(Request::parse("{not json").unwrap_err(), ServerError::InvalidJson);
    assert_eq!(Request::parse(r#"{"args":{}}"#).unwrap_err(), ServerError::MissingCommand);
    assert_eq!(Request::parse("[1,2]").unwrap_err(), ServerError::MissingCommand);
    assert_eq!(
        Request::parse(r#"{"command":"fly"}"#).unwrap_err(),
        ServerError::UnknownCommand
    );
    assert_eq!(
        Request::parse(r#"{"command":"join_room_with_id","args":{}}"#).unwrap_err(),
        ServerError::MissingArguments(vec!["room_id".into(), "client_name".into()])
    );
    assert!(matches!(
        Request::parse(r#"{"command":"register_shot","args":{"row":"a","col":1}}"#),
        Err(ServerError::InvalidArguments(_))
    ));
}

#[test]
fn test_missing_arguments_message_lists_keys() {
    let err = ServerError::MissingArguments(vec!["row".into(), "col".into()]);
    assert_eq!(err.to_string(), "Missing arguments: row, col");
}

#[test]
fn test_parse_accepts_room_id_as_number_or_string() {
    let numeric = Request::parse(
        r#"{"command":"join_room_with_id","args":{"room_id":123456,"client_name":"bob"}}"#,
    )
    .unwrap();
    let text = Request::parse(
        r#"{"command":"join_room_with_id","args":{"room_id":"123456","client_name":"bob"}}"#,
    )
    .unwrap();
    assert_eq!(numeric, text);
    assert_eq!(
        numeric,
        Request::JoinRoomWithId {
            room_id: RoomId::new("123456"),
            client_name: "bob".into()
        }
    );
}

#[test]
fn test_args_may_be_omitted_for_commands_without_arguments() {
    assert_eq!(
        Request::parse(r#"{"command":"exit_room"}"#).unwrap(),
        Request::ExitRoom
    );
}

#[test]
fn test_request_frames_parse_back() {
    let requests = vec![
        Request::CreateRoom {
            client_name: "alice".into(),
        },
        Request::RegisterShot { row: 3, col: 7 },
        Request::AskToReceiveShot,
        Request::send_board(&Board::empty(10, 10).to_document()),
    ];
    for request in requests {
        let frame = request.to_frame();
        assert!(!frame.contains('\n'));
        assert_eq!(Request::parse(&frame).unwrap(), request);
    }
}

#[test]
fn test_error_flags() {
    let response = ServerError::NotPlayersTurn.into_response();
    assert_eq!(response.status, Status::Error);
    assert_eq!(response.message, "Not player's turn!");
    assert_eq!(response.bool_arg("is_player_turn"), Some(false));

    let response = ServerError::InvalidShot.into_response();
    assert_eq!(response.bool_arg("is_shot_valid"), Some(false));

    let response = ServerError::BattleEnded(BattleOutcome {
        has_battle_ended: true,
        is_winner: false,
        is_timeout: true,
    })
    .into_response();
    assert_eq!(response.message, "The battle has ended!");
    let outcome: BattleOutcome = response.args_as().unwrap();
    assert!(outcome.is_timeout && !outcome.is_winner);
}

#[test]
fn test_response_envelope_shape() {
    let frame = Response::success("Room 123456 created!")
        .with_arg("room_id", "123456")
        .to_frame();
    let value: Value = serde_json::from_str(&frame).unwrap();
    assert_eq!(
        value,
        json!({"status": "success", "message": "Room 123456 created!", "args": {"room_id": "123456"}})
    );
    let back = Response::from_frame(&frame).unwrap();
    assert!(back.is_success());
    assert_eq!(back.str_arg("room_id"), Some("123456"));
}

fn send(server: &GameServer, client: seabattle::ClientId, frame: Value) -> Response {
    server.handle_command(client, &frame.to_string())
}

#[test]
fn test_handle_command_full_exchange() {
    let server = GameServer::new(ServerConfig::default());
    let a = server.register_client();
    let b = server.register_client();

    let created = send(&server, a, json!({"command": "create_room", "args": {"client_name": "alice"}}));
    assert!(created.is_success());
    let room_id = created.str_arg("room_id").unwrap().to_string();
    assert_eq!(created.message, format!("Room {room_id} created!"));

    let joined = send(
        &server,
        b,
        json!({"command": "join_room_with_id", "args": {"room_id": room_id, "client_name": "bob"}}),
    );
    assert_eq!(joined.message, format!("Joined room {room_id}!"));
    assert_eq!(joined.str_arg("opponent_name"), Some("alice"));

    let waiting = send(&server, a, json!({"command": "has_opponent_joined", "args": {}}));
    assert_eq!(waiting.message, "Opponent bob has joined the room!");

    let mut board = Board::empty(10, 10);
    let id = board.add_ship(Ship::placed(1, 0, 0, true));
    board.place(id).unwrap();
    // board_json may be a JSON-encoded string or an inline object
    let as_string = send(
        &server,
        a,
        json!({"command": "send_board", "args": {"board_json": board.to_json()}}),
    );
    assert_eq!(as_string.message, "Board added successfully!");
    let inline = send(
        &server,
        b,
        json!({"command": "send_board", "args": {"board_json": board.to_document()}}),
    );
    assert!(inline.is_success());

    let ready = send(&server, a, json!({"command": "is_opponent_ready", "args": {}}));
    assert_eq!(ready.message, "Starting game!");
    assert_eq!(ready.bool_arg("is_turn"), Some(true));
    assert!(ready.arg("turn_end_time").unwrap().is_f64());

    let shot = send(&server, a, json!({"command": "register_shot", "args": {"row": 0, "col": 0}}));
    assert_eq!(shot.message, "Shot registered!");
    for key in [
        "has_hit_ship",
        "has_sunk_ship",
        "sunk_ship",
        "is_turn",
        "turn_end_time",
        "has_battle_ended",
        "is_winner",
        "is_timeout",
    ] {
        assert!(shot.arg(key).is_some(), "missing {key}");
    }
    assert_eq!(shot.bool_arg("has_battle_ended"), Some(true));
    assert_eq!(shot.arg("sunk_ship").unwrap()["ship_length"], json!(1));

    let received = send(&server, b, json!({"command": "ask_to_receive_shot", "args": {}}));
    assert_eq!(received.message, "Shot was made by the opponent!");
    assert_eq!(received.arg("row"), Some(&json!(0)));
    assert_eq!(received.bool_arg("is_winner"), Some(false));

    let reveal = send(&server, b, json!({"command": "request_enemy_board", "args": {}}));
    assert_eq!(reveal.message, "Return the enemy board!");
    assert_eq!(reveal.arg("enemy_board_data").unwrap()["rows_count"], json!(10));

    let exit = send(&server, b, json!({"command": "exit_room", "args": {}}));
    assert_eq!(exit.message, format!("Client exited from room {room_id}!"));
    let gone = send(&server, a, json!({"command": "exit_room", "args": {}}));
    assert_eq!(gone.message, "Client is not in a room!");
}

#[test]
fn test_handle_command_reports_protocol_errors() {
    let server = GameServer::default();
    let client = server.register_client();
    assert_eq!(server.handle_command(client, "garbage").message, "Invalid JSON format");
    assert_eq!(
        server.handle_command(client, r#"{"command":"nope","args":{}}"#).message,
        "Unknown command"
    );
    assert_eq!(
        server.handle_command(client, r#"{"command":"register_shot","args":{"row":1}}"#).message,
        "Missing arguments: col"
    );
    let bad_board = server.handle_command(
        client,
        r#"{"command":"send_board","args":{"board_json":"{}"}}"#,
    );
    assert_eq!(bad_board.message, "Client is not in a room!");

    server.handle_command(client, r#"{"command":"create_room","args":{"client_name":"x"}}"#);
    let bad_board = server.handle_command(
        client,
        r#"{"command":"send_board","args":{"board_json":"{}"}}"#,
    );
    assert_eq!(bad_board.message, "Invalid board!");
}

#[test]
fn test_huge_ship_length_is_an_invalid_board() {
    let server = GameServer::default();
    let client = server.register_client();
    let created = send(&server, client, json!({"command": "create_room", "args": {"client_name": "x"}}));
    let room_id = RoomId::new(created.str_arg("room_id").unwrap());

    let board = json!({
        "rows_count": 10,
        "columns_count": 10,
        "ships": [{
            "ship_length": 1u64 << 60,
            "row": 0,
            "col": 0,
            "is_horizontal": true,
            "is_alive": true,
            "sunk_coordinates": []
        }]
    });
    let response = send(
        &server,
        client,
        json!({"command": "send_board", "args": {"board_json": board}}),
    );
    assert_eq!(response.message, "Invalid board!");
    assert!(server.does_room_exist(&room_id));
    assert!(server.is_client_in_room(client));
}

#[test]
fn test_publicity_response() {
    let server = GameServer::default();
    let client = server.register_client();
    let created = server.handle_command(client, r#"{"command":"create_room","args":{"client_name":"x"}}"#);
    let room_id = created.str_arg("room_id").unwrap().to_string();
    let toggled = server.handle_command(client, r#"{"command":"change_room_publicity"}"#);
    assert_eq!(toggled.message, format!("Room {room_id} publicity changed!"));
    assert_eq!(toggled.bool_arg("is_private"), Some(true));
}
