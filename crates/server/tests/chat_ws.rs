use std::time::Duration;

use futures::{SinkExt, StreamExt};
use parkspot_server::{
    build_router, config::Config, db::Database, routes::auth::create_token, services::accounts,
    AppState,
};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{Error as WsError, Message},
    MaybeTlsStream, WebSocketStream,
};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn serve() -> (AppState, String) {
    let db = Database::in_memory().await.unwrap();
    let state = AppState::new(db, Config::default());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = build_router(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (state, format!("ws://{addr}/ws"))
}

async fn token_for(state: &AppState, username: &str) -> String {
    let user = accounts::register(&state.db.pool, username, "pw").await.unwrap();
    create_token(user.id, &user.username, user.is_admin, &state.config.jwt_secret, 1).unwrap()
}

async fn connect(url: &str, token: &str) -> Client {
    let (client, _) = connect_async(format!("{url}?token={token}")).await.unwrap();
    client
}

/// Next JSON event from the room, skipping control frames.
async fn next_event(client: &mut Client) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("timed out waiting for a chat event")
            .expect("socket closed")
            .unwrap();
        if let Message::Text(text) = frame {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn stored_messages(state: &AppState) -> i64 {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM chat_messages")
        .fetch_one(&state.db.pool)
        .await
        .unwrap()
}

#[tokio::test]
async fn socket_requires_a_session() {
    let (_state, url) = serve().await;

    let err = connect_async(url.as_str()).await.unwrap_err();
    match err {
        WsError::Http(response) => assert_eq!(response.status().as_u16(), 401),
        other => panic!("expected an HTTP rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn messages_are_stored_and_fanned_out() {
    let (state, url) = serve().await;
    let bob_token = token_for(&state, "bob").await;
    let alice_token = token_for(&state, "alice").await;

    let mut bob = connect(&url, &bob_token).await;
    assert_eq!(
        next_event(&mut bob).await,
        json!({
            "event": "status",
            "msg": "bob has entered the chat.",
            "username": "bob",
            "is_admin": false,
        })
    );

    let mut alice = connect(&url, &alice_token).await;
    assert_eq!(next_event(&mut alice).await["msg"], "alice has entered the chat.");
    assert_eq!(next_event(&mut bob).await["msg"], "alice has entered the chat.");

    // blank messages are dropped without a reply
    alice
        .send(Message::Text(json!({ "message": "   " }).to_string()))
        .await
        .unwrap();
    alice
        .send(Message::Text(json!({ "message": " hello " }).to_string()))
        .await
        .unwrap();

    for client in [&mut alice, &mut bob] {
        let event = next_event(client).await;
        assert_eq!(event["event"], "message");
        assert_eq!(event["username"], "alice");
        assert_eq!(event["message"], "hello");
        assert_eq!(event["is_admin"], false);
        assert!(event["timestamp"].is_string());
    }
    assert_eq!(stored_messages(&state).await, 1);

    alice.close(None).await.unwrap();
    let event = next_event(&mut bob).await;
    assert_eq!(event["event"], "status");
    assert_eq!(event["msg"], "alice has left the chat.");
}

#[tokio::test]
async fn malformed_frames_are_ignored() {
    let (state, url) = serve().await;
    let token = token_for(&state, "alice").await;

    let mut alice = connect(&url, &token).await;
    next_event(&mut alice).await;

    alice.send(Message::Text("not json".into())).await.unwrap();
    alice
        .send(Message::Text(json!({ "message": "still here" }).to_string()))
        .await
        .unwrap();

    let event = next_event(&mut alice).await;
    assert_eq!(event["message"], "still here");
    assert_eq!(stored_messages(&state).await, 1);
}
