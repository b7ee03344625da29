mod common;

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

use common::{setup, token};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn serve(users: &[&str]) -> String {
    let (app, _) = setup(users);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr.to_string()
}

async fn next_event(ws: &mut Client) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for gateway event")
            .unwrap()
            .unwrap();
        if msg.is_text() {
            return serde_json::from_str(msg.to_text().unwrap()).unwrap();
        }
    }
}

async fn connect(addr: &str, user: &str) -> Client {
    let url = format!("ws://{addr}/gateway?token={}", token(user));
    let (mut ws, _) = connect_async(url).await.unwrap();
    let ready = next_event(&mut ws).await;
    assert_eq!(ready, json!({"type": "ready", "data": {"userId": user}}));
    ws
}

#[tokio::test]
async fn handshake_requires_matching_token() {
    let addr = serve(&["u1"]).await;

    assert!(connect_async(format!("ws://{addr}/gateway")).await.is_err());
    assert!(connect_async(format!("ws://{addr}/gateway?token=garbage")).await.is_err());

    let spoofed = format!("ws://{addr}/gateway?token={}&userId=u2", token("u1"));
    assert!(connect_async(spoofed).await.is_err());

    let matching = format!("ws://{addr}/gateway?token={}&userId=u1", token("u1"));
    assert!(connect_async(matching).await.is_ok());
}

#[tokio::test]
async fn sent_message_is_pushed_to_online_receiver() {
    let addr = serve(&["u1", "u2"]).await;
    let mut receiver = connect(&addr, "u2").await;

    let health: Value = reqwest::get(format!("http://{addr}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["online"], 1);

    let res = reqwest::Client::new()
        .post(format!("http://{addr}/api/messages/send/u2"))
        .bearer_auth(token("u1"))
        .json(&json!({"content": "live hello"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::CREATED);
    let sent: Value = res.json().await.unwrap();

    let event = next_event(&mut receiver).await;
    assert_eq!(event["type"], "newMessage");
    assert_eq!(event["data"]["id"], sent["id"]);
    assert_eq!(event["data"]["content"], "live hello");
    assert_eq!(event["data"]["sender"]["id"], "u1");
}

#[tokio::test]
async fn offline_receiver_still_gets_persisted_history() {
    let addr = serve(&["u1", "u2"]).await;
    let client = reqwest::Client::new();

    let res = client
        .post(format!("http://{addr}/api/messages/send/u2"))
        .bearer_auth(token("u1"))
        .json(&json!({"content": "while you were out"}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), reqwest::StatusCode::CREATED);

    let history: Value = client
        .get(format!("http://{addr}/api/messages/conversations/u1"))
        .bearer_auth(token("u2"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(history[0]["content"], "while you were out");
}

#[tokio::test]
async fn client_send_command_is_relayed_as_is() {
    let addr = serve(&["u1", "u2"]).await;
    let mut receiver = connect(&addr, "u2").await;
    let mut sender = connect(&addr, "u1").await;

    let command = json!({
        "type": "sendMessage",
        "data": {"receiverId": "u2", "message": {"content": "typed live", "draft": true}}
    });
    sender.send(Message::Text(command.to_string().into())).await.unwrap();

    let event = next_event(&mut receiver).await;
    assert_eq!(
        event,
        json!({"type": "newMessage", "data": {"content": "typed live", "draft": true}})
    );
}
