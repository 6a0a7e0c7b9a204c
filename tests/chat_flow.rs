//! End-to-end exchange over a live socket: join, history replay, broadcast,
//! assistant replies, mentions and typing relay.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

use xiaonong::server;
use xiaonong::server::room::Room;

struct TestClient {
    lines: Lines<BufReader<OwnedReadHalf>>,
    write: OwnedWriteHalf,
}

impl TestClient {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (read, write) = stream.into_split();
        Self {
            lines: BufReader::new(read).lines(),
            write,
        }
    }

    async fn send(&mut self, json: &str) {
        self.write.write_all(json.as_bytes()).await.unwrap();
        self.write.write_all(b"\n").await.unwrap();
    }

    async fn join(&mut self, username: &str) {
        self.send(&format!(r#"{{"type":"join","username":"{username}"}}"#))
            .await;
    }

    async fn say(&mut self, message: &str) {
        self.send(&serde_json::to_string(&serde_json::json!({
            "type": "send_message",
            "message": message,
        })).unwrap())
        .await;
    }

    async fn recv(&mut self) -> Value {
        let line = tokio::time::timeout(Duration::from_secs(5), self.lines.next_line())
            .await
            .expect("timed out waiting for server event")
            .unwrap()
            .expect("connection closed");
        serde_json::from_str(&line).unwrap()
    }
}

async fn start_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let room = Arc::new(Mutex::new(Room::new(100)));
    tokio::spawn(server::run(listener, room));
    addr
}

#[tokio::test]
async fn test_join_replays_history_and_announces() {
    let addr = start_server().await;
    let mut alice = TestClient::connect(addr).await;
    alice.join("alice").await;

    let history = alice.recv().await;
    assert_eq!(history["type"], "history");
    assert_eq!(history["messages"].as_array().unwrap().len(), 0);

    let joined = alice.recv().await;
    assert_eq!(joined["type"], "user_joined");
    assert_eq!(joined["username"], "alice");
    assert_eq!(joined["users"], serde_json::json!(["alice"]));
}

#[tokio::test]
async fn test_duplicate_username_rejected() {
    let addr = start_server().await;
    let mut alice = TestClient::connect(addr).await;
    alice.join("alice").await;
    alice.recv().await; // history
    alice.recv().await; // user_joined

    let mut imposter = TestClient::connect(addr).await;
    imposter.join("alice").await;
    let error = imposter.recv().await;
    assert_eq!(error["type"], "join_error");
    assert_eq!(error["message"], "用户名已存在");
}

#[tokio::test]
async fn test_messages_are_broadcast_and_kept_in_history() {
    let addr = start_server().await;
    let mut alice = TestClient::connect(addr).await;
    alice.join("alice").await;
    alice.recv().await;
    alice.recv().await;

    alice.say("第一条消息").await;
    let msg = alice.recv().await;
    assert_eq!(msg["type"], "new_message");
    assert_eq!(msg["message"]["kind"], "text");
    assert_eq!(msg["message"]["username"], "alice");
    assert_eq!(msg["message"]["content"], "第一条消息");

    // A later joiner gets the message in the history replay.
    let mut bob = TestClient::connect(addr).await;
    bob.join("bob").await;
    let history = bob.recv().await;
    assert_eq!(history["type"], "history");
    let messages = history["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["content"], "第一条消息");
}

#[tokio::test]
async fn test_assistant_reply_precedes_query_broadcast() {
    let addr = start_server().await;
    let mut alice = TestClient::connect(addr).await;
    alice.join("alice").await;
    alice.recv().await;
    alice.recv().await;

    alice.say("@川小农 3 + 4").await;

    let reply = alice.recv().await;
    assert_eq!(reply["type"], "new_message");
    assert_eq!(reply["message"]["kind"], "ai_response");
    assert_eq!(reply["message"]["username"], "川小农");
    assert_eq!(reply["message"]["content"], "计算结果：7");

    let query = alice.recv().await;
    assert_eq!(query["message"]["kind"], "ai_query");
    assert_eq!(query["message"]["command_data"]["query"], "3 + 4");
}

#[tokio::test]
async fn test_assistant_sees_online_count() {
    let addr = start_server().await;
    let mut alice = TestClient::connect(addr).await;
    alice.join("alice").await;
    alice.recv().await;
    alice.recv().await;

    alice.say("@川小农 有多少人在线").await;
    let reply = alice.recv().await;
    assert_eq!(reply["message"]["content"], "当前有1位在线用户。");
}

#[tokio::test]
async fn test_movie_command_normalizes_url() {
    let addr = start_server().await;
    let mut alice = TestClient::connect(addr).await;
    alice.join("alice").await;
    alice.recv().await;
    alice.recv().await;

    alice.say("@电影 https://youtu.be/abc123").await;
    let msg = alice.recv().await;
    assert_eq!(msg["message"]["kind"], "movie");
    assert_eq!(
        msg["message"]["command_data"]["url"],
        "https://www.youtube.com/watch?v=abc123"
    );
}

#[tokio::test]
async fn test_mention_alert_goes_to_mentioned_user() {
    let addr = start_server().await;
    let mut alice = TestClient::connect(addr).await;
    alice.join("alice").await;
    alice.recv().await;
    alice.recv().await;

    let mut bob = TestClient::connect(addr).await;
    bob.join("bob").await;
    bob.recv().await; // history
    bob.recv().await; // user_joined (bob)
    alice.recv().await; // user_joined (bob)

    bob.say("@alice 你看这个").await;

    let msg = alice.recv().await;
    assert_eq!(msg["type"], "new_message");
    assert_eq!(msg["message"]["mentions"], serde_json::json!(["alice"]));

    let alert = alice.recv().await;
    assert_eq!(alert["type"], "mention_alert");
    assert_eq!(alert["from_user"], "bob");
    assert_eq!(alert["message"], "@alice 你看这个");
}

#[tokio::test]
async fn test_typing_relay_skips_sender() {
    let addr = start_server().await;
    let mut alice = TestClient::connect(addr).await;
    alice.join("alice").await;
    alice.recv().await;
    alice.recv().await;

    let mut bob = TestClient::connect(addr).await;
    bob.join("bob").await;
    bob.recv().await;
    bob.recv().await;
    alice.recv().await; // user_joined (bob)

    bob.send(r#"{"type":"typing"}"#).await;
    let typing = alice.recv().await;
    assert_eq!(typing["type"], "user_typing");
    assert_eq!(typing["username"], "bob");

    // Bob never sees his own typing event; his next inbound event is the
    // message he posts afterwards.
    bob.say("结束了").await;
    let msg = bob.recv().await;
    assert_eq!(msg["type"], "new_message");
    assert_eq!(msg["message"]["content"], "结束了");
}

#[tokio::test]
async fn test_disconnect_broadcasts_user_left() {
    let addr = start_server().await;
    let mut alice = TestClient::connect(addr).await;
    alice.join("alice").await;
    alice.recv().await;
    alice.recv().await;

    let mut bob = TestClient::connect(addr).await;
    bob.join("bob").await;
    bob.recv().await;
    bob.recv().await;
    alice.recv().await; // user_joined (bob)

    drop(bob);

    let left = alice.recv().await;
    assert_eq!(left["type"], "user_left");
    assert_eq!(left["username"], "bob");
    assert_eq!(left["users"], serde_json::json!(["alice"]));
}
