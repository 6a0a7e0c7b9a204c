//! Per-connection session: reads JSON lines, dispatches events, cleans up
//! presence on disconnect.

use std::sync::Arc;

use chrono::Local;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc};
use tracing::warn;

use crate::assistant::{self, ASSISTANT_NAME, RespondContext};
use crate::server::commands::{self, Command};
use crate::server::event::{ChatMessage, ClientEvent, CommandData, MessageKind, ServerEvent};
use crate::server::room::Room;

fn now_stamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Drive one client connection until it disconnects.
pub async fn run(stream: TcpStream, room: Arc<Mutex<Room>>) {
    let (read_half, mut write_half) = stream.into_split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();

    // Writer task: one JSON line per outbound event.
    let writer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let line = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(e) => {
                    warn!("Failed to encode event: {e}");
                    continue;
                }
            };
            if write_half.write_all(line.as_bytes()).await.is_err()
                || write_half.write_all(b"\n").await.is_err()
            {
                break;
            }
        }
    });

    let mut lines = BufReader::new(read_half).lines();
    let mut username: Option<String> = None;

    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().is_empty() {
            continue;
        }
        let event: ClientEvent = match serde_json::from_str(&line) {
            Ok(event) => event,
            Err(e) => {
                warn!("Bad client event: {e}");
                continue;
            }
        };

        match event {
            ClientEvent::Join { username: name } => {
                // Already joined on this connection; ignore.
                if username.is_some() {
                    continue;
                }
                let mut room = room.lock().await;
                if !room.join(&name, tx.clone()) {
                    let _ = tx.send(ServerEvent::JoinError {
                        message: "用户名已存在".to_string(),
                    });
                    continue;
                }
                // History replay goes only to the new client; the join
                // announcement goes to the whole room, new client included.
                let _ = tx.send(ServerEvent::History { messages: room.history() });
                room.broadcast(&ServerEvent::UserJoined {
                    username: name.clone(),
                    users: room.usernames(),
                });
                username = Some(name);
            }
            ClientEvent::SendMessage { message } => {
                let Some(ref name) = username else { continue };
                handle_chat(&room, name, &message).await;
            }
            ClientEvent::Typing => {
                let Some(ref name) = username else { continue };
                let room = room.lock().await;
                room.broadcast_except(name, &ServerEvent::UserTyping { username: name.clone() });
            }
            ClientEvent::StopTyping => {
                let Some(ref name) = username else { continue };
                let room = room.lock().await;
                room.broadcast_except(
                    name,
                    &ServerEvent::UserStoppedTyping { username: name.clone() },
                );
            }
        }
    }

    if let Some(name) = username {
        let mut room = room.lock().await;
        room.leave(&name);
        room.broadcast(&ServerEvent::UserLeft {
            username: name,
            users: room.usernames(),
        });
    }

    drop(tx);
    let _ = writer.await;
}

/// Process one chat message: command handling, assistant reply, history,
/// broadcast and mention alerts, all under a single room lock.
async fn handle_chat(room: &Arc<Mutex<Room>>, username: &str, text: &str) {
    let timestamp = now_stamp();
    let mut room = room.lock().await;

    let (kind, command_data, assistant_reply) = match commands::parse_command(text) {
        Some(Command::Movie { url }) => {
            (MessageKind::Movie, Some(CommandData::Movie { url }), None)
        }
        Some(Command::Assistant { query }) => {
            let ctx = RespondContext {
                now: Local::now(),
                online_users: room.online_count(),
            };
            let reply = assistant::respond(&query, &ctx);
            (
                MessageKind::AiQuery,
                Some(CommandData::Query { query }),
                Some(reply),
            )
        }
        None => (MessageKind::Text, None, None),
    };

    // The assistant's reply is recorded and broadcast ahead of the message
    // that triggered it.
    if let Some(reply) = assistant_reply {
        let ai_msg = ChatMessage {
            kind: MessageKind::AiResponse,
            username: ASSISTANT_NAME.to_string(),
            content: reply,
            timestamp: timestamp.clone(),
            mentions: vec![],
            command_data: None,
        };
        room.push_history(ai_msg.clone());
        room.broadcast(&ServerEvent::NewMessage { message: ai_msg });
    }

    let mentions = commands::extract_mentions(text, |name| room.contains(name));
    let msg = ChatMessage {
        kind,
        username: username.to_string(),
        content: text.to_string(),
        timestamp,
        mentions: mentions.clone(),
        command_data,
    };
    room.push_history(msg.clone());
    room.broadcast(&ServerEvent::NewMessage { message: msg });

    for mentioned in &mentions {
        room.send_to(
            mentioned,
            ServerEvent::MentionAlert {
                from_user: username.to_string(),
                message: text.to_string(),
            },
        );
    }
}
