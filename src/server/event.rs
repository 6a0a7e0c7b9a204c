//! Wire events for the newline-delimited JSON chat protocol.
//!
//! Each line on the socket is one JSON object, tagged with a `type` field.
//! Clients send [`ClientEvent`]s; the server answers with [`ServerEvent`]s.

use serde::{Deserialize, Serialize};

/// Events a client may send.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Claim a username and enter the room.
    Join { username: String },
    /// Post a message to the room.
    SendMessage { message: String },
    /// The user started typing.
    Typing,
    /// The user stopped typing.
    StopTyping,
}

/// Kind of a chat message after command processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    Movie,
    AiQuery,
    AiResponse,
}

/// Extra payload carried by command messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandData {
    Movie { url: String },
    Query { query: String },
}

/// A chat message as stored in history and broadcast to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub kind: MessageKind,
    pub username: String,
    pub content: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mentions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_data: Option<CommandData>,
}

/// Events the server broadcasts or sends to a single client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// The requested username is already taken.
    JoinError { message: String },
    /// Full history replay, sent once to a joining client.
    History { messages: Vec<ChatMessage> },
    UserJoined { username: String, users: Vec<String> },
    UserLeft { username: String, users: Vec<String> },
    NewMessage { message: ChatMessage },
    /// Targeted notification for an @username mention.
    MentionAlert { from_user: String, message: String },
    UserTyping { username: String },
    UserStoppedTyping { username: String },
}
