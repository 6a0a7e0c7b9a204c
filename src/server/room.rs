//! Single-owner presence registry and bounded history buffer.
//!
//! All mutation happens through one `Room` value behind an async mutex, so a
//! registry/history update and the broadcast it causes are atomic with
//! respect to other incoming events.

use std::collections::VecDeque;

use tokio::sync::mpsc;
use tracing::info;

use crate::server::event::{ChatMessage, ServerEvent};

/// Per-connection outbound channel. The writer task on the other end turns
/// events into JSON lines.
pub type Outbound = mpsc::UnboundedSender<ServerEvent>;

struct UserHandle {
    tx: Outbound,
}

/// The chat room: who is connected plus the recent-message buffer.
pub struct Room {
    /// Insertion-ordered so the user list reads in arrival order.
    users: Vec<(String, UserHandle)>,
    history: VecDeque<ChatMessage>,
    max_history: usize,
}

impl Room {
    pub fn new(max_history: usize) -> Self {
        Self {
            users: Vec::new(),
            history: VecDeque::new(),
            max_history,
        }
    }

    /// Register a user. Returns false when the name is already taken.
    pub fn join(&mut self, username: &str, tx: Outbound) -> bool {
        if self.contains(username) {
            return false;
        }
        self.users.push((username.to_string(), UserHandle { tx }));
        info!("{username} joined ({} online)", self.users.len());
        true
    }

    /// Remove a user. Returns false when they were not present.
    pub fn leave(&mut self, username: &str) -> bool {
        let before = self.users.len();
        self.users.retain(|(name, _)| name != username);
        let removed = self.users.len() < before;
        if removed {
            info!("{username} left ({} online)", self.users.len());
        }
        removed
    }

    pub fn contains(&self, username: &str) -> bool {
        self.users.iter().any(|(name, _)| name == username)
    }

    pub fn online_count(&self) -> usize {
        self.users.len()
    }

    /// Usernames in arrival order.
    pub fn usernames(&self) -> Vec<String> {
        self.users.iter().map(|(name, _)| name.clone()).collect()
    }

    /// Append to history, evicting the oldest entry past the cap.
    pub fn push_history(&mut self, msg: ChatMessage) {
        self.history.push_back(msg);
        if self.history.len() > self.max_history {
            self.history.pop_front();
        }
    }

    pub fn history(&self) -> Vec<ChatMessage> {
        self.history.iter().cloned().collect()
    }

    /// Fan an event out to every connected user. Send failures mean the
    /// session is already gone; its disconnect path cleans up the entry.
    pub fn broadcast(&self, event: &ServerEvent) {
        for (_, handle) in &self.users {
            let _ = handle.tx.send(event.clone());
        }
    }

    /// Fan out to everyone except one user (typing relays skip the sender).
    pub fn broadcast_except(&self, skip: &str, event: &ServerEvent) {
        for (name, handle) in &self.users {
            if name != skip {
                let _ = handle.tx.send(event.clone());
            }
        }
    }

    /// Deliver an event to a single user. Returns false if they are offline.
    pub fn send_to(&self, username: &str, event: ServerEvent) -> bool {
        match self.users.iter().find(|(name, _)| name == username) {
            Some((_, handle)) => handle.tx.send(event).is_ok(),
            None => false,
        }
    }
}
