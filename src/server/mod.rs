//! Chat room transport: presence, bounded history and broadcast fan-out.

pub mod commands;
pub mod event;
pub mod room;
pub mod session;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::{info, warn};

use room::Room;

/// Accept connections forever, one session task per client.
pub async fn run(listener: TcpListener, room: Arc<Mutex<Room>>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!("Client connected: {addr}");
                tokio::spawn(session::run(stream, room.clone()));
            }
            Err(e) => warn!("Accept failed: {e}"),
        }
    }
}
