//! 川小农 chat room server: a JSON-lines chat transport with a deterministic
//! rule-based assistant.

pub mod assistant;
pub mod config;
pub mod server;
