//! The 川小农 assistant - deterministic, rule-based reply generation.

pub mod responder;

pub use responder::{ASSISTANT_NAME, RespondContext, respond};
