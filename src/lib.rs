//! Brew assistant: a coffee and matcha chat assistant with a layered reply
//! chain (remote concierge, on-device model, rule-based guide) and the
//! concierge HTTP service that backs it.

pub mod classify;
pub mod concierge;
pub mod config;
pub mod error;
pub mod guide;
pub mod llm;
pub mod quality;
pub mod remote;
pub mod resolver;
pub mod routes;
pub mod session;
pub mod strategy;

#[cfg(test)]
pub(crate) mod testing;
