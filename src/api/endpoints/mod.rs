//! HTTP endpoint handlers.

pub mod export;
pub mod health;
pub mod verify;
