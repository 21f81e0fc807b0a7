//! Keeps a local game and a multiworld session server in agreement about
//! collected locations and received pickups.

pub mod client;
pub mod config;
pub mod error;
pub mod retry;
pub mod shutdown;

pub use client::{ClientState, MultiworldClient};
pub use config::ClientConfig;
pub use error::ClientError;
