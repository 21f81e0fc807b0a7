//! Interfaces of the collaborators the multiworld client talks to: the
//! session server transport and the in-process game connection.

pub mod channels;
pub mod game_connection;
pub mod transport;

pub use channels::{GameUpdateRx, GameUpdateTx, GameUpdated, LocationRx, LocationTx};
pub use game_connection::{GameConnection, InboundPickup};
pub use transport::{EncodedPickup, NetworkClient, TransportError};
