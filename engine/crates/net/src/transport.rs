use async_trait::async_trait;
use pickup::GameId;

use crate::channels::GameUpdateTx;

/// One inbox entry as delivered by the server: a message label and the
/// encoded pickup.
pub type EncodedPickup = (String, Vec<u8>);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("not connected to the session server")]
    Disconnected,

    #[error("request rejected by server: {0}")]
    Rejected(String),

    #[error("transport error: {0}")]
    Other(String),
}

/// Request/response access to the multiworld session server.
#[async_trait]
pub trait NetworkClient: Send + Sync {
    /// Full inbox for this player: the local game's identity and every
    /// pickup sent to it, in delivery order.
    async fn request_pickups(&self) -> Result<(GameId, Vec<EncodedPickup>), TransportError>;

    /// Report locations collected in the local game.
    async fn collect_locations(&self, locations: &[u32]) -> Result<(), TransportError>;

    /// Install the single game-updated listener, replacing any previous one.
    fn subscribe_game_updated(&self, listener: GameUpdateTx);

    fn unsubscribe_game_updated(&self);
}
