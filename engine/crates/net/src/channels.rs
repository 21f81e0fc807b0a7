use tokio::sync::mpsc;

/// The session server reports that this player's game changed (new
/// pickups may be waiting).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameUpdated;

/// Sender handed to the game connection; carries collected location indices.
pub type LocationTx = mpsc::UnboundedSender<u32>;
/// Receiver drained by the client's event pump.
pub type LocationRx = mpsc::UnboundedReceiver<u32>;

/// Sender handed to the network client for game update notifications.
pub type GameUpdateTx = mpsc::UnboundedSender<GameUpdated>;
pub type GameUpdateRx = mpsc::UnboundedReceiver<GameUpdated>;
