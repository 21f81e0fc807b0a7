pub mod codec;
pub mod database;
pub mod error;
pub mod types;

pub use codec::PostcardPickupCodec;
pub use database::{ItemResource, ResourceDatabase, ResourceDatabases};
pub use error::{DecodeError, EncodeError};
pub use types::{GameId, ItemCategory, PickupEntry, PickupModel};

/// Turns a server-delivered pickup payload into a `PickupEntry`.
///
/// Implementations must be deterministic and free of I/O, and must return
/// an error rather than a partially filled entry when `bytes` does not match
/// the encoding expected for `database`'s game.
pub trait PickupDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8], database: &ResourceDatabase) -> Result<PickupEntry, DecodeError>;
}
