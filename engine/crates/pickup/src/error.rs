use crate::types::GameId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed pickup payload: {0}")]
    Malformed(String),

    #[error("{0} trailing bytes after pickup payload")]
    TrailingBytes(usize),

    #[error("unsupported pickup format version {0}")]
    UnsupportedVersion(u8),

    #[error("pickup encoded for {found}, database is for {expected}")]
    GameMismatch { expected: GameId, found: GameId },

    #[error("item index {0} not in resource database")]
    UnknownItem(u16),

    #[error("quantity {quantity} exceeds capacity {capacity} of {item}")]
    QuantityOutOfRange {
        item: String,
        quantity: u32,
        capacity: u32,
    },

    #[error("no resource database for {0}")]
    UnknownGame(GameId),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    #[error("item {0} not in resource database")]
    UnknownItem(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}
