use serde::{Deserialize, Serialize};

use crate::database::ResourceDatabase;
use crate::error::{DecodeError, EncodeError};
use crate::types::{GameId, ItemCategory, PickupEntry, PickupModel};
use crate::PickupDecoder;

pub const FORMAT_VERSION: u8 = 1;

/// On-the-wire pickup layout. Progression items are indices into the
/// receiving game's resource database.
#[derive(Debug, Serialize, Deserialize)]
struct WirePickup {
    version: u8,
    game: GameId,
    name: String,
    model_game: GameId,
    model_name: String,
    item_category: ItemCategory,
    broad_category: ItemCategory,
    progression: Vec<(u16, u32)>,
}

/// Postcard-framed pickup codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostcardPickupCodec;

impl PostcardPickupCodec {
    pub fn encode(&self, pickup: &PickupEntry, database: &ResourceDatabase) -> Result<Vec<u8>, EncodeError> {
        let progression = pickup
            .progression
            .iter()
            .map(|(item, quantity)| {
                database
                    .item_index(item)
                    .map(|index| (index, *quantity))
                    .ok_or_else(|| EncodeError::UnknownItem(item.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let wire = WirePickup {
            version: FORMAT_VERSION,
            game: database.game(),
            name: pickup.name.clone(),
            model_game: pickup.model.game,
            model_name: pickup.model.name.clone(),
            item_category: pickup.item_category,
            broad_category: pickup.broad_category,
            progression,
        };
        postcard::to_allocvec(&wire).map_err(|e| EncodeError::Serialization(e.to_string()))
    }
}

impl PickupDecoder for PostcardPickupCodec {
    fn decode(&self, bytes: &[u8], database: &ResourceDatabase) -> Result<PickupEntry, DecodeError> {
        let (wire, rest) = postcard::take_from_bytes::<WirePickup>(bytes)
            .map_err(|e| DecodeError::Malformed(e.to_string()))?;
        if !rest.is_empty() {
            return Err(DecodeError::TrailingBytes(rest.len()));
        }
        if wire.version != FORMAT_VERSION {
            return Err(DecodeError::UnsupportedVersion(wire.version));
        }
        if wire.game != database.game() {
            return Err(DecodeError::GameMismatch {
                expected: database.game(),
                found: wire.game,
            });
        }

        let mut progression = Vec::with_capacity(wire.progression.len());
        for (index, quantity) in wire.progression {
            let item = database.item(index).ok_or(DecodeError::UnknownItem(index))?;
            if quantity > item.max_capacity {
                return Err(DecodeError::QuantityOutOfRange {
                    item: item.short_name.clone(),
                    quantity,
                    capacity: item.max_capacity,
                });
            }
            progression.push((item.short_name.clone(), quantity));
        }

        Ok(PickupEntry {
            name: wire.name,
            model: PickupModel {
                game: wire.model_game,
                name: wire.model_name,
            },
            item_category: wire.item_category,
            broad_category: wire.broad_category,
            progression,
        })
    }
}
