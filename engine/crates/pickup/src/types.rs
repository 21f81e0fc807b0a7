use std::fmt;

use serde::{Deserialize, Serialize};

/// Games that can take part in a multiworld session.
///
/// Variant order is part of the pickup wire format; append only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GameId {
    MetroidPrime,
    MetroidPrimeEchoes,
    MetroidPrimeCorruption,
    SuperMetroid,
    MetroidDread,
    CaveStory,
}

impl GameId {
    pub fn short_name(self) -> &'static str {
        match self {
            Self::MetroidPrime => "prime1",
            Self::MetroidPrimeEchoes => "prime2",
            Self::MetroidPrimeCorruption => "prime3",
            Self::SuperMetroid => "super_metroid",
            Self::MetroidDread => "dread",
            Self::CaveStory => "cave_story",
        }
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// Variant order is part of the pickup wire format; append only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemCategory {
    Visor,
    Suit,
    Beam,
    Charge,
    Morph,
    Movement,
    MissileRelated,
    BeamRelated,
    MorphRelated,
    EnergyTank,
    Key,
    TempleKey,
    SkyTempleKey,
    Expansion,
    Etm,
}

/// In-game model shown for a pickup, possibly from a different game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickupModel {
    pub game: GameId,
    pub name: String,
}

/// A pickup sent by another player, resolved against the receiving game's
/// resource database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickupEntry {
    pub name: String,
    pub model: PickupModel,
    pub item_category: ItemCategory,
    pub broad_category: ItemCategory,
    /// Items granted, by short name, with quantities.
    pub progression: Vec<(String, u32)>,
}
