use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::types::GameId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemResource {
    pub short_name: String,
    pub long_name: String,
    pub max_capacity: u32,
}

impl ItemResource {
    pub fn new(short_name: impl Into<String>, long_name: impl Into<String>, max_capacity: u32) -> Self {
        Self {
            short_name: short_name.into(),
            long_name: long_name.into(),
            max_capacity,
        }
    }
}

/// Item resources of one game. Pickup payloads refer to items by their
/// position in `items`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDatabase {
    game: GameId,
    items: Vec<ItemResource>,
}

impl ResourceDatabase {
    pub fn new(game: GameId, items: Vec<ItemResource>) -> Self {
        Self { game, items }
    }

    pub fn game(&self) -> GameId {
        self.game
    }

    pub fn items(&self) -> &[ItemResource] {
        &self.items
    }

    pub fn item(&self, index: u16) -> Option<&ItemResource> {
        self.items.get(usize::from(index))
    }

    pub fn item_index(&self, short_name: &str) -> Option<u16> {
        self.items
            .iter()
            .position(|item| item.short_name == short_name)
            .and_then(|index| u16::try_from(index).ok())
    }
}

/// Resource databases keyed by game, used to pick the database matching
/// the game identity reported by the session server.
#[derive(Debug, Clone, Default)]
pub struct ResourceDatabases {
    by_game: HashMap<GameId, Arc<ResourceDatabase>>,
}

impl ResourceDatabases {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a database, replacing any previous one for the same game.
    pub fn insert(&mut self, database: ResourceDatabase) {
        self.by_game.insert(database.game(), Arc::new(database));
    }

    pub fn with(mut self, database: ResourceDatabase) -> Self {
        self.insert(database);
        self
    }

    pub fn get(&self, game: GameId) -> Result<Arc<ResourceDatabase>, DecodeError> {
        self.by_game
            .get(&game)
            .cloned()
            .ok_or(DecodeError::UnknownGame(game))
    }

    pub fn len(&self) -> usize {
        self.by_game.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_game.is_empty()
    }
}
