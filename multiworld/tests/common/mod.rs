//! In-process stand-ins for the session server and the game connection.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use multiworld::{ClientConfig, MultiworldClient};
use net::{
    EncodedPickup, GameConnection, GameUpdateTx, GameUpdated, InboundPickup, LocationTx,
    NetworkClient, TransportError,
};
use pickup::{
    DecodeError, GameId, ItemCategory, ItemResource, PickupDecoder, PickupEntry, PickupModel,
    PostcardPickupCodec, ResourceDatabase, ResourceDatabases,
};
use tokio::sync::Notify;

/// Ordered log of listener registrations across both fakes.
pub type Journal = Arc<Mutex<Vec<&'static str>>>;

pub struct FakeNetwork {
    journal: Journal,
    inbox: Mutex<(GameId, Vec<EncodedPickup>)>,
    request_error: Mutex<Option<TransportError>>,
    collect_script: Mutex<VecDeque<Result<(), TransportError>>>,
    collect_calls: Mutex<Vec<Vec<u32>>>,
    collect_gate: Mutex<Option<Arc<Notify>>>,
    listener: Mutex<Option<GameUpdateTx>>,
}

impl FakeNetwork {
    pub fn new(journal: &Journal) -> Arc<Self> {
        Arc::new(Self {
            journal: Arc::clone(journal),
            inbox: Mutex::new((GameId::MetroidPrimeEchoes, Vec::new())),
            request_error: Mutex::new(None),
            collect_script: Mutex::new(VecDeque::new()),
            collect_calls: Mutex::new(Vec::new()),
            collect_gate: Mutex::new(None),
            listener: Mutex::new(None),
        })
    }

    pub fn set_inbox(&self, game: GameId, entries: Vec<EncodedPickup>) {
        *self.inbox.lock().unwrap() = (game, entries);
    }

    pub fn fail_requests(&self, error: Option<TransportError>) {
        *self.request_error.lock().unwrap() = error;
    }

    /// Queue results for upcoming `collect_locations` calls; calls beyond
    /// the script succeed.
    pub fn script_collect(&self, results: Vec<Result<(), TransportError>>) {
        self.collect_script.lock().unwrap().extend(results);
    }

    pub fn fail_collect_always(&self, count: usize) {
        self.script_collect(vec![Err(TransportError::Disconnected); count]);
    }

    /// Make every `collect_locations` call wait on the returned notify
    /// after it has been recorded.
    pub fn gate_collect(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.collect_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    pub fn open_gate(&self) {
        if let Some(gate) = self.collect_gate.lock().unwrap().take() {
            gate.notify_waiters();
            gate.notify_one();
        }
    }

    pub fn collect_calls(&self) -> Vec<Vec<u32>> {
        self.collect_calls.lock().unwrap().clone()
    }

    pub fn has_listener(&self) -> bool {
        self.listener.lock().unwrap().is_some()
    }

    /// Fire the game-updated event as the session server would.
    pub fn notify_game_updated(&self) -> bool {
        match self.listener.lock().unwrap().as_ref() {
            Some(tx) => tx.send(GameUpdated).is_ok(),
            None => false,
        }
    }
}

#[async_trait]
impl NetworkClient for FakeNetwork {
    async fn request_pickups(&self) -> Result<(GameId, Vec<EncodedPickup>), TransportError> {
        if let Some(error) = self.request_error.lock().unwrap().clone() {
            return Err(error);
        }
        Ok(self.inbox.lock().unwrap().clone())
    }

    async fn collect_locations(&self, locations: &[u32]) -> Result<(), TransportError> {
        self.collect_calls.lock().unwrap().push(locations.to_vec());
        let gate = self.collect_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.collect_script.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }

    fn subscribe_game_updated(&self, listener: GameUpdateTx) {
        self.journal.lock().unwrap().push("network:subscribe");
        *self.listener.lock().unwrap() = Some(listener);
    }

    fn unsubscribe_game_updated(&self) {
        self.journal.lock().unwrap().push("network:unsubscribe");
        *self.listener.lock().unwrap() = None;
    }
}

pub struct FakeGame {
    journal: Journal,
    lock_identifier: Option<String>,
    listener: Mutex<Option<LocationTx>>,
    pushes: Mutex<Vec<Vec<InboundPickup>>>,
}

impl FakeGame {
    pub fn new(journal: &Journal, lock_identifier: Option<String>) -> Arc<Self> {
        Arc::new(Self {
            journal: Arc::clone(journal),
            lock_identifier,
            listener: Mutex::new(None),
            pushes: Mutex::new(Vec::new()),
        })
    }

    pub fn has_listener(&self) -> bool {
        self.listener.lock().unwrap().is_some()
    }

    /// Report a collected location as the game memory watcher would.
    pub fn collect(&self, location: u32) -> bool {
        match self.listener.lock().unwrap().as_ref() {
            Some(tx) => tx.send(location).is_ok(),
            None => false,
        }
    }

    pub fn pushes(&self) -> Vec<Vec<InboundPickup>> {
        self.pushes.lock().unwrap().clone()
    }

    pub fn last_push(&self) -> Option<Vec<InboundPickup>> {
        self.pushes.lock().unwrap().last().cloned()
    }
}

impl GameConnection for FakeGame {
    fn lock_identifier(&self) -> Option<String> {
        self.lock_identifier.clone()
    }

    fn set_location_collected_listener(&self, listener: Option<LocationTx>) {
        let entry = if listener.is_some() { "game:listen" } else { "game:unlisten" };
        self.journal.lock().unwrap().push(entry);
        *self.listener.lock().unwrap() = listener;
    }

    fn set_permanent_pickups(&self, pickups: Vec<InboundPickup>) {
        self.pushes.lock().unwrap().push(pickups);
    }
}

/// Decoder that records every call and resolves the payload text as the
/// pickup name. The payload `corrupt` fails.
#[derive(Default)]
pub struct RecordingDecoder {
    calls: Mutex<Vec<(Vec<u8>, GameId)>>,
}

impl RecordingDecoder {
    pub fn calls(&self) -> Vec<(Vec<u8>, GameId)> {
        self.calls.lock().unwrap().clone()
    }
}

impl PickupDecoder for RecordingDecoder {
    fn decode(&self, bytes: &[u8], database: &ResourceDatabase) -> Result<PickupEntry, DecodeError> {
        self.calls.lock().unwrap().push((bytes.to_vec(), database.game()));
        if bytes == b"corrupt" {
            return Err(DecodeError::Malformed("corrupt".to_string()));
        }
        Ok(named_pickup(&String::from_utf8_lossy(bytes)))
    }
}

pub fn echoes_db() -> ResourceDatabase {
    ResourceDatabase::new(
        GameId::MetroidPrimeEchoes,
        vec![
            ItemResource::new("Missile", "Missile", 250),
            ItemResource::new("DarkBeam", "Dark Beam", 1),
            ItemResource::new("EnergyTransferModule", "Energy Transfer Module", 1),
        ],
    )
}

pub fn corruption_db() -> ResourceDatabase {
    ResourceDatabase::new(
        GameId::MetroidPrimeCorruption,
        vec![ItemResource::new("Missile", "Missile", 100)],
    )
}

pub fn databases() -> ResourceDatabases {
    ResourceDatabases::new().with(echoes_db()).with(corruption_db())
}

pub fn named_pickup(name: &str) -> PickupEntry {
    PickupEntry {
        name: name.to_string(),
        model: PickupModel {
            game: GameId::MetroidPrimeEchoes,
            name: "EnergyTransferModule".to_string(),
        },
        item_category: ItemCategory::Movement,
        broad_category: ItemCategory::Movement,
        progression: vec![],
    }
}

pub fn encoded(name: &str) -> Vec<u8> {
    PostcardPickupCodec.encode(&named_pickup(name), &echoes_db()).unwrap()
}

pub fn fast_config() -> ClientConfig {
    let mut config = ClientConfig::default();
    config.retry.initial_delay_ms = 1;
    config.retry.max_delay_ms = 5;
    config
}

/// Client wired to fresh fakes and the postcard codec.
pub struct Harness {
    pub journal: Journal,
    pub network: Arc<FakeNetwork>,
    pub game: Arc<FakeGame>,
    pub client: MultiworldClient,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_lock(None, fast_config())
    }

    pub fn with_config(config: ClientConfig) -> Self {
        Self::with_lock(None, config)
    }

    pub fn with_lock(lock_identifier: Option<String>, config: ClientConfig) -> Self {
        Self::build(lock_identifier, config, Arc::new(PostcardPickupCodec))
    }

    pub fn with_decoder(decoder: Arc<dyn PickupDecoder>) -> Self {
        Self::build(None, fast_config(), decoder)
    }

    fn build(
        lock_identifier: Option<String>,
        config: ClientConfig,
        decoder: Arc<dyn PickupDecoder>,
    ) -> Self {
        let journal: Journal = Arc::new(Mutex::new(Vec::new()));
        let network = FakeNetwork::new(&journal);
        let game = FakeGame::new(&journal, lock_identifier);
        let client =
            MultiworldClient::new(network.clone(), game.clone(), decoder, databases(), config)
                .unwrap();
        Self {
            journal,
            network,
            game,
            client,
        }
    }

    pub fn journal(&self) -> Vec<&'static str> {
        self.journal.lock().unwrap().clone()
    }
}

pub fn write_state(path: &Path, collected: &[u32], uploaded: &[u32]) {
    let json = serde_json::json!({
        "collected_locations": collected,
        "uploaded_locations": uploaded,
        "latest_message_displayed": 0,
    });
    std::fs::write(path, serde_json::to_vec(&json).unwrap()).unwrap();
}

pub fn read_state(path: &Path) -> serde_json::Value {
    serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
}

/// Poll `condition` until it holds, panicking after two seconds.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..2000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("condition not reached within 2s");
}
