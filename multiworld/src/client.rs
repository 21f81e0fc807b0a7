use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use instance_lock::InstanceLock;
use net::{GameConnection, GameUpdateRx, GameUpdated, InboundPickup, LocationRx, NetworkClient};
use observability::UploadMetrics;
use persistence::{CollectionRecord, SyncState};
use pickup::{DecodeError, PickupDecoder, ResourceDatabases};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::shutdown::{shutdown_channel, ShutdownRx, ShutdownTx};

/// Lifecycle of a `MultiworldClient`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

type UploadHandle = JoinHandle<Result<(), ClientError>>;

/// Durable record plus the upload-task flag. Both live under one mutex so
/// an upload task that finds nothing pending and a collect event that adds
/// a location can never both conclude the other will upload it.
#[derive(Default)]
struct Tracker {
    data: Option<SyncState>,
    upload_active: bool,
    shutdown: Option<ShutdownRx>,
}

/// State shared with the event pump and the upload task.
struct Shared {
    network: Arc<dyn NetworkClient>,
    game: Arc<dyn GameConnection>,
    decoder: Arc<dyn PickupDecoder>,
    databases: ResourceDatabases,
    config: ClientConfig,
    tracker: Mutex<Tracker>,
    received: Mutex<Vec<InboundPickup>>,
    upload: Mutex<Option<UploadHandle>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn received_pickups(&self) -> Vec<InboundPickup> {
        lock(&self.received).clone()
    }

    async fn refresh_received_pickups(&self) -> Result<(), ClientError> {
        let (game, entries) = self.network.request_pickups().await?;
        let database = self.databases.get(game)?;

        let pickups = entries
            .into_iter()
            .map(|(label, bytes)| {
                let pickup = self.decoder.decode(&bytes, &database)?;
                Ok(InboundPickup::new(label, pickup))
            })
            .collect::<Result<Vec<_>, DecodeError>>()?;

        let mut received = lock(&self.received);
        for inbound in pickups.iter().skip(received.len()) {
            tracing::info!(label = %inbound.label, pickup = %inbound.pickup.name, "Pickup received");
        }
        tracing::debug!(game = %game, count = pickups.len(), "Received pickups refreshed");
        *received = pickups;
        Ok(())
    }

    async fn on_network_game_updated(&self) -> Result<(), ClientError> {
        self.refresh_received_pickups().await?;
        self.game.set_permanent_pickups(self.received_pickups());
        Ok(())
    }

    fn on_location_collected(self: &Arc<Self>, location: u32) -> Result<bool, ClientError> {
        let mut tracker = lock(&self.tracker);
        let data = tracker.data.as_mut().ok_or(ClientError::NotStarted)?;
        if !data.mark_collected(location)? {
            tracing::debug!(location, "Location already collected");
            return Ok(false);
        }
        tracing::info!(location, "Location collected");
        Ok(self.schedule_upload(&mut tracker))
    }

    /// Spawn the upload task unless one is already active. The caller holds
    /// the tracker lock.
    fn schedule_upload(self: &Arc<Self>, tracker: &mut Tracker) -> bool {
        if tracker.upload_active {
            return false;
        }
        let Some(shutdown) = tracker.shutdown.clone() else {
            return false;
        };
        tracker.upload_active = true;
        let handle = tokio::spawn(Arc::clone(self).run_upload(shutdown));
        *lock(&self.upload) = Some(handle);
        true
    }

    /// Pending locations, or `None` after clearing the active flag when
    /// there is nothing left to send.
    fn next_pending(&self) -> Option<Vec<u32>> {
        let mut tracker = lock(&self.tracker);
        let pending = tracker
            .data
            .as_ref()
            .map(SyncState::pending_locations)
            .unwrap_or_default();
        if pending.is_empty() {
            tracker.upload_active = false;
            return None;
        }
        Some(pending)
    }

    fn mark_uploaded(&self, locations: &[u32]) -> Result<(), ClientError> {
        let mut tracker = lock(&self.tracker);
        if let Some(data) = tracker.data.as_mut() {
            data.mark_uploaded(locations)?;
        }
        Ok(())
    }

    fn finish_upload(&self) {
        lock(&self.tracker).upload_active = false;
    }

    /// Upload collected locations until none are pending.
    ///
    /// Each attempt sends the pending set as it is at that moment, so
    /// locations collected while a call was in flight or backing off ride
    /// along on the next attempt. A shutdown signal drops the in-flight
    /// call and records nothing.
    async fn run_upload(self: Arc<Self>, mut shutdown: ShutdownRx) -> Result<(), ClientError> {
        let started = Instant::now();
        let mut metrics = UploadMetrics::default();
        let mut backoff = self.config.to_backoff();
        let max_attempts = self.config.retry.max_attempts;

        let result = loop {
            if shutdown.is_shutdown() {
                break Err(ClientError::UploadCancelled);
            }
            let Some(pending) = self.next_pending() else {
                break Ok(());
            };

            let outcome = tokio::select! {
                _ = shutdown.wait() => break Err(ClientError::UploadCancelled),
                outcome = self.network.collect_locations(&pending) => outcome,
            };

            match outcome {
                Ok(()) => {
                    metrics.record_attempt(Some(pending.len()));
                    backoff.reset();
                    if let Err(e) = self.mark_uploaded(&pending) {
                        break Err(e);
                    }
                    tracing::info!(locations = ?pending, "Locations uploaded");
                }
                Err(e) => {
                    metrics.record_attempt(None);
                    let delay = backoff.next_delay();
                    if max_attempts > 0 && backoff.failures() >= max_attempts {
                        tracing::error!(error = %e, attempts = backoff.failures(), "Giving up on location upload");
                        break Err(ClientError::UploadAbandoned {
                            attempts: backoff.failures(),
                        });
                    }
                    tracing::warn!(
                        error = %e,
                        locations = ?pending,
                        retry_in = ?delay,
                        "Location upload failed, retrying"
                    );
                    tokio::select! {
                        _ = shutdown.wait() => break Err(ClientError::UploadCancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        };

        if result.is_err() {
            self.finish_upload();
        }
        if metrics.attempts > 0 {
            metrics.duration_us = started.elapsed().as_micros();
            metrics.log();
        }
        result
    }
}

/// Dispatches location and game-update notifications until shutdown.
async fn run_event_pump(
    shared: Arc<Shared>,
    mut location_rx: LocationRx,
    mut update_rx: GameUpdateRx,
    mut shutdown: ShutdownRx,
) {
    loop {
        tokio::select! {
            _ = shutdown.wait() => break,
            Some(location) = location_rx.recv() => {
                if let Err(e) = shared.on_location_collected(location) {
                    tracing::error!(location, "Failed to record collected location: {}", e);
                }
            }
            Some(GameUpdated) = update_rx.recv() => {
                // A refresh fetches the whole inbox, so queued notifications collapse into one.
                while update_rx.try_recv().is_ok() {}
                tokio::select! {
                    _ = shutdown.wait() => break,
                    result = shared.on_network_game_updated() => {
                        if let Err(e) = result {
                            tracing::error!("Failed to apply game update: {}", e);
                        }
                    }
                }
            }
            else => break,
        }
    }
    tracing::debug!("Multiworld event pump stopped");
}

/// Synchronizes one local game with a multiworld session.
///
/// The single-instance lock is taken at construction, so a second client
/// for the same game slot fails before touching any state.
pub struct MultiworldClient {
    shared: Arc<Shared>,
    lock: InstanceLock,
    lock_identifier: Option<String>,
    state: ClientState,
    shutdown: Option<ShutdownTx>,
    pump: Option<JoinHandle<()>>,
}

impl MultiworldClient {
    pub fn new(
        network: Arc<dyn NetworkClient>,
        game: Arc<dyn GameConnection>,
        decoder: Arc<dyn PickupDecoder>,
        databases: ResourceDatabases,
        config: ClientConfig,
    ) -> Result<Self, ClientError> {
        let lock_identifier = game.lock_identifier().filter(|id| !id.is_empty());
        let lock = InstanceLock::acquire(lock_identifier.as_deref())?;

        Ok(Self {
            shared: Arc::new(Shared {
                network,
                game,
                decoder,
                databases,
                config,
                tracker: Mutex::new(Tracker::default()),
                received: Mutex::new(Vec::new()),
                upload: Mutex::new(None),
            }),
            lock,
            lock_identifier,
            state: ClientState::Stopped,
            shutdown: None,
            pump: None,
        })
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    fn expect_state(&self, expected: ClientState) -> Result<(), ClientError> {
        if self.state != expected {
            return Err(ClientError::InvalidState {
                expected,
                actual: self.state,
            });
        }
        Ok(())
    }

    /// Load the sync state at `data_file_path`, fetch the inbox, start
    /// listening for game and server events, and hand the inbox to the game.
    ///
    /// On failure the client is back in `Stopped` and `start` may be retried.
    pub async fn start(&mut self, data_file_path: impl Into<PathBuf>) -> Result<(), ClientError> {
        self.expect_state(ClientState::Stopped)?;
        self.state = ClientState::Starting;

        match self.start_inner(data_file_path.into()).await {
            Ok(()) => {
                self.state = ClientState::Running;
                tracing::info!("Multiworld client running");
                Ok(())
            }
            Err(e) => {
                *lock(&self.shared.tracker) = Tracker::default();
                self.state = ClientState::Stopped;
                tracing::error!("Multiworld client failed to start: {}", e);
                Err(e)
            }
        }
    }

    async fn start_inner(&mut self, data_file_path: PathBuf) -> Result<(), ClientError> {
        if !self.lock.is_held() && self.lock_identifier.is_some() {
            self.lock = InstanceLock::acquire(self.lock_identifier.as_deref())?;
        }

        let data = SyncState::open(data_file_path, self.shared.config.state.on_corrupt)?;
        let (shutdown_tx, shutdown_rx) = shutdown_channel();
        {
            let mut tracker = lock(&self.shared.tracker);
            tracker.data = Some(data);
            tracker.upload_active = false;
            tracker.shutdown = Some(shutdown_rx.clone());
        }

        // The inbox must be known before any event is handled.
        self.shared.refresh_received_pickups().await?;

        let (location_tx, location_rx) = mpsc::unbounded_channel();
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        self.shared.game.set_location_collected_listener(Some(location_tx));
        self.shared.network.subscribe_game_updated(update_tx);
        self.pump = Some(tokio::spawn(run_event_pump(
            Arc::clone(&self.shared),
            location_rx,
            update_rx,
            shutdown_rx,
        )));

        self.shared.game.set_permanent_pickups(self.shared.received_pickups());
        self.shutdown = Some(shutdown_tx);

        let mut tracker = lock(&self.shared.tracker);
        let pending = tracker
            .data
            .as_ref()
            .map(|data| data.pending_locations().len())
            .unwrap_or(0);
        if pending > 0 {
            tracing::info!(pending, "Resuming upload of locations from a previous session");
            self.shared.schedule_upload(&mut tracker);
        }
        Ok(())
    }

    /// Detach from the game and server, abandon any in-flight upload, clear
    /// the game's pickups and release the instance lock.
    ///
    /// Every step runs even if an earlier one failed; failures are reported
    /// together as `ClientError::Shutdown`.
    pub async fn stop(&mut self) -> Result<(), ClientError> {
        self.expect_state(ClientState::Running)?;
        self.state = ClientState::Stopping;
        let mut failures = Vec::new();

        self.shared.game.set_location_collected_listener(None);
        self.shared.network.unsubscribe_game_updated();

        if let Some(shutdown) = self.shutdown.take() {
            shutdown.trigger();
        }
        if let Some(pump) = self.pump.take() {
            if let Err(e) = pump.await {
                failures.push(format!("event pump: {e}"));
            }
        }
        let upload = lock(&self.shared.upload).take();
        if let Some(upload) = upload {
            match upload.await {
                Ok(Ok(())) | Ok(Err(ClientError::UploadCancelled)) => {}
                Ok(Err(e)) => tracing::warn!("Location upload ended with error: {}", e),
                Err(e) => failures.push(format!("upload task: {e}")),
            }
        }

        *lock(&self.shared.tracker) = Tracker::default();
        lock(&self.shared.received).clear();
        self.shared.game.set_permanent_pickups(Vec::new());

        if let Err(e) = self.lock.release() {
            failures.push(format!("instance lock: {e}"));
        }

        self.state = ClientState::Stopped;
        if failures.is_empty() {
            tracing::info!("Multiworld client stopped");
            Ok(())
        } else {
            let message = failures.join("; ");
            tracing::error!("Multiworld client stopped with errors: {}", message);
            Err(ClientError::Shutdown(message))
        }
    }

    /// Record a location visited in the local game.
    ///
    /// Returns `true` if this call started the upload task. Must be called
    /// from within a Tokio runtime.
    pub fn on_location_collected(&self, location: u32) -> Result<bool, ClientError> {
        self.shared.on_location_collected(location)
    }

    /// Replace the received-pickup cache with the server's full inbox. A
    /// payload that fails to decode aborts the refresh and leaves the cache
    /// as it was.
    pub async fn refresh_received_pickups(&self) -> Result<(), ClientError> {
        self.shared.refresh_received_pickups().await
    }

    pub async fn on_network_game_updated(&self) -> Result<(), ClientError> {
        self.shared.on_network_game_updated().await
    }

    /// Make sure pending locations are being uploaded and wait for the
    /// upload task to settle.
    pub async fn notify_collect_locations(&self) -> Result<(), ClientError> {
        {
            let mut tracker = lock(&self.shared.tracker);
            if tracker.data.is_none() {
                return Err(ClientError::NotStarted);
            }
            self.shared.schedule_upload(&mut tracker);
        }
        self.flush_uploads().await
    }

    /// Wait for the current upload task, if any, and return its outcome.
    pub async fn flush_uploads(&self) -> Result<(), ClientError> {
        let handle = lock(&self.shared.upload).take();
        match handle {
            Some(handle) => handle.await.map_err(|e| ClientError::Task(e.to_string()))?,
            None => Ok(()),
        }
    }

    pub fn is_upload_active(&self) -> bool {
        lock(&self.shared.tracker).upload_active
    }

    pub fn received_pickups(&self) -> Vec<InboundPickup> {
        self.shared.received_pickups()
    }

    /// Snapshot of the durable record, if the client is started.
    pub fn record(&self) -> Option<CollectionRecord> {
        lock(&self.shared.tracker)
            .data
            .as_ref()
            .map(|data| data.record().clone())
    }

    /// Received pickups the player has not been shown yet.
    pub fn unseen_pickups(&self) -> Result<Vec<InboundPickup>, ClientError> {
        let cursor = lock(&self.shared.tracker)
            .data
            .as_ref()
            .map(SyncState::latest_message_displayed)
            .ok_or(ClientError::NotStarted)?;
        let skip = usize::try_from(cursor).unwrap_or(usize::MAX);
        Ok(lock(&self.shared.received).iter().skip(skip).cloned().collect())
    }

    /// Mark every received pickup as shown and persist the cursor.
    pub fn mark_pickups_displayed(&self) -> Result<(), ClientError> {
        let count = lock(&self.shared.received).len() as u64;
        let mut tracker = lock(&self.shared.tracker);
        let data = tracker.data.as_mut().ok_or(ClientError::NotStarted)?;
        data.set_latest_message_displayed(count)?;
        Ok(())
    }
}

impl Drop for MultiworldClient {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            tracing::warn!("Multiworld client dropped while running");
            self.shared.game.set_location_collected_listener(None);
            self.shared.network.unsubscribe_game_updated();
            shutdown.trigger();
        }
    }
}
