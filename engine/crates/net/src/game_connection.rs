use pickup::PickupEntry;

use crate::channels::LocationTx;

/// A pickup received from another player, labelled with the message the
/// server attached to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundPickup {
    pub label: String,
    pub pickup: PickupEntry,
}

impl InboundPickup {
    pub fn new(label: impl Into<String>, pickup: PickupEntry) -> Self {
        Self {
            label: label.into(),
            pickup,
        }
    }
}

/// The running game process, as seen by the multiworld client.
pub trait GameConnection: Send + Sync {
    /// Identifier for the single-instance lock; `None` disables locking.
    fn lock_identifier(&self) -> Option<String>;

    /// Install (`Some`) or remove (`None`) the location-collected listener.
    fn set_location_collected_listener(&self, listener: Option<LocationTx>);

    /// Replace the set of pickups the game should hold permanently.
    fn set_permanent_pickups(&self, pickups: Vec<InboundPickup>);
}
