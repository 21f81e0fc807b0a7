pub mod error;
pub mod record;
pub mod sync_state;

pub use error::PersistenceError;
pub use record::CollectionRecord;
pub use sync_state::{CorruptStatePolicy, SyncState};
