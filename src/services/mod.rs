// Service exports
pub mod memory;
pub mod store;
pub mod transport;

pub use memory::MemoryStore;
pub use store::{PostgresStore, ProfileStore, StoreError};
pub use transport::{broadcast, BroadcastOutcome, Transport, TransportError, WebhookTransport};
