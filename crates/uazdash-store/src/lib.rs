//! # uazdash-store
//!
//! Persistent state for the console (SQLite-backed): the key/value config
//! store, the sending-job registry with its change feed, and the audit log.

pub mod audit;
pub mod registry;
pub mod store;
pub mod sync;

pub use audit::AuditLogger;
pub use registry::JobRegistry;
pub use store::Store;
pub use sync::{SyncBus, SyncMessage};
