//! Session persistence.
//! The store keeps at most one serialized record per `SessionKey`, written only
//! by the authority of that key.

pub mod kv;

pub use kv::{KvSessionStore, PersistenceSettings, SessionStore, StoreSettings};
