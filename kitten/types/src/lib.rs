/*!
    Shared types for the kitten crate ecosystem.

    This crate defines the vocabulary shared by the player and cloak crates and
    by the proxy service. It has no browser or HTTP dependency, which keeps the
    decision layers of the other crates testable in isolation.

    # Storage

    - [`KeyValueStore`] - Origin-scoped string key-value store
    - [`MemoryStore`] - In-memory store

    # Same-origin tabs

    - [`Origin`] - Shared store, broadcast hub and storage-mutation events
    - [`TabContext`] - One tab's view of its origin
    - [`BroadcastChannel`] - Named same-origin publish/subscribe channel
    - [`StorageEvents`] - Storage mutations made by other tabs

    # Timers

    - [`TimerSlot`] - At most one outstanding scheduled callback
    - [`TimerToken`] - Identity of a single arming

    # Media

    - [`MediaType`] and [`PlaybackTarget`] - What to play

    # Error Handling

    - [`Error`] and [`Result`] - Common error types
*/

mod error;
mod media;
mod origin;
mod store;
mod timer;

pub use error::{Error, Result};
pub use media::{MediaType, PlaybackTarget};
pub use origin::{
    BroadcastChannel, BroadcastHub, Origin, StorageEvent, StorageEvents, TabContext, TabId,
};
pub use store::{KeyValueStore, MemoryStore, read_json, write_json};
pub use timer::{TimerSlot, TimerToken};
