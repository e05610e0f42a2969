/*!
    Same-origin tab primitives.

    An [`Origin`] owns the store shared by all of its tabs, a hub of named
    broadcast channels, and the storage-mutation event source. Each tab gets a
    [`TabContext`]; writes made through it are announced to every other tab,
    never to the writer, matching how browsers deliver storage events.
*/

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::broadcast::{self, error::TryRecvError};

use crate::{Error, KeyValueStore, Result};

const CHANNEL_CAPACITY: usize = 64;

/**
    Identity of one tab within an origin.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TabId(u64);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tab#{}", self.0)
    }
}

/**
    A write made by another tab of the same origin.
*/
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageEvent {
    pub key: String,
    /// The new value, or `None` if the key was removed
    pub new_value: Option<String>,
    source: TabId,
}

#[derive(Clone, Debug)]
struct Envelope {
    sender: TabId,
    payload: serde_json::Value,
}

/**
    Registry of named broadcast topics for one origin.
*/
#[derive(Debug, Default)]
pub struct BroadcastHub {
    topics: Mutex<HashMap<String, broadcast::Sender<Envelope>>>,
}

impl BroadcastHub {
    fn topic(&self, name: &str) -> broadcast::Sender<Envelope> {
        self.topics
            .lock()
            .entry(name.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }
}

/**
    Everything tabs of one origin share.
*/
pub struct Origin {
    store: Arc<dyn KeyValueStore>,
    hub: Option<BroadcastHub>,
    storage_tx: broadcast::Sender<StorageEvent>,
    next_tab: AtomicU64,
}

impl Origin {
    /**
        Create an origin whose runtime supports broadcast channels.
    */
    pub fn new(store: Arc<dyn KeyValueStore>) -> Arc<Self> {
        Self::build(store, Some(BroadcastHub::default()))
    }

    /**
        Create an origin whose runtime has no broadcast channel primitive.
        Tabs must rely on storage events alone.
    */
    pub fn without_broadcast(store: Arc<dyn KeyValueStore>) -> Arc<Self> {
        Self::build(store, None)
    }

    fn build(store: Arc<dyn KeyValueStore>, hub: Option<BroadcastHub>) -> Arc<Self> {
        let (storage_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Arc::new(Self {
            store,
            hub,
            storage_tx,
            next_tab: AtomicU64::new(1),
        })
    }

    pub fn supports_broadcast(&self) -> bool {
        self.hub.is_some()
    }

    /**
        Open a new tab on this origin.
    */
    pub fn open_tab(self: &Arc<Self>) -> TabContext {
        let id = TabId(self.next_tab.fetch_add(1, Ordering::Relaxed));
        TabContext {
            id,
            origin: Arc::clone(self),
        }
    }
}

/**
    One tab's handle on its origin.

    Implements [`KeyValueStore`] over the shared store; every mutation through
    it is reported to the other tabs as a [`StorageEvent`].
*/
#[derive(Clone)]
pub struct TabContext {
    id: TabId,
    origin: Arc<Origin>,
}

impl TabContext {
    pub fn id(&self) -> TabId {
        self.id
    }

    pub fn origin(&self) -> &Arc<Origin> {
        &self.origin
    }

    /**
        Open a named broadcast channel, or `None` if the runtime lacks one.
    */
    pub fn broadcast_channel(&self, name: &str) -> Option<BroadcastChannel> {
        let hub = self.origin.hub.as_ref()?;
        let tx = hub.topic(name);
        let rx = tx.subscribe();
        Some(BroadcastChannel {
            name: name.to_string(),
            tab: self.id,
            tx,
            rx,
        })
    }

    /**
        Subscribe to storage mutations made by other tabs from now on.
    */
    pub fn storage_events(&self) -> StorageEvents {
        StorageEvents {
            tab: self.id,
            rx: self.origin.storage_tx.subscribe(),
        }
    }

    fn announce(&self, key: &str, new_value: Option<&str>) {
        // Nobody listening is fine
        let _ = self.origin.storage_tx.send(StorageEvent {
            key: key.to_string(),
            new_value: new_value.map(str::to_string),
            source: self.id,
        });
    }
}

impl KeyValueStore for TabContext {
    fn get(&self, key: &str) -> Option<String> {
        self.origin.store.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.origin.store.set(key, value)?;
        self.announce(key, Some(value));
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.origin.store.remove(key)?;
        self.announce(key, None);
        Ok(())
    }
}

/**
    A named same-origin publish/subscribe channel.

    Messages posted by a tab are delivered to every other tab subscribed to
    the same name. Delivery is best effort: a slow reader that falls more than
    the channel capacity behind loses the oldest messages.
*/
pub struct BroadcastChannel {
    name: String,
    tab: TabId,
    tx: broadcast::Sender<Envelope>,
    rx: broadcast::Receiver<Envelope>,
}

impl BroadcastChannel {
    pub fn name(&self) -> &str {
        &self.name
    }

    /**
        Post a structured message to the other tabs.
    */
    pub fn post<T: Serialize>(&self, message: &T) -> Result<()> {
        let payload = serde_json::to_value(message).map_err(|e| Error::json(&self.name, e))?;
        // Our own receiver keeps the channel open, so this only fails if the
        // hub itself is gone
        let _ = self.tx.send(Envelope {
            sender: self.tab,
            payload,
        });
        Ok(())
    }

    /**
        Take the next message from another tab, if one is waiting.

        Messages that do not decode as `T` are skipped.
    */
    pub fn try_recv<T: DeserializeOwned>(&mut self) -> Option<T> {
        loop {
            match self.rx.try_recv() {
                Ok(envelope) if envelope.sender == self.tab => continue,
                Ok(envelope) => match serde_json::from_value(envelope.payload) {
                    Ok(message) => return Some(message),
                    Err(e) => {
                        tracing::warn!("[broadcast] Dropping undecodable message on {}: {e}", self.name);
                    }
                },
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!("[broadcast] {} lagged, {skipped} messages lost", self.name);
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }
}

/**
    Storage mutations made by other tabs.
*/
pub struct StorageEvents {
    tab: TabId,
    rx: broadcast::Receiver<StorageEvent>,
}

impl StorageEvents {
    /**
        Take the next mutation made by another tab, if one is waiting.
    */
    pub fn try_recv(&mut self) -> Option<StorageEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) if event.source == self.tab => continue,
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!("[storage] Event stream lagged, {skipped} events lost");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }
}

static_assertions::assert_impl_all!(TabContext: Send, Sync, KeyValueStore);
static_assertions::assert_impl_all!(BroadcastChannel: Send);
