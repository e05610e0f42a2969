/*!
    Favorites, watch history and watchlist kept in the origin store.

    Every list is stored newest first as a JSON array and capped. Unreadable
    lists read as empty so a corrupted entry never blocks playback.
*/

use chrono::Utc;
use kitten_types::{KeyValueStore, MediaType, PlaybackTarget, Result, read_json, write_json};
use serde::{Deserialize, Serialize};

pub const FAVORITES_KEY: &str = "kg_favorites_v1";
pub const WATCH_HISTORY_KEY: &str = "kg_watch_history_v1";
pub const WATCHLIST_KEY: &str = "kg_watchlist_v1";

pub const FAVORITES_CAP: usize = 200;
pub const WATCH_HISTORY_CAP: usize = 200;
pub const WATCHLIST_CAP: usize = 500;

/// Position recorded when a session starts, so the title shows up under
/// "continue watching" before any real progress arrives.
pub const STARTED_POSITION_SEC: u64 = 5;

/**
    Reference to one title in the metadata catalog.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaRef {
    pub tmdb_id: u64,
    #[serde(rename = "type")]
    pub media_type: MediaType,
}

impl MediaRef {
    pub fn new(tmdb_id: u64, media_type: MediaType) -> Self {
        Self {
            tmdb_id,
            media_type,
        }
    }

    /**
        Catalog reference for a playback target, if its id is numeric.
    */
    pub fn from_target(target: &PlaybackTarget) -> Option<Self> {
        let tmdb_id = target.external_id.parse().ok()?;
        Some(Self::new(tmdb_id, target.media_type))
    }
}

fn read_list<T: serde::de::DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Vec<T> {
    read_json(store, key).unwrap_or_default()
}

fn write_list<T: Serialize>(
    store: &dyn KeyValueStore,
    key: &str,
    items: &[T],
    cap: usize,
) -> Result<()> {
    write_json(store, key, &items[..items.len().min(cap)])
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

pub struct Favorites<'a> {
    store: &'a dyn KeyValueStore,
}

impl<'a> Favorites<'a> {
    pub fn new(store: &'a dyn KeyValueStore) -> Self {
        Self { store }
    }

    pub fn list(&self) -> Vec<MediaRef> {
        read_list(self.store, FAVORITES_KEY)
    }

    pub fn contains(&self, item: MediaRef) -> bool {
        self.list().contains(&item)
    }

    /**
        Add `item` at the front. Does nothing if it is already a favorite.
    */
    pub fn add(&self, item: MediaRef) -> Result<()> {
        let mut items = self.list();
        if items.contains(&item) {
            return Ok(());
        }
        items.insert(0, item);
        write_list(self.store, FAVORITES_KEY, &items, FAVORITES_CAP)
    }

    pub fn remove(&self, item: MediaRef) -> Result<()> {
        let mut items = self.list();
        items.retain(|existing| *existing != item);
        write_list(self.store, FAVORITES_KEY, &items, FAVORITES_CAP)
    }
}

/**
    Playback progress of one title.
*/
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchProgress {
    #[serde(flatten)]
    pub item: MediaRef,
    pub last_position_sec: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_sec: Option<u64>,
    /// Epoch milliseconds
    pub started_at: i64,
    /// Epoch milliseconds
    pub updated_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished: Option<bool>,
}

/**
    Fields a progress report may change.
*/
#[derive(Clone, Debug, PartialEq)]
pub struct ProgressUpdate {
    pub item: MediaRef,
    pub last_position_sec: u64,
    pub duration_sec: Option<u64>,
    pub finished: Option<bool>,
}

impl ProgressUpdate {
    pub fn at(item: MediaRef, last_position_sec: u64) -> Self {
        Self {
            item,
            last_position_sec,
            duration_sec: None,
            finished: None,
        }
    }
}

pub struct WatchHistory<'a> {
    store: &'a dyn KeyValueStore,
}

impl<'a> WatchHistory<'a> {
    pub fn new(store: &'a dyn KeyValueStore) -> Self {
        Self { store }
    }

    pub fn list(&self) -> Vec<WatchProgress> {
        read_list(self.store, WATCH_HISTORY_KEY)
    }

    pub fn get(&self, item: MediaRef) -> Option<WatchProgress> {
        self.list().into_iter().find(|entry| entry.item == item)
    }

    /**
        Update an existing entry in place, or add a new one at the front.
    */
    pub fn upsert_progress(&self, update: ProgressUpdate) -> Result<()> {
        self.upsert_progress_at(update, now_ms())
    }

    fn upsert_progress_at(&self, update: ProgressUpdate, now: i64) -> Result<()> {
        let mut items = self.list();
        match items.iter_mut().find(|entry| entry.item == update.item) {
            Some(entry) => {
                entry.last_position_sec = update.last_position_sec;
                entry.duration_sec = update.duration_sec.or(entry.duration_sec);
                entry.finished = update.finished.or(entry.finished);
                entry.updated_at = now;
            }
            None => items.insert(
                0,
                WatchProgress {
                    item: update.item,
                    last_position_sec: update.last_position_sec,
                    duration_sec: update.duration_sec,
                    started_at: now,
                    updated_at: now,
                    finished: update.finished,
                },
            ),
        }
        write_list(self.store, WATCH_HISTORY_KEY, &items, WATCH_HISTORY_CAP)
    }

    /**
        Mark an entry finished. Unknown titles are left alone.
    */
    pub fn mark_finished(&self, item: MediaRef) -> Result<()> {
        let mut items = self.list();
        let Some(entry) = items.iter_mut().find(|entry| entry.item == item) else {
            return Ok(());
        };
        entry.finished = Some(true);
        entry.updated_at = now_ms();
        write_list(self.store, WATCH_HISTORY_KEY, &items, WATCH_HISTORY_CAP)
    }

    /**
        Seed history for a session that just started playing `target`.
        Targets without a numeric catalog id are not recorded.
    */
    pub fn record_started(&self, target: &PlaybackTarget) -> Result<()> {
        match MediaRef::from_target(target) {
            Some(item) => self.upsert_progress(ProgressUpdate::at(item, STARTED_POSITION_SEC)),
            None => Ok(()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchlistEntry {
    #[serde(flatten)]
    pub item: MediaRef,
    /// Epoch milliseconds
    pub added_at: i64,
}

pub struct Watchlist<'a> {
    store: &'a dyn KeyValueStore,
}

impl<'a> Watchlist<'a> {
    pub fn new(store: &'a dyn KeyValueStore) -> Self {
        Self { store }
    }

    pub fn list(&self) -> Vec<WatchlistEntry> {
        read_list(self.store, WATCHLIST_KEY)
    }

    pub fn contains(&self, item: MediaRef) -> bool {
        self.list().iter().any(|entry| entry.item == item)
    }

    pub fn add(&self, item: MediaRef) -> Result<()> {
        let mut items = self.list();
        if items.iter().any(|entry| entry.item == item) {
            return Ok(());
        }
        items.insert(
            0,
            WatchlistEntry {
                item,
                added_at: now_ms(),
            },
        );
        write_list(self.store, WATCHLIST_KEY, &items, WATCHLIST_CAP)
    }

    pub fn remove(&self, item: MediaRef) -> Result<()> {
        let mut items = self.list();
        items.retain(|entry| entry.item != item);
        write_list(self.store, WATCHLIST_KEY, &items, WATCHLIST_CAP)
    }
}
