use std::collections::HashMap;
use std::time::{Duration, Instant};

use axum::body::Bytes;
use tokio::sync::RwLock;

/**
    An upstream response kept for reuse.
*/
#[derive(Clone, Debug)]
pub struct CachedResponse {
    pub status: u16,
    pub content_type: String,
    pub body: Bytes,
}

/**
    In-memory cache of upstream responses with a fixed time to live.

    Keyed by the full upstream path and query. Expired entries are never
    returned and get dropped on the next insert.
*/
pub struct ResponseCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, (Instant, CachedResponse)>>,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /**
        Get a response that is still fresh.
    */
    pub async fn get(&self, key: &str) -> Option<CachedResponse> {
        let entries = self.entries.read().await;
        let (stored_at, response) = entries.get(key)?;
        if stored_at.elapsed() < self.ttl {
            Some(response.clone())
        } else {
            None
        }
    }

    pub async fn insert(&self, key: impl Into<String>, response: CachedResponse) {
        let mut entries = self.entries.write().await;
        let ttl = self.ttl;
        entries.retain(|_, (stored_at, _)| stored_at.elapsed() < ttl);
        entries.insert(key.into(), (Instant::now(), response));
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}
