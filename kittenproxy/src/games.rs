/*!
    Game catalog listing.
*/

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, NaiveDate, Utc};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::server::{AppState, json_response};

pub const RECENT_COUNT: usize = 10;
pub const ALL_CATEGORIES: &str = "All";

const CATALOG_TTL: Duration = Duration::from_secs(10 * 60);

/**
    One playable game.
*/
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// RFC 3339 timestamp or plain `YYYY-MM-DD` date
    #[serde(default)]
    pub added: String,
}

impl Game {
    pub fn added_at(&self) -> Option<DateTime<Utc>> {
        if let Ok(at) = DateTime::parse_from_rfc3339(&self.added) {
            return Some(at.with_timezone(&Utc));
        }
        NaiveDate::parse_from_str(&self.added, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|at| at.and_utc())
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct GameQuery {
    pub category: Option<String>,
    pub q: Option<String>,
}

impl GameQuery {
    fn category(&self) -> Option<&str> {
        self.category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty() && *c != ALL_CATEGORIES)
    }

    fn search(&self) -> Option<&str> {
        self.q.as_deref().map(str::trim).filter(|q| !q.is_empty())
    }

    pub fn is_unfiltered(&self) -> bool {
        self.category().is_none() && self.search().is_none()
    }

    fn matches(&self, game: &Game) -> bool {
        let category = self
            .category()
            .is_none_or(|c| game.category.eq_ignore_ascii_case(c));
        let search = self
            .search()
            .is_none_or(|q| game.name.to_lowercase().contains(&q.to_lowercase()));
        category && search
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GameListing {
    pub recent: Vec<Game>,
    pub games: Vec<Game>,
}

/**
    Split a catalog into what the listing shows.

    Unfiltered queries get the newest games as `recent` and every other
    game shuffled. Filtered queries get no `recent` and the matches in
    catalog order.
*/
pub fn arrange<R: Rng + ?Sized>(catalog: &[Game], query: &GameQuery, rng: &mut R) -> GameListing {
    if !query.is_unfiltered() {
        return GameListing {
            recent: Vec::new(),
            games: catalog.iter().filter(|g| query.matches(g)).cloned().collect(),
        };
    }

    let mut newest: Vec<&Game> = catalog.iter().collect();
    newest.sort_by_key(|g| std::cmp::Reverse(g.added_at()));
    let recent: Vec<Game> = newest.into_iter().take(RECENT_COUNT).cloned().collect();

    let recent_paths: HashSet<&str> = recent.iter().map(|g| g.path.as_str()).collect();
    let mut games: Vec<Game> = catalog
        .iter()
        .filter(|g| !recent_paths.contains(g.path.as_str()))
        .cloned()
        .collect();
    games.shuffle(rng);

    GameListing { recent, games }
}

/**
    Game catalog fetched from a remote JSON list and kept for a while.

    A failed refresh keeps serving the previous list when there is one.
*/
pub struct GameCatalog {
    url: Option<String>,
    ttl: Duration,
    cached: RwLock<Option<(Instant, Arc<Vec<Game>>)>>,
}

impl GameCatalog {
    pub fn new(url: Option<String>) -> Self {
        Self::with_ttl(url, CATALOG_TTL)
    }

    pub fn with_ttl(url: Option<String>, ttl: Duration) -> Self {
        Self {
            url,
            ttl,
            cached: RwLock::new(None),
        }
    }

    /**
        Get the catalog, or `None` when no catalog URL is configured.
    */
    pub async fn load(&self, client: &reqwest::Client) -> Result<Option<Arc<Vec<Game>>>> {
        let Some(url) = self.url.as_deref() else {
            return Ok(None);
        };

        if let Some((fetched_at, games)) = self.cached.read().await.as_ref()
            && fetched_at.elapsed() < self.ttl
        {
            return Ok(Some(Arc::clone(games)));
        }

        let mut cached = self.cached.write().await;
        match fetch(client, url).await {
            Ok(games) => {
                info!("[games] Loaded {} games", games.len());
                let games = Arc::new(games);
                *cached = Some((Instant::now(), Arc::clone(&games)));
                Ok(Some(games))
            }
            Err(e) => match cached.as_ref() {
                Some((_, stale)) => {
                    warn!("[games] Refresh failed, serving previous catalog: {e:#}");
                    Ok(Some(Arc::clone(stale)))
                }
                None => Err(e),
            },
        }
    }
}

async fn fetch(client: &reqwest::Client, url: &str) -> Result<Vec<Game>> {
    let response = client
        .get(url)
        .send()
        .await
        .context("Failed to request game catalog")?
        .error_for_status()
        .context("Game catalog returned an error")?;
    response
        .json::<Vec<Game>>()
        .await
        .context("Failed to parse game catalog")
}

/**
    `GET /api/games?category=&q=`.
*/
pub async fn list(State(state): State<AppState>, Query(query): Query<GameQuery>) -> Response {
    match state.games.load(&state.client).await {
        Ok(Some(catalog)) => {
            let listing = arrange(&catalog, &query, &mut rand::thread_rng());
            Json(listing).into_response()
        }
        Ok(None) => json_response(
            StatusCode::SERVICE_UNAVAILABLE,
            json!({ "error": "Game catalog not configured" }),
        ),
        Err(e) => {
            warn!("[games] {e:#}");
            json_response(
                StatusCode::BAD_GATEWAY,
                json!({ "error": "Failed to load game catalog", "detail": format!("{e:#}") }),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::{Router, routing::get};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::server::ProxyConfig;
    use crate::server::tests::{body_json, state, upstream};

    fn game(name: &str, category: &str, added: &str) -> Game {
        Game {
            name: name.to_string(),
            path: format!("/g/{}", name.to_lowercase().replace(' ', "-")),
            category: category.to_string(),
            url: None,
            image: None,
            added: added.to_string(),
        }
    }

    fn catalog() -> Vec<Game> {
        let mut games: Vec<Game> = (1..=12)
            .map(|day| game(&format!("Puzzle {day}"), "Puzzle", &format!("2024-03-{day:02}")))
            .collect();
        games.push(game("Slope", "Arcade", "2023-01-01T12:00:00Z"));
        games.push(game("Retro Bowl", "sports", "not a date"));
        games
    }

    fn query(category: Option<&str>, q: Option<&str>) -> GameQuery {
        GameQuery {
            category: category.map(str::to_string),
            q: q.map(str::to_string),
        }
    }

    #[test]
    fn added_accepts_dates_and_timestamps() {
        let date = game("A", "Arcade", "2024-03-05").added_at().unwrap();
        assert_eq!(date.to_rfc3339(), "2024-03-05T00:00:00+00:00");
        assert!(game("B", "Arcade", "2024-03-05T10:00:00+02:00").added_at().is_some());
        assert!(game("C", "Arcade", "").added_at().is_none());
    }

    #[test]
    fn unfiltered_listing_splits_recent_from_the_rest() {
        let catalog = catalog();
        let listing = arrange(&catalog, &query(Some("All"), None), &mut StdRng::seed_from_u64(7));

        let recent: Vec<&str> = listing.recent.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(recent.len(), RECENT_COUNT);
        assert_eq!(recent[0], "Puzzle 12");
        assert_eq!(recent[9], "Puzzle 3");

        let mut rest: Vec<&str> = listing.games.iter().map(|g| g.name.as_str()).collect();
        rest.sort();
        assert_eq!(rest, vec!["Puzzle 1", "Puzzle 2", "Retro Bowl", "Slope"]);
    }

    #[test]
    fn shuffle_follows_the_rng() {
        let catalog = catalog();
        let a = arrange(&catalog, &GameQuery::default(), &mut StdRng::seed_from_u64(1));
        let b = arrange(&catalog, &GameQuery::default(), &mut StdRng::seed_from_u64(1));
        assert_eq!(a, b);
    }

    #[test]
    fn filters_skip_recent_and_keep_order() {
        let catalog = catalog();
        let mut rng = StdRng::seed_from_u64(3);

        let sports = arrange(&catalog, &query(Some("Sports"), None), &mut rng);
        assert!(sports.recent.is_empty());
        assert_eq!(sports.games, vec![catalog[13].clone()]);

        let search = arrange(&catalog, &query(None, Some("puzzle 1")), &mut rng);
        let names: Vec<&str> = search.games.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["Puzzle 1", "Puzzle 10", "Puzzle 11", "Puzzle 12"]);

        let both = arrange(&catalog, &query(Some("arcade"), Some("puzzle")), &mut rng);
        assert!(both.games.is_empty());
    }

    #[tokio::test]
    async fn unconfigured_catalog_is_unavailable() {
        let response = list(State(state(ProxyConfig::default())), Query(GameQuery::default())).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            body_json(response).await,
            json!({ "error": "Game catalog not configured" })
        );
    }

    async fn mock_catalog(fail_after: usize) -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route(
                "/games.json",
                get(move |State(hits): State<Arc<AtomicUsize>>| async move {
                    if hits.fetch_add(1, Ordering::SeqCst) >= fail_after {
                        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
                    }
                    Json(catalog()).into_response()
                }),
            )
            .with_state(hits.clone());
        (format!("{}/games.json", upstream(app).await), hits)
    }

    #[tokio::test]
    async fn catalog_is_fetched_once_while_fresh() {
        let (url, hits) = mock_catalog(usize::MAX).await;
        let catalog = GameCatalog::new(Some(url));
        let client = reqwest::Client::new();

        let first = catalog.load(&client).await.unwrap().unwrap();
        let second = catalog.load(&client).await.unwrap().unwrap();
        assert_eq!(first.len(), 14);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_refresh_serves_previous_catalog() {
        let (url, hits) = mock_catalog(1).await;
        let catalog = GameCatalog::with_ttl(Some(url), Duration::ZERO);
        let client = reqwest::Client::new();

        let first = catalog.load(&client).await.unwrap().unwrap();
        let stale = catalog.load(&client).await.unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &stale));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn first_fetch_failure_is_an_error() {
        let (url, _) = mock_catalog(0).await;
        let catalog = GameCatalog::new(Some(url));
        assert!(catalog.load(&reqwest::Client::new()).await.is_err());
    }
}
