use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use kitten_cloak::{CloakPreset, OverlayCatalog, OverlayPreset, PresetCatalog};
use kitten_player::{DomainList, StreamingDomain, StreamingSettings};
use serde::Serialize;
use tokio::sync::watch;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::info;

use crate::ai;
use crate::games::{self, GameCatalog};
use crate::response_cache::ResponseCache;
use crate::tmdb;

pub const TMDB_BASE: &str = "https://api.themoviedb.org/3";
pub const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

const TMDB_CACHE_TTL: Duration = Duration::from_secs(60);

/**
    Upstream endpoints and credentials.
*/
#[derive(Clone, Debug)]
pub struct ProxyConfig {
    pub tmdb_token: Option<String>,
    pub tmdb_base: String,
    pub openrouter_api_key: Option<String>,
    pub openrouter_url: String,
    pub site_url: Option<String>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            tmdb_token: None,
            tmdb_base: TMDB_BASE.to_string(),
            openrouter_api_key: None,
            openrouter_url: OPENROUTER_URL.to_string(),
            site_url: None,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ProxyConfig>,
    pub client: reqwest::Client,
    pub domains: Arc<DomainList>,
    pub presets: Arc<PresetCatalog>,
    pub overlays: Arc<OverlayCatalog>,
    pub tmdb_cache: Arc<ResponseCache>,
    pub games: Arc<GameCatalog>,
}

impl AppState {
    pub fn new(config: ProxyConfig, domains: DomainList, games_url: Option<String>) -> Self {
        Self {
            config: Arc::new(config),
            client: reqwest::Client::new(),
            domains: Arc::new(domains),
            presets: Arc::new(PresetCatalog::builtin()),
            overlays: Arc::new(OverlayCatalog::builtin()),
            tmdb_cache: Arc::new(ResponseCache::new(TMDB_CACHE_TTL)),
            games: Arc::new(GameCatalog::new(games_url)),
        }
    }
}

/**
    JSON body with a status code.
*/
pub fn json_response(status: StatusCode, body: serde_json::Value) -> Response {
    (status, Json(body)).into_response()
}

#[derive(Serialize)]
struct DomainsResponse<'a> {
    domains: &'a [StreamingDomain],
    defaults: StreamingSettings,
}

async fn streaming_domains(State(state): State<AppState>) -> impl IntoResponse {
    Json(DomainsResponse {
        domains: state.domains.entries(),
        defaults: StreamingSettings::defaults(state.domains.as_ref()),
    })
    .into_response()
}

async fn presets(State(state): State<AppState>) -> Json<Vec<CloakPreset>> {
    Json(state.presets.presets().to_vec())
}

async fn overlays(State(state): State<AppState>) -> Json<Vec<OverlayPreset>> {
    Json(state.overlays.overlays().to_vec())
}

/**
    Build the router, optionally serving a static front-end build for every
    path no route matches.
*/
pub fn router(state: AppState, public_dir: Option<PathBuf>) -> Router {
    let mut app = Router::new()
        .route("/api/tmdb/{*path}", get(tmdb::proxy))
        .route("/api/ai/chat", post(ai::chat))
        .route("/api/ai/recommend", post(ai::recommend))
        .route("/api/ai/similar", post(ai::similar))
        .route("/api/streaming/domains", get(streaming_domains))
        .route("/api/games", get(games::list))
        .route("/presets.json", get(presets))
        .route("/overlays.json", get(overlays));

    if let Some(dir) = public_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app.layer(TraceLayer::new_for_http()).with_state(state)
}

/**
    Run the HTTP server until the shutdown signal flips.
*/
pub async fn run_server(
    addr: SocketAddr,
    state: AppState,
    public_dir: Option<PathBuf>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<()> {
    let app = router(state, public_dir);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("[server] Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            while !*shutdown_rx.borrow_and_update() {
                if shutdown_rx.changed().await.is_err() {
                    break;
                }
            }
        })
        .await?;

    Ok(())
}
