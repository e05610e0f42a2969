/*!
    Metadata API forwarding.
*/

use axum::{
    extract::{Path, RawQuery, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::{debug, warn};

use crate::response_cache::CachedResponse;
use crate::server::{AppState, json_response};

pub const CACHE_CONTROL: &str = "public, max-age=0, s-maxage=60, stale-while-revalidate=300";

/**
    Forward `GET /api/tmdb/{path}?{query}` to the metadata API.

    Status, body and content type come back unchanged. Successful
    responses are kept in the shared cache for a short while.
*/
pub async fn proxy(
    State(state): State<AppState>,
    Path(path): Path<String>,
    RawQuery(query): RawQuery,
) -> Response {
    let Some(token) = state.config.tmdb_token.as_deref() else {
        return json_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "error": "TMDB token not configured" }),
        );
    };

    let key = match &query {
        Some(query) => format!("{path}?{query}"),
        None => path,
    };

    if let Some(cached) = state.tmdb_cache.get(&key).await {
        debug!("[tmdb] Cache hit for {key}");
        return into_response(cached);
    }

    let url = format!("{}/{key}", state.config.tmdb_base.trim_end_matches('/'));
    match fetch(&state.client, &url, token).await {
        Ok(response) => {
            if (200..300).contains(&response.status) {
                state.tmdb_cache.insert(key.clone(), response.clone()).await;
                debug!("[tmdb] Cached {key}, {} entries", state.tmdb_cache.len().await);
            }
            into_response(response)
        }
        Err(e) => {
            warn!("[tmdb] Request for {key} failed: {e}");
            json_response(
                StatusCode::BAD_GATEWAY,
                json!({ "error": "Proxy request failed", "detail": e.to_string() }),
            )
        }
    }
}

async fn fetch(
    client: &reqwest::Client,
    url: &str,
    token: &str,
) -> Result<CachedResponse, reqwest::Error> {
    let response = client
        .get(url)
        .bearer_auth(token)
        .header(reqwest::header::ACCEPT, "application/json")
        .send()
        .await?;

    let status = response.status().as_u16();
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/json")
        .to_string();
    let body = response.bytes().await?;

    Ok(CachedResponse {
        status,
        content_type,
        body,
    })
}

fn into_response(cached: CachedResponse) -> Response {
    let status = StatusCode::from_u16(cached.status).unwrap_or(StatusCode::BAD_GATEWAY);
    (
        status,
        [
            (header::CONTENT_TYPE, cached.content_type),
            (header::CACHE_CONTROL, CACHE_CONTROL.to_string()),
        ],
        cached.body,
    )
        .into_response()
}
