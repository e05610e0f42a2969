/*!
    Chat completion proxies.

    The chat route forwards conversations as-is. The recommendation routes
    build their own prompt, ask for a JSON answer and degrade to an empty
    list whenever anything goes wrong, so clients can fall back to plain
    metadata lookups.
*/

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use kitten_types::MediaType;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::warn;

use crate::server::{AppState, json_response};

pub const MODEL: &str = "x-ai/grok-4-fast:free";
pub const APP_TITLE: &str = "KittenMovies";

const TEMPERATURE: f64 = 0.7;
const MAX_TOKENS: u32 = 300;
const DEFAULT_REFERER: &str = "https://localhost";

const RECOMMEND_HISTORY_LIMIT: usize = 20;
const RECOMMEND_RESULT_LIMIT: usize = 8;
const SIMILAR_INPUT_LIMIT: usize = 30;
const SIMILAR_RESULT_LIMIT: usize = 5;

const RECOMMEND_PROMPT: &str = r#"You are a recommendation assistant for films and TV shows. Output ONLY JSON with this schema:
{"ids": [{"tmdbId": number, "type": "movie"|"tv"}]}
Rules:
- Suggest at most 8 items in the 'ids' field.
- Use TMDB IDs only.
- Vary the genres, but favor what the user watched recently."#;

const SIMILAR_PROMPT: &str = r#"You are a recommendation assistant for films and TV shows. Output ONLY JSON with this schema:
{"ids": [{"tmdbId": number, "type": "movie"|"tv", "reason"?: string}]}
Rules:
- Return up to 5 items, ordered best match first.
- Use TMDB IDs only and correct type.
- Mix movies and shows as appropriate for the user.
- Prefer items similar to the target, but diversify slightly.
- Consider user's favorites and finished items as strong signals.
- Provide a short reason (max 10 words) for each."#;

/**
    `POST /api/ai/chat` with `{ "messages": [...] }`.
*/
pub async fn chat(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let Some(api_key) = state.config.openrouter_api_key.as_deref() else {
        return json_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({ "error": "OPENROUTER_API_KEY is not configured on the server." }),
        );
    };

    let Ok(body) = serde_json::from_slice::<Value>(&body) else {
        return json_response(StatusCode::BAD_REQUEST, json!({ "error": "Invalid JSON" }));
    };
    let Some(messages) = body.get("messages").filter(|m| m.is_array()) else {
        return json_response(
            StatusCode::BAD_REQUEST,
            json!({ "error": "messages must be an array" }),
        );
    };

    let site_url = state.config.site_url.clone().or_else(|| {
        headers
            .get(header::ORIGIN)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    });

    let mut request = state
        .client
        .post(&state.config.openrouter_url)
        .bearer_auth(api_key)
        .json(&json!({
            "model": MODEL,
            "messages": messages,
            "temperature": TEMPERATURE,
        }));
    if let Some(site_url) = site_url {
        request = request
            .header("HTTP-Referer", site_url)
            .header("X-Title", APP_TITLE);
    }

    let response = match request.send().await {
        Ok(response) => response,
        Err(e) => return unreachable_upstream(e),
    };

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let detail = response.text().await.unwrap_or_default();
        warn!("[ai] Chat completion returned {status}");
        return json_response(
            StatusCode::BAD_GATEWAY,
            json!({ "error": "OpenRouter error", "detail": detail, "status": status }),
        );
    }

    match response.json::<Value>().await {
        Ok(data) => Json(data).into_response(),
        Err(e) => unreachable_upstream(e),
    }
}

fn unreachable_upstream(e: reqwest::Error) -> Response {
    warn!("[ai] Failed to reach completion API: {e}");
    json_response(
        StatusCode::BAD_GATEWAY,
        json!({ "error": "Failed to reach OpenRouter", "detail": e.to_string() }),
    )
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RecommendRequest {
    history: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SimilarRequest {
    target: Value,
    favorites: Value,
    history: Value,
}

/**
    A suggestion from the similar-titles route.
*/
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub tmdb_id: u64,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Suggestion {
    /**
        Normalize one model-produced entry. Entries without a usable id
        are dropped, unknown types read as movies.
    */
    fn from_value(value: &Value) -> Option<Self> {
        let tmdb_id = match value.get("tmdbId")? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }?;
        let media_type = match value.get("type").and_then(Value::as_str) {
            Some("tv") => MediaType::Tv,
            _ => MediaType::Movie,
        };
        let reason = value.get("reason").and_then(Value::as_str).map(str::to_string);
        Some(Self {
            tmdb_id,
            media_type,
            reason,
        })
    }
}

/**
    `POST /api/ai/recommend` with `{ "history": [...] }`.
*/
pub async fn recommend(State(state): State<AppState>, body: Bytes) -> Response {
    let request: RecommendRequest = serde_json::from_slice(&body).unwrap_or_default();
    if state.config.openrouter_api_key.is_none() {
        return empty_ids(None);
    }

    let recent = leading(&request.history, RECOMMEND_HISTORY_LIMIT);
    let user = format!("Watch history (latest first):\n{}", Value::Array(recent));

    match suggest(&state, RECOMMEND_PROMPT, user).await {
        Ok(ids) => {
            let ids: Vec<Value> = ids.into_iter().take(RECOMMEND_RESULT_LIMIT).collect();
            Json(json!({ "ids": ids })).into_response()
        }
        Err(error) => empty_ids(Some(error)),
    }
}

/**
    `POST /api/ai/similar` with `{ "target": {...}, "favorites"?, "history"? }`.
*/
pub async fn similar(State(state): State<AppState>, body: Bytes) -> Response {
    let request: SimilarRequest = serde_json::from_slice(&body).unwrap_or_default();
    if state.config.openrouter_api_key.is_none() || !valid_target(&request.target) {
        return empty_ids(None);
    }

    let favorites = leading(&request.favorites, SIMILAR_INPUT_LIMIT);
    let recent = leading(&request.history, SIMILAR_INPUT_LIMIT);
    let user = format!(
        "Target: {}\nFavorites: {}\nHistory (latest first): {}",
        request.target,
        Value::Array(favorites),
        Value::Array(recent),
    );

    match suggest(&state, SIMILAR_PROMPT, user).await {
        Ok(ids) => {
            let ids: Vec<Suggestion> = ids
                .iter()
                .take(SIMILAR_RESULT_LIMIT)
                .filter_map(Suggestion::from_value)
                .collect();
            Json(json!({ "ids": ids })).into_response()
        }
        Err(error) => empty_ids(Some(error)),
    }
}

fn valid_target(target: &Value) -> bool {
    target.get("tmdbId").is_some_and(Value::is_number)
        && target
            .get("type")
            .and_then(Value::as_str)
            .and_then(MediaType::parse)
            .is_some()
}

fn leading(value: &Value, limit: usize) -> Vec<Value> {
    value
        .as_array()
        .map(|items| items.iter().take(limit).cloned().collect())
        .unwrap_or_default()
}

fn empty_ids(error: Option<String>) -> Response {
    let body = match error {
        Some(error) => json!({ "ids": [], "error": error }),
        None => json!({ "ids": [] }),
    };
    Json(body).into_response()
}

/**
    Ask for a JSON answer and return its `ids` array.

    An unparseable answer counts as no suggestions. Transport failures
    and error statuses come back as the error text.
*/
async fn suggest(state: &AppState, system: &str, user: String) -> Result<Vec<Value>, String> {
    let api_key = state.config.openrouter_api_key.as_deref().unwrap_or_default();
    let referer = state.config.site_url.as_deref().unwrap_or(DEFAULT_REFERER);

    let response = state
        .client
        .post(&state.config.openrouter_url)
        .bearer_auth(api_key)
        .header("HTTP-Referer", referer)
        .header("X-Title", APP_TITLE)
        .json(&json!({
            "model": MODEL,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
            "temperature": TEMPERATURE,
            "max_tokens": MAX_TOKENS,
        }))
        .send()
        .await
        .map_err(|e| e.to_string())?;

    if !response.status().is_success() {
        let text = response.text().await.map_err(|e| e.to_string())?;
        warn!("[ai] Suggestion request failed: {text}");
        return Err(text);
    }

    let data: Value = response.json().await.map_err(|e| e.to_string())?;
    let content = data["choices"][0]["message"]["content"]
        .as_str()
        .filter(|c| !c.is_empty())
        .unwrap_or("{}");

    let parsed: Value = serde_json::from_str(content).unwrap_or_else(|_| json!({ "ids": [] }));
    Ok(parsed["ids"].as_array().cloned().unwrap_or_default())
}
