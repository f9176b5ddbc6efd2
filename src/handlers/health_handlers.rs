//! Health & readiness handlers.
//!
//! - GET /health   -> running status plus which integrations are configured
//! - GET /healthz  -> simple liveness ("ok")
//! - GET /readyz   -> readiness that checks the database and reports which
//!   external capabilities are configured

use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::{Value, json};
use serde::Serialize;
use std::collections::HashMap;

/// `GET /healthz`
///
/// Liveness only: always returns 200 OK with a plain JSON body.
/// This endpoint should be cheap and never perform I/O.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /health`
///
/// Always 200 while the process runs. Reports each integration so a
/// dashboard can show what still needs credentials.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let blob_store = state.relay.is_configured();
    let ai = state.generator().is_configured();
    Json(json!({
        "status": "running",
        "version": env!("CARGO_PKG_VERSION"),
        "telegram": {
            "configured": blob_store,
            "message": if blob_store { "Telegram is configured" } else { "Set BOT_TOKEN and CHAT_ID" },
        },
        "ai": {
            "configured": ai,
            "model": state.generator().model_name(),
            "message": if ai { "Gemini is configured" } else { "Set GEMINI_API_KEY" },
        },
        "database": {
            "configured": state.store.ping().await.is_ok(),
        },
    }))
}

/// `GET /readyz`
///
/// HTTP 200 when the metadata store answers, HTTP 503 otherwise. Missing
/// blob-store or AI credentials are reported but do not fail readiness: the
/// service still lists and deletes files without them.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let db_check = match state.store.ping().await {
        Ok(()) => CheckStatus {
            ok: true,
            error: None,
        },
        Err(e) => CheckStatus {
            ok: false,
            error: Some(format!("error: {}", e)),
        },
    };
    let overall_ok = db_check.ok;

    let configured = |ok: bool, missing: &str| CheckStatus {
        ok,
        error: (!ok).then(|| missing.to_string()),
    };

    let mut checks = HashMap::new();
    checks.insert("database", db_check);
    checks.insert(
        "blob_store",
        configured(state.relay.is_configured(), "set BOT_TOKEN and CHAT_ID"),
    );
    checks.insert(
        "ai",
        configured(state.generator().is_configured(), "set GEMINI_API_KEY"),
    );

    let body = ReadyResponse {
        status: if overall_ok {
            "ok".into()
        } else {
            "error".into()
        },
        checks,
    };

    let status = if overall_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    checks: HashMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}
