//! Thin axum HTTP surface over `PaladinCore`. No business logic lives
//! here — every route just deserializes a request, calls the facade, and
//! serializes the result. The REST surface is intentionally minimal;
//! this binary exists only so the ambient stack (structured logging,
//! trace middleware) has somewhere to attach.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use paladin_core::{AgentId, Intent, Plan};
use paladin_gateway::{GatewayConfig, PaladinCore};

struct AppState {
    core: PaladinCore,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = GatewayConfig::default();
    let bind_addr = config.bind_addr.clone();
    let core = config.build()?;
    let state = Arc::new(AppState { core });

    let app = Router::new()
        .route("/v1/intents", post(verify_intent))
        .route("/v1/plans/simulate", post(simulate_plan))
        .route("/v1/agents/{agent_id}/status", get(agent_status))
        .route("/v1/agents/{agent_id}/resurrect", post(resurrect))
        .route("/v1/ledger/verify", get(verify_ledger))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    tracing::info!(%bind_addr, "paladin gateway listening");
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn verify_intent(State(state): State<Arc<AppState>>, Json(intent): Json<Intent>) -> impl IntoResponse {
    match state.core.verify_intent(intent) {
        Ok(decision) => (StatusCode::OK, Json(json!(decision))).into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": err.to_string()}))).into_response(),
    }
}

#[derive(serde::Deserialize)]
struct SimulateRequest {
    agent_id: String,
    plan: Plan,
}

async fn simulate_plan(State(state): State<Arc<AppState>>, Json(req): Json<SimulateRequest>) -> impl IntoResponse {
    let agent_id = AgentId::new(req.agent_id);
    match state.core.simulate_plan(&agent_id, &req.plan) {
        Ok(result) => (StatusCode::OK, Json(json!(result))).into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": err.to_string()}))).into_response(),
    }
}

async fn agent_status(State(state): State<Arc<AppState>>, Path(agent_id): Path<String>) -> impl IntoResponse {
    let status = state.core.agent_status(&AgentId::new(agent_id));
    Json(json!(status))
}

#[derive(serde::Deserialize)]
struct ResurrectRequest {
    admin_id: String,
    reason: String,
}

async fn resurrect(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
    Json(req): Json<ResurrectRequest>,
) -> impl IntoResponse {
    let agent_id = AgentId::new(agent_id);
    match state.core.resurrect(&agent_id, &req.admin_id, &req.reason) {
        Ok(count) => (StatusCode::OK, Json(json!({"resurrection_count": count}))).into_response(),
        Err(err) => (StatusCode::CONFLICT, Json(json!({"error": err.to_string()}))).into_response(),
    }
}

async fn verify_ledger(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.core.verify_ledger() {
        Ok(result) => (StatusCode::OK, Json(json!(result))).into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": err.to_string()}))).into_response(),
    }
}
