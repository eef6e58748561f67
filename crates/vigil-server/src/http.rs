use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use vigil_core::ledger::IncidentLedger;

#[derive(Clone)]
pub struct ApiState {
    pub ledger: Arc<IncidentLedger>,
    pub resources: Arc<Vec<String>>,
    pub start_time: Instant,
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    uptime_seconds: u64,
    resources: Vec<ResourceHealth>,
}

#[derive(Serialize)]
pub struct ResourceHealth {
    name: String,
    status: String,
}

#[derive(Serialize)]
struct ReloadResponse {
    reloaded: bool,
    active: usize,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/incidents", get(incidents_handler))
        .route("/reload", post(reload_handler))
        .with_state(state)
}

fn overall_health(resources: &[String], down: &HashSet<String>, uptime_seconds: u64) -> HealthResponse {
    let resources: Vec<ResourceHealth> = resources
        .iter()
        .map(|name| ResourceHealth {
            name: name.clone(),
            status: if down.contains(name) { "down" } else { "up" }.to_string(),
        })
        .collect();

    HealthResponse {
        status: if down.is_empty() { "ok" } else { "degraded" }.to_string(),
        uptime_seconds,
        resources,
    }
}

async fn health_handler(State(state): State<ApiState>) -> impl IntoResponse {
    let down: HashSet<String> = state
        .ledger
        .get_active()
        .await
        .into_iter()
        .map(|i| i.resource_name)
        .collect();
    Json(overall_health(
        &state.resources,
        &down,
        state.start_time.elapsed().as_secs(),
    ))
}

async fn incidents_handler(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.ledger.get_active().await)
}

async fn reload_handler(State(state): State<ApiState>) -> axum::response::Response {
    match state.ledger.reload_active_incidents().await {
        Ok(()) => {
            let active = state.ledger.get_active().await.len();
            Json(ReloadResponse {
                reloaded: true,
                active,
            })
            .into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({
                "error": format!("failed to reload journal: {}", e)
            })),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overall_health_degraded_when_any_down() {
        let resources = vec!["api".to_string(), "db".to_string()];
        let down: HashSet<String> = ["db".to_string()].into();

        let health = overall_health(&resources, &down, 42);
        assert_eq!(health.status, "degraded");
        assert_eq!(health.uptime_seconds, 42);

        let statuses: Vec<(&str, &str)> = health
            .resources
            .iter()
            .map(|r| (r.name.as_str(), r.status.as_str()))
            .collect();
        assert_eq!(statuses, [("api", "up"), ("db", "down")]);
    }

    #[test]
    fn test_overall_health_ok_when_all_up() {
        let resources = vec!["api".to_string()];
        let health = overall_health(&resources, &HashSet::new(), 0);
        assert_eq!(health.status, "ok");
    }
}
