//! HTTP request handlers.

use super::AppState;
use crate::report::{render, ReportFormat};
use crate::scheduler::{SamplerError, SamplerState, TargetError};
use crate::store::{Sample, Target};

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

// ============================================================================
// Report page
// ============================================================================

pub async fn handle_index(State(state): State<AppState>) -> impl IntoResponse {
    let report = state.monitor.report().await;
    match render(&report, ReportFormat::Html) {
        Ok(page) => Html(page).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

// ============================================================================
// API: Status and history
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct SamplerResponse {
    pub state: SamplerState,
    pub interval_secs: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub sampler: SamplerResponse,
    pub target_count: usize,
    pub latest: Option<Sample>,
}

async fn sampler_response(state: &AppState) -> SamplerResponse {
    SamplerResponse {
        state: state.monitor.sampler_state().await,
        interval_secs: state.monitor.interval().await.map(|d| d.as_secs_f64()),
    }
}

pub async fn handle_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(StatusResponse {
        sampler: sampler_response(&state).await,
        target_count: state.monitor.list_targets().len(),
        latest: state.monitor.status().map(|s| s.as_ref().clone()),
    })
}

pub async fn handle_history(State(state): State<AppState>) -> impl IntoResponse {
    let history: Vec<Sample> = state
        .monitor
        .history()
        .iter()
        .map(|s| s.as_ref().clone())
        .collect();
    Json(history)
}

pub async fn handle_statistics(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.monitor.statistics())
}

// ============================================================================
// API: Targets
// ============================================================================

pub async fn handle_get_targets(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.monitor.list_targets().as_ref().clone())
}

pub async fn handle_create_target(
    State(state): State<AppState>,
    Json(target): Json<Target>,
) -> impl IntoResponse {
    match state.monitor.add_target(target.clone()) {
        Ok(()) => (StatusCode::CREATED, Json(target)).into_response(),
        Err(e @ TargetError::DuplicateName(_)) => (StatusCode::CONFLICT, e.to_string()).into_response(),
        Err(e) => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    }
}

pub async fn handle_delete_target(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    match state.monitor.remove_target(&name) {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => (StatusCode::NOT_FOUND, e.to_string()).into_response(),
    }
}

// ============================================================================
// API: Sampler
// ============================================================================

pub async fn handle_sampler(State(state): State<AppState>) -> impl IntoResponse {
    Json(sampler_response(&state).await)
}

#[derive(Debug, Deserialize)]
pub struct StartQuery {
    pub interval_secs: Option<f64>,
}

pub async fn handle_sampler_start(
    State(state): State<AppState>,
    Query(query): Query<StartQuery>,
) -> impl IntoResponse {
    let interval = match query.interval_secs.map(Duration::try_from_secs_f64) {
        Some(Ok(interval)) if !interval.is_zero() => Some(interval),
        Some(_) => {
            return (StatusCode::BAD_REQUEST, SamplerError::InvalidInterval.to_string()).into_response()
        }
        None => None,
    };

    match state.monitor.start(interval).await {
        Ok(()) => Json(sampler_response(&state).await).into_response(),
        Err(e @ SamplerError::AlreadyRunning) => (StatusCode::CONFLICT, e.to_string()).into_response(),
        Err(e) => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    }
}

pub async fn handle_sampler_stop(State(state): State<AppState>) -> impl IntoResponse {
    state.monitor.stop().await;
    Json(sampler_response(&state).await)
}

// ============================================================================
// API: Reports
// ============================================================================

pub async fn handle_report(
    State(state): State<AppState>,
    Path(format): Path<String>,
) -> impl IntoResponse {
    let format: ReportFormat = match format.parse() {
        Ok(f) => f,
        Err(e) => return (StatusCode::BAD_REQUEST, e).into_response(),
    };

    let report = state.monitor.report().await;
    match render(&report, format) {
        Ok(body) => ([(header::CONTENT_TYPE, format.content_type())], body).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::testing::monitor;
    use crate::store::Statistics;
    use crate::web::router;
    use std::sync::Arc;

    async fn serve() -> (String, AppState) {
        let state = AppState {
            monitor: Arc::new(monitor()),
        };
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = router(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), state)
    }

    #[tokio::test]
    async fn test_target_endpoints() {
        let (base, _state) = serve().await;
        let client = reqwest::Client::new();

        let res = client
            .post(format!("{}/api/targets", base))
            .json(&serde_json::json!({"name": "db", "address": "localhost:5432", "type": "tcp"}))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 201);

        let res = client
            .post(format!("{}/api/targets", base))
            .json(&serde_json::json!({"name": "web", "address": "", "type": "http"}))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 400);

        let res = client
            .post(format!("{}/api/targets", base))
            .json(&serde_json::json!({"name": "db", "address": "localhost:5433", "type": "tcp"}))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 409);

        let res = client
            .post(format!("{}/api/targets", base))
            .json(&serde_json::json!({"name": "slow", "address": "localhost", "type": "http", "timeout": 7200}))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 400);

        let res = client
            .post(format!("{}/api/targets", base))
            .json(&serde_json::json!({"name": "slow", "address": "localhost", "type": "http", "timeout": 1e20}))
            .send()
            .await
            .unwrap();
        assert!(res.status().is_client_error());

        let targets: Vec<Target> = client
            .get(format!("{}/api/targets", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(targets.len(), 1);

        let res = client.delete(format!("{}/api/targets/db", base)).send().await.unwrap();
        assert_eq!(res.status(), 204);
        let res = client.delete(format!("{}/api/targets/db", base)).send().await.unwrap();
        assert_eq!(res.status(), 404);
    }

    #[tokio::test]
    async fn test_statistics_and_reports() {
        let (base, state) = serve().await;
        let client = reqwest::Client::new();

        let stats: Statistics = client
            .get(format!("{}/api/statistics", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(stats, Statistics::NoData);

        state.monitor.add_target(Target::http("api", "localhost")).unwrap();
        state.monitor.collect_once().await.unwrap();

        let history: Vec<Sample> = client
            .get(format!("{}/api/history", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].summary.succeeded, 1);

        let res = client.get(format!("{}/api/report/csv", base)).send().await.unwrap();
        assert_eq!(res.status(), 200);
        assert!(res.headers()[header::CONTENT_TYPE].to_str().unwrap().starts_with("text/csv"));
        let body = res.text().await.unwrap();
        assert_eq!(body.lines().count(), 2);

        let res = client.get(format!("{}/api/report/xml", base)).send().await.unwrap();
        assert_eq!(res.status(), 400);

        let page = client.get(&base).send().await.unwrap().text().await.unwrap();
        assert!(page.contains("HEALTHY"));
    }

    #[tokio::test]
    async fn test_sampler_endpoints() {
        let (base, _state) = serve().await;
        let client = reqwest::Client::new();

        let res = client
            .post(format!("{}/api/sampler/start?interval_secs=0", base))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 400);

        let res = client
            .post(format!("{}/api/sampler/start?interval_secs=1e20", base))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 400);

        let started: SamplerResponse = client
            .post(format!("{}/api/sampler/start?interval_secs=60", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(started.state, SamplerState::Running);
        assert_eq!(started.interval_secs, Some(60.0));

        let res = client.post(format!("{}/api/sampler/start", base)).send().await.unwrap();
        assert_eq!(res.status(), 409);

        let stopped: SamplerResponse = client
            .post(format!("{}/api/sampler/stop", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(stopped.state, SamplerState::Stopped);
        assert_eq!(stopped.interval_secs, None);
    }
}
