//! `GET /health`: database reachability, event-loop state and the review
//! collection the bot is currently timing.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use helpbot_db::{ping, DbPool};
use helpbot_discord::{GatewayState, GatewayStatus};
use helpbot_workflows::ReviewLifecycle;
use serde::Serialize;
use tracing::{error, info};

#[derive(Clone)]
pub struct HealthState {
    pub db_pool: DbPool,
    pub reviews: ReviewLifecycle,
    pub gateway: GatewayStatus,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DatabaseHealth {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReviewHealth {
    pub open_review_id: Option<i64>,
    pub closes_at: Option<String>,
    /// Review whose close timer is armed in this process.
    pub scheduled_close_id: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: DatabaseHealth,
    pub gateway: GatewayState,
    pub review: ReviewHealth,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

pub async fn spawn(bind_address: &str, port: u16, state: HealthState) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "health endpoint started"
    );

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(state)).await {
            error!(
                event_name = "system.health.error",
                correlation_id = "bootstrap",
                error = %error,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

/// Ready while the database answers and the event loop has not given up.
pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = match ping(&state.db_pool).await {
        Ok(()) => DatabaseHealth { status: "ready", detail: "database query succeeded".to_owned() },
        Err(error) => DatabaseHealth {
            status: "degraded",
            detail: format!("database query failed: {error}"),
        },
    };
    let gateway = state.gateway.current();
    let ready = database.status == "ready"
        && !matches!(gateway, GatewayState::RetriesExhausted { .. });

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        database,
        gateway,
        review: review_health(&state.reviews).await,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn review_health(reviews: &ReviewLifecycle) -> ReviewHealth {
    // A lookup failure already shows up as a degraded database.
    let open = reviews.current().await.ok().flatten();
    ReviewHealth {
        open_review_id: open.as_ref().map(|review| review.id.0),
        closes_at: open.map(|review| review.closed_at.to_rfc3339()),
        scheduled_close_id: reviews.scheduled_review_id().await.map(|id| id.0),
    }
}
