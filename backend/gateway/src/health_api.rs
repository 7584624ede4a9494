//! `GET /health`

use axum::extract::State;
use axum::Json;

use crate::server::GatewayState;
use crate::wire::HealthReport;

pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthReport> {
    Json(HealthReport {
        status: "healthy".into(),
        sessions: state.manager.count(),
        model: state.manager.model().to_string(),
        active: state.manager.snapshot(),
    })
}
