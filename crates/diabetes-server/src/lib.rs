use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use diabetes_core::{
    pipeline::AppCore,
    schema::{ErrorBody, HealthResponse},
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

pub const TRACE_ID_HEADER: &str = "x-trace-id";

#[derive(Clone)]
pub struct AppState {
    pub core: Arc<AppCore>,
    pub prom: PrometheusHandle,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/predict", post(predict))
        .route("/metrics", get(render_metrics))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::default())
}

// Body is taken raw so that malformed JSON also gets the {"error": ...} shape.
async fn predict(State(st): State<AppState>, body: Bytes) -> Response {
    let trace_id = Uuid::new_v4();
    let trace_hdr = [(TRACE_ID_HEADER, trace_id.to_string())];
    metrics::counter!("predict_requests_total").increment(1);

    match st.core.predict_json(&body) {
        Ok(resp) => {
            tracing::debug!(
                %trace_id,
                current_risk = resp.current_risk,
                improvement_risk = resp.improvement_risk,
                "prediction served"
            );
            (trace_hdr, Json(resp)).into_response()
        }
        Err(e) => {
            metrics::counter!("predict_errors_total", "kind" => e.kind()).increment(1);
            tracing::warn!(%trace_id, error = %e, "prediction rejected");
            (
                StatusCode::BAD_REQUEST,
                trace_hdr,
                Json(ErrorBody {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

async fn render_metrics(State(st): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, st.prom.render())
}
