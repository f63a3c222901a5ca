use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::clients::printer::{NetworkPrinter, Printer};
use crate::clients::rbmq::{Broker, RabbitMqClient};
use crate::config::Config;
use crate::error::PrinterError;
use crate::models::message::PublishRequest;
use crate::models::paper::PaperStatus;
use crate::models::response::ApiResponse;
use crate::publish::{PublishOutcome, publish_notification};
use crate::recovery;

pub struct AppState {
    config: Config,
}

impl AppState {
    fn printer(&self) -> NetworkPrinter {
        NetworkPrinter::new(self.config.printer_host.clone(), self.config.printer_port)
    }
}

pub async fn run_api_server(config: Config) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", config.server_port);
    let state = Arc::new(AppState { config });

    let app = Router::new()
        .route("/health", get(health))
        .route("/api/queues/publish", post(publish))
        .route("/api/queues/republish", post(republish))
        .route("/api/queues/status", get(queue_status))
        .route("/api/printer/status", get(printer_status))
        .route("/api/printer/feed", post(feed))
        .route("/api/printer/cut", post(cut))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = TcpListener::bind(&addr).await?;

    info!(address = %addr, "API server started");

    axum::serve(listener, app).await?;

    Ok(())
}

async fn health() -> impl IntoResponse {
    Json(ApiResponse::success(json!({}), "ok".to_string()))
}

async fn publish(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PublishRequest>,
) -> impl IntoResponse {
    // Validation gates broker contact: an invalid request must get its 400
    // error list back even while the broker is down, and must cost no
    // connection.
    let errors = request.validate();
    if !errors.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(errors, "Invalid request".to_string())),
        );
    }

    let broker = match RabbitMqClient::connect(&state.config.rabbitmq_url).await {
        Ok(broker) => broker,
        Err(e) => return broker_unavailable(e.to_string()),
    };

    match publish_notification(&broker, &state.config, request).await {
        Ok(PublishOutcome::Accepted(id)) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                json!({ "id": id }),
                "Notification queued".to_string(),
            )),
        ),
        Ok(PublishOutcome::Rejected(errors)) => (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(errors, "Invalid request".to_string())),
        ),
        Err(e) => broker_unavailable(e.to_string()),
    }
}

/// On-demand dead-letter replay, same semantics as the scheduled recovery
/// tick: drain the dead-letter queue back to the primary queue and report
/// what made it.
async fn republish(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let broker = match RabbitMqClient::connect(&state.config.rabbitmq_url).await {
        Ok(broker) => broker,
        Err(e) => return broker_unavailable(e.to_string()),
    };

    match recovery::run_recovery(&broker, &state.config).await {
        Ok(report) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                json!({ "republished": report.republished, "failed": report.failed }),
                "Dead-letter replay completed".to_string(),
            )),
        ),
        Err(e) => broker_unavailable(e.to_string()),
    }
}

async fn queue_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let config = &state.config;

    let broker = match RabbitMqClient::connect(&config.rabbitmq_url).await {
        Ok(broker) => broker,
        Err(e) => return broker_unavailable(e.to_string()),
    };

    let primary = broker.depth(&config.queue_name, config.queue_durable).await;
    let dead = broker
        .depth(&config.dead_letter_queue_name, config.queue_durable)
        .await;

    match (primary, dead) {
        (Ok(primary), Ok(dead)) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                json!({ "queued": primary, "dead_lettered": dead }),
                "Queue status".to_string(),
            )),
        ),
        (Err(e), _) | (_, Err(e)) => broker_unavailable(e.to_string()),
    }
}

#[derive(Debug, Serialize)]
struct PrinterStatus {
    online: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    paper: Option<PaperStatus>,
}

async fn printer_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let printer = state.printer();

    let online = printer.is_online().await;
    let paper = if online {
        printer.paper_status().await.ok()
    } else {
        None
    };

    Json(ApiResponse::success(
        PrinterStatus { online, paper },
        "Printer status".to_string(),
    ))
}

#[derive(Debug, Deserialize)]
struct FeedRequest {
    lines: u16,
}

async fn feed(
    State(state): State<Arc<AppState>>,
    Json(request): Json<FeedRequest>,
) -> impl IntoResponse {
    match state.printer().feed(request.lines).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::success(json!({}), "Paper fed".to_string())),
        ),
        Err(e) => printer_failure(e),
    }
}

async fn cut(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.printer().cut().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::success(json!({}), "Paper cut".to_string())),
        ),
        Err(e) => printer_failure(e),
    }
}

fn broker_unavailable(error: String) -> (StatusCode, Json<ApiResponse<serde_json::Value>>) {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ApiResponse::error(
            vec![error],
            "Broker unavailable".to_string(),
        )),
    )
}

fn printer_failure(error: PrinterError) -> (StatusCode, Json<ApiResponse<serde_json::Value>>) {
    let status = match error {
        PrinterError::FeedOutOfRange(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::SERVICE_UNAVAILABLE,
    };

    (
        status,
        Json(ApiResponse::error(
            vec![error.to_string()],
            "Printer operation failed".to_string(),
        )),
    )
}
