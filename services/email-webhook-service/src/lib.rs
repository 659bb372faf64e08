//! Email Webhook Service
//!
//! Receives inbound emails from the email-parsing provider, keeps only the
//! newest reply, works out which conversation thread the email belongs to
//! and hands a chat run request to the flow execution API.  The provider is
//! acknowledged right away; the downstream call happens in the background.
//!
//! Configuration comes from environment variables, see
//! `shared/common/src/config.rs`.

use std::any::Any;
use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, State},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use common::{config::ServiceConfig, HealthResponse};
use models::WebhookAck;
use tower::ServiceBuilder;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, instrument};
use uuid::Uuid;

pub mod dispatcher;
pub mod form;
pub mod pipeline;
pub mod reply;
pub mod text;
pub mod thread;

use dispatcher::DispatchQueue;
use form::InboundForm;

pub const SERVICE_NAME: &str = "email-webhook-service";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ServiceConfig,
    pub dispatcher: Arc<dyn DispatchQueue>,
}

/// Builds the router with CORS and request tracing attached.
pub fn app(state: AppState) -> Router {
    let body_limit = state.config.max_body_bytes;

    Router::new()
        .route("/health", get(health_check))
        .route("/webhook", post(receive_webhook))
        .with_state(Arc::new(state))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(CatchPanicLayer::custom(panic_ack)),
        )
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse::new(
        &state.config.service_name,
        env!("CARGO_PKG_VERSION"),
    ))
}

/// Turns a panic anywhere below the router into the generic error ack.
fn panic_ack(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic payload");
    error!("Request handler panicked: {}", detail);
    Json(WebhookAck::error("Internal server error")).into_response()
}

/// Acknowledges an inbound email and queues its run request.  Failures after
/// the form was read are reported in the body with a 200 status.
#[instrument(skip_all, fields(request_id = %Uuid::new_v4()))]
async fn receive_webhook(
    State(state): State<Arc<AppState>>,
    InboundForm(email): InboundForm,
) -> Json<WebhookAck> {
    info!("Received email from {} to {}", email.sender, email.to);
    if email.attachments > 0 {
        info!("Email has {} attachment(s), not forwarded", email.attachments);
    }

    let queued = pipeline::build_dispatch(&email, &state.config.langflow)
        .and_then(|request| state.dispatcher.submit(request));

    match queued {
        Ok(()) => {
            info!("Queued run request for Langflow");
            Json(WebhookAck::accepted())
        }
        Err(e) => {
            error!("Error processing webhook: {}", e);
            Json(WebhookAck::error("Internal server error"))
        }
    }
}
