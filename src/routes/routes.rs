//! Defines the HTTP surface of the intake portal.
//!
//! ## Structure
//! - **Intake endpoints**
//!   - `POST /api/FileUpload` (multipart order form with audio files)
//!   - `POST /api/createpaymentintent` (payment intent for a priced order)
//!   - `GET  /api/pricing` (price quote for a service and file count)
//!
//! - **Health checks**
//!   - `GET /healthz`, `GET /readyz`
//!
//! CORS allows any origin so the form can be hosted on a separate site.

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        intake_handlers::{create_payment_intent, file_upload, pricing_quote},
    },
    services::storage_backend::StorageBackend,
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{Method, header},
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Build the router; the state is supplied by the caller via `with_state`.
///
/// `max_upload_bytes` caps the size of any request body.
pub fn routes<B: StorageBackend + 'static>(max_upload_bytes: usize) -> Router<AppState<B>> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz::<B>))
        // intake
        .route("/api/FileUpload", post(file_upload::<B>))
        .route("/api/createpaymentintent", post(create_payment_intent::<B>))
        .route("/api/pricing", get(pricing_quote))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
