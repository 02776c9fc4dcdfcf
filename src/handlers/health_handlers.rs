//! Health & readiness handlers.
//!
//! - GET /healthz  -> simple liveness ("ok")
//! - GET /readyz   -> readiness that checks spool disk I/O and drive API access

use crate::{services::storage_backend::StorageBackend, state::AppState};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::{collections::HashMap, path::Path};
use tokio::fs;
use uuid::Uuid;

/// `GET /healthz`
///
/// Very small liveness check, always 200 OK. Never performs I/O.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /readyz`
///
/// Readiness check that:
/// 1. Performs a best-effort write/read/delete in the spool directory.
/// 2. Obtains an access token for the drive API.
///
/// HTTP 200 when all checks pass, HTTP 503 when any check fails.
pub async fn readyz<B: StorageBackend + 'static>(
    State(state): State<AppState<B>>,
) -> impl IntoResponse {
    let disk = disk_check(&state.spool_dir).await;
    let storage = match state.intake.backend().check_access().await {
        Ok(()) => CheckStatus::ok(),
        Err(e) => {
            tracing::warn!(error = %e, "readiness: drive API unreachable");
            CheckStatus::failed("could not obtain an access token")
        }
    };

    let overall_ok = disk.ok && storage.ok;
    let mut checks = HashMap::new();
    checks.insert("disk", disk);
    checks.insert("storage", storage);

    let body = ReadyResponse {
        status: if overall_ok { "ok" } else { "error" }.into(),
        checks,
    };
    let status = if overall_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

async fn disk_check(dir: &Path) -> CheckStatus {
    let tmp_path = dir.join(format!(".readyz-{}", Uuid::new_v4()));
    if let Err(e) = fs::write(&tmp_path, b"readyz").await {
        return CheckStatus::failed(format!("could not write tmp file: {e}"));
    }

    let check = match fs::read(&tmp_path).await {
        Ok(bytes) if bytes == b"readyz" => CheckStatus::ok(),
        Ok(_) => CheckStatus::failed("file content mismatch"),
        Err(e) => CheckStatus::failed(format!("could not read tmp file: {e}")),
    };
    // best-effort cleanup
    let _ = fs::remove_file(&tmp_path).await;
    check
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

impl CheckStatus {
    fn ok() -> Self {
        Self {
            ok: true,
            error: None,
        }
    }

    fn failed(msg: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(msg.into()),
        }
    }
}
