//! HTTP handlers for order intake: the multipart upload form, pricing quotes
//! and payment intents.
//!
//! File fields are streamed to the spool directory as they arrive and the
//! spooled copies are removed once the request is finished, whatever the
//! outcome.

use crate::{
    errors::{AppError, IntakeError, IntakeResult},
    models::{
        category::Category,
        submission::{IncomingFile, ServiceType, SubmissionRequest, UploadMode, categories_for},
    },
    services::{
        payment::PaymentIntentRequest,
        pricing::{self, PriceQuote},
        storage_backend::StorageBackend,
    },
    state::AppState,
};
use axum::{
    Json,
    extract::{Multipart, Query, State, multipart::MultipartError},
    http::StatusCode,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashMap},
    path::{Path, PathBuf},
};
use tokio::{fs::File, io::AsyncWriteExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Form field name used by older clients for every file.
const LEGACY_FILES_FIELD: &str = "files";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub ok: bool,
    pub project_folder: String,
    pub uploaded_count: usize,
    pub files: Vec<String>,
    pub manifest_id: String,
    pub total_price_cents: u64,
}

/// `POST /api/FileUpload`
pub async fn file_upload<B: StorageBackend + 'static>(
    State(state): State<AppState<B>>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut spool = SpoolGuard::default();
    let form = read_form(multipart, &state.spool_dir, &mut spool).await?;
    let request = build_request(form)?;

    info!(
        artist = %request.artist_name,
        service = request.service.as_str(),
        files = request.files.len(),
        "submission received"
    );
    let receipt = state.intake.submit(&request, Utc::now()).await?;

    Ok(Json(UploadResponse {
        ok: true,
        project_folder: receipt.project_folder,
        uploaded_count: receipt.uploaded_count,
        files: receipt.files.into_iter().map(|f| f.saved_as).collect(),
        manifest_id: receipt.manifest_id,
        total_price_cents: receipt.total_price_cents,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingQuery {
    pub service_type: String,
    #[serde(default)]
    pub file_count: usize,
}

/// `GET /api/pricing?serviceType=&fileCount=`
pub async fn pricing_quote(Query(q): Query<PricingQuery>) -> Result<Json<PriceQuote>, AppError> {
    let service: ServiceType = q.service_type.parse()?;
    Ok(Json(pricing::quote(service, q.file_count)?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentIntentBody {
    pub service_type: String,
    pub file_count: usize,
    pub currency: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentIntentResponse {
    pub client_secret: String,
    pub payment_intent_id: String,
    pub amount_cents: u64,
}

/// `POST /api/createpaymentintent`
///
/// The amount is always computed here from the service and file count.
pub async fn create_payment_intent<B: StorageBackend + 'static>(
    State(state): State<AppState<B>>,
    Json(body): Json<CreatePaymentIntentBody>,
) -> Result<Json<CreatePaymentIntentResponse>, AppError> {
    let Some(payments) = state.payments.as_ref() else {
        return Err(AppError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "payments are not configured",
        ));
    };

    let service: ServiceType = body.service_type.parse()?;
    if body.file_count == 0 {
        return Err(IntakeError::Validation("`fileCount` must be at least 1".into()).into());
    }
    let quote = pricing::quote(service, body.file_count)?;

    let mut metadata = body.metadata;
    metadata.insert("serviceType".into(), service.as_str().into());
    metadata.insert("fileCount".into(), body.file_count.to_string());

    let intent = payments
        .create_payment_intent(&PaymentIntentRequest {
            amount_cents: quote.total_cents,
            currency: body.currency.unwrap_or_else(|| "usd".into()),
            description: body
                .description
                .or_else(|| Some(format!("{} service", service.as_str()))),
            metadata,
        })
        .await?;

    Ok(Json(CreatePaymentIntentResponse {
        client_secret: intent.client_secret,
        payment_intent_id: intent.id,
        amount_cents: quote.total_cents,
    }))
}

/// Spool files created for one request; removed on drop.
#[derive(Default)]
struct SpoolGuard {
    paths: Vec<PathBuf>,
}

impl SpoolGuard {
    fn track(&mut self, path: PathBuf) {
        self.paths.push(path);
    }
}

impl Drop for SpoolGuard {
    fn drop(&mut self) {
        for path in &self.paths {
            if let Err(err) = std::fs::remove_file(path) {
                if err.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %err, "could not remove spool file");
                }
            }
        }
    }
}

/// A file field written to the spool; categorized once the whole form is read.
#[derive(Debug)]
struct SpooledField {
    field_name: String,
    file_name: String,
    size_bytes: u64,
    path: PathBuf,
}

#[derive(Debug, Default)]
struct FormData {
    text: HashMap<String, String>,
    files: Vec<SpooledField>,
}

fn multipart_error(err: MultipartError) -> AppError {
    AppError::new(err.status(), err.body_text())
}

async fn read_form(
    mut multipart: Multipart,
    spool_dir: &Path,
    spool: &mut SpoolGuard,
) -> Result<FormData, AppError> {
    let mut form = FormData::default();

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();

        let Some(file_name) = field.file_name().map(str::to_string) else {
            let value = field.text().await.map_err(multipart_error)?;
            form.text.insert(name, value);
            continue;
        };

        let path = spool_dir.join(Uuid::new_v4().to_string());
        spool.track(path.clone());

        let mut out = File::create(&path).await.map_err(IntakeError::from)?;
        let mut size_bytes = 0u64;
        while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
            size_bytes += chunk.len() as u64;
            out.write_all(&chunk).await.map_err(IntakeError::from)?;
        }
        out.flush().await.map_err(IntakeError::from)?;

        debug!(field = %name, file = %file_name, size = size_bytes, "spooled form file");
        form.files.push(SpooledField {
            field_name: name,
            file_name,
            size_bytes,
            path,
        });
    }

    Ok(form)
}

/// Category of a file field.
///
/// Fields are normally named by category key. The legacy `files` field
/// carries the form's filename prefix instead, resolved against the
/// categories the selected service accepts.
fn categorize(field_name: &str, file_name: &str, accepted: &[Category]) -> IntakeResult<Category> {
    if field_name == LEGACY_FILES_FIELD {
        return Category::from_form_prefix(file_name, accepted).ok_or_else(|| {
            IntakeError::Validation(format!("cannot determine the category of `{file_name}`"))
        });
    }

    field_name
        .parse::<Category>()
        .map_err(|err| IntakeError::Validation(err.to_string()))
}

fn build_request(form: FormData) -> IntakeResult<SubmissionRequest> {
    let FormData { mut text, files } = form;
    let mut take = |key: &str| {
        text.remove(key)
            .map(|v| v.trim().to_string())
            .unwrap_or_default()
    };
    let optional = |value: String| (!value.is_empty()).then_some(value);

    let service_type = take("serviceType");
    if service_type.is_empty() {
        return Err(IntakeError::Validation("`serviceType` is required".into()));
    }
    let service: ServiceType = service_type.parse()?;
    let mode: UploadMode = take("uploadMode").parse()?;

    let accepted = categories_for(service, mode);
    let files = files
        .into_iter()
        .map(|f| {
            Ok(IncomingFile {
                category: categorize(&f.field_name, &f.file_name, accepted)?,
                original_name: f.file_name,
                size_bytes: f.size_bytes,
                spool_path: f.path,
            })
        })
        .collect::<IntakeResult<Vec<_>>>()?;

    let request = SubmissionRequest {
        service,
        mode,
        artist_name: take("artistName"),
        email: take("email"),
        phone: take("phone"),
        song_title: take("songTitle"),
        bpm: optional(take("bpm")),
        key: optional(take("key")),
        notes: optional(take("notes")),
        payment_intent_id: optional(take("paymentIntentId")),
        files,
    };

    if !text.is_empty() {
        debug!(fields = ?text.keys().collect::<Vec<_>>(), "ignoring unknown form fields");
    }
    Ok(request)
}
