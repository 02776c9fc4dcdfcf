//! Turns one form submission, with its files already spooled to disk, into a
//! delivered project folder.
//!
//! Folder layout is fixed at two levels: `{root folder}/{project folder}/`,
//! with every file and the manifest placed directly in the project folder.

use crate::{
    errors::{IntakeError, IntakeResult},
    models::{manifest::CategorizedFile, submission::SubmissionRequest},
    services::{
        chunker::CHUNK_SIZE,
        manifest_builder::{MANIFEST_FILE_NAME, ManifestBuilder},
        naming::project_folder_name,
        pricing,
        storage_backend::StorageBackend,
        upload_session::{ProgressCallback, SpooledFile, UploadSessionDriver},
    },
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

pub const DEFAULT_ROOT_FOLDER: &str = "Song Improvement Services";

/// What the caller gets back after a successful submission.
#[derive(Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReceipt {
    pub project_folder: String,
    pub uploaded_count: usize,
    pub files: Vec<CategorizedFile>,
    pub manifest_id: String,
    pub total_price_cents: u64,
}

pub struct IntakeService<B> {
    backend: B,
    root_folder_name: String,
    chunk_size: u64,
}

impl<B: StorageBackend> IntakeService<B> {
    pub fn new(backend: B, root_folder_name: impl Into<String>) -> Self {
        Self {
            backend,
            root_folder_name: root_folder_name.into(),
            chunk_size: CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Validate, upload every file in order, then write the manifest.
    ///
    /// The first file that fails aborts the submission; files already
    /// uploaded stay in the project folder and no manifest is written.
    pub async fn submit(
        &self,
        request: &SubmissionRequest,
        now: DateTime<Utc>,
    ) -> IntakeResult<SubmissionReceipt> {
        request.validate()?;

        let plan = ManifestBuilder::plan(&request.files);
        let price = pricing::quote(request.service, request.files.len())?;
        let project_folder =
            project_folder_name(&request.artist_name, &request.files[0].original_name, now);

        let root_id = self.backend.drive_root_id().await?;
        let service_root = self
            .backend
            .ensure_child_folder(&root_id, &self.root_folder_name)
            .await?;
        let project = self
            .backend
            .ensure_child_folder(&service_root.id, &project_folder)
            .await?;

        let progress: ProgressCallback = Box::new(|p| {
            debug!(
                file = %p.file_name,
                sent = p.bytes_sent,
                total = p.total_size,
                "upload progress"
            );
        });
        let driver = UploadSessionDriver::new(&self.backend)
            .with_chunk_size(self.chunk_size)
            .with_progress(&progress);

        for (incoming, planned) in request.files.iter().zip(&plan) {
            info!(
                "Uploading {} -> {}/{}/{}",
                incoming.original_name, self.root_folder_name, project_folder, planned.saved_as
            );
            let file_failed = |err: IntakeError| IntakeError::FileFailed {
                file: incoming.original_name.clone(),
                source: Box::new(err),
            };

            let mut source = SpooledFile::open(&incoming.spool_path)
                .await
                .map_err(|err| file_failed(err.into()))?;
            let session = driver
                .upload(&project.id, &planned.saved_as, &mut source)
                .await;
            let size = session.total_size();
            let item = session.into_result().map_err(file_failed)?;
            debug!(file = %planned.saved_as, id = %item.id, size, "file delivered");
        }

        let manifest = ManifestBuilder::build(
            request,
            plan.clone(),
            &project_folder,
            now,
            price.total_cents,
        );
        let json = ManifestBuilder::to_json(&manifest)?;
        let manifest_item = self
            .backend
            .put_small_file(
                &project.id,
                MANIFEST_FILE_NAME,
                "application/json",
                json.into_bytes(),
            )
            .await?;
        info!(
            folder = %project_folder,
            files = plan.len(),
            manifest = %manifest_item.id,
            "submission delivered"
        );

        Ok(SubmissionReceipt {
            project_folder,
            uploaded_count: plan.len(),
            files: plan,
            manifest_id: manifest_item.id,
            total_price_cents: price.total_cents,
        })
    }
}
