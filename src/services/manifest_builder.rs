//! Sequence numbering and the order manifest.

use crate::{
    models::{
        category::Category,
        manifest::{CategorizedFile, ManifestRules, OrderDetails, OrderManifest},
        submission::{IncomingFile, SubmissionRequest},
    },
    services::naming::saved_name,
};
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::HashMap;

pub const MANIFEST_FILE_NAME: &str = "project_manifest.json";

pub struct ManifestBuilder;

impl ManifestBuilder {
    /// Assign per-category versions in input order and derive storage names.
    ///
    /// Runs before any upload, so transport outcomes cannot affect numbering.
    pub fn plan(files: &[IncomingFile]) -> Vec<CategorizedFile> {
        let mut counters: HashMap<Category, u32> = HashMap::new();
        files
            .iter()
            .map(|file| {
                let version = counters.entry(file.category).or_insert(0);
                *version += 1;
                CategorizedFile {
                    original_name: file.original_name.clone(),
                    saved_as: saved_name(file.category, *version, &file.original_name),
                    category: file.category,
                    version: *version,
                    size_bytes: file.size_bytes,
                }
            })
            .collect()
    }

    pub fn build(
        request: &SubmissionRequest,
        files: Vec<CategorizedFile>,
        project_folder: &str,
        submitted_at: DateTime<Utc>,
        total_price_cents: u64,
    ) -> OrderManifest {
        OrderManifest {
            submitted_at_utc: submitted_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            project_folder: project_folder.to_string(),
            payment_intent_id: request.payment_intent_id.clone(),
            order: OrderDetails {
                service: request.service,
                upload_mode: request.mode,
                artist_name: request.artist_name.trim().to_string(),
                email: request.email.trim().to_string(),
                phone: request.phone.trim().to_string(),
                song_title: request.song_title.trim().to_string(),
                bpm: request.bpm.clone(),
                key: request.key.clone(),
                notes: request.notes.clone(),
                total_price_cents,
            },
            files,
            rules: ManifestRules::default(),
        }
    }

    /// UTF-8 JSON, 2-space indentation.
    pub fn to_json(manifest: &OrderManifest) -> serde_json::Result<String> {
        serde_json::to_string_pretty(manifest)
    }
}
