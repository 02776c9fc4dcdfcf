//! The order manifest persisted next to the uploaded files.

use crate::models::{
    category::Category,
    submission::{ServiceType, UploadMode},
};
use serde::Serialize;

/// A source file with its assigned category sequence and storage name.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CategorizedFile {
    pub original_name: String,

    /// `{category}_V{version}{extension}`.
    pub saved_as: String,

    pub category: Category,

    /// 1-based, per category, in submission order.
    pub version: u32,

    pub size_bytes: u64,
}

/// Customer-facing order details copied from the form.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetails {
    pub service: ServiceType,
    pub upload_mode: UploadMode,
    pub artist_name: String,
    pub email: String,
    pub phone: String,
    pub song_title: String,
    pub bpm: Option<String>,
    pub key: Option<String>,
    pub notes: Option<String>,
    pub total_price_cents: u64,
}

/// Folder and versioning convention in force for every submission.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ManifestRules {
    pub single_folder: bool,
    pub no_subfolders: bool,
    pub versioning: &'static str,
}

impl Default for ManifestRules {
    fn default() -> Self {
        Self {
            single_folder: true,
            no_subfolders: true,
            versioning: "category_V#",
        }
    }
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OrderManifest {
    #[serde(rename = "submittedAtUTC")]
    pub submitted_at_utc: String,

    pub project_folder: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_intent_id: Option<String>,

    pub order: OrderDetails,

    pub files: Vec<CategorizedFile>,

    pub rules: ManifestRules,
}
