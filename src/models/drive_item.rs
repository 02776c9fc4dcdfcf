//! Wire shapes returned by the drive API.

use serde::{Deserialize, Serialize};

/// A file or folder stored in the drive.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DriveItem {
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub size: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_url: Option<String>,

    /// Present only on folders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<serde_json::Value>,
}

/// `GET .../children` envelope. `next_link` is set while more pages remain.
#[derive(Deserialize, Debug)]
pub struct DriveItemList {
    #[serde(default)]
    pub value: Vec<DriveItem>,

    #[serde(default, rename = "@odata.nextLink")]
    pub next_link: Option<String>,
}

/// Response to `createUploadSession`.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UploadSessionInfo {
    pub upload_url: String,

    #[serde(default)]
    pub expiration_date_time: Option<String>,
}
