//! Microsoft Graph drive client.
//!
//! Async HTTP client using `reqwest` with bearer tokens from
//! [`TokenProvider`]. Only the handful of drive operations the intake flow
//! needs are implemented.

use crate::{
    errors::{IntakeError, IntakeResult, response_text},
    models::drive_item::{DriveItem, DriveItemList, UploadSessionInfo},
    services::{
        chunk_uploader::{ChunkOutcome, ChunkUploader},
        chunker::ByteRange,
        identity::TokenProvider,
        storage_backend::StorageBackend,
    },
};
use bytes::Bytes;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::{
    Response,
    header::{AUTHORIZATION, CONTENT_TYPE},
};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, info};

pub const DEFAULT_GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";
pub const DEFAULT_LOGIN_BASE_URL: &str = "https://login.microsoftonline.com";

/// Characters kept verbatim inside a `:/{name}:` path segment.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

pub struct GraphClient {
    http: reqwest::Client,
    base_url: String,
    drive_id: String,
    tokens: TokenProvider,
    chunks: ChunkUploader,
}

impl GraphClient {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        drive_id: impl Into<String>,
        tokens: TokenProvider,
    ) -> Self {
        Self {
            chunks: ChunkUploader::new(http.clone()),
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            drive_id: drive_id.into(),
            tokens,
        }
    }

    fn drive_url(&self, tail: &str) -> String {
        format!("{}/drives/{}{}", self.base_url, self.drive_id, tail)
    }

    fn item_path_url(&self, folder_id: &str, name: &str, action: &str) -> String {
        let encoded = utf8_percent_encode(name, PATH_SEGMENT);
        self.drive_url(&format!("/items/{folder_id}:/{encoded}:/{action}"))
    }

    async fn bearer(&self) -> IntakeResult<String> {
        Ok(format!("Bearer {}", self.tokens.token().await?))
    }
}

/// Decode a success body, or turn the status and body into an error.
async fn read_json<T: DeserializeOwned>(
    resp: Response,
    on_error: impl FnOnce(u16, String) -> IntakeError,
) -> IntakeResult<T> {
    let status = resp.status();
    if !status.is_success() {
        let body = response_text(resp).await;
        return Err(on_error(status.as_u16(), body));
    }
    Ok(resp.json().await?)
}

fn folder_error(status: u16, body: String) -> IntakeError {
    IntakeError::Folder { status, body }
}

impl StorageBackend for GraphClient {
    /// Succeeds when a token can be obtained.
    async fn check_access(&self) -> IntakeResult<()> {
        self.tokens.token().await.map(|_| ())
    }

    async fn drive_root_id(&self) -> IntakeResult<String> {
        let resp = self
            .http
            .get(self.drive_url("/root"))
            .query(&[("$select", "id")])
            .header(AUTHORIZATION, self.bearer().await?)
            .send()
            .await?;
        let root: DriveItem = read_json(resp, folder_error).await?;
        Ok(root.id)
    }

    async fn ensure_child_folder(&self, parent_id: &str, name: &str) -> IntakeResult<DriveItem> {
        let auth = self.bearer().await?;
        let children_url = self.drive_url(&format!("/items/{parent_id}/children"));

        let mut request = self
            .http
            .get(&children_url)
            .query(&[("$select", "id,name,folder"), ("$top", "999")]);
        loop {
            let resp = request.header(AUTHORIZATION, &auth).send().await?;
            let page: DriveItemList = read_json(resp, folder_error).await?;

            if let Some(existing) = page.value.into_iter().find(|c| c.name == name) {
                debug!(folder = name, id = %existing.id, "reusing existing folder");
                return Ok(existing);
            }
            // Next-page links are absolute and already carry the query.
            match page.next_link {
                Some(next) => request = self.http.get(next),
                None => break,
            }
        }

        let resp = self
            .http
            .post(&children_url)
            .header(AUTHORIZATION, &auth)
            .json(&json!({
                "name": name,
                "folder": {},
                "@microsoft.graph.conflictBehavior": "fail",
            }))
            .send()
            .await?;
        let created: DriveItem = read_json(resp, folder_error).await?;
        info!(folder = name, id = %created.id, "created folder");
        Ok(created)
    }

    async fn create_upload_session(&self, folder_id: &str, file_name: &str) -> IntakeResult<String> {
        let resp = self
            .http
            .post(self.item_path_url(folder_id, file_name, "createUploadSession"))
            .header(AUTHORIZATION, self.bearer().await?)
            .json(&json!({
                "item": { "@microsoft.graph.conflictBehavior": "fail" }
            }))
            .send()
            .await?;
        let session: UploadSessionInfo =
            read_json(resp, |status, body| IntakeError::Session { status, body }).await?;
        debug!(
            file = file_name,
            expires = session.expiration_date_time.as_deref().unwrap_or("unknown"),
            "upload session created"
        );
        Ok(session.upload_url)
    }

    async fn put_chunk(
        &self,
        upload_url: &str,
        range: &ByteRange,
        payload: Bytes,
    ) -> IntakeResult<ChunkOutcome> {
        self.chunks.upload(upload_url, range, payload).await
    }

    async fn put_small_file(
        &self,
        folder_id: &str,
        name: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> IntakeResult<DriveItem> {
        let resp = self
            .http
            .put(self.item_path_url(folder_id, name, "content"))
            .header(AUTHORIZATION, self.bearer().await?)
            .header(CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await?;
        read_json(resp, |status, body| IntakeError::Manifest { status, body }).await
    }
}
