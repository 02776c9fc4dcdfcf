//! Single-range PUT against an upload-session URL.

use crate::{
    errors::{IntakeError, IntakeResult, response_text},
    models::drive_item::DriveItem,
    services::chunker::ByteRange,
};
use bytes::Bytes;
use reqwest::{
    StatusCode,
    header::{CONTENT_LENGTH, CONTENT_RANGE},
};
use std::io;

/// How the storage backend answered one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// Accepted, more ranges expected.
    Continue,
    /// Accepted and the upload is complete.
    Final(DriveItem),
    /// Anything else.
    Failed { status: u16, body: String },
}

/// Map a chunk response onto [`ChunkOutcome`].
///
/// A 200/201 whose body is not an item is treated as a failure: the
/// session may have completed, but the caller cannot prove it.
pub fn classify(status: StatusCode, body: &str) -> ChunkOutcome {
    match status {
        StatusCode::ACCEPTED => ChunkOutcome::Continue,
        StatusCode::OK | StatusCode::CREATED => match serde_json::from_str::<DriveItem>(body) {
            Ok(item) => ChunkOutcome::Final(item),
            Err(_) => ChunkOutcome::Failed {
                status: status.as_u16(),
                body: body.to_string(),
            },
        },
        other => ChunkOutcome::Failed {
            status: other.as_u16(),
            body: body.to_string(),
        },
    }
}

/// Sends chunks to pre-authenticated session URLs.
///
/// No `Authorization` header is attached; the session URL carries its own
/// credentials and Graph rejects bearer tokens on it.
#[derive(Clone)]
pub struct ChunkUploader {
    http: reqwest::Client,
}

impl ChunkUploader {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Issues exactly one PUT; never retries.
    pub async fn upload(
        &self,
        upload_url: &str,
        range: &ByteRange,
        payload: Bytes,
    ) -> IntakeResult<ChunkOutcome> {
        if payload.len() as u64 != range.len() {
            return Err(IntakeError::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "payload of {} bytes does not match range {}",
                    payload.len(),
                    range.content_range()
                ),
            )));
        }

        let resp = self
            .http
            .put(upload_url)
            .header(CONTENT_LENGTH, payload.len())
            .header(CONTENT_RANGE, range.content_range())
            .body(payload)
            .send()
            .await?;

        let status = resp.status();
        let body = response_text(resp).await;
        Ok(classify(status, &body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockResponse, MockServer};

    fn range(start: u64, end: u64, total: u64) -> ByteRange {
        ByteRange { start, end, total }
    }

    #[test]
    fn classify_accepted_is_continue() {
        assert_eq!(
            classify(StatusCode::ACCEPTED, r#"{"nextExpectedRanges":["4-"]}"#),
            ChunkOutcome::Continue
        );
    }

    #[test]
    fn classify_created_with_item_is_final() {
        let outcome = classify(
            StatusCode::CREATED,
            r#"{"id":"01ABC","name":"vocals_V1.wav","size":10}"#,
        );
        match outcome {
            ChunkOutcome::Final(item) => {
                assert_eq!(item.id, "01ABC");
                assert_eq!(item.size, 10);
            }
            other => panic!("expected final, got {other:?}"),
        }
    }

    #[test]
    fn classify_ok_without_item_is_failed() {
        assert_eq!(
            classify(StatusCode::OK, "not json"),
            ChunkOutcome::Failed {
                status: 200,
                body: "not json".into()
            }
        );
    }

    #[test]
    fn classify_other_status_keeps_body() {
        assert_eq!(
            classify(StatusCode::RANGE_NOT_SATISFIABLE, "bad range"),
            ChunkOutcome::Failed {
                status: 416,
                body: "bad range".into()
            }
        );
    }

    #[tokio::test]
    async fn upload_sends_range_headers_without_auth() {
        let mut server = MockServer::bind().await;
        let handle = server.serve(vec![MockResponse::json(202, "{}")]);
        let uploader = ChunkUploader::new(reqwest::Client::new());

        let url = format!("{}/upload/session-1", server.url());
        let outcome = uploader
            .upload(&url, &range(0, 3, 10), Bytes::from_static(b"abcd"))
            .await
            .unwrap();
        handle.await.unwrap();

        assert_eq!(outcome, ChunkOutcome::Continue);
        let reqs = server.requests();
        assert_eq!(reqs.len(), 1);
        assert_eq!(reqs[0].method, "PUT");
        assert_eq!(reqs[0].path, "/upload/session-1");
        assert_eq!(reqs[0].header("content-range"), Some("bytes 0-3/10"));
        assert_eq!(reqs[0].header("content-length"), Some("4"));
        assert_eq!(reqs[0].header("authorization"), None);
        assert_eq!(reqs[0].body, b"abcd");
    }

    #[tokio::test]
    async fn unreadable_error_body_is_reported_empty() {
        let mut server = MockServer::bind().await;
        let handle = server.serve(vec![MockResponse::text(500, "partial").truncated()]);
        let uploader = ChunkUploader::new(reqwest::Client::new());

        let url = format!("{}/upload/session-1", server.url());
        let outcome = uploader
            .upload(&url, &range(0, 3, 4), Bytes::from_static(b"abcd"))
            .await
            .unwrap();
        handle.await.unwrap();

        assert_eq!(
            outcome,
            ChunkOutcome::Failed {
                status: 500,
                body: String::new()
            }
        );
    }

    #[tokio::test]
    async fn upload_rejects_mismatched_payload() {
        let uploader = ChunkUploader::new(reqwest::Client::new());
        let err = uploader
            .upload(
                "http://127.0.0.1:9/never",
                &range(0, 9, 10),
                Bytes::from_static(b"short"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, IntakeError::Io(_)));
    }
}
