//! Test doubles for the remote APIs.
//!
//! [`MockServer`] is a scripted HTTP server: each scripted response answers
//! exactly one connection and is sent with `Connection: close`, so the client
//! never reuses a socket. [`FakeBackend`] stands in for the drive API when no
//! wire traffic is needed.

use crate::{
    errors::{IntakeError, IntakeResult},
    models::drive_item::DriveItem,
    services::{
        chunk_uploader::ChunkOutcome, chunker::ByteRange, storage_backend::StorageBackend,
    },
};
use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

pub struct MockResponse {
    status: u16,
    content_type: &'static str,
    body: String,
    content_length: Option<usize>,
}

impl MockResponse {
    pub fn json(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: "application/json",
            body: body.into(),
            content_length: None,
        }
    }

    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: "text/plain",
            body: body.into(),
            content_length: None,
        }
    }

    /// Advertise more bytes than are sent, so reading the body fails.
    pub fn truncated(mut self) -> Self {
        self.content_length = Some(self.body.len() + 64);
        self
    }
}

pub struct MockServer {
    listener: Option<TcpListener>,
    url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockServer {
    pub async fn bind() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        Self {
            listener: Some(listener),
            url: format!("http://127.0.0.1:{port}"),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Answers the next `responses.len()` connections in order, then stops.
    pub fn serve(&mut self, responses: Vec<MockResponse>) -> JoinHandle<()> {
        let listener = self.listener.take().expect("mock server already serving");
        let requests = Arc::clone(&self.requests);

        tokio::spawn(async move {
            for response in responses {
                let Ok((mut stream, _)) = listener.accept().await else {
                    return;
                };
                if let Some(req) = read_request(&mut stream).await {
                    requests.lock().unwrap().push(req);
                }
                let head = format!(
                    "HTTP/1.1 {} Mock\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    response.status,
                    response.content_type,
                    response.content_length.unwrap_or(response.body.len())
                );
                let _ = stream.write_all(head.as_bytes()).await;
                let _ = stream.write_all(response.body.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        })
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

async fn read_request(stream: &mut TcpStream) -> Option<RecordedRequest> {
    let mut buf = Vec::new();
    let mut tmp = vec![0u8; 64 * 1024];

    let header_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let n = stream.read(&mut tmp).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&tmp[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();

    let content_length = headers
        .iter()
        .find(|(k, _)| k == "content-length")
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);

    let mut body = buf[header_end..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut tmp).await.ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&tmp[..n]);
    }
    body.truncate(content_length);

    Some(RecordedRequest {
        method,
        path,
        headers,
        body,
    })
}

// ---------------------------------------------------------------------------
// In-memory storage backend
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BackendCall {
    DriveRoot,
    EnsureFolder {
        parent: String,
        name: String,
        created: bool,
    },
    CreateSession {
        folder: String,
        name: String,
    },
    PutChunk {
        url: String,
        range: ByteRange,
        payload: Vec<u8>,
    },
    PutSmallFile {
        folder: String,
        name: String,
        content_type: String,
        body: Vec<u8>,
    },
}

/// Records every call; completes uploads on their last range unless scripted otherwise.
#[derive(Default)]
pub struct FakeBackend {
    calls: Mutex<Vec<BackendCall>>,
    folders: Mutex<Vec<(String, DriveItem)>>,
    chunk_replies: Mutex<VecDeque<ChunkOutcome>>,
    session_error: Option<(u16, String)>,
    failing_file: Option<String>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chunk_replies(self, replies: Vec<ChunkOutcome>) -> Self {
        *self.chunk_replies.lock().unwrap() = replies.into();
        self
    }

    pub fn with_session_error(mut self, status: u16, body: &str) -> Self {
        self.session_error = Some((status, body.to_string()));
        self
    }

    /// Every chunk of a session whose file name is `name` gets a 500.
    pub fn with_failing_file(mut self, name: &str) -> Self {
        self.failing_file = Some(name.to_string());
        self
    }

    pub fn with_existing_folder(self, parent: &str, name: &str, id: &str) -> Self {
        self.folders.lock().unwrap().push((parent.to_string(), folder_item(id, name)));
        self
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn chunk_calls(&self) -> Vec<(ByteRange, u64)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                BackendCall::PutChunk { range, payload, .. } => {
                    Some((range, payload.len() as u64))
                }
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: BackendCall) {
        self.calls.lock().unwrap().push(call);
    }
}

fn folder_item(id: &str, name: &str) -> DriveItem {
    DriveItem {
        id: id.to_string(),
        name: name.to_string(),
        size: 0,
        web_url: None,
        folder: Some(serde_json::json!({})),
    }
}

impl StorageBackend for FakeBackend {
    async fn check_access(&self) -> IntakeResult<()> {
        Ok(())
    }

    async fn drive_root_id(&self) -> IntakeResult<String> {
        self.record(BackendCall::DriveRoot);
        Ok("root".into())
    }

    async fn ensure_child_folder(&self, parent_id: &str, name: &str) -> IntakeResult<DriveItem> {
        let mut folders = self.folders.lock().unwrap();
        let existing = folders
            .iter()
            .find(|(parent, item)| parent == parent_id && item.name == name)
            .map(|(_, item)| item.clone());
        let created = existing.is_none();
        let item = match existing {
            Some(item) => item,
            None => {
                let item = folder_item(&format!("folder-{name}"), name);
                folders.push((parent_id.to_string(), item.clone()));
                item
            }
        };
        drop(folders);
        self.record(BackendCall::EnsureFolder {
            parent: parent_id.to_string(),
            name: name.to_string(),
            created,
        });
        Ok(item)
    }

    async fn create_upload_session(&self, folder_id: &str, file_name: &str) -> IntakeResult<String> {
        self.record(BackendCall::CreateSession {
            folder: folder_id.to_string(),
            name: file_name.to_string(),
        });
        if let Some((status, body)) = &self.session_error {
            return Err(IntakeError::Session {
                status: *status,
                body: body.clone(),
            });
        }
        Ok(format!("https://upload.test/{folder_id}/{file_name}"))
    }

    async fn put_chunk(
        &self,
        upload_url: &str,
        range: &ByteRange,
        payload: Bytes,
    ) -> IntakeResult<ChunkOutcome> {
        self.record(BackendCall::PutChunk {
            url: upload_url.to_string(),
            range: *range,
            payload: payload.to_vec(),
        });

        let file_name = upload_url.rsplit('/').next().unwrap_or_default().to_string();
        if self.failing_file.as_deref() == Some(file_name.as_str()) {
            return Ok(ChunkOutcome::Failed {
                status: 500,
                body: "internal error".into(),
            });
        }
        if let Some(reply) = self.chunk_replies.lock().unwrap().pop_front() {
            return Ok(reply);
        }
        if range.is_last() {
            Ok(ChunkOutcome::Final(DriveItem {
                id: format!("item-{file_name}"),
                name: file_name,
                size: range.total,
                web_url: None,
                folder: None,
            }))
        } else {
            Ok(ChunkOutcome::Continue)
        }
    }

    async fn put_small_file(
        &self,
        folder_id: &str,
        name: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> IntakeResult<DriveItem> {
        let size = body.len() as u64;
        self.record(BackendCall::PutSmallFile {
            folder: folder_id.to_string(),
            name: name.to_string(),
            content_type: content_type.to_string(),
            body,
        });
        Ok(DriveItem {
            id: format!("item-{name}"),
            name: name.to_string(),
            size,
            web_url: None,
            folder: None,
        })
    }
}
