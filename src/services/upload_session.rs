//! Drives one file through an upload session, one range at a time.

use crate::{
    errors::{IntakeError, IntakeResult},
    models::drive_item::DriveItem,
    services::{
        chunk_uploader::ChunkOutcome,
        chunker::{ByteRange, ByteRangeChunker, CHUNK_SIZE},
        storage_backend::StorageBackend,
    },
};
use bytes::Bytes;
use serde::Serialize;
use std::{future::Future, io, io::SeekFrom, path::Path};
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncSeekExt},
};
use tracing::{debug, info, warn};

/// Random-access source of the bytes being uploaded.
pub trait ByteSource: Send {
    fn size(&self) -> u64;

    fn read_range(&mut self, range: &ByteRange) -> impl Future<Output = io::Result<Bytes>> + Send;
}

impl ByteSource for Bytes {
    fn size(&self) -> u64 {
        self.len() as u64
    }

    fn read_range(&mut self, range: &ByteRange) -> impl Future<Output = io::Result<Bytes>> + Send {
        let chunk = if range.end < self.len() as u64 {
            Ok(self.slice(range.start as usize..=range.end as usize))
        } else {
            Err(io::Error::from(io::ErrorKind::UnexpectedEof))
        };
        async move { chunk }
    }
}

/// A form upload spooled to local disk.
pub struct SpooledFile {
    file: File,
    size: u64,
}

impl SpooledFile {
    pub async fn open(path: &Path) -> io::Result<Self> {
        let file = File::open(path).await?;
        let size = file.metadata().await?.len();
        Ok(Self { file, size })
    }
}

impl ByteSource for SpooledFile {
    fn size(&self) -> u64 {
        self.size
    }

    async fn read_range(&mut self, range: &ByteRange) -> io::Result<Bytes> {
        self.file.seek(SeekFrom::Start(range.start)).await?;
        let mut buf = vec![0u8; range.len() as usize];
        self.file.read_exact(&mut buf).await?;
        Ok(Bytes::from(buf))
    }
}

/// Reported after every accepted chunk.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UploadProgress {
    pub file_name: String,
    pub bytes_sent: u64,
    pub total_size: u64,
}

/// Callback invoked with upload progress.
pub type ProgressCallback = Box<dyn Fn(UploadProgress) + Send + Sync>;

#[derive(Debug)]
pub enum SessionState {
    Idle,
    SessionRequested,
    Uploading,
    Completed(DriveItem),
    Failed(IntakeError),
}

/// One file's transfer. `bytes_sent` only moves after the backend accepts a chunk.
#[derive(Debug)]
pub struct UploadSession {
    upload_url: Option<String>,
    total_size: u64,
    bytes_sent: u64,
    state: SessionState,
}

impl UploadSession {
    fn new(total_size: u64) -> Self {
        Self {
            upload_url: None,
            total_size,
            bytes_sent: 0,
            state: SessionState::Idle,
        }
    }

    pub fn upload_url(&self) -> Option<&str> {
        self.upload_url.as_deref()
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.state, SessionState::Completed(_))
    }

    /// Completed item, or the error that ended the session.
    pub fn into_result(self) -> IntakeResult<DriveItem> {
        match self.state {
            SessionState::Completed(item) => Ok(item),
            SessionState::Failed(err) => Err(err),
            SessionState::Idle | SessionState::SessionRequested | SessionState::Uploading => {
                Err(IntakeError::ChunkTransport {
                    status: 0,
                    body: "upload session did not reach a terminal state".into(),
                })
            }
        }
    }

    fn accept(&mut self, len: u64) {
        self.bytes_sent += len;
        debug_assert!(self.bytes_sent <= self.total_size);
    }

    fn fail(&mut self, err: IntakeError) {
        self.state = SessionState::Failed(err);
    }
}

/// Sequential chunk loop over a [`StorageBackend`].
///
/// Never retries and never resumes: a failed file needs a fresh session.
pub struct UploadSessionDriver<'a, B> {
    backend: &'a B,
    chunk_size: u64,
    progress: Option<&'a ProgressCallback>,
}

impl<'a, B: StorageBackend> UploadSessionDriver<'a, B> {
    pub fn new(backend: &'a B) -> Self {
        Self {
            backend,
            chunk_size: CHUNK_SIZE,
            progress: None,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_progress(mut self, callback: &'a ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// Upload `source` as `file_name` into `folder_id`.
    ///
    /// Always returns the session in a terminal state.
    pub async fn upload<S: ByteSource>(
        &self,
        folder_id: &str,
        file_name: &str,
        source: &mut S,
    ) -> UploadSession {
        let mut session = UploadSession::new(source.size());

        let Some(chunker) = ByteRangeChunker::new(session.total_size, self.chunk_size) else {
            session.fail(IntakeError::Configuration(
                "chunk size must be positive".into(),
            ));
            return session;
        };
        if session.total_size == 0 {
            session.fail(IntakeError::Validation(format!("file `{file_name}` is empty")));
            return session;
        }

        session.state = SessionState::SessionRequested;
        let upload_url = match self
            .backend
            .create_upload_session(folder_id, file_name)
            .await
        {
            Ok(url) => url,
            Err(err) => {
                warn!(file = file_name, error = %err, "upload session refused");
                session.fail(err);
                return session;
            }
        };
        session.upload_url = Some(upload_url.clone());
        session.state = SessionState::Uploading;
        debug!(
            file = file_name,
            total = chunker.total(),
            chunks = chunker.count(),
            "upload session opened"
        );

        for range in chunker.ranges() {
            let payload = match source.read_range(&range).await {
                Ok(payload) => payload,
                Err(err) => {
                    session.fail(IntakeError::Io(err));
                    return session;
                }
            };

            let outcome = match self.backend.put_chunk(&upload_url, &range, payload).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!(file = file_name, range = %range.content_range(), error = %err, "chunk transport error");
                    session.fail(err);
                    return session;
                }
            };

            match outcome {
                ChunkOutcome::Continue => {
                    session.accept(range.len());
                    self.report(file_name, &session);
                    if range.is_last() {
                        session.fail(IntakeError::ChunkTransport {
                            status: 202,
                            body: "upload did not complete after the final range".into(),
                        });
                        return session;
                    }
                }
                ChunkOutcome::Final(item) => {
                    session.accept(range.len());
                    self.report(file_name, &session);
                    if session.bytes_sent == session.total_size {
                        info!(file = file_name, id = %item.id, size = item.size, "upload complete");
                        session.state = SessionState::Completed(item);
                    } else {
                        session.fail(IntakeError::ChunkTransport {
                            status: 200,
                            body: format!(
                                "session completed after {} of {} bytes",
                                session.bytes_sent, session.total_size
                            ),
                        });
                    }
                    return session;
                }
                ChunkOutcome::Failed { status, body } => {
                    warn!(file = file_name, range = %range.content_range(), status, "chunk rejected");
                    session.fail(IntakeError::ChunkTransport { status, body });
                    return session;
                }
            }
        }

        session
    }

    fn report(&self, file_name: &str, session: &UploadSession) {
        if let Some(callback) = self.progress {
            callback(UploadProgress {
                file_name: file_name.to_string(),
                bytes_sent: session.bytes_sent,
                total_size: session.total_size,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{BackendCall, FakeBackend};
    use std::sync::{Arc, Mutex};

    const MIB: u64 = 1024 * 1024;

    fn progress_log() -> (ProgressCallback, Arc<Mutex<Vec<UploadProgress>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let cb: ProgressCallback = Box::new(move |p| sink.lock().unwrap().push(p));
        (cb, log)
    }

    #[tokio::test]
    async fn twelve_mib_upload_sends_three_ranges_and_completes() {
        let backend = FakeBackend::new();
        let mut source = Bytes::from(vec![7u8; (12 * MIB) as usize]);

        let session = UploadSessionDriver::new(&backend)
            .upload("proj", "vocals_V1.wav", &mut source)
            .await;

        assert!(session.is_completed());
        assert_eq!(session.bytes_sent(), 12 * MIB);
        let sent = backend.chunk_calls();
        let headers: Vec<_> = sent.iter().map(|(r, _)| r.content_range()).collect();
        assert_eq!(
            headers,
            vec![
                "bytes 0-5242879/12582912",
                "bytes 5242880-10485759/12582912",
                "bytes 10485760-12582911/12582912",
            ]
        );
        let lens: Vec<_> = sent.iter().map(|(_, len)| *len).collect();
        assert_eq!(lens, vec![5 * MIB, 5 * MIB, 2 * MIB]);

        let item = session.into_result().unwrap();
        assert_eq!(item.size, 12 * MIB);
    }

    #[tokio::test]
    async fn bytes_sent_tracks_accepted_chunks() {
        let backend = FakeBackend::new();
        let (cb, log) = progress_log();
        let mut source = Bytes::from_static(b"0123456789abcdefghijk");

        let session = UploadSessionDriver::new(&backend)
            .with_chunk_size(5)
            .with_progress(&cb)
            .upload("proj", "vocals_V1.wav", &mut source)
            .await;

        assert!(session.is_completed());
        let sent: Vec<_> = log.lock().unwrap().iter().map(|p| p.bytes_sent).collect();
        assert_eq!(sent, vec![5, 10, 15, 20, 21]);
        assert!(log.lock().unwrap().iter().all(|p| p.total_size == 21));
    }

    #[tokio::test]
    async fn failed_second_chunk_stops_the_loop() {
        let backend = FakeBackend::new().with_chunk_replies(vec![
            ChunkOutcome::Continue,
            ChunkOutcome::Failed {
                status: 500,
                body: "server error".into(),
            },
        ]);
        let mut source = Bytes::from(vec![1u8; 30]);

        let session = UploadSessionDriver::new(&backend)
            .with_chunk_size(10)
            .upload("proj", "vocals_V1.wav", &mut source)
            .await;

        assert_eq!(session.bytes_sent(), 10);
        assert_eq!(backend.chunk_calls().len(), 2);
        match session.into_result() {
            Err(IntakeError::ChunkTransport { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body, "server error");
            }
            other => panic!("expected chunk failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn refused_session_sends_no_chunks() {
        let backend = FakeBackend::new().with_session_error(409, "nameAlreadyExists");
        let mut source = Bytes::from_static(b"abc");

        let session = UploadSessionDriver::new(&backend)
            .upload("proj", "vocals_V1.wav", &mut source)
            .await;

        assert!(session.upload_url().is_none());
        assert!(backend.chunk_calls().is_empty());
        assert!(matches!(
            session.into_result(),
            Err(IntakeError::Session { status: 409, .. })
        ));
    }

    #[tokio::test]
    async fn empty_source_never_opens_a_session() {
        let backend = FakeBackend::new();
        let mut source = Bytes::new();

        let session = UploadSessionDriver::new(&backend)
            .upload("proj", "vocals_V1.wav", &mut source)
            .await;

        assert!(backend.calls().is_empty());
        assert!(matches!(
            session.into_result(),
            Err(IntakeError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn continue_on_last_range_is_a_failure() {
        let backend = FakeBackend::new()
            .with_chunk_replies(vec![ChunkOutcome::Continue, ChunkOutcome::Continue]);
        let mut source = Bytes::from(vec![0u8; 8]);

        let session = UploadSessionDriver::new(&backend)
            .with_chunk_size(4)
            .upload("proj", "vocals_V1.wav", &mut source)
            .await;

        assert_eq!(session.bytes_sent(), 8);
        assert!(matches!(
            session.state(),
            SessionState::Failed(IntakeError::ChunkTransport { status: 202, .. })
        ));
    }

    #[tokio::test]
    async fn early_final_response_is_a_failure() {
        let item = DriveItem {
            id: "x".into(),
            name: "vocals_V1.wav".into(),
            size: 4,
            web_url: None,
            folder: None,
        };
        let backend = FakeBackend::new().with_chunk_replies(vec![ChunkOutcome::Final(item)]);
        let mut source = Bytes::from(vec![0u8; 8]);

        let session = UploadSessionDriver::new(&backend)
            .with_chunk_size(4)
            .upload("proj", "vocals_V1.wav", &mut source)
            .await;

        assert_eq!(backend.chunk_calls().len(), 1);
        assert!(!session.is_completed());
    }

    #[tokio::test]
    async fn spooled_file_reads_exact_ranges() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("take.wav");
        std::fs::write(&path, b"HelloWorld!").unwrap();

        let backend = FakeBackend::new();
        let mut source = SpooledFile::open(&path).await.unwrap();
        assert_eq!(source.size(), 11);

        let session = UploadSessionDriver::new(&backend)
            .with_chunk_size(4)
            .upload("proj", "vocals_V1.wav", &mut source)
            .await;

        assert!(session.is_completed());
        let payloads: Vec<_> = backend
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                BackendCall::PutChunk { payload, .. } => Some(payload),
                _ => None,
            })
            .collect();
        assert_eq!(payloads, vec![b"Hell".to_vec(), b"oWor".to_vec(), b"ld!".to_vec()]);
    }
}
