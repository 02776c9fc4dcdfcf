//! The seam between the upload logic and the remote drive API.

use crate::{
    errors::IntakeResult,
    models::drive_item::DriveItem,
    services::{chunk_uploader::ChunkOutcome, chunker::ByteRange},
};
use bytes::Bytes;
use std::future::Future;

/// Operations the intake flow needs from the remote file store.
///
/// [`GraphClient`](crate::services::graph_client::GraphClient) is the
/// production implementation; tests substitute an in-memory fake.
pub trait StorageBackend: Send + Sync {
    /// Cheap reachability check for `/readyz`.
    fn check_access(&self) -> impl Future<Output = IntakeResult<()>> + Send;

    /// Identifier of the drive's root folder.
    fn drive_root_id(&self) -> impl Future<Output = IntakeResult<String>> + Send;

    /// Return the child folder named exactly `name`, creating it if absent.
    fn ensure_child_folder(
        &self,
        parent_id: &str,
        name: &str,
    ) -> impl Future<Output = IntakeResult<DriveItem>> + Send;

    /// Open an upload session for `file_name` inside `folder_id`; returns the session URL.
    fn create_upload_session(
        &self,
        folder_id: &str,
        file_name: &str,
    ) -> impl Future<Output = IntakeResult<String>> + Send;

    /// Send one range to an open session.
    fn put_chunk(
        &self,
        upload_url: &str,
        range: &ByteRange,
        payload: Bytes,
    ) -> impl Future<Output = IntakeResult<ChunkOutcome>> + Send;

    /// Single-request upload for small files such as the manifest.
    fn put_small_file(
        &self,
        folder_id: &str,
        name: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> impl Future<Output = IntakeResult<DriveItem>> + Send;
}
