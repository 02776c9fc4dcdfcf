//! Intake core: chunked upload to the drive API, naming and manifests,
//! pricing and payment intents.

pub mod chunk_uploader;
pub mod chunker;
pub mod graph_client;
pub mod identity;
pub mod intake_service;
pub mod manifest_builder;
pub mod naming;
pub mod payment;
pub mod pricing;
pub mod storage_backend;
pub mod upload_session;
