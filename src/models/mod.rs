//! Core data models for the intake portal.
//!
//! Submission values flow in from the form, drive items come back from the
//! storage API, and the manifest records what was delivered. All of them
//! serialize as JSON via `serde`.

pub mod category;
pub mod drive_item;
pub mod manifest;
pub mod submission;
