//
// lib.rs
// dicom-headers
//
// Exposes the crate's modules and re-exports the engine entry points for both binary and library consumers.
//

// Public surface of the library: each module mirrors one engine concern.
pub mod cli;
pub mod dicom_access;
pub mod dictionary;
pub mod error;
pub mod headers;
pub mod index;
pub mod jobs;
pub mod metadata;
pub mod models;

pub use cli::{run as run_cli, Cli, Commands};
pub use error::EngineError;
pub use jobs::{get_headers, start_scan, HeadersReply, JobId, ScanMessage};
