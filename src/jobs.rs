//
// jobs.rs
// dicom-headers
//
// Runs scans and header decodes off the caller's thread and streams job-scoped messages back.
//

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::warn;

use crate::dictionary::TagDictionary;
use crate::headers;
use crate::index::{self, ScanProgress};
use crate::models::{DicomIndex, HeaderNode};

/// Opaque identifier tying progress and terminal messages to one job.
pub type JobId = String;

static NEXT_JOB_ID: AtomicU64 = AtomicU64::new(1);

fn next_job_id() -> JobId {
    format!("job-{}", NEXT_JOB_ID.fetch_add(1, Ordering::Relaxed))
}

/// Messages emitted while a scan job runs: zero or more `progress`, then
/// exactly one of `result` or `error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ScanMessage {
    #[serde(rename_all = "camelCase")]
    Progress {
        job_id: JobId,
        percent: f64,
        current_path: Option<PathBuf>,
    },
    #[serde(rename_all = "camelCase")]
    Result { job_id: JobId, index: DicomIndex },
    #[serde(rename_all = "camelCase")]
    Error { job_id: JobId, error: String },
}

/// Reply for a one-shot header decode: the node list, or an error payload
/// in place of a thrown failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HeadersReply {
    Headers(Vec<HeaderNode>),
    Error { error: String },
}

/// Start an asynchronous directory scan. The work runs on the blocking
/// pool; the returned receiver yields progress messages and then one
/// terminal message. Must be called from within a tokio runtime.
pub fn start_scan(root: PathBuf) -> (JobId, UnboundedReceiver<ScanMessage>) {
    let job_id = next_job_id();
    let (tx, rx) = mpsc::unbounded_channel();

    let id = job_id.clone();
    tokio::task::spawn_blocking(move || {
        let progress_tx = tx.clone();
        let progress_id = id.clone();
        // Per-file failures are absorbed inside the scan; anything that
        // escapes is a structural failure of the job itself.
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            index::scan_directory(&root, |progress: ScanProgress| {
                let _ = progress_tx.send(ScanMessage::Progress {
                    job_id: progress_id.clone(),
                    percent: progress.percent,
                    current_path: progress.current_path,
                });
            })
        }));

        let terminal = match outcome {
            Ok(index) => ScanMessage::Result { job_id: id, index },
            Err(panic) => {
                let error = describe_panic(&panic);
                warn!(%error, "scan job failed");
                ScanMessage::Error { job_id: id, error }
            }
        };
        // A dropped receiver just means nobody is listening anymore.
        let _ = tx.send(terminal);
    });

    (job_id, rx)
}

/// Decode one file's header tree off the caller's thread. Resolves to an
/// error payload rather than panicking the host, whatever went wrong.
pub async fn get_headers(path: PathBuf) -> HeadersReply {
    let display_path = path.display().to_string();
    let handle = tokio::task::spawn_blocking(move || {
        headers::read_header_tree(&path, TagDictionary::shared())
    });

    match handle.await {
        Ok(Ok(nodes)) => HeadersReply::Headers(nodes),
        Ok(Err(err)) => HeadersReply::Error {
            error: format!("{}: {}", display_path, err),
        },
        Err(join_err) => HeadersReply::Error {
            error: format!("{}: header worker failed: {}", display_path, join_err),
        },
    }
}

fn describe_panic(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "scan worker panicked".to_string()
    }
}
