//! Append-only test report.
//!
//! Each completed device adds one block:
//!
//! ```text
//! #### TEST RESULT - DEVICE: 2301-001 ####
//! {
//!   "device": { ... },
//!   "passed": true,
//!   "parameters": { ... }
//! }
//!
//! ```

use hbfactory_protocol::{encode_pretty, Result, TestResult};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

struct ReportInner {
    path: Option<PathBuf>,
    write_lock: Mutex<()>,
    entries_written: AtomicU64,
}

/// Serializes report appends so concurrent completions never interleave.
#[derive(Clone)]
pub struct ReportWriter {
    inner: Arc<ReportInner>,
}

impl ReportWriter {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_path(Some(path.into()))
    }

    /// A writer that accepts entries and discards them.
    #[must_use]
    pub fn disabled() -> Self {
        Self::with_path(None)
    }

    fn with_path(path: Option<PathBuf>) -> Self {
        Self {
            inner: Arc::new(ReportInner {
                path,
                write_lock: Mutex::new(()),
                entries_written: AtomicU64::new(0),
            }),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.inner.path.as_deref()
    }

    pub fn entries_written(&self) -> u64 {
        self.inner.entries_written.load(Ordering::Relaxed)
    }

    pub fn format_entry(result: &TestResult) -> Result<String> {
        let body = encode_pretty(result)?;
        Ok(format!(
            "#### TEST RESULT - DEVICE: {} ####\n{body}\n\n",
            result.serial()
        ))
    }

    /// Appends one entry with a single write.
    pub async fn append(&self, result: &TestResult) -> Result<()> {
        let entry = Self::format_entry(result)?;
        let Some(path) = &self.inner.path else {
            tracing::debug!(serial = %result.serial(), "Report disabled, entry dropped");
            return Ok(());
        };

        let _guard = self.inner.write_lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        file.write_all(entry.as_bytes()).await?;
        file.flush().await?;

        self.inner.entries_written.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(serial = %result.serial(), path = %path.display(), "Report entry appended");
        Ok(())
    }
}
