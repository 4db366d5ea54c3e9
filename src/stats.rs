use std::sync::atomic::{AtomicU64, Ordering};

use crate::RelayOutcome;

/// Byte totals across many relays, owned by the caller and typically
/// shared between handlers behind an `Arc`.
#[derive(Debug, Default)]
pub struct TransferCounters {
    downloaded: AtomicU64,
    uploaded: AtomicU64,
}

impl TransferCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the bytes a download relay delivered, including relays the
    /// client cut short.
    pub fn record_download(&self, outcome: &RelayOutcome) {
        self.downloaded.fetch_add(outcome.bytes_transferred, Ordering::Relaxed);
    }

    pub fn record_upload(&self, bytes: u64) {
        self.uploaded.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn bytes_downloaded(&self) -> u64 {
        self.downloaded.load(Ordering::Relaxed)
    }

    pub fn bytes_uploaded(&self) -> u64 {
        self.uploaded.load(Ordering::Relaxed)
    }
}
