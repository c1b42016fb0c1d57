//! Channel infrastructure for the background pipelines.
//!
//! The sync pipeline moves adapter batches through a bounded channel so the
//! producer (venue fetch) naturally waits while the consumer persists; the
//! shutdown watch pair fans a single stop signal out to every long-running
//! task.

use crate::adapters::RawEvent;
use tokio::sync::{mpsc, watch};

/// Sync batches are handed over one at a time: the producer blocks on the
/// channel while the previous batch is being persisted.
pub const SYNC_CHANNEL_BUFFER: usize = 1;

/// Sender handle for sync batches.
pub type SyncBatchSender = mpsc::Sender<Vec<RawEvent>>;
/// Receiver handle for sync batches.
pub type SyncBatchReceiver = mpsc::Receiver<Vec<RawEvent>>;

/// Create the producer/consumer channel for one sync run.
pub fn sync_batch_channel() -> (SyncBatchSender, SyncBatchReceiver) {
    mpsc::channel(SYNC_CHANNEL_BUFFER)
}

/// Sender half of the shutdown signal. Set to `true` to stop all
/// processors.
pub type ShutdownSender = watch::Sender<bool>;
/// Receiver half of the shutdown signal.
pub type ShutdownReceiver = watch::Receiver<bool>;

/// Create the shutdown watch pair.
pub fn shutdown_channel() -> (ShutdownSender, ShutdownReceiver) {
    watch::channel(false)
}
