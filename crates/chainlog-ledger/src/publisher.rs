//! Checkpoint publishing.
//!
//! [`CheckpointPublisher`] is what the storage session calls after every
//! persisted record. It is synchronous and must never block or fail the
//! caller. [`ChannelPublisher`] satisfies that by queueing events on a
//! bounded channel that a background task drains into a [`LedgerSink`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use crate::error::{PublishError, Result};
use crate::messages::{Checkpoint, LedgerEvent, StreamAnnouncement};
use crate::sink::LedgerSink;

/// Fire-and-forget receiver of chain updates.
pub trait CheckpointPublisher: Send + Sync {
    /// Called once per persisted record.
    fn publish(&self, checkpoint: Checkpoint);

    /// Called once per newly created stream.
    fn announce_stream(&self, _announcement: StreamAnnouncement) {}
}

/// Publisher that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPublisher;

impl CheckpointPublisher for NoopPublisher {
    fn publish(&self, _checkpoint: Checkpoint) {}
}

/// Configuration for [`ChannelPublisher`].
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// Events that can wait for the sink before new ones are dropped.
    pub channel_capacity: usize,
    /// Upper bound on a single `LedgerSink::submit` call.
    pub submit_timeout: Duration,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
            submit_timeout: Duration::from_secs(5),
        }
    }
}

/// Counters shared between a publisher and its background task.
#[derive(Debug, Default)]
pub struct PublisherStats {
    published: AtomicU64,
    dropped: AtomicU64,
    failed: AtomicU64,
}

impl PublisherStats {
    /// Events the sink accepted.
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Events that never reached the sink because the channel was full or closed.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Events the sink rejected or did not answer in time.
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}

/// Publisher backed by a bounded tokio channel and a background task.
///
/// Clones share the channel and the stats. The background task ends once
/// every clone has been dropped and the queue is drained.
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    sender: mpsc::Sender<LedgerEvent>,
    stats: Arc<PublisherStats>,
}

impl ChannelPublisher {
    /// Spawn the background task on the current tokio runtime.
    pub fn spawn<K>(sink: K, config: PublisherConfig) -> Result<(Self, JoinHandle<()>)>
    where
        K: LedgerSink + 'static,
    {
        let runtime = Handle::try_current().map_err(|_| PublishError::NoRuntime)?;

        let (sender, receiver) = mpsc::channel(config.channel_capacity.max(1));
        let stats = Arc::new(PublisherStats::default());

        let task = runtime.spawn(drain(
            sink,
            receiver,
            Arc::clone(&stats),
            config.submit_timeout,
        ));

        Ok((Self { sender, stats }, task))
    }

    /// Shared counters for this publisher.
    pub fn stats(&self) -> Arc<PublisherStats> {
        Arc::clone(&self.stats)
    }

    fn enqueue(&self, event: LedgerEvent) {
        let (error, event) = match self.sender.try_send(event) {
            Ok(()) => return,
            Err(TrySendError::Full(event)) => (PublishError::ChannelFull, event),
            Err(TrySendError::Closed(event)) => (PublishError::ChannelClosed, event),
        };

        self.stats.dropped.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(
            stream = event.stream_name(),
            digest = %event.digest(),
            error = %error,
            "ledger event dropped"
        );
    }
}

impl CheckpointPublisher for ChannelPublisher {
    fn publish(&self, checkpoint: Checkpoint) {
        self.enqueue(LedgerEvent::Checkpoint(checkpoint));
    }

    fn announce_stream(&self, announcement: StreamAnnouncement) {
        self.enqueue(LedgerEvent::StreamCreated(announcement));
    }
}

async fn drain<K: LedgerSink>(
    sink: K,
    mut receiver: mpsc::Receiver<LedgerEvent>,
    stats: Arc<PublisherStats>,
    submit_timeout: Duration,
) {
    while let Some(event) = receiver.recv().await {
        let result = match tokio::time::timeout(submit_timeout, sink.submit(&event)).await {
            Ok(result) => result,
            Err(_) => Err(PublishError::Timeout(submit_timeout)),
        };

        match result {
            Ok(()) => {
                stats.published.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(stream = event.stream_name(), "ledger event submitted");
            }
            Err(e) => {
                stats.failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    stream = event.stream_name(),
                    digest = %event.digest(),
                    error = %e,
                    "ledger sink rejected event"
                );
            }
        }
    }

    tracing::debug!("publisher channel closed, background task exiting");
}
