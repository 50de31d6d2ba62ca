//! The receiving end of the ledger bridge.
//!
//! A sink is whatever actually talks to the distributed ledger. It is async
//! and may be slow; the [`ChannelPublisher`](crate::ChannelPublisher) keeps
//! it off the write path.

use async_trait::async_trait;

use crate::error::Result;
use crate::messages::LedgerEvent;

/// Destination for ledger events.
#[async_trait]
pub trait LedgerSink: Send + Sync {
    /// Hand one event to the ledger.
    async fn submit(&self, event: &LedgerEvent) -> Result<()>;
}

/// In-memory sink for testing.
pub mod memory {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use tokio::sync::RwLock;

    use super::*;
    use crate::error::PublishError;
    use crate::messages::Checkpoint;

    #[derive(Default)]
    struct Inner {
        events: RwLock<Vec<LedgerEvent>>,
        failing: AtomicBool,
    }

    /// Collects every submitted event. Clones share the same buffer.
    #[derive(Clone, Default)]
    pub struct MemorySink {
        inner: Arc<Inner>,
    }

    impl MemorySink {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make every following submission fail (or succeed again).
        pub fn set_failing(&self, failing: bool) {
            self.inner.failing.store(failing, Ordering::SeqCst);
        }

        /// All events accepted so far, in submission order.
        pub async fn events(&self) -> Vec<LedgerEvent> {
            self.inner.events.read().await.clone()
        }

        /// Only the checkpoints accepted so far.
        pub async fn checkpoints(&self) -> Vec<Checkpoint> {
            self.inner
                .events
                .read()
                .await
                .iter()
                .filter_map(|e| match e {
                    LedgerEvent::Checkpoint(c) => Some(c.clone()),
                    LedgerEvent::StreamCreated(_) => None,
                })
                .collect()
        }
    }

    #[async_trait]
    impl LedgerSink for MemorySink {
        async fn submit(&self, event: &LedgerEvent) -> Result<()> {
            if self.inner.failing.load(Ordering::SeqCst) {
                return Err(PublishError::Sink("memory sink set to fail".into()));
            }
            self.inner.events.write().await.push(event.clone());
            Ok(())
        }
    }
}
