//! # chainlog ledger
//!
//! Bridge from the storage session to an external ledger.
//!
//! ## Overview
//!
//! Every persisted record produces a [`Checkpoint`]; every new stream produces
//! a [`StreamAnnouncement`]. The session hands both to a
//! [`CheckpointPublisher`] without waiting. The publisher shipped here,
//! [`ChannelPublisher`], forwards them over a bounded channel to a background
//! tokio task that submits them to a [`LedgerSink`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use chainlog_ledger::{ChannelPublisher, MemorySink, PublisherConfig};
//!
//! async fn example() {
//!     let sink = MemorySink::new();
//!     let (publisher, task) =
//!         ChannelPublisher::spawn(sink.clone(), PublisherConfig::default()).unwrap();
//!
//!     // hand `publisher` to a storage session, write records ...
//!
//!     drop(publisher);
//!     task.await.unwrap();
//!     println!("{} events on the ledger", sink.events().await.len());
//! }
//! ```
//!
//! ## Delivery
//!
//! ```text
//! write() --publish--> [bounded mpsc] --recv--> task --submit--> LedgerSink
//!                 full: dropped + warn          error/timeout: counted + warn
//! ```
//!
//! Delivery is best effort. A write never fails because of the ledger.

pub mod error;
pub mod messages;
pub mod publisher;
pub mod sink;

pub use error::{PublishError, Result};
pub use messages::{Checkpoint, LedgerEvent, StreamAnnouncement};
pub use publisher::{
    ChannelPublisher, CheckpointPublisher, NoopPublisher, PublisherConfig, PublisherStats,
};
pub use sink::{memory::MemorySink, LedgerSink};
