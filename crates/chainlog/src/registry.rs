//! Stream registry: the in-memory tips of every stream chain in a session.
//!
//! The registry owns the session nonce. Creating a stream digests its
//! descriptor against the current nonce, persists the stream row, and only
//! then advances the nonce, so a failed insert leaves no trace.

use std::collections::HashMap;

use chainlog_core::{
    compute_next_anchor_nonce, compute_stream_digest, Digest, Nonce, StreamDescriptor,
    StreamId, StreamState,
};
use chainlog_store::RecordStore;

use crate::error::{Result, SessionError};

/// Outcome of a stream creation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// A new chain was started from `digest`.
    Created { id: StreamId, digest: Digest },
    /// The name was already registered; nothing changed.
    Existing(StreamId),
}

impl Registration {
    pub fn id(&self) -> StreamId {
        match self {
            Registration::Created { id, .. } => *id,
            Registration::Existing(id) => *id,
        }
    }
}

/// What happened to a stream removal request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemovalDecision {
    /// The stream and its chain stay exactly as they are.
    Retained { reason: String },
}

impl RemovalDecision {
    pub fn is_retained(&self) -> bool {
        matches!(self, RemovalDecision::Retained { .. })
    }
}

/// Decides what `remove_stream` does.
pub trait RemovalPolicy: Send + Sync {
    fn decide(&self, descriptor: &StreamDescriptor, state: Option<&StreamState>) -> RemovalDecision;
}

/// Streams are part of an immutable chain and are never removed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmutableChainPolicy;

impl RemovalPolicy for ImmutableChainPolicy {
    fn decide(&self, descriptor: &StreamDescriptor, state: Option<&StreamState>) -> RemovalDecision {
        let reason = match state {
            Some(_) => format!(
                "stream '{}' is anchored in the session chain and cannot be removed",
                descriptor.name
            ),
            None => format!("stream '{}' is not registered", descriptor.name),
        };
        RemovalDecision::Retained { reason }
    }
}

struct Entry {
    descriptor: StreamDescriptor,
    state: StreamState,
}

/// Per-session map from stream name to chain tip.
pub struct StreamRegistry {
    session_nonce: Nonce,
    streams: HashMap<String, Entry>,
    removal_policy: Box<dyn RemovalPolicy>,
}

impl StreamRegistry {
    /// Start a registry anchored at `session_nonce`.
    pub fn new(session_nonce: Nonce) -> Self {
        Self::with_policy(session_nonce, Box::new(ImmutableChainPolicy))
    }

    pub fn with_policy(session_nonce: Nonce, removal_policy: Box<dyn RemovalPolicy>) -> Self {
        Self {
            session_nonce,
            streams: HashMap::new(),
            removal_policy,
        }
    }

    /// The nonce the next created stream will be anchored to.
    pub fn session_nonce(&self) -> Nonce {
        self.session_nonce
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Register a stream, persisting it on first sight of its name.
    pub fn create_stream<S>(&mut self, store: &mut S, descriptor: &StreamDescriptor) -> Result<Registration>
    where
        S: RecordStore + ?Sized,
    {
        if let Some(entry) = self.streams.get(&descriptor.name) {
            if entry.descriptor != *descriptor {
                tracing::debug!(
                    stream = %descriptor.name,
                    registered_type = %entry.descriptor.type_name,
                    requested_type = %descriptor.type_name,
                    "stream already registered with a different descriptor"
                );
            }
            return Ok(Registration::Existing(entry.state.id));
        }

        let digest = compute_stream_digest(&self.session_nonce, descriptor)?;
        let next_nonce = compute_next_anchor_nonce(&digest, descriptor)?;

        let id = store
            .insert_stream(descriptor, &self.session_nonce, &digest)
            .map_err(|e| SessionError::backend(format!("create stream '{}'", descriptor.name), e))?;

        self.streams.insert(
            descriptor.name.clone(),
            Entry {
                descriptor: descriptor.clone(),
                state: StreamState::new(id, digest),
            },
        );
        self.session_nonce = next_nonce;

        tracing::debug!(stream = %descriptor.name, id = id.get(), digest = ?digest, "stream created");
        Ok(Registration::Created { id, digest })
    }

    /// The chain tip of a registered stream.
    pub fn lookup(&self, name: &str) -> Option<&StreamState> {
        self.streams.get(name).map(|e| &e.state)
    }

    /// Ask the removal policy about a stream. Never mutates anything.
    pub fn remove_stream(&self, descriptor: &StreamDescriptor) -> RemovalDecision {
        self.removal_policy.decide(descriptor, self.lookup(&descriptor.name))
    }

    /// Advance a stream's tip after its record was persisted.
    pub(crate) fn record_written(&mut self, name: &str, digest: Digest) {
        if let Some(entry) = self.streams.get_mut(name) {
            entry.state.advance(digest);
        }
    }

    /// Forget all stream tips. The session nonce keeps its current value.
    pub(crate) fn clear_streams(&mut self) {
        self.streams.clear();
    }
}
