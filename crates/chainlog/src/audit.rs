//! Offline chain audit.
//!
//! Replays every chain held by a record store and reports where the stored
//! digests disagree with what the digest engine computes. The per-stream
//! tips in the report can be compared against the checkpoints a ledger
//! received.

use std::collections::HashMap;

use chainlog_core::{
    compute_next_anchor_nonce, compute_record_digest, compute_stream_digest, Digest,
};
use chainlog_store::RecordStore;

use crate::error::{Result, SessionError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViolationKind {
    /// A stream row's digest does not follow from its nonce and descriptor.
    StreamDigestMismatch,
    /// A stream row's nonce does not follow from the stream created before it.
    AnchorBreak,
    /// A record digest does not follow from the previous link.
    RecordDigestMismatch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub kind: ViolationKind,
    pub stream: String,
    /// Zero-based position of the record within its stream.
    pub record_index: Option<usize>,
    pub description: String,
}

/// Result of auditing a store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditReport {
    pub streams_checked: usize,
    pub records_checked: u64,
    pub violations: Vec<Violation>,
    tips: HashMap<String, Digest>,
}

impl AuditReport {
    /// Returns `true` if no violation was found.
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    /// The last stored digest of a stream's chain.
    pub fn tip(&self, stream: &str) -> Option<Digest> {
        self.tips.get(stream).copied()
    }

    pub fn violations_of(&self, kind: ViolationKind) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(move |v| v.kind == kind)
    }
}

/// Replays stored chains.
pub struct ChainAuditor;

impl ChainAuditor {
    /// Audit every stream and record in `store`.
    ///
    /// Each link is checked against its stored predecessor, so a single
    /// tampered payload is reported once.
    pub fn audit<S: RecordStore + ?Sized>(store: &S) -> Result<AuditReport> {
        let anchors = store
            .query_stream_anchors()
            .map_err(|e| SessionError::backend("audit stream anchors", e))?;

        let mut report = AuditReport::default();

        for (index, anchor) in anchors.iter().enumerate() {
            let name = &anchor.descriptor.name;

            let expected = compute_stream_digest(&anchor.nonce, &anchor.descriptor)?;
            if expected != anchor.digest {
                report.violations.push(Violation {
                    kind: ViolationKind::StreamDigestMismatch,
                    stream: name.clone(),
                    record_index: None,
                    description: format!("stored {}, computed {}", anchor.digest, expected),
                });
            }

            if let Some(previous) = index.checked_sub(1).map(|i| &anchors[i]) {
                let expected_nonce =
                    compute_next_anchor_nonce(&previous.digest, &previous.descriptor)?;
                if expected_nonce != anchor.nonce {
                    report.violations.push(Violation {
                        kind: ViolationKind::AnchorBreak,
                        stream: name.clone(),
                        record_index: None,
                        description: format!(
                            "nonce does not follow from stream '{}'",
                            previous.descriptor.name
                        ),
                    });
                }
            }

            let chain = store
                .query_stream_chain(anchor.id)
                .map_err(|e| SessionError::backend(format!("audit stream '{}'", name), e))?;

            let mut previous = anchor.digest;
            for (position, record) in chain.iter().enumerate() {
                let computed = compute_record_digest(&previous, &record.link())?;
                if computed != record.digest {
                    report.violations.push(Violation {
                        kind: ViolationKind::RecordDigestMismatch,
                        stream: name.clone(),
                        record_index: Some(position),
                        description: format!("stored {}, computed {}", record.digest, computed),
                    });
                }
                previous = record.digest;
            }

            report.records_checked += chain.len() as u64;
            report.streams_checked += 1;
            report.tips.insert(name.clone(), previous);
        }

        if !report.is_clean() {
            tracing::warn!(violations = report.violations.len(), "chain audit found violations");
        }
        Ok(report)
    }
}
