//! # chainlog testkit
//!
//! Testing utilities for chainlog.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: fixed inputs with the digests they must produce, so
//!   the chain derivation cannot drift silently
//! - **Generators**: proptest strategies for descriptors and records
//! - **Fixtures**: temporary session directories and a recording publisher
//!
//! ## Golden Vectors
//!
//! ```rust
//! use chainlog_testkit::vectors::verify_all_vectors;
//!
//! for (name, ok, hex) in verify_all_vectors() {
//!     assert!(ok, "{name} produced {hex}");
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use chainlog_testkit::generators::descriptor;
//!
//! proptest! {
//!     #[test]
//!     fn stream_digest_is_deterministic(d in descriptor()) {
//!         // ...
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use chainlog_store::AccessMode;
//! use chainlog_testkit::fixtures::{temperature, TestFixture};
//!
//! let fixture = TestFixture::new();
//! let mut session = fixture.session();
//! session.open(fixture.uri("run"), AccessMode::ReadWrite).unwrap();
//! session.create_stream(&temperature()).unwrap();
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{init_tracing, RecordingPublisher, TestFixture};
pub use generators::{descriptor, record_params, RecordParams};
pub use vectors::{all_vectors, verify_all_vectors, ChainVector};
