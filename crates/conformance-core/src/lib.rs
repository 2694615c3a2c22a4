//! Deterministic test case library construction for the RPC conformance
//! harness.
//!
//! The harness probes a client or server implementation of a family of RPC
//! protocols that share one message model but differ in wire encoding, HTTP
//! version, codec, compression, and streaming discipline. This crate is the
//! part that decides *what* to test: it parses declarative suite
//! descriptors, joins them against the runner's configuration matrix,
//! resizes synthetic payloads around the server receive limit, computes the
//! response a conforming peer must deliver for every case, and buckets the
//! result by the server instance that must host it. Executing the RPCs,
//! diffing actual against expected, and process lifecycle live elsewhere.
//!
//! The build is synchronous and pure: the same descriptors and matrix always
//! produce the same library.
//!
//! ```
//! use std::collections::BTreeMap;
//!
//! use conformance_core::message::{Codec, Compression, HttpVersion, Protocol, StreamType};
//! use conformance_core::{ConfigCase, TestMode, build_test_case_library};
//!
//! let descriptor = br"
//! name: Smoke
//! testCases:
//!   - request:
//!         testName: unary-empty-definition
//!         streamType: STREAM_TYPE_UNARY
//! ";
//! let mut descriptors = BTreeMap::new();
//! descriptors.insert("smoke.yaml".to_owned(), descriptor.to_vec());
//!
//! let config = [ConfigCase {
//!     http_version: HttpVersion::Http1,
//!     protocol: Protocol::Connect,
//!     codec: Codec::Proto,
//!     compression: Compression::Identity,
//!     stream_type: StreamType::Unary,
//!     ..ConfigCase::default()
//! }];
//! let library = build_test_case_library(&descriptors, &config, TestMode::Client)?;
//! assert_eq!(library.case_count(), 1);
//! # Ok::<(), conformance_core::BuildError>(())
//! ```

use std::collections::BTreeMap;

pub mod config;
pub mod error;
pub mod expand;
pub mod expected;
pub mod library;
pub mod message;
pub mod suite;

pub use config::ConfigCase;
pub use error::BuildError;
pub use expand::SERVER_RECEIVE_LIMIT;
pub use library::{ServerInstance, TestCaseLibrary};
pub use suite::{TestMode, TestSuite, parse_test_suites};

/// Parses descriptors and builds the library in one step.
///
/// `descriptors` maps logical file names to raw descriptor bytes, as handed
/// over by the suite loader.
///
/// # Errors
///
/// Returns a [`BuildError`] if any descriptor is invalid or the build fails;
/// no partial library is returned.
pub fn build_test_case_library(
    descriptors: &BTreeMap<String, Vec<u8>>,
    config: &[ConfigCase],
    mode: TestMode,
) -> Result<TestCaseLibrary, BuildError> {
    let suites = parse_test_suites(descriptors)?;
    TestCaseLibrary::new(&suites, config, mode)
}
