//! Test suite descriptors and the descriptor parser.
//!
//! A descriptor is a YAML document describing one named suite of template
//! test cases plus the capabilities the suite relies on. The parser checks
//! structure only; cross-field semantics (which configurations a suite
//! matches) belong to the materialiser.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::message::{
    ClientCompatRequest, ClientResponseResult, ConnectVersionMode, Protocol, StreamType,
};

/// Which side of the RPC the harness is probing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TestMode {
    /// The suite applies in either mode.
    #[default]
    #[serde(rename = "TEST_MODE_UNSPECIFIED")]
    Unspecified,
    /// The suite only applies when probing a client.
    #[serde(rename = "TEST_MODE_CLIENT")]
    Client,
    /// The suite only applies when probing a server.
    #[serde(rename = "TEST_MODE_SERVER")]
    Server,
}

/// A named collection of template test cases plus gating attributes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct TestSuite {
    /// Suite name, unique across the loaded descriptor set.
    pub name: String,
    /// Harness mode the suite is restricted to, if any.
    pub mode: TestMode,
    /// Template test cases.
    pub test_cases: Vec<TestCase>,
    /// If non-empty, only these protocols generate cases.
    pub relevant_protocols: Vec<Protocol>,
    /// The suite only works over TLS.
    pub relies_on_tls: bool,
    /// The suite only works with TLS client certificates.
    pub relies_on_tls_client_certs: bool,
    /// The suite only works with Connect GET requests.
    pub relies_on_connect_get: bool,
    /// The suite only works against a server with a receive-size limit.
    pub relies_on_message_receive_limit: bool,
    /// Pinned Connect version-header policy, if any.
    pub connect_version_mode: ConnectVersionMode,
}

/// One template test case: the request to send plus optional payload-size
/// directives. Materialisation deep-copies the template, the expander and
/// the expectation engine then fill it in.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct TestCase {
    /// The RPC invocation to perform.
    pub request: ClientCompatRequest,
    /// Payload-size directives, applied pairwise to the request messages.
    pub expand_requests: Vec<ExpandDirective>,
    /// The response a conforming peer must deliver. Usually computed, but a
    /// descriptor may pre-declare it to override the expectation engine.
    pub expected_response: Option<ClientResponseResult>,
}

/// Directive to resize one request payload relative to the server
/// receive-size limit. An empty directive leaves the payload untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct ExpandDirective {
    /// Signed offset from the receive limit; the payload becomes
    /// `limit + offset` bytes long.
    pub size_relative_to_limit: Option<i64>,
}

/// Errors raised while parsing and validating descriptors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DescriptorError {
    /// The document is not valid YAML or does not match the schema.
    #[error("failed to parse test suite descriptor {name}: {source}")]
    Malformed {
        /// Logical file name of the descriptor.
        name: String,
        /// The underlying parse error.
        #[source]
        source: serde_yaml::Error,
    },

    /// The document does not declare a suite name.
    #[error("test suite descriptor {name} does not declare a suite name")]
    MissingSuiteName {
        /// Logical file name of the descriptor.
        name: String,
    },

    /// Two descriptors declare the same suite name.
    #[error("descriptors {first} and {second} both declare test suite {suite}")]
    DuplicateSuiteName {
        /// The duplicated suite name.
        suite: String,
        /// File that declared it first.
        first: String,
        /// File that declared it again.
        second: String,
    },

    /// The suite declares no test cases.
    #[error("test suite {suite} declares no test cases")]
    NoTestCases {
        /// Name of the empty suite.
        suite: String,
    },

    /// A template does not declare a test name.
    #[error("test case #{index} in suite {suite} does not declare a test name")]
    MissingTestName {
        /// Name of the suite.
        suite: String,
        /// Zero-based position of the template.
        index: usize,
    },

    /// A template does not declare a stream type.
    #[error("test case {test} in suite {suite} does not declare a stream type")]
    MissingStreamType {
        /// Name of the suite.
        suite: String,
        /// Template test name.
        test: String,
    },
}

/// Parses a set of descriptors keyed by logical file name.
///
/// The returned map is keyed by file name; its sorted iteration order is the
/// suite order used everywhere downstream.
///
/// # Errors
///
/// Returns a [`DescriptorError`] naming the offending descriptor when any
/// document is structurally invalid.
pub fn parse_test_suites(
    descriptors: &BTreeMap<String, Vec<u8>>,
) -> Result<BTreeMap<String, TestSuite>, DescriptorError> {
    let mut suites = BTreeMap::new();
    let mut suite_files: BTreeMap<String, String> = BTreeMap::new();
    for (file, raw) in descriptors {
        let suite: TestSuite =
            serde_yaml::from_slice(raw).map_err(|source| DescriptorError::Malformed {
                name: file.clone(),
                source,
            })?;
        validate_suite(file, &suite)?;
        if let Some(first) = suite_files.insert(suite.name.clone(), file.clone()) {
            return Err(DescriptorError::DuplicateSuiteName {
                suite: suite.name,
                first,
                second: file.clone(),
            });
        }
        suites.insert(file.clone(), suite);
    }
    debug!(suites = suites.len(), "parsed test suite descriptors");
    Ok(suites)
}

fn validate_suite(file: &str, suite: &TestSuite) -> Result<(), DescriptorError> {
    if suite.name.is_empty() {
        return Err(DescriptorError::MissingSuiteName {
            name: file.to_owned(),
        });
    }
    if suite.test_cases.is_empty() {
        return Err(DescriptorError::NoTestCases {
            suite: suite.name.clone(),
        });
    }
    for (index, case) in suite.test_cases.iter().enumerate() {
        if case.request.test_name.is_empty() {
            return Err(DescriptorError::MissingTestName {
                suite: suite.name.clone(),
                index,
            });
        }
        if case.request.stream_type == StreamType::Unspecified {
            return Err(DescriptorError::MissingStreamType {
                suite: suite.name.clone(),
                test: case.request.test_name.clone(),
            });
        }
    }
    Ok(())
}
