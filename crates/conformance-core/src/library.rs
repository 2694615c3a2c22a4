//! Materialisation and server bucketing of test cases.
//!
//! The materialiser joins every suite template against the configuration
//! matrix, keeps the pairs that satisfy the gating predicates, and stamps
//! each survivor with its configuration and canonical name. Cases are then
//! bucketed by the server instance that must host them, so the runner can
//! start the minimum number of reference servers.
//!
//! Everything here iterates ordered containers, so one descriptor set and
//! one matrix always produce the same library.

use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use crate::config::ConfigCase;
use crate::error::BuildError;
use crate::expand::{SERVER_RECEIVE_LIMIT, expand_request_data};
use crate::expected::populate_expected_response;
use crate::message::{HttpVersion, Protocol};
use crate::suite::{TestCase, TestMode, TestSuite};

/// The minimal tuple identifying one reference server process.
///
/// Cases sharing an instance run against one shared server; everything else
/// (codec, compression, stream type) is negotiated per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ServerInstance {
    /// Protocol the server speaks.
    pub protocol: Protocol,
    /// HTTP version the server serves.
    pub http_version: HttpVersion,
    /// Whether the server terminates TLS.
    pub use_tls: bool,
    /// Whether the server requires a TLS client certificate.
    pub use_tls_client_certs: bool,
}

impl ServerInstance {
    /// The instance a materialised case must run against.
    #[must_use]
    pub fn for_case(case: &TestCase) -> Self {
        let request = &case.request;
        Self {
            protocol: request.protocol,
            http_version: request.http_version,
            use_tls: request.use_tls,
            use_tls_client_certs: request.use_tls_client_certs,
        }
    }
}

/// The library of materialised test cases, bucketed by server instance.
///
/// Built once per harness invocation and immutable afterwards. Every case in
/// it carries a unique canonical name and a populated `expected_response`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCaseLibrary {
    cases_by_server: BTreeMap<ServerInstance, Vec<TestCase>>,
}

impl TestCaseLibrary {
    /// Materialises, expands, and stamps every (suite, config) pairing that
    /// passes the gating predicates.
    ///
    /// `suites` is keyed by descriptor file name, as returned by
    /// [`crate::suite::parse_test_suites`]; file-name order is the emission
    /// order within buckets.
    ///
    /// # Errors
    ///
    /// Returns a [`BuildError`] for misconfigured suites, duplicate
    /// canonical names, per-case expansion or synthesis failures, or an
    /// empty intersection with the matrix.
    pub fn new(
        suites: &BTreeMap<String, TestSuite>,
        config: &[ConfigCase],
        mode: TestMode,
    ) -> Result<Self, BuildError> {
        let config = dedupe_config(config);
        let mut names: HashSet<String> = HashSet::new();
        let mut cases_by_server: BTreeMap<ServerInstance, Vec<TestCase>> = BTreeMap::new();
        let mut total = 0usize;
        for suite in suites.values() {
            if suite.mode != TestMode::Unspecified && suite.mode != mode {
                continue;
            }
            if suite.relies_on_tls_client_certs && !suite.relies_on_tls {
                return Err(BuildError::MisconfiguredSuite {
                    suite: suite.name.clone(),
                    reason: "it relies on TLS client certs but not on TLS",
                });
            }
            for template in &suite.test_cases {
                for config_case in &config {
                    if !config_matches(suite, template, config_case, mode) {
                        continue;
                    }
                    let mut case = materialize(suite, template, config_case);
                    let name = case.request.test_name.clone();
                    if !names.insert(name.clone()) {
                        return Err(BuildError::ConflictingConfiguration { name });
                    }
                    expand_request_data(&mut case).map_err(|source| BuildError::Expand {
                        test: name.clone(),
                        source,
                    })?;
                    populate_expected_response(&mut case).map_err(|source| {
                        BuildError::ExpectedResponse { test: name, source }
                    })?;
                    cases_by_server
                        .entry(ServerInstance::for_case(&case))
                        .or_default()
                        .push(case);
                    total += 1;
                }
            }
        }
        if total == 0 {
            return Err(BuildError::NoMatchingCases);
        }
        debug!(
            cases = total,
            servers = cases_by_server.len(),
            "built test case library"
        );
        Ok(Self { cases_by_server })
    }

    /// The bucketed cases, keyed by the server instance hosting them.
    #[must_use]
    pub fn cases_by_server(&self) -> &BTreeMap<ServerInstance, Vec<TestCase>> {
        &self.cases_by_server
    }

    /// Total number of materialised cases across all buckets.
    #[must_use]
    pub fn case_count(&self) -> usize {
        self.cases_by_server.values().map(Vec::len).sum()
    }

    /// All cases in bucket order.
    pub fn all_cases(&self) -> impl Iterator<Item = &TestCase> {
        self.cases_by_server.values().flatten()
    }
}

/// Drops duplicate matrix rows, keeping first occurrences in order.
fn dedupe_config(config: &[ConfigCase]) -> Vec<ConfigCase> {
    let mut seen = HashSet::new();
    config
        .iter()
        .copied()
        .filter(|case| seen.insert(*case))
        .collect()
}

/// The gating table: a (suite, template, config) triple materialises iff
/// every predicate holds. Boolean capabilities must match exactly: a suite
/// that relies on one only runs where it is on, and a suite that does not is
/// never dragged into a configuration probing it.
fn config_matches(
    suite: &TestSuite,
    template: &TestCase,
    config: &ConfigCase,
    mode: TestMode,
) -> bool {
    template.request.stream_type == config.stream_type
        && (suite.mode == TestMode::Unspecified || suite.mode == mode)
        && (suite.relevant_protocols.is_empty()
            || suite.relevant_protocols.contains(&config.protocol))
        && suite.relies_on_tls == config.use_tls
        && suite.relies_on_tls_client_certs == config.use_tls_client_certs
        && (suite.relies_on_tls || !config.use_tls_client_certs)
        && suite.relies_on_connect_get == config.use_connect_get
        && suite.connect_version_mode == config.connect_version_mode
        && suite.relies_on_message_receive_limit == config.use_message_receive_limit
}

/// Deep-copies the template and stamps the configuration onto it.
fn materialize(suite: &TestSuite, template: &TestCase, config: &ConfigCase) -> TestCase {
    let mut case = template.clone();
    let request = &mut case.request;
    request.test_name = test_case_name(suite, config, &template.request.test_name);
    request.http_version = config.http_version;
    request.protocol = config.protocol;
    request.codec = config.codec;
    request.compression = config.compression;
    request.use_tls = config.use_tls;
    request.use_tls_client_certs = config.use_tls_client_certs;
    request.use_connect_get = config.use_connect_get;
    request.connect_version_mode = config.connect_version_mode;
    request.use_message_receive_limit = config.use_message_receive_limit;
    if config.use_message_receive_limit {
        request.message_receive_limit = Some(SERVER_RECEIVE_LIMIT as u32);
    }
    case
}

/// The canonical test name. The `Protocol:` segment is elided when the
/// suite pins exactly one relevant protocol, because the suite name already
/// identifies it.
fn test_case_name(suite: &TestSuite, config: &ConfigCase, template_name: &str) -> String {
    let mut segments = Vec::with_capacity(6);
    segments.push(suite.name.clone());
    segments.push(format!("HTTPVersion:{}", config.http_version as i32));
    if suite.relevant_protocols.len() != 1 {
        segments.push(format!("Protocol:{}", config.protocol));
    }
    segments.push(format!("Codec:{}", config.codec));
    segments.push(format!("Compression:{}", config.compression));
    segments.push(template_name.to_owned());
    segments.join("/")
}
