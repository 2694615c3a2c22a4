//! Build-time errors.
//!
//! Every failure is fatal to the library build; nothing is retried and no
//! partial library is returned. Per-case failures are wrapped with the
//! canonical test name so reports can point at the offending descriptor.

use thiserror::Error;

use crate::expand::ExpandError;
use crate::expected::ExpectedResponseError;
use crate::suite::DescriptorError;

/// Errors raised while building a test case library.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BuildError {
    /// A descriptor failed to parse or validate.
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    /// A suite declares an impossible capability combination.
    #[error("test suite {suite} is misconfigured: {reason}")]
    MisconfiguredSuite {
        /// Name of the suite.
        suite: String,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// Two materialised cases produced the same canonical name. Unreachable
    /// unless a descriptor reuses a template name within a suite.
    #[error("test case library includes duplicate definition for {name}")]
    ConflictingConfiguration {
        /// The duplicated canonical test name.
        name: String,
    },

    /// The suite set and configuration matrix have an empty intersection.
    #[error("no test cases apply to the supplied configuration")]
    NoMatchingCases,

    /// A payload-size directive could not be applied.
    #[error("failed to expand request sizes for {test}: {source}")]
    Expand {
        /// Canonical name of the offending case.
        test: String,
        /// The underlying expansion error.
        #[source]
        source: ExpandError,
    },

    /// The expected response could not be computed.
    #[error("failed to compute the expected response for {test}: {source}")]
    ExpectedResponse {
        /// Canonical name of the offending case.
        test: String,
        /// The underlying synthesis error.
        #[source]
        source: ExpectedResponseError,
    },
}
