//! One point in the runner's configuration matrix.

use serde::{Deserialize, Serialize};

use crate::message::{Codec, Compression, ConnectVersionMode, HttpVersion, Protocol, StreamType};

/// A single combination of configuration axes the runner asked to cover.
///
/// The runner supplies the matrix in full; the materialiser joins each suite
/// template against it. Duplicate rows are tolerated and collapse during
/// materialisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct ConfigCase {
    /// HTTP version under test.
    pub http_version: HttpVersion,
    /// Protocol under test.
    pub protocol: Protocol,
    /// Codec under test.
    pub codec: Codec,
    /// Compression scheme under test.
    pub compression: Compression,
    /// Streaming discipline this row covers.
    pub stream_type: StreamType,
    /// Run over TLS.
    pub use_tls: bool,
    /// Present a TLS client certificate.
    pub use_tls_client_certs: bool,
    /// Use the Connect GET method for unary calls.
    pub use_connect_get: bool,
    /// Connect version-header policy under test.
    pub connect_version_mode: ConnectVersionMode,
    /// Probe the server receive-size limit.
    pub use_message_receive_limit: bool,
}
