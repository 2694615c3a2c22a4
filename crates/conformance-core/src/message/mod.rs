//! Protocol message model shared by descriptors, materialised test cases,
//! and expected responses.
//!
//! The enums carry the wire names used in descriptor documents
//! (`STREAM_TYPE_UNARY`, `PROTOCOL_CONNECT`, ...) and keep the protocol
//! numbering so a value can be rendered either way. Structs are serde
//! boundary types: unknown fields are rejected, absent fields take their
//! defaults, and byte payloads are base64 strings on the wire.

use std::fmt;

use serde::{Deserialize, Serialize};

mod b64;
mod envelope;

pub use envelope::{EnvelopeError, EnvelopePayload, TYPE_URL_PREFIX, TypedMessage, WireMessage};

// ---------------------------------------------------------------------------
// Configuration axis enums
// ---------------------------------------------------------------------------

/// HTTP version an RPC is carried over.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum HttpVersion {
    /// No version declared; only valid on templates.
    #[default]
    #[serde(rename = "HTTP_VERSION_UNSPECIFIED")]
    Unspecified = 0,
    #[serde(rename = "HTTP_VERSION_1")]
    Http1 = 1,
    #[serde(rename = "HTTP_VERSION_2")]
    Http2 = 2,
    #[serde(rename = "HTTP_VERSION_3")]
    Http3 = 3,
}

impl HttpVersion {
    /// Wire name of the value, e.g. `HTTP_VERSION_1`.
    #[must_use]
    pub const fn as_str_name(self) -> &'static str {
        match self {
            Self::Unspecified => "HTTP_VERSION_UNSPECIFIED",
            Self::Http1 => "HTTP_VERSION_1",
            Self::Http2 => "HTTP_VERSION_2",
            Self::Http3 => "HTTP_VERSION_3",
        }
    }
}

/// RPC protocol under test.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum Protocol {
    /// No protocol declared; only valid on templates.
    #[default]
    #[serde(rename = "PROTOCOL_UNSPECIFIED")]
    Unspecified = 0,
    #[serde(rename = "PROTOCOL_CONNECT")]
    Connect = 1,
    #[serde(rename = "PROTOCOL_GRPC")]
    Grpc = 2,
    #[serde(rename = "PROTOCOL_GRPC_WEB")]
    GrpcWeb = 3,
}

impl Protocol {
    /// Wire name of the value, e.g. `PROTOCOL_CONNECT`.
    #[must_use]
    pub const fn as_str_name(self) -> &'static str {
        match self {
            Self::Unspecified => "PROTOCOL_UNSPECIFIED",
            Self::Connect => "PROTOCOL_CONNECT",
            Self::Grpc => "PROTOCOL_GRPC",
            Self::GrpcWeb => "PROTOCOL_GRPC_WEB",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str_name())
    }
}

/// Message codec.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum Codec {
    #[default]
    #[serde(rename = "CODEC_UNSPECIFIED")]
    Unspecified = 0,
    #[serde(rename = "CODEC_PROTO")]
    Proto = 1,
    #[serde(rename = "CODEC_JSON")]
    Json = 2,
}

impl Codec {
    /// Wire name of the value, e.g. `CODEC_PROTO`.
    #[must_use]
    pub const fn as_str_name(self) -> &'static str {
        match self {
            Self::Unspecified => "CODEC_UNSPECIFIED",
            Self::Proto => "CODEC_PROTO",
            Self::Json => "CODEC_JSON",
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str_name())
    }
}

/// Compression scheme applied to messages.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum Compression {
    #[default]
    #[serde(rename = "COMPRESSION_UNSPECIFIED")]
    Unspecified = 0,
    #[serde(rename = "COMPRESSION_IDENTITY")]
    Identity = 1,
    #[serde(rename = "COMPRESSION_GZIP")]
    Gzip = 2,
    #[serde(rename = "COMPRESSION_BR")]
    Br = 3,
    #[serde(rename = "COMPRESSION_ZSTD")]
    Zstd = 4,
}

impl Compression {
    /// Wire name of the value, e.g. `COMPRESSION_IDENTITY`.
    #[must_use]
    pub const fn as_str_name(self) -> &'static str {
        match self {
            Self::Unspecified => "COMPRESSION_UNSPECIFIED",
            Self::Identity => "COMPRESSION_IDENTITY",
            Self::Gzip => "COMPRESSION_GZIP",
            Self::Br => "COMPRESSION_BR",
            Self::Zstd => "COMPRESSION_ZSTD",
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str_name())
    }
}

/// Streaming discipline of an RPC.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum StreamType {
    /// No stream type declared; rejected by the descriptor parser.
    #[default]
    #[serde(rename = "STREAM_TYPE_UNSPECIFIED")]
    Unspecified = 0,
    #[serde(rename = "STREAM_TYPE_UNARY")]
    Unary = 1,
    #[serde(rename = "STREAM_TYPE_CLIENT_STREAM")]
    ClientStream = 2,
    #[serde(rename = "STREAM_TYPE_SERVER_STREAM")]
    ServerStream = 3,
    #[serde(rename = "STREAM_TYPE_HALF_DUPLEX_BIDI_STREAM")]
    HalfDuplexBidiStream = 4,
    #[serde(rename = "STREAM_TYPE_FULL_DUPLEX_BIDI_STREAM")]
    FullDuplexBidiStream = 5,
}

impl StreamType {
    /// Wire name of the value, e.g. `STREAM_TYPE_UNARY`.
    #[must_use]
    pub const fn as_str_name(self) -> &'static str {
        match self {
            Self::Unspecified => "STREAM_TYPE_UNSPECIFIED",
            Self::Unary => "STREAM_TYPE_UNARY",
            Self::ClientStream => "STREAM_TYPE_CLIENT_STREAM",
            Self::ServerStream => "STREAM_TYPE_SERVER_STREAM",
            Self::HalfDuplexBidiStream => "STREAM_TYPE_HALF_DUPLEX_BIDI_STREAM",
            Self::FullDuplexBidiStream => "STREAM_TYPE_FULL_DUPLEX_BIDI_STREAM",
        }
    }
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str_name())
    }
}

/// Policy for the Connect protocol version header.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum ConnectVersionMode {
    /// No policy pinned; the peer may do either.
    #[default]
    #[serde(rename = "CONNECT_VERSION_MODE_UNSPECIFIED")]
    Unspecified = 0,
    /// The version header must be present and validated.
    #[serde(rename = "CONNECT_VERSION_MODE_REQUIRE")]
    Require = 1,
    /// The version header must be ignored.
    #[serde(rename = "CONNECT_VERSION_MODE_IGNORE")]
    Ignore = 2,
}

impl ConnectVersionMode {
    /// Wire name of the value, e.g. `CONNECT_VERSION_MODE_REQUIRE`.
    #[must_use]
    pub const fn as_str_name(self) -> &'static str {
        match self {
            Self::Unspecified => "CONNECT_VERSION_MODE_UNSPECIFIED",
            Self::Require => "CONNECT_VERSION_MODE_REQUIRE",
            Self::Ignore => "CONNECT_VERSION_MODE_IGNORE",
        }
    }
}

/// RPC error codes, numbered to align with gRPC.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum Code {
    #[default]
    #[serde(rename = "CODE_UNSPECIFIED")]
    Unspecified = 0,
    #[serde(rename = "CODE_CANCELED")]
    Canceled = 1,
    #[serde(rename = "CODE_UNKNOWN")]
    Unknown = 2,
    #[serde(rename = "CODE_INVALID_ARGUMENT")]
    InvalidArgument = 3,
    #[serde(rename = "CODE_DEADLINE_EXCEEDED")]
    DeadlineExceeded = 4,
    #[serde(rename = "CODE_NOT_FOUND")]
    NotFound = 5,
    #[serde(rename = "CODE_ALREADY_EXISTS")]
    AlreadyExists = 6,
    #[serde(rename = "CODE_PERMISSION_DENIED")]
    PermissionDenied = 7,
    #[serde(rename = "CODE_RESOURCE_EXHAUSTED")]
    ResourceExhausted = 8,
    #[serde(rename = "CODE_FAILED_PRECONDITION")]
    FailedPrecondition = 9,
    #[serde(rename = "CODE_ABORTED")]
    Aborted = 10,
    #[serde(rename = "CODE_OUT_OF_RANGE")]
    OutOfRange = 11,
    #[serde(rename = "CODE_UNIMPLEMENTED")]
    Unimplemented = 12,
    #[serde(rename = "CODE_INTERNAL")]
    Internal = 13,
    #[serde(rename = "CODE_UNAVAILABLE")]
    Unavailable = 14,
    #[serde(rename = "CODE_DATA_LOSS")]
    DataLoss = 15,
    #[serde(rename = "CODE_UNAUTHENTICATED")]
    Unauthenticated = 16,
}

impl Code {
    /// Wire name of the value, e.g. `CODE_RESOURCE_EXHAUSTED`.
    #[must_use]
    pub const fn as_str_name(self) -> &'static str {
        match self {
            Self::Unspecified => "CODE_UNSPECIFIED",
            Self::Canceled => "CODE_CANCELED",
            Self::Unknown => "CODE_UNKNOWN",
            Self::InvalidArgument => "CODE_INVALID_ARGUMENT",
            Self::DeadlineExceeded => "CODE_DEADLINE_EXCEEDED",
            Self::NotFound => "CODE_NOT_FOUND",
            Self::AlreadyExists => "CODE_ALREADY_EXISTS",
            Self::PermissionDenied => "CODE_PERMISSION_DENIED",
            Self::ResourceExhausted => "CODE_RESOURCE_EXHAUSTED",
            Self::FailedPrecondition => "CODE_FAILED_PRECONDITION",
            Self::Aborted => "CODE_ABORTED",
            Self::OutOfRange => "CODE_OUT_OF_RANGE",
            Self::Unimplemented => "CODE_UNIMPLEMENTED",
            Self::Internal => "CODE_INTERNAL",
            Self::Unavailable => "CODE_UNAVAILABLE",
            Self::DataLoss => "CODE_DATA_LOSS",
            Self::Unauthenticated => "CODE_UNAUTHENTICATED",
        }
    }
}

// ---------------------------------------------------------------------------
// Headers and errors
// ---------------------------------------------------------------------------

/// One request or response header, possibly multi-valued.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct Header {
    /// Header name.
    pub name: String,
    /// Header values, in order.
    pub value: Vec<String>,
}

/// An RPC error a peer is expected to produce.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct RpcError {
    /// Error code.
    pub code: Code,
    /// Optional human-readable message.
    pub message: Option<String>,
    /// Opaque typed error details, in order.
    pub details: Vec<TypedMessage>,
}

// ---------------------------------------------------------------------------
// Response definitions
// ---------------------------------------------------------------------------

/// The either/or result of a unary response definition.
///
/// A present-but-empty `ResponseData` is meaningful: the peer responds with a
/// zero-length payload, which is not the same as not responding at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnaryResponse {
    /// Respond with this payload.
    ResponseData(Vec<u8>),
    /// Fail with this error.
    Error(RpcError),
}

/// How a peer must respond to a unary or client-stream RPC.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(
    try_from = "UnaryResponseDefinitionWire",
    into = "UnaryResponseDefinitionWire"
)]
pub struct UnaryResponseDefinition {
    /// Headers to send before the response.
    pub response_headers: Vec<Header>,
    /// The result to produce, if any.
    pub response: Option<UnaryResponse>,
    /// Trailers to send after the response.
    pub response_trailers: Vec<Header>,
}

/// Wire shape of [`UnaryResponseDefinition`]: the two result arms read as
/// sibling keys, and declaring both is rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
struct UnaryResponseDefinitionWire {
    response_headers: Vec<Header>,
    #[serde(with = "b64::opt")]
    response_data: Option<Vec<u8>>,
    error: Option<RpcError>,
    response_trailers: Vec<Header>,
}

impl TryFrom<UnaryResponseDefinitionWire> for UnaryResponseDefinition {
    type Error = &'static str;

    fn try_from(wire: UnaryResponseDefinitionWire) -> Result<Self, Self::Error> {
        let response = match (wire.response_data, wire.error) {
            (Some(_), Some(_)) => {
                return Err(
                    "a unary response definition cannot declare both responseData and error",
                );
            }
            (Some(data), None) => Some(UnaryResponse::ResponseData(data)),
            (None, Some(error)) => Some(UnaryResponse::Error(error)),
            (None, None) => None,
        };
        Ok(Self {
            response_headers: wire.response_headers,
            response,
            response_trailers: wire.response_trailers,
        })
    }
}

impl From<UnaryResponseDefinition> for UnaryResponseDefinitionWire {
    fn from(definition: UnaryResponseDefinition) -> Self {
        let (response_data, error) = match definition.response {
            Some(UnaryResponse::ResponseData(data)) => (Some(data), None),
            Some(UnaryResponse::Error(error)) => (None, Some(error)),
            None => (None, None),
        };
        Self {
            response_headers: definition.response_headers,
            response_data,
            error,
            response_trailers: definition.response_trailers,
        }
    }
}

/// How a peer must respond to a server-stream or bidi-stream RPC.
///
/// Unlike the unary definition, payloads and an error may both be declared:
/// the peer sends every payload, then fails.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct StreamResponseDefinition {
    /// Headers to send before the first response.
    pub response_headers: Vec<Header>,
    /// Response payloads, in order.
    #[serde(with = "b64::list")]
    pub response_data: Vec<Vec<u8>>,
    /// Delay before each response message, in milliseconds.
    pub response_delay_ms: u32,
    /// Error to fail with after the payloads, if any.
    pub error: Option<RpcError>,
    /// Trailers to send after the stream.
    pub response_trailers: Vec<Header>,
}

// ---------------------------------------------------------------------------
// Request messages
// ---------------------------------------------------------------------------

/// The single message of a unary RPC.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct UnaryRequest {
    /// The response the peer must produce.
    pub response_definition: Option<UnaryResponseDefinition>,
    /// Arbitrary request payload.
    #[serde(with = "b64::opt")]
    pub request_data: Option<Vec<u8>>,
}

/// One message of a client-stream RPC. Only the first message's response
/// definition is honoured.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct ClientStreamRequest {
    /// The response the peer must produce.
    pub response_definition: Option<UnaryResponseDefinition>,
    /// Arbitrary request payload.
    #[serde(with = "b64::opt")]
    pub request_data: Option<Vec<u8>>,
}

/// The single message of a server-stream RPC.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct ServerStreamRequest {
    /// The responses the peer must produce.
    pub response_definition: Option<StreamResponseDefinition>,
    /// Arbitrary request payload.
    #[serde(with = "b64::opt")]
    pub request_data: Option<Vec<u8>>,
}

/// One message of a bidirectional-stream RPC. Only the first message's
/// response definition is honoured.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct BidiStreamRequest {
    /// The responses the peer must produce.
    pub response_definition: Option<StreamResponseDefinition>,
    /// Arbitrary request payload.
    #[serde(with = "b64::opt")]
    pub request_data: Option<Vec<u8>>,
    /// Whether the peer interleaves responses with requests instead of
    /// draining the request stream first.
    pub full_duplex: bool,
}

// ---------------------------------------------------------------------------
// Client-observed results
// ---------------------------------------------------------------------------

/// Echo of what the server saw, stamped onto payloads and error details so
/// the harness can confirm the server received exactly what was sent.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct RequestInfo {
    /// The request headers the server observed.
    pub request_headers: Vec<Header>,
    /// The request envelopes the server observed.
    pub requests: Vec<TypedMessage>,
}

/// One response payload observed by the client.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct ConformancePayload {
    /// Payload bytes; `Some(vec![])` is a present, zero-length payload.
    #[serde(with = "b64::opt")]
    pub data: Option<Vec<u8>>,
    /// Echoed request info, when this payload carries it.
    pub request_info: Option<RequestInfo>,
}

/// Everything a conforming client must observe for one test case.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct ClientResponseResult {
    /// Response headers, in order.
    pub response_headers: Vec<Header>,
    /// Response payloads, in order.
    pub payloads: Vec<ConformancePayload>,
    /// Terminal error, if the RPC must fail.
    pub error: Option<RpcError>,
    /// Response trailers, in order.
    pub response_trailers: Vec<Header>,
}

// ---------------------------------------------------------------------------
// The client invocation
// ---------------------------------------------------------------------------

/// A fully described RPC invocation for the client under test.
///
/// Templates declare only the RPC shape (`test_name`, `stream_type`,
/// headers, messages); every configuration field below the marker comment is
/// stamped by materialisation and unset until then.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct ClientCompatRequest {
    /// Template name, replaced by the canonical test name on
    /// materialisation.
    pub test_name: String,
    /// Streaming discipline of the RPC.
    pub stream_type: StreamType,
    /// Headers the client must send.
    pub request_headers: Vec<Header>,
    /// Request envelopes the client must send, in order.
    pub request_messages: Vec<TypedMessage>,

    // Configuration fields, populated from the matching config case.
    /// HTTP version to use.
    pub http_version: HttpVersion,
    /// Protocol to use.
    pub protocol: Protocol,
    /// Codec to use.
    pub codec: Codec,
    /// Compression to use.
    pub compression: Compression,
    /// Whether to connect over TLS.
    pub use_tls: bool,
    /// Whether to present a TLS client certificate.
    pub use_tls_client_certs: bool,
    /// Whether unary calls use the Connect GET method.
    pub use_connect_get: bool,
    /// Connect version-header policy.
    pub connect_version_mode: ConnectVersionMode,
    /// Whether the case probes the server receive-size limit.
    pub use_message_receive_limit: bool,
    /// The advertised receive limit, set when the case probes it.
    pub message_receive_limit: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enum_names_parse_from_wire_form() {
        let stream: StreamType = serde_yaml::from_str("STREAM_TYPE_HALF_DUPLEX_BIDI_STREAM").unwrap();
        assert_eq!(stream, StreamType::HalfDuplexBidiStream);
        let code: Code = serde_yaml::from_str("CODE_RESOURCE_EXHAUSTED").unwrap();
        assert_eq!(code, Code::ResourceExhausted);
        assert_eq!(code.as_str_name(), "CODE_RESOURCE_EXHAUSTED");
    }

    #[test]
    fn http_version_keeps_protocol_numbering() {
        assert_eq!(HttpVersion::Http1 as i32, 1);
        assert_eq!(HttpVersion::Http3 as i32, 3);
        assert_eq!(Protocol::GrpcWeb as i32, 3);
    }

    #[test]
    fn unary_definition_parses_data_arm() {
        let definition: UnaryResponseDefinition = serde_yaml::from_str(
            r"
responseHeaders:
  - name: fooHeader
    value: [fooHeaderVal]
responseData: ZGF0YTE=
",
        )
        .unwrap();
        assert_eq!(
            definition.response,
            Some(UnaryResponse::ResponseData(b"data1".to_vec()))
        );
        assert_eq!(definition.response_headers[0].name, "fooHeader");
    }

    #[test]
    fn unary_definition_parses_error_arm() {
        let definition: UnaryResponseDefinition = serde_yaml::from_str(
            r#"
error:
  code: CODE_RESOURCE_EXHAUSTED
  message: "all resources exhausted"
"#,
        )
        .unwrap();
        let Some(UnaryResponse::Error(error)) = definition.response else {
            panic!("expected the error arm");
        };
        assert_eq!(error.code, Code::ResourceExhausted);
        assert_eq!(error.message.as_deref(), Some("all resources exhausted"));
    }

    #[test]
    fn unary_definition_rejects_both_arms() {
        let result: Result<UnaryResponseDefinition, _> = serde_yaml::from_str(
            r"
responseData: ZGF0YTE=
error:
  code: CODE_INTERNAL
",
        );
        assert!(result.is_err());
    }

    #[test]
    fn empty_response_data_is_distinct_from_absent() {
        let empty: UnaryResponseDefinition = serde_yaml::from_str(r#"responseData: """#).unwrap();
        assert_eq!(empty.response, Some(UnaryResponse::ResponseData(Vec::new())));

        let absent: UnaryResponseDefinition = serde_yaml::from_str("responseHeaders: []").unwrap();
        assert_eq!(absent.response, None);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result: Result<ClientCompatRequest, _> =
            serde_yaml::from_str("testNme: oops\nstreamType: STREAM_TYPE_UNARY");
        assert!(result.is_err());
    }

    #[test]
    fn stream_definition_defaults_are_empty() {
        let definition: StreamResponseDefinition = serde_yaml::from_str("{}").unwrap();
        assert!(definition.response_data.is_empty());
        assert!(definition.error.is_none());
        assert_eq!(definition.response_delay_ms, 0);
    }
}
