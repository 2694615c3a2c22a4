//! Typed message envelopes.
//!
//! Request messages, error details, and echoed request info all travel as a
//! `(type_url, value)` pair so heterogeneous messages can share one list. The
//! payload bytes are the JSON encoding of the inner message; the type URL is
//! the only dynamic-dispatch point in the library and [`TypedMessage::decode`]
//! recovers the concrete variant from it.
//!
//! In descriptors an envelope is written as the externally tagged sum, e.g.
//!
//! ```yaml
//! requestMessages:
//!   - unary:
//!       responseDefinition:
//!         responseData: ZGF0YTE=
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use super::{
    BidiStreamRequest, ClientStreamRequest, Header, RequestInfo, ServerStreamRequest, UnaryRequest,
};

/// Prefix shared by every type URL this library emits.
pub const TYPE_URL_PREFIX: &str = "type.googleapis.com/conformance.v1.";

/// A message that can be carried inside a [`TypedMessage`] envelope.
pub trait EnvelopePayload: Serialize + DeserializeOwned {
    /// Short type name appended to [`TYPE_URL_PREFIX`].
    const TYPE_NAME: &'static str;
}

impl EnvelopePayload for UnaryRequest {
    const TYPE_NAME: &'static str = "UnaryRequest";
}

impl EnvelopePayload for ClientStreamRequest {
    const TYPE_NAME: &'static str = "ClientStreamRequest";
}

impl EnvelopePayload for ServerStreamRequest {
    const TYPE_NAME: &'static str = "ServerStreamRequest";
}

impl EnvelopePayload for BidiStreamRequest {
    const TYPE_NAME: &'static str = "BidiStreamRequest";
}

impl EnvelopePayload for Header {
    const TYPE_NAME: &'static str = "Header";
}

impl EnvelopePayload for RequestInfo {
    const TYPE_NAME: &'static str = "RequestInfo";
}

/// Errors raised while packing or unpacking envelopes.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EnvelopeError {
    /// The inner message could not be encoded.
    #[error("cannot encode {type_name} payload: {source}")]
    Encode {
        /// Short type name of the message being packed.
        type_name: &'static str,
        /// The underlying encoding error.
        #[source]
        source: serde_json::Error,
    },

    /// The envelope bytes could not be decoded as the named type.
    #[error("cannot decode {type_url} payload: {source}")]
    Decode {
        /// Type URL recorded on the envelope.
        type_url: String,
        /// The underlying decoding error.
        #[source]
        source: serde_json::Error,
    },

    /// The envelope holds a different message type than requested.
    #[error("envelope holds {actual}, expected {expected}")]
    TypeMismatch {
        /// Short type name the caller asked for.
        expected: &'static str,
        /// Type URL recorded on the envelope.
        actual: String,
    },

    /// The type URL does not name any known message.
    #[error("unrecognized message type URL {0}")]
    UnknownType(String),
}

/// Every message the envelope can carry, as one sum.
///
/// This is also the descriptor-facing representation: serde reads and writes
/// the externally tagged form (`unary:`, `header:`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WireMessage {
    /// A unary RPC request.
    Unary(UnaryRequest),
    /// One message of a client-stream request.
    ClientStream(ClientStreamRequest),
    /// A server-stream request.
    ServerStream(ServerStreamRequest),
    /// One message of a bidirectional-stream request.
    BidiStream(BidiStreamRequest),
    /// A bare header, used as an opaque error detail.
    Header(Header),
    /// Echoed request info, used as a payload annotation or error detail.
    RequestInfo(RequestInfo),
}

/// An opaque typed payload: a type URL plus the encoded message bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypedMessage {
    /// Fully qualified type URL, `TYPE_URL_PREFIX` + short name.
    pub type_url: String,
    /// JSON encoding of the inner message.
    pub value: Vec<u8>,
}

impl TypedMessage {
    /// Seals `message` into an envelope.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::Encode`] if the message cannot be encoded.
    pub fn pack<M: EnvelopePayload>(message: &M) -> Result<Self, EnvelopeError> {
        let value = serde_json::to_vec(message).map_err(|source| EnvelopeError::Encode {
            type_name: M::TYPE_NAME,
            source,
        })?;
        Ok(Self {
            type_url: format!("{TYPE_URL_PREFIX}{}", M::TYPE_NAME),
            value,
        })
    }

    /// Opens the envelope as a message of type `M`.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::TypeMismatch`] if the envelope holds a
    /// different type, or [`EnvelopeError::Decode`] if the bytes are not a
    /// valid encoding of `M`.
    pub fn unpack<M: EnvelopePayload>(&self) -> Result<M, EnvelopeError> {
        if self.message_name() != M::TYPE_NAME {
            return Err(EnvelopeError::TypeMismatch {
                expected: M::TYPE_NAME,
                actual: self.type_url.clone(),
            });
        }
        serde_json::from_slice(&self.value).map_err(|source| EnvelopeError::Decode {
            type_url: self.type_url.clone(),
            source,
        })
    }

    /// Short message name: the last `.`- or `/`-delimited segment of the
    /// type URL.
    #[must_use]
    pub fn message_name(&self) -> &str {
        self.type_url
            .rsplit(['.', '/'])
            .next()
            .unwrap_or(&self.type_url)
    }

    /// Recovers the concrete message variant from the type URL.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::UnknownType`] for a type URL this library
    /// does not model, or a decode error for corrupt payload bytes.
    pub fn decode(&self) -> Result<WireMessage, EnvelopeError> {
        match self.message_name() {
            UnaryRequest::TYPE_NAME => self.unpack().map(WireMessage::Unary),
            ClientStreamRequest::TYPE_NAME => self.unpack().map(WireMessage::ClientStream),
            ServerStreamRequest::TYPE_NAME => self.unpack().map(WireMessage::ServerStream),
            BidiStreamRequest::TYPE_NAME => self.unpack().map(WireMessage::BidiStream),
            Header::TYPE_NAME => self.unpack().map(WireMessage::Header),
            RequestInfo::TYPE_NAME => self.unpack().map(WireMessage::RequestInfo),
            _ => Err(EnvelopeError::UnknownType(self.type_url.clone())),
        }
    }

    /// Seals a [`WireMessage`] back into an envelope.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::Encode`] if the message cannot be encoded.
    pub fn encode(message: &WireMessage) -> Result<Self, EnvelopeError> {
        match message {
            WireMessage::Unary(message) => Self::pack(message),
            WireMessage::ClientStream(message) => Self::pack(message),
            WireMessage::ServerStream(message) => Self::pack(message),
            WireMessage::BidiStream(message) => Self::pack(message),
            WireMessage::Header(message) => Self::pack(message),
            WireMessage::RequestInfo(message) => Self::pack(message),
        }
    }
}

impl Serialize for TypedMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let message = self.decode().map_err(serde::ser::Error::custom)?;
        message.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for TypedMessage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let message = WireMessage::deserialize(deserializer)?;
        Self::encode(&message).map_err(serde::de::Error::custom)
    }
}
