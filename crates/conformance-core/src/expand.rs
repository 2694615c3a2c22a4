//! Request payload expansion relative to the server receive-size limit.
//!
//! Descriptors never spell out absolute payload sizes. Instead a directive
//! says "make this request `limit + delta` bytes" so boundary probes stay
//! valid if the limit ever changes in one place.

use thiserror::Error;

use crate::message::{EnvelopeError, TypedMessage, WireMessage};
use crate::suite::TestCase;

/// Maximum message size the reference server advertises, in bytes.
///
/// This constant is a contract with the reference server: every
/// `sizeRelativeToLimit` directive is an offset from it.
pub const SERVER_RECEIVE_LIMIT: usize = 200 * 1024;

/// Errors raised while applying payload-size directives.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExpandError {
    /// More directives than request messages.
    #[error("expand directives indicate {directives} messages, but there are only {requests} requests")]
    TooManyDirectives {
        /// Number of directives declared.
        directives: usize,
        /// Number of request messages present.
        requests: usize,
    },

    /// A directive yields a negative payload size.
    #[error("expand directive #{index} ({delta}) results in an invalid request size: {size}")]
    InvalidAdjustment {
        /// One-based position of the directive.
        index: usize,
        /// The declared offset.
        delta: i64,
        /// The resulting negative size.
        size: i64,
    },

    /// A request envelope could not be opened.
    #[error("request message #{index} cannot be unpacked for expansion: {source}")]
    Unpack {
        /// Zero-based position of the message.
        index: usize,
        /// The underlying envelope error.
        #[source]
        source: EnvelopeError,
    },

    /// The envelope holds a message without a request payload.
    #[error("request message #{index} is a {type_name} and carries no request data")]
    NotExpandable {
        /// Zero-based position of the message.
        index: usize,
        /// Short name of the offending message type.
        type_name: String,
    },

    /// A resized message could not be sealed back into its envelope.
    #[error("request message #{index} cannot be re-packed after expansion: {source}")]
    Pack {
        /// Zero-based position of the message.
        index: usize,
        /// The underlying envelope error.
        #[source]
        source: EnvelopeError,
    },
}

/// Applies the case's `expand_requests` directives in place.
///
/// Directive `i` resizes the payload of request message `i` to
/// `SERVER_RECEIVE_LIMIT + delta` bytes and re-seals the envelope. Empty
/// directives and messages beyond the directive list are untouched. Grown
/// payloads are zero-filled; the harness only checks sizes.
///
/// # Errors
///
/// Returns an [`ExpandError`] when directives outnumber messages, an offset
/// yields a negative size, or an envelope cannot be opened or re-sealed.
pub fn expand_request_data(case: &mut TestCase) -> Result<(), ExpandError> {
    let directives = case.expand_requests.len();
    let requests = case.request.request_messages.len();
    if directives > requests {
        return Err(ExpandError::TooManyDirectives {
            directives,
            requests,
        });
    }
    for (index, directive) in case.expand_requests.iter().enumerate() {
        let Some(delta) = directive.size_relative_to_limit else {
            continue;
        };
        let size = SERVER_RECEIVE_LIMIT as i64 + delta;
        if size < 0 {
            return Err(ExpandError::InvalidAdjustment {
                index: index + 1,
                delta,
                size,
            });
        }
        let envelope = &mut case.request.request_messages[index];
        let mut message = envelope
            .decode()
            .map_err(|source| ExpandError::Unpack { index, source })?;
        let data = match &mut message {
            WireMessage::Unary(request) => &mut request.request_data,
            WireMessage::ClientStream(request) => &mut request.request_data,
            WireMessage::ServerStream(request) => &mut request.request_data,
            WireMessage::BidiStream(request) => &mut request.request_data,
            WireMessage::Header(_) | WireMessage::RequestInfo(_) => {
                return Err(ExpandError::NotExpandable {
                    index,
                    type_name: envelope.message_name().to_owned(),
                });
            }
        };
        data.get_or_insert_with(Vec::new).resize(size as usize, 0);
        *envelope = TypedMessage::encode(&message)
            .map_err(|source| ExpandError::Pack { index, source })?;
    }
    Ok(())
}
