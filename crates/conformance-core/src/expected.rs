//! Expected-response synthesis for materialised test cases.
//!
//! The response a conforming peer must deliver is computed entirely from the
//! first request message's embedded response definition; later messages of a
//! multi-request stream only contribute to the echoed request info. The
//! rules differ per streaming discipline, chiefly in where the request info
//! lands: on the first payload, on every payload, or appended to the error
//! details when there is no payload to carry it.

use thiserror::Error;

use crate::message::{
    BidiStreamRequest, ClientCompatRequest, ClientResponseResult, ClientStreamRequest,
    ConformancePayload, EnvelopeError, EnvelopePayload, RequestInfo, RpcError,
    ServerStreamRequest, StreamResponseDefinition, StreamType, TypedMessage, UnaryRequest,
    UnaryResponse, UnaryResponseDefinition,
};
use crate::suite::TestCase;

/// Errors raised while computing an expected response.
///
/// All of them indicate a malformed descriptor; none depend on runtime
/// state.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExpectedResponseError {
    /// The case declares a stream type the engine does not implement.
    #[error("stream type {0} is not supported")]
    UnsupportedStreamType(StreamType),

    /// A request envelope could not be opened as its stream's request type.
    #[error("request message #{index} cannot be unpacked: {source}")]
    Unpack {
        /// Zero-based position of the message.
        index: usize,
        /// The underlying envelope error.
        #[source]
        source: EnvelopeError,
    },

    /// The echoed request info could not be packed into an envelope.
    #[error("request info cannot be packed into error details: {source}")]
    Pack {
        /// The underlying envelope error.
        #[source]
        source: EnvelopeError,
    },
}

/// Computes and stamps `expected_response` onto the case.
///
/// A pre-declared `expected_response` is left untouched so descriptors can
/// override the engine for cases it cannot model. A case with no request
/// messages yields an empty result.
///
/// # Errors
///
/// Returns an [`ExpectedResponseError`] when the stream type is not
/// implemented or envelope packing fails.
pub fn populate_expected_response(case: &mut TestCase) -> Result<(), ExpectedResponseError> {
    if case.expected_response.is_some() {
        return Ok(());
    }
    let request = &case.request;
    if request.request_messages.is_empty() {
        case.expected_response = Some(ClientResponseResult::default());
        return Ok(());
    }
    let expected = match request.stream_type {
        StreamType::Unary => {
            let first: UnaryRequest = unpack_first(request)?;
            unary_expectation(request, first.response_definition)?
        }
        StreamType::ClientStream => {
            let first: ClientStreamRequest = unpack_first(request)?;
            unary_expectation(request, first.response_definition)?
        }
        StreamType::ServerStream => {
            let first: ServerStreamRequest = unpack_first(request)?;
            stream_expectation(request, first.response_definition)?
        }
        StreamType::HalfDuplexBidiStream => {
            let first: BidiStreamRequest = unpack_first(request)?;
            stream_expectation(request, first.response_definition)?
        }
        StreamType::FullDuplexBidiStream => {
            let first: BidiStreamRequest = unpack_first(request)?;
            full_duplex_expectation(request, first.response_definition)?
        }
        StreamType::Unspecified => {
            return Err(ExpectedResponseError::UnsupportedStreamType(
                request.stream_type,
            ));
        }
    };
    case.expected_response = Some(expected);
    Ok(())
}

fn unpack_first<M: EnvelopePayload>(
    request: &ClientCompatRequest,
) -> Result<M, ExpectedResponseError> {
    request.request_messages[0]
        .unpack()
        .map_err(|source| ExpectedResponseError::Unpack { index: 0, source })
}

/// Request info echoing the full request: all headers, all messages.
fn full_request_info(request: &ClientCompatRequest) -> RequestInfo {
    RequestInfo {
        request_headers: request.request_headers.clone(),
        requests: request.request_messages.clone(),
    }
}

/// Appends the packed request info to the error's details, after any details
/// the descriptor already declared.
fn append_request_info(
    error: &mut RpcError,
    info: &RequestInfo,
) -> Result<(), ExpectedResponseError> {
    let packed =
        TypedMessage::pack(info).map_err(|source| ExpectedResponseError::Pack { source })?;
    error.details.push(packed);
    Ok(())
}

/// Unary and client-stream rules: one payload or one error, with the full
/// request info on whichever exists.
fn unary_expectation(
    request: &ClientCompatRequest,
    definition: Option<UnaryResponseDefinition>,
) -> Result<ClientResponseResult, ExpectedResponseError> {
    let mut expected = ClientResponseResult::default();
    let Some(definition) = definition else {
        // The server echoes request info even with no definition.
        expected.payloads.push(ConformancePayload {
            data: None,
            request_info: Some(full_request_info(request)),
        });
        return Ok(expected);
    };
    expected.response_headers = definition.response_headers;
    expected.response_trailers = definition.response_trailers;
    match definition.response {
        Some(UnaryResponse::Error(mut error)) => {
            append_request_info(&mut error, &full_request_info(request))?;
            expected.error = Some(error);
        }
        response => {
            let data = match response {
                Some(UnaryResponse::ResponseData(data)) => Some(data),
                _ => None,
            };
            expected.payloads.push(ConformancePayload {
                data,
                request_info: Some(full_request_info(request)),
            });
        }
    }
    Ok(expected)
}

/// Server-stream and half-duplex rules: the first payload carries the full
/// request info; an error without payloads carries it in its details.
fn stream_expectation(
    request: &ClientCompatRequest,
    definition: Option<StreamResponseDefinition>,
) -> Result<ClientResponseResult, ExpectedResponseError> {
    let mut expected = ClientResponseResult::default();
    let Some(definition) = definition else {
        return Ok(expected);
    };
    expected.response_headers = definition.response_headers;
    expected.response_trailers = definition.response_trailers;
    if definition.response_data.is_empty() {
        if let Some(mut error) = definition.error {
            append_request_info(&mut error, &full_request_info(request))?;
            expected.error = Some(error);
        }
        return Ok(expected);
    }
    expected.payloads = definition
        .response_data
        .into_iter()
        .enumerate()
        .map(|(index, data)| ConformancePayload {
            data: Some(data),
            request_info: (index == 0).then(|| full_request_info(request)),
        })
        .collect();
    // The first payload already echoes the request info, so the error is
    // expected verbatim.
    expected.error = definition.error;
    Ok(expected)
}

/// Full-duplex rules: each payload echoes the request it answers; only the
/// first carries the request headers.
fn full_duplex_expectation(
    request: &ClientCompatRequest,
    definition: Option<StreamResponseDefinition>,
) -> Result<ClientResponseResult, ExpectedResponseError> {
    let mut expected = ClientResponseResult::default();
    let Some(definition) = definition else {
        return Ok(expected);
    };
    expected.response_headers = definition.response_headers;
    expected.response_trailers = definition.response_trailers;
    if definition.response_data.is_empty() {
        if let Some(mut error) = definition.error {
            append_request_info(&mut error, &full_request_info(request))?;
            expected.error = Some(error);
        }
        return Ok(expected);
    }
    expected.payloads = definition
        .response_data
        .into_iter()
        .enumerate()
        .map(|(index, data)| {
            let info = RequestInfo {
                request_headers: if index == 0 {
                    request.request_headers.clone()
                } else {
                    Vec::new()
                },
                requests: request
                    .request_messages
                    .get(index)
                    .cloned()
                    .into_iter()
                    .collect(),
            };
            ConformancePayload {
                data: Some(data),
                request_info: Some(info),
            }
        })
        .collect();
    expected.error = definition.error;
    Ok(expected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Code, Header};

    fn request_headers() -> Vec<Header> {
        vec![Header {
            name: "reqHeader".to_owned(),
            value: vec!["reqHeaderVal".to_owned()],
        }]
    }

    fn response_headers() -> Vec<Header> {
        vec![
            Header {
                name: "fooHeader".to_owned(),
                value: vec!["fooHeaderVal".to_owned()],
            },
            Header {
                name: "barHeader".to_owned(),
                value: vec!["barHeaderVal1".to_owned(), "barHeaderVal2".to_owned()],
            },
        ]
    }

    fn response_trailers() -> Vec<Header> {
        vec![
            Header {
                name: "fooTrailer".to_owned(),
                value: vec!["fooTrailerVal".to_owned()],
            },
            Header {
                name: "barTrailer".to_owned(),
                value: vec!["barTrailerVal1".to_owned(), "barTrailerVal2".to_owned()],
            },
        ]
    }

    fn error_definition() -> RpcError {
        RpcError {
            code: Code::ResourceExhausted,
            message: Some("all resources exhausted".to_owned()),
            details: Vec::new(),
        }
    }

    fn unary_definition(response: Option<UnaryResponse>) -> UnaryResponseDefinition {
        UnaryResponseDefinition {
            response_headers: response_headers(),
            response,
            response_trailers: response_trailers(),
        }
    }

    fn stream_definition(
        response_data: Vec<Vec<u8>>,
        error: Option<RpcError>,
    ) -> StreamResponseDefinition {
        StreamResponseDefinition {
            response_headers: response_headers(),
            response_data,
            response_delay_ms: 1000,
            error,
            response_trailers: response_trailers(),
        }
    }

    fn case_for(stream_type: StreamType, messages: Vec<TypedMessage>) -> TestCase {
        let mut case = TestCase::default();
        case.request.stream_type = stream_type;
        case.request.request_headers = request_headers();
        case.request.request_messages = messages;
        case
    }

    fn expect(case: &mut TestCase) -> ClientResponseResult {
        populate_expected_response(case).unwrap();
        case.expected_response.clone().unwrap()
    }

    fn request_info_for(case: &TestCase) -> RequestInfo {
        RequestInfo {
            request_headers: case.request.request_headers.clone(),
            requests: case.request.request_messages.clone(),
        }
    }

    #[test]
    fn unary_success() {
        let message = TypedMessage::pack(&UnaryRequest {
            response_definition: Some(unary_definition(Some(UnaryResponse::ResponseData(
                b"data1".to_vec(),
            )))),
            request_data: None,
        })
        .unwrap();
        let mut case = case_for(StreamType::Unary, vec![message]);
        let expected = expect(&mut case);
        assert_eq!(expected.response_headers, response_headers());
        assert_eq!(expected.response_trailers, response_trailers());
        assert!(expected.error.is_none());
        assert_eq!(
            expected.payloads,
            vec![ConformancePayload {
                data: Some(b"data1".to_vec()),
                request_info: Some(request_info_for(&case)),
            }]
        );
    }

    #[test]
    fn unary_error_gains_request_info_detail() {
        let message = TypedMessage::pack(&UnaryRequest {
            response_definition: Some(unary_definition(Some(UnaryResponse::Error(
                error_definition(),
            )))),
            request_data: None,
        })
        .unwrap();
        let mut case = case_for(StreamType::Unary, vec![message]);
        let expected = expect(&mut case);
        assert!(expected.payloads.is_empty());
        let error = expected.error.unwrap();
        assert_eq!(error.code, Code::ResourceExhausted);
        assert_eq!(error.message.as_deref(), Some("all resources exhausted"));
        assert_eq!(
            error.details,
            vec![TypedMessage::pack(&request_info_for(&case)).unwrap()]
        );
    }

    #[test]
    fn unary_error_keeps_declared_details_first() {
        let detail = TypedMessage::pack(&Header {
            name: "detail test".to_owned(),
            value: vec!["val1".to_owned(), "val2".to_owned()],
        })
        .unwrap();
        let mut error = error_definition();
        error.details.push(detail.clone());
        let message = TypedMessage::pack(&UnaryRequest {
            response_definition: Some(unary_definition(Some(UnaryResponse::Error(error)))),
            request_data: None,
        })
        .unwrap();
        let mut case = case_for(StreamType::Unary, vec![message]);
        let expected = expect(&mut case);
        let error = expected.error.unwrap();
        assert_eq!(
            error.details,
            vec![
                detail,
                TypedMessage::pack(&request_info_for(&case)).unwrap()
            ]
        );
    }

    #[test]
    fn unary_empty_response_data_yields_an_empty_payload() {
        let message = TypedMessage::pack(&UnaryRequest {
            response_definition: Some(unary_definition(Some(UnaryResponse::ResponseData(
                Vec::new(),
            )))),
            request_data: None,
        })
        .unwrap();
        let mut case = case_for(StreamType::Unary, vec![message]);
        let expected = expect(&mut case);
        assert_eq!(expected.payloads[0].data, Some(Vec::new()));
    }

    #[test]
    fn unary_without_response_still_echoes_request_info() {
        let message = TypedMessage::pack(&UnaryRequest {
            response_definition: Some(unary_definition(None)),
            request_data: None,
        })
        .unwrap();
        let mut case = case_for(StreamType::Unary, vec![message]);
        let expected = expect(&mut case);
        assert_eq!(expected.response_headers, response_headers());
        assert_eq!(
            expected.payloads,
            vec![ConformancePayload {
                data: None,
                request_info: Some(request_info_for(&case)),
            }]
        );
    }

    #[test]
    fn unary_without_definition_still_echoes_request_info() {
        let message = TypedMessage::pack(&UnaryRequest::default()).unwrap();
        let mut case = case_for(StreamType::Unary, vec![message]);
        let expected = expect(&mut case);
        assert!(expected.response_headers.is_empty());
        assert!(expected.response_trailers.is_empty());
        assert_eq!(
            expected.payloads,
            vec![ConformancePayload {
                data: None,
                request_info: Some(request_info_for(&case)),
            }]
        );
    }

    #[test]
    fn client_stream_echoes_every_request() {
        let first = TypedMessage::pack(&ClientStreamRequest {
            response_definition: Some(unary_definition(Some(UnaryResponse::ResponseData(
                b"data1".to_vec(),
            )))),
            request_data: Some(b"data1".to_vec()),
        })
        .unwrap();
        let second = TypedMessage::pack(&ClientStreamRequest {
            response_definition: None,
            request_data: Some(b"data1".to_vec()),
        })
        .unwrap();
        let mut case = case_for(StreamType::ClientStream, vec![first, second]);
        let expected = expect(&mut case);
        assert_eq!(expected.payloads.len(), 1);
        let info = expected.payloads[0].request_info.clone().unwrap();
        assert_eq!(info.requests.len(), 2);
        assert_eq!(info.requests, case.request.request_messages);
    }

    #[test]
    fn client_stream_error_gains_request_info_detail() {
        let first = TypedMessage::pack(&ClientStreamRequest {
            response_definition: Some(unary_definition(Some(UnaryResponse::Error(
                error_definition(),
            )))),
            request_data: None,
        })
        .unwrap();
        let second = TypedMessage::pack(&ClientStreamRequest {
            response_definition: None,
            request_data: Some(b"data1".to_vec()),
        })
        .unwrap();
        let mut case = case_for(StreamType::ClientStream, vec![first, second]);
        let expected = expect(&mut case);
        let error = expected.error.unwrap();
        assert_eq!(
            error.details,
            vec![TypedMessage::pack(&request_info_for(&case)).unwrap()]
        );
    }

    #[test]
    fn server_stream_stamps_only_the_first_payload() {
        let message = TypedMessage::pack(&ServerStreamRequest {
            response_definition: Some(stream_definition(
                vec![b"data1".to_vec(), b"data2".to_vec()],
                None,
            )),
            request_data: None,
        })
        .unwrap();
        let mut case = case_for(StreamType::ServerStream, vec![message]);
        let expected = expect(&mut case);
        assert_eq!(
            expected.payloads,
            vec![
                ConformancePayload {
                    data: Some(b"data1".to_vec()),
                    request_info: Some(request_info_for(&case)),
                },
                ConformancePayload {
                    data: Some(b"data2".to_vec()),
                    request_info: None,
                },
            ]
        );
        assert!(expected.error.is_none());
    }

    #[test]
    fn server_stream_error_after_payloads_stays_verbatim() {
        let message = TypedMessage::pack(&ServerStreamRequest {
            response_definition: Some(stream_definition(
                vec![b"data1".to_vec(), b"data2".to_vec()],
                Some(error_definition()),
            )),
            request_data: None,
        })
        .unwrap();
        let mut case = case_for(StreamType::ServerStream, vec![message]);
        let expected = expect(&mut case);
        assert_eq!(expected.payloads.len(), 2);
        assert_eq!(expected.error, Some(error_definition()));
    }

    #[test]
    fn server_stream_error_without_payloads_gains_request_info() {
        let message = TypedMessage::pack(&ServerStreamRequest {
            response_definition: Some(stream_definition(Vec::new(), Some(error_definition()))),
            request_data: None,
        })
        .unwrap();
        let mut case = case_for(StreamType::ServerStream, vec![message]);
        let expected = expect(&mut case);
        assert!(expected.payloads.is_empty());
        let error = expected.error.unwrap();
        assert_eq!(
            error.details,
            vec![TypedMessage::pack(&request_info_for(&case)).unwrap()]
        );
    }

    #[test]
    fn server_stream_without_payloads_or_error_keeps_metadata() {
        let message = TypedMessage::pack(&ServerStreamRequest {
            response_definition: Some(stream_definition(Vec::new(), None)),
            request_data: None,
        })
        .unwrap();
        let mut case = case_for(StreamType::ServerStream, vec![message]);
        let expected = expect(&mut case);
        assert!(expected.payloads.is_empty());
        assert!(expected.error.is_none());
        assert_eq!(expected.response_headers, response_headers());
        assert_eq!(expected.response_trailers, response_trailers());
    }

    #[test]
    fn server_stream_without_definition_is_empty() {
        let message = TypedMessage::pack(&ServerStreamRequest::default()).unwrap();
        let mut case = case_for(StreamType::ServerStream, vec![message]);
        let expected = expect(&mut case);
        assert_eq!(expected, ClientResponseResult::default());
    }

    #[test]
    fn half_duplex_follows_server_stream_placement() {
        let first = TypedMessage::pack(&BidiStreamRequest {
            response_definition: Some(stream_definition(
                vec![b"data1".to_vec(), b"data2".to_vec()],
                None,
            )),
            request_data: Some(b"data1".to_vec()),
            full_duplex: false,
        })
        .unwrap();
        let second = TypedMessage::pack(&BidiStreamRequest {
            response_definition: None,
            request_data: Some(b"data2".to_vec()),
            full_duplex: false,
        })
        .unwrap();
        let mut case = case_for(StreamType::HalfDuplexBidiStream, vec![first, second]);
        let expected = expect(&mut case);
        assert_eq!(
            expected.payloads[0].request_info,
            Some(request_info_for(&case))
        );
        assert_eq!(expected.payloads[1].request_info, None);
    }

    #[test]
    fn half_duplex_error_without_payloads_echoes_every_request() {
        let first = TypedMessage::pack(&BidiStreamRequest {
            response_definition: Some(stream_definition(Vec::new(), Some(error_definition()))),
            request_data: None,
            full_duplex: false,
        })
        .unwrap();
        let second = TypedMessage::pack(&BidiStreamRequest {
            response_definition: None,
            request_data: Some(b"data2".to_vec()),
            full_duplex: false,
        })
        .unwrap();
        let mut case = case_for(StreamType::HalfDuplexBidiStream, vec![first, second]);
        let expected = expect(&mut case);
        let error = expected.error.unwrap();
        assert_eq!(
            error.details,
            vec![TypedMessage::pack(&request_info_for(&case)).unwrap()]
        );
    }

    #[test]
    fn full_duplex_pairs_each_payload_with_its_request() {
        let first = TypedMessage::pack(&BidiStreamRequest {
            response_definition: Some(stream_definition(
                vec![b"data1".to_vec(), b"data2".to_vec()],
                None,
            )),
            request_data: Some(b"data1".to_vec()),
            full_duplex: true,
        })
        .unwrap();
        let second = TypedMessage::pack(&BidiStreamRequest {
            response_definition: None,
            request_data: Some(b"data2".to_vec()),
            full_duplex: true,
        })
        .unwrap();
        let mut case = case_for(StreamType::FullDuplexBidiStream, vec![first, second]);
        let expected = expect(&mut case);
        assert_eq!(
            expected.payloads,
            vec![
                ConformancePayload {
                    data: Some(b"data1".to_vec()),
                    request_info: Some(RequestInfo {
                        request_headers: request_headers(),
                        requests: vec![case.request.request_messages[0].clone()],
                    }),
                },
                ConformancePayload {
                    data: Some(b"data2".to_vec()),
                    request_info: Some(RequestInfo {
                        request_headers: Vec::new(),
                        requests: vec![case.request.request_messages[1].clone()],
                    }),
                },
            ]
        );
        assert_eq!(expected.response_trailers, response_trailers());
    }

    #[test]
    fn full_duplex_error_after_payloads_stays_verbatim() {
        let first = TypedMessage::pack(&BidiStreamRequest {
            response_definition: Some(stream_definition(
                vec![b"data1".to_vec(), b"data2".to_vec()],
                Some(error_definition()),
            )),
            request_data: Some(b"data1".to_vec()),
            full_duplex: true,
        })
        .unwrap();
        let second = TypedMessage::pack(&BidiStreamRequest {
            response_definition: None,
            request_data: Some(b"data2".to_vec()),
            full_duplex: true,
        })
        .unwrap();
        let mut case = case_for(StreamType::FullDuplexBidiStream, vec![first, second]);
        let expected = expect(&mut case);
        assert_eq!(expected.payloads.len(), 2);
        assert_eq!(expected.error, Some(error_definition()));
    }

    #[test]
    fn full_duplex_error_without_payloads_echoes_every_request() {
        let first = TypedMessage::pack(&BidiStreamRequest {
            response_definition: Some(stream_definition(Vec::new(), Some(error_definition()))),
            request_data: Some(b"data1".to_vec()),
            full_duplex: true,
        })
        .unwrap();
        let second = TypedMessage::pack(&BidiStreamRequest {
            response_definition: None,
            request_data: Some(b"data2".to_vec()),
            full_duplex: true,
        })
        .unwrap();
        let mut case = case_for(StreamType::FullDuplexBidiStream, vec![first, second]);
        let expected = expect(&mut case);
        assert!(expected.payloads.is_empty());
        let error = expected.error.unwrap();
        assert_eq!(
            error.details,
            vec![TypedMessage::pack(&request_info_for(&case)).unwrap()]
        );
    }

    #[test]
    fn full_duplex_extra_payloads_carry_empty_request_info() {
        let first = TypedMessage::pack(&BidiStreamRequest {
            response_definition: Some(stream_definition(
                vec![b"data1".to_vec(), b"data2".to_vec()],
                None,
            )),
            request_data: None,
            full_duplex: true,
        })
        .unwrap();
        let mut case = case_for(StreamType::FullDuplexBidiStream, vec![first]);
        let expected = expect(&mut case);
        let info = expected.payloads[1].request_info.clone().unwrap();
        assert!(info.request_headers.is_empty());
        assert!(info.requests.is_empty());
    }

    #[test]
    fn predeclared_expectation_is_left_untouched() {
        let mut declared = ClientResponseResult::default();
        declared.response_trailers = response_trailers();
        let mut case = case_for(
            StreamType::Unary,
            vec![TypedMessage::pack(&UnaryRequest::default()).unwrap()],
        );
        case.expected_response = Some(declared.clone());
        populate_expected_response(&mut case).unwrap();
        assert_eq!(case.expected_response, Some(declared));
    }

    #[test]
    fn no_request_messages_yield_an_empty_result() {
        let mut case = case_for(StreamType::Unary, Vec::new());
        populate_expected_response(&mut case).unwrap();
        assert_eq!(case.expected_response, Some(ClientResponseResult::default()));
    }

    #[test]
    fn mismatched_first_message_is_an_unpack_failure() {
        let message = TypedMessage::pack(&ClientStreamRequest::default()).unwrap();
        let mut case = case_for(StreamType::Unary, vec![message]);
        let err = populate_expected_response(&mut case).unwrap_err();
        assert!(matches!(
            err,
            ExpectedResponseError::Unpack { index: 0, .. }
        ));
    }

    #[test]
    fn unspecified_stream_type_is_rejected() {
        let message = TypedMessage::pack(&UnaryRequest::default()).unwrap();
        let mut case = case_for(StreamType::Unspecified, vec![message]);
        let err = populate_expected_response(&mut case).unwrap_err();
        assert!(matches!(
            err,
            ExpectedResponseError::UnsupportedStreamType(StreamType::Unspecified)
        ));
    }
}
