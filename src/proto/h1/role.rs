use http::header::{HeaderValue, CONNECTION, CONTENT_LENGTH, DATE};
use http::StatusCode;

use super::date;
use crate::error::{Error, Kind};
use crate::proto::{MessageHead, ResponseHead};

/// Synthesizes a framing-safe response for a failed request.
///
/// The head is fully self-framed (`Content-Length: 0`) and carries
/// `Connection: close`, since the connection will not be trusted after
/// a decode failure.
pub(crate) fn error_response(err: &Error) -> ResponseHead {
    let status = match *err.kind() {
        Kind::Version => StatusCode::HTTP_VERSION_NOT_SUPPORTED,
        _ => StatusCode::BAD_REQUEST,
    };
    let mut head = MessageHead::new(status);
    head.headers
        .insert(CONTENT_LENGTH, HeaderValue::from_static("0"));
    head.headers
        .insert(CONNECTION, HeaderValue::from_static("close"));
    head.headers.insert(DATE, date::update_and_header_value());
    head
}
