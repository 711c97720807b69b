use http::header::{HeaderValue, CONNECTION, CONTENT_LENGTH, CONTENT_TYPE, TRANSFER_ENCODING};
use http::{HeaderMap, StatusCode, Version};

/// RFC 7230 keep-alive: implied by HTTP/1.1 unless the `Connection`
/// header lists `close`, opt-in for HTTP/1.0 via `keep-alive`.
pub(crate) fn should_keep_alive(version: Version, headers: &HeaderMap) -> bool {
    let connection = headers.get(CONNECTION);
    if version == Version::HTTP_10 {
        connection.map_or(false, |value| connection_lists(value, "keep-alive"))
    } else {
        !connection.map_or(false, |value| connection_lists(value, "close"))
    }
}

fn connection_lists(value: &HeaderValue, option: &str) -> bool {
    value
        .to_str()
        .map(|list| {
            list.split(',')
                .any(|item| item.trim().eq_ignore_ascii_case(option))
        })
        .unwrap_or(false)
}

/// Parses `Content-Length`, tolerating a repeated header only when
/// every copy carries the same value.
pub(crate) fn content_length_parse_all(headers: &HeaderMap) -> Option<u64> {
    let mut values = headers.get_all(CONTENT_LENGTH).into_iter();
    let first = parse_content_length(values.next()?)?;
    for value in values {
        if parse_content_length(value) != Some(first) {
            return None;
        }
    }
    Some(first)
}

fn parse_content_length(value: &HeaderValue) -> Option<u64> {
    value.to_str().ok()?.parse().ok()
}

pub(crate) fn transfer_encoding_is_chunked(headers: &HeaderMap) -> bool {
    // chunked only counts as the final encoding
    headers
        .get_all(TRANSFER_ENCODING)
        .into_iter()
        .next_back()
        .and_then(|value| value.to_str().ok())
        .and_then(|list| list.rsplit(',').next())
        .map(|encoding| encoding.trim().eq_ignore_ascii_case("chunked"))
        .unwrap_or(false)
}

pub(crate) fn is_multipart(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|s| {
            s.len() >= MULTIPART_PREFIX.len()
                && s.as_bytes()[..MULTIPART_PREFIX.len()].eq_ignore_ascii_case(MULTIPART_PREFIX.as_bytes())
        })
        .unwrap_or(false)
}

const MULTIPART_PREFIX: &str = "multipart/";

/// Whether a client can detect this response's end-of-message without the
/// server closing the connection.
///
/// True for `Content-Length`, `Transfer-Encoding: chunked`, a
/// `multipart/*` content type, or a status defined to carry no body
/// (1xx, 204, 304). Absent all of these, the connection must close
/// after the response.
pub(crate) fn has_self_defined_length(status: StatusCode, headers: &HeaderMap) -> bool {
    if status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::NOT_MODIFIED
    {
        return true;
    }
    content_length_parse_all(headers).is_some()
        || transfer_encoding_is_chunked(headers)
        || is_multipart(headers)
}

pub(crate) fn set_connection_close(headers: &mut HeaderMap) {
    headers.insert(CONNECTION, HeaderValue::from_static("close"));
}
