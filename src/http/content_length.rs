//! Content length extraction.

use reqwest::header::{HeaderMap, CONTENT_LENGTH};

/// Reads the declared total from the `Content-Length` header.
///
/// Returns `None` if the header is missing or is not a valid `u64`.
///
/// ```rust
/// use reqwest::header::{HeaderMap, HeaderValue, CONTENT_LENGTH};
/// use tributary::http::content_length;
///
/// let mut headers = HeaderMap::new();
/// headers.insert(CONTENT_LENGTH, HeaderValue::from_static("1000"));
/// assert_eq!(content_length(&headers), Some(1000));
/// ```
pub fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
}
