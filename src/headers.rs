use axum::extract::FromRequestParts;
use axum::http::header::RANGE;
use axum::http::request::Parts;

use crate::{parse_byte_range, ByteRange, InvalidRangeHeader};

/// Extracts the request's `Range` header as a [`ByteRange`].
///
/// `None` when the whole resource was asked for (no header, or one we
/// treat as no range, see [`parse_byte_range`]). Rejects with
/// [`InvalidRangeHeader`], a `400 Bad Request`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestedRange(pub Option<ByteRange>);

impl<S: Send + Sync> FromRequestParts<S> for RequestedRange {
    type Rejection = InvalidRangeHeader;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // a header we cannot even read as text is as good as absent
        let header = parts.headers.get(RANGE).and_then(|value| value.to_str().ok());
        parse_byte_range(header).map(RequestedRange)
    }
}

/// `Content-Disposition` value offering `filename` as a download.
pub fn content_disposition(filename: &str) -> String {
    format!("attachment;filename=\"{}\"", filename.replace('"', "\\\""))
}

#[cfg(test)]
mod tests {
    use axum::extract::FromRequestParts;
    use axum::http::header::RANGE;
    use axum::http::{HeaderValue, Request, StatusCode};
    use axum::response::IntoResponse;

    use super::{content_disposition, RequestedRange};
    use crate::{ByteRange, InvalidRangeHeader};

    async fn extract(range: Option<HeaderValue>) -> Result<RequestedRange, InvalidRangeHeader> {
        let mut request = Request::builder().uri("/file");
        if let Some(range) = range {
            request = request.header(RANGE, range);
        }
        let (mut parts, ()) = request.body(()).unwrap().into_parts();
        RequestedRange::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_extract_range() {
        let header = HeaderValue::from_static("bytes=30-53");
        let RequestedRange(range) = extract(Some(header)).await.unwrap();
        assert_eq!(ByteRange::new(30, Some(53)), range);
    }

    #[tokio::test]
    async fn test_extract_without_header() {
        assert_eq!(RequestedRange(None), extract(None).await.unwrap());
    }

    #[tokio::test]
    async fn test_extract_multi_range_is_whole_resource() {
        let range = extract(Some(HeaderValue::from_static("bytes=0-1,5-6"))).await.unwrap();
        assert_eq!(RequestedRange(None), range);
    }

    #[tokio::test]
    async fn test_extract_opaque_bytes_is_whole_resource() {
        let value = HeaderValue::from_bytes(b"bytes=\xff-1").unwrap();
        assert_eq!(RequestedRange(None), extract(Some(value)).await.unwrap());
    }

    #[tokio::test]
    async fn test_extract_suffix_is_rejected() {
        let err = extract(Some(HeaderValue::from_static("bytes=-20"))).await.unwrap_err();
        assert_eq!("bytes=-20", err.header());

        let response = err.into_response();
        assert_eq!(StatusCode::BAD_REQUEST, response.status());
    }

    #[test]
    fn test_content_disposition() {
        assert_eq!("attachment;filename=\"report.pdf\"", content_disposition("report.pdf"));
        assert_eq!(
            "attachment;filename=\"say \\\"hi\\\".txt\"",
            content_disposition("say \"hi\".txt")
        );
    }
}
