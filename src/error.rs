use std::io;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// The client sent a `Range` header we recognise but refuse to serve:
/// a missing or negative start (suffix ranges included), or an end
/// before the start. Implements [`IntoResponse`] as `400 Bad Request`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unsupported Range header format: {header}")]
pub struct InvalidRangeHeader {
    header: String,
}

impl InvalidRangeHeader {
    pub(crate) fn new(header: &str) -> Self {
        InvalidRangeHeader { header: header.to_owned() }
    }

    /// The offending header text, as received.
    pub fn header(&self) -> &str {
        &self.header
    }
}

impl IntoResponse for InvalidRangeHeader {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, self.to_string()).into_response()
    }
}

/// Failure reported by a [`Downstream`](crate::Downstream).
#[derive(Debug, Error)]
pub enum DownstreamError {
    /// The peer went away. Not an incident, see [`relay`](crate::relay).
    #[error("peer closed the connection")]
    PeerClosed,

    #[error("downstream write failed")]
    Io(#[source] io::Error),
}

impl DownstreamError {
    pub fn is_peer_closed(&self) -> bool {
        matches!(self, DownstreamError::PeerClosed)
    }
}

impl From<io::Error> for DownstreamError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected => DownstreamError::PeerClosed,
            _ => DownstreamError::Io(err),
        }
    }
}

/// Fatal relay failure. A peer disconnect is never one of these.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("failed to read from upstream")]
    Upstream(#[source] io::Error),

    #[error("failed to write to downstream")]
    Downstream(#[source] io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} must be a positive integer, got {value:?}")]
    InvalidValue { key: &'static str, value: String },
}
