//! # range-relay
//!
//! HTTP range negotiation and backpressure-aware streaming for [`axum`][1]
//! file-serving proxies.
//!
//! Two independent pieces, composed by the request handler:
//!
//! - [`parse_byte_range`] turns a `Range` header into an inclusive
//!   [`ByteRange`] (or "no range", or [`InvalidRangeHeader`]).
//! - [`relay`] copies an [`Upstream`] into a [`Downstream`] one bounded
//!   chunk at a time, waiting for the downstream to drain before reading
//!   again. A client hanging up ends the relay normally, reported as
//!   [`Termination::PeerDisconnected`].
//!
//! Any [`AsyncRead`](tokio::io::AsyncRead) can be an upstream through
//! [`ReaderUpstream`], any byte stream (such as a `reqwest` download)
//! through [`StreamUpstream`]. [`spawn_relay`] feeds an axum response body.
//!
//! ```
//! use axum::response::{IntoResponse, Response};
//! use range_relay::{spawn_relay, ReaderUpstream, RelayConfig, RequestedRange};
//!
//! async fn download(RequestedRange(range): RequestedRange) -> Response {
//!     let data: &'static [u8] = b"Hello world this is a file to test range requests on!\n";
//!     let start = range.map(|r| r.start() as usize).unwrap_or(0).min(data.len());
//!     let upstream = ReaderUpstream::new(&data[start..]);
//!     let (body, _relay) = spawn_relay(upstream, RelayConfig::default());
//!     body.into_response()
//! }
//! ```
//!
//! [1]: https://docs.rs/axum

mod config;
mod downstream;
mod error;
mod headers;
mod range;
mod relay;
mod stats;
mod stream;
mod upstream;

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;

pub use config::RelayConfig;
pub use downstream::WriterSink;
pub use error::{ConfigError, DownstreamError, InvalidRangeHeader, RelayError};
pub use headers::{content_disposition, RequestedRange};
pub use range::{parse_byte_range, ByteRange};
pub use relay::{relay, spawn_relay, RelayOutcome, Termination};
pub use stats::TransferCounters;
pub use stream::{body_channel, ChannelSink, RelayBody};
pub use upstream::{ReaderUpstream, StreamUpstream};

/// A source of bytes read in bounded chunks.
pub trait Upstream {
    /// Reads at most `max` bytes. An empty chunk means end of stream.
    fn poll_read_chunk(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        max: usize,
    ) -> Poll<io::Result<Bytes>>;
}

/// A byte sink with flow control, typically an HTTP response.
///
/// Writing only buffers; [`poll_drain`](Downstream::poll_drain) is where
/// backpressure happens. Both report a departed peer as
/// [`DownstreamError::PeerClosed`].
pub trait Downstream {
    /// Queues `chunk` for transmission.
    fn start_write(self: Pin<&mut Self>, chunk: Bytes) -> Result<(), DownstreamError>;

    /// Resolves once buffered data is below the sink's high-water mark.
    fn poll_drain(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), DownstreamError>>;
}

impl<T: Upstream + Unpin + ?Sized> Upstream for &mut T {
    fn poll_read_chunk(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        max: usize,
    ) -> Poll<io::Result<Bytes>> {
        Pin::new(&mut **self.get_mut()).poll_read_chunk(cx, max)
    }
}

impl<T: Upstream + Unpin + ?Sized> Upstream for Box<T> {
    fn poll_read_chunk(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        max: usize,
    ) -> Poll<io::Result<Bytes>> {
        Pin::new(&mut **self.get_mut()).poll_read_chunk(cx, max)
    }
}

impl<T: Downstream + Unpin + ?Sized> Downstream for &mut T {
    fn start_write(self: Pin<&mut Self>, chunk: Bytes) -> Result<(), DownstreamError> {
        Pin::new(&mut **self.get_mut()).start_write(chunk)
    }

    fn poll_drain(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), DownstreamError>> {
        Pin::new(&mut **self.get_mut()).poll_drain(cx)
    }
}

impl<T: Downstream + Unpin + ?Sized> Downstream for Box<T> {
    fn start_write(self: Pin<&mut Self>, chunk: Bytes) -> Result<(), DownstreamError> {
        Pin::new(&mut **self.get_mut()).start_write(chunk)
    }

    fn poll_drain(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), DownstreamError>> {
        Pin::new(&mut **self.get_mut()).poll_drain(cx)
    }
}
