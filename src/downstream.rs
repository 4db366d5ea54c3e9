use std::pin::Pin;
use std::task::{ready, Context, Poll};

use bytes::{Buf, Bytes, BytesMut};
use pin_project::pin_project;
use tokio::io::AsyncWrite;

use crate::{Downstream, DownstreamError};

/// Implements [`Downstream`] for any [`AsyncWrite`], such as a
/// [`tokio::net::TcpStream`]. Draining writes out everything queued and
/// then flushes the writer.
#[pin_project]
pub struct WriterSink<W> {
    pending: Bytes,
    #[pin]
    writer: W,
}

impl<W: AsyncWrite> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        WriterSink { pending: Bytes::new(), writer }
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Any bytes written but not yet drained are dropped.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: AsyncWrite> Downstream for WriterSink<W> {
    fn start_write(self: Pin<&mut Self>, chunk: Bytes) -> Result<(), DownstreamError> {
        enqueue(self.project().pending, chunk);
        Ok(())
    }

    fn poll_drain(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), DownstreamError>> {
        let mut this = self.project();

        while !this.pending.is_empty() {
            let n = ready!(this.writer.as_mut().poll_write(cx, this.pending))?;
            if n == 0 {
                return Poll::Ready(Err(DownstreamError::PeerClosed));
            }
            this.pending.advance(n);
        }

        ready!(this.writer.poll_flush(cx))?;
        Poll::Ready(Ok(()))
    }
}

/// Appends `chunk` behind anything not yet drained.
pub(crate) fn enqueue(pending: &mut Bytes, chunk: Bytes) {
    if pending.is_empty() {
        *pending = chunk;
        return;
    }
    let mut joined = BytesMut::with_capacity(pending.len() + chunk.len());
    joined.extend_from_slice(pending);
    joined.extend_from_slice(&chunk);
    *pending = joined.freeze();
}
