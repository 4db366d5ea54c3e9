use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use bytes::{Bytes, BytesMut};
use futures::stream::{Stream, TryStream};
use pin_project::pin_project;
use tokio::io::{AsyncRead, ReadBuf};

use crate::Upstream;

/// Implements [`Upstream`] for any [`AsyncRead`], such as a
/// file already positioned at the start of the slice.
///
/// Holds a single read buffer of at most `max` bytes.
#[pin_project]
pub struct ReaderUpstream<R> {
    buffer: BytesMut,
    #[pin]
    reader: R,
}

impl<R: AsyncRead> ReaderUpstream<R> {
    pub fn new(reader: R) -> Self {
        ReaderUpstream { buffer: BytesMut::new(), reader }
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: AsyncRead> Upstream for ReaderUpstream<R> {
    fn poll_read_chunk(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        max: usize,
    ) -> Poll<io::Result<Bytes>> {
        let this = self.project();

        // the previous chunk took the old allocation with it
        if this.buffer.capacity() < max {
            this.buffer.reserve(max);
        }

        let uninit = this.buffer.spare_capacity_mut();
        let nbytes = std::cmp::min(uninit.len(), max);
        let mut read_buf = ReadBuf::uninit(&mut uninit[..nbytes]);

        ready!(this.reader.poll_read(cx, &mut read_buf))?;

        let n = read_buf.filled().len();
        if n == 0 {
            return Poll::Ready(Ok(Bytes::new()));
        }

        // SAFETY: poll_read initialised `n` more bytes of spare capacity,
        // and `buffer.len` is 0 between chunks
        unsafe { this.buffer.set_len(this.buffer.len() + n) };

        Poll::Ready(Ok(std::mem::take(this.buffer).freeze()))
    }
}

/// Implements [`Upstream`] for a stream of byte chunks, e.g. a backend's
/// download body. Items longer than `max` are handed out in pieces and
/// empty items are skipped.
#[pin_project]
pub struct StreamUpstream<S> {
    pending: Bytes,
    done: bool,
    #[pin]
    stream: S,
}

impl<S> StreamUpstream<S>
where
    S: TryStream<Ok = Bytes>,
    S::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    pub fn new(stream: S) -> Self {
        StreamUpstream { pending: Bytes::new(), done: false, stream }
    }
}

impl StreamUpstream<()> {
    /// Streams the body of a backend response.
    pub fn from_response(
        response: reqwest::Response,
    ) -> StreamUpstream<impl Stream<Item = reqwest::Result<Bytes>> + Send> {
        StreamUpstream::new(response.bytes_stream())
    }
}

impl<S> Upstream for StreamUpstream<S>
where
    S: TryStream<Ok = Bytes>,
    S::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    fn poll_read_chunk(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        max: usize,
    ) -> Poll<io::Result<Bytes>> {
        let mut this = self.project();

        while this.pending.is_empty() {
            if *this.done {
                return Poll::Ready(Ok(Bytes::new()));
            }
            match ready!(this.stream.as_mut().try_poll_next(cx)) {
                Some(Ok(chunk)) => *this.pending = chunk,
                Some(Err(e)) => return Poll::Ready(Err(into_io_error(e.into()))),
                None => *this.done = true,
            }
        }

        let n = std::cmp::min(max, this.pending.len());
        Poll::Ready(Ok(this.pending.split_to(n)))
    }
}

fn into_io_error(err: Box<dyn std::error::Error + Send + Sync>) -> io::Error {
    match err.downcast::<io::Error>() {
        Ok(err) => *err,
        Err(err) => io::Error::other(err),
    }
}

#[cfg(test)]
mod tests {
    use std::future::poll_fn;
    use std::io;
    use std::pin::Pin;

    use bytes::Bytes;
    use futures::stream;

    use super::{ReaderUpstream, StreamUpstream};
    use crate::Upstream;

    async fn read_chunk<U: Upstream + Unpin>(upstream: &mut U, max: usize) -> io::Result<Bytes> {
        poll_fn(|cx| Pin::new(&mut *upstream).poll_read_chunk(cx, max)).await
    }

    async fn chunk_lens<U: Upstream + Unpin>(upstream: &mut U, max: usize) -> Vec<usize> {
        let mut lens = Vec::new();
        loop {
            let chunk = read_chunk(upstream, max).await.unwrap();
            if chunk.is_empty() {
                return lens;
            }
            lens.push(chunk.len());
        }
    }

    #[tokio::test]
    async fn test_reader_respects_max() {
        let data = [7u8; 10];
        let mut upstream = ReaderUpstream::new(&data[..]);
        assert_eq!(vec![4, 4, 2], chunk_lens(&mut upstream, 4).await);
    }

    #[tokio::test]
    async fn test_reader_keeps_content() {
        let data = b"Hello world this is a file to test range requests on!\n";
        let mut upstream = ReaderUpstream::new(&data[..]);
        let mut out = Vec::new();
        loop {
            let chunk = read_chunk(&mut upstream, 16).await.unwrap();
            if chunk.is_empty() {
                break;
            }
            out.extend_from_slice(&chunk);
        }
        assert_eq!(&data[..], &out[..]);
    }

    #[tokio::test]
    async fn test_reader_empty() {
        let mut upstream = ReaderUpstream::new(&b""[..]);
        assert!(read_chunk(&mut upstream, 8).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stream_splits_and_skips_empty() {
        let items: Vec<io::Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"abcdefg")),
            Ok(Bytes::new()),
            Ok(Bytes::from_static(b"hi")),
        ];
        let mut upstream = StreamUpstream::new(stream::iter(items));
        assert_eq!(vec![3, 3, 1, 2], chunk_lens(&mut upstream, 3).await);
        // stays exhausted
        assert!(read_chunk(&mut upstream, 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stream_error_keeps_io_kind() {
        let items: Vec<io::Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"ab")),
            Err(io::Error::new(io::ErrorKind::TimedOut, "backend stalled")),
        ];
        let mut upstream = StreamUpstream::new(stream::iter(items));
        assert_eq!(&b"ab"[..], &read_chunk(&mut upstream, 8).await.unwrap()[..]);
        let err = read_chunk(&mut upstream, 8).await.unwrap_err();
        assert_eq!(io::ErrorKind::TimedOut, err.kind());
    }

    #[tokio::test]
    async fn test_stream_foreign_error_is_other() {
        let items: Vec<Result<Bytes, std::fmt::Error>> = vec![Err(std::fmt::Error)];
        let mut upstream = StreamUpstream::new(stream::iter(items));
        let err = read_chunk(&mut upstream, 8).await.unwrap_err();
        assert_eq!(io::ErrorKind::Other, err.kind());
    }
}
