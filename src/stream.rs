use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::Stream;
use http_body::{Body, Frame, SizeHint};
use tokio::sync::mpsc;
use tokio_util::sync::PollSender;

use crate::downstream::enqueue;
use crate::{Downstream, DownstreamError};

type Item = io::Result<Bytes>;

/// Creates a connected [`ChannelSink`] and [`RelayBody`]. The sink accepts
/// up to `high_water_mark` chunks the body has not yet handed to the
/// connection before draining suspends.
pub fn body_channel(high_water_mark: usize) -> (ChannelSink, RelayBody) {
    let (sender, receiver) = mpsc::channel(high_water_mark.max(1));
    let sink = ChannelSink { pending: Bytes::new(), sender: PollSender::new(sender) };
    let body = RelayBody { receiver, length: None };
    (sink, body)
}

/// [`Downstream`] half of [`body_channel`]. Dropping the [`RelayBody`],
/// which the HTTP layer does when the client goes away, closes it.
pub struct ChannelSink {
    pending: Bytes,
    sender: PollSender<Item>,
}

impl ChannelSink {
    /// True once the [`RelayBody`] has been dropped or the sink aborted.
    pub fn is_closed(&self) -> bool {
        self.sender.get_ref().map_or(true, |sender| sender.is_closed())
    }

    /// Ends the body with `error` rather than a clean end of stream, so the
    /// connection is torn down instead of looking like a complete response.
    pub async fn abort(mut self, error: io::Error) {
        self.sender.abort_send();
        if let Some(sender) = self.sender.get_ref().cloned() {
            // nobody to tell if the body is already gone
            let _ = sender.send(Err(error)).await;
        }
    }
}

impl Downstream for ChannelSink {
    fn start_write(self: Pin<&mut Self>, chunk: Bytes) -> Result<(), DownstreamError> {
        let this = self.get_mut();
        if this.is_closed() {
            return Err(DownstreamError::PeerClosed);
        }
        enqueue(&mut this.pending, chunk);
        Ok(())
    }

    fn poll_drain(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), DownstreamError>> {
        let this = self.get_mut();
        if this.pending.is_empty() {
            return Poll::Ready(Ok(()));
        }

        if ready!(this.sender.poll_reserve(cx)).is_err() {
            return Poll::Ready(Err(DownstreamError::PeerClosed));
        }
        let chunk = std::mem::take(&mut this.pending);
        match this.sender.send_item(Ok(chunk)) {
            Ok(()) => Poll::Ready(Ok(())),
            Err(_) => Poll::Ready(Err(DownstreamError::PeerClosed)),
        }
    }
}

/// Response body fed by a [`ChannelSink`]. Implements [`Stream`], [`Body`],
/// and [`IntoResponse`].
#[derive(Debug)]
pub struct RelayBody {
    receiver: mpsc::Receiver<Item>,
    length: Option<u64>,
}

impl RelayBody {
    /// Advertises an exact length through [`Body::size_hint`].
    pub fn with_length(mut self, length: u64) -> Self {
        self.length = Some(length);
        self
    }
}

impl IntoResponse for RelayBody {
    fn into_response(self) -> Response {
        Response::new(axum::body::Body::new(self))
    }
}

impl Body for RelayBody {
    type Data = Bytes;
    type Error = io::Error;

    fn size_hint(&self) -> SizeHint {
        match self.length {
            Some(length) => SizeHint::with_exact(length),
            None => SizeHint::default(),
        }
    }

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>)
        -> Poll<Option<io::Result<Frame<Bytes>>>>
    {
        self.poll_next(cx).map(|item| item.map(|result| result.map(Frame::data)))
    }
}

impl Stream for RelayBody {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<io::Result<Bytes>>> {
        self.get_mut().receiver.poll_recv(cx)
    }
}
