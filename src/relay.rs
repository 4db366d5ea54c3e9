use std::future::poll_fn;
use std::io;
use std::pin::pin;

use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::stream::body_channel;
use crate::{Downstream, DownstreamError, RelayBody, RelayConfig, RelayError, Upstream};

/// How a relay ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Upstream reached end of stream and everything was handed downstream.
    Exhausted,
    /// The downstream peer went away first. A normal outcome.
    PeerDisconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayOutcome {
    /// Bytes accepted by the downstream, exact.
    pub bytes_transferred: u64,
    pub terminated_by: Termination,
}

impl RelayOutcome {
    pub fn is_complete(&self) -> bool {
        self.terminated_by == Termination::Exhausted
    }
}

/// Copies `upstream` into `downstream` in chunks of at most
/// `config.chunk_size` bytes.
///
/// Each chunk is written and then drained before the next read is issued,
/// so at most one chunk is in flight. A downstream reporting
/// [`DownstreamError::PeerClosed`] ends the relay with
/// [`Termination::PeerDisconnected`]; it is not an error. Upstream failures
/// and other downstream failures are returned as [`RelayError`] without
/// retrying.
pub async fn relay<U, D>(
    upstream: U,
    downstream: D,
    config: RelayConfig,
) -> Result<RelayOutcome, RelayError>
where
    U: Upstream,
    D: Downstream,
{
    let mut upstream = pin!(upstream);
    let mut downstream = pin!(downstream);
    let chunk_size = config.chunk_size.get();
    let mut bytes_transferred: u64 = 0;

    let terminated_by = loop {
        let chunk = poll_fn(|cx| upstream.as_mut().poll_read_chunk(cx, chunk_size))
            .await
            .map_err(RelayError::Upstream)?;
        if chunk.is_empty() {
            break Termination::Exhausted;
        }
        debug_assert!(chunk.len() <= chunk_size, "upstream returned an oversized chunk");

        let len = chunk.len() as u64;
        if let Err(err) = downstream.as_mut().start_write(chunk) {
            break disconnected(err)?;
        }
        bytes_transferred += len;
        trace!(len, bytes_transferred, "chunk written");

        if let Err(err) = poll_fn(|cx| downstream.as_mut().poll_drain(cx)).await {
            break disconnected(err)?;
        }
    };

    debug!(bytes_transferred, ?terminated_by, "relay finished");
    Ok(RelayOutcome { bytes_transferred, terminated_by })
}

fn disconnected(err: DownstreamError) -> Result<Termination, RelayError> {
    match err {
        DownstreamError::PeerClosed => Ok(Termination::PeerDisconnected),
        DownstreamError::Io(e) => Err(RelayError::Downstream(e)),
    }
}

/// Runs [`relay`] on a new tokio task, feeding the returned [`RelayBody`].
///
/// If the relay fails the body ends with an error, so the HTTP layer
/// aborts the response instead of finishing it cleanly.
pub fn spawn_relay<U>(
    upstream: U,
    config: RelayConfig,
) -> (RelayBody, JoinHandle<Result<RelayOutcome, RelayError>>)
where
    U: Upstream + Send + 'static,
{
    let (mut sink, body) = body_channel(config.high_water_mark.get());

    let handle = tokio::spawn(async move {
        let result = relay(upstream, &mut sink, config).await;
        if let Err(err) = &result {
            warn!(error = %err, "relay failed, aborting response body");
            sink.abort(body_error(err)).await;
        }
        result
    });

    (body, handle)
}

fn body_error(err: &RelayError) -> io::Error {
    let (RelayError::Upstream(source) | RelayError::Downstream(source)) = err;
    io::Error::new(source.kind(), format!("{err}: {source}"))
}
