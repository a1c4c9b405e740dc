//! The body pipe between a handler task and the caller.
//!
//! A rendezvous channel: [`PipeWriter::send`] hands one chunk to the reader
//! and does not return until the reader has taken it. Nothing is buffered
//! inside the bridge, so a slow reader throttles the handler instead of
//! letting memory grow with the size of the page.
//!
//! ```text
//!  handler task                         caller
//!  ────────────                         ──────
//!  send(chunk) ──▶ mpsc(1) ──▶ poll_frame()
//!       ▲                          │
//!       └──── oneshot ack ◀────────┘
//! ```

use std::convert::Infallible;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use bytes::Bytes;
use http_body::{Body, Frame, SizeHint};
use tokio::sync::{mpsc, oneshot};

/// One chunk in flight plus the means to tell the writer it was taken.
struct Chunk {
    data: Bytes,
    taken: oneshot::Sender<()>,
}

/// Creates a connected writer/reader pair.
pub(crate) fn pipe() -> (PipeWriter, BodyStream) {
    let (tx, rx) = mpsc::channel(1);
    (PipeWriter { tx }, BodyStream { rx, hint: SizeHint::new() })
}

/// Write end. Dropping it closes the pipe.
pub(crate) struct PipeWriter {
    tx: mpsc::Sender<Chunk>,
}

impl PipeWriter {
    /// Hands `data` to the reader and waits until it has been taken.
    ///
    /// Fails with [`io::ErrorKind::BrokenPipe`] once the reader is gone.
    pub(crate) async fn send(&self, data: Bytes) -> io::Result<()> {
        let (taken, ack) = oneshot::channel();
        self.tx
            .send(Chunk { data, taken })
            .await
            .map_err(|_| broken_pipe())?;
        ack.await.map_err(|_| broken_pipe())
    }
}

fn broken_pipe() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "response body reader dropped")
}

/// Read end of a response body.
///
/// Yields data frames in write order and ends once the handler is done.
/// Drain it with [`http_body_util::BodyExt`] (`collect`, `frame`) or poll it
/// directly.
#[derive(Debug)]
pub struct BodyStream {
    rx: mpsc::Receiver<Chunk>,
    hint: SizeHint,
}

impl BodyStream {
    /// Marks the body as known-empty: the head was finalized by completion.
    pub(crate) fn mark_empty(&mut self) {
        self.hint = SizeHint::with_exact(0);
    }
}

impl Body for BodyStream {
    type Data = Bytes;
    type Error = Infallible;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, Infallible>>> {
        match ready!(self.rx.poll_recv(cx)) {
            Some(Chunk { data, taken }) => {
                // The writer may have been dropped meanwhile; nothing to tell.
                let _ = taken.send(());
                Poll::Ready(Some(Ok(Frame::data(data))))
            }
            None => Poll::Ready(None),
        }
    }

    fn is_end_stream(&self) -> bool {
        self.hint.exact() == Some(0)
    }

    fn size_hint(&self) -> SizeHint {
        self.hint.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use http_body_util::BodyExt;

    use super::*;

    #[tokio::test]
    async fn send_waits_for_the_reader() {
        let (writer, mut body) = pipe();
        let done = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&done);
        let task = tokio::spawn(async move {
            writer.send(Bytes::from_static(b"chunk")).await.unwrap();
            flag.store(true, Ordering::SeqCst);
        });

        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
        assert!(!done.load(Ordering::SeqCst), "send returned before any read");

        let frame = body.frame().await.unwrap().unwrap();
        assert_eq!(frame.into_data().unwrap(), Bytes::from_static(b"chunk"));
        task.await.unwrap();
        assert!(done.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn chunks_arrive_in_order_and_end_on_close() {
        let (writer, body) = pipe();
        tokio::spawn(async move {
            for i in 0..100u8 {
                writer.send(Bytes::from(vec![i])).await.unwrap();
            }
        });

        let all = body.collect().await.unwrap().to_bytes();
        assert_eq!(all.to_vec(), (0..100u8).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn dropped_reader_breaks_the_pipe() {
        let (writer, body) = pipe();
        drop(body);
        let err = writer.send(Bytes::from_static(b"x")).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[tokio::test]
    async fn empty_hint_ends_the_stream() {
        let (writer, mut body) = pipe();
        assert!(!body.is_end_stream());
        body.mark_empty();
        drop(writer);
        assert!(body.is_end_stream());
        assert_eq!(body.size_hint().exact(), Some(0));
        assert!(body.frame().await.is_none());
    }
}
