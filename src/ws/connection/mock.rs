use std::{
    pin::Pin,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    task::{Context, Poll},
};

use futures_util::{Sink, Stream};
use tokio::sync::mpsc;

use super::{FrameSink, FrameSource};
use crate::ws::frame::{Frame, TransportError};

type Item = Result<Frame, TransportError>;

struct MockStream {
    rx: mpsc::UnboundedReceiver<Item>,
}

impl Stream for MockStream {
    type Item = Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

#[derive(Default)]
struct Recorder {
    sent: Mutex<Vec<Frame>>,
    stalled: AtomicBool,
    closed: AtomicBool,
}

struct MockSink {
    recorder: Arc<Recorder>,
}

impl Sink<Frame> for MockSink {
    type Error = TransportError;

    fn poll_ready(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // a stalled peer never drains, nothing will wake us
        if self.recorder.stalled.load(Ordering::SeqCst) {
            Poll::Pending
        } else {
            Poll::Ready(Ok(()))
        }
    }

    fn start_send(self: Pin<&mut Self>, item: Frame) -> Result<(), Self::Error> {
        self.recorder.sent.lock().unwrap().push(item);
        Ok(())
    }

    fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.recorder.closed.store(true, Ordering::SeqCst);
        Poll::Ready(Ok(()))
    }
}

/// Server side of an in-memory transport.
pub(crate) struct Peer {
    tx: Option<mpsc::UnboundedSender<Item>>,
    recorder: Arc<Recorder>,
}

impl Peer {
    /// Deliver raw frame text to the client, decode errors included.
    pub fn push(&self, text: &str) {
        let item =
            Frame::decode(text.as_bytes()).map_err(|source| TransportError::DecodeFailed { source });
        if let Some(tx) = &self.tx {
            let _ = tx.send(item);
        }
    }

    /// End the client's frame stream.
    pub fn close(&mut self) {
        self.tx.take();
    }

    /// Stop accepting writes, pending sends never complete.
    pub fn stall(&self) {
        self.recorder.stalled.store(true, Ordering::SeqCst);
    }

    /// Whether the client closed its sink.
    pub fn is_closed(&self) -> bool {
        self.recorder.closed.load(Ordering::SeqCst)
    }

    /// Encoded frames the client wrote, in order.
    pub fn sent(&self) -> Vec<String> {
        self.recorder
            .sent
            .lock()
            .unwrap()
            .iter()
            .map(Frame::encode)
            .collect()
    }
}

pub(crate) fn transport() -> (FrameSink, FrameSource, Peer) {
    let (tx, rx) = mpsc::unbounded_channel();
    let recorder = Arc::new(Recorder::default());

    let sink = MockSink {
        recorder: recorder.clone(),
    };
    let stream = MockStream { rx };

    (
        Box::new(sink),
        Box::new(stream),
        Peer {
            tx: Some(tx),
            recorder,
        },
    )
}
