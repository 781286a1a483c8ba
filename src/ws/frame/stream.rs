use std::{borrow::Cow, task::Poll};

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use snafu::prelude::*;
use tokio_tungstenite::tungstenite as websocket;

use super::{CodecError, Frame};
use crate::{handshake::WebsocketClient, Config};

/// Error when read/write frame stream/sink
#[derive(Debug, Snafu)]
#[snafu(module(error), context(suffix(false)))]
pub enum TransportError {
    /// underlying websocket stream broken
    #[snafu(display("underlying websocket stream broken: {source}"))]
    Websocket {
        /// source error
        source: websocket::Error,
    },

    /// received a non-text frame
    #[snafu(display("received a non-text type frame"))]
    NotTextFrame,

    /// decode text message data failed
    #[snafu(display("decode text to frame failed: {source}"))]
    DecodeFailed {
        /// source error
        source: CodecError,
    },
}

impl TransportError {
    /// Check if this error will make the stream/sink stop
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Websocket { .. } => true,
            Self::NotTextFrame => false,
            Self::DecodeFailed { .. } => false,
        }
    }
}

/// Engine.IO frame stream/sink over a websocket connection
#[derive(Debug)]
pub struct FrameStreamSink {
    ws: WebsocketClient,
    target: Cow<'static, str>,
}

impl FrameStreamSink {
    /// Construct a new stream with underlying websocket connection, logging
    /// under `config`'s log target.
    pub fn new(ws: WebsocketClient, config: &Config) -> Self {
        Self {
            ws,
            target: config.log_target.clone(),
        }
    }
}

impl Stream for FrameStreamSink {
    type Item = Result<Frame, TransportError>;

    fn poll_next(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        loop {
            let message = match self.ws.poll_next_unpin(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Ready(Some(result)) => result.context(error::Websocket)?,
            };

            let result = match message {
                websocket::Message::Text(text) => {
                    let result = Frame::decode(text.as_bytes()).context(error::DecodeFailed);
                    if result.is_err() {
                        log::trace!(target: &*self.target, "Decode failed frame data: {}", text);
                    }
                    result
                }
                websocket::Message::Binary(_) => error::NotTextFrame.fail(),
                websocket::Message::Close(close) => {
                    log::debug!(target: &*self.target, "Websocket closed by peer: {:?}", close);
                    return Poll::Ready(None);
                }
                // control frames are answered by tungstenite itself
                _ => continue,
            };

            return Poll::Ready(Some(result));
        }
    }
}

impl Sink<Frame> for FrameStreamSink {
    type Error = TransportError;

    fn poll_ready(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Result<(), Self::Error>> {
        self.ws
            .poll_ready_unpin(cx)
            .map_err(|e| Self::Error::Websocket { source: e })
    }

    fn start_send(mut self: std::pin::Pin<&mut Self>, item: Frame) -> Result<(), Self::Error> {
        self.ws
            .start_send_unpin(websocket::Message::Text(item.encode()))
            .map_err(|e| Self::Error::Websocket { source: e })
    }

    fn poll_flush(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Result<(), Self::Error>> {
        self.ws
            .poll_flush_unpin(cx)
            .map_err(|e| Self::Error::Websocket { source: e })
    }

    fn poll_close(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<Result<(), Self::Error>> {
        self.ws
            .poll_close_unpin(cx)
            .map_err(|e| Self::Error::Websocket { source: e })
    }
}
