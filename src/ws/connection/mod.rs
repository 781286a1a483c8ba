//! Engine.IO connection: state machine, receive loop and heartbeat.

mod heartbeat;
#[cfg(test)]
mod mock;
mod receiver;
mod state;

pub use state::ConnectionState;

use std::{fmt::Debug, sync::Arc, time::Duration};

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use serde_json::Value;
use snafu::prelude::*;
use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
};

use super::frame::{Frame, FrameStreamSink, HandshakeParameters, Packet, TransportError};
use crate::{
    dispatcher::EventDispatcher,
    handshake::{self, EndpointURI, HandshakeError},
    Config,
};
use state::StateCell;

pub(crate) type FrameSink = Box<dyn Sink<Frame, Error = TransportError> + Send + Unpin>;
pub(crate) type FrameSource =
    Box<dyn Stream<Item = Result<Frame, TransportError>> + Send + Unpin>;

/// Error when connect to a server
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)), module(error), context(suffix(false)))]
pub enum ConnectError {
    /// connection already went through a connect attempt
    #[snafu(display("connection is {state}, only an idle connection can connect"))]
    InvalidState {
        /// state when connect was called
        state: ConnectionState,
    },

    /// http handshake or websocket open failed
    #[snafu(display("handshake failed: {source}"))]
    Handshake {
        /// source error
        source: HandshakeError,
    },

    /// server acknowledgement did not arrive in time
    #[snafu(display("timeout after {after:?} when wait server acknowledgement"))]
    Timeout {
        /// how long we waited
        after: Duration,
    },

    /// transport failed before the server acknowledged the session
    #[snafu(display("transport failed before server acknowledgement: {reason}"))]
    Transport {
        /// why the transport stopped
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SendCondition {
    /// transport is live, session may not be acknowledged yet
    Open,
    /// session acknowledged
    Connected,
}

impl SendCondition {
    fn allows(self, state: ConnectionState) -> bool {
        match self {
            Self::Open => state.is_open(),
            Self::Connected => state == ConnectionState::Connected,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Origin {
    Caller,
    Receiver,
}

#[derive(Debug, Default)]
struct Tasks {
    heartbeat: Option<JoinHandle<()>>,
    receiver: Option<JoinHandle<()>>,
}

pub(crate) struct Shared {
    uri: EndpointURI,
    config: Config,
    state: StateCell,
    handshake: watch::Sender<Option<HandshakeParameters>>,
    close_reason: watch::Sender<Option<String>>,
    sink: Mutex<Option<FrameSink>>,
    tasks: Mutex<Tasks>,
    shutdown: watch::Sender<bool>,
    dispatcher: Arc<EventDispatcher>,
}

impl Debug for Shared {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shared")
            .field("uri", &self.uri)
            .field("state", &self.state.get())
            .field("handshake", &*self.handshake.borrow())
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

impl Shared {
    fn target(&self) -> &str {
        self.config.target()
    }

    fn handshake(&self) -> Option<HandshakeParameters> {
        self.handshake.borrow().clone()
    }

    fn session_id(&self) -> Option<String> {
        self.handshake.borrow().as_ref().map(|h| h.sid.clone())
    }

    /// Store handshake parameters, only the first open frame counts.
    fn set_handshake(&self, params: HandshakeParameters) -> bool {
        self.handshake.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(params);
                true
            } else {
                false
            }
        })
    }

    fn ping_interval(&self) -> Duration {
        self.handshake
            .borrow()
            .as_ref()
            .map(|h| h.ping_interval)
            .filter(|interval| !interval.is_zero())
            .unwrap_or(self.config.ping_interval)
    }

    fn ack_timeout(&self) -> Duration {
        self.handshake
            .borrow()
            .as_ref()
            .map(|h| h.ping_timeout)
            .filter(|timeout| !timeout.is_zero())
            .unwrap_or(self.config.ack_timeout)
    }

    fn close_reason(&self) -> Option<String> {
        self.close_reason.borrow().clone()
    }

    fn record_close_reason(&self, reason: String) {
        self.close_reason.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(reason);
                true
            } else {
                false
            }
        });
    }

    /// Write a frame if the current state allows it, returns whether it was sent.
    pub(crate) async fn send_when(&self, frame: Frame, condition: SendCondition) -> bool {
        // state is checked under the writer lock, so nothing slips out after teardown starts
        let mut sink = self.sink.lock().await;

        let state = self.state.get();
        if !condition.allows(state) {
            log::warn!(
                target: self.target(),
                "Can't send {} frame because connection is {}, dropped: {}",
                frame.type_name(),
                state,
                frame.encode()
            );
            return false;
        }

        let sink = match sink.as_mut() {
            Some(sink) => sink,
            None => {
                log::warn!(
                    target: self.target(),
                    "Can't send {} frame because transport is released",
                    frame.type_name()
                );
                return false;
            }
        };

        log::trace!(target: self.target(), "-->SEND: {}", frame.encode());

        match sink.send(frame).await {
            Ok(()) => true,
            Err(err) => {
                log::warn!(target: self.target(), "Send frame failed: {}", err);
                false
            }
        }
    }

    /// Like [`send_when`](Self::send_when), but gives up once shutdown is
    /// requested. `None` means shutdown won.
    pub(crate) async fn send_unless_shutdown(
        &self,
        shutdown: &mut watch::Receiver<bool>,
        frame: Frame,
        condition: SendCondition,
    ) -> Option<bool> {
        tokio::select! {
            biased;

            _ = shutdown_requested(shutdown) => None,

            sent = self.send_when(frame, condition) => Some(sent),
        }
    }

    /// Tear the connection down.
    ///
    /// Order: state to disconnecting, stop heartbeat, disconnect packet, close
    /// transport, join receive loop (callers only), release transport.
    pub(crate) async fn teardown(&self, origin: Origin) {
        if !self.state.advance(ConnectionState::Disconnecting) {
            if origin == Origin::Caller {
                log::debug!(
                    target: self.target(),
                    "Disconnect already {}, wait for it",
                    self.state.get()
                );
                self.state
                    .wait_for(|s| *s == ConnectionState::Disconnected)
                    .await;
            }
            return;
        }

        log::info!(target: self.target(), "Disconnecting from {}", self.uri);

        self.shutdown.send_replace(true);

        let heartbeat = self.tasks.lock().await.heartbeat.take();
        if let Some(handle) = heartbeat {
            log::trace!(target: self.target(), "Waiting heartbeat to stop");
            if let Err(err) = handle.await {
                log::warn!(target: self.target(), "Heartbeat task failed: {}", err);
            }
        }

        {
            let mut sink = self.sink.lock().await;
            if let Some(sink) = sink.as_mut() {
                let frame = Frame::Message(Packet::disconnect(self.uri.namespace()));
                log::trace!(target: self.target(), "-->SEND: {}", frame.encode());

                // a stalled transport must not hold teardown forever
                let bound = self.config.request_timeout;

                match tokio::time::timeout(bound, sink.send(frame)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => {
                        log::warn!(target: self.target(), "Send disconnect packet failed: {}", err)
                    }
                    Err(_) => {
                        log::warn!(target: self.target(), "Send disconnect packet timeout")
                    }
                }
                match tokio::time::timeout(bound, sink.close()).await {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => {
                        log::debug!(target: self.target(), "Close transport failed: {}", err)
                    }
                    Err(_) => log::debug!(target: self.target(), "Close transport timeout"),
                }
            }
        }

        let receiver = self.tasks.lock().await.receiver.take();
        if let Some(handle) = receiver {
            // the receive loop can't join itself, it ends right after this returns
            if origin == Origin::Caller {
                log::trace!(target: self.target(), "Waiting receive loop to stop");
                if let Err(err) = handle.await {
                    log::warn!(target: self.target(), "Receive task failed: {}", err);
                }
            }
        }

        self.sink.lock().await.take();
        self.state.advance(ConnectionState::Disconnected);

        log::info!(target: self.target(), "Disconnected from {}", self.uri);
    }
}

/// One Engine.IO session with a server.
///
/// A connection is single shot: once it reached
/// [`Disconnected`](ConnectionState::Disconnected) a new one is needed.
#[derive(Debug)]
pub struct Connection {
    shared: Arc<Shared>,
}

impl Connection {
    /// Create an idle connection to `uri`, decoded events go to `dispatcher`.
    pub fn new(uri: EndpointURI, config: Config, dispatcher: Arc<EventDispatcher>) -> Self {
        let (handshake, _) = watch::channel(None);
        let (close_reason, _) = watch::channel(None);
        let (shutdown, _) = watch::channel(false);

        Self {
            shared: Arc::new(Shared {
                uri,
                config,
                state: StateCell::new(),
                handshake,
                close_reason,
                sink: Mutex::new(None),
                tasks: Mutex::new(Tasks::default()),
                shutdown,
                dispatcher,
            }),
        }
    }

    /// Server endpoint
    pub fn uri(&self) -> &EndpointURI {
        &self.shared.uri
    }

    /// Current state snapshot
    pub fn state(&self) -> ConnectionState {
        self.shared.state.get()
    }

    /// Whether the session is acknowledged and usable
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Parameters from the server's open frame, once received
    pub fn handshake(&self) -> Option<HandshakeParameters> {
        self.shared.handshake()
    }

    /// Session id from the server's open frame, once received
    pub fn session_id(&self) -> Option<String> {
        self.shared.session_id()
    }

    /// Handshake, open the transport and wait until the server acknowledges the session.
    pub async fn connect(&self) -> Result<(), ConnectError> {
        let shared = &self.shared;

        ensure!(
            shared
                .state
                .advance_from(ConnectionState::Idle, ConnectionState::Handshaking),
            error::InvalidState {
                state: shared.state.get()
            }
        );

        log::debug!(target: shared.target(), "Handshaking with {}", shared.uri);

        let negotiated = match handshake::negotiate(&shared.uri, &shared.config)
            .await
            .context(error::Handshake)
        {
            Ok(negotiated) => negotiated,
            Err(err) => {
                log::warn!(target: shared.target(), "{}", err);
                shared.state.advance(ConnectionState::Disconnected);
                return Err(err);
            }
        };

        let (sink, stream) = FrameStreamSink::new(negotiated.websocket, &shared.config).split();

        self.establish(Box::new(sink), Box::new(stream)).await
    }

    /// Run the session over an already open transport.
    pub(crate) async fn establish(
        &self,
        sink: FrameSink,
        stream: FrameSource,
    ) -> Result<(), ConnectError> {
        let shared = &self.shared;

        if !shared.state.advance(ConnectionState::TransportOpen) {
            log::warn!(
                target: shared.target(),
                "Connection became {} during handshake, drop transport",
                shared.state.get()
            );
            return error::Transport {
                reason: "connection closed during handshake",
            }
            .fail();
        }

        {
            // checked under the writer lock, teardown either sees this sink or already ran
            let mut slot = shared.sink.lock().await;
            if !shared.state.get().is_open() {
                drop(slot);
                log::warn!(
                    target: shared.target(),
                    "Connection became {} while opening, close transport",
                    shared.state.get()
                );
                let mut sink = sink;
                if let Err(err) = sink.close().await {
                    log::debug!(target: shared.target(), "Close transport failed: {}", err);
                }
                return error::Transport {
                    reason: "connection closed during handshake",
                }
                .fail();
            }
            *slot = Some(sink);
        }

        {
            let mut tasks = shared.tasks.lock().await;
            tasks.receiver = Some(tokio::spawn(receiver::run(shared.clone(), stream)));
            tasks.heartbeat = Some(tokio::spawn(heartbeat::run(shared.clone())));
        }

        if !shared.uri.is_default_namespace() {
            log::debug!(
                target: shared.target(),
                "Connecting namespace {}",
                shared.uri.namespace()
            );
            shared
                .send_when(
                    Frame::Message(Packet::connect(shared.uri.namespace())),
                    SendCondition::Open,
                )
                .await;
        }

        shared.state.advance(ConnectionState::AwaitingServerAck);

        let wait = shared.ack_timeout();

        log::debug!(
            target: shared.target(),
            "Waiting server acknowledgement, timeout {:?}",
            wait
        );

        let reached = tokio::time::timeout(
            wait,
            shared
                .state
                .wait_for(|s| *s >= ConnectionState::Connected),
        )
        .await;

        match reached {
            Ok(ConnectionState::Connected) => {
                log::info!(target: shared.target(), "Connected to {}", shared.uri);
                Ok(())
            }
            Ok(state) => {
                log::warn!(
                    target: shared.target(),
                    "Connection became {} before server acknowledgement",
                    state
                );
                self.disconnect().await;
                let reason = shared
                    .close_reason()
                    .unwrap_or_else(|| format!("connection {}", state));
                error::Transport { reason }.fail()
            }
            Err(_) => {
                log::warn!(
                    target: shared.target(),
                    "Wait server acknowledgement timeout"
                );
                self.disconnect().await;
                error::Timeout { after: wait }.fail()
            }
        }
    }

    /// Close the session, calling it again is a no-op.
    pub async fn disconnect(&self) {
        self.shared.teardown(Origin::Caller).await
    }

    /// Send `text` as a `"message"` event to `endpoint`, returns whether it was sent.
    pub async fn send_raw(&self, endpoint: &str, text: &str) -> bool {
        self.emit(endpoint, "message", vec![Value::String(text.to_string())])
            .await
    }

    /// Emit event `event` with `args` to `endpoint`, returns whether it was sent.
    ///
    /// Dropped with a log entry when the connection is not connected.
    pub async fn emit(&self, endpoint: &str, event: &str, args: Vec<Value>) -> bool {
        log::debug!(target: self.shared.target(), "Emitting event {:?}", event);

        let frame = Frame::Message(Packet::event(endpoint, event, args));
        self.shared
            .send_when(frame, SendCondition::Connected)
            .await
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        // background tasks own the transport until they see this
        self.shared.shutdown.send_replace(true);
    }
}
