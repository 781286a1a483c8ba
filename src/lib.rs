//! # sioclient
//!
//! A Socket.IO client speaking Engine.IO over websocket.
//!
//! ```no_run
//! use serde_json::{json, Value};
//! use sioclient::Client;
//!
//! # async fn run() -> sioclient::Result<()> {
//! let client = Client::new("http://127.0.0.1:8080/chat")?;
//!
//! client.on("news", |event: &str, args: &[Value]| {
//!     println!("{}: {:?}", event, args);
//! });
//!
//! client.connect().await?;
//! client.emit("hello", vec![json!("world")]).await;
//! client.disconnect().await;
//! # Ok(())
//! # }
//! ```

#![deny(warnings)]
#![deny(clippy::all)]
#![deny(missing_debug_implementations, missing_docs)]
#![forbid(unsafe_code)]

pub mod config;
pub mod handshake;
pub mod ws;

mod dispatcher;
mod error;

pub use config::Config;
pub use dispatcher::{EventDispatcher, Listener};
pub use error::{Error, Result};
pub use ws::{ConnectError, ConnectionState, HandshakeParameters};

use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use snafu::prelude::*;

use handshake::EndpointURI;
use ws::Connection;

/// Client of one server endpoint.
///
/// Listeners registered with [`on`](Self::on) survive reconnects: each
/// [`connect`](Self::connect) after a disconnect runs a fresh [`Connection`]
/// sharing the same dispatcher.
#[derive(Debug)]
pub struct Client {
    uri: EndpointURI,
    config: Config,
    dispatcher: Arc<EventDispatcher>,
    connection: Mutex<Arc<Connection>>,
}

impl Client {
    /// Create a client for `url` with default config
    pub fn new<S: AsRef<str> + ?Sized>(url: &S) -> Result<Self> {
        Self::with_config(url, Config::default())
    }

    /// Create a client for `url`, the url path selects the namespace
    pub fn with_config<S: AsRef<str> + ?Sized>(url: &S, config: Config) -> Result<Self> {
        let url = url.as_ref();
        let uri: EndpointURI = url
            .parse()
            .with_context(|_| error::InvalidEndpoint { url })?;

        log::debug!(target: config.target(), "Create client for {}", uri);

        let dispatcher =
            Arc::new(EventDispatcher::new().with_log_target(config.log_target.clone()));
        let connection = Connection::new(uri.clone(), config.clone(), dispatcher.clone());

        Ok(Self {
            uri,
            config,
            dispatcher,
            connection: Mutex::new(Arc::new(connection)),
        })
    }

    fn current(&self) -> Arc<Connection> {
        self.connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Server endpoint
    pub fn uri(&self) -> &EndpointURI {
        &self.uri
    }

    /// Register `listener` for events named `event`
    pub fn on<S, L>(&self, event: S, listener: L)
    where
        S: Into<String>,
        L: Listener + 'static,
    {
        self.dispatcher.on(event, listener)
    }

    /// Connect to the server, a no-op when already connected.
    ///
    /// Fails with [`ConnectError::InvalidState`] when another connect is in progress.
    pub async fn connect(&self) -> Result<()> {
        let connection = {
            let mut current = self
                .connection
                .lock()
                .unwrap_or_else(PoisonError::into_inner);

            match current.state() {
                ConnectionState::Connected => {
                    log::debug!(target: self.config.target(), "Already connected");
                    return Ok(());
                }
                ConnectionState::Disconnected => {
                    log::debug!(target: self.config.target(), "Start a new connection");
                    *current = Arc::new(Connection::new(
                        self.uri.clone(),
                        self.config.clone(),
                        self.dispatcher.clone(),
                    ));
                }
                _ => {}
            }

            current.clone()
        };

        connection
            .connect()
            .await
            .with_context(|_| error::ConnectFailed {
                uri: self.uri.to_string(),
            })
    }

    /// Disconnect from the server, a no-op when not connected
    pub async fn disconnect(&self) {
        self.current().disconnect().await
    }

    /// Send `text` as a `"message"` event, returns whether it was sent
    pub async fn send(&self, text: &str) -> bool {
        self.current().send_raw(self.uri.namespace(), text).await
    }

    /// Emit an event with `args`, returns whether it was sent
    pub async fn emit(&self, event: &str, args: Vec<Value>) -> bool {
        self.current()
            .emit(self.uri.namespace(), event, args)
            .await
    }

    /// Whether the current connection is acknowledged by the server
    pub fn is_connected(&self) -> bool {
        self.current().is_connected()
    }

    /// State of the current connection
    pub fn state(&self) -> ConnectionState {
        self.current().state()
    }

    /// Handshake parameters of the current connection, once received
    pub fn handshake(&self) -> Option<HandshakeParameters> {
        self.current().handshake()
    }
}
