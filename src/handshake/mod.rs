//! Engine.IO handshake: http request, then websocket transport

mod error;
mod negotiator;
pub mod types;

pub use error::HandshakeError;
pub use negotiator::{negotiate, Negotiated};
pub use types::{EndpointURI, ParseEndpointError};

use tokio_tungstenite as websocket;

/// Result type for handshake module
pub type Result<T> = std::result::Result<T, HandshakeError>;

/// Websocket connection returned by the handshake
pub type WebsocketClient =
    websocket::WebSocketStream<websocket::MaybeTlsStream<tokio::net::TcpStream>>;
