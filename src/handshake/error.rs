use snafu::prelude::*;
use tokio_tungstenite::tungstenite as websocket;

/// Handshake Error
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)), module(variant), context(suffix(false)))]
pub enum HandshakeError {
    /// endpoint scheme needs a secure channel the transport does not provide
    #[snafu(display("scheme {scheme} needs tls, which this transport does not support"))]
    UnsupportedScheme {
        /// endpoint scheme
        scheme: String,
    },

    /// endpoint can't be turned into a request url
    #[snafu(display("build {what} url failed: {source}"))]
    BuildURLFailed {
        /// which url
        what: &'static str,
        /// source error
        source: url::ParseError,
    },

    /// create HTTP client failed
    #[snafu(display("create handshake client failed: {source}"))]
    ClientCreateFailed {
        /// source error
        source: reqwest::Error,
    },

    /// send handshake request or read its body failed
    #[snafu(display("handshake request to {url} failed: {source}"))]
    Network {
        /// target url
        url: String,
        /// source http error
        source: reqwest::Error,
    },

    /// server answered the handshake with a non-success status
    #[snafu(display("handshake request to {url} got http status code {status}: {body}"))]
    Rejected {
        /// request url
        url: String,
        /// received http status code
        status: reqwest::StatusCode,
        /// response body
        body: String,
    },

    /// open websocket transport failed
    #[snafu(display("open websocket {url} failed: {source}"))]
    Upgrade {
        /// websocket url
        url: String,
        /// source error
        source: websocket::Error,
    },
}
