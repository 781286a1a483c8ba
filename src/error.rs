//! client error types

use snafu::prelude::*;

use crate::handshake::ParseEndpointError;
use crate::ws::ConnectError;

/// client result type
pub type Result<T> = std::result::Result<T, Error>;

/// client error type
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)), context(suffix(false)))]
pub enum Error {
    /// Server url can't be used as an endpoint
    #[snafu(display("invalid endpoint url {url}: {source}"))]
    InvalidEndpoint {
        /// received url
        url: String,
        /// source error
        source: ParseEndpointError,
    },

    /// Connect to server failed
    #[snafu(display("connect to {uri} failed: {source}"))]
    ConnectFailed {
        /// endpoint uri
        uri: String,
        /// source error
        source: ConnectError,
    },
}
