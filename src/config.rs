//! Client configuration.

use std::{borrow::Cow, time::Duration};

/// Default Engine.IO request path on the server.
pub const DEFAULT_ENGINE_PATH: &str = "/socket.io/";

/// Default Engine.IO protocol revision sent as the `EIO` query parameter.
pub const DEFAULT_PROTOCOL_VERSION: u8 = 3;

/// Ping interval used until the server's open frame says otherwise.
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(25);

/// Acknowledgement wait bound used when the open frame has not arrived yet.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(20);

/// Timeout of the http handshake request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default log target for a connection's diagnostics.
pub const DEFAULT_LOG_TARGET: &str = "sioclient";

/// Tunables for one client connection.
#[derive(Debug, Clone)]
pub struct Config {
    /// server side request path of the Engine.IO endpoint
    pub engine_path: String,
    /// Engine.IO protocol revision
    pub protocol_version: u8,
    /// heartbeat interval before handshake parameters are known
    pub ping_interval: Duration,
    /// how long `connect` waits for the server acknowledgement when the
    /// handshake has not told us the ping timeout yet
    pub ack_timeout: Duration,
    /// timeout of the http handshake request
    pub request_timeout: Duration,
    /// `log` target all connection diagnostics are written under
    pub log_target: Cow<'static, str>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine_path: DEFAULT_ENGINE_PATH.to_string(),
            protocol_version: DEFAULT_PROTOCOL_VERSION,
            ping_interval: DEFAULT_PING_INTERVAL,
            ack_timeout: DEFAULT_ACK_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            log_target: Cow::Borrowed(DEFAULT_LOG_TARGET),
        }
    }
}

impl Config {
    /// Set the Engine.IO request path, a missing leading or trailing `/` is added.
    pub fn with_engine_path<S: AsRef<str> + ?Sized>(mut self, path: &S) -> Self {
        let path = path.as_ref().trim_matches('/');
        self.engine_path = if path.is_empty() {
            "/".to_string()
        } else {
            format!("/{}/", path)
        };
        self
    }

    /// Set the Engine.IO protocol revision.
    pub fn with_protocol_version(mut self, version: u8) -> Self {
        self.protocol_version = version;
        self
    }

    /// Set the pre-handshake heartbeat interval.
    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    /// Set the pre-handshake acknowledgement timeout.
    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }

    /// Set the http handshake request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the log target.
    pub fn with_log_target<S: Into<Cow<'static, str>>>(mut self, target: S) -> Self {
        self.log_target = target.into();
        self
    }

    pub(crate) fn target(&self) -> &str {
        &self.log_target
    }
}
