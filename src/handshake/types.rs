//! Endpoint address types

use std::{fmt::Display, str::FromStr};

use snafu::prelude::*;

use crate::Config;

/// Parse string as endpoint url error
#[derive(Debug, Snafu)]
#[snafu(
    visibility(pub(crate)),
    module(parse_endpoint_error_variant),
    context(suffix(false))
)]
pub enum ParseEndpointError {
    #[snafu(display("{s} is an invalid url: {source}"))]
    /// the str is not a valid url
    InvalidURL {
        /// string be parsed
        s: String,
        /// source error
        source: url::ParseError,
    },

    /// the parsed url scheme is not http(s) or ws(s)
    #[snafu(display("the url {s} has invalid scheme {scheme}, only http, https, ws or wss is ok"))]
    InvalidScheme {
        /// the url
        s: String,
        /// invalid scheme
        scheme: String,
    },

    /// the parsed url has no host
    #[snafu(display("the endpoint url {s} has no host"))]
    NoHost {
        /// the url
        s: String,
    },
}

/// Parsed server endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointURI {
    /// url scheme
    pub scheme: String,
    /// server host(domain)
    pub host: String,
    /// server port
    pub port: u16,
    /// namespace path, empty for the default namespace
    pub path: String,
}

impl EndpointURI {
    /// Whether the scheme asks for a tls channel
    pub fn is_secure(&self) -> bool {
        self.scheme == "https" || self.scheme == "wss"
    }

    /// Namespace packets of this endpoint are addressed to
    pub fn namespace(&self) -> &str {
        &self.path
    }

    /// Whether this endpoint uses the default namespace
    pub fn is_default_namespace(&self) -> bool {
        self.path.is_empty()
    }

    fn engine_url(
        &self,
        scheme: &str,
        transport: &str,
        config: &Config,
    ) -> Result<url::Url, url::ParseError> {
        let mut u = url::Url::parse(&format!(
            "{}://{}:{}{}",
            scheme, self.host, self.port, config.engine_path
        ))?;

        u.query_pairs_mut()
            .append_pair("EIO", &config.protocol_version.to_string())
            .append_pair("transport", transport);

        Ok(u)
    }

    /// url of the initial http handshake request
    pub fn handshake_url(&self, config: &Config) -> Result<url::Url, url::ParseError> {
        let scheme = if self.is_secure() { "https" } else { "http" };
        self.engine_url(scheme, "polling", config)
    }

    /// url of the websocket transport
    pub fn websocket_url(&self, config: &Config) -> Result<url::Url, url::ParseError> {
        let scheme = if self.is_secure() { "wss" } else { "ws" };
        self.engine_url(scheme, "websocket", config)
    }
}

impl FromStr for EndpointURI {
    type Err = ParseEndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let url = url::Url::parse(s)
            .with_context(|_| parse_endpoint_error_variant::InvalidURL { s: s.to_string() })?;

        ensure!(
            matches!(url.scheme(), "http" | "https" | "ws" | "wss"),
            parse_endpoint_error_variant::InvalidScheme {
                s,
                scheme: url.scheme(),
            }
        );

        let host = url
            .host_str()
            .with_context(|| parse_endpoint_error_variant::NoHost { s })?;

        let secure = matches!(url.scheme(), "https" | "wss");
        let port = url
            .port_or_known_default()
            .unwrap_or(if secure { 443 } else { 80 });

        Ok(EndpointURI {
            scheme: url.scheme().to_string(),
            host: host.to_string(),
            port,
            path: url.path().trim_end_matches('/').to_string(),
        })
    }
}

impl Display for EndpointURI {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}://{}:{}{}", self.scheme, self.host, self.port, self.path)
    }
}
