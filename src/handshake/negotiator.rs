use bytes::Bytes;
use snafu::prelude::*;
use tokio_tungstenite as websocket;

use super::error::variant::*;
use super::types::EndpointURI;
use super::{Result, WebsocketClient};
use crate::Config;

static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

/// A live websocket transport ready for the Engine.IO open sequence
#[derive(Debug)]
pub struct Negotiated {
    /// websocket connection, the server's open frame is its first message
    pub websocket: WebsocketClient,
    /// body of the http handshake response
    pub handshake_body: Bytes,
}

/// Run the http handshake against `uri`, then open the websocket transport.
pub async fn negotiate(uri: &EndpointURI, config: &Config) -> Result<Negotiated> {
    ensure!(
        !uri.is_secure(),
        UnsupportedScheme {
            scheme: &uri.scheme
        }
    );

    let client = reqwest::Client::builder()
        .gzip(true)
        .deflate(true)
        .user_agent(APP_USER_AGENT)
        .timeout(config.request_timeout)
        .build()
        .context(ClientCreateFailed)?;

    let url = uri
        .handshake_url(config)
        .context(BuildURLFailed { what: "handshake" })?;

    log::debug!(target: config.target(), "Send handshake request: {}", url);

    let resp = client
        .get(url.clone())
        .header(reqwest::header::ACCEPT, "*/*")
        .send()
        .await
        .with_context(|_| Network { url: url.as_str() })?;

    let status = resp.status();

    let body = resp
        .bytes()
        .await
        .with_context(|_| Network { url: url.as_str() })?;

    ensure!(
        status.is_success(),
        Rejected {
            url: url.as_str(),
            status,
            body: String::from_utf8_lossy(&body),
        }
    );

    log::debug!(target: config.target(), "Handshake response {}", status);
    log::trace!(
        target: config.target(),
        "Handshake response body: {}",
        String::from_utf8_lossy(&body)
    );

    let ws_url = uri
        .websocket_url(config)
        .context(BuildURLFailed { what: "websocket" })?;

    log::debug!(target: config.target(), "Opening websocket: {}", ws_url);

    let (ws, _) = websocket::connect_async(ws_url.as_str())
        .await
        .with_context(|_| Upgrade {
            url: ws_url.as_str(),
        })?;

    log::info!(target: config.target(), "Websocket transport open");

    Ok(Negotiated {
        websocket: ws,
        handshake_body: body,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::handshake::HandshakeError;

    #[tokio::test]
    async fn test_negotiate_secure_scheme_unsupported() {
        let uri: EndpointURI = "https://example.com".parse().unwrap();

        let result = negotiate(&uri, &Config::default()).await;

        assert!(matches!(
            result,
            Err(HandshakeError::UnsupportedScheme { scheme }) if scheme == "https"
        ));
    }

    #[tokio::test]
    async fn test_negotiate_connection_refused() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let uri: EndpointURI = format!("http://127.0.0.1:{}", port).parse().unwrap();

        let result = negotiate(&uri, &Config::default()).await;

        assert!(matches!(result, Err(HandshakeError::Network { .. })));
    }
}
