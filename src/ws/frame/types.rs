use std::time::Duration;

use serde::Deserialize;

/// Session parameters the server announces in its open frame.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakeParameters {
    /// server assigned session id
    pub sid: String,
    /// how often the client should prove it is alive
    #[serde(with = "millis")]
    pub ping_interval: Duration,
    /// how long the server waits for a heartbeat before dropping the session
    #[serde(with = "millis")]
    pub ping_timeout: Duration,
    /// transports the session may be upgraded to
    #[serde(default)]
    pub upgrades: Vec<String>,
}

impl HandshakeParameters {
    pub(crate) fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "sid": self.sid,
            "upgrades": self.upgrades,
            "pingInterval": self.ping_interval.as_millis() as u64,
            "pingTimeout": self.ping_timeout.as_millis() as u64,
        })
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
