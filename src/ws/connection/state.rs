use std::fmt::Display;

use tokio::sync::watch;

/// Lifecycle of one connection, states only ever move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConnectionState {
    /// created, nothing done yet
    Idle,
    /// http handshake in progress
    Handshaking,
    /// websocket transport is live
    TransportOpen,
    /// waiting for the server's connect packet
    AwaitingServerAck,
    /// session established
    Connected,
    /// teardown in progress
    Disconnecting,
    /// terminal
    Disconnected,
}

impl ConnectionState {
    /// Whether the transport is live and not being torn down
    pub fn is_open(self) -> bool {
        matches!(
            self,
            Self::TransportOpen | Self::AwaitingServerAck | Self::Connected
        )
    }
}

impl Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Handshaking => "handshaking",
            Self::TransportOpen => "transport open",
            Self::AwaitingServerAck => "awaiting server ack",
            Self::Connected => "connected",
            Self::Disconnecting => "disconnecting",
            Self::Disconnected => "disconnected",
        };
        f.write_str(name)
    }
}

/// Shared, observable connection state.
#[derive(Debug)]
pub(crate) struct StateCell {
    tx: watch::Sender<ConnectionState>,
}

impl StateCell {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(ConnectionState::Idle);
        Self { tx }
    }

    pub fn get(&self) -> ConnectionState {
        *self.tx.borrow()
    }

    /// Move forward to `next`, false if already at or past it.
    pub fn advance(&self, next: ConnectionState) -> bool {
        self.tx.send_if_modified(|current| {
            if next > *current {
                *current = next;
                true
            } else {
                false
            }
        })
    }

    /// Move from exactly `expected` to `next`.
    pub fn advance_from(&self, expected: ConnectionState, next: ConnectionState) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == expected && next > expected {
                *current = next;
                true
            } else {
                false
            }
        })
    }

    /// Wait until `predicate` holds, returns the state that satisfied it.
    pub async fn wait_for<F>(&self, predicate: F) -> ConnectionState
    where
        F: FnMut(&ConnectionState) -> bool,
    {
        let mut rx = self.tx.subscribe();
        // sender lives in self, so the channel can't close while we wait
        let state = match rx.wait_for(predicate).await {
            Ok(state) => *state,
            Err(_) => self.get(),
        };
        state
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_advance_is_monotonic() {
        let state = StateCell::new();

        assert!(state.advance(ConnectionState::TransportOpen));
        assert!(!state.advance(ConnectionState::Handshaking));
        assert!(!state.advance(ConnectionState::TransportOpen));
        assert_eq!(state.get(), ConnectionState::TransportOpen);

        assert!(state.advance(ConnectionState::Connected));
        assert!(!state.advance(ConnectionState::AwaitingServerAck));
        assert_eq!(state.get(), ConnectionState::Connected);

        assert!(state.advance(ConnectionState::Disconnected));
        assert!(!state.advance(ConnectionState::Disconnecting));
    }

    #[test]
    fn test_advance_from() {
        let state = StateCell::new();

        assert!(!state.advance_from(ConnectionState::TransportOpen, ConnectionState::Connected));
        assert!(state.advance_from(ConnectionState::Idle, ConnectionState::Handshaking));
        assert!(!state.advance_from(ConnectionState::Idle, ConnectionState::Handshaking));
        assert_eq!(state.get(), ConnectionState::Handshaking);
    }

    #[tokio::test]
    async fn test_wait_for_wakes_on_advance() {
        let state = std::sync::Arc::new(StateCell::new());

        let waiter = {
            let state = state.clone();
            tokio::spawn(async move {
                state
                    .wait_for(|s| *s >= ConnectionState::Connected)
                    .await
            })
        };

        tokio::task::yield_now().await;
        state.advance(ConnectionState::Connected);

        assert_eq!(waiter.await.unwrap(), ConnectionState::Connected);
    }
}
