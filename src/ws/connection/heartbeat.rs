use std::sync::Arc;

use super::{shutdown_requested, SendCondition, Shared};
use crate::ws::frame::Frame;

/// Send a ping every interval until shutdown is requested.
///
/// The interval is re-read each round, so it follows the handshake once the
/// open frame arrives.
pub(super) async fn run(shared: Arc<Shared>) {
    log::debug!(target: shared.target(), "Heartbeat start");

    let mut shutdown = shared.shutdown.subscribe();

    loop {
        let interval = shared.ping_interval();

        tokio::select! {
            biased;

            _ = shutdown_requested(&mut shutdown) => break,

            _ = tokio::time::sleep(interval) => {
                log::trace!(target: shared.target(), "Heartbeat send ping");
                let ping = Frame::Ping(String::new());
                match shared.send_unless_shutdown(&mut shutdown, ping, SendCondition::Open).await {
                    None => break,
                    Some(false) => log::debug!(target: shared.target(), "Heartbeat ping not sent"),
                    Some(true) => {}
                }
            }
        }
    }

    log::debug!(target: shared.target(), "Heartbeat stop");
}
