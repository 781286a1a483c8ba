use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::watch;

use super::{shutdown_requested, ConnectionState, FrameSource, Origin, SendCondition, Shared};
use crate::ws::frame::{Frame, Packet, PacketBody};

const SHUTDOWN: &str = "shutdown requested";

enum Flow {
    Continue,
    Stop(String),
}

/// Read frames until the transport ends, the server closes or shutdown is requested.
pub(super) async fn run(shared: Arc<Shared>, mut stream: FrameSource) {
    log::debug!(target: shared.target(), "Receive loop start");

    let mut shutdown = shared.shutdown.subscribe();

    let reason = loop {
        tokio::select! {
            biased;

            _ = shutdown_requested(&mut shutdown) => {
                break SHUTDOWN.to_string();
            }

            item = stream.next() => match item {
                None => {
                    log::debug!(target: shared.target(), "Transport closed by peer");
                    break "transport closed by peer".to_string();
                }
                Some(Err(err)) if err.is_fatal() => {
                    log::warn!(target: shared.target(), "Transport broken: {}", err);
                    break format!("transport broken: {}", err);
                }
                Some(Err(err)) => {
                    log::warn!(target: shared.target(), "Frame dropped: {}", err);
                }
                Some(Ok(frame)) => {
                    if let Flow::Stop(reason) = handle_frame(&shared, &mut shutdown, frame).await {
                        break reason;
                    }
                }
            }
        }
    };

    log::debug!(target: shared.target(), "Receive loop stop: {}", reason);

    shared.record_close_reason(reason);
    shared.teardown(Origin::Receiver).await;
}

async fn handle_frame(
    shared: &Shared,
    shutdown: &mut watch::Receiver<bool>,
    frame: Frame,
) -> Flow {
    log::trace!(target: shared.target(), "<--RECV: {}", frame.encode());

    match frame {
        Frame::Open(params) => {
            log::debug!(
                target: shared.target(),
                "Session {} opened, ping interval {:?}, ping timeout {:?}",
                params.sid,
                params.ping_interval,
                params.ping_timeout
            );
            if !shared.set_handshake(params) {
                log::warn!(target: shared.target(), "Duplicated open frame ignored");
            }
        }
        Frame::Close => return Flow::Stop("server closed the session".to_string()),
        Frame::Ping(payload) => {
            let pong = Frame::Pong(payload);
            if shared
                .send_unless_shutdown(shutdown, pong, SendCondition::Open)
                .await
                .is_none()
            {
                return Flow::Stop(SHUTDOWN.to_string());
            }
        }
        Frame::Pong(payload) => {
            if payload.contains("probe") {
                log::debug!(target: shared.target(), "Probe answered, send upgrade");
                if shared
                    .send_unless_shutdown(shutdown, Frame::Upgrade, SendCondition::Open)
                    .await
                    .is_none()
                {
                    return Flow::Stop(SHUTDOWN.to_string());
                }
            }
        }
        Frame::Message(packet) => return handle_packet(shared, packet),
        Frame::Upgrade | Frame::Noop => {}
    }

    Flow::Continue
}

fn handle_packet(shared: &Shared, packet: Packet) -> Flow {
    if packet.endpoint != shared.uri.namespace() {
        log::debug!(
            target: shared.target(),
            "Ignore {} packet for namespace {:?}",
            packet.body.type_name(),
            packet.endpoint
        );
        return Flow::Continue;
    }

    match packet.body {
        PacketBody::Connect => {
            if shared.state.advance(ConnectionState::Connected) {
                log::info!(
                    target: shared.target(),
                    "Server acknowledged session {}",
                    shared.session_id().unwrap_or_default()
                );
            } else {
                log::debug!(
                    target: shared.target(),
                    "Connect packet ignored, connection is {}",
                    shared.state.get()
                );
            }
        }
        PacketBody::Disconnect => {
            return Flow::Stop("server disconnected the socket".to_string());
        }
        PacketBody::Event(event) => {
            let fired = shared.dispatcher.fire(&event.name, &event.args);
            log::debug!(
                target: shared.target(),
                "Event {:?} with {} args, {} listeners",
                event.name,
                event.args.len(),
                fired
            );
        }
        other => {
            log::debug!(
                target: shared.target(),
                "Unsupported {} packet ignored",
                other.type_name()
            );
        }
    }

    Flow::Continue
}
