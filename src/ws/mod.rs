//! Engine.IO over websocket: frame codec and connection engine

mod connection;
pub mod frame;

pub use connection::{ConnectError, Connection, ConnectionState};
pub use frame::{
    CodecError, EventPacket, Frame, FrameStreamSink, HandshakeParameters, Packet, PacketBody,
    TransportError,
};
