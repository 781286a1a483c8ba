//! Engine.IO transport frames.

pub mod packet;
mod stream;
mod types;

pub use packet::{EventPacket, Packet, PacketBody};
pub use stream::{FrameStreamSink, TransportError};
pub use types::HandshakeParameters;

use bytes::Bytes;
use enum_as_inner::EnumAsInner;
use snafu::prelude::*;

/// Error when decode data as a frame
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)), module(error), context(suffix(false)))]
pub enum CodecError {
    /// buffer ends before a required tag byte
    #[snafu(display("frame data is truncated"))]
    Truncated,

    /// data is not utf-8 text
    #[snafu(display("frame data {data:?} is not utf-8: {source}"))]
    NotUtf8 {
        /// data for decode
        data: Bytes,
        /// source error
        source: std::str::Utf8Error,
    },

    /// frame tag byte is unknown
    #[snafu(display("unknown frame type {:?}", char::from(*tag)))]
    UnknownFrameType {
        /// tag byte
        tag: u8,
    },

    /// packet tag byte is unknown
    #[snafu(display("unknown packet type {:?}", char::from(*tag)))]
    UnknownPacketType {
        /// tag byte
        tag: u8,
    },

    /// payload is not the expected json shape
    #[snafu(display("malformed {what} payload: {reason}"))]
    Malformed {
        /// which payload
        what: &'static str,
        /// why it was rejected
        reason: String,
    },
}

/// Engine.IO frame
#[derive(Debug, Clone, PartialEq, Eq, EnumAsInner)]
pub enum Frame {
    /// Open, server -> client, once per session
    Open(HandshakeParameters),
    /// Close, both directions
    Close,
    /// Ping with optional payload, both directions
    Ping(String),
    /// Pong echoing the ping payload, both directions
    Pong(String),
    /// Message carrying a socket packet, both directions
    Message(Packet),
    /// Upgrade, client -> server
    Upgrade,
    /// Noop, server -> client
    Noop,
}

impl Frame {
    /// Decode data to a frame
    pub fn decode(buff: &[u8]) -> Result<Self, CodecError> {
        let text = std::str::from_utf8(buff).with_context(|_| error::NotUtf8 {
            data: Bytes::copy_from_slice(buff),
        })?;

        let tag = *buff.first().context(error::Truncated)?;

        ensure!(
            Self::tag_to_type_name(tag).is_some(),
            error::UnknownFrameType { tag }
        );

        // tag is ascii, so slicing after it stays on a char boundary
        let payload = &text[1..];

        let frame = match tag {
            b'0' => Self::Open(Self::decode_open(payload)?),
            b'1' => Self::Close,
            b'2' => Self::Ping(payload.to_string()),
            b'3' => Self::Pong(payload.to_string()),
            b'4' => Self::Message(Packet::decode(payload)?),
            b'5' => Self::Upgrade,
            _ => Self::Noop,
        };

        Ok(frame)
    }

    fn decode_open(payload: &str) -> Result<HandshakeParameters, CodecError> {
        ensure!(
            payload.starts_with('{') && payload.ends_with('}'),
            error::Malformed {
                what: "open",
                reason: "payload is not bracketed by { and }",
            }
        );

        serde_json::from_str(payload).map_err(|e| {
            error::Malformed {
                what: "open",
                reason: e.to_string(),
            }
            .build()
        })
    }

    /// encode to frame text
    pub fn encode(&self) -> String {
        let mut out = String::new();
        out.push(char::from(self.tag()));

        match self {
            Self::Open(params) => out.push_str(&params.to_json().to_string()),
            Self::Ping(payload) | Self::Pong(payload) => out.push_str(payload),
            Self::Message(packet) => out.push_str(&packet.encode()),
            Self::Close | Self::Upgrade | Self::Noop => {}
        }

        out
    }

    fn tag_to_type_name(tag: u8) -> Option<&'static str> {
        match tag {
            b'0' => Some("Open"),
            b'1' => Some("Close"),
            b'2' => Some("Ping"),
            b'3' => Some("Pong"),
            b'4' => Some("Message"),
            b'5' => Some("Upgrade"),
            b'6' => Some("Noop"),
            _ => None,
        }
    }

    /// get wire tag
    pub fn tag(&self) -> u8 {
        match self {
            Self::Open(_) => b'0',
            Self::Close => b'1',
            Self::Ping(_) => b'2',
            Self::Pong(_) => b'3',
            Self::Message(_) => b'4',
            Self::Upgrade => b'5',
            Self::Noop => b'6',
        }
    }

    /// get type name
    pub fn type_name(&self) -> &'static str {
        Self::tag_to_type_name(self.tag()).unwrap_or("Unknown")
    }
}
