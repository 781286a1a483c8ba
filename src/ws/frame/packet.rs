//! Socket-level packets carried inside [`Frame::Message`](super::Frame::Message).

use enum_as_inner::EnumAsInner;
use serde_json::Value;
use snafu::prelude::*;

use super::{error, CodecError};

/// Payload of an event packet: `[name, arg0, arg1, ...]` on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventPacket {
    /// event name
    pub name: String,
    /// event arguments, in order
    pub args: Vec<Value>,
}

impl EventPacket {
    fn decode(payload: &str) -> Result<Self, CodecError> {
        ensure!(
            payload.starts_with('[') && payload.ends_with(']'),
            error::Malformed {
                what: "event",
                reason: "payload is not bracketed by [ and ]",
            }
        );

        let values: Vec<Value> = serde_json::from_str(payload).map_err(|e| {
            error::Malformed {
                what: "event",
                reason: e.to_string(),
            }
            .build()
        })?;

        let mut values = values.into_iter();

        let name = match values.next() {
            Some(Value::String(name)) => name,
            Some(other) => {
                return error::Malformed {
                    what: "event",
                    reason: format!("event name {} is not a string", other),
                }
                .fail()
            }
            None => {
                return error::Malformed {
                    what: "event",
                    reason: "array has no event name",
                }
                .fail()
            }
        };

        Ok(Self {
            name,
            args: values.collect(),
        })
    }

    fn encode(&self) -> String {
        let mut array = Vec::with_capacity(self.args.len() + 1);
        array.push(Value::String(self.name.clone()));
        array.extend(self.args.iter().cloned());
        Value::Array(array).to_string()
    }
}

/// Packet kinds and their kind specific data.
///
/// Kinds this client does not act on keep their raw payload text.
#[derive(Debug, Clone, PartialEq, Eq, EnumAsInner)]
pub enum PacketBody {
    /// namespace connected
    Connect,
    /// namespace disconnected
    Disconnect,
    /// named event with arguments
    Event(EventPacket),
    /// acknowledgement of an event
    Ack(String),
    /// namespace level error
    Error(String),
    /// event with binary attachments
    BinaryEvent(String),
    /// acknowledgement with binary attachments
    BinaryAck(String),
}

impl PacketBody {
    fn tag_to_type_name(tag: u8) -> Option<&'static str> {
        match tag {
            b'0' => Some("Connect"),
            b'1' => Some("Disconnect"),
            b'2' => Some("Event"),
            b'3' => Some("Ack"),
            b'4' => Some("Error"),
            b'5' => Some("BinaryEvent"),
            b'6' => Some("BinaryAck"),
            _ => None,
        }
    }

    /// get wire tag
    pub fn tag(&self) -> u8 {
        match self {
            Self::Connect => b'0',
            Self::Disconnect => b'1',
            Self::Event(_) => b'2',
            Self::Ack(_) => b'3',
            Self::Error(_) => b'4',
            Self::BinaryEvent(_) => b'5',
            Self::BinaryAck(_) => b'6',
        }
    }

    /// get type name
    pub fn type_name(&self) -> &'static str {
        Self::tag_to_type_name(self.tag()).unwrap_or("Unknown")
    }

    fn payload(&self) -> Option<String> {
        match self {
            Self::Connect | Self::Disconnect => None,
            Self::Event(event) => Some(event.encode()),
            Self::Ack(raw) | Self::Error(raw) | Self::BinaryEvent(raw) | Self::BinaryAck(raw) => {
                if raw.is_empty() {
                    None
                } else {
                    Some(raw.clone())
                }
            }
        }
    }
}

/// One socket-level message addressed to an endpoint (namespace).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// target namespace, empty for the default one
    pub endpoint: String,
    /// packet kind and data
    pub body: PacketBody,
}

fn normalize_endpoint(endpoint: &str) -> String {
    let endpoint = endpoint.trim_end_matches('/');
    if endpoint.is_empty() || endpoint.starts_with('/') {
        endpoint.to_string()
    } else {
        format!("/{}", endpoint)
    }
}

impl Packet {
    /// Create a packet, `""` and `"/"` both address the default namespace.
    pub fn new<S: AsRef<str> + ?Sized>(endpoint: &S, body: PacketBody) -> Self {
        Self {
            endpoint: normalize_endpoint(endpoint.as_ref()),
            body,
        }
    }

    /// Namespace connect request.
    pub fn connect<S: AsRef<str> + ?Sized>(endpoint: &S) -> Self {
        Self::new(endpoint, PacketBody::Connect)
    }

    /// Namespace disconnect notice.
    pub fn disconnect<S: AsRef<str> + ?Sized>(endpoint: &S) -> Self {
        Self::new(endpoint, PacketBody::Disconnect)
    }

    /// Event packet.
    pub fn event<S, N>(endpoint: &S, name: N, args: Vec<Value>) -> Self
    where
        S: AsRef<str> + ?Sized,
        N: Into<String>,
    {
        Self::new(
            endpoint,
            PacketBody::Event(EventPacket {
                name: name.into(),
                args,
            }),
        )
    }

    /// Decode packet text (packet tag and everything after it).
    pub fn decode(text: &str) -> Result<Self, CodecError> {
        let tag = *text.as_bytes().first().context(error::Truncated)?;

        ensure!(
            PacketBody::tag_to_type_name(tag).is_some(),
            error::UnknownPacketType { tag }
        );

        // tag is ascii, so slicing after it stays on a char boundary
        let (endpoint, payload) = split_endpoint(&text[1..]);

        let body = match tag {
            b'0' => PacketBody::Connect,
            b'1' => PacketBody::Disconnect,
            b'2' => PacketBody::Event(EventPacket::decode(payload)?),
            b'3' => PacketBody::Ack(payload.to_string()),
            b'4' => PacketBody::Error(payload.to_string()),
            b'5' => PacketBody::BinaryEvent(payload.to_string()),
            _ => PacketBody::BinaryAck(payload.to_string()),
        };

        Ok(Self {
            endpoint: normalize_endpoint(endpoint),
            body,
        })
    }

    /// Encode to packet text.
    pub fn encode(&self) -> String {
        let payload = self.body.payload();

        let mut out = String::new();
        out.push(char::from(self.body.tag()));

        if !self.endpoint.is_empty() && self.endpoint != "/" {
            out.push_str(&self.endpoint);
            if payload.is_some() {
                out.push(',');
            }
        }

        if let Some(payload) = payload {
            out.push_str(&payload);
        }

        out
    }
}

fn split_endpoint(rest: &str) -> (&str, &str) {
    if !rest.starts_with('/') {
        return ("", rest);
    }

    match rest.find(',') {
        Some(idx) => (&rest[..idx], &rest[idx + 1..]),
        None => (rest, ""),
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_packet_decode_connect() {
        let packet = Packet::decode("0").unwrap();
        assert_eq!(packet.endpoint, "");
        assert!(packet.body.is_connect());

        let packet = Packet::decode("0/chat").unwrap();
        assert_eq!(packet.endpoint, "/chat");
        assert!(packet.body.is_connect());
    }

    #[test]
    fn test_packet_decode_event() {
        let packet = Packet::decode(r#"2["chat","hello",{"from":"bob"},[1,[2,3]]]"#).unwrap();
        let event = packet.body.into_event().unwrap();
        assert_eq!(event.name, "chat");
        assert_eq!(
            event.args,
            vec![json!("hello"), json!({"from": "bob"}), json!([1, [2, 3]])]
        );
    }

    #[test]
    fn test_packet_decode_event_with_namespace() {
        let packet = Packet::decode(r#"2/chat,["join",1]"#).unwrap();
        assert_eq!(packet.endpoint, "/chat");
        assert_eq!(
            packet.body,
            PacketBody::Event(EventPacket {
                name: "join".to_string(),
                args: vec![json!(1)],
            })
        );
    }

    #[test]
    fn test_packet_decode_event_malformed() {
        assert!(matches!(
            Packet::decode(r#"2{"name":"chat"}"#),
            Err(CodecError::Malformed { .. })
        ));
        assert!(matches!(
            Packet::decode(r#"2["chat""#),
            Err(CodecError::Malformed { .. })
        ));
        assert!(matches!(
            Packet::decode("2[]"),
            Err(CodecError::Malformed { .. })
        ));
        assert!(matches!(
            Packet::decode("2[1,2]"),
            Err(CodecError::Malformed { .. })
        ));
        assert!(matches!(
            Packet::decode("2"),
            Err(CodecError::Malformed { .. })
        ));
    }

    #[test]
    fn test_packet_decode_unsupported_kinds() {
        assert_eq!(
            Packet::decode("3[1]").unwrap().body,
            PacketBody::Ack("[1]".to_string())
        );
        assert_eq!(
            Packet::decode(r#"4"not allowed""#).unwrap().body,
            PacketBody::Error(r#""not allowed""#.to_string())
        );
        assert!(matches!(
            Packet::decode("5").unwrap().body,
            PacketBody::BinaryEvent(_)
        ));
        assert!(Packet::decode("6")
            .unwrap()
            .body
            .as_binary_ack()
            .is_some());
    }

    #[test]
    fn test_packet_decode_unknown_tag() {
        assert!(matches!(
            Packet::decode("9"),
            Err(CodecError::UnknownPacketType { tag: b'9' })
        ));
        assert!(matches!(Packet::decode(""), Err(CodecError::Truncated)));
    }

    #[test]
    fn test_packet_encode() {
        assert_eq!(Packet::connect("").encode(), "0");
        assert_eq!(Packet::connect("/").encode(), "0");
        assert_eq!(Packet::connect("chat").encode(), "0/chat");
        assert_eq!(Packet::disconnect("/chat/").encode(), "1/chat");
        assert_eq!(
            Packet::event("", "notify", vec![]).encode(),
            r#"2["notify"]"#
        );
        assert_eq!(
            Packet::event("/chat", "say", vec![json!("hi"), json!({"n": 1})]).encode(),
            r#"2/chat,["say","hi",{"n":1}]"#
        );
    }

    #[test]
    fn test_event_packet_round_trip() {
        let packets = [
            Packet::event("", "empty", vec![]),
            Packet::event("", "scalars", vec![json!(1), json!("two"), json!(null), json!(true)]),
            Packet::event("/room", "nested", vec![json!([[1], [2, [3]]]), json!({"a": [1]})]),
        ];

        for packet in packets {
            assert_eq!(Packet::decode(&packet.encode()).unwrap(), packet);
        }
    }
}
