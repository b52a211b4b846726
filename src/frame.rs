//! Packet framing: split one captured buffer into packets and decode each of them.
//!
//! A buffer may hold several packets, possibly separated by garbage. Scanning looks for
//! a magic byte; bytes skipped on the way are reported as one raw span. Nothing here
//! fails: truncated headers and signatures end the buffer with a raw range, short
//! payloads are zero-padded, unknown message ids degrade to a raw payload range.

use crate::descriptor::{
    COMPAT_FLAGS, COMPID, CRC, INCOMPAT_FLAGS, LENGTH, MAGIC, MSGID, PAYLOAD, RAW_HEADER, RAW_PAYLOAD,
    SEQUENCE, SIGNATURE_LINK, SIGNATURE_SIGNATURE, SIGNATURE_TIME, SYSID,
};
use crate::dissector::Dissector;
use crate::tree::{ByteRange, Columns, Node};
use crate::value::Value;
use byteorder::{ByteOrder, LittleEndian};

pub const CRC_LEN: usize = 2;
/// Link id (1) + time (6) + signature (6).
pub const SIGNATURE_LEN: usize = 13;
/// Signature timestamps count 10 us ticks from 2015-01-01T00:00:00Z.
pub const SIGNATURE_EPOCH_UNIX: u64 = 1_420_070_400;
pub const SIGNATURE_TICKS_PER_SEC: u64 = 100_000;
/// Incompatibility flag bit marking a signed packet.
pub const INCOMPAT_SIGNED: u8 = 0x01;

pub const PROTOCOL_NAME: &str = "MAVLink Protocol";

/// Header format selected by the magic byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    V2,
    V1,
    V09,
}

impl Version {
    pub fn from_magic(magic: u8) -> Option<Version> {
        match magic {
            0xFD => Some(Version::V2),
            0xFE => Some(Version::V1),
            0x55 => Some(Version::V09),
            _ => None,
        }
    }

    pub fn magic(&self) -> u8 {
        match self {
            Version::V2 => 0xFD,
            Version::V1 => 0xFE,
            Version::V09 => 0x55,
        }
    }

    pub fn header_len(&self) -> usize {
        match self {
            Version::V2 => 10,
            Version::V1 | Version::V09 => 6,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Version::V2 => "MAVLink 2.0",
            Version::V1 => "MAVLink 1.0",
            Version::V09 => "MAVLink 0.9",
        }
    }
}

/// Decoded packet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: Version,
    pub length: u8,
    /// Always 0 for the legacy formats.
    pub incompat_flags: u8,
    pub compat_flags: u8,
    pub sequence: u8,
    pub sysid: u8,
    pub compid: u8,
    pub msgid: u32,
}

impl Header {
    /// `bytes` holds at least `version.header_len()` bytes, magic included.
    pub fn parse(version: Version, bytes: &[u8]) -> Header {
        match version {
            Version::V2 => Header {
                version,
                length: bytes[1],
                incompat_flags: bytes[2],
                compat_flags: bytes[3],
                sequence: bytes[4],
                sysid: bytes[5],
                compid: bytes[6],
                msgid: LittleEndian::read_u24(&bytes[7..10]),
            },
            Version::V1 | Version::V09 => Header {
                version,
                length: bytes[1],
                incompat_flags: 0,
                compat_flags: 0,
                sequence: bytes[2],
                sysid: bytes[3],
                compid: bytes[4],
                msgid: bytes[5] as u32,
            },
        }
    }

    pub fn is_signed(&self) -> bool {
        self.version == Version::V2 && self.incompat_flags & INCOMPAT_SIGNED != 0
    }
}

/// What the framer found, in buffer order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameEvent {
    /// Bytes before a magic byte (or up to the end of the buffer).
    Garbage(ByteRange),
    Packet {
        range: ByteRange,
        header: Header,
        /// A decode procedure exists for the message id.
        known: bool,
        /// Payload bytes missing from the buffer (zero-padded).
        padded: usize,
    },
    /// Too few bytes left for a header; ends the buffer.
    TruncatedHeader(ByteRange),
    /// Signed packet without its full signature block; ends the buffer.
    TruncatedSignature(ByteRange),
}

/// Result of dissecting one buffer.
#[derive(Debug, Clone, Default)]
pub struct Dissection {
    /// One top-level tree per packet or raw span.
    pub nodes: Vec<Node>,
    pub events: Vec<FrameEvent>,
    pub columns: Columns,
}

impl Dissection {
    pub fn packet_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, FrameEvent::Packet { .. }))
            .count()
    }

    pub fn raw_count(&self) -> usize {
        self.events.len() - self.packet_count()
    }

    pub fn unknown_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.events.iter().filter_map(|e| match e {
            FrameEvent::Packet { header, known: false, .. } => Some(header.msgid),
            _ => None,
        })
    }
}

/// Framing states. Packet-local data travels with the state.
enum ScanState {
    Scanning,
    Header {
        version: Version,
    },
    Payload {
        header: Header,
        node: Node,
        start: usize,
    },
    Trailer {
        header: Header,
        node: Node,
        start: usize,
        end: usize,
        known: bool,
        padded: usize,
    },
    Done,
}

/// Per-buffer framer. A fresh one is created for every buffer.
struct Framer<'a> {
    dissector: &'a Dissector,
    buffer: &'a [u8],
    offset: usize,
    /// Start of the garbage span being skipped.
    unknown_start: Option<usize>,
    out: Dissection,
}

impl<'a> Framer<'a> {
    fn new(dissector: &'a Dissector, buffer: &'a [u8]) -> Self {
        Framer {
            dissector,
            buffer,
            offset: 0,
            unknown_start: None,
            out: Dissection::default(),
        }
    }

    fn top_node(&self, offset: usize) -> Node {
        Node::text(
            format!("{} ({})", PROTOCOL_NAME, self.buffer.len()),
            ByteRange::new(offset, self.buffer.len() - offset),
        )
    }

    /// First entry of the buffer replaces the info column, later ones append.
    fn note(&mut self, text: &str) {
        if self.out.events.is_empty() {
            self.out.columns.info.set(text);
        } else {
            self.out.columns.info.append("   ");
            self.out.columns.info.append(text);
        }
    }

    fn raw(&self, field: &str, range: ByteRange) -> Node {
        let bytes = self.buffer[range.start..range.end()].to_vec();
        self.dissector.field_node(field, range, Value::Bytes(bytes))
    }

    fn flush_unknown(&mut self, end: usize) {
        let Some(start) = self.unknown_start.take() else {
            return;
        };
        let range = ByteRange::span(start, end);
        self.note("Unknown message");
        let mut node = self.top_node(start);
        node.range = range;
        node.add(self.raw(RAW_PAYLOAD, range));
        self.out.nodes.push(node);
        self.out.events.push(FrameEvent::Garbage(range));
    }

    fn step(&mut self, state: ScanState) -> ScanState {
        let len = self.buffer.len();
        match state {
            ScanState::Scanning => {
                if self.offset >= len {
                    self.flush_unknown(len);
                    return ScanState::Done;
                }
                match Version::from_magic(self.buffer[self.offset]) {
                    Some(version) => {
                        self.flush_unknown(self.offset);
                        ScanState::Header { version }
                    }
                    None => {
                        self.unknown_start.get_or_insert(self.offset);
                        self.offset += 1;
                        ScanState::Scanning
                    }
                }
            }
            ScanState::Header { version } => {
                let header_len = version.header_len();
                if len.saturating_sub(CRC_LEN + self.offset) < header_len {
                    let range = ByteRange::span(self.offset, len);
                    let mut node = self.top_node(self.offset);
                    node.add(self.raw(RAW_HEADER, range));
                    self.out.nodes.push(node);
                    self.out.events.push(FrameEvent::TruncatedHeader(range));
                    return ScanState::Done;
                }
                let at = self.offset;
                let header = Header::parse(version, &self.buffer[at..at + header_len]);
                let mut node = self.top_node(at);
                let d = self.dissector;
                let sub = node.add(Node::text("Header", ByteRange::new(at, header_len)));
                sub.add(d.field_node(MAGIC, ByteRange::new(at, 1), Value::U8(version.magic())));
                sub.add(d.field_node(LENGTH, ByteRange::new(at + 1, 1), Value::U8(header.length)));
                let mut pos = at + 2;
                if version == Version::V2 {
                    sub.add(d.field_node(INCOMPAT_FLAGS, ByteRange::new(pos, 1), Value::U8(header.incompat_flags)));
                    sub.add(d.field_node(COMPAT_FLAGS, ByteRange::new(pos + 1, 1), Value::U8(header.compat_flags)));
                    pos += 2;
                }
                sub.add(d.field_node(SEQUENCE, ByteRange::new(pos, 1), Value::U8(header.sequence)));
                sub.add(d.field_node(SYSID, ByteRange::new(pos + 1, 1), Value::U8(header.sysid)));
                sub.add(d.field_node(COMPID, ByteRange::new(pos + 2, 1), Value::U8(header.compid)));
                let msgid_len = at + header_len - (pos + 3);
                sub.add(d.field_node(MSGID, ByteRange::new(pos + 3, msgid_len), Value::U32(header.msgid)));

                self.out.columns.protocol = version.name().to_string();
                self.out.columns.source = format!("System: {}, Component: {}", header.sysid, header.compid);
                self.offset = at + header_len;
                ScanState::Payload {
                    header,
                    node,
                    start: self.offset,
                }
            }
            ScanState::Payload { header, mut node, start } => {
                let declared = start + header.length as usize;
                let limit = declared.min(len - CRC_LEN);
                let padded = declared - limit;
                let known = match self.dissector.message_name(header.msgid) {
                    Some(name) => {
                        let name = name.to_string();
                        self.out.columns.destination = name.clone();
                        self.note(&name);
                        let payload = node.add(self.dissector.field_node(
                            PAYLOAD,
                            ByteRange::span(start, limit),
                            Value::U32(header.msgid),
                        ));
                        self.dissector.dissect_payload(
                            self.buffer,
                            payload,
                            &mut self.out.columns,
                            header.msgid,
                            start,
                            limit,
                        )
                    }
                    None => false,
                };
                if !known {
                    self.note("Unknown message type");
                    let mut raw = self.raw(RAW_PAYLOAD, ByteRange::span(start, limit));
                    raw.expert = Some("Unknown message type".to_string());
                    node.add(raw);
                }
                self.offset = limit;
                ScanState::Trailer {
                    header,
                    node,
                    start,
                    end: limit,
                    known,
                    padded,
                }
            }
            ScanState::Trailer {
                header,
                mut node,
                start,
                end,
                known,
                padded,
            } => {
                let crc = LittleEndian::read_u16(&self.buffer[end..end + CRC_LEN]);
                node.add(self.dissector.field_node(CRC, ByteRange::new(end, CRC_LEN), Value::U16(crc)));
                self.offset = end + CRC_LEN;

                let packet_start = start - header.version.header_len();
                let mut truncated = None;
                if header.is_signed() {
                    let at = self.offset;
                    if len - at < SIGNATURE_LEN {
                        let range = ByteRange::span(at, len);
                        let mut raw = self.raw(RAW_PAYLOAD, range);
                        raw.expert = Some("Truncated signature".to_string());
                        node.add(raw);
                        truncated = Some(range);
                        self.offset = len;
                    } else {
                        node.add(self.signature(at));
                        self.offset = at + SIGNATURE_LEN;
                    }
                }
                let range = ByteRange::span(packet_start, self.offset);
                node.range = range;
                self.out.nodes.push(node);
                self.out.events.push(FrameEvent::Packet {
                    range,
                    header,
                    known,
                    padded,
                });
                match truncated {
                    Some(range) => {
                        self.out.events.push(FrameEvent::TruncatedSignature(range));
                        ScanState::Done
                    }
                    None => ScanState::Scanning,
                }
            }
            ScanState::Done => ScanState::Done,
        }
    }

    fn signature(&self, at: usize) -> Node {
        let d = self.dissector;
        let mut sig = Node::text("Signature", ByteRange::new(at, SIGNATURE_LEN));
        sig.add(d.field_node(SIGNATURE_LINK, ByteRange::new(at, 1), Value::U8(self.buffer[at])));
        let ticks = LittleEndian::read_u48(&self.buffer[at + 1..at + 7]);
        sig.add(d.field_node(
            SIGNATURE_TIME,
            ByteRange::new(at + 1, 6),
            Value::Double(signature_unix_time(ticks)),
        ));
        sig.add(d.field_node(
            SIGNATURE_SIGNATURE,
            ByteRange::new(at + 7, 6),
            Value::Bytes(self.buffer[at + 7..at + 13].to_vec()),
        ));
        sig
    }
}

/// Unix time in seconds of a signature timestamp.
pub fn signature_unix_time(ticks: u64) -> f64 {
    let secs = SIGNATURE_EPOCH_UNIX + ticks / SIGNATURE_TICKS_PER_SEC;
    let frac = (ticks % SIGNATURE_TICKS_PER_SEC) as f64 / SIGNATURE_TICKS_PER_SEC as f64;
    secs as f64 + frac
}

/// Split `buffer` into packets and raw spans.
pub fn dissect_buffer(dissector: &Dissector, buffer: &[u8]) -> Dissection {
    let mut framer = Framer::new(dissector, buffer);
    let mut state = ScanState::Scanning;
    while !matches!(state, ScanState::Done) {
        state = framer.step(state);
    }
    framer.out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_layouts() {
        let v2 = Header::parse(Version::V2, &[0xFD, 9, 1, 2, 7, 1, 200, 0x21, 0x43, 0x01]);
        assert_eq!(v2.msgid, 0x014321);
        assert_eq!((v2.sequence, v2.sysid, v2.compid), (7, 1, 200));
        assert!(v2.is_signed());
        let v1 = Header::parse(Version::V1, &[0xFE, 9, 7, 1, 1, 0]);
        assert_eq!((v1.length, v1.sequence, v1.msgid), (9, 7, 0));
        assert!(!v1.is_signed());
        assert_eq!(Version::from_magic(0x55).map(|v| v.header_len()), Some(6));
        assert_eq!(Version::from_magic(0x00), None);
    }

    #[test]
    fn signature_epoch() {
        assert_eq!(signature_unix_time(0), 1_420_070_400.0);
        assert_eq!(signature_unix_time(150_000), 1_420_070_401.5);
    }
}
