//! Capture front-end: read pcap/pcapng files and hand MAVLink-carrying transport
//! payloads to a callback.

use etherparse::{SlicedPacket, TransportSlice};
use pcap_parser::pcapng::Block as PcapNgBlock;
use pcap_parser::traits::{PcapNGPacketBlock, PcapReaderIterator};
use pcap_parser::{Linktype, PcapBlockOwned, PcapError};
use std::io::{Cursor, Read};

/// pcapng files start with a section header block.
pub const PCAPNG_MAGIC: [u8; 4] = [0x0a, 0x0d, 0x0d, 0x0a];
const READER_CAPACITY: usize = 1 << 20;
/// Linux cooked capture v1 header length.
const SLL_HEADER_LEN: usize = 16;

/// Which payloads to extract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureFilter {
    pub udp_ports: Vec<u16>,
    pub tcp_ports: Vec<u16>,
    /// Link types whose frames are MAVLink buffers as-is.
    pub whole_frame_linktypes: Vec<i32>,
}

impl Default for CaptureFilter {
    fn default() -> Self {
        CaptureFilter {
            udp_ports: vec![14550, 14580, 18570],
            tcp_ports: (5760..=5763).collect(),
            // LINKTYPE_USER0
            whole_frame_linktypes: vec![147],
        }
    }
}

impl CaptureFilter {
    pub fn matches_udp(&self, src: u16, dst: u16) -> bool {
        self.udp_ports.contains(&src) || self.udp_ports.contains(&dst)
    }

    pub fn matches_tcp(&self, src: u16, dst: u16) -> bool {
        self.tcp_ports.contains(&src) || self.tcp_ports.contains(&dst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Udp { src_port: u16, dst_port: u16 },
    Tcp { src_port: u16, dst_port: u16 },
    /// Whole link-layer frame.
    Raw,
}

/// One extracted payload.
#[derive(Debug, Clone, Copy)]
pub struct CapturedPayload<'a> {
    /// 1-based packet number in the capture.
    pub index: u64,
    pub transport: Transport,
    pub data: &'a [u8],
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    pub packets: u64,
    pub payloads: u64,
    /// Packets that could not be sliced into link/network/transport layers.
    pub malformed: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("pcap read error: {0}")]
    Pcap(String),
}

fn pcap_error<I: std::fmt::Debug>(what: &str, e: PcapError<I>) -> CaptureError {
    CaptureError::Pcap(format!("{}: {:?}", what, e))
}

pub fn is_pcapng(probe: &[u8]) -> bool {
    probe.starts_with(&PCAPNG_MAGIC)
}

/// Extract the payload of a frame, `Ok(None)` when the filter does not select it.
pub fn extract_payload<'a>(
    linktype: Linktype,
    frame: &'a [u8],
    filter: &CaptureFilter,
) -> Result<Option<(Transport, &'a [u8])>, String> {
    if filter.whole_frame_linktypes.contains(&linktype.0) {
        return Ok(Some((Transport::Raw, frame)));
    }
    let sliced = match linktype {
        Linktype::ETHERNET => SlicedPacket::from_ethernet(frame).map_err(|e| e.to_string())?,
        Linktype::RAW => SlicedPacket::from_ip(frame).map_err(|e| e.to_string())?,
        Linktype::LINUX_SLL => {
            let ip = frame
                .get(SLL_HEADER_LEN..)
                .ok_or_else(|| "truncated Linux cooked header".to_string())?;
            SlicedPacket::from_ip(ip).map_err(|e| e.to_string())?
        }
        _ => return Ok(None),
    };
    let found = match sliced.transport {
        Some(TransportSlice::Udp(udp)) => {
            let (src_port, dst_port) = (udp.source_port(), udp.destination_port());
            filter
                .matches_udp(src_port, dst_port)
                .then(|| (Transport::Udp { src_port, dst_port }, udp.payload()))
        }
        Some(TransportSlice::Tcp(tcp)) => {
            let (src_port, dst_port) = (tcp.source_port(), tcp.destination_port());
            filter
                .matches_tcp(src_port, dst_port)
                .then(|| (Transport::Tcp { src_port, dst_port }, tcp.payload()))
        }
        _ => None,
    };
    Ok(found.filter(|(_, data)| !data.is_empty()))
}

fn handle_frame<F: FnMut(CapturedPayload<'_>)>(
    linktype: Linktype,
    frame: &[u8],
    filter: &CaptureFilter,
    stats: &mut CaptureStats,
    f: &mut F,
) {
    stats.packets += 1;
    match extract_payload(linktype, frame, filter) {
        Ok(Some((transport, data))) => {
            stats.payloads += 1;
            f(CapturedPayload {
                index: stats.packets,
                transport,
                data,
            });
        }
        Ok(None) => {}
        Err(_) => stats.malformed += 1,
    }
}

/// Read a pcap or pcapng capture and call `f` for every selected payload.
pub fn for_each_payload<R, F>(mut reader: R, filter: &CaptureFilter, mut f: F) -> Result<CaptureStats, CaptureError>
where
    R: Read,
    F: FnMut(CapturedPayload<'_>),
{
    let mut probe = [0u8; 4];
    reader.read_exact(&mut probe)?;
    let input = Cursor::new(probe).chain(reader);
    if is_pcapng(&probe) {
        run_pcapng(input, filter, &mut f)
    } else {
        run_legacy_pcap(input, filter, &mut f)
    }
}

fn run_legacy_pcap<R: Read, F: FnMut(CapturedPayload<'_>)>(
    input: R,
    filter: &CaptureFilter,
    f: &mut F,
) -> Result<CaptureStats, CaptureError> {
    let mut reader = pcap_parser::pcap::LegacyPcapReader::new(READER_CAPACITY, input)
        .map_err(|e| pcap_error("pcap header", e))?;
    let mut stats = CaptureStats::default();
    let mut linktype = Linktype::ETHERNET;
    loop {
        match reader.next() {
            Ok((offset, block)) => {
                match block {
                    PcapBlockOwned::LegacyHeader(h) => linktype = h.network,
                    PcapBlockOwned::Legacy(b) => handle_frame(linktype, b.data, filter, &mut stats, f),
                    PcapBlockOwned::NG(_) => {}
                }
                reader.consume(offset);
            }
            Err(PcapError::Eof) => break,
            Err(PcapError::Incomplete(_)) => {
                reader.refill().map_err(|e| pcap_error("pcap refill", e))?;
            }
            Err(e) => return Err(pcap_error("pcap read", e)),
        }
    }
    Ok(stats)
}

fn run_pcapng<R: Read, F: FnMut(CapturedPayload<'_>)>(
    input: R,
    filter: &CaptureFilter,
    f: &mut F,
) -> Result<CaptureStats, CaptureError> {
    let mut reader = pcap_parser::pcapng::PcapNGReader::new(READER_CAPACITY, input)
        .map_err(|e| pcap_error("pcapng header", e))?;
    let mut stats = CaptureStats::default();
    let mut if_linktypes: Vec<Linktype> = Vec::new();
    loop {
        match reader.next() {
            Ok((offset, block)) => {
                if let PcapBlockOwned::NG(b) = block {
                    match &b {
                        PcapNgBlock::SectionHeader(_) => if_linktypes.clear(),
                        PcapNgBlock::InterfaceDescription(idb) => if_linktypes.push(idb.linktype),
                        PcapNgBlock::EnhancedPacket(epb) => {
                            let lt = if_linktypes
                                .get(epb.if_id as usize)
                                .copied()
                                .unwrap_or(Linktype::ETHERNET);
                            handle_frame(lt, epb.packet_data(), filter, &mut stats, f);
                        }
                        PcapNgBlock::SimplePacket(spb) => {
                            let lt = if_linktypes.first().copied().unwrap_or(Linktype::ETHERNET);
                            handle_frame(lt, spb.packet_data(), filter, &mut stats, f);
                        }
                        _ => {}
                    }
                }
                reader.consume(offset);
            }
            Err(PcapError::Eof) => break,
            Err(PcapError::Incomplete(_)) => {
                reader.refill().map_err(|e| pcap_error("pcapng refill", e))?;
            }
            Err(e) => return Err(pcap_error("pcapng read", e)),
        }
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use etherparse::PacketBuilder;

    fn udp_frame(src: u16, dst: u16, payload: &[u8]) -> Vec<u8> {
        let builder = PacketBuilder::ethernet2([1, 2, 3, 4, 5, 6], [7, 8, 9, 10, 11, 12])
            .ipv4([192, 168, 0, 1], [192, 168, 0, 2], 64)
            .udp(src, dst);
        let mut packet = Vec::<u8>::with_capacity(builder.size(payload.len()));
        builder.write(&mut packet, payload).unwrap();
        packet
    }

    fn legacy_pcap(linktype: u32, frames: &[Vec<u8>]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&0xa1b2_c3d4u32.to_le_bytes());
        out.extend_from_slice(&2u16.to_le_bytes());
        out.extend_from_slice(&4u16.to_le_bytes());
        out.extend_from_slice(&0i32.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&65535u32.to_le_bytes());
        out.extend_from_slice(&linktype.to_le_bytes());
        for (i, frame) in frames.iter().enumerate() {
            out.extend_from_slice(&(i as u32).to_le_bytes());
            out.extend_from_slice(&0u32.to_le_bytes());
            out.extend_from_slice(&(frame.len() as u32).to_le_bytes());
            out.extend_from_slice(&(frame.len() as u32).to_le_bytes());
            out.extend_from_slice(frame);
        }
        out
    }

    #[test]
    fn udp_port_filter() {
        let filter = CaptureFilter::default();
        let frame = udp_frame(40000, 14550, &[0xFE, 1, 2]);
        let (transport, data) = extract_payload(Linktype::ETHERNET, &frame, &filter).unwrap().unwrap();
        assert_eq!(transport, Transport::Udp { src_port: 40000, dst_port: 14550 });
        assert_eq!(data, &[0xFE, 1, 2]);
        let other = udp_frame(40000, 53, &[1]);
        assert!(extract_payload(Linktype::ETHERNET, &other, &filter).unwrap().is_none());
    }

    #[test]
    fn user0_frames_are_whole_buffers() {
        let filter = CaptureFilter::default();
        let (transport, data) = extract_payload(Linktype(147), &[0xFD, 0], &filter).unwrap().unwrap();
        assert_eq!(transport, Transport::Raw);
        assert_eq!(data.len(), 2);
    }

    #[test]
    fn reads_legacy_pcap() {
        let frames = vec![
            udp_frame(14550, 14550, &[0xFE, 9]),
            udp_frame(1000, 2000, &[0xFE, 9]),
            udp_frame(14550, 14555, &[0xFD]),
        ];
        let file = legacy_pcap(1, &frames);
        let mut seen = Vec::new();
        let stats = for_each_payload(Cursor::new(file), &CaptureFilter::default(), |p| {
            seen.push((p.index, p.data.to_vec()))
        })
        .unwrap();
        assert_eq!(stats.packets, 3);
        assert_eq!(stats.payloads, 2);
        assert_eq!(seen, vec![(1, vec![0xFE, 9]), (3, vec![0xFD])]);
    }

    #[test]
    fn malformed_frames_are_counted() {
        let file = legacy_pcap(1, &[vec![0u8; 4]]);
        let stats = for_each_payload(Cursor::new(file), &CaptureFilter::default(), |_| {}).unwrap();
        assert_eq!(stats.malformed, 1);
        assert_eq!(stats.payloads, 0);
    }
}
