//! Dissect every MAVLink payload of a pcap/pcapng capture and print a summary.
//!
//! Usage:
//!   decode_pcap [OPTIONS] CAPTURE [DEFINITION]
//!
//! Options:
//!   --verbose, -v      One line per packet (info column)
//!   --dump[=PATH]      Write dissection trees (stdout when no path is given)
//!   --frame=N          Restrict the dump to capture packet N
//!   --udp-port=P       Select UDP port P (repeatable; replaces the default port list)
//!
//! DEFINITION defaults to `defs/common.mavdef`.

use anyhow::Context;
use mavdissect::dump::{hex_string, render_tree};
use mavdissect::{for_each_payload, CaptureFilter, CapturedPayload, Dissection, Dissector, FrameEvent, GeneratorConfig};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

#[derive(Default)]
struct Summary {
    mavlink_packets: u64,
    raw_spans: u64,
    padded_packets: u64,
    unknown_ids: BTreeMap<u32, u64>,
    messages: BTreeMap<String, u64>,
}

fn write_dump(w: &mut dyn Write, payload: &CapturedPayload<'_>, dissection: &Dissection) -> std::io::Result<()> {
    writeln!(
        w,
        "=== packet {}  {:?}  len {} ===",
        payload.index,
        payload.transport,
        payload.data.len()
    )?;
    writeln!(w, "  data: {}", hex_string(payload.data))?;
    for node in &dissection.nodes {
        w.write_all(render_tree(node).as_bytes())?;
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let mut raw_args: Vec<String> = std::env::args().skip(1).collect();
    let verbose = if let Some(pos) = raw_args.iter().position(|a| a == "--verbose" || a == "-v") {
        raw_args.remove(pos);
        true
    } else {
        false
    };
    let dump_path: Option<PathBuf> = raw_args
        .iter()
        .position(|a| a.starts_with("--dump"))
        .and_then(|pos| {
            let arg = raw_args.remove(pos);
            if arg == "--dump" {
                Some(PathBuf::from("-"))
            } else {
                arg.strip_prefix("--dump=").map(PathBuf::from)
            }
        });
    let frame_filter: Option<u64> = raw_args
        .iter()
        .position(|a| a.starts_with("--frame="))
        .and_then(|pos| {
            let arg = raw_args.remove(pos);
            arg.strip_prefix("--frame=").and_then(|s| s.parse().ok())
        });
    let mut udp_ports = Vec::new();
    while let Some(pos) = raw_args.iter().position(|a| a.starts_with("--udp-port=")) {
        let arg = raw_args.remove(pos);
        let port = arg
            .strip_prefix("--udp-port=")
            .and_then(|s| s.parse::<u16>().ok())
            .with_context(|| format!("invalid port in {}", arg))?;
        udp_ports.push(port);
    }

    let mut args = raw_args.into_iter();
    let capture_path: PathBuf = args
        .next()
        .map(PathBuf::from)
        .context("usage: decode_pcap [--verbose] [--dump[=PATH]] [--frame=N] [--udp-port=P] CAPTURE [DEFINITION]")?;
    let def_path: PathBuf = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("defs/common.mavdef"));

    let src = std::fs::read_to_string(&def_path)
        .with_context(|| format!("reading {}", def_path.display()))?;
    let dissector = Dissector::from_source(&src, &GeneratorConfig::default())?;

    let mut filter = CaptureFilter::default();
    if !udp_ports.is_empty() {
        filter.udp_ports = udp_ports;
    }

    let mut dump_writer: Option<Box<dyn Write>> = match &dump_path {
        Some(p) if p.as_os_str() == "-" => Some(Box::new(std::io::stdout())),
        Some(p) => {
            let file = File::create(p).with_context(|| format!("creating {}", p.display()))?;
            Some(Box::new(BufWriter::new(file)))
        }
        None => None,
    };

    let file = File::open(&capture_path).with_context(|| format!("opening {}", capture_path.display()))?;
    let mut summary = Summary::default();
    let mut dump_error: Option<std::io::Error> = None;
    let stats = for_each_payload(file, &filter, |payload| {
        let dissection = dissector.dissect(payload.data);
        for event in &dissection.events {
            match event {
                FrameEvent::Packet { header, known, padded, .. } => {
                    summary.mavlink_packets += 1;
                    if *padded > 0 {
                        summary.padded_packets += 1;
                    }
                    match (*known, dissector.message_name(header.msgid)) {
                        (true, Some(name)) => *summary.messages.entry(name.to_string()).or_insert(0) += 1,
                        _ => *summary.unknown_ids.entry(header.msgid).or_insert(0) += 1,
                    }
                }
                FrameEvent::Garbage(_) | FrameEvent::TruncatedHeader(_) | FrameEvent::TruncatedSignature(_) => {
                    summary.raw_spans += 1
                }
            }
        }
        if verbose {
            eprintln!(
                "#{} {:?} {} | {}",
                payload.index,
                payload.transport,
                dissection.columns.source,
                dissection.columns.info.as_str()
            );
        }
        let wanted = frame_filter.map_or(true, |f| f == payload.index);
        if wanted && dump_error.is_none() {
            if let Some(w) = dump_writer.as_mut() {
                if let Err(e) = write_dump(w, &payload, &dissection) {
                    dump_error = Some(e);
                }
            }
        }
    })?;
    if let Some(e) = dump_error {
        return Err(e).context("writing dump");
    }
    if let Some(w) = dump_writer.as_mut() {
        w.flush()?;
    }

    eprintln!("capture: {}", capture_path.display());
    eprintln!("definition: {}", def_path.display());
    eprintln!("packets: {}", stats.packets);
    eprintln!("selected payloads: {}", stats.payloads);
    eprintln!("malformed frames: {}", stats.malformed);
    eprintln!("mavlink packets: {}", summary.mavlink_packets);
    eprintln!("raw spans: {}", summary.raw_spans);
    eprintln!("truncated (padded) packets: {}", summary.padded_packets);
    if !summary.messages.is_empty() {
        eprintln!("messages:");
        for (name, n) in &summary.messages {
            eprintln!("  {}: {}", name, n);
        }
    }
    if !summary.unknown_ids.is_empty() {
        eprintln!("unknown message ids:");
        for (id, n) in &summary.unknown_ids {
            eprintln!("  {}: {}", id, n);
        }
    }
    Ok(())
}
