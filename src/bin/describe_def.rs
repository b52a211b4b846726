//! Generate a dissector from a definition and list its field descriptors.
//!
//! Usage:
//!   describe_def [DEFINITION]
//!
//! One line per descriptor (abbreviation, display type, base, label), then one line per
//! flag descriptor. DEFINITION defaults to `defs/common.mavdef`.

use anyhow::Context;
use mavdissect::dump::describe_registry;
use mavdissect::{Dissector, GeneratorConfig};
use std::path::PathBuf;

fn main() -> anyhow::Result<()> {
    let def_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("defs/common.mavdef"));
    let src = std::fs::read_to_string(&def_path).with_context(|| format!("reading {}", def_path.display()))?;
    let dissector = Dissector::from_source(&src, &GeneratorConfig::default())?;

    println!("{}", describe_registry(dissector.registry()));
    eprintln!(
        "{}: {} descriptors, {} flags, {} message procedures, {} command procedures",
        def_path.display(),
        dissector.registry().len(),
        dissector.registry().flags().len(),
        dissector.procedures().len(),
        dissector.procedures().command_len()
    );
    Ok(())
}
