//! Dissection fuzz target: frame and decode arbitrary buffers with the common definition.
//! Dissection never fails and must not panic on any input.
//! Build with: cargo fuzz run dissect_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;
#[cfg(fuzzing)]
use std::sync::OnceLock;

#[cfg(fuzzing)]
static DISSECTOR: OnceLock<mavdissect::Dissector> = OnceLock::new();

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    let dissector = DISSECTOR.get_or_init(|| {
        mavdissect::Dissector::from_source(
            include_str!("../../defs/common.mavdef"),
            &mavdissect::GeneratorConfig::default(),
        )
        .expect("common definition generates")
    });
    let out = dissector.dissect(data);
    let covered: usize = out.nodes.iter().map(|n| n.range.len).sum();
    assert!(covered <= data.len());
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run dissect_fuzz");
}
