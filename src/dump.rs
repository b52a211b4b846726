//! Text rendering: field values as shown in tree nodes, whole dissection trees, and
//! descriptor listings.

use crate::descriptor::{Base, DisplayType, FieldDescriptor, FieldRegistry, ValueNames};
use crate::tree::Node;
use crate::units::format_unix_time;
use crate::value::Value;

pub fn hex_string(b: &[u8]) -> String {
    b.iter().map(|x| format!("{:02x}", x)).collect::<Vec<_>>().join(" ")
}

/// Value as its descriptor displays it: enum-typed float and int32 fields show as uint32.
pub fn display_value(desc: &FieldDescriptor, v: &Value) -> Value {
    match (desc.display_type, v) {
        (DisplayType::Uint32, Value::Float(_) | Value::Double(_) | Value::I32(_)) => {
            Value::U32(v.as_lookup_key().unwrap_or(0) as u32)
        }
        _ => v.clone(),
    }
}

/// Raw scalar string (no names, decimal).
pub fn format_scalar_raw(v: &Value) -> String {
    match v {
        Value::U8(x) => format!("{}", x),
        Value::U16(x) => format!("{}", x),
        Value::U32(x) => format!("{}", x),
        Value::U64(x) => format!("{}", x),
        Value::I8(x) => format!("{}", x),
        Value::I16(x) => format!("{}", x),
        Value::I32(x) => format!("{}", x),
        Value::I64(x) => format!("{}", x),
        Value::Float(x) => format!("{}", x),
        Value::Double(x) => format!("{}", x),
        Value::String(s) => s.clone(),
        Value::Bytes(b) => hex_string(b),
    }
}

/// Format `v` for a node of descriptor `desc`. `name` is the looked-up value name,
/// meaningful only when the descriptor has a name source.
pub fn format_value(desc: &FieldDescriptor, v: &Value, name: Option<&str>) -> String {
    if desc.display_type == DisplayType::AbsoluteTime {
        if let Some(secs) = v.as_f64() {
            return format_unix_time(secs);
        }
    }
    let shown = display_value(desc, v);
    let is_integer = matches!(
        shown,
        Value::U8(_)
            | Value::U16(_)
            | Value::U32(_)
            | Value::U64(_)
            | Value::I8(_)
            | Value::I16(_)
            | Value::I32(_)
            | Value::I64(_)
    );
    if !is_integer {
        return format_scalar_raw(&shown);
    }
    let dec = format_scalar_raw(&shown);
    if desc.names != ValueNames::None {
        return format!("{} ({})", name.unwrap_or("Unknown"), dec);
    }
    let key = shown.as_lookup_key().unwrap_or(0);
    let digits = desc.display_type.hex_digits();
    match desc.base {
        Base::Dec => dec,
        Base::Hex => format!("0x{:0w$x}", key, w = digits),
        Base::HexDec => format!("0x{:0w$x} ({})", key, dec, w = digits),
    }
}

/// Wireshark-style bit pattern, e.g. `.... 1...` for mask 0x08 over 8 bits.
pub fn bit_pattern(bits: u32, mask: u64, value: u64) -> String {
    let mut out = String::with_capacity(bits as usize + bits as usize / 4);
    for i in (0..bits).rev() {
        let bit = 1u64 << i;
        out.push(if mask & bit == 0 {
            '.'
        } else if value & bit != 0 {
            '1'
        } else {
            '0'
        });
        if i % 4 == 0 && i != 0 {
            out.push(' ');
        }
    }
    out
}

/// Indented text rendering of a dissection tree.
pub fn render_tree(node: &Node) -> String {
    let mut out = String::new();
    render_into(node, 0, &mut out);
    out
}

fn render_into(node: &Node, depth: usize, out: &mut String) {
    out.push_str(&"  ".repeat(depth));
    out.push_str(&node.text);
    if node.padded {
        out.push_str(" [padded]");
    }
    if let Some(expert) = &node.expert {
        out.push_str(" [Expert: ");
        out.push_str(expert);
        out.push(']');
    }
    out.push('\n');
    for c in &node.children {
        render_into(c, depth + 1, out);
    }
}

/// One line per descriptor: abbreviation, display type, base and label.
pub fn describe_registry(registry: &FieldRegistry) -> String {
    let mut lines = Vec::with_capacity(registry.len() + registry.flags().len());
    for f in registry.fields() {
        let base = match f.base {
            Base::Dec => "DEC",
            Base::Hex => "HEX",
            Base::HexDec => "HEX_DEC",
        };
        let names = match &f.names {
            ValueNames::None => String::new(),
            ValueNames::Enum(e) => format!(" names={}", e),
            ValueNames::Messages => " names=messages".to_string(),
            ValueNames::Versions => " names=versions".to_string(),
        };
        lines.push(format!(
            "{}\t{}\t{}\t\"{}\"{}",
            f.abbrev,
            f.display_type.name(),
            base,
            f.label,
            names
        ));
    }
    for flag in registry.flags() {
        lines.push(format!(
            "{}\tBOOLEAN\t{}\t\"{}\" mask=0x{:x}",
            flag.abbrev, flag.bits, flag.label, flag.mask
        ));
    }
    lines.join("\n")
}
