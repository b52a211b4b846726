//! Enumeration name tables and bitmask flag sets.

use crate::ast::{EnumDef, ResolvedProtocol};
use std::collections::{BTreeMap, HashMap};

/// Entries whose name ends with this suffix are end markers, never shown.
pub const END_MARKER_SUFFIX: &str = "_ENUM_END";

pub fn is_end_marker(name: &str) -> bool {
    name.ends_with(END_MARKER_SUFFIX)
}

pub fn is_power_of_two(v: u64) -> bool {
    v != 0 && v & (v - 1) == 0
}

fn bit_length(v: u64) -> u32 {
    64 - v.leading_zeros()
}

/// One single-bit flag of a bitmask enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flag {
    pub name: String,
    pub mask: u64,
}

/// Flags of a bitmask enumeration and the display width covering them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagSet {
    /// Bit length of the largest entry value, rounded up to a multiple of 4.
    pub bits: u32,
    /// Declaration order.
    pub flags: Vec<Flag>,
}

impl FlagSet {
    pub fn build(def: &EnumDef) -> FlagSet {
        let entries = def.entries.iter().filter(|e| !is_end_marker(&e.name));
        let max_bits = entries.clone().map(|e| bit_length(e.value)).max().unwrap_or(0);
        let flags = entries
            .filter(|e| is_power_of_two(e.value))
            .map(|e| Flag {
                name: e.name.clone(),
                mask: e.value,
            })
            .collect();
        FlagSet {
            bits: max_bits.div_ceil(4) * 4,
            flags,
        }
    }
}

/// Value to name lookup of one enumeration.
#[derive(Debug, Clone)]
pub struct EnumTable {
    pub name: String,
    pub bitmask: bool,
    pub names: BTreeMap<u64, String>,
    /// Present for bitmask enumerations only.
    pub flags: Option<FlagSet>,
}

impl EnumTable {
    pub fn build(def: &EnumDef) -> EnumTable {
        let names = def
            .entries
            .iter()
            .filter(|e| !is_end_marker(&e.name))
            .map(|e| (e.value, e.name.clone()))
            .collect();
        EnumTable {
            name: def.name.clone(),
            bitmask: def.bitmask,
            names,
            flags: def.bitmask.then(|| FlagSet::build(def)),
        }
    }

    pub fn name_of(&self, value: u64) -> Option<&str> {
        self.names.get(&value).map(String::as_str)
    }
}

/// All enumeration tables, keyed by enumeration name.
#[derive(Debug, Clone, Default)]
pub struct EnumTables {
    by_name: HashMap<String, EnumTable>,
}

impl EnumTables {
    pub fn build(resolved: &ResolvedProtocol) -> EnumTables {
        let by_name = resolved
            .enums
            .iter()
            .map(|e| (e.name.clone(), EnumTable::build(e)))
            .collect();
        EnumTables { by_name }
    }

    pub fn get(&self, name: &str) -> Option<&EnumTable> {
        self.by_name.get(name)
    }

    pub fn entry_name(&self, enum_name: &str, value: u64) -> Option<&str> {
        self.get(enum_name).and_then(|t| t.name_of(value))
    }

    pub fn flags(&self, enum_name: &str) -> Option<&FlagSet> {
        self.get(enum_name).and_then(|t| t.flags.as_ref())
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::EnumEntryDef;

    fn entry(name: &str, value: u64) -> EnumEntryDef {
        EnumEntryDef {
            name: name.into(),
            value,
            params: vec![],
        }
    }

    fn mode_flags() -> EnumDef {
        EnumDef {
            name: "MAV_MODE_FLAG".into(),
            bitmask: true,
            entries: vec![
                entry("MAV_MODE_FLAG_SAFETY_ARMED", 128),
                entry("MAV_MODE_FLAG_NONE", 0),
                entry("MAV_MODE_FLAG_CUSTOM_MODE_ENABLED", 1),
                entry("MAV_MODE_FLAG_COMBINED", 3),
                entry("MAV_MODE_FLAG_GUIDED_ENABLED", 8),
                entry("MAV_MODE_FLAG_ENUM_END", 256),
            ],
        }
    }

    #[test]
    fn power_of_two() {
        assert!(!is_power_of_two(0));
        assert!(is_power_of_two(1));
        assert!(is_power_of_two(1 << 40));
        assert!(!is_power_of_two(3));
    }

    #[test]
    fn flag_set_keeps_single_bits_in_declaration_order() {
        let set = FlagSet::build(&mode_flags());
        let names: Vec<_> = set.flags.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "MAV_MODE_FLAG_SAFETY_ARMED",
                "MAV_MODE_FLAG_CUSTOM_MODE_ENABLED",
                "MAV_MODE_FLAG_GUIDED_ENABLED"
            ]
        );
        assert_eq!(set.bits, 8);
    }

    #[test]
    fn flag_bits_round_up_to_nibble() {
        let def = EnumDef {
            name: "X".into(),
            bitmask: true,
            entries: vec![entry("A", 1), entry("B", 1 << 16)],
        };
        assert_eq!(FlagSet::build(&def).bits, 20);
    }

    #[test]
    fn name_table_skips_end_marker_but_keeps_composites() {
        let table = EnumTable::build(&mode_flags());
        assert_eq!(table.name_of(0), Some("MAV_MODE_FLAG_NONE"));
        assert_eq!(table.name_of(3), Some("MAV_MODE_FLAG_COMBINED"));
        assert_eq!(table.name_of(256), None);
        assert!(table.flags.is_some());
    }
}
