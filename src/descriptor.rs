//! Field descriptors: one named, typed, labeled entry per displayable item.
//!
//! Every decoded item in a dissection tree refers to a descriptor by name. Descriptors
//! are emitted once at generation time for the fixed header/trailer fields, every
//! (message field, array index) pair, every command parameter view, and every flag of
//! a bitmask-typed descriptor.

use crate::ast::{BaseType, EnumEntryDef, Message};
use crate::command::resolve_command_params;
use crate::dissector::{GenerateError, GeneratorConfig};
use crate::enums::EnumTables;
use crate::template::substitute;
use crate::typemap::field_info;
use std::collections::HashMap;

/// Type used to display a value (may differ from the wire type for enum fields).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayType {
    Uint8,
    Uint16,
    Uint24,
    Uint32,
    Uint64,
    Int8,
    Int16,
    Int32,
    Int64,
    Float,
    Double,
    String,
    Bytes,
    AbsoluteTime,
}

impl DisplayType {
    pub fn for_base(bt: BaseType) -> DisplayType {
        match bt {
            BaseType::U8 => DisplayType::Uint8,
            BaseType::U16 => DisplayType::Uint16,
            BaseType::U32 => DisplayType::Uint32,
            BaseType::U64 => DisplayType::Uint64,
            BaseType::I8 => DisplayType::Int8,
            BaseType::I16 => DisplayType::Int16,
            BaseType::I32 => DisplayType::Int32,
            BaseType::I64 => DisplayType::Int64,
            BaseType::Float => DisplayType::Float,
            BaseType::Double => DisplayType::Double,
            BaseType::Char => DisplayType::String,
        }
    }

    /// Hex digits needed to show a full value of this type.
    pub fn hex_digits(&self) -> usize {
        match self {
            DisplayType::Uint8 | DisplayType::Int8 => 2,
            DisplayType::Uint16 | DisplayType::Int16 => 4,
            DisplayType::Uint24 => 6,
            DisplayType::Uint32 | DisplayType::Int32 | DisplayType::Float => 8,
            _ => 16,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DisplayType::Uint8 => "UINT8",
            DisplayType::Uint16 => "UINT16",
            DisplayType::Uint24 => "UINT24",
            DisplayType::Uint32 => "UINT32",
            DisplayType::Uint64 => "UINT64",
            DisplayType::Int8 => "INT8",
            DisplayType::Int16 => "INT16",
            DisplayType::Int32 => "INT32",
            DisplayType::Int64 => "INT64",
            DisplayType::Float => "FLOAT",
            DisplayType::Double => "DOUBLE",
            DisplayType::String => "STRING",
            DisplayType::Bytes => "BYTES",
            DisplayType::AbsoluteTime => "ABSOLUTE_TIME",
        }
    }
}

/// Numeric display base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Base {
    Dec,
    Hex,
    HexDec,
}

/// Where value names come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueNames {
    None,
    Enum(String),
    /// Message id to message name.
    Messages,
    /// Magic byte to protocol version.
    Versions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    /// Filter abbreviation, `<protocol>.<name>`.
    pub abbrev: String,
    pub label: String,
    pub display_type: DisplayType,
    pub base: Base,
    pub names: ValueNames,
    /// Bitmask enumeration whose flags are shown below the value.
    pub flags: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagDescriptor {
    /// `<descriptor>_flag<ENTRY>`
    pub name: String,
    pub abbrev: String,
    pub label: String,
    pub bits: u32,
    pub mask: u64,
}

/// Registry of all descriptors, in emission order.
#[derive(Debug, Clone, Default)]
pub struct FieldRegistry {
    fields: Vec<FieldDescriptor>,
    field_index: HashMap<String, usize>,
    flags: Vec<FlagDescriptor>,
    flag_index: HashMap<String, usize>,
}

impl FieldRegistry {
    pub fn insert(&mut self, desc: FieldDescriptor) -> Result<(), GenerateError> {
        if self.field_index.contains_key(&desc.name) {
            return Err(GenerateError::DuplicateDescriptor(desc.name));
        }
        self.field_index.insert(desc.name.clone(), self.fields.len());
        self.fields.push(desc);
        Ok(())
    }

    pub fn insert_flag(&mut self, flag: FlagDescriptor) -> Result<(), GenerateError> {
        if self.flag_index.contains_key(&flag.name) {
            return Err(GenerateError::DuplicateDescriptor(flag.name));
        }
        self.flag_index.insert(flag.name.clone(), self.flags.len());
        self.flags.push(flag);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&FieldDescriptor> {
        self.field_index.get(name).map(|&i| &self.fields[i])
    }

    pub fn get_flag(&self, name: &str) -> Option<&FlagDescriptor> {
        self.flag_index.get(name).map(|&i| &self.flags[i])
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn flags(&self) -> &[FlagDescriptor] {
        &self.flags
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

// Fixed header, payload and trailer descriptors.
pub const MAGIC: &str = "magic";
pub const LENGTH: &str = "length";
pub const INCOMPAT_FLAGS: &str = "incompatibility_flag";
pub const COMPAT_FLAGS: &str = "compatibility_flag";
pub const SEQUENCE: &str = "sequence";
pub const SYSID: &str = "sysid";
pub const COMPID: &str = "compid";
pub const MSGID: &str = "msgid";
pub const PAYLOAD: &str = "payload";
pub const CRC: &str = "crc";
pub const SIGNATURE_LINK: &str = "signature_link";
pub const SIGNATURE_TIME: &str = "signature_time";
pub const SIGNATURE_SIGNATURE: &str = "signature_signature";
pub const RAW_HEADER: &str = "rawheader";
pub const RAW_PAYLOAD: &str = "rawpayload";

fn plain(
    config: &GeneratorConfig,
    name: &str,
    label: &str,
    display_type: DisplayType,
    base: Base,
    names: ValueNames,
) -> Result<FieldDescriptor, GenerateError> {
    Ok(FieldDescriptor {
        name: name.to_string(),
        abbrev: substitute(
            "${proto}.${fname}",
            &[("proto", &config.protocol_abbrev), ("fname", name)],
        )?,
        label: label.to_string(),
        display_type,
        base,
        names,
        flags: None,
    })
}

pub fn emit_frame_fields(
    registry: &mut FieldRegistry,
    tables: &EnumTables,
    config: &GeneratorConfig,
) -> Result<(), GenerateError> {
    let component_names = if tables.get(&config.component_enum).is_some() {
        ValueNames::Enum(config.component_enum.clone())
    } else {
        ValueNames::None
    };
    let fixed = [
        (MAGIC, "Magic value / version", DisplayType::Uint8, Base::Hex, ValueNames::Versions),
        (LENGTH, "Payload length", DisplayType::Uint8, Base::Dec, ValueNames::None),
        (INCOMPAT_FLAGS, "Incompatibility flag", DisplayType::Uint8, Base::HexDec, ValueNames::None),
        (COMPAT_FLAGS, "Compatibility flag", DisplayType::Uint8, Base::HexDec, ValueNames::None),
        (SEQUENCE, "Packet sequence", DisplayType::Uint8, Base::Dec, ValueNames::None),
        (SYSID, "System id", DisplayType::Uint8, Base::Dec, ValueNames::None),
        (COMPID, "Component id", DisplayType::Uint8, Base::Dec, component_names),
        (MSGID, "Message id", DisplayType::Uint24, Base::Dec, ValueNames::Messages),
        (PAYLOAD, "Payload", DisplayType::Uint24, Base::Dec, ValueNames::Messages),
        (CRC, "Message CRC", DisplayType::Uint16, Base::Hex, ValueNames::None),
        (SIGNATURE_LINK, "Link id", DisplayType::Uint8, Base::Dec, ValueNames::None),
        (SIGNATURE_TIME, "Time", DisplayType::AbsoluteTime, Base::Dec, ValueNames::None),
        (SIGNATURE_SIGNATURE, "Signature", DisplayType::Bytes, Base::Hex, ValueNames::None),
        (RAW_HEADER, "Unparsable header fragment", DisplayType::Bytes, Base::Hex, ValueNames::None),
        (RAW_PAYLOAD, "Unparsable payload", DisplayType::Bytes, Base::Hex, ValueNames::None),
    ];
    for (name, label, display_type, base, names) in fixed {
        registry.insert(plain(config, name, label, display_type, base, names)?)?;
    }
    Ok(())
}

/// Inputs shared by field and parameter descriptors.
pub struct DescriptorSpec<'a> {
    pub name: &'a str,
    pub label: &'a str,
    /// Type name shown in the label when no enumeration applies.
    pub physical_name: &'a str,
    pub physical: BaseType,
    pub enum_name: Option<&'a str>,
    pub display_hint: Option<&'a str>,
    pub units: Option<&'a str>,
}

/// Emit one descriptor (and its flag descriptors when bitmask-typed).
///
/// Enum-typed descriptors show the enumeration name instead of the physical type, and
/// float/double/int32 physical types display as uint32 so that names resolve. Only
/// display metadata changes; decoding always follows the physical type.
pub fn emit_field_or_param(
    registry: &mut FieldRegistry,
    tables: &EnumTables,
    config: &GeneratorConfig,
    spec: &DescriptorSpec<'_>,
) -> Result<(), GenerateError> {
    let mut display_type = DisplayType::for_base(spec.physical);
    let mut base = Base::Dec;
    let mut names = ValueNames::None;
    let mut flags = None;
    let type_name = match spec.enum_name {
        Some(enum_name) => {
            let table = tables
                .get(enum_name)
                .ok_or_else(|| GenerateError::UnknownEnum(enum_name.to_string(), spec.name.to_string()))?;
            if table.bitmask {
                base = Base::HexDec;
                flags = Some(enum_name.to_string());
            } else {
                names = ValueNames::Enum(enum_name.to_string());
            }
            if matches!(
                display_type,
                DisplayType::Float | DisplayType::Double | DisplayType::Int32
            ) {
                display_type = DisplayType::Uint32;
            }
            enum_name
        }
        None => {
            if spec.display_hint == Some("bitmask") {
                base = Base::HexDec;
            }
            spec.physical_name
        }
    };
    let unit_text = spec.units.map(|u| format!(" {}", u)).unwrap_or_default();
    let label = substitute(
        "${flabel} (${ftypename})${unitname}",
        &[("flabel", spec.label), ("ftypename", type_name), ("unitname", &unit_text)],
    )?;
    let abbrev = substitute(
        "${proto}.${fname}",
        &[("proto", &config.protocol_abbrev), ("fname", spec.name)],
    )?;
    registry.insert(FieldDescriptor {
        name: spec.name.to_string(),
        abbrev,
        label,
        display_type,
        base,
        names,
        flags: flags.clone(),
    })?;

    if let Some(set) = flags.as_deref().and_then(|e| tables.flags(e)) {
        for flag in &set.flags {
            registry.insert_flag(FlagDescriptor {
                name: substitute(
                    "${fname}_flag${ename}",
                    &[("fname", spec.name), ("ename", &flag.name)],
                )?,
                abbrev: substitute(
                    "${proto}.${fname}.${ename}",
                    &[
                        ("proto", &config.protocol_abbrev),
                        ("fname", spec.name),
                        ("ename", &flag.name),
                    ],
                )?,
                label: flag.name.clone(),
                bits: set.bits,
                mask: flag.mask,
            })?;
        }
    }
    Ok(())
}

/// Descriptor name of element `index` of a field (`None` for scalars and strings).
pub fn message_field_name(
    message: &str,
    field: &str,
    index: Option<usize>,
) -> Result<String, GenerateError> {
    let findex = index.map(|i| format!("_{}", i)).unwrap_or_default();
    Ok(substitute(
        "${fmsg}_${fname}${findex}",
        &[("fmsg", message), ("fname", field), ("findex", &findex)],
    )?)
}

pub fn emit_message_fields(
    registry: &mut FieldRegistry,
    tables: &EnumTables,
    config: &GeneratorConfig,
    message: &Message,
) -> Result<(), GenerateError> {
    for field in &message.fields {
        let info = field_info(field);
        for i in 0..info.count {
            let index = (info.count > 1).then_some(i);
            let name = message_field_name(&message.name, &field.name, index)?;
            let farray = index.map(|i| format!("[{}]", i)).unwrap_or_default();
            let label = substitute(
                "${fname}${farray}",
                &[("fname", &field.name), ("farray", &farray)],
            )?;
            emit_field_or_param(
                registry,
                tables,
                config,
                &DescriptorSpec {
                    name: &name,
                    label: &label,
                    physical_name: field.base_type.token(),
                    physical: info.base_type,
                    enum_name: field.enum_name.as_deref(),
                    display_hint: field.display.as_deref(),
                    units: field.units.as_deref(),
                },
            )?;
        }
    }
    Ok(())
}

pub fn emit_command_params(
    registry: &mut FieldRegistry,
    tables: &EnumTables,
    config: &GeneratorConfig,
    command: &EnumEntryDef,
) -> Result<(), GenerateError> {
    for slot in resolve_command_params(command)? {
        emit_field_or_param(
            registry,
            tables,
            config,
            &DescriptorSpec {
                name: &slot.descriptor,
                label: &slot.label,
                physical_name: slot.physical.token(),
                physical: slot.physical,
                enum_name: slot.enum_name.as_deref(),
                display_hint: None,
                units: slot.units.as_deref(),
            },
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{EnumDef, EnumEntryDef, FieldDef, MessageDef, Protocol, ResolvedProtocol};

    fn resolved() -> ResolvedProtocol {
        let entry = |name: &str, value| EnumEntryDef { name: String::from(name), value, params: vec![] };
        let field = |name: &str, bt, array_len, enum_name: Option<&str>| FieldDef {
            name: name.into(),
            base_type: bt,
            array_len,
            units: None,
            enum_name: enum_name.map(str::to_string),
            display: None,
            extension: false,
        };
        ResolvedProtocol::resolve(Protocol {
            enums: vec![
                EnumDef {
                    name: "MODE".into(),
                    bitmask: true,
                    entries: vec![entry("MODE_A", 1), entry("MODE_B", 2), entry("MODE_AB", 3)],
                },
                EnumDef {
                    name: "KIND".into(),
                    bitmask: false,
                    entries: vec![entry("KIND_X", 0)],
                },
            ],
            messages: vec![MessageDef {
                id: 1,
                name: "M".into(),
                fields: vec![
                    field("mode", BaseType::U8, 0, Some("MODE")),
                    field("kind", BaseType::Float, 0, Some("KIND")),
                    field("v", BaseType::U16, 3, None),
                    field("name", BaseType::Char, 8, None),
                ],
            }],
        })
        .unwrap()
    }

    fn registry() -> FieldRegistry {
        let resolved = resolved();
        let tables = EnumTables::build(&resolved);
        let config = GeneratorConfig::default();
        let mut registry = FieldRegistry::default();
        emit_message_fields(&mut registry, &tables, &config, &resolved.messages[0]).unwrap();
        registry
    }

    #[test]
    fn array_elements_get_suffixes_strings_do_not() {
        let r = registry();
        assert!(r.get("M_v_0").is_some());
        assert!(r.get("M_v_2").is_some());
        assert!(r.get("M_v").is_none());
        assert_eq!(r.get("M_name").unwrap().display_type, DisplayType::String);
        assert_eq!(r.get("M_v_1").unwrap().label, "v[1] (uint16_t)");
    }

    #[test]
    fn enum_float_displays_as_uint32_with_enum_name() {
        let r = registry();
        let kind = r.get("M_kind").unwrap();
        assert_eq!(kind.display_type, DisplayType::Uint32);
        assert_eq!(kind.label, "kind (KIND)");
        assert_eq!(kind.names, ValueNames::Enum("KIND".into()));
        assert_eq!(kind.abbrev, "mavlink_proto.M_kind");
    }

    #[test]
    fn bitmask_field_gets_flag_descriptors() {
        let r = registry();
        let mode = r.get("M_mode").unwrap();
        assert_eq!(mode.base, Base::HexDec);
        assert_eq!(mode.flags.as_deref(), Some("MODE"));
        assert!(r.get_flag("M_mode_flagMODE_A").is_some());
        assert!(r.get_flag("M_mode_flagMODE_B").is_some());
        assert!(r.get_flag("M_mode_flagMODE_AB").is_none());
        assert_eq!(r.get_flag("M_mode_flagMODE_B").unwrap().abbrev, "mavlink_proto.M_mode.MODE_B");
    }

    #[test]
    fn duplicate_descriptor_is_rejected() {
        let resolved = resolved();
        let tables = EnumTables::build(&resolved);
        let config = GeneratorConfig::default();
        let mut r = registry();
        let err = emit_message_fields(&mut r, &tables, &config, &resolved.messages[0]).unwrap_err();
        assert!(matches!(err, GenerateError::DuplicateDescriptor(_)));
    }
}
