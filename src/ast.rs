//! Protocol model: messages, fields, enumerations and command parameters.
//!
//! [`Protocol`] is what the definition parser produces (declaration order, no layout).
//! [`ResolvedProtocol::resolve`] checks the model and computes the wire layout: every
//! field gets its fixed byte offset and every message its wire length. The resolved
//! model is immutable and shared by all generation steps.

use std::collections::{HashMap, HashSet};

/// Root protocol definition: enumerations and messages in declaration order.
#[derive(Debug, Clone, Default)]
pub struct Protocol {
    pub enums: Vec<EnumDef>,
    pub messages: Vec<MessageDef>,
}

#[derive(Debug, Clone)]
pub struct MessageDef {
    pub id: u32,
    pub name: String,
    pub fields: Vec<FieldDef>,
}

#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub base_type: BaseType,
    /// 0 when no `[n]` was given.
    pub array_len: usize,
    pub units: Option<String>,
    pub enum_name: Option<String>,
    /// Display hint, e.g. `bitmask`.
    pub display: Option<String>,
    /// Declared after the `extensions;` marker (not reordered on the wire).
    pub extension: bool,
}

#[derive(Debug, Clone)]
pub struct EnumDef {
    pub name: String,
    pub bitmask: bool,
    pub entries: Vec<EnumEntryDef>,
}

#[derive(Debug, Clone)]
pub struct EnumEntryDef {
    pub name: String,
    pub value: u64,
    /// Only populated for entries of the command enumeration.
    pub params: Vec<CommandParamDef>,
}

#[derive(Debug, Clone)]
pub struct CommandParamDef {
    /// 1..=7
    pub index: u8,
    /// Absent label marks an unused slot.
    pub label: Option<String>,
    pub enum_name: Option<String>,
    pub units: Option<String>,
}

impl CommandParamDef {
    pub fn is_used(&self) -> bool {
        self.label.as_deref().map(|l| !l.is_empty()).unwrap_or(false)
    }
}

/// Primitive wire types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseType {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    Float,
    Double,
    Char,
}

impl BaseType {
    pub fn from_token(s: &str) -> Option<BaseType> {
        match s {
            "uint8_t" | "uint8_t_mavlink_version" => Some(BaseType::U8),
            "uint16_t" => Some(BaseType::U16),
            "uint32_t" => Some(BaseType::U32),
            "uint64_t" => Some(BaseType::U64),
            "int8_t" => Some(BaseType::I8),
            "int16_t" => Some(BaseType::I16),
            "int32_t" => Some(BaseType::I32),
            "int64_t" => Some(BaseType::I64),
            "float" => Some(BaseType::Float),
            "double" => Some(BaseType::Double),
            "char" => Some(BaseType::Char),
            _ => None,
        }
    }

    /// Definition-language spelling, also used as the display type name.
    pub fn token(&self) -> &'static str {
        match self {
            BaseType::U8 => "uint8_t",
            BaseType::U16 => "uint16_t",
            BaseType::U32 => "uint32_t",
            BaseType::U64 => "uint64_t",
            BaseType::I8 => "int8_t",
            BaseType::I16 => "int16_t",
            BaseType::I32 => "int32_t",
            BaseType::I64 => "int64_t",
            BaseType::Float => "float",
            BaseType::Double => "double",
            BaseType::Char => "char",
        }
    }

    /// Wire width of one element in bytes.
    pub fn width(&self) -> usize {
        match self {
            BaseType::U8 | BaseType::I8 | BaseType::Char => 1,
            BaseType::U16 | BaseType::I16 => 2,
            BaseType::U32 | BaseType::I32 | BaseType::Float => 4,
            BaseType::U64 | BaseType::I64 | BaseType::Double => 8,
        }
    }
}

/// Largest payload a header can announce (`payload_length` is a single byte).
pub const MAX_PAYLOAD_LEN: usize = 255;

impl FieldDef {
    /// Total bytes occupied on the wire (all array elements), `None` on overflow.
    pub fn wire_size(&self) -> Option<usize> {
        self.base_type.width().checked_mul(self.array_len.max(1))
    }
}

/// A field with its resolved wire offset. Fields keep declaration order.
#[derive(Debug, Clone)]
pub struct Field {
    pub def: FieldDef,
    pub offset: usize,
}

impl std::ops::Deref for Field {
    type Target = FieldDef;

    fn deref(&self) -> &FieldDef {
        &self.def
    }
}

#[derive(Debug, Clone)]
pub struct Message {
    pub id: u32,
    pub name: String,
    /// Declaration order (display order); offsets follow wire order.
    pub fields: Vec<Field>,
    pub wire_length: usize,
}

impl Message {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_offset(&self, name: &str) -> Option<usize> {
        self.field(name).map(|f| f.offset)
    }
}

/// Wire order of a message's fields: non-extension fields stably sorted by element
/// width (largest first), followed by extension fields in declaration order.
/// Returns indices into `fields`.
pub fn wire_order(fields: &[FieldDef]) -> Vec<usize> {
    let mut base: Vec<usize> = (0..fields.len()).filter(|&i| !fields[i].extension).collect();
    base.sort_by(|&a, &b| fields[b].base_type.width().cmp(&fields[a].base_type.width()));
    base.extend((0..fields.len()).filter(|&i| fields[i].extension));
    base
}

/// Offsets per field (declaration order) and the wire length. `None` when the
/// length does not fit a `usize`.
pub fn wire_layout(fields: &[FieldDef]) -> Option<(Vec<usize>, usize)> {
    let mut offsets = vec![0usize; fields.len()];
    let mut pos = 0usize;
    for i in wire_order(fields) {
        offsets[i] = pos;
        pos = pos.checked_add(fields[i].wire_size()?)?;
    }
    Some((offsets, pos))
}

/// Resolved protocol: layout computed, names and ids indexed.
#[derive(Debug, Clone)]
pub struct ResolvedProtocol {
    pub messages: Vec<Message>,
    pub enums: Vec<EnumDef>,
    messages_by_id: HashMap<u32, usize>,
    messages_by_name: HashMap<String, usize>,
    enums_by_name: HashMap<String, usize>,
}

impl ResolvedProtocol {
    pub fn resolve(protocol: Protocol) -> Result<Self, String> {
        let mut enums_by_name = HashMap::new();
        for (i, e) in protocol.enums.iter().enumerate() {
            if enums_by_name.insert(e.name.clone(), i).is_some() {
                return Err(format!("Duplicate enum name: {}", e.name));
            }
            let mut values = HashSet::new();
            for entry in &e.entries {
                if !values.insert(entry.value) {
                    return Err(format!(
                        "Duplicate value {} in enum {} ({})",
                        entry.value, e.name, entry.name
                    ));
                }
                let mut indices = HashSet::new();
                for p in &entry.params {
                    if !(1..=7).contains(&p.index) {
                        return Err(format!(
                            "{}: param index {} out of range 1..7",
                            entry.name, p.index
                        ));
                    }
                    if !indices.insert(p.index) {
                        return Err(format!("{}: duplicate param {}", entry.name, p.index));
                    }
                }
            }
        }
        let enum_known = |name: &Option<String>| match name {
            Some(n) => enums_by_name.contains_key(n),
            None => true,
        };
        for e in &protocol.enums {
            for entry in &e.entries {
                for p in &entry.params {
                    if !enum_known(&p.enum_name) {
                        return Err(format!(
                            "{} param {}: unknown enum {}",
                            entry.name,
                            p.index,
                            p.enum_name.as_deref().unwrap_or_default()
                        ));
                    }
                }
            }
        }

        let mut messages_by_id = HashMap::new();
        let mut messages_by_name = HashMap::new();
        let mut messages = Vec::with_capacity(protocol.messages.len());
        for (i, m) in protocol.messages.into_iter().enumerate() {
            if messages_by_id.insert(m.id, i).is_some() {
                return Err(format!("Duplicate message id: {}", m.id));
            }
            if messages_by_name.insert(m.name.clone(), i).is_some() {
                return Err(format!("Duplicate message name: {}", m.name));
            }
            let mut names = HashSet::new();
            for f in &m.fields {
                if !names.insert(f.name.as_str()) {
                    return Err(format!("{}: duplicate field {}", m.name, f.name));
                }
                if !enum_known(&f.enum_name) {
                    return Err(format!(
                        "{}.{}: unknown enum {}",
                        m.name,
                        f.name,
                        f.enum_name.as_deref().unwrap_or_default()
                    ));
                }
            }
            let (offsets, wire_length) = wire_layout(&m.fields)
                .filter(|(_, len)| *len <= MAX_PAYLOAD_LEN)
                .ok_or_else(|| format!("{}: payload longer than {} bytes", m.name, MAX_PAYLOAD_LEN))?;
            let fields = m
                .fields
                .into_iter()
                .zip(offsets)
                .map(|(def, offset)| Field { def, offset })
                .collect();
            messages.push(Message {
                id: m.id,
                name: m.name,
                fields,
                wire_length,
            });
        }

        Ok(ResolvedProtocol {
            messages,
            enums: protocol.enums,
            messages_by_id,
            messages_by_name,
            enums_by_name,
        })
    }

    pub fn get_message(&self, name: &str) -> Option<&Message> {
        self.messages_by_name.get(name).map(|&i| &self.messages[i])
    }

    pub fn get_message_by_id(&self, id: u32) -> Option<&Message> {
        self.messages_by_id.get(&id).map(|&i| &self.messages[i])
    }

    pub fn get_enum(&self, name: &str) -> Option<&EnumDef> {
        self.enums_by_name.get(name).map(|&i| &self.enums[i])
    }
}
