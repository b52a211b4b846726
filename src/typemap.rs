//! Type mapper: primitive field type to wire width, decode operation and value kind.

use crate::ast::{BaseType, FieldDef};
use crate::value::Value;
use byteorder::{ByteOrder, LittleEndian};

/// Abstract value type produced by a decode operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    String,
    Signed,
    Unsigned,
    Float,
}

/// How the bytes of one element are turned into a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeOp {
    /// Little-endian fixed-width integer.
    LeInt { width: usize, signed: bool },
    /// Little-endian IEEE float (4 or 8 bytes).
    LeFloat { width: usize },
    /// Raw fixed-length byte string.
    String { len: usize },
}

impl DecodeOp {
    pub fn width(&self) -> usize {
        match self {
            DecodeOp::LeInt { width, .. } | DecodeOp::LeFloat { width } => *width,
            DecodeOp::String { len } => *len,
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            DecodeOp::LeInt { signed: true, .. } => ValueKind::Signed,
            DecodeOp::LeInt { signed: false, .. } => ValueKind::Unsigned,
            DecodeOp::LeFloat { .. } => ValueKind::Float,
            DecodeOp::String { .. } => ValueKind::String,
        }
    }

    /// Decode exactly `self.width()` bytes. `bytes` must be at least that long.
    pub fn read(&self, bytes: &[u8]) -> Value {
        match *self {
            DecodeOp::LeInt { width: 1, signed: false } => Value::U8(bytes[0]),
            DecodeOp::LeInt { width: 1, signed: true } => Value::I8(bytes[0] as i8),
            DecodeOp::LeInt { width: 2, signed: false } => Value::U16(LittleEndian::read_u16(bytes)),
            DecodeOp::LeInt { width: 2, signed: true } => Value::I16(LittleEndian::read_i16(bytes)),
            DecodeOp::LeInt { width: 4, signed: false } => Value::U32(LittleEndian::read_u32(bytes)),
            DecodeOp::LeInt { width: 4, signed: true } => Value::I32(LittleEndian::read_i32(bytes)),
            DecodeOp::LeInt { signed: false, .. } => Value::U64(LittleEndian::read_u64(bytes)),
            DecodeOp::LeInt { signed: true, .. } => Value::I64(LittleEndian::read_i64(bytes)),
            DecodeOp::LeFloat { width: 4 } => Value::Float(LittleEndian::read_f32(bytes)),
            DecodeOp::LeFloat { .. } => Value::Double(LittleEndian::read_f64(bytes)),
            DecodeOp::String { len } => {
                let raw = &bytes[..len];
                let end = raw.iter().position(|&b| b == 0).unwrap_or(len);
                Value::String(String::from_utf8_lossy(&raw[..end]).into_owned())
            }
        }
    }
}

/// Per-element decode information of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldInfo {
    pub base_type: BaseType,
    pub op: DecodeOp,
    /// Bytes per element.
    pub size: usize,
    /// Number of independently decoded elements.
    pub count: usize,
}

pub fn decode_op(bt: BaseType) -> DecodeOp {
    match bt {
        BaseType::U8 | BaseType::U16 | BaseType::U32 | BaseType::U64 => DecodeOp::LeInt {
            width: bt.width(),
            signed: false,
        },
        BaseType::I8 | BaseType::I16 | BaseType::I32 | BaseType::I64 => DecodeOp::LeInt {
            width: bt.width(),
            signed: true,
        },
        BaseType::Float | BaseType::Double => DecodeOp::LeFloat { width: bt.width() },
        BaseType::Char => DecodeOp::String { len: 1 },
    }
}

/// Character arrays collapse to one string element whose size is the array length;
/// every other array length is a repetition count.
pub fn field_info(field: &FieldDef) -> FieldInfo {
    let count = field.array_len.max(1);
    match field.base_type {
        BaseType::Char => FieldInfo {
            base_type: BaseType::Char,
            op: DecodeOp::String { len: count },
            size: count,
            count: 1,
        },
        bt => FieldInfo {
            base_type: bt,
            op: decode_op(bt),
            size: bt.width(),
            count,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(bt: BaseType, array_len: usize) -> FieldDef {
        FieldDef {
            name: "f".into(),
            base_type: bt,
            array_len,
            units: None,
            enum_name: None,
            display: None,
            extension: false,
        }
    }

    #[test]
    fn char_array_is_one_string() {
        let info = field_info(&def(BaseType::Char, 16));
        assert_eq!(info.count, 1);
        assert_eq!(info.size, 16);
        assert_eq!(info.op.kind(), ValueKind::String);
        let mut bytes = b"HELLO".to_vec();
        bytes.resize(16, 0);
        assert_eq!(info.op.read(&bytes), Value::String("HELLO".into()));
    }

    #[test]
    fn numeric_array_repeats() {
        let info = field_info(&def(BaseType::U16, 4));
        assert_eq!((info.size, info.count), (2, 4));
        let scalar = field_info(&def(BaseType::Double, 0));
        assert_eq!((scalar.size, scalar.count), (8, 1));
    }

    #[test]
    fn reads_little_endian() {
        assert_eq!(decode_op(BaseType::I16).read(&[0xfe, 0xff]), Value::I16(-2));
        assert_eq!(decode_op(BaseType::U32).read(&[1, 0, 0, 0]), Value::U32(1));
        assert_eq!(
            decode_op(BaseType::Float).read(&1.5f32.to_le_bytes()),
            Value::Float(1.5)
        );
        assert_eq!(
            decode_op(BaseType::I64).read(&(-5i64).to_le_bytes()),
            Value::I64(-5)
        );
    }
}
