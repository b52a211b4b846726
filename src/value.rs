//! Decoded field values.

/// A single decoded scalar (one array element or one string).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    Float(f32),
    Double(f64),
    /// Fixed-capacity character field, NUL padding stripped.
    String(String),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::U8(x) => Some(*x as u64),
            Value::U16(x) => Some(*x as u64),
            Value::U32(x) => Some(*x as u64),
            Value::U64(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I8(x) => Some(*x as i64),
            Value::I16(x) => Some(*x as i64),
            Value::I32(x) => Some(*x as i64),
            Value::I64(x) => Some(*x),
            Value::U8(x) => Some(*x as i64),
            Value::U16(x) => Some(*x as i64),
            Value::U32(x) => Some(*x as i64),
            Value::U64(x) => Some(*x as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(x) => Some(*x as f64),
            Value::Double(x) => Some(*x),
            _ => self.as_i64().map(|v| v as f64),
        }
    }

    /// Numeric value as an unsigned lookup key (enum names, flag tests).
    /// Signed values are reinterpreted, floats truncated, as a uint32 display field would.
    pub fn as_lookup_key(&self) -> Option<u64> {
        match self {
            Value::U8(_) | Value::U16(_) | Value::U32(_) | Value::U64(_) => self.as_u64(),
            Value::I8(x) => Some(*x as u8 as u64),
            Value::I16(x) => Some(*x as u16 as u64),
            Value::I32(x) => Some(*x as u32 as u64),
            Value::I64(x) => Some(*x as u64),
            Value::Float(x) => Some(*x as u32 as u64),
            Value::Double(x) => Some(*x as u32 as u64),
            Value::String(_) | Value::Bytes(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}
