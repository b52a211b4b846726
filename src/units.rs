//! Unit annotations: human-readable suffixes derived from a field's physical unit.

use crate::value::Value;
use time::OffsetDateTime;

/// Microsecond values above this are absolute times (2^50 us, late 2005).
pub const TIME_USEC_THRESHOLD: u64 = 1 << 50;

/// Transform applied to a decoded value to produce a text suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitTransform {
    /// 1e7-scaled degrees.
    DegE7,
    /// Microseconds, absolute or relative.
    Microseconds,
    Radians,
    RadiansPerSecond,
}

impl UnitTransform {
    /// Look up the transform of a declared unit. Brackets are ignored (`[us]` is `us`).
    pub fn from_units(units: &str) -> Option<UnitTransform> {
        let unit: String = units.chars().filter(|&c| c != '[' && c != ']').collect();
        match unit.as_str() {
            "degE7" => Some(UnitTransform::DegE7),
            "us" => Some(UnitTransform::Microseconds),
            "rad" => Some(UnitTransform::Radians),
            "rad/s" => Some(UnitTransform::RadiansPerSecond),
            _ => None,
        }
    }

    /// Suffix for `value`; empty when the value has nothing to add.
    pub fn annotate(&self, value: &Value) -> String {
        match self {
            UnitTransform::DegE7 => match value.as_f64() {
                Some(v) => format!(" ({:.7} deg)", v / 1e7),
                None => String::new(),
            },
            UnitTransform::Microseconds => match value {
                Value::Float(_) | Value::Double(_) => {
                    let v = value.as_f64().unwrap_or(0.0);
                    if v < 1_000_000.0 {
                        String::new()
                    } else {
                        format!(" ({:.6} s)", v / 1_000_000.0)
                    }
                }
                _ => match (value.as_u64(), value.as_i64()) {
                    (Some(v), _) => time_usec_decode(v),
                    (None, Some(v)) if v >= 0 => time_usec_decode(v as u64),
                    _ => String::new(),
                },
            },
            UnitTransform::Radians => match value.as_f64() {
                Some(v) => format!(" ({} deg)", format_g(v.to_degrees())),
                None => String::new(),
            },
            UnitTransform::RadiansPerSecond => match value.as_f64() {
                Some(v) => format!(" ({} deg/s)", format_g(v.to_degrees())),
                None => String::new(),
            },
        }
    }
}

/// Render a microsecond count: absolute UTC time above [`TIME_USEC_THRESHOLD`],
/// nothing below one second, relative seconds otherwise.
pub fn time_usec_decode(value: u64) -> String {
    if value > TIME_USEC_THRESHOLD {
        let secs = (value / 1_000_000) as i64;
        let micros = value % 1_000_000;
        match OffsetDateTime::from_unix_timestamp(secs) {
            Ok(dt) => format!(" ({}.{:06} UTC)", format_datetime(&dt), micros),
            Err(_) => format!(" ({:.6} s)", value as f64 / 1_000_000.0),
        }
    } else if value < 1_000_000 {
        String::new()
    } else {
        format!(" ({:.6} s)", value as f64 / 1_000_000.0)
    }
}

/// Seconds since the Unix epoch as `YYYY-MM-DD HH:MM:SS.uuuuuu UTC`.
pub fn format_unix_time(secs: f64) -> String {
    let whole = secs.floor();
    let micros = ((secs - whole) * 1_000_000.0).round().min(999_999.0) as u32;
    match OffsetDateTime::from_unix_timestamp(whole as i64) {
        Ok(dt) => format!("{}.{:06} UTC", format_datetime(&dt), micros),
        Err(_) => format!("{:.6} s", secs),
    }
}

/// `YYYY-MM-DD HH:MM:SS`
pub fn format_datetime(dt: &OffsetDateTime) -> String {
    format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
        dt.year(),
        u8::from(dt.month()),
        dt.day(),
        dt.hour(),
        dt.minute(),
        dt.second()
    )
}

/// C `%g`: 6 significant digits, trailing zeros removed, exponent form for very
/// small or large magnitudes.
pub fn format_g(v: f64) -> String {
    if v.is_nan() {
        return "nan".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "inf".to_string() } else { "-inf".to_string() };
    }
    if v == 0.0 {
        return "0".to_string();
    }
    let sci = format!("{:.5e}", v);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m.to_string(), e.parse::<i32>().unwrap_or(0)),
        None => return sci,
    };
    if !(-4..6).contains(&exp) {
        let m = trim_fraction(&mantissa);
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", m, sign, exp.abs())
    } else {
        let decimals = (5 - exp).max(0) as usize;
        trim_fraction(&format!("{:.*}", decimals, v))
    }
}

fn trim_fraction(s: &str) -> String {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s.to_string()
    }
}
