//! Definition checker: reports every semantic problem of a protocol definition at once.
//!
//! ## Rules
//!
//! - **unknown-enum-reference** (error): a field or command parameter names an undefined enum.
//! - **duplicate-enum-value** (error): two entries of one enum share a value.
//! - **duplicate-definition** (error): two messages share an id or a name, or two enums a name.
//! - **payload-too-large** (error): a message's fields need more than 255 payload bytes.
//! - **param-index-out-of-range** (error): command parameter index outside 1..=7, or repeated.
//! - **command-without-command-enum** (warning): a command-carrying message exists but the
//!   command enum is not defined, so no command names or parameter views are generated.
//! - **bitmask-non-power-of-two** (warning): bitmask entry that is neither zero, a single bit
//!   nor the end marker. It gets a name but no flag.
//! - **char-array-without-length** (warning): `char` field without `[n]` decodes as one byte.
//! - **enum-value-exceeds-field** (warning): an enum value does not fit the integer field using it.
//!
//! Run via the `lint_def` binary. Exit code 1 if any error-level findings.

use crate::ast::{wire_layout, BaseType, EnumDef, FieldDef, Protocol, MAX_PAYLOAD_LEN};
use crate::dissector::GeneratorConfig;
use crate::enums::{is_end_marker, is_power_of_two};
use std::collections::{HashMap, HashSet};

/// Severity of a lint finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// Identifies which rule produced the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LintRule {
    UnknownEnumReference,
    DuplicateEnumValue,
    DuplicateDefinition,
    PayloadTooLarge,
    ParamIndexOutOfRange,
    CommandWithoutCommandEnum,
    BitmaskNonPowerOfTwo,
    CharArrayWithoutLength,
    EnumValueExceedsField,
}

impl LintRule {
    pub fn id(&self) -> &'static str {
        match self {
            LintRule::UnknownEnumReference => "unknown-enum-reference",
            LintRule::DuplicateEnumValue => "duplicate-enum-value",
            LintRule::DuplicateDefinition => "duplicate-definition",
            LintRule::PayloadTooLarge => "payload-too-large",
            LintRule::ParamIndexOutOfRange => "param-index-out-of-range",
            LintRule::CommandWithoutCommandEnum => "command-without-command-enum",
            LintRule::BitmaskNonPowerOfTwo => "bitmask-non-power-of-two",
            LintRule::CharArrayWithoutLength => "char-array-without-length",
            LintRule::EnumValueExceedsField => "enum-value-exceeds-field",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            LintRule::UnknownEnumReference
            | LintRule::DuplicateEnumValue
            | LintRule::DuplicateDefinition
            | LintRule::PayloadTooLarge
            | LintRule::ParamIndexOutOfRange => Severity::Error,
            _ => Severity::Warning,
        }
    }
}

/// A single lint message with location (1-based; 0 when the subject was not found).
#[derive(Debug, Clone)]
pub struct LintMessage {
    pub line: usize,
    pub column: usize,
    pub rule: LintRule,
    pub severity: Severity,
    pub message: String,
    /// Identifier the finding is about, used to locate it in the source.
    pub subject: String,
}

fn finding(rule: LintRule, subject: &str, message: String) -> LintMessage {
    LintMessage {
        line: 0,
        column: 0,
        rule,
        severity: rule.severity(),
        message,
        subject: subject.to_string(),
    }
}

/// Largest value an integer field can hold, `None` for non-integer types.
fn field_max(bt: BaseType) -> Option<u64> {
    match bt {
        BaseType::U8 | BaseType::I8 => Some(u8::MAX as u64),
        BaseType::U16 | BaseType::I16 => Some(u16::MAX as u64),
        BaseType::U32 | BaseType::I32 => Some(u32::MAX as u64),
        BaseType::U64 | BaseType::I64 => Some(u64::MAX),
        BaseType::Float | BaseType::Double | BaseType::Char => None,
    }
}

fn check_enum(e: &EnumDef, enums: &HashMap<&str, &EnumDef>, out: &mut Vec<LintMessage>) {
    let mut seen: HashMap<u64, &str> = HashMap::new();
    for entry in &e.entries {
        if let Some(prev) = seen.insert(entry.value, &entry.name) {
            out.push(finding(
                LintRule::DuplicateEnumValue,
                &entry.name,
                format!("{}: value {} already used by {}", e.name, entry.value, prev),
            ));
        }
        if e.bitmask && entry.value != 0 && !is_power_of_two(entry.value) && !is_end_marker(&entry.name) {
            out.push(finding(
                LintRule::BitmaskNonPowerOfTwo,
                &entry.name,
                format!("{}: value {:#x} is not a single bit, no flag is shown for it", entry.name, entry.value),
            ));
        }
        let mut indices = HashSet::new();
        for p in &entry.params {
            if !(1..=7).contains(&p.index) || !indices.insert(p.index) {
                out.push(finding(
                    LintRule::ParamIndexOutOfRange,
                    &entry.name,
                    format!("{}: param index {} is out of range or repeated", entry.name, p.index),
                ));
            }
            if let Some(name) = &p.enum_name {
                if !enums.contains_key(name.as_str()) {
                    out.push(finding(
                        LintRule::UnknownEnumReference,
                        &entry.name,
                        format!("{} param {}: unknown enum {}", entry.name, p.index, name),
                    ));
                }
            }
        }
    }
}

fn check_field(message: &str, f: &FieldDef, enums: &HashMap<&str, &EnumDef>, out: &mut Vec<LintMessage>) {
    if f.base_type == BaseType::Char && f.array_len == 0 {
        out.push(finding(
            LintRule::CharArrayWithoutLength,
            &f.name,
            format!("{}.{}: char field without length decodes as a single character", message, f.name),
        ));
    }
    let Some(enum_name) = &f.enum_name else {
        return;
    };
    match enums.get(enum_name.as_str()) {
        None => out.push(finding(
            LintRule::UnknownEnumReference,
            &f.name,
            format!("{}.{}: unknown enum {}", message, f.name, enum_name),
        )),
        Some(e) => {
            let Some(max) = field_max(f.base_type) else {
                return;
            };
            if let Some(entry) = e
                .entries
                .iter()
                .find(|entry| entry.value > max && !is_end_marker(&entry.name))
            {
                out.push(finding(
                    LintRule::EnumValueExceedsField,
                    &f.name,
                    format!(
                        "{}.{}: {} = {} does not fit in {}",
                        message,
                        f.name,
                        entry.name,
                        entry.value,
                        f.base_type.token()
                    ),
                ));
            }
        }
    }
}

/// Check a parsed definition. Findings carry no location.
pub fn check(protocol: &Protocol, config: &GeneratorConfig) -> Vec<LintMessage> {
    let mut out = Vec::new();
    let mut enums: HashMap<&str, &EnumDef> = HashMap::new();
    for e in &protocol.enums {
        if enums.insert(&e.name, e).is_some() {
            out.push(finding(
                LintRule::DuplicateDefinition,
                &e.name,
                format!("enum {} defined twice", e.name),
            ));
        }
    }
    for e in &protocol.enums {
        check_enum(e, &enums, &mut out);
    }

    let mut ids: HashMap<u32, &str> = HashMap::new();
    let mut names = HashSet::new();
    for m in &protocol.messages {
        if let Some(prev) = ids.insert(m.id, &m.name) {
            out.push(finding(
                LintRule::DuplicateDefinition,
                &m.name,
                format!("message {}: id {} already used by {}", m.name, m.id, prev),
            ));
        }
        if !names.insert(m.name.as_str()) {
            out.push(finding(
                LintRule::DuplicateDefinition,
                &m.name,
                format!("message {} defined twice", m.name),
            ));
        }
        for f in &m.fields {
            check_field(&m.name, f, &enums, &mut out);
        }
        match wire_layout(&m.fields).map(|(_, len)| len) {
            Some(len) if len <= MAX_PAYLOAD_LEN => {}
            Some(len) => out.push(finding(
                LintRule::PayloadTooLarge,
                &m.name,
                format!("message {}: payload is {} bytes, at most {} fit a packet", m.name, len, MAX_PAYLOAD_LEN),
            )),
            None => out.push(finding(
                LintRule::PayloadTooLarge,
                &m.name,
                format!("message {}: payload size overflows", m.name),
            )),
        }
        let is_command_kind = config.command_kinds.iter().any(|k| k.name == m.name);
        let has_command_field = m.fields.iter().any(|f| f.name == config.command_field);
        if is_command_kind && has_command_field && !enums.contains_key(config.command_enum.as_str()) {
            out.push(finding(
                LintRule::CommandWithoutCommandEnum,
                &m.name,
                format!(
                    "message {} carries commands but enum {} is not defined",
                    m.name, config.command_enum
                ),
            ));
        }
    }
    out
}

/// 1-based (line, column) of the first whole-word occurrence of `word`.
fn locate(source: &str, word: &str) -> Option<(usize, usize)> {
    let is_ident = |c: char| c.is_ascii_alphanumeric() || c == '_';
    for (i, line) in source.lines().enumerate() {
        let mut from = 0;
        while let Some(pos) = line[from..].find(word) {
            let start = from + pos;
            let end = start + word.len();
            let before_ok = line[..start].chars().next_back().map_or(true, |c| !is_ident(c));
            let after_ok = line[end..].chars().next().map_or(true, |c| !is_ident(c));
            if before_ok && after_ok {
                return Some((i + 1, start + 1));
            }
            from = end;
        }
    }
    None
}

/// Parse and check definition source. Returns messages in line order.
pub fn lint(source: &str, config: &GeneratorConfig) -> Result<Vec<LintMessage>, String> {
    let protocol = crate::parser::parse(source)?;
    let mut messages = check(&protocol, config);
    for m in &mut messages {
        if let Some((line, column)) = locate(source, &m.subject) {
            m.line = line;
            m.column = column;
        }
    }
    messages.sort_by_key(|m| (m.line, m.column));
    Ok(messages)
}
