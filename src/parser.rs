//! Parse protocol definition source into the model using PEST.

use crate::ast::*;
use pest::Parser;
use pest_derive::Parser as PestParser;

#[derive(PestParser)]
#[grammar = "grammar.pest"]
struct DefinitionParser;

/// Parse definition source into a [`Protocol`] (declaration order, no layout).
pub fn parse(source: &str) -> Result<Protocol, String> {
    let pairs = DefinitionParser::parse(Rule::protocol, source)
        .map_err(|e| format!("Parse error: {}", e))?;
    let pair = pairs.into_iter().next().ok_or("Empty parse")?;
    build_protocol(pair)
}

fn build_protocol(pair: pest::iterators::Pair<Rule>) -> Result<Protocol, String> {
    let mut enums = Vec::new();
    let mut messages = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::enum_section => enums.push(build_enum(inner)?),
            Rule::message_section => messages.push(build_message(inner)?),
            _ => {}
        }
    }
    Ok(Protocol { enums, messages })
}

// ==================== Enumerations ====================

fn build_enum(pair: pest::iterators::Pair<Rule>) -> Result<EnumDef, String> {
    let mut name = String::new();
    let mut bitmask = false;
    let mut entries = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::ident => name = inner.as_str().to_string(),
            Rule::bitmask_flag => bitmask = true,
            Rule::enum_entry => entries.push(build_enum_entry(inner)?),
            _ => {}
        }
    }
    if name.is_empty() {
        return Err("enum section: missing name".to_string());
    }
    Ok(EnumDef { name, bitmask, entries })
}

fn build_enum_entry(pair: pest::iterators::Pair<Rule>) -> Result<EnumEntryDef, String> {
    let mut name = String::new();
    let mut value = None;
    let mut params = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::ident => name = inner.as_str().to_string(),
            Rule::int_literal => value = Some(parse_int(inner.as_str())?),
            Rule::param_block => {
                for decl in inner.into_inner() {
                    if decl.as_rule() == Rule::param_decl {
                        params.push(build_param(decl)?);
                    }
                }
            }
            _ => {}
        }
    }
    let value = value.ok_or_else(|| format!("enum entry {}: missing value", name))?;
    Ok(EnumEntryDef { name, value, params })
}

fn build_param(pair: pest::iterators::Pair<Rule>) -> Result<CommandParamDef, String> {
    let mut index = None;
    let mut label = None;
    let mut enum_name = None;
    let mut units = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::dec_literal => {
                let n: u8 = inner.as_str().parse().map_err(|_| "param index")?;
                index = Some(n);
            }
            Rule::string_literal => label = Some(unquote(inner.as_str())),
            Rule::enum_attr => enum_name = Some(attr_ident(inner)?),
            Rule::units_attr => units = Some(attr_string(inner)?),
            _ => {}
        }
    }
    Ok(CommandParamDef {
        index: index.ok_or("param: missing index")?,
        label: label.filter(|l| !l.is_empty()),
        enum_name,
        units,
    })
}

// ==================== Messages ====================

fn build_message(pair: pest::iterators::Pair<Rule>) -> Result<MessageDef, String> {
    let mut name = String::new();
    let mut id = None;
    let mut fields = Vec::new();
    let mut in_extensions = false;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::ident => name = inner.as_str().to_string(),
            Rule::int_literal => {
                let v = parse_int(inner.as_str())?;
                let v = u32::try_from(v).map_err(|_| format!("message {}: id too large", name))?;
                if v > 0x00ff_ffff {
                    return Err(format!("message {}: id {} does not fit in 24 bits", name, v));
                }
                id = Some(v);
            }
            Rule::extensions_marker => in_extensions = true,
            Rule::field_decl => fields.push(build_field(inner, in_extensions)?),
            _ => {}
        }
    }
    let id = id.ok_or_else(|| format!("message {}: missing id", name))?;
    Ok(MessageDef { id, name, fields })
}

fn build_field(pair: pest::iterators::Pair<Rule>, extension: bool) -> Result<FieldDef, String> {
    let mut name = String::new();
    let mut base_type = None;
    let mut array_len = 0usize;
    let mut units = None;
    let mut enum_name = None;
    let mut display = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::ident => name = inner.as_str().to_string(),
            Rule::field_type => {
                for part in inner.into_inner() {
                    match part.as_rule() {
                        Rule::base_type => {
                            base_type = Some(
                                BaseType::from_token(part.as_str())
                                    .ok_or_else(|| format!("Unknown base type: {}", part.as_str()))?,
                            )
                        }
                        Rule::array_len => {
                            let n = part.into_inner().next().ok_or("array length")?;
                            array_len = n.as_str().parse().map_err(|_| "array length")?;
                        }
                        _ => {}
                    }
                }
            }
            Rule::units_attr => units = Some(attr_string(inner)?),
            Rule::enum_attr => enum_name = Some(attr_ident(inner)?),
            Rule::display_attr => display = Some(attr_string(inner)?),
            _ => {}
        }
    }
    Ok(FieldDef {
        base_type: base_type.ok_or_else(|| format!("field {}: missing type", name))?,
        name,
        array_len,
        units,
        enum_name,
        display,
        extension,
    })
}

// ==================== Literals ====================

fn attr_ident(pair: pest::iterators::Pair<Rule>) -> Result<String, String> {
    pair.into_inner()
        .next()
        .map(|p| p.as_str().to_string())
        .ok_or_else(|| "attribute: missing identifier".to_string())
}

fn attr_string(pair: pest::iterators::Pair<Rule>) -> Result<String, String> {
    pair.into_inner()
        .next()
        .map(|p| unquote(p.as_str()))
        .ok_or_else(|| "attribute: missing string".to_string())
}

fn unquote(s: &str) -> String {
    let s = s.trim();
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        s[1..s.len() - 1].replace("\\\"", "\"")
    } else {
        s.to_string()
    }
}

fn parse_int(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).map_err(|_| format!("Invalid hex literal: {}", s))
    } else {
        s.parse::<u64>().map_err(|_| format!("Invalid integer literal: {}", s))
    }
}
