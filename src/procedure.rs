//! Per-message decode procedures.
//!
//! A procedure is a flat list of field steps in display (declaration) order, each
//! with its wire offset, decode op and descriptor. Command-bearing messages get an
//! extra procedure per (message, command) pair whose parameter slots use the
//! command's labeled descriptors.

use crate::ast::{EnumEntryDef, Message, ResolvedProtocol};
use crate::command::{param_index_for_field, slot_descriptor_for, CommandMessageKind};
use crate::descriptor::message_field_name;
use crate::dissector::{Dissector, GenerateError, GeneratorConfig};
use crate::dump::{bit_pattern, format_value};
use crate::enums::is_end_marker;
use crate::tree::{ByteRange, Columns, Node};
use crate::typemap::{field_info, DecodeOp};
use crate::units::UnitTransform;
use crate::value::Value;
use byteorder::{ByteOrder, LittleEndian};
use std::borrow::Cow;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct FieldStep {
    pub descriptor: String,
    /// Offset from the payload start.
    pub offset: usize,
    pub op: DecodeOp,
    pub unit: Option<UnitTransform>,
}

/// What a procedure does with the command id field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandHandling {
    None,
    /// Append the command name to the info column.
    Announce { offset: usize },
    /// Announce, then hand over to the (message, command) procedure if there is one.
    Dispatch { offset: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodeProcedure {
    pub message_id: u32,
    pub message_name: String,
    /// Set on command-specific procedures.
    pub command_id: Option<u64>,
    pub wire_length: usize,
    pub command: CommandHandling,
    pub steps: Vec<FieldStep>,
}

#[derive(Debug, Clone, Default)]
pub struct ProcedureTable {
    messages: HashMap<u32, DecodeProcedure>,
    commands: HashMap<(u32, u64), DecodeProcedure>,
}

impl ProcedureTable {
    pub fn get(&self, message_id: u32) -> Option<&DecodeProcedure> {
        self.messages.get(&message_id)
    }

    pub fn get_command(&self, message_id: u32, command_id: u64) -> Option<&DecodeProcedure> {
        self.commands.get(&(message_id, command_id))
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn command_len(&self) -> usize {
        self.commands.len()
    }
}

fn command_kind<'a>(config: &'a GeneratorConfig, message: &Message) -> Option<&'a CommandMessageKind> {
    config.command_kinds.iter().find(|k| k.name == message.name)
}

fn steps_for(message: &Message, command: Option<&EnumEntryDef>) -> Result<Vec<FieldStep>, GenerateError> {
    let mut steps = Vec::new();
    for field in &message.fields {
        let info = field_info(field);
        let unit = field.units.as_deref().and_then(UnitTransform::from_units);
        let param = command.and_then(|cmd| {
            let index = param_index_for_field(&field.name)?;
            cmd.params.iter().find(|p| p.index == index && p.is_used())
        });
        for i in 0..info.count {
            let descriptor = match (command, param) {
                (Some(cmd), Some(p)) => slot_descriptor_for(&message.name, &cmd.name, p.index)?,
                _ => message_field_name(&message.name, &field.name, (info.count > 1).then_some(i))?,
            };
            steps.push(FieldStep {
                descriptor,
                offset: field.offset + i * info.size,
                op: info.op,
                unit,
            });
        }
    }
    Ok(steps)
}

/// Build the generic procedure of every message and the command-specific ones.
pub fn emit_procedures(
    resolved: &ResolvedProtocol,
    config: &GeneratorConfig,
) -> Result<ProcedureTable, GenerateError> {
    let commands: Vec<&EnumEntryDef> = resolved
        .get_enum(&config.command_enum)
        .map(|e| e.entries.iter().filter(|c| !is_end_marker(&c.name)).collect())
        .unwrap_or_default();
    let mut table = ProcedureTable::default();
    for message in &resolved.messages {
        let handling = match (command_kind(config, message), message.field(&config.command_field)) {
            (Some(kind), Some(field)) if !commands.is_empty() => {
                if kind.carries_args {
                    CommandHandling::Dispatch { offset: field.offset }
                } else {
                    CommandHandling::Announce { offset: field.offset }
                }
            }
            _ => CommandHandling::None,
        };
        if matches!(handling, CommandHandling::Dispatch { .. }) {
            for cmd in &commands {
                table.commands.insert(
                    (message.id, cmd.value),
                    DecodeProcedure {
                        message_id: message.id,
                        message_name: message.name.clone(),
                        command_id: Some(cmd.value),
                        wire_length: message.wire_length,
                        command: CommandHandling::None,
                        steps: steps_for(message, Some(cmd))?,
                    },
                );
            }
        }
        table.messages.insert(
            message.id,
            DecodeProcedure {
                message_id: message.id,
                message_name: message.name.clone(),
                command_id: None,
                wire_length: message.wire_length,
                command: handling,
                steps: steps_for(message, None)?,
            },
        );
    }
    Ok(table)
}

impl DecodeProcedure {
    /// Decode the payload at `offset` into `tree`. Bytes past `limit` read as zero.
    pub fn run(
        &self,
        dissector: &Dissector,
        buffer: &[u8],
        tree: &mut Node,
        columns: &mut Columns,
        offset: usize,
        limit: usize,
    ) {
        let limit = limit.min(buffer.len());
        let end = offset + self.wire_length;
        let padded: Cow<[u8]> = if end > limit {
            let mut bytes = buffer[..limit].to_vec();
            bytes.resize(end, 0);
            Cow::Owned(bytes)
        } else {
            Cow::Borrowed(buffer)
        };

        let cmd_offset = match self.command {
            CommandHandling::Announce { offset } | CommandHandling::Dispatch { offset } => Some(offset),
            CommandHandling::None => None,
        };
        if let Some(field_offset) = cmd_offset {
            let at = offset + field_offset;
            let cmd_id = padded
                .get(at..at + 2)
                .map(|b| LittleEndian::read_u16(b) as u64)
                .unwrap_or(0);
            if let Some(name) = dissector.command_name(cmd_id) {
                columns.info.append(": ");
                columns.info.append(name);
            }
            if let CommandHandling::Dispatch { .. } = self.command {
                if let Some(specific) = dissector.procedures().get_command(self.message_id, cmd_id) {
                    specific.run(dissector, buffer, tree, columns, offset, limit);
                    return;
                }
            }
        }

        for step in &self.steps {
            let start = offset + step.offset;
            let size = step.op.width();
            let value = step.op.read(&padded[start..start + size]);
            let Some(desc) = dissector.registry().get(&step.descriptor) else {
                continue;
            };
            let name = dissector.value_name(&desc.names, &value);
            let mut text = format!("{}: {}", desc.label, format_value(desc, &value, name));
            if let Some(unit) = step.unit {
                text.push_str(&unit.annotate(&value));
            }
            let range = ByteRange::new(start, size);
            let mut node = Node::item(&desc.name, text, range, value.clone());
            node.padded = start + size > limit;

            if let Some(set) = desc.flags.as_deref().and_then(|e| dissector.enum_tables().flags(e)) {
                let bits = value.as_lookup_key().unwrap_or(0);
                for flag in &set.flags {
                    let set_bit = bits & flag.mask != 0;
                    let flag_name = format!("{}_flag{}", desc.name, flag.name);
                    let mut child = Node::item(
                        &flag_name,
                        format!(
                            "{} = {}: {}",
                            bit_pattern(set.bits, flag.mask, bits),
                            flag.name,
                            if set_bit { "True" } else { "False" }
                        ),
                        range,
                        Value::U8(set_bit as u8),
                    );
                    child.padded = node.padded;
                    node.add(child);
                }
            }
            tree.add(node);
        }
    }
}
