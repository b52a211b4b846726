//! The generated dissector: every lookup table, descriptor and decode procedure built
//! once from a resolved protocol, immutable afterwards.

use crate::ast::ResolvedProtocol;
use crate::command::{default_command_kinds, CommandMessageKind};
use crate::descriptor::{emit_command_params, emit_frame_fields, emit_message_fields, FieldRegistry, ValueNames};
use crate::dump::format_value;
use crate::enums::{is_end_marker, EnumTables};
use crate::frame::{dissect_buffer, Dissection, Version};
use crate::procedure::{emit_procedures, ProcedureTable};
use crate::template::TemplateError;
use crate::tree::{ByteRange, Columns, Node};
use crate::value::Value;
use std::collections::{BTreeMap, HashMap};

/// Generation settings.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Prefix of every filter abbreviation.
    pub protocol_abbrev: String,
    /// Enumeration holding the command ids.
    pub command_enum: String,
    /// Field carrying the command id in command-bearing messages.
    pub command_field: String,
    /// Enumeration naming the header's component id.
    pub component_enum: String,
    pub command_kinds: Vec<CommandMessageKind>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig {
            protocol_abbrev: "mavlink_proto".to_string(),
            command_enum: "MAV_CMD".to_string(),
            command_field: "command".to_string(),
            component_enum: "MAV_COMPONENT".to_string(),
            command_kinds: default_command_kinds(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("invalid protocol definition: {0}")]
    Definition(String),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error("duplicate descriptor name: {0}")]
    DuplicateDescriptor(String),
    #[error("unknown enum {0} referenced by {1}")]
    UnknownEnum(String, String),
}

pub struct Dissector {
    config: GeneratorConfig,
    registry: FieldRegistry,
    tables: EnumTables,
    procedures: ProcedureTable,
    message_names: HashMap<u32, String>,
    command_names: BTreeMap<u64, String>,
}

impl Dissector {
    pub fn generate(resolved: &ResolvedProtocol, config: &GeneratorConfig) -> Result<Dissector, GenerateError> {
        let tables = EnumTables::build(resolved);
        let mut registry = FieldRegistry::default();
        emit_frame_fields(&mut registry, &tables, config)?;

        let mut command_names = BTreeMap::new();
        if let Some(commands) = resolved.get_enum(&config.command_enum) {
            for cmd in commands.entries.iter().filter(|c| !is_end_marker(&c.name)) {
                emit_command_params(&mut registry, &tables, config, cmd)?;
                command_names.insert(cmd.value, cmd.name.clone());
            }
        }
        for message in &resolved.messages {
            emit_message_fields(&mut registry, &tables, config, message)?;
        }
        let procedures = emit_procedures(resolved, config)?;
        let message_names = resolved
            .messages
            .iter()
            .map(|m| (m.id, m.name.clone()))
            .collect();

        Ok(Dissector {
            config: config.clone(),
            registry,
            tables,
            procedures,
            message_names,
            command_names,
        })
    }

    /// Parse, resolve and generate in one step.
    pub fn from_source(source: &str, config: &GeneratorConfig) -> Result<Dissector, GenerateError> {
        let protocol = crate::parser::parse(source).map_err(GenerateError::Definition)?;
        let resolved = ResolvedProtocol::resolve(protocol).map_err(GenerateError::Definition)?;
        Dissector::generate(&resolved, config)
    }

    /// Decode the payload of message `msgid` at `offset` into `tree`. Returns `false`
    /// (and adds nothing) when no procedure is registered for the id.
    pub fn dissect_payload(
        &self,
        buffer: &[u8],
        tree: &mut Node,
        columns: &mut Columns,
        msgid: u32,
        offset: usize,
        limit: usize,
    ) -> bool {
        match self.procedures.get(msgid) {
            Some(procedure) => {
                procedure.run(self, buffer, tree, columns, offset, limit);
                true
            }
            None => false,
        }
    }

    /// Run the framing algorithm over one captured buffer.
    pub fn dissect(&self, buffer: &[u8]) -> Dissection {
        dissect_buffer(self, buffer)
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn registry(&self) -> &FieldRegistry {
        &self.registry
    }

    pub fn enum_tables(&self) -> &EnumTables {
        &self.tables
    }

    pub fn procedures(&self) -> &ProcedureTable {
        &self.procedures
    }

    pub fn message_name(&self, msgid: u32) -> Option<&str> {
        self.message_names.get(&msgid).map(String::as_str)
    }

    pub fn command_name(&self, command_id: u64) -> Option<&str> {
        self.command_names.get(&command_id).map(String::as_str)
    }

    pub fn value_name(&self, names: &ValueNames, value: &Value) -> Option<&str> {
        let key = value.as_lookup_key()?;
        match names {
            ValueNames::None => None,
            ValueNames::Enum(e) => self.tables.entry_name(e, key),
            ValueNames::Messages => self.message_name(u32::try_from(key).ok()?),
            ValueNames::Versions => u8::try_from(key).ok().and_then(Version::from_magic).map(|v| v.name()),
        }
    }

    /// Node for a fixed (header/trailer) descriptor.
    pub(crate) fn field_node(&self, name: &str, range: ByteRange, value: Value) -> Node {
        let text = match self.registry.get(name) {
            Some(desc) => {
                let shown = format_value(desc, &value, self.value_name(&desc.names, &value));
                format!("{}: {}", desc.label, shown)
            }
            None => name.to_string(),
        };
        Node::item(name, text, range, value)
    }
}
