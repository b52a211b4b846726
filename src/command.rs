//! Command parameter resolution.
//!
//! Command-carrying messages have seven generic parameter slots whose meaning depends on
//! the command id. For every labeled parameter of every command, two views are prepared:
//!
//! - `cmd_<CMD>_param<i>`: the float slot used by `COMMAND_LONG` / `MISSION_ITEM`;
//! - `cmd_<CMD>_<x|y|z>` (slots 5, 6, 7 only): the coordinate view used by `*_INT`
//!   variants, where x and y are `int32_t` and z stays `float`.
//!
//! Which view applies is decided once per (message, command) procedure, not per packet.

use crate::ast::{BaseType, EnumEntryDef};
use crate::template::{substitute, TemplateError};

/// A message kind that carries a command id field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandMessageKind {
    pub name: String,
    /// Carries the seven parameter slots (gets per-command procedures).
    pub carries_args: bool,
}

impl CommandMessageKind {
    pub fn new(name: &str, carries_args: bool) -> Self {
        CommandMessageKind {
            name: name.to_string(),
            carries_args,
        }
    }
}

pub fn default_command_kinds() -> Vec<CommandMessageKind> {
    vec![
        CommandMessageKind::new("COMMAND_INT", true),
        CommandMessageKind::new("COMMAND_LONG", true),
        CommandMessageKind::new("COMMAND_ACK", false),
        CommandMessageKind::new("COMMAND_CANCEL", false),
        CommandMessageKind::new("MISSION_ITEM", true),
        CommandMessageKind::new("MISSION_ITEM_INT", true),
    ]
}

/// Message kinds whose slots 5..7 are the integer coordinate view.
pub fn uses_coordinate_view(message_name: &str) -> bool {
    message_name.ends_with("_INT")
}

/// `x`, `y`, `z` for slots 5, 6, 7.
pub fn coordinate_letter(index: u8) -> Option<char> {
    match index {
        5 => Some('x'),
        6 => Some('y'),
        7 => Some('z'),
        _ => None,
    }
}

/// Parameter slot carried by a message field (`param1`..`param7`, `x`, `y`, `z`).
pub fn param_index_for_field(field_name: &str) -> Option<u8> {
    match field_name {
        "x" => Some(5),
        "y" => Some(6),
        "z" => Some(7),
        _ => field_name
            .strip_prefix("param")
            .and_then(|n| n.parse::<u8>().ok())
            .filter(|n| (1..=7).contains(n)),
    }
}

/// One descriptor to emit for a command parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSlot {
    pub index: u8,
    pub descriptor: String,
    pub label: String,
    /// `Float` for generic slots and z, `I32` for x and y.
    pub physical: BaseType,
    pub enum_name: Option<String>,
    pub units: Option<String>,
}

pub fn param_descriptor_name(command: &str, index: u8) -> Result<String, TemplateError> {
    substitute(
        "cmd_${pcname}_param${pindex}",
        &[("pcname", command), ("pindex", &index.to_string())],
    )
}

pub fn coordinate_descriptor_name(command: &str, letter: char) -> Result<String, TemplateError> {
    substitute(
        "cmd_${pcname}_${intname}",
        &[("pcname", command), ("intname", &letter.to_string())],
    )
}

/// Descriptor name a (message, command) procedure uses for parameter slot `index`.
pub fn slot_descriptor_for(
    message_name: &str,
    command: &str,
    index: u8,
) -> Result<String, TemplateError> {
    match coordinate_letter(index) {
        Some(letter) if uses_coordinate_view(message_name) => {
            coordinate_descriptor_name(command, letter)
        }
        _ => param_descriptor_name(command, index),
    }
}

/// All descriptors of one command: labeled params only, plus the coordinate view of 5..7.
pub fn resolve_command_params(command: &EnumEntryDef) -> Result<Vec<ParamSlot>, TemplateError> {
    let mut out = Vec::new();
    for p in command.params.iter().filter(|p| p.is_used()) {
        let label_text = p.label.as_deref().unwrap_or_default();
        let index = p.index.to_string();
        out.push(ParamSlot {
            index: p.index,
            descriptor: param_descriptor_name(&command.name, p.index)?,
            label: substitute(
                "param${pindex}: ${pname}",
                &[("pindex", &index), ("pname", label_text)],
            )?,
            physical: BaseType::Float,
            enum_name: p.enum_name.clone(),
            units: p.units.clone(),
        });
        if let Some(letter) = coordinate_letter(p.index) {
            let letter_text = letter.to_string();
            out.push(ParamSlot {
                index: p.index,
                descriptor: coordinate_descriptor_name(&command.name, letter)?,
                label: substitute(
                    "${intname}: ${pname}",
                    &[("intname", &letter_text), ("pname", label_text)],
                )?,
                physical: if p.index == 7 { BaseType::Float } else { BaseType::I32 },
                enum_name: p.enum_name.clone(),
                units: p.units.clone(),
            });
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::CommandParamDef;

    fn param(index: u8, label: Option<&str>) -> CommandParamDef {
        CommandParamDef {
            index,
            label: label.map(str::to_string),
            enum_name: None,
            units: None,
        }
    }

    fn waypoint() -> EnumEntryDef {
        EnumEntryDef {
            name: "MAV_CMD_NAV_WAYPOINT".into(),
            value: 16,
            params: vec![
                param(1, Some("Hold")),
                param(2, None),
                param(5, Some("Latitude")),
                param(6, Some("Longitude")),
                param(7, Some("Altitude")),
            ],
        }
    }

    #[test]
    fn unlabeled_slots_are_skipped() {
        let slots = resolve_command_params(&waypoint()).unwrap();
        assert!(slots.iter().all(|s| s.index != 2));
        assert_eq!(slots.len(), 1 + 2 * 3);
    }

    #[test]
    fn coordinate_view_types() {
        let slots = resolve_command_params(&waypoint()).unwrap();
        let by_name = |n: &str| slots.iter().find(|s| s.descriptor == n).unwrap().clone();
        assert_eq!(by_name("cmd_MAV_CMD_NAV_WAYPOINT_param5").physical, BaseType::Float);
        assert_eq!(by_name("cmd_MAV_CMD_NAV_WAYPOINT_x").physical, BaseType::I32);
        assert_eq!(by_name("cmd_MAV_CMD_NAV_WAYPOINT_y").physical, BaseType::I32);
        assert_eq!(by_name("cmd_MAV_CMD_NAV_WAYPOINT_z").physical, BaseType::Float);
        assert_eq!(by_name("cmd_MAV_CMD_NAV_WAYPOINT_x").label, "x: Latitude");
        assert_eq!(by_name("cmd_MAV_CMD_NAV_WAYPOINT_param1").label, "param1: Hold");
    }

    #[test]
    fn slot_selection_depends_on_message_kind() {
        assert_eq!(
            slot_descriptor_for("COMMAND_INT", "C", 5).unwrap(),
            "cmd_C_x"
        );
        assert_eq!(
            slot_descriptor_for("COMMAND_LONG", "C", 5).unwrap(),
            "cmd_C_param5"
        );
        assert_eq!(
            slot_descriptor_for("MISSION_ITEM_INT", "C", 3).unwrap(),
            "cmd_C_param3"
        );
    }

    #[test]
    fn field_names_map_to_slots() {
        assert_eq!(param_index_for_field("param4"), Some(4));
        assert_eq!(param_index_for_field("z"), Some(7));
        assert_eq!(param_index_for_field("param8"), None);
        assert_eq!(param_index_for_field("command"), None);
    }
}
