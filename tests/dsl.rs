//! Definition language tests: syntax (parse success/failure) and semantics (resolve, layout).

use mavdissect::ast::BaseType;
use mavdissect::{parse, ResolvedProtocol};

// ==================== Syntax: valid programs ====================

#[test]
fn parse_empty_protocol() {
    let p = parse("").expect("empty protocol can parse");
    assert!(p.messages.is_empty());
    assert!(p.enums.is_empty());
}

#[test]
fn parse_minimal_message() {
    let p = parse("message PING = 4 { seq: uint32_t; }").expect("parse");
    assert_eq!(p.messages.len(), 1);
    assert_eq!(p.messages[0].name, "PING");
    assert_eq!(p.messages[0].id, 4);
    assert_eq!(p.messages[0].fields[0].name, "seq");
    assert_eq!(p.messages[0].fields[0].base_type, BaseType::U32);
}

#[test]
fn parse_every_base_type() {
    let src = r#"
message ALL = 1 {
    a: uint8_t;
    b: uint16_t;
    c: uint32_t;
    d: uint64_t;
    e: int8_t;
    f: int16_t;
    g: int32_t;
    h: int64_t;
    i: float;
    j: double;
    k: char[4];
    l: uint8_t_mavlink_version;
}
"#;
    let p = parse(src).expect("parse");
    let types: Vec<BaseType> = p.messages[0].fields.iter().map(|f| f.base_type).collect();
    assert_eq!(
        types,
        vec![
            BaseType::U8,
            BaseType::U16,
            BaseType::U32,
            BaseType::U64,
            BaseType::I8,
            BaseType::I16,
            BaseType::I32,
            BaseType::I64,
            BaseType::Float,
            BaseType::Double,
            BaseType::Char,
            BaseType::U8,
        ]
    );
    assert_eq!(p.messages[0].fields[10].array_len, 4);
}

#[test]
fn parse_comments() {
    let src = r#"
// line comment
message C = 2 {
    /* block
       comment */
    x: uint8_t; // trailing
}
"#;
    assert_eq!(parse(src).expect("parse").messages[0].fields.len(), 1);
}

#[test]
fn parse_field_attributes_in_any_order() {
    let src = r#"
enum E { E_A = 0; }
message M = 3 {
    a: uint16_t units "us" enum E;
    b: uint32_t display "bitmask" units "[ms]";
}
"#;
    let p = parse(src).expect("parse");
    let a = &p.messages[0].fields[0];
    assert_eq!(a.units.as_deref(), Some("us"));
    assert_eq!(a.enum_name.as_deref(), Some("E"));
    let b = &p.messages[0].fields[1];
    assert_eq!(b.display.as_deref(), Some("bitmask"));
    assert_eq!(b.units.as_deref(), Some("[ms]"));
}

#[test]
fn parse_extensions_marker() {
    let src = "message M = 5 { a: uint8_t; extensions; b: uint32_t; c: uint8_t; }";
    let p = parse(src).expect("parse");
    let ext: Vec<bool> = p.messages[0].fields.iter().map(|f| f.extension).collect();
    assert_eq!(ext, vec![false, true, true]);
}

#[test]
fn parse_bitmask_enum_with_hex_values() {
    let src = "enum F bitmask { F_A = 0x01; F_B = 0X10; F_END = 17; }";
    let p = parse(src).expect("parse");
    let e = &p.enums[0];
    assert!(e.bitmask);
    let values: Vec<u64> = e.entries.iter().map(|x| x.value).collect();
    assert_eq!(values, vec![1, 16, 17]);
}

#[test]
fn parse_command_params() {
    let src = r#"
enum MAV_CMD {
    MAV_CMD_NAV_WAYPOINT = 16 {
        param 1 "Hold" units "s";
        param 4 "Yaw" enum MAV_FRAME units "deg";
        param 5 "";
        param 6;
    }
    MAV_CMD_NAV_RETURN_TO_LAUNCH = 20 {}
    MAV_CMD_ENUM_END = 65536;
}
"#;
    let p = parse(src).expect("parse");
    let wp = &p.enums[0].entries[0];
    assert_eq!(wp.params.len(), 4);
    assert_eq!(wp.params[0].label.as_deref(), Some("Hold"));
    assert_eq!(wp.params[0].units.as_deref(), Some("s"));
    assert_eq!(wp.params[1].enum_name.as_deref(), Some("MAV_FRAME"));
    assert!(!wp.params[2].is_used());
    assert!(!wp.params[3].is_used());
    assert!(p.enums[0].entries[1].params.is_empty());
    assert_eq!(p.enums[0].entries[2].value, 65536);
}

#[test]
fn parse_escaped_quote_in_label() {
    let src = r#"enum C { C_A = 1 { param 1 "Say \"hi\""; } }"#;
    let p = parse(src).expect("parse");
    assert_eq!(p.enums[0].entries[0].params[0].label.as_deref(), Some("Say \"hi\""));
}

// ==================== Syntax: invalid programs ====================

#[test]
fn parse_rejects_missing_semicolon() {
    assert!(parse("message M = 1 { a: uint8_t }").is_err());
}

#[test]
fn parse_rejects_unknown_type() {
    let err = parse("message M = 1 { a: u8; }").unwrap_err();
    assert!(err.contains("Parse error"), "{}", err);
}

#[test]
fn parse_rejects_missing_id() {
    assert!(parse("message M { a: uint8_t; }").is_err());
}

#[test]
fn parse_rejects_id_wider_than_24_bits() {
    let err = parse("message M = 0x1000000 { a: uint8_t; }").unwrap_err();
    assert!(err.contains("24 bits"), "{}", err);
}

#[test]
fn parse_rejects_unterminated_block_comment() {
    assert!(parse("/* never closed message M = 1 { a: uint8_t; }").is_err());
}

// ==================== Semantics: resolve ====================

#[test]
fn resolve_computes_heartbeat_layout() {
    let src = r#"
message HEARTBEAT = 0 {
    type: uint8_t;
    autopilot: uint8_t;
    base_mode: uint8_t;
    custom_mode: uint32_t;
    system_status: uint8_t;
    mavlink_version: uint8_t_mavlink_version;
}
"#;
    let r = ResolvedProtocol::resolve(parse(src).unwrap()).expect("resolve");
    let m = r.get_message("HEARTBEAT").unwrap();
    assert_eq!(m.wire_length, 9);
    let offsets: Vec<usize> = m.fields.iter().map(|f| f.offset).collect();
    assert_eq!(offsets, vec![4, 5, 6, 0, 7, 8]);
    // Display order stays declaration order.
    assert_eq!(m.fields[0].name, "type");
}

#[test]
fn resolve_keeps_extensions_after_base_fields() {
    let src = r#"
message COMMAND_ACK = 77 {
    command: uint16_t;
    result: uint8_t;
    extensions;
    progress: uint8_t;
    result_param2: int32_t;
}
"#;
    let r = ResolvedProtocol::resolve(parse(src).unwrap()).unwrap();
    let m = r.get_message_by_id(77).unwrap();
    assert_eq!(m.field_offset("command"), Some(0));
    assert_eq!(m.field_offset("result"), Some(2));
    assert_eq!(m.field_offset("progress"), Some(3));
    assert_eq!(m.field_offset("result_param2"), Some(4));
    assert_eq!(m.wire_length, 8);
}

#[test]
fn resolve_sorts_arrays_by_element_width() {
    let src = r#"
message RC = 35 {
    port: uint8_t;
    chan: uint16_t[8];
    name: char[5];
    stamp: uint32_t;
}
"#;
    let r = ResolvedProtocol::resolve(parse(src).unwrap()).unwrap();
    let m = r.get_message("RC").unwrap();
    assert_eq!(m.field_offset("stamp"), Some(0));
    assert_eq!(m.field_offset("chan"), Some(4));
    assert_eq!(m.field_offset("port"), Some(20));
    assert_eq!(m.field_offset("name"), Some(21));
    assert_eq!(m.wire_length, 26);
}

#[test]
fn resolve_rejects_duplicate_message_name() {
    let src = "message A = 1 { x: uint8_t; } message A = 2 { x: uint8_t; }";
    let err = ResolvedProtocol::resolve(parse(src).unwrap()).unwrap_err();
    assert!(err.contains("Duplicate message name"), "{}", err);
}

#[test]
fn resolve_rejects_duplicate_field() {
    let src = "message A = 1 { x: uint8_t; x: uint16_t; }";
    assert!(ResolvedProtocol::resolve(parse(src).unwrap()).is_err());
}

#[test]
fn resolve_rejects_duplicate_enum_value() {
    let src = "enum E { E_A = 1; E_B = 1; }";
    let err = ResolvedProtocol::resolve(parse(src).unwrap()).unwrap_err();
    assert!(err.contains("Duplicate value"), "{}", err);
}

#[test]
fn resolve_rejects_param_index_out_of_range() {
    let src = r#"enum MAV_CMD { MAV_CMD_X = 1 { param 8 "Eight"; } }"#;
    let err = ResolvedProtocol::resolve(parse(src).unwrap()).unwrap_err();
    assert!(err.contains("out of range"), "{}", err);
}

#[test]
fn resolve_rejects_unknown_param_enum() {
    let src = r#"enum MAV_CMD { MAV_CMD_X = 1 { param 1 "Mode" enum NOPE; } }"#;
    let err = ResolvedProtocol::resolve(parse(src).unwrap()).unwrap_err();
    assert!(err.contains("unknown enum NOPE"), "{}", err);
}

#[test]
fn resolve_rejects_overflowing_array_length() {
    let src = "message A = 1 { a: uint64_t[4611686018427387904]; }";
    let p = parse(src).expect("any array length parses");
    let err = ResolvedProtocol::resolve(p).unwrap_err();
    assert!(err.contains("longer than 255"), "{}", err);
}

#[test]
fn resolve_bounds_payload_to_one_length_byte() {
    let full = "message A = 1 { a: uint32_t[63]; b: uint8_t[3]; }";
    let r = ResolvedProtocol::resolve(parse(full).unwrap()).expect("255 bytes fit");
    assert_eq!(r.get_message("A").unwrap().wire_length, 255);

    let over = "message A = 1 { a: uint32_t[63]; b: uint8_t[3]; extensions; c: uint8_t; }";
    assert!(ResolvedProtocol::resolve(parse(over).unwrap()).is_err());

    let huge = "message A = 1 { a: uint8_t[100000000]; }";
    assert!(ResolvedProtocol::resolve(parse(huge).unwrap()).is_err());
}

#[test]
fn common_definition_resolves() {
    let src = include_str!("../defs/common.mavdef");
    let r = ResolvedProtocol::resolve(parse(src).expect("parse")).expect("resolve");
    let lengths: Vec<(&str, usize)> = ["HEARTBEAT", "COMMAND_INT", "COMMAND_LONG", "MISSION_ITEM_INT", "COMMAND_ACK"]
        .iter()
        .map(|n| (*n, r.get_message(n).unwrap().wire_length))
        .collect();
    assert_eq!(
        lengths,
        vec![
            ("HEARTBEAT", 9),
            ("COMMAND_INT", 35),
            ("COMMAND_LONG", 33),
            ("MISSION_ITEM_INT", 38),
            ("COMMAND_ACK", 10),
        ]
    );
    let cmd = r.get_message("COMMAND_INT").unwrap();
    assert_eq!(cmd.field_offset("x"), Some(16));
    assert_eq!(cmd.field_offset("command"), Some(28));
    assert_eq!(cmd.field_offset("frame"), Some(32));
}

#[test]
fn common_definition_lints_clean() {
    let src = include_str!("../defs/common.mavdef");
    let findings = mavdissect::lint::lint(src, &mavdissect::GeneratorConfig::default()).unwrap();
    assert!(findings.is_empty(), "{:?}", findings);
}
