//! # mavdissect: definition-driven MAVLink dissector
//!
//! Reads a protocol definition (messages, typed fields, enumerations, bitmasks, units,
//! command parameter metadata) and builds a [`Dissector`]: a set of field descriptors
//! and per-message decode procedures that turn captured MAVLink buffers into labeled
//! byte-range trees.
//!
//! ## Definition language
//!
//! ```text
//! enum MAV_MODE_FLAG bitmask {
//!     MAV_MODE_FLAG_SAFETY_ARMED = 128;
//!     MAV_MODE_FLAG_GUIDED_ENABLED = 8;
//! }
//!
//! enum MAV_CMD {
//!     MAV_CMD_NAV_WAYPOINT = 16 {
//!         param 1 "Hold" units "s";
//!         param 5 "Latitude";
//!         param 6 "Longitude";
//!         param 7 "Altitude" units "m";
//!     }
//! }
//!
//! message HEARTBEAT = 0 {
//!     custom_mode: uint32_t;
//!     base_mode: uint8_t enum MAV_MODE_FLAG display "bitmask";
//!     extensions;
//!     note: char[16];
//! }
//! ```
//!
//! Fields are laid out on the wire sorted by element width (largest first), extension
//! fields last; display order is declaration order.
//!
//! ## Usage
//!
//! ```no_run
//! use mavdissect::{Dissector, GeneratorConfig};
//!
//! let source = std::fs::read_to_string("defs/common.mavdef").unwrap();
//! let dissector = Dissector::from_source(&source, &GeneratorConfig::default()).unwrap();
//! let dissection = dissector.dissect(&[0xFE, 0x09, 0x00, 0x01, 0x01, 0x00]);
//! println!("{}", dissection.columns.info.as_str());
//! ```

pub mod ast;
pub mod capture;
pub mod command;
pub mod descriptor;
pub mod dissector;
pub mod dump;
pub mod enums;
pub mod frame;
pub mod lint;
pub mod parser;
pub mod procedure;
pub mod template;
pub mod tree;
pub mod typemap;
pub mod units;
pub mod value;

pub use ast::{Protocol, ResolvedProtocol};
pub use capture::{for_each_payload, CaptureError, CaptureFilter, CaptureStats, CapturedPayload};
pub use command::CommandMessageKind;
pub use dissector::{Dissector, GenerateError, GeneratorConfig};
pub use frame::{Dissection, FrameEvent, Header, Version};
pub use parser::parse;
pub use tree::{ByteRange, Columns, Node};
pub use value::Value;
