//! Binary wire format for operations and responses
//!
//! Every message starts with its opcode byte. The rest of the layout depends
//! on the opcode and on the negotiated [`ProtocolVersion`]: fields listed in
//! [`WireField`] are simply absent at versions older than the one that
//! introduced them.
//!
//! Encoding an operation that sets a field the target version cannot carry is
//! an error rather than a silent downgrade. Results are the exception: fields
//! an older peer does not know about are dropped from responses.

mod buf;
mod ops;
mod results;
pub mod version;

pub use ops::{decode_operation, encode_operation};
pub use results::{decode_response, encode_response};
pub use version::{ProtocolVersion, WireField};

use partis_core::{Depth, Direction};

use crate::error::ProtocolError;
use crate::opcode::OpCode;
use crate::operation::{ReturnChoice, TtlUnit};

type WireResult<T> = std::result::Result<T, ProtocolError>;

/// Parse an opcode byte and check the version knows it
fn opcode_at(raw: u8, version: ProtocolVersion) -> WireResult<OpCode> {
    match OpCode::from_u8(raw) {
        Some(op) if op.introduced_in() <= version => Ok(op),
        _ => Err(ProtocolError::UnknownOpcode {
            opcode: raw,
            version: version.as_u8(),
        }),
    }
}

fn depth_to_u8(depth: Depth) -> u8 {
    match depth {
        Depth::Children => 0,
        Depth::ParentAndChildren => 1,
        Depth::Descendants => 2,
        Depth::ParentAndDescendants => 3,
    }
}

fn depth_from_u8(raw: u8) -> WireResult<Depth> {
    match raw {
        0 => Ok(Depth::Children),
        1 => Ok(Depth::ParentAndChildren),
        2 => Ok(Depth::Descendants),
        3 => Ok(Depth::ParentAndDescendants),
        other => Err(ProtocolError::invalid("depth", format!("unknown depth {}", other))),
    }
}

fn direction_to_u8(direction: Direction) -> u8 {
    match direction {
        Direction::Forward => 0,
        Direction::Reverse => 1,
        Direction::Unordered => 2,
    }
}

fn direction_from_u8(raw: u8) -> WireResult<Direction> {
    match raw {
        0 => Ok(Direction::Forward),
        1 => Ok(Direction::Reverse),
        2 => Ok(Direction::Unordered),
        other => Err(ProtocolError::invalid(
            "direction",
            format!("unknown direction {}", other),
        )),
    }
}

fn return_choice_to_u8(choice: ReturnChoice) -> u8 {
    match choice {
        ReturnChoice::None => 0,
        ReturnChoice::Version => 1,
        ReturnChoice::Value => 2,
        ReturnChoice::All => 3,
    }
}

fn return_choice_from_u8(raw: u8) -> WireResult<ReturnChoice> {
    match raw {
        0 => Ok(ReturnChoice::None),
        1 => Ok(ReturnChoice::Version),
        2 => Ok(ReturnChoice::Value),
        3 => Ok(ReturnChoice::All),
        other => Err(ProtocolError::invalid(
            "return_choice",
            format!("unknown return choice {}", other),
        )),
    }
}

fn ttl_unit_to_u8(unit: TtlUnit) -> u8 {
    match unit {
        TtlUnit::Hours => 0,
        TtlUnit::Days => 1,
    }
}

fn ttl_unit_from_u8(raw: u8) -> WireResult<TtlUnit> {
    match raw {
        0 => Ok(TtlUnit::Hours),
        1 => Ok(TtlUnit::Days),
        other => Err(ProtocolError::invalid("ttl.unit", format!("unknown unit {}", other))),
    }
}
