#![forbid(unsafe_code)]

//! Configuration errors of the binding runtime.
//!
//! Every variant indicates a mismatch between the generated binding table and
//! the runtime (or host) using it, never a runtime data condition. Hosts treat
//! them as fatal. Recoverable conditions (root type mismatch, stale weak
//! references, re-entrant evaluation) are not errors and never surface here.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Unknown connection | `connect` id not in the table | `Err`, target not recorded |
//! | Target type mismatch | Wrong element type for a connection | `Err`, target not recorded |
//! | Duplicate connection / slot | Table built twice with the same id | `build()` fails |
//! | Dangling slot | Slot writes to an undeclared connection | `build()` fails |

use std::fmt;

use crate::table::{ConnectionId, SlotId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingError {
    /// A connection id unknown to the compiled table.
    UnknownConnection {
        table: &'static str,
        connection: ConnectionId,
    },
    /// A target whose concrete type differs from the one the table declared.
    TargetTypeMismatch {
        table: &'static str,
        connection: ConnectionId,
        expected: &'static str,
    },
    /// The same connection id declared twice.
    DuplicateConnection {
        table: &'static str,
        connection: ConnectionId,
    },
    /// The same slot id declared twice.
    DuplicateSlot { table: &'static str, slot: SlotId },
    /// A slot writing to a connection the table never declared.
    DanglingSlot {
        table: &'static str,
        slot: SlotId,
        connection: ConnectionId,
    },
}

impl fmt::Display for BindingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownConnection { table, connection } => {
                write!(f, "{table}: unknown connection id {connection}")
            }
            Self::TargetTypeMismatch {
                table,
                connection,
                expected,
            } => write!(
                f,
                "{table}: connection {connection} expects a target of type {expected}"
            ),
            Self::DuplicateConnection { table, connection } => {
                write!(f, "{table}: connection id {connection} declared twice")
            }
            Self::DuplicateSlot { table, slot } => {
                write!(f, "{table}: slot id {slot} declared twice")
            }
            Self::DanglingSlot {
                table,
                slot,
                connection,
            } => write!(
                f,
                "{table}: slot {slot} writes to undeclared connection {connection}"
            ),
        }
    }
}

impl std::error::Error for BindingError {}
