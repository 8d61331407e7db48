#![forbid(unsafe_code)]

//! Test harness and reference fixtures for xbind.
//!
//! - [`fixtures`]: notifying sources (`Person`, `Address`, `Playlist`), a
//!   write-counting `TextBlock` target, and compiled tables over them.
//! - [`virtual_list`]: a simulated virtualized list host that realizes,
//!   phases, and recycles containers.
//! - [`logging`]: opt-in `tracing` output for tests.

pub mod fixtures;
pub mod logging;
pub mod virtual_list;

pub use fixtures::{Address, Person, Playlist, RowTargets, TextBlock, person_row, person_row_table};
pub use logging::init_test_logging;
pub use virtual_list::{Container, ListStats, VirtualList};
