//! # chip8-driver
//!
//! ## Design
//!
//! * host-side driver only; the CHIP-8 machine itself sits behind the
//!   `Machine` trait and is never inspected
//! * time is driven by the display: one tick per refresh, a fixed budget of
//!   cycles per tick, one render per tick
//! * no wall-clock correction. a late tick does the same work as an early one
//! * everything runs on one thread; only the ROM fetch happens elsewhere and
//!   its result is polled for
//!
//! Model
//!
//! ```text
//! Session
//!  |-- machine (initialize once, load once, then cycles)
//!  |-- keypad state <- key mapper <- key events (between ticks)
//!  |-- rom loader (background fetch, polled each tick)
//!  |-- execution controller (stopped / running)
//!  |    |-- start: only once the ROM is in
//!  |    |-- stop: next tick boundary
//!  |    |-- step: one cycle now, render if it worked
//!  |    `-- tick: budget cycles, stop early on fault, render once
//!  `-- render trigger (draw, then diagnostics)
//!
//! main loop
//!   |-- input.read_events()   // keys, start/stop/step, quit
//!   |-- session.tick()
//!   `-- sleep until next frame (spin_sleep)
//! ```

pub mod config;
pub mod controller;
pub mod display;
pub mod error;
pub mod input;
pub mod keypad;
pub mod machine;
pub mod render;
pub mod rom;
pub mod session;
pub mod test_card;

pub use crate::config::{Cli, Config};
pub use crate::controller::{CycleBudget, RunState, TickOutcome};
pub use crate::error::{CommandError, LoadError, TransferError};
pub use crate::machine::Machine;
pub use crate::session::Session;
