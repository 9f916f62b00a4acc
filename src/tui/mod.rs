//! TUI debugger for the Y86-64 emulator.
//!
//! Provides an interactive terminal-based debugger with:
//! - Register, flag and status view
//! - Word-granular memory view with the stack pointer marked
//! - Step/run/breakpoint controls
//! - Disassembly around the program counter

mod app;
mod ui;

pub use app::{DebuggerApp, run_debugger};
