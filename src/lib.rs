//! # Y86-64 Emulator
//!
//! An emulator and assembler for the Y86-64 teaching architecture.
//!
//! Y86-64 is a simplified subset of x86-64: fifteen 64-bit registers,
//! three condition flags, a byte-addressable little-endian memory and a
//! closed set of twelve instruction families with fixed encodings.
//!
//! ```
//! use y86::{assemble, Cpu, Status};
//!
//! let image = assemble("irmovq $5, %rax\naddq %rax, %rax\nhalt\n").unwrap();
//! let mut cpu = Cpu::new();
//! cpu.load_image(&image).unwrap();
//! cpu.run();
//!
//! assert_eq!(cpu.status, Status::Halted);
//! assert_eq!(cpu.regs.get(y86::Register::Rax), 10);
//! ```

pub mod word;
pub mod config;
pub mod cpu;
pub mod asm;

#[cfg(feature = "tui")]
pub mod tui;

#[cfg(feature = "wasm")]
pub mod wasm;

// Re-export commonly used types
pub use config::{ConfigError, MachineConfig};
pub use cpu::{Cpu, CpuError, Flags, Instruction, Memory, Register, Registers, RunOutcome, RunReport, Status};
pub use asm::{assemble, disassemble, load_image, save_image, AssemblerError, ImageError, ProgramImage};

#[cfg(feature = "tui")]
pub use tui::run_debugger;
