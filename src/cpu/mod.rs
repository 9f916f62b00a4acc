//! CPU emulation for the Y86-64.
//!
//! This module implements the machine state and execution engine:
//! - a flat byte-addressable memory with little-endian 8-byte words
//! - 15 general-purpose 64-bit registers, PC, status and OF/SF/ZF flags
//! - a closed instruction set decoded into [`Instruction`]

pub mod memory;
pub mod registers;
pub mod decode;
pub mod execute;

pub use memory::{Memory, MemoryError};
pub use registers::{Flags, Register, Registers};
pub use decode::{AluOp, Condition, DecodeError, Instruction};
pub use execute::{Cpu, CpuError, RunOutcome, RunReport, Status};
