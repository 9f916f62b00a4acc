//! Y86-64 register file and condition codes.
//!
//! Fifteen 64-bit general-purpose registers, numbered 0-14. Register
//! `%rsp` (4) is the stack pointer used implicitly by `pushq`, `popq`,
//! `call` and `ret`. The encoding value 0xF means "no register".

use crate::word::{self, WORD_BITS};
use serde::{Serialize, Deserialize};

/// Number of general-purpose registers.
pub const REGISTER_COUNT: usize = 15;

/// Register nibble meaning "no register".
pub const NO_REGISTER: u8 = 0xF;

/// A general-purpose register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Register {
    Rax = 0,
    Rcx = 1,
    Rdx = 2,
    Rbx = 3,
    Rsp = 4,
    Rbp = 5,
    Rsi = 6,
    Rdi = 7,
    R8 = 8,
    R9 = 9,
    R10 = 10,
    R11 = 11,
    R12 = 12,
    R13 = 13,
    R14 = 14,
}

impl Register {
    /// All registers in index order.
    pub const ALL: [Register; REGISTER_COUNT] = [
        Register::Rax, Register::Rcx, Register::Rdx, Register::Rbx,
        Register::Rsp, Register::Rbp, Register::Rsi, Register::Rdi,
        Register::R8, Register::R9, Register::R10, Register::R11,
        Register::R12, Register::R13, Register::R14,
    ];

    /// The stack pointer.
    pub const STACK_POINTER: Register = Register::Rsp;

    /// Decode a register nibble. Returns `None` for 0xF and out-of-range values.
    pub fn from_nibble(nibble: u8) -> Option<Self> {
        Self::ALL.get(nibble as usize).copied()
    }

    /// Encoding nibble.
    #[inline]
    pub fn index(self) -> u8 {
        self as u8
    }

    /// Assembly name including the `%` sigil.
    pub fn name(self) -> &'static str {
        match self {
            Register::Rax => "%rax",
            Register::Rcx => "%rcx",
            Register::Rdx => "%rdx",
            Register::Rbx => "%rbx",
            Register::Rsp => "%rsp",
            Register::Rbp => "%rbp",
            Register::Rsi => "%rsi",
            Register::Rdi => "%rdi",
            Register::R8 => "%r8",
            Register::R9 => "%r9",
            Register::R10 => "%r10",
            Register::R11 => "%r11",
            Register::R12 => "%r12",
            Register::R13 => "%r13",
            Register::R14 => "%r14",
        }
    }

    /// Look up a register by its assembly name (`%rax`, case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|r| r.name().eq_ignore_ascii_case(name))
    }
}

impl std::fmt::Display for Register {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Condition codes set by `OPq` instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Flags {
    /// OF: signed overflow.
    pub overflow: bool,
    /// SF: result is negative.
    pub sign: bool,
    /// ZF: result is zero.
    pub zero: bool,
}

impl Flags {
    /// Flags describing an ALU result.
    pub fn from_result(result: u64, overflow: bool) -> Self {
        Self {
            overflow,
            sign: word::to_signed(result, WORD_BITS) < 0,
            zero: result == 0,
        }
    }
}

impl std::fmt::Display for Flags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "OF={} SF={} ZF={}",
            self.overflow as u8, self.sign as u8, self.zero as u8
        )
    }
}

/// The register file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    values: [u64; REGISTER_COUNT],
}

impl Registers {
    /// Create a register file with all values zeroed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset all registers to zero.
    pub fn reset(&mut self) {
        self.values = [0; REGISTER_COUNT];
    }

    #[inline]
    pub fn get(&self, reg: Register) -> u64 {
        self.values[reg as usize]
    }

    #[inline]
    pub fn set(&mut self, reg: Register, value: u64) {
        self.values[reg as usize] = value;
    }

    /// Current stack pointer.
    #[inline]
    pub fn sp(&self) -> u64 {
        self.get(Register::STACK_POINTER)
    }

    /// Register value interpreted as signed.
    pub fn signed(&self, reg: Register) -> i64 {
        word::to_signed(self.get(reg), WORD_BITS)
    }

    /// `(register, value)` pairs in index order.
    pub fn iter(&self) -> impl Iterator<Item = (Register, u64)> + '_ {
        Register::ALL.iter().map(move |&r| (r, self.get(r)))
    }

    /// Raw values in index order.
    pub fn as_array(&self) -> &[u64; REGISTER_COUNT] {
        &self.values
    }
}
