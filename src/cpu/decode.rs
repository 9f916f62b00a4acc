//! Instruction decoder for the Y86-64.
//!
//! Every instruction starts with one byte holding the opcode (high nibble)
//! and function code (low nibble). Depending on the opcode it is followed by
//! a register byte (`rA` high nibble, `rB` low nibble) and/or an eight-byte
//! little-endian constant:
//!
//! ```text
//! halt            00
//! nop             10
//! rrmovq rA, rB   20 AB
//! cmovXX rA, rB   2f AB
//! irmovq V, rB    30 FB VVVVVVVVVVVVVVVV
//! rmmovq rA, D(rB) 40 AB DDDDDDDDDDDDDDDD
//! mrmovq D(rB), rA 50 AB DDDDDDDDDDDDDDDD
//! OPq rA, rB      6f AB
//! jXX Dest        7f DDDDDDDDDDDDDDDD
//! call Dest       80 DDDDDDDDDDDDDDDD
//! ret             90
//! pushq rA        A0 AF
//! popq rA         B0 AF
//! ```

use crate::cpu::memory::{Memory, MemoryError};
use crate::cpu::registers::{Flags, Register, NO_REGISTER};
use crate::word::WORD_BYTES;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Branch and conditional-move conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Condition {
    /// Unconditional.
    Always,
    /// `le`: ZF or SF != OF
    LessEqual,
    /// `l`: SF != OF
    Less,
    /// `e`: ZF
    Equal,
    /// `ne`: !ZF
    NotEqual,
    /// `ge`: ZF or SF == OF
    GreaterEqual,
    /// `g`: !ZF and SF == OF
    Greater,
}

impl Condition {
    pub const ALL: [Condition; 7] = [
        Condition::Always,
        Condition::LessEqual,
        Condition::Less,
        Condition::Equal,
        Condition::NotEqual,
        Condition::GreaterEqual,
        Condition::Greater,
    ];

    /// Create from a function code.
    pub fn from_function(function: u8) -> Option<Self> {
        Self::ALL.get(function as usize).copied()
    }

    /// Function code.
    pub fn function(self) -> u8 {
        self as u8
    }

    /// Mnemonic suffix (`le`, `g`, ...). Empty for [`Condition::Always`].
    pub fn suffix(self) -> &'static str {
        match self {
            Condition::Always => "",
            Condition::LessEqual => "le",
            Condition::Less => "l",
            Condition::Equal => "e",
            Condition::NotEqual => "ne",
            Condition::GreaterEqual => "ge",
            Condition::Greater => "g",
        }
    }

    /// Create from a mnemonic suffix.
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.suffix() == suffix)
    }

    /// Evaluate against the current condition codes.
    pub fn holds(self, flags: &Flags) -> bool {
        let Flags { overflow, sign, zero } = *flags;
        match self {
            Condition::Always => true,
            Condition::LessEqual => zero || (sign != overflow),
            Condition::Less => sign != overflow,
            Condition::Equal => zero,
            Condition::NotEqual => !zero,
            Condition::GreaterEqual => zero || (sign == overflow),
            Condition::Greater => !zero && (sign == overflow),
        }
    }
}

/// Operations performed by `OPq`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AluOp {
    Add,
    Sub,
    And,
    Xor,
}

impl AluOp {
    pub const ALL: [AluOp; 4] = [AluOp::Add, AluOp::Sub, AluOp::And, AluOp::Xor];

    pub fn from_function(function: u8) -> Option<Self> {
        Self::ALL.get(function as usize).copied()
    }

    pub fn function(self) -> u8 {
        self as u8
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            AluOp::Add => "addq",
            AluOp::Sub => "subq",
            AluOp::And => "andq",
            AluOp::Xor => "xorq",
        }
    }
}

/// Decoded Y86-64 instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    /// Stop the machine.
    Halt,

    /// Do nothing.
    Nop,

    /// `rrmovq` (`Always`) or `cmovXX`: if cond then dst := src
    Move { cond: Condition, src: Register, dst: Register },

    /// dst := value
    Irmovq { value: u64, dst: Register },

    /// M[base + disp] := src
    Rmmovq { src: Register, base: Register, disp: u64 },

    /// dst := M[base + disp]
    Mrmovq { base: Register, dst: Register, disp: u64 },

    /// dst := dst OP src, setting condition codes
    Op { op: AluOp, src: Register, dst: Register },

    /// `jmp` / `jXX`: if cond then PC := target
    Jump { cond: Condition, target: u64 },

    /// Push the return address and jump to target.
    Call { target: u64 },

    /// Pop the return address into PC.
    Ret,

    /// Push a register onto the stack.
    Pushq { src: Register },

    /// Pop the stack into a register.
    Popq { dst: Register },
}

/// Opcode values (high nibble of the first byte).
struct Opcode;

impl Opcode {
    const HALT: u8 = 0x0;
    const NOP: u8 = 0x1;
    const CMOV: u8 = 0x2;
    const IRMOVQ: u8 = 0x3;
    const RMMOVQ: u8 = 0x4;
    const MRMOVQ: u8 = 0x5;
    const OPQ: u8 = 0x6;
    const JXX: u8 = 0x7;
    const CALL: u8 = 0x8;
    const RET: u8 = 0x9;
    const PUSHQ: u8 = 0xA;
    const POPQ: u8 = 0xB;

    /// Encoded length of instructions with this opcode.
    fn length(opcode: u8) -> Option<usize> {
        match opcode {
            Self::HALT | Self::NOP | Self::RET => Some(1),
            Self::CMOV | Self::OPQ | Self::PUSHQ | Self::POPQ => Some(2),
            Self::JXX | Self::CALL => Some(9),
            Self::IRMOVQ | Self::RMMOVQ | Self::MRMOVQ => Some(10),
            _ => None,
        }
    }
}

impl Instruction {
    /// Encoded length in bytes.
    pub fn len(&self) -> usize {
        match self {
            Instruction::Halt | Instruction::Nop | Instruction::Ret => 1,
            Instruction::Move { .. }
            | Instruction::Op { .. }
            | Instruction::Pushq { .. }
            | Instruction::Popq { .. } => 2,
            Instruction::Jump { .. } | Instruction::Call { .. } => 9,
            Instruction::Irmovq { .. }
            | Instruction::Rmmovq { .. }
            | Instruction::Mrmovq { .. } => 10,
        }
    }

    /// Assembly mnemonic.
    pub fn mnemonic(&self) -> String {
        match self {
            Instruction::Halt => "halt".into(),
            Instruction::Nop => "nop".into(),
            Instruction::Move { cond: Condition::Always, .. } => "rrmovq".into(),
            Instruction::Move { cond, .. } => format!("cmov{}", cond.suffix()),
            Instruction::Irmovq { .. } => "irmovq".into(),
            Instruction::Rmmovq { .. } => "rmmovq".into(),
            Instruction::Mrmovq { .. } => "mrmovq".into(),
            Instruction::Op { op, .. } => op.mnemonic().into(),
            Instruction::Jump { cond: Condition::Always, .. } => "jmp".into(),
            Instruction::Jump { cond, .. } => format!("j{}", cond.suffix()),
            Instruction::Call { .. } => "call".into(),
            Instruction::Ret => "ret".into(),
            Instruction::Pushq { .. } => "pushq".into(),
            Instruction::Popq { .. } => "popq".into(),
        }
    }
}

fn register(nibble: u8) -> Result<Register, DecodeError> {
    Register::from_nibble(nibble).ok_or(DecodeError::InvalidRegister(nibble))
}

fn constant(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; WORD_BYTES];
    buf.copy_from_slice(&bytes[..WORD_BYTES]);
    u64::from_le_bytes(buf)
}

/// Decode the instruction at the start of `bytes`.
///
/// `bytes` may hold more than one instruction; only the first is decoded.
/// Unused register slots are ignored.
pub fn decode(bytes: &[u8]) -> Result<Instruction, DecodeError> {
    let first = *bytes.first().ok_or(DecodeError::Truncated { needed: 1, available: 0 })?;
    let opcode = first >> 4;
    let function = first & 0xF;

    let len = Opcode::length(opcode).ok_or(DecodeError::InvalidOpcode(opcode))?;
    if bytes.len() < len {
        return Err(DecodeError::Truncated { needed: len, available: bytes.len() });
    }

    let ra = bytes.get(1).map(|b| b >> 4).unwrap_or(NO_REGISTER);
    let rb = bytes.get(1).map(|b| b & 0xF).unwrap_or(NO_REGISTER);

    let invalid_function = DecodeError::InvalidFunction { opcode, function };
    let single = |instr: Instruction| {
        if function == 0 { Ok(instr) } else { Err(invalid_function.clone()) }
    };

    match opcode {
        Opcode::HALT => single(Instruction::Halt),
        Opcode::NOP => single(Instruction::Nop),
        Opcode::CMOV => {
            let cond = Condition::from_function(function).ok_or_else(|| invalid_function.clone())?;
            Ok(Instruction::Move { cond, src: register(ra)?, dst: register(rb)? })
        }
        Opcode::IRMOVQ => single(Instruction::Irmovq {
            value: constant(&bytes[2..]),
            dst: register(rb)?,
        }),
        Opcode::RMMOVQ => single(Instruction::Rmmovq {
            src: register(ra)?,
            base: register(rb)?,
            disp: constant(&bytes[2..]),
        }),
        Opcode::MRMOVQ => single(Instruction::Mrmovq {
            base: register(rb)?,
            dst: register(ra)?,
            disp: constant(&bytes[2..]),
        }),
        Opcode::OPQ => {
            let op = AluOp::from_function(function).ok_or_else(|| invalid_function.clone())?;
            Ok(Instruction::Op { op, src: register(ra)?, dst: register(rb)? })
        }
        Opcode::JXX => {
            let cond = Condition::from_function(function).ok_or_else(|| invalid_function.clone())?;
            Ok(Instruction::Jump { cond, target: constant(&bytes[1..]) })
        }
        Opcode::CALL => single(Instruction::Call { target: constant(&bytes[1..]) }),
        Opcode::RET => single(Instruction::Ret),
        Opcode::PUSHQ => single(Instruction::Pushq { src: register(ra)? }),
        Opcode::POPQ => single(Instruction::Popq { dst: register(ra)? }),
        _ => Err(DecodeError::InvalidOpcode(opcode)),
    }
}

/// Fetch and decode the instruction at `pc`.
///
/// Only the bytes the opcode calls for are fetched, so a short instruction
/// at the very end of memory decodes normally.
pub fn decode_at(mem: &Memory, pc: u64) -> Result<Instruction, DecodeError> {
    let first = mem.read_byte(pc)?;
    let len = Opcode::length(first >> 4).ok_or(DecodeError::InvalidOpcode(first >> 4))?;
    decode(mem.fetch(pc, len)?)
}

fn pack(ra: u8, rb: u8) -> u8 {
    (ra << 4) | rb
}

/// Encode an instruction to its byte representation.
pub fn encode(instr: &Instruction) -> Vec<u8> {
    let mut out = Vec::with_capacity(instr.len());
    match *instr {
        Instruction::Halt => out.push(Opcode::HALT << 4),
        Instruction::Nop => out.push(Opcode::NOP << 4),
        Instruction::Move { cond, src, dst } => {
            out.push((Opcode::CMOV << 4) | cond.function());
            out.push(pack(src.index(), dst.index()));
        }
        Instruction::Irmovq { value, dst } => {
            out.push(Opcode::IRMOVQ << 4);
            out.push(pack(NO_REGISTER, dst.index()));
            out.extend_from_slice(&value.to_le_bytes());
        }
        Instruction::Rmmovq { src, base, disp } => {
            out.push(Opcode::RMMOVQ << 4);
            out.push(pack(src.index(), base.index()));
            out.extend_from_slice(&disp.to_le_bytes());
        }
        Instruction::Mrmovq { base, dst, disp } => {
            out.push(Opcode::MRMOVQ << 4);
            out.push(pack(dst.index(), base.index()));
            out.extend_from_slice(&disp.to_le_bytes());
        }
        Instruction::Op { op, src, dst } => {
            out.push((Opcode::OPQ << 4) | op.function());
            out.push(pack(src.index(), dst.index()));
        }
        Instruction::Jump { cond, target } => {
            out.push((Opcode::JXX << 4) | cond.function());
            out.extend_from_slice(&target.to_le_bytes());
        }
        Instruction::Call { target } => {
            out.push(Opcode::CALL << 4);
            out.extend_from_slice(&target.to_le_bytes());
        }
        Instruction::Ret => out.push(Opcode::RET << 4),
        Instruction::Pushq { src } => {
            out.push(Opcode::PUSHQ << 4);
            out.push(pack(src.index(), NO_REGISTER));
        }
        Instruction::Popq { dst } => {
            out.push(Opcode::POPQ << 4);
            out.push(pack(dst.index(), NO_REGISTER));
        }
    }
    out
}

/// Errors that can occur during instruction decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("invalid opcode: {0:#x}")]
    InvalidOpcode(u8),

    #[error("invalid function code {function:#x} for opcode {opcode:#x}")]
    InvalidFunction { opcode: u8, function: u8 },

    #[error("invalid register specifier: {0:#x}")]
    InvalidRegister(u8),

    #[error("instruction needs {needed} bytes, only {available} available")]
    Truncated { needed: usize, available: usize },

    #[error("fetch failed: {0}")]
    Memory(#[from] MemoryError),
}

impl DecodeError {
    /// Whether this is a bad address rather than a bad instruction.
    pub fn is_address_fault(&self) -> bool {
        matches!(self, DecodeError::Memory(_) | DecodeError::Truncated { .. })
    }
}
