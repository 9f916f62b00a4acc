//! Two-pass assembler for Y86-64 programs.
//!
//! Syntax:
//! ```text
//! # Comment
//!         .pos 0
//! main:   irmovq stack, %rsp      # labels may be used as immediates
//!         irmovq $10, %rdi
//!         call square
//!         halt
//! square: rrmovq %rdi, %rax
//!         mrmovq 8(%rsp), %rdx    # D(rB) memory operands
//!         ret
//!         .align 8
//! value:  .quad 0x1234            # 8-byte little-endian data
//!         .byte 0xc0              # single raw byte
//!         .pos 0x200
//! stack:
//! ```
//!
//! Pass 1 sizes every line and records label addresses; pass 2 encodes
//! each statement with every label resolved.

use crate::asm::image::{ProgramImage, SourceLine, MAX_IMAGE_SIZE};
use crate::cpu::decode::{encode, AluOp, Condition, Instruction};
use crate::cpu::Register;
use crate::word::{self, WORD_BITS, WORD_BYTES};
use slog::{debug, o, trace, Discard, Logger};
use std::collections::BTreeMap;
use thiserror::Error;

/// Assemble source code into a program image.
pub fn assemble(source: &str) -> Result<ProgramImage, AssemblerError> {
    assemble_with_logger(source, None)
}

/// Assemble source code, logging label handling to `logger`.
pub fn assemble_with_logger<L: Into<Option<Logger>>>(
    source: &str,
    logger: L,
) -> Result<ProgramImage, AssemblerError> {
    let logger = logger
        .into()
        .unwrap_or_else(|| Logger::root(Discard, o!()))
        .new(o!("stage" => "assembly"));

    let mut asm = Assembler::new(logger);
    asm.assemble(source)
}

/// Instruction families as written in source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mnemonic {
    Halt,
    Nop,
    Move(Condition),
    Irmovq,
    Rmmovq,
    Mrmovq,
    Op(AluOp),
    Jump(Condition),
    Call,
    Ret,
    Pushq,
    Popq,
}

impl Mnemonic {
    fn parse(name: &str) -> Option<Self> {
        let mnemonic = match name {
            "halt" => Mnemonic::Halt,
            "nop" => Mnemonic::Nop,
            "rrmovq" => Mnemonic::Move(Condition::Always),
            "irmovq" => Mnemonic::Irmovq,
            "rmmovq" => Mnemonic::Rmmovq,
            "mrmovq" => Mnemonic::Mrmovq,
            "jmp" => Mnemonic::Jump(Condition::Always),
            "call" => Mnemonic::Call,
            "ret" => Mnemonic::Ret,
            "pushq" => Mnemonic::Pushq,
            "popq" => Mnemonic::Popq,
            _ => {
                if let Some(op) = AluOp::ALL.iter().find(|op| op.mnemonic() == name) {
                    return Some(Mnemonic::Op(*op));
                }
                let (prefix, suffix) = if let Some(s) = name.strip_prefix("cmov") {
                    ("cmov", s)
                } else if let Some(s) = name.strip_prefix('j') {
                    ("j", s)
                } else {
                    return None;
                };
                let cond = Condition::from_suffix(suffix).filter(|c| *c != Condition::Always)?;
                return Some(if prefix == "cmov" {
                    Mnemonic::Move(cond)
                } else {
                    Mnemonic::Jump(cond)
                });
            }
        };
        Some(mnemonic)
    }

    /// Encoded length in bytes.
    fn len(self) -> usize {
        match self {
            Mnemonic::Halt | Mnemonic::Nop | Mnemonic::Ret => 1,
            Mnemonic::Move(_) | Mnemonic::Op(_) | Mnemonic::Pushq | Mnemonic::Popq => 2,
            Mnemonic::Jump(_) | Mnemonic::Call => 9,
            Mnemonic::Irmovq | Mnemonic::Rmmovq | Mnemonic::Mrmovq => 10,
        }
    }

    /// Number of operands expected.
    fn arity(self) -> usize {
        match self {
            Mnemonic::Halt | Mnemonic::Nop | Mnemonic::Ret => 0,
            Mnemonic::Jump(_) | Mnemonic::Call | Mnemonic::Pushq | Mnemonic::Popq => 1,
            _ => 2,
        }
    }
}

/// A line that emits bytes, kept for pass 2.
#[derive(Debug)]
enum Statement {
    Instruction(Mnemonic, Vec<String>),
    Quad(String),
    Byte(String),
    /// Labels, comments and location directives.
    Marker,
}

#[derive(Debug)]
struct Item {
    line: usize,
    address: u64,
    statement: Statement,
    text: String,
}

/// The assembler state.
struct Assembler {
    /// Location counter.
    address: u64,
    /// Symbol table (label -> address).
    symbols: BTreeMap<String, u64>,
    /// Statements in source order.
    items: Vec<Item>,
    logger: Logger,
}

impl Assembler {
    fn new(logger: Logger) -> Self {
        Self {
            address: 0,
            symbols: BTreeMap::new(),
            items: Vec::new(),
            logger,
        }
    }

    fn assemble(&mut self, source: &str) -> Result<ProgramImage, AssemblerError> {
        // Pass 1: size statements and collect labels
        for (line_num, line) in source.lines().enumerate() {
            self.process_line(line, line_num + 1)?;
        }

        // Pass 2: encode with labels resolved
        let mut image = ProgramImage::new();
        for item in &self.items {
            let bytes = match &item.statement {
                Statement::Instruction(mnemonic, operands) => {
                    encode(&self.build_instruction(*mnemonic, operands, item.line)?)
                }
                Statement::Quad(value) => self.value(value, item.line)?.to_le_bytes().to_vec(),
                Statement::Byte(value) => {
                    let byte = u8::try_from(self.value(value, item.line)?).map_err(|_| {
                        AssemblerError::ValueOutOfRange {
                            line: item.line,
                            value: value.clone(),
                        }
                    })?;
                    vec![byte]
                }
                Statement::Marker => Vec::new(),
            };

            image.write(item.address, &bytes).map_err(|e| AssemblerError::ValueOutOfRange {
                line: item.line,
                value: e.to_string(),
            })?;
            image.lines.push(SourceLine {
                address: item.address,
                len: bytes.len(),
                text: item.text.clone(),
            });
        }

        image.symbols = self.symbols.clone();
        debug!(self.logger, "assembled"; "bytes" => image.len(), "labels" => image.symbols.len());
        Ok(image)
    }

    fn process_line(&mut self, line: &str, line_num: usize) -> Result<(), AssemblerError> {
        let text = line.trim();
        if text.is_empty() {
            return Ok(());
        }

        // Remove comments
        let mut code = match text.find('#') {
            Some(idx) => text[..idx].trim(),
            None => text,
        };

        // Label definitions
        while let Some((head, rest)) = code.split_once(':') {
            let label = head.trim();
            if !is_identifier(label) {
                return Err(AssemblerError::SyntaxError {
                    line: line_num,
                    message: format!("invalid label '{}'", label),
                });
            }
            self.define_label(label, line_num)?;
            code = rest.trim();
        }

        let tokens: Vec<String> = code
            .replace(',', " ")
            .split_whitespace()
            .map(str::to_string)
            .collect();

        let address = self.address;
        let statement = match tokens.split_first() {
            None => Statement::Marker,
            Some((head, operands)) => self.process_statement(head, operands, line_num)?,
        };

        self.items.push(Item {
            line: line_num,
            address,
            statement,
            text: text.to_string(),
        });

        if self.address > MAX_IMAGE_SIZE {
            return Err(AssemblerError::ValueOutOfRange {
                line: line_num,
                value: format!("{:#x}", self.address),
            });
        }

        Ok(())
    }

    fn process_statement(
        &mut self,
        head: &str,
        operands: &[String],
        line_num: usize,
    ) -> Result<Statement, AssemblerError> {
        let name = head.to_lowercase();

        match name.as_str() {
            // Directives
            ".pos" => {
                let target = self.directive_operand(&name, operands, line_num)?;
                self.address = target;
                Ok(Statement::Marker)
            }

            ".align" => {
                let alignment = self.directive_operand(&name, operands, line_num)?;
                if alignment == 0 {
                    return Err(AssemblerError::ValueOutOfRange {
                        line: line_num,
                        value: "0".into(),
                    });
                }
                // An already-aligned address stays put.
                let remainder = self.address % alignment;
                if remainder != 0 {
                    self.address += alignment - remainder;
                }
                Ok(Statement::Marker)
            }

            ".quad" => {
                check_arity(&name, operands, 1, line_num)?;
                self.address += WORD_BYTES as u64;
                Ok(Statement::Quad(operands[0].clone()))
            }

            ".byte" => {
                check_arity(&name, operands, 1, line_num)?;
                self.address += 1;
                Ok(Statement::Byte(operands[0].clone()))
            }

            // Instructions
            _ => {
                let mnemonic = Mnemonic::parse(&name).ok_or_else(|| AssemblerError::UnknownMnemonic {
                    line: line_num,
                    mnemonic: head.to_string(),
                })?;
                check_arity(&name, operands, mnemonic.arity(), line_num)?;
                self.address += mnemonic.len() as u64;
                Ok(Statement::Instruction(mnemonic, operands.to_vec()))
            }
        }
    }

    /// Literal operand of `.pos` / `.align`. Labels are not allowed here.
    fn directive_operand(
        &self,
        name: &str,
        operands: &[String],
        line_num: usize,
    ) -> Result<u64, AssemblerError> {
        check_arity(name, operands, 1, line_num)?;
        parse_number(&operands[0], line_num)?.ok_or_else(|| AssemblerError::SyntaxError {
            line: line_num,
            message: format!("{} requires a numeric operand", name),
        })
    }

    fn define_label(&mut self, label: &str, line_num: usize) -> Result<(), AssemblerError> {
        if self.symbols.contains_key(label) {
            return Err(AssemblerError::DuplicateLabel {
                line: line_num,
                label: label.to_string(),
            });
        }
        trace!(self.logger, "define label"; "label" => label, "address" => self.address);
        self.symbols.insert(label.to_string(), self.address);
        Ok(())
    }

    fn build_instruction(
        &self,
        mnemonic: Mnemonic,
        operands: &[String],
        line_num: usize,
    ) -> Result<Instruction, AssemblerError> {
        let reg = |i: usize| parse_register(&operands[i], line_num);

        let instr = match mnemonic {
            Mnemonic::Halt => Instruction::Halt,
            Mnemonic::Nop => Instruction::Nop,
            Mnemonic::Ret => Instruction::Ret,
            Mnemonic::Move(cond) => Instruction::Move { cond, src: reg(0)?, dst: reg(1)? },
            Mnemonic::Irmovq => Instruction::Irmovq {
                value: self.value(&operands[0], line_num)?,
                dst: reg(1)?,
            },
            Mnemonic::Rmmovq => {
                let (disp, base) = self.memory_operand(&operands[1], line_num)?;
                Instruction::Rmmovq { src: reg(0)?, base, disp }
            }
            Mnemonic::Mrmovq => {
                let (disp, base) = self.memory_operand(&operands[0], line_num)?;
                Instruction::Mrmovq { base, dst: reg(1)?, disp }
            }
            Mnemonic::Op(op) => Instruction::Op { op, src: reg(0)?, dst: reg(1)? },
            Mnemonic::Jump(cond) => Instruction::Jump {
                cond,
                target: self.value(&operands[0], line_num)?,
            },
            Mnemonic::Call => Instruction::Call {
                target: self.value(&operands[0], line_num)?,
            },
            Mnemonic::Pushq => Instruction::Pushq { src: reg(0)? },
            Mnemonic::Popq => Instruction::Popq { dst: reg(0)? },
        };

        Ok(instr)
    }

    /// Resolve a numeric literal or label.
    fn value(&self, operand: &str, line_num: usize) -> Result<u64, AssemblerError> {
        if let Some(value) = parse_number(operand, line_num)? {
            return Ok(value);
        }

        let label = operand.trim_start_matches('$');
        if !is_identifier(label) {
            return Err(AssemblerError::SyntaxError {
                line: line_num,
                message: format!("expected a number or label, found '{}'", operand),
            });
        }

        let address = *self.symbols.get(label).ok_or_else(|| AssemblerError::UndefinedLabel {
            line: line_num,
            label: label.to_string(),
        })?;
        trace!(self.logger, "resolve label"; "label" => label, "address" => address, "line" => line_num);
        Ok(address)
    }

    /// Parse a `D(%reg)` operand into displacement and base register.
    fn memory_operand(&self, operand: &str, line_num: usize) -> Result<(u64, Register), AssemblerError> {
        let malformed = || AssemblerError::SyntaxError {
            line: line_num,
            message: format!("expected memory operand D(%reg), found '{}'", operand),
        };

        let (disp, rest) = operand.split_once('(').ok_or_else(malformed)?;
        let reg = rest.strip_suffix(')').ok_or_else(malformed)?;

        let disp = if disp.is_empty() { 0 } else { self.value(disp, line_num)? };
        Ok((disp, parse_register(reg, line_num)?))
    }
}

fn check_arity(name: &str, operands: &[String], expected: usize, line_num: usize) -> Result<(), AssemblerError> {
    if operands.len() != expected {
        return Err(AssemblerError::OperandCount {
            line: line_num,
            mnemonic: name.to_string(),
            expected,
            found: operands.len(),
        });
    }
    Ok(())
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn parse_register(name: &str, line_num: usize) -> Result<Register, AssemblerError> {
    Register::from_name(name).ok_or_else(|| AssemblerError::UnknownRegister {
        line: line_num,
        register: name.to_string(),
    })
}

/// Parse a decimal or `0x` hex literal with optional `$` and `-`.
///
/// Returns `Ok(None)` when the operand is not numeric (a label).
fn parse_number(operand: &str, line_num: usize) -> Result<Option<u64>, AssemblerError> {
    let body = operand.strip_prefix('$').unwrap_or(operand);
    let (negative, digits) = match body.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, body),
    };

    if !digits.starts_with(|c: char| c.is_ascii_digit()) {
        return Ok(None);
    }

    let out_of_range = || AssemblerError::ValueOutOfRange {
        line: line_num,
        value: operand.to_string(),
    };

    let magnitude = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => digits.parse::<u64>(),
    }
    .map_err(|_| out_of_range())?;

    if !negative {
        return Ok(Some(magnitude));
    }

    if magnitude > 1 << 63 {
        return Err(out_of_range());
    }
    Ok(Some(word::negate(magnitude, WORD_BITS)))
}

/// Errors that can occur during assembly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblerError {
    #[error("syntax error on line {line}: {message}")]
    SyntaxError { line: usize, message: String },

    #[error("unknown mnemonic on line {line}: {mnemonic}")]
    UnknownMnemonic { line: usize, mnemonic: String },

    #[error("unknown register on line {line}: {register}")]
    UnknownRegister { line: usize, register: String },

    #[error("undefined label on line {line}: {label}")]
    UndefinedLabel { line: usize, label: String },

    #[error("duplicate label on line {line}: {label}")]
    DuplicateLabel { line: usize, label: String },

    #[error("value out of range on line {line}: {value}")]
    ValueOutOfRange { line: usize, value: String },

    #[error("{mnemonic} on line {line} takes {expected} operand(s), found {found}")]
    OperandCount { line: usize, mnemonic: String, expected: usize, found: usize },
}

impl AssemblerError {
    /// Source line the error refers to.
    pub fn line(&self) -> usize {
        match self {
            AssemblerError::SyntaxError { line, .. }
            | AssemblerError::UnknownMnemonic { line, .. }
            | AssemblerError::UnknownRegister { line, .. }
            | AssemblerError::UndefinedLabel { line, .. }
            | AssemblerError::DuplicateLabel { line, .. }
            | AssemblerError::ValueOutOfRange { line, .. }
            | AssemblerError::OperandCount { line, .. } => *line,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assemble_simple() {
        let source = r#"
            # irmovq 5 into %rax and double it
            irmovq $5, %rax
            addq %rax, %rax
        "#;

        let image = assemble(source).unwrap();
        assert_eq!(
            image.bytes(),
            &[0x30, 0xf0, 0x05, 0, 0, 0, 0, 0, 0, 0, 0x60, 0x00]
        );
    }

    #[test]
    fn test_reference_encodings() {
        let source = r#"
            irmovq $5, %rax
            irmovq $10, %rbx
            subq %rbx, %rax
        "#;
        let image = assemble(source).unwrap();
        let expected: Vec<u8> = [
            "30f00500000000000000",
            "30f30a00000000000000",
            "6130",
        ]
        .concat()
        .as_bytes()
        .chunks(2)
        .map(|pair| u8::from_str_radix(std::str::from_utf8(pair).unwrap(), 16).unwrap())
        .collect();

        assert_eq!(image.bytes(), expected.as_slice());
    }

    #[test]
    fn test_assemble_with_labels() {
        let source = r#"
        start:
            jmp end
            halt
        end: irmovq end, %rax
            halt
        "#;

        let image = assemble(source).unwrap();
        assert_eq!(image.symbols["start"], 0);
        assert_eq!(image.symbols["end"], 10);
        assert_eq!(&image.bytes()[..2], &[0x70, 0x0a]);
        assert_eq!(image.bytes()[12], 0x0a);
        assert_eq!(image.len(), 21);
    }

    #[test]
    fn test_memory_operands() {
        let image = assemble("rmmovq %rcx, -8(%rbp)\nmrmovq (%rsp), %rdx\n").unwrap();
        let bytes = image.bytes();

        assert_eq!(&bytes[..2], &[0x40, 0x15]);
        assert_eq!(&bytes[2..10], &(-8i64).to_le_bytes());
        assert_eq!(&bytes[10..12], &[0x50, 0x24]);
        assert_eq!(&bytes[12..20], &[0; 8]);
    }

    #[test]
    fn test_stack_and_conditional_forms() {
        let image = assemble("pushq %rbp\npopq %r14\ncmovge %rsi, %rdi\njne 0x40\ncall 0x20\nret\n").unwrap();
        let bytes = image.bytes();

        assert_eq!(&bytes[..6], &[0xa0, 0x5f, 0xb0, 0xef, 0x25, 0x67]);
        assert_eq!(bytes[6], 0x74);
        assert_eq!(bytes[7], 0x40);
        assert_eq!(bytes[15], 0x80);
        assert_eq!(bytes[16], 0x20);
        assert_eq!(bytes[24], 0x90);
    }

    #[test]
    fn test_assemble_data() {
        let source = r#"
            .pos 0x10
        value:
            .quad -1
            .quad 0x1122334455667788
            .quad value
        "#;

        let image = assemble(source).unwrap();
        assert_eq!(image.len(), 0x28);
        assert_eq!(&image.bytes()[0x10..0x18], &[0xff; 8]);
        assert_eq!(image.bytes()[0x18], 0x88);
        assert_eq!(image.bytes()[0x20], 0x10);
    }

    #[test]
    fn test_assemble_bytes() {
        let image = assemble("tag: .byte 0xc0\n.byte 16\nhalt\n").unwrap();
        assert_eq!(image.bytes(), &[0xc0, 0x10, 0x00]);
        assert_eq!(image.symbols["tag"], 0);

        let err = assemble("nop\n.byte 0x100\n").unwrap_err();
        assert!(matches!(err, AssemblerError::ValueOutOfRange { line: 2, .. }));
    }

    #[test]
    fn test_align() {
        let source = r#"
            .pos 3
            .align 8
        a:
            .align 8
        b:
            nop
            .align 4
        c:
        "#;

        let image = assemble(source).unwrap();
        assert_eq!(image.symbols["a"], 8);
        assert_eq!(image.symbols["b"], 8);
        assert_eq!(image.symbols["c"], 12);
    }

    #[test]
    fn test_source_map() {
        let image = assemble("main: irmovq $1, %rax # one\n  halt\n").unwrap();

        assert_eq!(image.lines.len(), 2);
        assert_eq!(image.lines[0].len, 10);
        assert_eq!(image.lines[1].address, 10);
        assert_eq!(image.line_at(10).unwrap().text, "halt");
    }

    #[test]
    fn test_errors_carry_lines() {
        let err = assemble("nop\nfrob %rax\n").unwrap_err();
        assert!(matches!(err, AssemblerError::UnknownMnemonic { line: 2, .. }));

        let err = assemble("jmp nowhere\n").unwrap_err();
        assert_eq!(err, AssemblerError::UndefinedLabel { line: 1, label: "nowhere".into() });

        let err = assemble("rrmovq %rax, %r15\n").unwrap_err();
        assert!(matches!(err, AssemblerError::UnknownRegister { line: 1, .. }));

        let err = assemble("a:\na:\n").unwrap_err();
        assert!(matches!(err, AssemblerError::DuplicateLabel { line: 2, .. }));

        let err = assemble("addq %rax\n").unwrap_err();
        assert!(matches!(err, AssemblerError::OperandCount { expected: 2, found: 1, .. }));

        let err = assemble("irmovq $99999999999999999999, %rax\n").unwrap_err();
        assert_eq!(err.line(), 1);

        let err = assemble("mrmovq 8%rsp, %rax\n").unwrap_err();
        assert!(matches!(err, AssemblerError::SyntaxError { .. }));
    }

    #[test]
    fn test_negative_literals() {
        assert_eq!(parse_number("$-5", 1).unwrap(), Some(word::to_unsigned(-5, WORD_BITS)));
        assert_eq!(parse_number("-0x8000000000000000", 1).unwrap(), Some(1 << 63));
        assert!(parse_number("-0x8000000000000001", 1).is_err());
        assert_eq!(parse_number("loop", 1).unwrap(), None);
    }
}
