//! Disassembler for Y86-64 programs.
//!
//! Converts encoded instructions back to assembler syntax that
//! [`assemble`](crate::asm::assemble) accepts. Undecodable bytes come out
//! as `.byte` directives, so a listing reassembles to the same image.

use crate::cpu::decode::{decode, Instruction};
use crate::word::{to_signed, WORD_BITS};

/// Disassemble a single decoded instruction to text.
pub fn disassemble_instruction(instr: &Instruction) -> String {
    let name = instr.mnemonic();
    match *instr {
        Instruction::Halt | Instruction::Nop | Instruction::Ret => name,
        Instruction::Move { src, dst, .. } | Instruction::Op { src, dst, .. } => {
            format!("{} {}, {}", name, src, dst)
        }
        Instruction::Irmovq { value, dst } => {
            format!("{} ${}, {}", name, to_signed(value, WORD_BITS), dst)
        }
        Instruction::Rmmovq { src, base, disp } => {
            format!("{} {}, {}({})", name, src, to_signed(disp, WORD_BITS), base)
        }
        Instruction::Mrmovq { base, dst, disp } => {
            format!("{} {}({}), {}", name, to_signed(disp, WORD_BITS), base, dst)
        }
        Instruction::Jump { target, .. } | Instruction::Call { target } => {
            format!("{} {:#x}", name, target)
        }
        Instruction::Pushq { src } => format!("{} {}", name, src),
        Instruction::Popq { dst } => format!("{} {}", name, dst),
    }
}

/// Disassemble a byte image starting at address 0.
///
/// Bytes that do not decode are listed as `.byte` and skipped one at a time.
pub fn disassemble(bytes: &[u8]) -> String {
    let mut output = String::new();
    let mut pc = 0;

    while pc < bytes.len() {
        let (text, len) = match decode(&bytes[pc..]) {
            Ok(instr) => (disassemble_instruction(&instr), instr.len()),
            Err(_) => (format!(".byte {:#04x}", bytes[pc]), 1),
        };

        let raw: String = bytes[pc..pc + len].iter().map(|b| format!("{:02x}", b)).collect();
        output.push_str(&format!("0x{:03x}: {:<20} | {}\n", pc, raw, text));
        pc += len;
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::assemble;
    use crate::cpu::{AluOp, Condition, Register};

    #[test]
    fn test_disassemble_halt() {
        assert_eq!(disassemble_instruction(&Instruction::Halt), "halt");
    }

    #[test]
    fn test_disassemble_operands() {
        let irmovq = Instruction::Irmovq { value: u64::MAX, dst: Register::Rbx };
        assert_eq!(disassemble_instruction(&irmovq), "irmovq $-1, %rbx");

        let load = Instruction::Mrmovq { base: Register::Rsp, dst: Register::Rax, disp: 8 };
        assert_eq!(disassemble_instruction(&load), "mrmovq 8(%rsp), %rax");

        let op = Instruction::Op { op: AluOp::Xor, src: Register::R8, dst: Register::R9 };
        assert_eq!(disassemble_instruction(&op), "xorq %r8, %r9");

        let jump = Instruction::Jump { cond: Condition::LessEqual, target: 0x40 };
        assert_eq!(disassemble_instruction(&jump), "jle 0x40");
    }

    #[test]
    fn test_disassemble_reassembles() {
        let source = "irmovq $-3, %rax\nrmmovq %rax, -16(%rbp)\ncmovne %rax, %rcx\ncall 0x0\npopq %rdx\nhalt\n";
        let image = assemble(source).unwrap();

        let text: String = disassemble(image.bytes())
            .lines()
            .map(|l| l.split('|').nth(1).unwrap().trim().to_string() + "\n")
            .collect();

        assert_eq!(assemble(&text).unwrap().bytes(), image.bytes());
    }

    #[test]
    fn test_invalid_bytes_listed() {
        let listing = disassemble(&[0xc0, 0x10]);
        let lines: Vec<&str> = listing.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(".byte 0xc0"));
        assert!(lines[1].ends_with("nop"));

        let text: String = lines
            .iter()
            .map(|l| l.split('|').nth(1).unwrap().trim().to_string() + "\n")
            .collect();
        assert_eq!(assemble(&text).unwrap().bytes(), &[0xc0, 0x10]);
    }
}
