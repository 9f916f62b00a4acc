//! Assemble and run complete programs.

use slog::{o, Drain, Logger};
use slog_term::{CompactFormat, TermDecorator};
use y86::asm::{format_image, parse_image};
use y86::{assemble, Cpu, MachineConfig, Register, RunOutcome, Status};

const ASUM: &str = include_str!("programs/asum.ys");
const MAX: &str = include_str!("programs/max.ys");
const SWAP: &str = include_str!("programs/swap.ys");

fn run_source(source: &str) -> Cpu {
    let image = assemble(source).expect("could not assemble the program");
    let mut cpu = Cpu::new();
    cpu.load_image(&image).expect("could not load the program");
    cpu.run();
    cpu
}

#[test]
fn test_array_sum() {
    let decorator = TermDecorator::new().build();
    let drain = CompactFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    let logger = Logger::root(drain, o!());

    let image = y86::asm::assemble_with_logger(ASUM, logger.clone()).unwrap();
    let mut cpu = Cpu::with_logger(MachineConfig::default(), logger);
    cpu.load_image(&image).unwrap();

    let report = cpu.run();
    assert_eq!(report.outcome, RunOutcome::Stopped(Status::Halted));
    assert_eq!(cpu.regs.get(Register::Rax), 0xabcd_abcd_abcd);
    assert_eq!(cpu.regs.sp(), 0x200);
    assert_eq!(cpu.pc, 19);
}

#[test]
fn test_max_with_conditional_moves() {
    let cpu = run_source(MAX);
    assert!(cpu.is_halted());
    assert_eq!(cpu.regs.get(Register::Rax), 12);
}

#[test]
fn test_swap_through_stack() {
    let image = assemble(SWAP).unwrap();
    let data = image.symbols["data"];
    assert_eq!(data % 8, 0);

    let mut cpu = Cpu::new();
    cpu.load_image(&image).unwrap();
    cpu.run();

    assert!(cpu.is_halted());
    assert_eq!(cpu.mem.read_word(data).unwrap() as i64, -222);
    assert_eq!(cpu.mem.read_word(data + 8).unwrap(), 111);
    assert_eq!(cpu.regs.sp(), 0x200);
}

#[test]
fn test_jump_over_halt() {
    let cpu = run_source("jmp target\nhalt\ntarget: irmovq $1, %rax\nhalt\n");

    assert_eq!(cpu.regs.get(Register::Rax), 1);
    assert_eq!(cpu.pc, 20);
    assert_eq!(cpu.status, Status::Halted);
}

#[test]
fn test_infinite_loop_hits_step_limit() {
    let image = assemble("loop: jmp loop\n").unwrap();
    let mut cpu = Cpu::with_config(MachineConfig { step_limit: 250, ..MachineConfig::default() });
    cpu.load_image(&image).unwrap();

    let report = cpu.run();
    assert_eq!(report.outcome, RunOutcome::StepLimitReached);
    assert_eq!(report.steps, 250);
    assert_eq!(cpu.status, Status::Running);
}

#[test]
fn test_jump_out_of_memory_faults() {
    let cpu = run_source("jmp 0x100000\n");

    assert_eq!(cpu.status, Status::InvalidAddress);
    assert_eq!(cpu.pc, 0x100000);
}

#[test]
fn test_data_executed_as_code_faults() {
    let cpu = run_source("irmovq $9, %rax\n.quad 0xff\n");

    assert_eq!(cpu.status, Status::InvalidInstruction);
    assert_eq!(cpu.pc, 10);
    assert_eq!(cpu.regs.get(Register::Rax), 9);
}

#[test]
fn test_listing_runs_like_source() {
    let image = assemble(ASUM).unwrap();
    let listing = format_image(&image);
    let reloaded = parse_image(&listing).unwrap();
    assert_eq!(reloaded.bytes(), image.bytes());

    let mut cpu = Cpu::new();
    cpu.load_image(&reloaded).unwrap();
    cpu.run();
    assert_eq!(cpu.regs.get(Register::Rax), 0xabcd_abcd_abcd);
}

#[test]
fn test_program_too_large_for_memory() {
    let image = assemble(".pos 0x2000\nhalt\n").unwrap();
    let mut cpu = Cpu::new();
    assert!(cpu.load_image(&image).is_err());
}
