//! CPU execution engine for the Y86-64.
//!
//! Implements the fetch-decode-execute cycle and all instruction behaviors.

use crate::config::MachineConfig;
use crate::cpu::{Memory, Registers};
use crate::cpu::decode::{self, AluOp, DecodeError, Instruction};
use crate::cpu::memory::MemoryError;
use crate::cpu::registers::{Flags, Register};
use crate::word::{self, WORD_BITS, WORD_BYTES};
use serde::{Serialize, Deserialize};
use slog::{debug, o, trace, Discard, Logger};
use thiserror::Error;

/// Machine status. Everything except `Running` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    /// Normal operation.
    Running,
    /// A `halt` instruction was executed.
    Halted,
    /// An access fell outside main memory.
    InvalidAddress,
    /// An unknown opcode, function code or register was encountered.
    InvalidInstruction,
}

impl Status {
    /// Short code as printed by the classic simulator.
    pub fn code(self) -> &'static str {
        match self {
            Status::Running => "AOK",
            Status::Halted => "HLT",
            Status::InvalidAddress => "ADR",
            Status::InvalidInstruction => "INS",
        }
    }
}

/// Why a bounded run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunOutcome {
    /// The machine reached a terminal status.
    Stopped(Status),
    /// The step budget ran out while the machine was still running.
    StepLimitReached,
}

/// Result of [`Cpu::run_limited`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Steps attempted during this run.
    pub steps: u64,
    pub outcome: RunOutcome,
}

fn discard_logger() -> Logger {
    Logger::root(Discard, o!())
}

/// The Y86-64 machine.
#[derive(Clone, Serialize, Deserialize)]
pub struct Cpu {
    /// General-purpose registers.
    pub regs: Registers,
    /// Main memory.
    pub mem: Memory,
    /// Address of the next instruction.
    pub pc: u64,
    /// Condition codes.
    pub flags: Flags,
    /// Current execution status.
    pub status: Status,
    /// Instructions attempted since construction or reset.
    pub steps: u64,
    config: MachineConfig,
    #[serde(skip, default = "discard_logger")]
    logger: Logger,
}

impl Cpu {
    /// Create a machine with the default configuration.
    pub fn new() -> Self {
        Self::with_config(MachineConfig::default())
    }

    /// Create a machine with zeroed state and `config.memory_size` bytes of memory.
    pub fn with_config(config: MachineConfig) -> Self {
        Self::with_logger(config, None)
    }

    /// Create a machine that logs to `logger`.
    pub fn with_logger<L: Into<Option<Logger>>>(config: MachineConfig, logger: L) -> Self {
        let logger = logger
            .into()
            .unwrap_or_else(discard_logger)
            .new(o!("stage" => "execution"));

        Self {
            regs: Registers::new(),
            mem: Memory::with_size(config.memory_size),
            pc: 0,
            flags: Flags::default(),
            status: Status::Running,
            steps: 0,
            config,
            logger,
        }
    }

    /// Reset the machine to its initial all-zero state.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.mem.clear();
        self.pc = 0;
        self.flags = Flags::default();
        self.status = Status::Running;
        self.steps = 0;
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    /// Load a byte image at address 0.
    pub fn load_bytes(&mut self, program: &[u8]) -> Result<(), MemoryError> {
        self.mem.load_program(0, program)?;
        debug!(self.logger, "program loaded"; "bytes" => program.len());
        Ok(())
    }

    /// Execute a single instruction.
    ///
    /// Returns the instruction that was executed. A fault moves the machine
    /// into the matching terminal status, leaves PC on the faulting
    /// instruction and is also returned as an error.
    pub fn step(&mut self) -> Result<Instruction, CpuError> {
        if self.status != Status::Running {
            return Err(CpuError::NotRunning(self.status));
        }

        let pc = self.pc;
        self.steps += 1;

        let instr = match decode::decode_at(&self.mem, pc) {
            Ok(instr) => instr,
            Err(source) => {
                let status = if source.is_address_fault() {
                    Status::InvalidAddress
                } else {
                    Status::InvalidInstruction
                };
                self.stop(status);
                return Err(CpuError::Decode { pc, source });
            }
        };

        trace!(self.logger, "step"; "pc" => pc, "instr" => ?instr);

        if let Err(source) = self.execute(instr) {
            self.stop(Status::InvalidAddress);
            return Err(CpuError::Memory { pc, source });
        }

        if self.status != Status::Running {
            self.stop(self.status);
        }

        Ok(instr)
    }

    /// Run for at most `max_steps` instructions.
    pub fn run_limited(&mut self, max_steps: u64) -> RunReport {
        self.run_observed(max_steps, |_, _, _| {})
    }

    /// Like [`Cpu::run_limited`], calling `observe` after every step with the
    /// machine, the PC the step started from and the step's result.
    pub fn run_observed<F>(&mut self, max_steps: u64, mut observe: F) -> RunReport
    where
        F: FnMut(&Cpu, u64, &Result<Instruction, CpuError>),
    {
        let mut steps = 0;

        while self.status == Status::Running && steps < max_steps {
            let pc = self.pc;
            // Faults are recorded in `status`, which ends the loop.
            let result = self.step();
            observe(self, pc, &result);
            steps += 1;
        }

        let outcome = if self.status == Status::Running {
            debug!(self.logger, "step limit reached"; "limit" => max_steps, "pc" => self.pc);
            RunOutcome::StepLimitReached
        } else {
            RunOutcome::Stopped(self.status)
        };

        RunReport { steps, outcome }
    }

    /// Run until a terminal status or the configured step limit.
    pub fn run(&mut self) -> RunReport {
        self.run_limited(self.config.step_limit)
    }

    fn stop(&mut self, status: Status) {
        self.status = status;
        debug!(self.logger, "machine stopped"; "status" => status.code(), "pc" => self.pc, "steps" => self.steps);
    }

    /// Execute a decoded instruction.
    ///
    /// Every fallible access happens before any state is committed.
    fn execute(&mut self, instr: Instruction) -> Result<(), MemoryError> {
        let next_pc = self.pc.wrapping_add(instr.len() as u64);

        match instr {
            Instruction::Halt => {
                self.status = Status::Halted;
                return Ok(());
            }

            Instruction::Nop => {}

            Instruction::Move { cond, src, dst } => {
                if cond.holds(&self.flags) {
                    let value = self.regs.get(src);
                    self.regs.set(dst, value);
                }
            }

            Instruction::Irmovq { value, dst } => {
                self.regs.set(dst, value);
            }

            Instruction::Rmmovq { src, base, disp } => {
                let address = self.regs.get(base).wrapping_add(disp);
                self.mem.write_word(self.regs.get(src), address)?;
            }

            Instruction::Mrmovq { base, dst, disp } => {
                let address = self.regs.get(base).wrapping_add(disp);
                let value = self.mem.read_word(address)?;
                self.regs.set(dst, value);
            }

            Instruction::Op { op, src, dst } => {
                let a = self.regs.get(src);
                let b = self.regs.get(dst);
                let (result, overflow) = match op {
                    AluOp::Add => word::add_overflowing(b, a, WORD_BITS),
                    AluOp::Sub => word::sub_overflowing(b, a, WORD_BITS),
                    AluOp::And => (b & a, false),
                    AluOp::Xor => (b ^ a, false),
                };
                self.regs.set(dst, result);
                self.flags = Flags::from_result(result, overflow);
            }

            Instruction::Jump { cond, target } => {
                self.pc = if cond.holds(&self.flags) { target } else { next_pc };
                return Ok(());
            }

            Instruction::Call { target } => {
                let sp = self.regs.sp().wrapping_sub(WORD_BYTES as u64);
                self.mem.write_word(next_pc, sp)?;
                self.regs.set(Register::Rsp, sp);
                self.pc = target;
                return Ok(());
            }

            Instruction::Ret => {
                let sp = self.regs.sp();
                let address = self.mem.read_word(sp)?;
                self.regs.set(Register::Rsp, sp.wrapping_add(WORD_BYTES as u64));
                self.pc = address;
                return Ok(());
            }

            Instruction::Pushq { src } => {
                let sp = self.regs.sp().wrapping_sub(WORD_BYTES as u64);
                // %rsp is decremented before the source is read.
                let value = if src == Register::Rsp { sp } else { self.regs.get(src) };
                self.mem.write_word(value, sp)?;
                self.regs.set(Register::Rsp, sp);
            }

            Instruction::Popq { dst } => {
                let sp = self.regs.sp();
                let value = self.mem.read_word(sp)?;
                self.regs.set(dst, value);
                // The increment lands after the load, so `popq %rsp` yields value + 8.
                let sp = self.regs.sp().wrapping_add(WORD_BYTES as u64);
                self.regs.set(Register::Rsp, sp);
            }
        }

        self.pc = next_pc;
        Ok(())
    }

    /// Check if the machine is halted.
    pub fn is_halted(&self) -> bool {
        self.status == Status::Halted
    }

    /// Check if the machine is running.
    pub fn is_running(&self) -> bool {
        self.status == Status::Running
    }

    /// Serialize the full machine state as JSON.
    pub fn snapshot_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("status", &self.status)
            .field("pc", &self.pc)
            .field("flags", &self.flags)
            .field("steps", &self.steps)
            .field("regs", &self.regs)
            .finish()
    }
}

/// Errors that can occur during execution.
#[derive(Debug, Clone, Error)]
pub enum CpuError {
    #[error("CPU not running: {0:?}")]
    NotRunning(Status),

    #[error("decode failed at {pc:#x}: {source}")]
    Decode { pc: u64, source: DecodeError },

    #[error("invalid address at {pc:#x}: {source}")]
    Memory { pc: u64, source: MemoryError },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::decode::{encode, Condition};

    fn make_program(instructions: &[Instruction]) -> Vec<u8> {
        instructions.iter().flat_map(encode).collect()
    }

    fn cpu_with(instructions: &[Instruction]) -> Cpu {
        let mut cpu = Cpu::new();
        cpu.load_bytes(&make_program(instructions)).unwrap();
        cpu
    }

    fn irmovq(value: u64, dst: Register) -> Instruction {
        Instruction::Irmovq { value, dst }
    }

    #[test]
    fn test_irmovq_single_step() {
        let mut cpu = cpu_with(&[irmovq(5, Register::Rax)]);

        cpu.step().unwrap();

        assert_eq!(cpu.regs.get(Register::Rax), 5);
        assert_eq!(cpu.pc, 10);
        assert_eq!(cpu.status, Status::Running);
    }

    #[test]
    fn test_halt_keeps_pc() {
        let mut cpu = cpu_with(&[Instruction::Halt]);

        assert_eq!(cpu.step().unwrap(), Instruction::Halt);

        assert!(cpu.is_halted());
        assert_eq!(cpu.pc, 0);
        assert!(matches!(cpu.step(), Err(CpuError::NotRunning(Status::Halted))));
    }

    #[test]
    fn test_addq() {
        let mut cpu = cpu_with(&[
            irmovq(5, Register::Rax),
            Instruction::Op { op: AluOp::Add, src: Register::Rax, dst: Register::Rax },
        ]);

        cpu.step().unwrap();
        cpu.step().unwrap();

        assert_eq!(cpu.regs.get(Register::Rax), 10);
        assert_eq!(cpu.pc, 12);
        assert_eq!(cpu.flags, Flags { overflow: false, sign: false, zero: false });
    }

    #[test]
    fn test_subq_dest_minus_src() {
        let mut cpu = cpu_with(&[
            irmovq(5, Register::Rax),
            irmovq(10, Register::Rbx),
            Instruction::Op { op: AluOp::Sub, src: Register::Rbx, dst: Register::Rax },
            Instruction::Halt,
        ]);

        cpu.run();

        assert_eq!(cpu.regs.signed(Register::Rax), -5);
        assert!(cpu.flags.sign);
        assert!(!cpu.flags.zero);
    }

    #[test]
    fn test_andq_xorq_clear_overflow() {
        let mut cpu = cpu_with(&[
            irmovq(1 << 62, Register::Rax),
            Instruction::Op { op: AluOp::Add, src: Register::Rax, dst: Register::Rax },
            irmovq(12, Register::Rbx),
            irmovq(5, Register::Rcx),
            Instruction::Op { op: AluOp::And, src: Register::Rbx, dst: Register::Rcx },
            irmovq(11, Register::Rdx),
            irmovq(21, Register::Rsi),
            Instruction::Op { op: AluOp::Xor, src: Register::Rsi, dst: Register::Rdx },
            Instruction::Halt,
        ]);

        cpu.step().unwrap();
        cpu.step().unwrap();
        assert!(cpu.flags.overflow);
        assert!(cpu.flags.sign);

        cpu.run();
        assert_eq!(cpu.regs.get(Register::Rcx), 4);
        assert_eq!(cpu.regs.get(Register::Rdx), 30);
        assert!(!cpu.flags.overflow);
    }

    #[test]
    fn test_xorq_sets_zero() {
        let mut cpu = cpu_with(&[
            irmovq(7, Register::Rax),
            Instruction::Op { op: AluOp::Xor, src: Register::Rax, dst: Register::Rax },
        ]);
        cpu.run_limited(2);
        assert!(cpu.flags.zero);
        assert_eq!(cpu.regs.get(Register::Rax), 0);
    }

    #[test]
    fn test_flags_untouched_by_moves() {
        let mut cpu = cpu_with(&[
            irmovq(0, Register::Rax),
            Instruction::Op { op: AluOp::Add, src: Register::Rax, dst: Register::Rax },
            irmovq(9, Register::Rbx),
            Instruction::Pushq { src: Register::Rbx },
            Instruction::Halt,
        ]);
        cpu.regs.set(Register::Rsp, 512);

        cpu.run();

        assert!(cpu.flags.zero);
    }

    #[test]
    fn test_conditional_move() {
        let mut cpu = cpu_with(&[
            irmovq(3, Register::Rax),
            irmovq(3, Register::Rbx),
            irmovq(42, Register::Rcx),
            Instruction::Op { op: AluOp::Sub, src: Register::Rbx, dst: Register::Rax },
            Instruction::Move { cond: Condition::Equal, src: Register::Rcx, dst: Register::Rdx },
            Instruction::Move { cond: Condition::NotEqual, src: Register::Rcx, dst: Register::Rsi },
            Instruction::Halt,
        ]);

        cpu.run();

        assert_eq!(cpu.regs.get(Register::Rdx), 42);
        assert_eq!(cpu.regs.get(Register::Rsi), 0);
    }

    #[test]
    fn test_rmmovq_mrmovq() {
        let mut cpu = cpu_with(&[
            irmovq(0x1122_3344_5566_7788, Register::Rax),
            irmovq(0x200, Register::Rbx),
            Instruction::Rmmovq { src: Register::Rax, base: Register::Rbx, disp: 8 },
            Instruction::Mrmovq { base: Register::Rbx, dst: Register::Rcx, disp: 8 },
            Instruction::Halt,
        ]);

        cpu.run();

        assert_eq!(cpu.mem.read_word(0x208).unwrap(), 0x1122_3344_5566_7788);
        assert_eq!(cpu.regs.get(Register::Rcx), 0x1122_3344_5566_7788);
    }

    #[test]
    fn test_negative_displacement() {
        let mut cpu = cpu_with(&[
            irmovq(0x210, Register::Rbx),
            irmovq(77, Register::Rax),
            Instruction::Rmmovq { src: Register::Rax, base: Register::Rbx, disp: word::to_unsigned(-16, WORD_BITS) },
            Instruction::Halt,
        ]);

        cpu.run();

        assert_eq!(cpu.mem.read_word(0x200).unwrap(), 77);
    }

    #[test]
    fn test_not_taken_jump_advances_nine() {
        let mut cpu = cpu_with(&[
            Instruction::Jump { cond: Condition::Equal, target: 0x100 },
            Instruction::Halt,
        ]);

        cpu.step().unwrap();

        assert_eq!(cpu.pc, 9);
    }

    #[test]
    fn test_call_ret_restores_stack() {
        // 0x00: irmovq $0x400, %rsp
        // 0x0a: call 0x14
        // 0x13: halt
        // 0x14: irmovq $1, %rax
        // 0x1e: ret
        let mut cpu = cpu_with(&[
            irmovq(0x400, Register::Rsp),
            Instruction::Call { target: 0x14 },
            Instruction::Halt,
            irmovq(1, Register::Rax),
            Instruction::Ret,
        ]);

        cpu.step().unwrap();
        cpu.step().unwrap();
        assert_eq!(cpu.pc, 0x14);
        assert_eq!(cpu.regs.sp(), 0x3f8);
        assert_eq!(cpu.mem.read_word(0x3f8).unwrap(), 0x13);

        cpu.step().unwrap();
        cpu.step().unwrap();
        assert_eq!(cpu.pc, 0x13);
        assert_eq!(cpu.regs.sp(), 0x400);

        let report = cpu.run();
        assert_eq!(report.outcome, RunOutcome::Stopped(Status::Halted));
        assert_eq!(cpu.regs.get(Register::Rax), 1);
    }

    #[test]
    fn test_push_pop() {
        let mut cpu = cpu_with(&[
            irmovq(0x400, Register::Rsp),
            irmovq(99, Register::Rax),
            Instruction::Pushq { src: Register::Rax },
            Instruction::Popq { dst: Register::Rbx },
            Instruction::Halt,
        ]);

        cpu.run();

        assert_eq!(cpu.regs.get(Register::Rbx), 99);
        assert_eq!(cpu.regs.sp(), 0x400);
        assert_eq!(cpu.mem.read_word(0x3f8).unwrap(), 99);
    }

    #[test]
    fn test_push_pop_stack_pointer() {
        let mut cpu = cpu_with(&[
            irmovq(0x400, Register::Rsp),
            Instruction::Pushq { src: Register::Rsp },
            Instruction::Popq { dst: Register::Rsp },
            Instruction::Halt,
        ]);

        cpu.step().unwrap();
        cpu.step().unwrap();
        assert_eq!(cpu.mem.read_word(0x3f8).unwrap(), 0x3f8);

        cpu.step().unwrap();
        assert_eq!(cpu.regs.sp(), 0x400);
    }

    #[test]
    fn test_invalid_opcode() {
        let mut cpu = Cpu::new();
        cpu.load_bytes(&[0x10, 0xf0]).unwrap();

        cpu.step().unwrap();
        let err = cpu.step().unwrap_err();

        assert!(matches!(err, CpuError::Decode { pc: 1, .. }));
        assert_eq!(cpu.status, Status::InvalidInstruction);
        assert_eq!(cpu.pc, 1);
    }

    #[test]
    fn test_out_of_bounds_store() {
        let mut cpu = cpu_with(&[
            irmovq(5000, Register::Rbx),
            Instruction::Rmmovq { src: Register::Rax, base: Register::Rbx, disp: 0 },
            Instruction::Halt,
        ]);

        let report = cpu.run();

        assert_eq!(report.outcome, RunOutcome::Stopped(Status::InvalidAddress));
        assert_eq!(report.steps, 2);
        assert_eq!(cpu.pc, 10);
    }

    #[test]
    fn test_failed_push_keeps_stack_pointer() {
        // %rsp = 0 wraps below zero.
        let mut cpu = cpu_with(&[Instruction::Pushq { src: Register::Rax }]);

        assert!(cpu.step().is_err());

        assert_eq!(cpu.status, Status::InvalidAddress);
        assert_eq!(cpu.regs.sp(), 0);
    }

    #[test]
    fn test_failed_ret_commits_nothing() {
        let mut cpu = cpu_with(&[Instruction::Ret]);
        let sp = cpu.mem.size() as u64 - 4;
        cpu.regs.set(Register::Rsp, sp);

        assert!(matches!(cpu.step(), Err(CpuError::Memory { pc: 0, .. })));

        assert_eq!(cpu.status, Status::InvalidAddress);
        assert_eq!(cpu.regs.sp(), sp);
        assert_eq!(cpu.pc, 0);
    }

    #[test]
    fn test_failed_popq_commits_nothing() {
        for dst in [Register::Rax, Register::Rsp] {
            let mut cpu = cpu_with(&[Instruction::Popq { dst }]);
            let sp = u64::MAX - 3;
            cpu.regs.set(Register::Rax, 99);
            cpu.regs.set(Register::Rsp, sp);

            assert!(cpu.step().is_err());

            assert_eq!(cpu.status, Status::InvalidAddress);
            assert_eq!(cpu.regs.sp(), sp);
            assert_eq!(cpu.regs.get(Register::Rax), 99);
            assert_eq!(cpu.pc, 0);
        }
    }

    #[test]
    fn test_failed_call_commits_nothing() {
        for sp in [0, 4] {
            let program = make_program(&[Instruction::Call { target: 0x40 }]);
            let mut cpu = cpu_with(&[Instruction::Call { target: 0x40 }]);
            cpu.regs.set(Register::Rsp, sp);

            assert!(cpu.step().is_err());

            assert_eq!(cpu.status, Status::InvalidAddress);
            assert_eq!(cpu.regs.sp(), sp);
            assert_eq!(cpu.pc, 0);
            assert_eq!(&cpu.mem.as_bytes()[..program.len()], program.as_slice());
            assert!(cpu.mem.as_bytes()[program.len()..].iter().all(|&b| b == 0));
        }
    }

    #[test]
    fn test_mrmovq_wrapping_displacement() {
        // 0x10 - 0x20 wraps to the top of the address space.
        let mut cpu = cpu_with(&[
            irmovq(0x10, Register::Rbx),
            Instruction::Mrmovq { base: Register::Rbx, dst: Register::Rax, disp: word::to_unsigned(-0x20, WORD_BITS) },
        ]);
        cpu.regs.set(Register::Rax, 7);

        cpu.step().unwrap();
        assert!(matches!(cpu.step(), Err(CpuError::Memory { pc: 10, .. })));

        assert_eq!(cpu.status, Status::InvalidAddress);
        assert_eq!(cpu.regs.get(Register::Rax), 7);
        assert_eq!(cpu.regs.get(Register::Rbx), 0x10);
        assert_eq!(cpu.pc, 10);

        // A wrapping sum that lands back in memory is a normal load.
        let mut cpu = cpu_with(&[
            irmovq(0x210, Register::Rbx),
            Instruction::Mrmovq { base: Register::Rbx, dst: Register::Rax, disp: word::to_unsigned(-16, WORD_BITS) },
            Instruction::Halt,
        ]);
        cpu.mem.write_word(5, 0x200).unwrap();
        cpu.run();

        assert!(cpu.is_halted());
        assert_eq!(cpu.regs.get(Register::Rax), 5);
    }

    #[test]
    fn test_run_observed_sees_every_step() {
        let mut cpu = cpu_with(&[irmovq(1, Register::Rax), Instruction::Nop, Instruction::Halt]);
        let mut seen = Vec::new();

        let report = cpu.run_observed(10, |cpu, pc, result| seen.push((pc, result.is_ok(), cpu.pc)));

        assert_eq!(report, RunReport { steps: 3, outcome: RunOutcome::Stopped(Status::Halted) });
        assert_eq!(seen, vec![(0, true, 10), (10, true, 11), (11, true, 11)]);
    }

    #[test]
    fn test_running_off_memory() {
        let mut cpu = Cpu::new();
        cpu.pc = cpu.mem.size() as u64;
        assert!(cpu.step().is_err());
        assert_eq!(cpu.status, Status::InvalidAddress);
    }

    #[test]
    fn test_step_limit() {
        // loop: jmp loop
        let mut cpu = cpu_with(&[Instruction::Jump { cond: Condition::Always, target: 0 }]);

        let report = cpu.run_limited(37);

        assert_eq!(report, RunReport { steps: 37, outcome: RunOutcome::StepLimitReached });
        assert_eq!(cpu.status, Status::Running);
        assert_eq!(cpu.steps, 37);
    }

    #[test]
    fn test_configured_step_limit() {
        let config = MachineConfig { step_limit: 5, ..Default::default() };
        let mut cpu = Cpu::with_config(config);
        cpu.load_bytes(&make_program(&[Instruction::Jump { cond: Condition::Always, target: 0 }]))
            .unwrap();

        assert_eq!(cpu.run().steps, 5);
    }

    #[test]
    fn test_reset() {
        let mut cpu = cpu_with(&[irmovq(5, Register::Rax), Instruction::Halt]);
        cpu.run();
        cpu.reset();

        assert_eq!(cpu.regs, Registers::new());
        assert_eq!(cpu.pc, 0);
        assert_eq!(cpu.status, Status::Running);
        assert_eq!(cpu.mem.read_word(0).unwrap(), 0);
    }

    #[test]
    fn test_snapshot_json() {
        let mut cpu = cpu_with(&[irmovq(5, Register::Rax), Instruction::Halt]);
        cpu.run();

        let json = cpu.snapshot_json().unwrap();
        let restored: Cpu = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.regs.get(Register::Rax), 5);
        assert_eq!(restored.status, Status::Halted);
    }
}
