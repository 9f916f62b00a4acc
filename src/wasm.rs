//! WebAssembly bindings for the Y86-64 emulator.
//!
//! This module provides JavaScript-friendly wrappers around the core emulator.

use wasm_bindgen::prelude::*;
use crate::{Cpu, MachineConfig, ProgramImage, Register, RunOutcome};
use crate::asm::assembler::assemble;
use crate::asm::disasm::{disassemble, disassemble_instruction};

/// Initialize panic hook for better error messages in console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// WebAssembly-friendly machine wrapper.
#[wasm_bindgen]
pub struct WasmMachine {
    cpu: Cpu,
    image: ProgramImage,
}

#[wasm_bindgen]
impl WasmMachine {
    /// Create a machine with the default configuration.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self {
            cpu: Cpu::new(),
            image: ProgramImage::new(),
        }
    }

    /// Create a machine with `memory_size` bytes of memory.
    #[wasm_bindgen]
    pub fn with_memory(memory_size: usize) -> Result<WasmMachine, JsError> {
        let config = MachineConfig { memory_size, ..MachineConfig::default() };
        config.validate().map_err(|e| JsError::new(&e.to_string()))?;

        Ok(Self {
            cpu: Cpu::with_config(config),
            image: ProgramImage::new(),
        })
    }

    /// Assemble source code and load it. Returns the image size in bytes.
    #[wasm_bindgen]
    pub fn load_asm(&mut self, source: &str) -> Result<usize, JsError> {
        let image = assemble(source).map_err(|e| JsError::new(&e.to_string()))?;

        self.cpu.reset();
        self.cpu.load_image(&image).map_err(|e| JsError::new(&e.to_string()))?;
        self.image = image;

        Ok(self.image.len())
    }

    /// Step one instruction. Returns the disassembled instruction.
    #[wasm_bindgen]
    pub fn step(&mut self) -> Result<String, JsError> {
        let instr = self.cpu.step().map_err(|e| JsError::new(&e.to_string()))?;
        Ok(disassemble_instruction(&instr))
    }

    /// Run for at most `max_steps` instructions.
    ///
    /// Returns `true` if the machine stopped and `false` if the budget ran out.
    #[wasm_bindgen]
    pub fn run(&mut self, max_steps: u32) -> bool {
        let report = self.cpu.run_limited(max_steps as u64);
        report.outcome != RunOutcome::StepLimitReached
    }

    /// Reset the machine and reload the current program.
    #[wasm_bindgen]
    pub fn reset(&mut self) -> Result<(), JsError> {
        self.cpu.reset();
        self.cpu.load_image(&self.image).map_err(|e| JsError::new(&e.to_string()))
    }

    #[wasm_bindgen]
    pub fn is_running(&self) -> bool {
        self.cpu.is_running()
    }

    #[wasm_bindgen]
    pub fn is_halted(&self) -> bool {
        self.cpu.is_halted()
    }

    /// Status code: `AOK`, `HLT`, `ADR` or `INS`.
    #[wasm_bindgen]
    pub fn status(&self) -> String {
        self.cpu.status.code().to_string()
    }

    #[wasm_bindgen]
    pub fn steps(&self) -> u64 {
        self.cpu.steps
    }

    #[wasm_bindgen]
    pub fn pc(&self) -> u64 {
        self.cpu.pc
    }

    /// Register value by index (0 = `%rax` .. 14 = `%r14`).
    #[wasm_bindgen]
    pub fn register(&self, index: u8) -> Result<u64, JsError> {
        let reg = Register::from_nibble(index)
            .ok_or_else(|| JsError::new(&format!("no register with index {}", index)))?;
        Ok(self.cpu.regs.get(reg))
    }

    /// All fifteen registers in index order.
    #[wasm_bindgen]
    pub fn registers(&self) -> Vec<u64> {
        self.cpu.regs.as_array().to_vec()
    }

    /// Condition codes as `[OF, SF, ZF]`.
    #[wasm_bindgen]
    pub fn flags(&self) -> Vec<u8> {
        let f = self.cpu.flags;
        vec![f.overflow as u8, f.sign as u8, f.zero as u8]
    }

    /// 8-byte word at `address`, or an error when out of range.
    #[wasm_bindgen]
    pub fn memory_word(&self, address: u64) -> Result<u64, JsError> {
        self.cpu.mem.read_word(address).map_err(|e| JsError::new(&e.to_string()))
    }

    /// Copy of `len` bytes of memory starting at `start`, clipped to memory size.
    #[wasm_bindgen]
    pub fn memory_bytes(&self, start: usize, len: usize) -> js_sys::Uint8Array {
        let bytes = self.cpu.mem.as_bytes();
        let start = start.min(bytes.len());
        let end = start.saturating_add(len).min(bytes.len());
        js_sys::Uint8Array::from(&bytes[start..end])
    }

    /// Full machine state as JSON.
    #[wasm_bindgen]
    pub fn snapshot_json(&self) -> Result<String, JsError> {
        self.cpu.snapshot_json().map_err(|e| JsError::new(&e.to_string()))
    }

    /// Disassembly of the loaded program.
    #[wasm_bindgen]
    pub fn disassembly(&self) -> String {
        disassemble(self.image.bytes())
    }
}

impl Default for WasmMachine {
    fn default() -> Self {
        Self::new()
    }
}

/// Assemble source code and return the `.yo` listing.
#[wasm_bindgen]
pub fn wasm_assemble(source: &str) -> Result<String, JsError> {
    let image = assemble(source).map_err(|e| JsError::new(&e.to_string()))?;
    Ok(crate::asm::format_image(&image))
}
