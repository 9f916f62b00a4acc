//! Debugger application state and logic.

use crate::asm::disasm::disassemble_instruction;
use crate::asm::ProgramImage;
use crate::config::MachineConfig;
use crate::cpu::decode::decode_at;
use crate::Cpu;
use std::collections::BTreeSet;

/// Instructions executed per UI tick while running.
const STEPS_PER_TICK: u64 = 64;

/// Debugger application state.
pub struct DebuggerApp {
    /// The CPU being debugged.
    pub cpu: Cpu,
    /// Original program for reference and reset.
    pub image: ProgramImage,
    /// Breakpoints (by address).
    pub breakpoints: BTreeSet<u64>,
    /// Is the debugger running continuously?
    pub running: bool,
    /// Should we quit?
    pub should_quit: bool,
    /// Status message to display.
    pub status: String,
    /// Memory view scroll offset, in words.
    pub mem_scroll: usize,
}

impl DebuggerApp {
    /// Create a new debugger with a loaded program.
    pub fn new(image: ProgramImage, config: MachineConfig) -> Self {
        let mut cpu = Cpu::with_config(config);
        let status = match cpu.load_image(&image) {
            Ok(()) => "Ready. Press 's' to step, 'r' to run, 'q' to quit.".to_string(),
            Err(e) => format!("Load failed: {}", e),
        };

        Self {
            cpu,
            image,
            breakpoints: BTreeSet::new(),
            running: false,
            should_quit: false,
            status,
            mem_scroll: 0,
        }
    }

    /// Step one instruction.
    pub fn step(&mut self) {
        if !self.cpu.is_running() {
            self.status = format!("CPU stopped: {}", self.cpu.status.code());
            self.running = false;
            return;
        }

        let pc = self.cpu.pc;
        match self.cpu.step() {
            Ok(instr) => {
                self.status = format!("PC=0x{:03x}: {}", pc, disassemble_instruction(&instr));
            }
            Err(e) => {
                self.status = format!("Error: {}", e);
                self.running = false;
            }
        }
    }

    /// Run until halt, breakpoint, or error.
    pub fn run(&mut self) {
        self.running = true;
        self.status = "Running...".into();
    }

    /// Run one batch of continuous execution.
    pub fn tick(&mut self) {
        for _ in 0..STEPS_PER_TICK {
            if !self.running {
                return;
            }

            if !self.cpu.is_running() {
                self.running = false;
                self.status = format!("Stopped ({}) after {} steps", self.cpu.status.code(), self.cpu.steps);
                return;
            }

            if self.cpu.steps >= self.cpu.config().step_limit {
                self.running = false;
                self.status = format!("Step limit ({}) reached", self.cpu.config().step_limit);
                return;
            }

            self.step();

            if self.breakpoints.contains(&self.cpu.pc) {
                self.running = false;
                self.status = format!("Breakpoint at PC=0x{:03x}", self.cpu.pc);
                return;
            }
        }
    }

    /// Toggle breakpoint at current PC.
    pub fn toggle_breakpoint(&mut self) {
        let pc = self.cpu.pc;
        if self.breakpoints.remove(&pc) {
            self.status = format!("Removed breakpoint at PC=0x{:03x}", pc);
        } else {
            self.breakpoints.insert(pc);
            self.status = format!("Set breakpoint at PC=0x{:03x}", pc);
        }
    }

    /// Reset CPU to initial state.
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.running = false;
        self.status = match self.cpu.load_image(&self.image) {
            Ok(()) => "Reset. Ready.".into(),
            Err(e) => format!("Load failed: {}", e),
        };
    }

    /// Get disassembly around current PC as `(address, text, is_current)`.
    pub fn get_disassembly(&self, lines: usize) -> Vec<(u64, String, bool)> {
        let pc = self.cpu.pc;

        // Walk from the image start so instruction boundaries line up;
        // fall back to walking from PC when it lands mid-instruction.
        let size = self.cpu.mem.size() as u64;
        let end = (self.image.len() as u64).max(pc.saturating_add(1)).min(size);
        let mut listing = self.walk(0, end);
        if pc < size && !listing.iter().any(|(addr, _)| *addr == pc) {
            listing = self.walk(pc, pc.saturating_add(lines as u64 * 10));
        }

        let current = listing.iter().position(|(addr, _)| *addr == pc).unwrap_or(0);
        let start = current.saturating_sub(lines / 2);

        listing
            .into_iter()
            .skip(start)
            .take(lines)
            .map(|(addr, text)| (addr, text, addr == pc))
            .collect()
    }

    fn walk(&self, start: u64, end: u64) -> Vec<(u64, String)> {
        let mut out = Vec::new();
        let mut addr = start;

        while addr < end && (addr as usize) < self.cpu.mem.size() {
            match decode_at(&self.cpu.mem, addr) {
                Ok(instr) => {
                    out.push((addr, disassemble_instruction(&instr)));
                    addr += instr.len() as u64;
                }
                Err(_) => {
                    let byte = self.cpu.mem.read_byte(addr).unwrap_or(0);
                    out.push((addr, format!(".byte {:#04x}", byte)));
                    addr += 1;
                }
            }
        }

        out
    }
}

/// Run the debugger with a program.
pub fn run_debugger(image: ProgramImage, config: MachineConfig) -> std::io::Result<()> {
    use crossterm::{
        event::{self, Event, KeyCode, KeyEventKind},
        terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
        ExecutableCommand,
    };
    use ratatui::prelude::*;
    use std::io::stdout;
    use std::time::Duration;

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut app = DebuggerApp::new(image, config);

    // Main loop
    loop {
        terminal.draw(|frame| {
            super::ui::draw(frame, &app);
        })?;

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') => app.should_quit = true,
                        KeyCode::Char('s') => {
                            app.running = false;
                            app.step();
                        }
                        KeyCode::Char('r') => app.run(),
                        KeyCode::Char('p') => {
                            app.running = false;
                            app.status = "Paused.".into();
                        }
                        KeyCode::Char('b') => app.toggle_breakpoint(),
                        KeyCode::Char('x') => app.reset(),
                        KeyCode::Up => app.mem_scroll = app.mem_scroll.saturating_sub(1),
                        KeyCode::Down => {
                            if (app.mem_scroll + 1) * 8 < app.cpu.mem.size() {
                                app.mem_scroll += 1;
                            }
                        }
                        _ => {}
                    }
                }
            }
        }

        if app.running {
            app.tick();
        }

        if app.should_quit {
            break;
        }
    }

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(())
}
