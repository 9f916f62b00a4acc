//! Y86-64 Emulator - CLI Entry Point
//!
//! Commands:
//! - `y86-emu run <program>` - Run a `.ys` source or `.yo` image
//! - `y86-emu debug <program>` - Interactive debugger
//! - `y86-emu asm <source>` - Assemble to a `.yo` image
//! - `y86-emu disasm <image>` - Disassemble a `.yo` image

use clap::{Parser, Subcommand};
use slog::{o, Discard, Drain, Level, Logger};
use slog_term::{FullFormat, TermDecorator};
use y86::{Cpu, MachineConfig, ProgramImage, RunOutcome, Status};

#[derive(Parser)]
#[command(name = "y86-emu")]
#[command(version = "0.1.0")]
#[command(about = "An emulator and assembler for the Y86-64 teaching architecture")]
struct Cli {
    /// Log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program until it stops or exhausts its step budget
    Run {
        /// Path to the `.ys` or `.yo` file to execute
        program: String,
        /// Maximum number of instructions to execute
        #[arg(short, long)]
        max_steps: Option<u64>,
        /// Bytes of main memory
        #[arg(long)]
        memory_size: Option<usize>,
        /// JSON machine configuration; flags take precedence
        #[arg(short, long)]
        config: Option<String>,
        /// Print every executed instruction
        #[arg(short, long)]
        trace: bool,
        /// Dump the final machine state as JSON
        #[arg(long)]
        json: bool,
    },
    /// Interactive debugger
    #[cfg(feature = "tui")]
    Debug {
        /// Path to the `.ys` or `.yo` file to debug
        program: String,
        /// JSON machine configuration
        #[arg(short, long)]
        config: Option<String>,
    },
    /// Assemble source to a `.yo` image
    Asm {
        /// Path to the source file
        source: String,
        /// Output image file
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Disassemble a `.yo` image to readable text
    Disasm {
        /// Path to the image file
        image: String,
    },
}

fn main() {
    let cli = Cli::parse();
    let logger = build_logger(cli.verbose);

    let result = match cli.command {
        Commands::Run { program, max_steps, memory_size, config, trace, json } => {
            let options = RunOptions { max_steps, memory_size, config, trace, json };
            run_program(&program, &options, &logger)
        }
        #[cfg(feature = "tui")]
        Commands::Debug { program, config } => debug_program(&program, config.as_deref(), &logger),
        Commands::Asm { source, output } => assemble_file(&source, output, &logger),
        Commands::Disasm { image } => disassemble_file(&image),
    };

    // Flush the async drain before exiting.
    drop(logger);

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    }
}

/// Build a terminal logger at the requested verbosity.
fn build_logger(verbose: u8) -> Logger {
    let level = match verbose {
        0 => return Logger::root(Discard, o!()),
        1 => Level::Debug,
        _ => Level::Trace,
    };

    let decorator = TermDecorator::new().stderr().build();
    let drain = FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    Logger::root(drain.filter_level(level).fuse(), o!())
}

struct RunOptions {
    max_steps: Option<u64>,
    memory_size: Option<usize>,
    config: Option<String>,
    trace: bool,
    json: bool,
}

/// Read the machine configuration, applying command-line overrides.
fn machine_config(path: Option<&str>, memory_size: Option<usize>, max_steps: Option<u64>) -> Result<MachineConfig, String> {
    let mut config = match path {
        Some(path) => MachineConfig::load(path).map_err(|e| format!("Failed to load config: {}", e))?,
        None => MachineConfig::default(),
    };

    if let Some(size) = memory_size {
        config.memory_size = size;
    }
    if let Some(steps) = max_steps {
        config.step_limit = steps;
    }

    config.validate().map_err(|e| format!("Invalid configuration: {}", e))?;
    Ok(config)
}

/// Load a program, assembling `.ys` sources and reading anything else as a `.yo` image.
fn load_program(path: &str, logger: &Logger) -> Result<ProgramImage, String> {
    if path.ends_with(".ys") {
        let source = std::fs::read_to_string(path).map_err(|e| format!("Failed to read file: {}", e))?;
        y86::asm::assemble_with_logger(&source, logger.clone()).map_err(|e| format!("Assembly error: {}", e))
    } else {
        y86::load_image(path).map_err(|e| format!("Failed to load image: {}", e))
    }
}

fn run_program(path: &str, options: &RunOptions, logger: &Logger) -> Result<i32, String> {
    use y86::asm::disassemble_instruction;

    let config = machine_config(options.config.as_deref(), options.memory_size, options.max_steps)?;
    let image = load_program(path, logger)?;

    let mut cpu = Cpu::with_logger(config, logger.clone());
    cpu.load_image(&image).map_err(|e| format!("Failed to load program: {}", e))?;

    let report = if options.trace {
        cpu.run_observed(config.step_limit, |cpu, pc, result| match result {
            Ok(instr) => println!("0x{:03x}: {:<28} {}", pc, disassemble_instruction(instr), cpu.flags),
            Err(e) => println!("0x{:03x}: {}", pc, e),
        })
    } else {
        cpu.run()
    };

    if options.json {
        let snapshot = cpu.snapshot_json().map_err(|e| format!("Failed to serialize state: {}", e))?;
        println!("{}", snapshot);
    } else {
        print_state(&cpu);
    }

    match report.outcome {
        RunOutcome::StepLimitReached => {
            eprintln!();
            eprintln!("⚠️  Reached step limit ({}). Use --max-steps to increase.", config.step_limit);
            Ok(2)
        }
        RunOutcome::Stopped(Status::Halted) => Ok(0),
        RunOutcome::Stopped(_) => Ok(1),
    }
}

fn print_state(cpu: &Cpu) {
    println!("Stopped in {} steps at PC = 0x{:x}.  Status '{}', {}", cpu.steps, cpu.pc, cpu.status.code(), cpu.flags);
    println!("Registers:");
    for (reg, value) in cpu.regs.iter() {
        println!("  {:<5} 0x{:016x}  {}", reg.name(), value, cpu.regs.signed(reg));
    }
}

#[cfg(feature = "tui")]
fn debug_program(path: &str, config: Option<&str>, logger: &Logger) -> Result<i32, String> {
    let config = machine_config(config, None, None)?;
    let image = load_program(path, logger)?;

    y86::run_debugger(image, config).map_err(|e| format!("Debugger error: {}", e))?;
    Ok(0)
}

fn assemble_file(source_path: &str, output: Option<String>, logger: &Logger) -> Result<i32, String> {
    let out_path = output.unwrap_or_else(|| match source_path.strip_suffix(".ys") {
        Some(stem) => format!("{}.yo", stem),
        None => format!("{}.yo", source_path),
    });

    let source = std::fs::read_to_string(source_path).map_err(|e| format!("Failed to read file: {}", e))?;
    let image = y86::asm::assemble_with_logger(&source, logger.clone()).map_err(|e| format!("Assembly error: {}", e))?;

    y86::save_image(&out_path, &image).map_err(|e| format!("Failed to save image: {}", e))?;

    println!("✓ Assembled {} bytes → {}", image.len(), out_path);
    Ok(0)
}

fn disassemble_file(path: &str) -> Result<i32, String> {
    let image = y86::load_image(path).map_err(|e| format!("Failed to load image: {}", e))?;
    print!("{}", y86::disassemble(image.bytes()));
    Ok(0)
}
