//! Assembler and disassembler for Y86-64 programs.
//!
//! This module provides:
//! - A two-pass assembler (source text → [`ProgramImage`])
//! - A disassembler (bytes → readable text)
//! - The `.yo` listing format for saving and loading images

pub mod assembler;
pub mod disasm;
pub mod image;

pub use assembler::{assemble, assemble_with_logger, AssemblerError};
pub use disasm::{disassemble, disassemble_instruction};
pub use image::{format_image, load_image, parse_image, save_image, ImageError, ProgramImage, SourceLine};
