//! Program images and the `.yo` object format.
//!
//! A `.yo` file is plain text, one line per source line:
//! - `0x014: 30f20a00000000000000 | irmovq $10, %rdx` places the hex bytes at 0x014
//! - an address with no bytes (`0x01e:                      | loop:`) marks a label or directive
//! - anything after `|` is source text and is kept for listings
//! - lines without a `:` before the `|` are ignored

use crate::Cpu;
use crate::config::MAX_MEMORY_SIZE;
use crate::cpu::MemoryError;
use serde::{Serialize, Deserialize};
use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use thiserror::Error;

/// Highest address an image may extend to.
pub const MAX_IMAGE_SIZE: u64 = MAX_MEMORY_SIZE as u64;

/// Width of the hex byte column in saved listings.
const BYTE_COLUMN: usize = 20;

/// One source line and where its bytes landed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLine {
    /// Address of the first emitted byte (or the location counter).
    pub address: u64,
    /// Number of bytes emitted for this line.
    pub len: usize,
    /// Original text, trimmed.
    pub text: String,
}

/// An assembled program: a byte image loaded at address 0.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramImage {
    bytes: Vec<u8>,
    /// Label name to address.
    pub symbols: BTreeMap<String, u64>,
    /// Source map in address order of appearance.
    pub lines: Vec<SourceLine>,
}

impl ProgramImage {
    /// Create an empty image.
    pub fn new() -> Self {
        Self::default()
    }

    /// The byte image, starting at address 0.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Image size in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Store `data` at `address`, growing the image with zeros as needed.
    ///
    /// Fails if the bytes would extend past [`MAX_IMAGE_SIZE`].
    pub fn write(&mut self, address: u64, data: &[u8]) -> Result<(), ImageError> {
        if data.is_empty() {
            return Ok(());
        }

        let end = address
            .checked_add(data.len() as u64)
            .filter(|&end| end <= MAX_IMAGE_SIZE)
            .ok_or(ImageError::TooLarge { address, len: data.len() })?;

        let (start, end) = (address as usize, end as usize);
        if end > self.bytes.len() {
            self.bytes.resize(end, 0);
        }
        self.bytes[start..end].copy_from_slice(data);
        Ok(())
    }

    /// Bytes emitted for a source line.
    pub fn line_bytes(&self, line: &SourceLine) -> &[u8] {
        let start = (line.address as usize).min(self.bytes.len());
        let end = (start + line.len).min(self.bytes.len());
        &self.bytes[start..end]
    }

    /// Source line whose bytes start at `address`, if any.
    pub fn line_at(&self, address: u64) -> Option<&SourceLine> {
        self.lines.iter().find(|l| l.address == address && l.len > 0)
    }

    /// Mapping from every emitted byte offset to its value.
    pub fn byte_map(&self) -> BTreeMap<u64, u8> {
        self.lines
            .iter()
            .flat_map(|l| (l.address..l.address + l.len as u64).zip(self.line_bytes(l).iter().copied()))
            .collect()
    }
}

impl Cpu {
    /// Load an assembled image at address 0.
    pub fn load_image(&mut self, image: &ProgramImage) -> Result<(), MemoryError> {
        self.load_bytes(image.bytes())
    }
}

/// Parse `.yo` text into an image.
pub fn parse_image(text: &str) -> Result<ProgramImage, ImageError> {
    let mut image = ProgramImage::new();

    for (line_num, line) in text.lines().enumerate() {
        let line_num = line_num + 1;
        let (code, source) = match line.split_once('|') {
            Some((code, source)) => (code.trim(), source.trim()),
            None => (line.trim(), ""),
        };

        let Some((addr_part, hex_part)) = code.split_once(':') else {
            continue;
        };

        let addr_part = addr_part.trim();
        let digits = addr_part
            .strip_prefix("0x")
            .or_else(|| addr_part.strip_prefix("0X"))
            .ok_or_else(|| ImageError::ParseError {
                line: line_num,
                message: format!("expected hex address, found '{}'", addr_part),
            })?;
        let address = u64::from_str_radix(digits, 16).map_err(|e| ImageError::ParseError {
            line: line_num,
            message: format!("invalid address '{}': {}", addr_part, e),
        })?;

        if address > MAX_IMAGE_SIZE {
            return Err(ImageError::ParseError {
                line: line_num,
                message: format!("address {:#x} is beyond the {:#x} byte image limit", address, MAX_IMAGE_SIZE),
            });
        }

        let bytes = parse_hex_bytes(hex_part.trim()).map_err(|message| ImageError::ParseError {
            line: line_num,
            message,
        })?;

        image.write(address, &bytes).map_err(|e| ImageError::ParseError {
            line: line_num,
            message: e.to_string(),
        })?;
        image.lines.push(SourceLine {
            address,
            len: bytes.len(),
            text: source.to_string(),
        });
    }

    Ok(image)
}

fn parse_hex_bytes(hex: &str) -> Result<Vec<u8>, String> {
    let hex: String = hex.chars().filter(|c| !c.is_whitespace()).collect();
    if !hex.is_ascii() {
        return Err(format!("non-hex characters in '{}'", hex));
    }
    if hex.len() % 2 != 0 {
        return Err(format!("odd number of hex digits in '{}'", hex));
    }

    (0..hex.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map_err(|_| format!("invalid hex byte '{}'", &hex[i..i + 2]))
        })
        .collect()
}

/// Render an image as `.yo` text.
pub fn format_image(image: &ProgramImage) -> String {
    let mut out = String::new();

    if image.lines.is_empty() {
        for (i, chunk) in image.bytes().chunks(8).enumerate() {
            out.push_str(&format!("0x{:03x}: {} |\n", i * 8, hex_string(chunk)));
        }
        return out;
    }

    for line in &image.lines {
        out.push_str(&format!(
            "0x{:03x}: {:<width$} | {}\n",
            line.address,
            hex_string(image.line_bytes(line)),
            line.text,
            width = BYTE_COLUMN
        ));
    }

    out
}

fn hex_string(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Load a `.yo` file from disk.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<ProgramImage, ImageError> {
    let file = std::fs::File::open(path.as_ref())
        .map_err(|e| ImageError::IoError(e.to_string()))?;
    let reader = BufReader::new(file);

    let mut text = String::new();
    for line in reader.lines() {
        let line = line.map_err(|e| ImageError::IoError(e.to_string()))?;
        text.push_str(&line);
        text.push('\n');
    }

    parse_image(&text)
}

/// Save an image to disk as `.yo` text.
pub fn save_image<P: AsRef<Path>>(path: P, image: &ProgramImage) -> Result<(), ImageError> {
    let mut file = std::fs::File::create(path.as_ref())
        .map_err(|e| ImageError::IoError(e.to_string()))?;

    file.write_all(format_image(image).as_bytes())
        .map_err(|e| ImageError::IoError(e.to_string()))?;

    Ok(())
}

/// Errors that can occur during image operations.
#[derive(Debug, Clone, Error)]
pub enum ImageError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("parse error on line {line}: {message}")]
    ParseError { line: usize, message: String },

    #[error("{len} bytes at {address:#x} extend past the {:#x} byte image limit", MAX_IMAGE_SIZE)]
    TooLarge { address: u64, len: usize },
}
