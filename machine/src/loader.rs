//! Executable-container loading.
//!
//! Every container is a raw binary keyed by suffix: `.iex` for the
//! primary 32-bit core, `.ie68` for flat 68k binaries, `.ie80` for the
//! Z80 and `.ie65`/`.bin` for the 6502. The bytes land at the configured
//! load address; the entry point equals the load address unless
//! overridden.

use std::path::Path;

use lumen_core::bus::MachineBus;

use crate::memory_map;
use crate::system::CpuMode;

/// Container kinds by filename suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    /// `.iex` — primary 32-bit core image.
    Iex,
    /// `.ie68` — 68k flat binary.
    Ie68,
    /// `.ie80` — Z80 binary.
    Ie80,
    /// `.ie65` — 6502 binary, conventional org 0x0800.
    Ie65,
    /// `.bin` — bare 6502 binary.
    Bin,
}

impl Container {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "iex" => Some(Self::Iex),
            "ie68" => Some(Self::Ie68),
            "ie80" => Some(Self::Ie80),
            "ie65" => Some(Self::Ie65),
            "bin" => Some(Self::Bin),
            _ => None,
        }
    }

    /// The CPU this container targets.
    pub fn cpu_mode(self) -> CpuMode {
        match self {
            Self::Iex | Self::Ie68 => CpuMode::M68k,
            Self::Ie80 => CpuMode::Z80,
            Self::Ie65 | Self::Bin => CpuMode::M6502,
        }
    }

    pub fn default_load(self) -> u32 {
        match self {
            Self::Iex | Self::Ie68 => memory_map::M68K_DEFAULT_LOAD,
            Self::Ie80 => memory_map::Z80_DEFAULT_LOAD,
            Self::Ie65 => memory_map::IE65_DEFAULT_LOAD,
            Self::Bin => memory_map::M6502_DEFAULT_LOAD,
        }
    }
}

#[derive(Debug)]
pub enum LoadError {
    Io(std::io::Error),
    UnknownContainer(String),
    /// The container targets a different CPU than the selected mode.
    WrongCpu {
        container: Container,
        mode: CpuMode,
    },
    TooLarge {
        size: usize,
        limit: usize,
    },
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::UnknownContainer(name) => write!(f, "unknown executable container: {name}"),
            Self::WrongCpu { container, mode } => {
                write!(f, "{container:?} container cannot run on the {mode:?} core")
            }
            Self::TooLarge { size, limit } => {
                write!(f, "program of {size} bytes exceeds the {limit}-byte memory")
            }
        }
    }
}

impl std::error::Error for LoadError {}

impl From<std::io::Error> for LoadError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LoadedProgram {
    pub container: Container,
    pub load_addr: u32,
    pub entry: u32,
}

/// Load a program file into memory and set up the CPU entry conventions:
/// the 68k reset vectors (stack then entry) for the primary core, the
/// 6502 reset vector, nothing beyond the image for the Z80.
pub fn load_program(
    bus: &MachineBus,
    path: &Path,
    mode: CpuMode,
    load_addr: Option<u32>,
    entry: Option<u32>,
) -> Result<LoadedProgram, LoadError> {
    let container = Container::from_path(path)
        .ok_or_else(|| LoadError::UnknownContainer(path.display().to_string()))?;
    if container.cpu_mode() != mode {
        return Err(LoadError::WrongCpu { container, mode });
    }

    let data = std::fs::read(path)?;
    let load_addr = load_addr.unwrap_or_else(|| container.default_load());
    let limit = bus.mem_size();
    if load_addr as usize + data.len() > limit {
        return Err(LoadError::TooLarge {
            size: data.len(),
            limit,
        });
    }
    bus.write_block(load_addr, &data);
    let entry = entry.unwrap_or(load_addr);

    match mode {
        CpuMode::M68k => {
            bus.write32_be(0, memory_map::M68K_DEFAULT_STACK);
            bus.write32_be(4, entry);
        }
        CpuMode::M6502 => {
            bus.write8(0xFFFC, entry & 0xFF);
            bus.write8(0xFFFD, entry >> 8 & 0xFF);
        }
        CpuMode::Z80 | CpuMode::Play => {}
    }

    log::info!(
        "loader: {:?} image, {} bytes at {load_addr:#x}, entry {entry:#x}",
        container,
        data.len()
    );
    Ok(LoadedProgram {
        container,
        load_addr,
        entry,
    })
}
