//! The machine bus: a flat 32-bit little-endian address space with
//! memory-mapped I/O dispatch.
//!
//! The bus owns the backing memory as a slice of `AtomicU8` accessed with
//! relaxed ordering. Plain guest memory deliberately has no cross-thread
//! synchronisation beyond per-byte atomicity; the emulated hardware has no
//! cache coherence either, and guests that want ordering use MMIO handshakes
//! (the blitter busy flag, VIDEO_STATUS) exactly as on the real machine.
//!
//! MMIO handlers speak 32-bit register words at 4-byte granularity. The bus
//! composes narrower accesses: an 8- or 16-bit read extracts the lane from
//! the handler's word, an 8- or 16-bit write performs a read-modify-write
//! through the handler pair. Handlers must not re-enter the bus for their
//! own address; they may touch other regions.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock, Weak};

/// Default backing memory size: 32 MiB.
pub const DEFAULT_MEM_SIZE: usize = 32 * 1024 * 1024;

/// MMIO window reserved for device registers. Addresses inside the window
/// never fall through to backing memory: reads of unmapped registers return
/// zero and writes are dropped, matching the permissive behaviour of the
/// original hardware. Regions outside the window (the 8-bit view shims at
/// 0xD400/0xD700) may still be mapped and shadow backing memory.
pub const IO_WINDOW_BASE: u32 = 0x000F_0000;
pub const IO_WINDOW_TOP: u32 = 0x000F_4000;

/// MMIO read handler: receives the 4-byte-aligned register address,
/// returns the full 32-bit register word.
pub type IoReader = Arc<dyn Fn(u32) -> u32 + Send + Sync>;

/// MMIO write handler: receives the 4-byte-aligned register address and the
/// full 32-bit word being stored.
pub type IoWriter = Arc<dyn Fn(u32, u32) + Send + Sync>;

struct IoRegion {
    base: u32,
    end: u32, // inclusive
    reader: IoReader,
    writer: IoWriter,
}

/// Errors from MMIO region registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    /// The proposed range intersects an already-registered region.
    Overlap { base: u32, end: u32 },
    /// `end` precedes `base`.
    InvalidRange { base: u32, end: u32 },
}

impl std::fmt::Display for BusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Overlap { base, end } => {
                write!(f, "MMIO range {base:#010x}-{end:#010x} overlaps an existing region")
            }
            Self::InvalidRange { base, end } => {
                write!(f, "MMIO range {base:#010x}-{end:#010x} is inverted")
            }
        }
    }
}

impl std::error::Error for BusError {}

pub struct MachineBus {
    mem: Box<[AtomicU8]>,
    /// Registered regions, sorted by base, pairwise disjoint.
    regions: Vec<IoRegion>,
    /// Lowest registered base; gates the binary search on the hot path.
    io_floor: u32,
    /// Dedicated lock-free reader for the VIDEO_STATUS register, consulted
    /// before region lookup so tight VBlank polls skip the search entirely.
    fast_status: Option<(u32, IoReader)>,
}

impl MachineBus {
    pub fn new(mem_size: usize) -> Self {
        let mem: Box<[AtomicU8]> = std::iter::repeat_with(|| AtomicU8::new(0))
            .take(mem_size)
            .collect();
        Self {
            mem,
            regions: Vec::new(),
            io_floor: u32::MAX,
            fast_status: None,
        }
    }

    pub fn mem_size(&self) -> usize {
        self.mem.len()
    }

    // --- MMIO registration (construction phase, before the bus is shared) ---

    /// Register an MMIO region over `[base, end]` (inclusive). Fails when the
    /// range is inverted or intersects an existing region.
    pub fn map_io(
        &mut self,
        base: u32,
        end: u32,
        reader: IoReader,
        writer: IoWriter,
    ) -> Result<(), BusError> {
        if end < base {
            return Err(BusError::InvalidRange { base, end });
        }
        if self.regions.iter().any(|r| base <= r.end && end >= r.base) {
            return Err(BusError::Overlap { base, end });
        }
        let at = self.regions.partition_point(|r| r.base < base);
        self.regions.insert(at, IoRegion { base, end, reader, writer });
        self.io_floor = self.io_floor.min(base);
        log::debug!("bus: mapped MMIO {base:#010x}-{end:#010x}");
        Ok(())
    }

    /// Install the VIDEO_STATUS fast path. `addr` must be 4-byte aligned and
    /// lie inside an already-mapped region; `reader` is typically a cheaper
    /// closure than the region's own (a single atomic load).
    pub fn set_fast_status(&mut self, addr: u32, reader: IoReader) {
        debug_assert_eq!(addr & 3, 0);
        self.fast_status = Some((addr, reader));
    }

    fn region_at(&self, addr: u32) -> Option<&IoRegion> {
        if addr < self.io_floor {
            return None;
        }
        let i = self.regions.partition_point(|r| r.end < addr);
        self.regions.get(i).filter(|r| r.base <= addr)
    }

    fn in_io_window(addr: u32) -> bool {
        (IO_WINDOW_BASE..IO_WINDOW_TOP).contains(&addr)
    }

    // --- Backing memory primitives ---

    #[inline]
    fn mem_read8(&self, addr: u32) -> u32 {
        match self.mem.get(addr as usize) {
            Some(b) => b.load(Ordering::Relaxed) as u32,
            None => 0,
        }
    }

    #[inline]
    fn mem_write8(&self, addr: u32, val: u8) {
        if let Some(b) = self.mem.get(addr as usize) {
            b.store(val, Ordering::Relaxed);
        }
    }

    // --- Little-endian accessors (primary core, devices, DMA) ---

    pub fn read8(&self, addr: u32) -> u32 {
        if let Some((fa, f)) = &self.fast_status
            && addr & !3 == *fa
        {
            return (f(*fa) >> ((addr & 3) * 8)) & 0xFF;
        }
        if let Some(r) = self.region_at(addr) {
            let word = (r.reader)(addr & !3);
            return (word >> ((addr & 3) * 8)) & 0xFF;
        }
        if Self::in_io_window(addr) {
            return 0;
        }
        self.mem_read8(addr)
    }

    pub fn read16(&self, addr: u32) -> u32 {
        if let Some((fa, f)) = &self.fast_status
            && addr & !3 == *fa
        {
            return (f(*fa) >> ((addr & 3) * 8)) & 0xFFFF;
        }
        if let Some(r) = self.region_at(addr) {
            let word = (r.reader)(addr & !3);
            return (word >> ((addr & 3) * 8)) & 0xFFFF;
        }
        if Self::in_io_window(addr) {
            return 0;
        }
        self.mem_read8(addr) | self.mem_read8(addr.wrapping_add(1)) << 8
    }

    pub fn read32(&self, addr: u32) -> u32 {
        if let Some((fa, f)) = &self.fast_status
            && addr & !3 == *fa
        {
            return f(*fa);
        }
        if let Some(r) = self.region_at(addr) {
            return (r.reader)(addr & !3);
        }
        if Self::in_io_window(addr) {
            return 0;
        }
        self.mem_read8(addr)
            | self.mem_read8(addr.wrapping_add(1)) << 8
            | self.mem_read8(addr.wrapping_add(2)) << 16
            | self.mem_read8(addr.wrapping_add(3)) << 24
    }

    pub fn write8(&self, addr: u32, val: u32) {
        if let Some(r) = self.region_at(addr) {
            let aligned = addr & !3;
            let shift = (addr & 3) * 8;
            let word = (r.reader)(aligned) & !(0xFF << shift) | (val & 0xFF) << shift;
            (r.writer)(aligned, word);
            return;
        }
        if Self::in_io_window(addr) {
            return;
        }
        self.mem_write8(addr, val as u8);
    }

    pub fn write16(&self, addr: u32, val: u32) {
        if let Some(r) = self.region_at(addr) {
            let aligned = addr & !3;
            let shift = (addr & 3) * 8;
            let word = (r.reader)(aligned) & !(0xFFFF << shift) | (val & 0xFFFF) << shift;
            (r.writer)(aligned, word);
            return;
        }
        if Self::in_io_window(addr) {
            return;
        }
        self.mem_write8(addr, val as u8);
        self.mem_write8(addr.wrapping_add(1), (val >> 8) as u8);
    }

    pub fn write32(&self, addr: u32, val: u32) {
        if let Some(r) = self.region_at(addr) {
            (r.writer)(addr & !3, val);
            return;
        }
        if Self::in_io_window(addr) {
            return;
        }
        self.mem_write8(addr, val as u8);
        self.mem_write8(addr.wrapping_add(1), (val >> 8) as u8);
        self.mem_write8(addr.wrapping_add(2), (val >> 16) as u8);
        self.mem_write8(addr.wrapping_add(3), (val >> 24) as u8);
    }

    // --- Big-endian view (68k-family instruction stream and operands) ---
    //
    // Only the byte order of backing memory changes; MMIO handlers always
    // receive the value the guest wrote, so device registers read the same
    // from either view.

    pub fn read16_be(&self, addr: u32) -> u32 {
        if self.region_at(addr).is_some() {
            return self.read16(addr);
        }
        self.mem_read8(addr) << 8 | self.mem_read8(addr.wrapping_add(1))
    }

    pub fn read32_be(&self, addr: u32) -> u32 {
        if self.region_at(addr).is_some() {
            return self.read32(addr);
        }
        self.mem_read8(addr) << 24
            | self.mem_read8(addr.wrapping_add(1)) << 16
            | self.mem_read8(addr.wrapping_add(2)) << 8
            | self.mem_read8(addr.wrapping_add(3))
    }

    pub fn write16_be(&self, addr: u32, val: u32) {
        if self.region_at(addr).is_some() || Self::in_io_window(addr) {
            self.write16(addr, val);
            return;
        }
        self.mem_write8(addr, (val >> 8) as u8);
        self.mem_write8(addr.wrapping_add(1), val as u8);
    }

    pub fn write32_be(&self, addr: u32, val: u32) {
        if self.region_at(addr).is_some() || Self::in_io_window(addr) {
            self.write32(addr, val);
            return;
        }
        self.mem_write8(addr, (val >> 24) as u8);
        self.mem_write8(addr.wrapping_add(1), (val >> 16) as u8);
        self.mem_write8(addr.wrapping_add(2), (val >> 8) as u8);
        self.mem_write8(addr.wrapping_add(3), val as u8);
    }

    // --- Bulk access (renderers, loaders) ---

    /// Copy `dst.len()` bytes of backing memory starting at `addr`.
    /// Bytes past the end of memory read as zero. Bypasses MMIO dispatch.
    pub fn read_block(&self, addr: u32, dst: &mut [u8]) {
        let start = addr as usize;
        for (i, out) in dst.iter_mut().enumerate() {
            *out = match self.mem.get(start + i) {
                Some(b) => b.load(Ordering::Relaxed),
                None => 0,
            };
        }
    }

    /// Store `src` into backing memory starting at `addr`, truncating at the
    /// end of memory. Bypasses MMIO dispatch.
    pub fn write_block(&self, addr: u32, src: &[u8]) {
        let start = addr as usize;
        for (i, &byte) in src.iter().enumerate() {
            if let Some(b) = self.mem.get(start + i) {
                b.store(byte, Ordering::Relaxed);
            }
        }
    }

    /// Direct slice access under the caller's own discipline. Renderers use
    /// this for VRAM scans without per-byte call overhead.
    pub fn with_memory<R>(&self, f: impl FnOnce(&[AtomicU8]) -> R) -> R {
        f(&self.mem)
    }
}

/// Deferred back-reference to the shared bus for devices whose MMIO handlers
/// must themselves drive bus traffic (blitter DMA, media loader staging).
///
/// Handlers are registered while the bus is still exclusively owned, so they
/// cannot capture an `Arc<MachineBus>` at that point; they capture a
/// `BusHook` instead, and the machine calls [`BusHook::connect`] once the
/// bus has been wrapped in an `Arc`. The hook holds a `Weak` so the
/// bus → handler → bus loop does not leak.
#[derive(Clone, Default)]
pub struct BusHook(Arc<OnceLock<Weak<MachineBus>>>);

impl BusHook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&self, bus: &Arc<MachineBus>) {
        let _ = self.0.set(Arc::downgrade(bus));
    }

    pub fn bus(&self) -> Option<Arc<MachineBus>> {
        self.0.get().and_then(Weak::upgrade)
    }
}
