//! 6502 core: the documented instruction set, instruction-stepped against
//! the shared bus through the bank window.

mod alu;
mod branch;
mod load_store;
mod shift;
mod stack;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::bus::MachineBus;
use crate::cpu::bank::BankWindow;
use crate::cpu::{CpuCore, IrqLine};

#[repr(u8)]
#[derive(Copy, Clone, Debug)]
pub enum StatusFlag {
    C = 0x01, // Carry
    Z = 0x02, // Zero
    I = 0x04, // Interrupt Disable
    D = 0x08, // Decimal
    B = 0x10, // Break
    U = 0x20, // Unused (always 1)
    V = 0x40, // Overflow
    N = 0x80, // Negative
}

pub struct M6502 {
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub pc: u16,
    pub sp: u8,
    pub p: u8,

    bus: Arc<MachineBus>,
    bank: BankWindow,
    running: Arc<AtomicBool>,
    irq: IrqLine,
    nmi_latch: bool,
    /// Parked by a JAM opcode or a host stop.
    jammed: bool,
    instructions: u64,
}

impl M6502 {
    pub fn new(bus: Arc<MachineBus>, bank: BankWindow, running: Arc<AtomicBool>) -> Self {
        Self {
            a: 0,
            x: 0,
            y: 0,
            pc: 0,
            sp: 0xFD,
            p: 0x24, // I=1, U=1
            bus,
            bank,
            running,
            irq: IrqLine::new(),
            nmi_latch: false,
            jammed: false,
            instructions: 0,
        }
    }

    pub fn irq_line(&self) -> IrqLine {
        self.irq.clone()
    }

    pub fn signal_nmi(&mut self) {
        self.nmi_latch = true;
    }

    /// Point the program counter somewhere without touching the vectors.
    pub fn set_entry(&mut self, entry: u16) {
        self.pc = entry;
    }

    #[inline]
    pub fn set_flag(&mut self, flag: StatusFlag, set: bool) {
        if set {
            self.p |= flag as u8;
        } else {
            self.p &= !(flag as u8);
        }
    }

    #[inline]
    pub fn test_flag(&self, flag: StatusFlag) -> bool {
        self.p & flag as u8 != 0
    }

    pub(crate) fn set_nz(&mut self, val: u8) {
        self.set_flag(StatusFlag::Z, val == 0);
        self.set_flag(StatusFlag::N, val & 0x80 != 0);
    }

    // --- Bus access through the bank window ---

    pub(crate) fn read(&self, addr: u16) -> u8 {
        self.bus.read8(self.bank.translate(addr)) as u8
    }

    pub(crate) fn write(&self, addr: u16, val: u8) {
        self.bus.write8(self.bank.translate(addr), val as u32);
    }

    pub(crate) fn read16(&self, addr: u16) -> u16 {
        self.read(addr) as u16 | (self.read(addr.wrapping_add(1)) as u16) << 8
    }

    /// The JMP (ind) page-wrap quirk: the high byte comes from the start
    /// of the same page when the pointer sits on a page boundary.
    pub(crate) fn read16_pagewrap(&self, addr: u16) -> u16 {
        let lo = self.read(addr) as u16;
        let hi_addr = addr & 0xFF00 | (addr as u8).wrapping_add(1) as u16;
        lo | (self.read(hi_addr) as u16) << 8
    }

    pub(crate) fn fetch(&mut self) -> u8 {
        let b = self.read(self.pc);
        self.pc = self.pc.wrapping_add(1);
        b
    }

    pub(crate) fn fetch16(&mut self) -> u16 {
        let lo = self.fetch() as u16;
        let hi = self.fetch() as u16;
        hi << 8 | lo
    }

    // --- Addressing modes (effective address forms) ---

    pub(crate) fn ea_zp(&mut self) -> u16 {
        self.fetch() as u16
    }

    pub(crate) fn ea_zp_x(&mut self) -> u16 {
        self.fetch().wrapping_add(self.x) as u16
    }

    pub(crate) fn ea_zp_y(&mut self) -> u16 {
        self.fetch().wrapping_add(self.y) as u16
    }

    pub(crate) fn ea_abs(&mut self) -> u16 {
        self.fetch16()
    }

    pub(crate) fn ea_abs_x(&mut self) -> u16 {
        self.fetch16().wrapping_add(self.x as u16)
    }

    pub(crate) fn ea_abs_y(&mut self) -> u16 {
        self.fetch16().wrapping_add(self.y as u16)
    }

    pub(crate) fn ea_ind_x(&mut self) -> u16 {
        let zp = self.fetch().wrapping_add(self.x) as u16;
        self.read16_pagewrap(zp)
    }

    pub(crate) fn ea_ind_y(&mut self) -> u16 {
        let zp = self.fetch() as u16;
        self.read16_pagewrap(zp).wrapping_add(self.y as u16)
    }

    pub fn step_one(&mut self) {
        if self.nmi_latch {
            self.nmi_latch = false;
            self.interrupt(0xFFFA, false);
            return;
        }
        if self.irq.pending() != 0 && !self.test_flag(StatusFlag::I) {
            self.irq.acknowledge();
            self.interrupt(0xFFFE, false);
            return;
        }
        let op = self.fetch();
        self.instructions += 1;
        self.dispatch(op);
    }

    fn dispatch(&mut self, op: u8) {
        match op {
            // --- Loads ---
            0xA9 => { let v = self.fetch(); self.op_lda(v) }
            0xA5 => { let ea = self.ea_zp(); let v = self.read(ea); self.op_lda(v) }
            0xB5 => { let ea = self.ea_zp_x(); let v = self.read(ea); self.op_lda(v) }
            0xAD => { let ea = self.ea_abs(); let v = self.read(ea); self.op_lda(v) }
            0xBD => { let ea = self.ea_abs_x(); let v = self.read(ea); self.op_lda(v) }
            0xB9 => { let ea = self.ea_abs_y(); let v = self.read(ea); self.op_lda(v) }
            0xA1 => { let ea = self.ea_ind_x(); let v = self.read(ea); self.op_lda(v) }
            0xB1 => { let ea = self.ea_ind_y(); let v = self.read(ea); self.op_lda(v) }

            0xA2 => { let v = self.fetch(); self.op_ldx(v) }
            0xA6 => { let ea = self.ea_zp(); let v = self.read(ea); self.op_ldx(v) }
            0xB6 => { let ea = self.ea_zp_y(); let v = self.read(ea); self.op_ldx(v) }
            0xAE => { let ea = self.ea_abs(); let v = self.read(ea); self.op_ldx(v) }
            0xBE => { let ea = self.ea_abs_y(); let v = self.read(ea); self.op_ldx(v) }

            0xA0 => { let v = self.fetch(); self.op_ldy(v) }
            0xA4 => { let ea = self.ea_zp(); let v = self.read(ea); self.op_ldy(v) }
            0xB4 => { let ea = self.ea_zp_x(); let v = self.read(ea); self.op_ldy(v) }
            0xAC => { let ea = self.ea_abs(); let v = self.read(ea); self.op_ldy(v) }
            0xBC => { let ea = self.ea_abs_x(); let v = self.read(ea); self.op_ldy(v) }

            // --- Stores ---
            0x85 => { let ea = self.ea_zp(); self.write(ea, self.a) }
            0x95 => { let ea = self.ea_zp_x(); self.write(ea, self.a) }
            0x8D => { let ea = self.ea_abs(); self.write(ea, self.a) }
            0x9D => { let ea = self.ea_abs_x(); self.write(ea, self.a) }
            0x99 => { let ea = self.ea_abs_y(); self.write(ea, self.a) }
            0x81 => { let ea = self.ea_ind_x(); self.write(ea, self.a) }
            0x91 => { let ea = self.ea_ind_y(); self.write(ea, self.a) }

            0x86 => { let ea = self.ea_zp(); self.write(ea, self.x) }
            0x96 => { let ea = self.ea_zp_y(); self.write(ea, self.x) }
            0x8E => { let ea = self.ea_abs(); self.write(ea, self.x) }

            0x84 => { let ea = self.ea_zp(); self.write(ea, self.y) }
            0x94 => { let ea = self.ea_zp_x(); self.write(ea, self.y) }
            0x8C => { let ea = self.ea_abs(); self.write(ea, self.y) }

            // --- Transfers ---
            0xAA => self.op_tax(),
            0xA8 => self.op_tay(),
            0x8A => self.op_txa(),
            0x98 => self.op_tya(),
            0xBA => self.op_tsx(),
            0x9A => self.sp = self.x,

            // --- ADC / SBC ---
            0x69 => { let v = self.fetch(); self.op_adc(v) }
            0x65 => { let ea = self.ea_zp(); let v = self.read(ea); self.op_adc(v) }
            0x75 => { let ea = self.ea_zp_x(); let v = self.read(ea); self.op_adc(v) }
            0x6D => { let ea = self.ea_abs(); let v = self.read(ea); self.op_adc(v) }
            0x7D => { let ea = self.ea_abs_x(); let v = self.read(ea); self.op_adc(v) }
            0x79 => { let ea = self.ea_abs_y(); let v = self.read(ea); self.op_adc(v) }
            0x61 => { let ea = self.ea_ind_x(); let v = self.read(ea); self.op_adc(v) }
            0x71 => { let ea = self.ea_ind_y(); let v = self.read(ea); self.op_adc(v) }

            0xE9 => { let v = self.fetch(); self.op_sbc(v) }
            0xE5 => { let ea = self.ea_zp(); let v = self.read(ea); self.op_sbc(v) }
            0xF5 => { let ea = self.ea_zp_x(); let v = self.read(ea); self.op_sbc(v) }
            0xED => { let ea = self.ea_abs(); let v = self.read(ea); self.op_sbc(v) }
            0xFD => { let ea = self.ea_abs_x(); let v = self.read(ea); self.op_sbc(v) }
            0xF9 => { let ea = self.ea_abs_y(); let v = self.read(ea); self.op_sbc(v) }
            0xE1 => { let ea = self.ea_ind_x(); let v = self.read(ea); self.op_sbc(v) }
            0xF1 => { let ea = self.ea_ind_y(); let v = self.read(ea); self.op_sbc(v) }

            // --- Compares ---
            0xC9 => { let v = self.fetch(); self.compare(self.a, v) }
            0xC5 => { let ea = self.ea_zp(); let v = self.read(ea); self.compare(self.a, v) }
            0xD5 => { let ea = self.ea_zp_x(); let v = self.read(ea); self.compare(self.a, v) }
            0xCD => { let ea = self.ea_abs(); let v = self.read(ea); self.compare(self.a, v) }
            0xDD => { let ea = self.ea_abs_x(); let v = self.read(ea); self.compare(self.a, v) }
            0xD9 => { let ea = self.ea_abs_y(); let v = self.read(ea); self.compare(self.a, v) }
            0xC1 => { let ea = self.ea_ind_x(); let v = self.read(ea); self.compare(self.a, v) }
            0xD1 => { let ea = self.ea_ind_y(); let v = self.read(ea); self.compare(self.a, v) }

            0xE0 => { let v = self.fetch(); self.compare(self.x, v) }
            0xE4 => { let ea = self.ea_zp(); let v = self.read(ea); self.compare(self.x, v) }
            0xEC => { let ea = self.ea_abs(); let v = self.read(ea); self.compare(self.x, v) }

            0xC0 => { let v = self.fetch(); self.compare(self.y, v) }
            0xC4 => { let ea = self.ea_zp(); let v = self.read(ea); self.compare(self.y, v) }
            0xCC => { let ea = self.ea_abs(); let v = self.read(ea); self.compare(self.y, v) }

            // --- Logic ---
            0x29 => { let v = self.fetch(); self.op_and(v) }
            0x25 => { let ea = self.ea_zp(); let v = self.read(ea); self.op_and(v) }
            0x35 => { let ea = self.ea_zp_x(); let v = self.read(ea); self.op_and(v) }
            0x2D => { let ea = self.ea_abs(); let v = self.read(ea); self.op_and(v) }
            0x3D => { let ea = self.ea_abs_x(); let v = self.read(ea); self.op_and(v) }
            0x39 => { let ea = self.ea_abs_y(); let v = self.read(ea); self.op_and(v) }
            0x21 => { let ea = self.ea_ind_x(); let v = self.read(ea); self.op_and(v) }
            0x31 => { let ea = self.ea_ind_y(); let v = self.read(ea); self.op_and(v) }

            0x09 => { let v = self.fetch(); self.op_ora(v) }
            0x05 => { let ea = self.ea_zp(); let v = self.read(ea); self.op_ora(v) }
            0x15 => { let ea = self.ea_zp_x(); let v = self.read(ea); self.op_ora(v) }
            0x0D => { let ea = self.ea_abs(); let v = self.read(ea); self.op_ora(v) }
            0x1D => { let ea = self.ea_abs_x(); let v = self.read(ea); self.op_ora(v) }
            0x19 => { let ea = self.ea_abs_y(); let v = self.read(ea); self.op_ora(v) }
            0x01 => { let ea = self.ea_ind_x(); let v = self.read(ea); self.op_ora(v) }
            0x11 => { let ea = self.ea_ind_y(); let v = self.read(ea); self.op_ora(v) }

            0x49 => { let v = self.fetch(); self.op_eor(v) }
            0x45 => { let ea = self.ea_zp(); let v = self.read(ea); self.op_eor(v) }
            0x55 => { let ea = self.ea_zp_x(); let v = self.read(ea); self.op_eor(v) }
            0x4D => { let ea = self.ea_abs(); let v = self.read(ea); self.op_eor(v) }
            0x5D => { let ea = self.ea_abs_x(); let v = self.read(ea); self.op_eor(v) }
            0x59 => { let ea = self.ea_abs_y(); let v = self.read(ea); self.op_eor(v) }
            0x41 => { let ea = self.ea_ind_x(); let v = self.read(ea); self.op_eor(v) }
            0x51 => { let ea = self.ea_ind_y(); let v = self.read(ea); self.op_eor(v) }

            0x24 => { let ea = self.ea_zp(); self.op_bit(ea) }
            0x2C => { let ea = self.ea_abs(); self.op_bit(ea) }

            // --- Shifts and memory inc/dec ---
            0x0A => self.op_asl_a(),
            0x06 => { let ea = self.ea_zp(); self.op_asl_mem(ea) }
            0x16 => { let ea = self.ea_zp_x(); self.op_asl_mem(ea) }
            0x0E => { let ea = self.ea_abs(); self.op_asl_mem(ea) }
            0x1E => { let ea = self.ea_abs_x(); self.op_asl_mem(ea) }

            0x4A => self.op_lsr_a(),
            0x46 => { let ea = self.ea_zp(); self.op_lsr_mem(ea) }
            0x56 => { let ea = self.ea_zp_x(); self.op_lsr_mem(ea) }
            0x4E => { let ea = self.ea_abs(); self.op_lsr_mem(ea) }
            0x5E => { let ea = self.ea_abs_x(); self.op_lsr_mem(ea) }

            0x2A => self.op_rol_a(),
            0x26 => { let ea = self.ea_zp(); self.op_rol_mem(ea) }
            0x36 => { let ea = self.ea_zp_x(); self.op_rol_mem(ea) }
            0x2E => { let ea = self.ea_abs(); self.op_rol_mem(ea) }
            0x3E => { let ea = self.ea_abs_x(); self.op_rol_mem(ea) }

            0x6A => self.op_ror_a(),
            0x66 => { let ea = self.ea_zp(); self.op_ror_mem(ea) }
            0x76 => { let ea = self.ea_zp_x(); self.op_ror_mem(ea) }
            0x6E => { let ea = self.ea_abs(); self.op_ror_mem(ea) }
            0x7E => { let ea = self.ea_abs_x(); self.op_ror_mem(ea) }

            0xE6 => { let ea = self.ea_zp(); self.op_inc_mem(ea) }
            0xF6 => { let ea = self.ea_zp_x(); self.op_inc_mem(ea) }
            0xEE => { let ea = self.ea_abs(); self.op_inc_mem(ea) }
            0xFE => { let ea = self.ea_abs_x(); self.op_inc_mem(ea) }

            0xC6 => { let ea = self.ea_zp(); self.op_dec_mem(ea) }
            0xD6 => { let ea = self.ea_zp_x(); self.op_dec_mem(ea) }
            0xCE => { let ea = self.ea_abs(); self.op_dec_mem(ea) }
            0xDE => { let ea = self.ea_abs_x(); self.op_dec_mem(ea) }

            0xE8 => { self.x = self.x.wrapping_add(1); let x = self.x; self.set_nz(x) }
            0xC8 => { self.y = self.y.wrapping_add(1); let y = self.y; self.set_nz(y) }
            0xCA => { self.x = self.x.wrapping_sub(1); let x = self.x; self.set_nz(x) }
            0x88 => { self.y = self.y.wrapping_sub(1); let y = self.y; self.set_nz(y) }

            // --- Flag operations ---
            0x18 => self.set_flag(StatusFlag::C, false),
            0x38 => self.set_flag(StatusFlag::C, true),
            0x58 => self.set_flag(StatusFlag::I, false),
            0x78 => self.set_flag(StatusFlag::I, true),
            0xB8 => self.set_flag(StatusFlag::V, false),
            0xD8 => self.set_flag(StatusFlag::D, false),
            0xF8 => self.set_flag(StatusFlag::D, true),

            // --- Branches and jumps ---
            0x10 => self.branch_if(!self.test_flag(StatusFlag::N)),
            0x30 => self.branch_if(self.test_flag(StatusFlag::N)),
            0x50 => self.branch_if(!self.test_flag(StatusFlag::V)),
            0x70 => self.branch_if(self.test_flag(StatusFlag::V)),
            0x90 => self.branch_if(!self.test_flag(StatusFlag::C)),
            0xB0 => self.branch_if(self.test_flag(StatusFlag::C)),
            0xD0 => self.branch_if(!self.test_flag(StatusFlag::Z)),
            0xF0 => self.branch_if(self.test_flag(StatusFlag::Z)),

            0x4C => self.pc = self.fetch16(),
            0x6C => { let ptr = self.fetch16(); self.pc = self.read16_pagewrap(ptr) }
            0x20 => self.op_jsr(),
            0x60 => self.op_rts(),
            0x00 => self.op_brk(),
            0x40 => self.op_rti(),

            // --- Stack ---
            0x48 => self.push(self.a),
            0x68 => self.op_pla(),
            0x08 => self.op_php(),
            0x28 => self.op_plp(),

            0xEA => {} // NOP

            other => {
                // Undocumented opcodes jam this core.
                log::warn!("m6502: jam on opcode {other:#04x} at {:#06x}", self.pc.wrapping_sub(1));
                self.jammed = true;
            }
        }
    }

    pub(crate) fn interrupt(&mut self, vector: u16, brk: bool) {
        let pc = self.pc;
        self.push((pc >> 8) as u8);
        self.push(pc as u8);
        let mut p = self.p | StatusFlag::U as u8;
        if brk {
            p |= StatusFlag::B as u8;
        } else {
            p &= !(StatusFlag::B as u8);
        }
        self.push(p);
        self.set_flag(StatusFlag::I, true);
        self.pc = self.read16(vector);
        self.jammed = false;
    }
}

impl CpuCore for M6502 {
    fn reset(&mut self) {
        self.a = 0;
        self.x = 0;
        self.y = 0;
        self.sp = 0xFD;
        self.p = 0x24;
        self.jammed = false;
        self.pc = self.read16(0xFFFC);
    }

    fn step(&mut self) {
        self.step_one();
    }

    fn execute(&mut self) {
        while self.running.load(Ordering::Relaxed) && !self.jammed {
            self.step_one();
        }
    }

    fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    fn instruction_count(&self) -> u64 {
        self.instructions
    }
}
