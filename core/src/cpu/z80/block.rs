//! The ED sub-table: 16-bit carry arithmetic, register/interrupt plumbing
//! and the block transfer/search/I-O instructions.

use super::{StatusFlag, Z80};

impl Z80 {
    pub(crate) fn exec_ed(&mut self) {
        let op = self.fetch();
        match op {
            // IN r,(C) / OUT (C),r.
            0x40 | 0x48 | 0x50 | 0x58 | 0x60 | 0x68 | 0x78 => {
                let v = self.io_read(self.c);
                self.set_reg8(op >> 3 & 7, super::Index::Hl, v);
                self.flags_szp(v);
                self.set_flag(StatusFlag::H, false);
                self.set_flag(StatusFlag::N, false);
            }
            0x70 => {
                // IN (C): flags only.
                let v = self.io_read(self.c);
                self.flags_szp(v);
                self.set_flag(StatusFlag::H, false);
                self.set_flag(StatusFlag::N, false);
            }
            0x41 | 0x49 | 0x51 | 0x59 | 0x61 | 0x69 | 0x79 => {
                let v = self.reg8(op >> 3 & 7, super::Index::Hl);
                self.io_write(self.c, v);
            }
            0x71 => self.io_write(self.c, 0),

            // 16-bit carry arithmetic.
            0x42 | 0x52 | 0x62 | 0x72 => {
                let rhs = self.pair_sp(op >> 4 & 3, super::Index::Hl);
                self.op_sbc16(rhs);
            }
            0x4A | 0x5A | 0x6A | 0x7A => {
                let rhs = self.pair_sp(op >> 4 & 3, super::Index::Hl);
                self.op_adc16(rhs);
            }

            // Pair <-> direct address.
            0x43 | 0x53 | 0x63 | 0x73 => {
                let addr = self.fetch16();
                let v = self.pair_sp(op >> 4 & 3, super::Index::Hl);
                self.write16(addr, v);
            }
            0x4B | 0x5B | 0x6B | 0x7B => {
                let addr = self.fetch16();
                let v = self.read16(addr);
                self.set_pair_sp(op >> 4 & 3, super::Index::Hl, v);
            }

            0x44 => self.op_neg(),
            0x45 => {
                // RETN restores the pre-NMI interrupt state.
                self.restore_iff();
                self.pc = self.pop16();
            }
            0x4D => self.pc = self.pop16(), // RETI
            0x46 => self.im_set(0),
            0x56 => self.im_set(1),
            0x5E => self.im_set(2),

            0x47 => self.i = self.a,
            0x4F => self.r = self.a,
            0x57 => {
                self.a = self.i;
                let (a, iff2) = (self.a, self.iff2_bit());
                self.flags_szp(a);
                self.set_flag(StatusFlag::PV, iff2);
                self.set_flag(StatusFlag::H, false);
                self.set_flag(StatusFlag::N, false);
            }
            0x5F => {
                self.a = self.r;
                let (a, iff2) = (self.a, self.iff2_bit());
                self.flags_szp(a);
                self.set_flag(StatusFlag::PV, iff2);
                self.set_flag(StatusFlag::H, false);
                self.set_flag(StatusFlag::N, false);
            }

            // Nibble rotates through (HL).
            0x67 => {
                // RRD
                let hl = self.hl();
                let m = self.read(hl);
                let a = self.a;
                self.write(hl, a << 4 | m >> 4);
                self.a = a & 0xF0 | m & 0x0F;
                let na = self.a;
                self.flags_szp(na);
                self.set_flag(StatusFlag::H, false);
                self.set_flag(StatusFlag::N, false);
            }
            0x6F => {
                // RLD
                let hl = self.hl();
                let m = self.read(hl);
                let a = self.a;
                self.write(hl, m << 4 | a & 0x0F);
                self.a = a & 0xF0 | m >> 4;
                let na = self.a;
                self.flags_szp(na);
                self.set_flag(StatusFlag::H, false);
                self.set_flag(StatusFlag::N, false);
            }

            // Block operations.
            0xA0 => self.block_ld(1, false),
            0xA8 => self.block_ld(-1, false),
            0xB0 => self.block_ld(1, true),
            0xB8 => self.block_ld(-1, true),
            0xA1 => self.block_cp(1, false),
            0xA9 => self.block_cp(-1, false),
            0xB1 => self.block_cp(1, true),
            0xB9 => self.block_cp(-1, true),
            0xA2 => self.block_in(1, false),
            0xAA => self.block_in(-1, false),
            0xB2 => self.block_in(1, true),
            0xBA => self.block_in(-1, true),
            0xA3 => self.block_out(1, false),
            0xAB => self.block_out(-1, false),
            0xB3 => self.block_out(1, true),
            0xBB => self.block_out(-1, true),

            other => {
                log::warn!("z80: unhandled ED opcode {other:#04x}");
            }
        }
    }

    /// LDI/LDD/LDIR/LDDR. Repeat forms rewind PC so the instruction
    /// refetches until BC runs out, which keeps interrupts serviceable.
    fn block_ld(&mut self, dir: i16, repeat: bool) {
        let v = self.read(self.hl());
        self.write(self.de(), v);
        self.set_hl(self.hl().wrapping_add_signed(dir));
        self.set_de(self.de().wrapping_add_signed(dir));
        self.set_bc(self.bc().wrapping_sub(1));
        self.set_flag(StatusFlag::H, false);
        self.set_flag(StatusFlag::N, false);
        self.set_flag(StatusFlag::PV, self.bc() != 0);
        let n = v.wrapping_add(self.a);
        self.set_flag(StatusFlag::F5, n & 0x02 != 0);
        self.set_flag(StatusFlag::F3, n & 0x08 != 0);
        if repeat && self.bc() != 0 {
            self.pc = self.pc.wrapping_sub(2);
        }
    }

    /// CPI/CPD/CPIR/CPDR.
    fn block_cp(&mut self, dir: i16, repeat: bool) {
        let v = self.read(self.hl());
        let a = self.a;
        let r = a.wrapping_sub(v);
        self.set_hl(self.hl().wrapping_add_signed(dir));
        self.set_bc(self.bc().wrapping_sub(1));
        self.set_flag(StatusFlag::S, r & 0x80 != 0);
        self.set_flag(StatusFlag::Z, r == 0);
        self.set_flag(StatusFlag::H, a & 0x0F < v & 0x0F);
        self.set_flag(StatusFlag::PV, self.bc() != 0);
        self.set_flag(StatusFlag::N, true);
        if repeat && self.bc() != 0 && r != 0 {
            self.pc = self.pc.wrapping_sub(2);
        }
    }

    /// INI/IND/INIR/INDR.
    fn block_in(&mut self, dir: i16, repeat: bool) {
        let v = self.io_read(self.c);
        self.write(self.hl(), v);
        self.set_hl(self.hl().wrapping_add_signed(dir));
        self.b = self.b.wrapping_sub(1);
        self.set_flag(StatusFlag::Z, self.b == 0);
        self.set_flag(StatusFlag::N, true);
        if repeat && self.b != 0 {
            self.pc = self.pc.wrapping_sub(2);
        }
    }

    /// OUTI/OUTD/OTIR/OTDR.
    fn block_out(&mut self, dir: i16, repeat: bool) {
        let v = self.read(self.hl());
        self.io_write(self.c, v);
        self.set_hl(self.hl().wrapping_add_signed(dir));
        self.b = self.b.wrapping_sub(1);
        self.set_flag(StatusFlag::Z, self.b == 0);
        self.set_flag(StatusFlag::N, true);
        if repeat && self.b != 0 {
            self.pc = self.pc.wrapping_sub(2);
        }
    }
}
