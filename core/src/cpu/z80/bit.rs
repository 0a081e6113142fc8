//! The CB sub-table: rotates, shifts and bit test/set/reset.
//!
//! With an index prefix the displacement byte precedes the sub-opcode
//! (DD CB d op) and every operation targets `(IX+d)`.

use super::{Index, StatusFlag, Z80};

impl Z80 {
    pub(crate) fn exec_cb(&mut self, idx: Index) {
        if idx == Index::Hl {
            let op = self.fetch();
            let code = op & 7;
            match op >> 6 {
                0 => {
                    let v = self.reg8(code, Index::Hl);
                    let r = self.rotate_shift(op >> 3 & 7, v);
                    self.set_reg8(code, Index::Hl, r);
                }
                1 => {
                    let v = self.reg8(code, Index::Hl);
                    self.op_bit_test(op >> 3 & 7, v);
                }
                2 => {
                    let v = self.reg8(code, Index::Hl);
                    self.set_reg8(code, Index::Hl, v & !(1 << (op >> 3 & 7)));
                }
                _ => {
                    let v = self.reg8(code, Index::Hl);
                    self.set_reg8(code, Index::Hl, v | 1 << (op >> 3 & 7));
                }
            }
        } else {
            // Indexed form: displacement first, memory operand only.
            let d = self.fetch() as i8 as i16;
            let addr = self.index_pair(idx).wrapping_add_signed(d);
            let op = self.fetch();
            let v = self.read(addr);
            match op >> 6 {
                0 => {
                    let r = self.rotate_shift(op >> 3 & 7, v);
                    self.write(addr, r);
                }
                1 => self.op_bit_test(op >> 3 & 7, v),
                2 => self.write(addr, v & !(1 << (op >> 3 & 7))),
                _ => self.write(addr, v | 1 << (op >> 3 & 7)),
            }
        }
    }

    /// RLC/RRC/RL/RR/SLA/SRA/SLL→SLA/SRL with full logic flags.
    fn rotate_shift(&mut self, sel: u8, v: u8) -> u8 {
        let old_c = self.test_flag(StatusFlag::C) as u8;
        let (r, c) = match sel {
            0 => (v << 1 | v >> 7, v & 0x80 != 0),       // RLC
            1 => (v >> 1 | v << 7, v & 1 != 0),          // RRC
            2 => (v << 1 | old_c, v & 0x80 != 0),        // RL
            3 => (v >> 1 | old_c << 7, v & 1 != 0),      // RR
            4 => (v << 1, v & 0x80 != 0),                // SLA
            5 => (v >> 1 | v & 0x80, v & 1 != 0),        // SRA
            6 => (v << 1, v & 0x80 != 0),                // (undoc slot) as SLA
            _ => (v >> 1, v & 1 != 0),                   // SRL
        };
        self.flags_szp(r);
        self.set_flag(StatusFlag::H, false);
        self.set_flag(StatusFlag::N, false);
        self.set_flag(StatusFlag::C, c);
        r
    }

    fn op_bit_test(&mut self, bit: u8, v: u8) {
        let set = v & 1 << bit != 0;
        self.set_flag(StatusFlag::Z, !set);
        self.set_flag(StatusFlag::PV, !set);
        self.set_flag(StatusFlag::S, bit == 7 && set);
        self.set_flag(StatusFlag::H, true);
        self.set_flag(StatusFlag::N, false);
    }
}
