//! Loads, exchanges, stack moves and the unprefixed-miscellaneous decode.

use super::{Index, StatusFlag, Z80};

impl Z80 {
    /// LD r,r' (0x40-0x7F, HALT excluded by the caller). With an index
    /// prefix only the memory operand is remapped.
    pub(crate) fn op_ld_rr(&mut self, op: u8, idx: Index) {
        let dst = op >> 3 & 7;
        let src = op & 7;
        let eff = if dst == 6 || src == 6 { idx } else { Index::Hl };
        let v = self.reg8(src, eff);
        self.set_reg8(dst, eff, v);
    }

    /// LD r,n — for the memory operand the displacement precedes the
    /// immediate in the instruction stream.
    fn op_ld_r_n(&mut self, code: u8, idx: Index) {
        if code == 6 {
            let addr = self.mem_operand_addr(idx);
            let n = self.fetch();
            self.write(addr, n);
        } else {
            let n = self.fetch();
            self.set_reg8(code, Index::Hl, n);
        }
    }

    /// INC/DEC r: the memory form resolves its address exactly once.
    fn op_inc_dec_r(&mut self, code: u8, idx: Index, dec: bool) {
        if code == 6 {
            let addr = self.mem_operand_addr(idx);
            let v = self.read(addr);
            let r = if dec { self.dec8(v) } else { self.inc8(v) };
            self.write(addr, r);
        } else {
            let v = self.reg8(code, Index::Hl);
            let r = if dec { self.dec8(v) } else { self.inc8(v) };
            self.set_reg8(code, Index::Hl, r);
        }
    }

    /// Everything outside the LD-block, ALU-block and prefix opcodes.
    pub(crate) fn exec_misc(&mut self, op: u8, idx: Index) {
        match op {
            0x00 => {} // NOP

            // 16-bit immediate loads.
            0x01 | 0x11 | 0x21 | 0x31 => {
                let v = self.fetch16();
                self.set_pair_sp(op >> 4 & 3, idx, v);
            }

            // Accumulator <-> pointer pairs.
            0x02 => self.write(self.bc(), self.a),
            0x12 => self.write(self.de(), self.a),
            0x0A => {
                self.a = self.read(self.bc());
            }
            0x1A => {
                self.a = self.read(self.de());
            }

            // Direct-address forms.
            0x22 => {
                let addr = self.fetch16();
                self.write16(addr, self.index_pair(idx));
            }
            0x2A => {
                let addr = self.fetch16();
                let v = self.read16(addr);
                self.set_index_pair(idx, v);
            }
            0x32 => {
                let addr = self.fetch16();
                self.write(addr, self.a);
            }
            0x3A => {
                let addr = self.fetch16();
                self.a = self.read(addr);
            }

            // 16-bit inc/dec (no flags).
            0x03 | 0x13 | 0x23 | 0x33 => {
                let code = op >> 4 & 3;
                let v = self.pair_sp(code, idx).wrapping_add(1);
                self.set_pair_sp(code, idx, v);
            }
            0x0B | 0x1B | 0x2B | 0x3B => {
                let code = op >> 4 & 3;
                let v = self.pair_sp(code, idx).wrapping_sub(1);
                self.set_pair_sp(code, idx, v);
            }

            // 8-bit inc/dec and immediate loads.
            0x04 | 0x0C | 0x14 | 0x1C | 0x24 | 0x2C | 0x34 | 0x3C => {
                self.op_inc_dec_r(op >> 3 & 7, idx, false);
            }
            0x05 | 0x0D | 0x15 | 0x1D | 0x25 | 0x2D | 0x35 | 0x3D => {
                self.op_inc_dec_r(op >> 3 & 7, idx, true);
            }
            0x06 | 0x0E | 0x16 | 0x1E | 0x26 | 0x2E | 0x36 | 0x3E => {
                self.op_ld_r_n(op >> 3 & 7, idx);
            }

            // Accumulator rotates and flag ops.
            0x07 => self.op_rlca(),
            0x0F => self.op_rrca(),
            0x17 => self.op_rla(),
            0x1F => self.op_rra(),
            0x27 => self.op_daa(),
            0x2F => self.op_cpl(),
            0x37 => self.op_scf(),
            0x3F => self.op_ccf(),

            // Relative control flow.
            0x08 => self.swap_af(),
            0x10 => self.op_djnz(),
            0x18 => self.op_jr(true),
            0x20 | 0x28 | 0x30 | 0x38 => {
                let cc = self.condition(op >> 3 & 3);
                self.op_jr(cc);
            }

            // 16-bit adds onto the index pair.
            0x09 | 0x19 | 0x29 | 0x39 => {
                let rhs = self.pair_sp(op >> 4 & 3, idx);
                self.op_add16(idx, rhs);
            }

            // Returns, jumps, calls.
            0xC9 => self.op_ret(),
            0xC0 | 0xC8 | 0xD0 | 0xD8 | 0xE0 | 0xE8 | 0xF0 | 0xF8 => {
                if self.condition(op >> 3 & 7) {
                    self.op_ret();
                }
            }
            0xC3 => self.pc = self.fetch16(),
            0xC2 | 0xCA | 0xD2 | 0xDA | 0xE2 | 0xEA | 0xF2 | 0xFA => {
                let target = self.fetch16();
                if self.condition(op >> 3 & 7) {
                    self.pc = target;
                }
            }
            0xCD => self.op_call(),
            0xC4 | 0xCC | 0xD4 | 0xDC | 0xE4 | 0xEC | 0xF4 | 0xFC => {
                let target = self.fetch16();
                if self.condition(op >> 3 & 7) {
                    let pc = self.pc;
                    self.push16(pc);
                    self.pc = target;
                }
            }
            0xC7 | 0xCF | 0xD7 | 0xDF | 0xE7 | 0xEF | 0xF7 | 0xFF => {
                let pc = self.pc;
                self.push16(pc);
                self.pc = (op & 0x38) as u16;
            }
            0xE9 => self.pc = self.index_pair(idx),

            // Stack pairs (AF in slot 3).
            0xC1 | 0xD1 | 0xE1 | 0xF1 => {
                let v = self.pop16();
                match op >> 4 & 3 {
                    0 => self.set_bc(v),
                    1 => self.set_de(v),
                    2 => self.set_index_pair(idx, v),
                    _ => self.set_af(v),
                }
            }
            0xC5 | 0xD5 | 0xE5 | 0xF5 => {
                let v = match op >> 4 & 3 {
                    0 => self.bc(),
                    1 => self.de(),
                    2 => self.index_pair(idx),
                    _ => self.af(),
                };
                self.push16(v);
            }

            // ALU A,n.
            0xC6 | 0xCE | 0xD6 | 0xDE | 0xE6 | 0xEE | 0xF6 | 0xFE => {
                let n = self.fetch();
                self.alu_a(op >> 3 & 7, n);
            }

            // I/O.
            0xD3 => {
                let port = self.fetch();
                self.io_write(port, self.a);
            }
            0xDB => {
                let port = self.fetch();
                self.a = self.io_read(port);
            }

            // Exchanges.
            0xD9 => self.swap_shadow(),
            0xE3 => {
                let sp = self.sp;
                let mem = self.read16(sp);
                let pair = self.index_pair(idx);
                self.write16(sp, pair);
                self.set_index_pair(idx, mem);
            }
            0xEB => {
                // EX DE,HL is never index-remapped.
                let de = self.de();
                let hl = self.hl();
                self.set_de(hl);
                self.set_hl(de);
            }
            0xF9 => self.sp = self.index_pair(idx),

            // Interrupt enables.
            0xF3 => self.set_interrupt_state(false),
            0xFB => self.set_interrupt_state(true),

            other => {
                log::warn!("z80: unhandled opcode {other:#04x} at {:#06x}", self.pc.wrapping_sub(1));
            }
        }
    }

    /// Condition codes in the 3-bit encoding (NZ, Z, NC, C, PO, PE, P, M).
    /// The 2-bit JR form passes 0-3 and lines up with the first four.
    pub(crate) fn condition(&self, code: u8) -> bool {
        match code {
            0 => !self.test_flag(StatusFlag::Z),
            1 => self.test_flag(StatusFlag::Z),
            2 => !self.test_flag(StatusFlag::C),
            3 => self.test_flag(StatusFlag::C),
            4 => !self.test_flag(StatusFlag::PV),
            5 => self.test_flag(StatusFlag::PV),
            6 => !self.test_flag(StatusFlag::S),
            _ => self.test_flag(StatusFlag::S),
        }
    }
}
