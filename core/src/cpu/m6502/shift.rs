//! Shifts, rotates and memory increment/decrement.

use super::{M6502, StatusFlag};

impl M6502 {
    fn asl(&mut self, v: u8) -> u8 {
        self.set_flag(StatusFlag::C, v & 0x80 != 0);
        let r = v << 1;
        self.set_nz(r);
        r
    }

    fn lsr(&mut self, v: u8) -> u8 {
        self.set_flag(StatusFlag::C, v & 1 != 0);
        let r = v >> 1;
        self.set_nz(r);
        r
    }

    fn rol(&mut self, v: u8) -> u8 {
        let carry_in = self.test_flag(StatusFlag::C) as u8;
        self.set_flag(StatusFlag::C, v & 0x80 != 0);
        let r = v << 1 | carry_in;
        self.set_nz(r);
        r
    }

    fn ror(&mut self, v: u8) -> u8 {
        let carry_in = (self.test_flag(StatusFlag::C) as u8) << 7;
        self.set_flag(StatusFlag::C, v & 1 != 0);
        let r = v >> 1 | carry_in;
        self.set_nz(r);
        r
    }

    pub(crate) fn op_asl_a(&mut self) {
        let v = self.a;
        self.a = self.asl(v);
    }

    pub(crate) fn op_asl_mem(&mut self, ea: u16) {
        let v = self.read(ea);
        let r = self.asl(v);
        self.write(ea, r);
    }

    pub(crate) fn op_lsr_a(&mut self) {
        let v = self.a;
        self.a = self.lsr(v);
    }

    pub(crate) fn op_lsr_mem(&mut self, ea: u16) {
        let v = self.read(ea);
        let r = self.lsr(v);
        self.write(ea, r);
    }

    pub(crate) fn op_rol_a(&mut self) {
        let v = self.a;
        self.a = self.rol(v);
    }

    pub(crate) fn op_rol_mem(&mut self, ea: u16) {
        let v = self.read(ea);
        let r = self.rol(v);
        self.write(ea, r);
    }

    pub(crate) fn op_ror_a(&mut self) {
        let v = self.a;
        self.a = self.ror(v);
    }

    pub(crate) fn op_ror_mem(&mut self, ea: u16) {
        let v = self.read(ea);
        let r = self.ror(v);
        self.write(ea, r);
    }

    pub(crate) fn op_inc_mem(&mut self, ea: u16) {
        let r = self.read(ea).wrapping_add(1);
        self.write(ea, r);
        self.set_nz(r);
    }

    pub(crate) fn op_dec_mem(&mut self, ea: u16) {
        let r = self.read(ea).wrapping_sub(1);
        self.write(ea, r);
        self.set_nz(r);
    }
}
