//! Relative jumps, calls and returns.

use super::Z80;

impl Z80 {
    pub(crate) fn op_jr(&mut self, take: bool) {
        let disp = self.fetch() as i8;
        if take {
            self.pc = self.pc.wrapping_add_signed(disp as i16);
        }
    }

    pub(crate) fn op_djnz(&mut self) {
        let disp = self.fetch() as i8;
        self.b = self.b.wrapping_sub(1);
        if self.b != 0 {
            self.pc = self.pc.wrapping_add_signed(disp as i16);
        }
    }

    pub(crate) fn op_call(&mut self) {
        let target = self.fetch16();
        let ret = self.pc;
        self.push16(ret);
        self.pc = target;
    }

    pub(crate) fn op_ret(&mut self) {
        self.pc = self.pop16();
    }
}
