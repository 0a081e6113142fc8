//! Register loads and transfers.

use super::M6502;

impl M6502 {
    pub(crate) fn op_lda(&mut self, v: u8) {
        self.a = v;
        self.set_nz(v);
    }

    pub(crate) fn op_ldx(&mut self, v: u8) {
        self.x = v;
        self.set_nz(v);
    }

    pub(crate) fn op_ldy(&mut self, v: u8) {
        self.y = v;
        self.set_nz(v);
    }

    pub(crate) fn op_tax(&mut self) {
        self.x = self.a;
        let v = self.x;
        self.set_nz(v);
    }

    pub(crate) fn op_tay(&mut self) {
        self.y = self.a;
        let v = self.y;
        self.set_nz(v);
    }

    pub(crate) fn op_txa(&mut self) {
        self.a = self.x;
        let v = self.a;
        self.set_nz(v);
    }

    pub(crate) fn op_tya(&mut self) {
        self.a = self.y;
        let v = self.a;
        self.set_nz(v);
    }

    pub(crate) fn op_tsx(&mut self) {
        self.x = self.sp;
        let v = self.x;
        self.set_nz(v);
    }
}
