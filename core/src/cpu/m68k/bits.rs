//! Single-bit manipulation: BTST / BCHG / BCLR / BSET in their static and
//! dynamic forms. On a data register the bit number is taken modulo 32;
//! on memory the operand is one byte and the number is modulo 8.

use super::{Ea, Exception, M68k, Size, Sr};

impl M68k {
    pub(crate) fn op_bit_dynamic(&mut self, op: u16) -> Result<(), Exception> {
        let bit = self.d[(op >> 9 & 7) as usize];
        self.bit_common(op, bit)
    }

    pub(crate) fn op_bit_static(&mut self, op: u16) -> Result<(), Exception> {
        let bit = self.fetch_word() as u32;
        self.bit_common(op, bit)
    }

    fn bit_common(&mut self, op: u16, bit: u32) -> Result<(), Exception> {
        let kind = op >> 6 & 3;
        let mode = op >> 3 & 7;
        let reg = op & 7;
        let on_register = mode == 0;
        let size = if on_register { Size::Long } else { Size::Byte };
        let ea = self.ea_resolve(mode, reg, size)?;
        if matches!(ea, Ea::AddrReg(_)) {
            return Err(Exception::Illegal);
        }
        // BTST tolerates immediate sources; the modifying forms do not.
        if kind != 0 && !Self::ea_is_writable(ea) {
            return Err(Exception::Illegal);
        }
        let bit = bit % if on_register { 32 } else { 8 };
        let val = self.ea_read(ea, size);
        self.set_flag(Sr::ZERO, val >> bit & 1 == 0);
        let new = match kind {
            0 => return Ok(()),       // BTST
            1 => val ^ 1 << bit,      // BCHG
            2 => val & !(1 << bit),   // BCLR
            _ => val | 1 << bit,      // BSET
        };
        self.ea_write(ea, new, size);
        Ok(())
    }
}
