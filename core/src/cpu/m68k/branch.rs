//! Branches, conditional set/decrement forms and the subroutine and
//! exception returns.

use super::{Exception, M68k, Size, Sr};

impl M68k {
    /// Evaluate one of the 16 condition codes.
    pub(crate) fn condition(&self, cc: u16) -> bool {
        let c = self.flag(Sr::CARRY);
        let v = self.flag(Sr::OVERFLOW);
        let z = self.flag(Sr::ZERO);
        let n = self.flag(Sr::NEGATIVE);
        match cc & 0xF {
            0x0 => true,         // T
            0x1 => false,        // F
            0x2 => !c && !z,     // HI
            0x3 => c || z,       // LS
            0x4 => !c,           // CC
            0x5 => c,            // CS
            0x6 => !z,           // NE
            0x7 => z,            // EQ
            0x8 => !v,           // VC
            0x9 => v,            // VS
            0xA => !n,           // PL
            0xB => n,            // MI
            0xC => n == v,       // GE
            0xD => n != v,       // LT
            0xE => !z && n == v, // GT
            _ => z || n != v,    // LE
        }
    }

    /// Bcc / BRA / BSR with 8-, 16- and (68020) 32-bit displacements.
    pub(crate) fn op_bcc(&mut self, op: u16) -> Result<(), Exception> {
        let cond = op >> 8 & 0xF;
        let base = self.pc;
        let disp8 = op as u8;
        let disp = match disp8 {
            0x00 => self.fetch_word() as i16 as i32,
            0xFF => self.fetch_long() as i32,
            d => d as i8 as i32,
        };
        match cond {
            1 => {
                // BSR
                let ret = self.pc;
                self.push32(ret);
                self.pc = base.wrapping_add_signed(disp);
            }
            _ => {
                if self.condition(cond) {
                    self.pc = base.wrapping_add_signed(disp);
                }
            }
        }
        Ok(())
    }

    /// DBcc: exit when the condition holds, otherwise decrement and loop
    /// until the counter wraps past zero.
    pub(crate) fn op_dbcc(&mut self, op: u16) -> Result<(), Exception> {
        let base = self.pc;
        let disp = self.fetch_word() as i16 as i32;
        if self.condition(op >> 8 & 0xF) {
            return Ok(());
        }
        let reg = (op & 7) as usize;
        let counter = (self.d[reg] as u16).wrapping_sub(1);
        self.d[reg] = self.d[reg] & 0xFFFF_0000 | counter as u32;
        if counter != 0xFFFF {
            self.pc = base.wrapping_add_signed(disp);
        }
        Ok(())
    }

    /// Scc: set the destination byte to all-ones or all-zeroes.
    pub(crate) fn op_scc(&mut self, op: u16) -> Result<(), Exception> {
        let ea = self.ea_resolve(op >> 3 & 7, op & 7, Size::Byte)?;
        if matches!(ea, super::Ea::AddrReg(_)) || !Self::ea_is_writable(ea) {
            return Err(Exception::Illegal);
        }
        let val = if self.condition(op >> 8 & 0xF) { 0xFF } else { 0x00 };
        self.ea_write(ea, val, Size::Byte);
        Ok(())
    }

    pub(crate) fn op_jmp(&mut self, op: u16) -> Result<(), Exception> {
        self.pc = self.ea_control_address(op >> 3 & 7, op & 7)?;
        Ok(())
    }

    pub(crate) fn op_jsr(&mut self, op: u16) -> Result<(), Exception> {
        let target = self.ea_control_address(op >> 3 & 7, op & 7)?;
        let ret = self.pc;
        self.push32(ret);
        self.pc = target;
        Ok(())
    }

    pub(crate) fn op_rts(&mut self) -> Result<(), Exception> {
        self.pc = self.pop32();
        Ok(())
    }

    /// RTR: restore CCR (word popped, only the flag byte lands) then PC.
    pub(crate) fn op_rtr(&mut self) -> Result<(), Exception> {
        let ccr = self.pop16();
        self.set_ccr(ccr);
        self.pc = self.pop32();
        Ok(())
    }

    /// RTE: privileged; pops SR then PC, switching stacks if the restored
    /// SR drops back to user mode.
    pub(crate) fn op_rte(&mut self) -> Result<(), Exception> {
        if !self.flag(Sr::SUPERVISOR) {
            return Err(Exception::Privilege);
        }
        let sr = self.pop16();
        let pc = self.pop32();
        self.set_sr_all(sr);
        self.pc = pc;
        Ok(())
    }
}
