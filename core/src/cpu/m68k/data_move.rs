//! Data movement: the MOVE family, quick and register-exchange forms,
//! address loads and the multi-register transfers.

use super::{Ea, Exception, M68k, Size, Sr};

impl M68k {
    /// MOVE / MOVEA (groups 1-3). The size field here is the historical
    /// odd one: 01 = byte, 11 = word, 10 = long.
    pub(crate) fn op_move(&mut self, op: u16) -> Result<(), Exception> {
        let size = match op >> 12 {
            1 => Size::Byte,
            3 => Size::Word,
            2 => Size::Long,
            _ => unreachable!(),
        };
        let src = self.ea_resolve(op >> 3 & 7, op & 7, size)?;
        if matches!(src, Ea::AddrReg(_)) && size == Size::Byte {
            return Err(Exception::Illegal);
        }
        let val = self.ea_read(src, size);

        let dst_mode = op >> 6 & 7;
        let dst_reg = op >> 9 & 7;
        if dst_mode == 1 {
            // MOVEA: sign-extends, no flags, byte size illegal.
            if size == Size::Byte {
                return Err(Exception::Illegal);
            }
            self.a[dst_reg as usize] = size.sext(val);
            return Ok(());
        }
        let dst = self.ea_resolve(dst_mode, dst_reg, size)?;
        if !Self::ea_is_writable(dst) {
            return Err(Exception::Illegal);
        }
        self.flags_logic(val, size);
        self.ea_write(dst, val, size);
        Ok(())
    }

    /// MOVEQ: 8-bit immediate sign-extended into a data register.
    pub(crate) fn op_moveq(&mut self, op: u16) -> Result<(), Exception> {
        if op & 0x0100 != 0 {
            return Err(Exception::Illegal);
        }
        let reg = (op >> 9 & 7) as usize;
        let val = op as u8 as i8 as i32 as u32;
        self.d[reg] = val;
        self.flags_logic(val, Size::Long);
        Ok(())
    }

    pub(crate) fn op_lea(&mut self, op: u16) -> Result<(), Exception> {
        let an = (op >> 9 & 7) as usize;
        let addr = self.ea_control_address(op >> 3 & 7, op & 7)?;
        self.a[an] = addr;
        Ok(())
    }

    pub(crate) fn op_pea(&mut self, op: u16) -> Result<(), Exception> {
        let addr = self.ea_control_address(op >> 3 & 7, op & 7)?;
        self.push32(addr);
        Ok(())
    }

    pub(crate) fn op_swap(&mut self, op: u16) -> Result<(), Exception> {
        let reg = (op & 7) as usize;
        let r = self.d[reg].rotate_left(16);
        self.d[reg] = r;
        self.flags_logic(r, Size::Long);
        Ok(())
    }

    /// EXG in its three encodings; `None` when the pattern is not EXG.
    pub(crate) fn try_exg(&mut self, op: u16) -> Option<()> {
        let rx = (op >> 9 & 7) as usize;
        let ry = (op & 7) as usize;
        match op & 0x01F8 {
            0x0140 => {
                self.d.swap(rx, ry);
                Some(())
            }
            0x0148 => {
                self.a.swap(rx, ry);
                Some(())
            }
            0x0188 => {
                std::mem::swap(&mut self.d[rx], &mut self.a[ry]);
                Some(())
            }
            _ => None,
        }
    }

    /// MOVEM: register list to memory (predecrement runs the mask in
    /// reverse) or memory to registers (word reads sign-extend).
    pub(crate) fn op_movem(&mut self, op: u16) -> Result<(), Exception> {
        let to_registers = op & 0x0400 != 0;
        let size = if op & 0x0040 != 0 { Size::Long } else { Size::Word };
        let mask = self.fetch_word();
        let mode = op >> 3 & 7;
        let reg = op & 7;
        let step = size.bytes();

        if to_registers {
            // Memory to registers: control modes and postincrement.
            let mut addr = match mode {
                3 => self.a[reg as usize],
                2 | 5 | 6 => self.ea_control_address(mode, reg)?,
                7 if reg <= 3 => self.ea_control_address(mode, reg)?,
                _ => return Err(Exception::Illegal),
            };
            for i in 0..16 {
                if mask & 1 << i == 0 {
                    continue;
                }
                let val = size.sext(self.read_size(addr, size));
                if i < 8 {
                    self.d[i] = val;
                } else {
                    self.a[i - 8] = val;
                }
                addr = addr.wrapping_add(step);
            }
            if mode == 3 {
                self.a[reg as usize] = addr;
            }
        } else {
            match mode {
                4 => {
                    // Predecrement: mask bit 0 names A7, descending.
                    let mut addr = self.a[reg as usize];
                    for i in 0..16 {
                        if mask & 1 << i == 0 {
                            continue;
                        }
                        addr = addr.wrapping_sub(step);
                        let val = if i < 8 { self.a[7 - i] } else { self.d[15 - i] };
                        self.write_size(addr, val, size);
                    }
                    self.a[reg as usize] = addr;
                }
                2 | 5 | 6 => {
                    let mut addr = self.ea_control_address(mode, reg)?;
                    for i in 0..16 {
                        if mask & 1 << i == 0 {
                            continue;
                        }
                        let val = if i < 8 { self.d[i] } else { self.a[i - 8] };
                        self.write_size(addr, val, size);
                        addr = addr.wrapping_add(step);
                    }
                }
                7 if reg <= 1 => {
                    let mut addr = self.ea_control_address(mode, reg)?;
                    for i in 0..16 {
                        if mask & 1 << i == 0 {
                            continue;
                        }
                        let val = if i < 8 { self.d[i] } else { self.a[i - 8] };
                        self.write_size(addr, val, size);
                        addr = addr.wrapping_add(step);
                    }
                }
                _ => return Err(Exception::Illegal),
            }
        }
        Ok(())
    }

    // --- Status-register moves ---

    pub(crate) fn op_move_from_sr(&mut self, op: u16) -> Result<(), Exception> {
        if !self.flag(Sr::SUPERVISOR) {
            return Err(Exception::Privilege);
        }
        let sr = self.sr_bits() as u32;
        let ea = self.ea_resolve(op >> 3 & 7, op & 7, Size::Word)?;
        if matches!(ea, Ea::AddrReg(_)) || !Self::ea_is_writable(ea) {
            return Err(Exception::Illegal);
        }
        self.ea_write(ea, sr, Size::Word);
        Ok(())
    }

    pub(crate) fn op_move_to_sr(&mut self, op: u16) -> Result<(), Exception> {
        if !self.flag(Sr::SUPERVISOR) {
            return Err(Exception::Privilege);
        }
        let ea = self.ea_resolve(op >> 3 & 7, op & 7, Size::Word)?;
        if matches!(ea, Ea::AddrReg(_)) {
            return Err(Exception::Illegal);
        }
        let val = self.ea_read(ea, Size::Word) as u16;
        self.set_sr_all(val);
        Ok(())
    }

    pub(crate) fn op_move_from_ccr(&mut self, op: u16) -> Result<(), Exception> {
        let ccr = (self.sr_bits() & 0x1F) as u32;
        let ea = self.ea_resolve(op >> 3 & 7, op & 7, Size::Word)?;
        if matches!(ea, Ea::AddrReg(_)) || !Self::ea_is_writable(ea) {
            return Err(Exception::Illegal);
        }
        self.ea_write(ea, ccr, Size::Word);
        Ok(())
    }

    pub(crate) fn op_move_to_ccr(&mut self, op: u16) -> Result<(), Exception> {
        let ea = self.ea_resolve(op >> 3 & 7, op & 7, Size::Word)?;
        if matches!(ea, Ea::AddrReg(_)) {
            return Err(Exception::Illegal);
        }
        let val = self.ea_read(ea, Size::Word) as u16;
        self.set_ccr(val);
        Ok(())
    }
}
