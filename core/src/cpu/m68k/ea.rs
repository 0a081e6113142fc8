//! Effective-address resolution for all addressing modes, including the
//! 68020 scaled-index and base-displacement extension formats.

use super::{Exception, M68k, Size};

/// A resolved operand location.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ea {
    DataReg(usize),
    AddrReg(usize),
    Mem(u32),
    /// Immediate operand, already fetched.
    Imm(u32),
}

impl M68k {
    /// Resolve mode/register fields into an operand location, consuming
    /// any extension words. Postincrement and predecrement adjust their
    /// address register here, with the byte-on-SP keeping A7 even.
    pub(crate) fn ea_resolve(
        &mut self,
        mode: u16,
        reg: u16,
        size: Size,
    ) -> Result<Ea, Exception> {
        let reg = reg as usize;
        let step = |r: usize, size: Size| -> u32 {
            if r == 7 && size == Size::Byte { 2 } else { size.bytes() }
        };
        match mode {
            0 => Ok(Ea::DataReg(reg)),
            1 => Ok(Ea::AddrReg(reg)),
            2 => Ok(Ea::Mem(self.a[reg])),
            3 => {
                let addr = self.a[reg];
                self.a[reg] = addr.wrapping_add(step(reg, size));
                Ok(Ea::Mem(addr))
            }
            4 => {
                self.a[reg] = self.a[reg].wrapping_sub(step(reg, size));
                Ok(Ea::Mem(self.a[reg]))
            }
            5 => {
                let disp = self.fetch_word() as i16 as i32;
                Ok(Ea::Mem(self.a[reg].wrapping_add_signed(disp)))
            }
            6 => {
                let base = self.a[reg];
                self.indexed_address(base).map(Ea::Mem)
            }
            7 => match reg {
                0 => Ok(Ea::Mem(self.fetch_word() as i16 as i32 as u32)),
                1 => Ok(Ea::Mem(self.fetch_long())),
                2 => {
                    let base = self.pc;
                    let disp = self.fetch_word() as i16 as i32;
                    Ok(Ea::Mem(base.wrapping_add_signed(disp)))
                }
                3 => {
                    let base = self.pc;
                    self.indexed_address(base).map(Ea::Mem)
                }
                4 => {
                    let imm = match size {
                        Size::Byte => self.fetch_word() as u32 & 0xFF,
                        Size::Word => self.fetch_word() as u32,
                        Size::Long => self.fetch_long(),
                    };
                    Ok(Ea::Imm(imm))
                }
                _ => Err(Exception::Illegal),
            },
            _ => Err(Exception::Illegal),
        }
    }

    /// Brief or full extension word: index register with 68020 scale, and
    /// in the full format an optional 16/32-bit base displacement with
    /// suppressible base and index. Memory-indirect variants are not part
    /// of this machine and decode as illegal.
    fn indexed_address(&mut self, base: u32) -> Result<u32, Exception> {
        let ext = self.fetch_word();
        let idx_reg = (ext >> 12 & 7) as usize;
        let idx_is_addr = ext & 0x8000 != 0;
        let idx_long = ext & 0x0800 != 0;
        let scale = 1u32 << (ext >> 9 & 3);

        let index = {
            let raw = if idx_is_addr { self.a[idx_reg] } else { self.d[idx_reg] };
            let v = if idx_long { raw as i32 } else { raw as u16 as i16 as i32 };
            v.wrapping_mul(scale as i32)
        };

        if ext & 0x0100 == 0 {
            // Brief format: 8-bit displacement.
            let disp = ext as u8 as i8 as i32;
            return Ok(base.wrapping_add_signed(disp).wrapping_add_signed(index));
        }

        // Full format.
        if ext & 0x0007 != 0 {
            // Memory-indirect modes.
            return Err(Exception::Illegal);
        }
        let base_suppress = ext & 0x0080 != 0;
        let index_suppress = ext & 0x0040 != 0;
        let bd = match ext >> 4 & 3 {
            0 | 1 => 0i32,
            2 => self.fetch_word() as i16 as i32,
            _ => self.fetch_long() as i32,
        };
        let mut addr = bd;
        if !base_suppress {
            addr = addr.wrapping_add(base as i32);
        }
        if !index_suppress {
            addr = addr.wrapping_add(index);
        }
        Ok(addr as u32)
    }

    /// Resolve for a control-addressing operand (LEA/PEA/JMP/JSR/MOVEM):
    /// only memory addresses without side effects are legal.
    pub(crate) fn ea_control_address(&mut self, mode: u16, reg: u16) -> Result<u32, Exception> {
        match mode {
            2 | 5 | 6 => {}
            7 if reg <= 3 => {}
            _ => return Err(Exception::Illegal),
        }
        match self.ea_resolve(mode, reg, Size::Long)? {
            Ea::Mem(addr) => Ok(addr),
            _ => Err(Exception::Illegal),
        }
    }

    pub(crate) fn ea_read(&mut self, ea: Ea, size: Size) -> u32 {
        match ea {
            Ea::DataReg(r) => self.d[r] & size.mask(),
            Ea::AddrReg(r) => self.a[r] & size.mask(),
            Ea::Mem(addr) => self.read_size(addr, size),
            Ea::Imm(v) => v & size.mask(),
        }
    }

    pub(crate) fn ea_write(&mut self, ea: Ea, val: u32, size: Size) {
        match ea {
            Ea::DataReg(r) => {
                self.d[r] = self.d[r] & !size.mask() | val & size.mask();
            }
            Ea::AddrReg(r) => {
                // Address registers always take the full sign-extended value.
                self.a[r] = size.sext(val);
            }
            Ea::Mem(addr) => self.write_size(addr, val, size),
            Ea::Imm(_) => {}
        }
    }

    /// True for the alterable-data destinations arithmetic may write to.
    pub(crate) fn ea_is_writable(ea: Ea) -> bool {
        !matches!(ea, Ea::Imm(_))
    }
}
