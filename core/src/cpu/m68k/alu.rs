//! Integer arithmetic and logic: the immediate group, the binary
//! operator groups (ADD/SUB/CMP/AND/OR/EOR with their address and
//! extended variants), multiply/divide, quick forms and the unary ops.

use super::{Ea, Exception, M68k, Size, Sr};

impl M68k {
    // --- Group 0x0: immediates (bit operations route to bits.rs) ---

    pub(crate) fn group_immediates_and_bits(&mut self, op: u16) -> Result<(), Exception> {
        if op & 0x0100 != 0 {
            if op >> 3 & 7 == 1 {
                // MOVEP is not part of this machine.
                return Err(Exception::Illegal);
            }
            return self.op_bit_dynamic(op);
        }
        if op & 0x0F00 == 0x0800 {
            return self.op_bit_static(op);
        }

        let Some(size) = Size::from_bits(op >> 6 & 3) else {
            return Err(Exception::Illegal);
        };
        let mode = op >> 3 & 7;
        let reg = op & 7;

        // ORI/ANDI/EORI to CCR (byte) and SR (word, privileged).
        if mode == 7 && reg == 4 {
            let imm = self.fetch_word();
            let kind = op >> 9 & 7;
            return match size {
                Size::Byte => {
                    let ccr = self.sr_bits() & 0x1F;
                    let new = apply_logic(kind, ccr, imm & 0xFF)?;
                    self.set_ccr(new);
                    Ok(())
                }
                Size::Word => {
                    if !self.flag(Sr::SUPERVISOR) {
                        return Err(Exception::Privilege);
                    }
                    let new = apply_logic(kind, self.sr_bits(), imm)?;
                    self.set_sr_all(new);
                    Ok(())
                }
                Size::Long => Err(Exception::Illegal),
            };
        }

        let imm = match size {
            Size::Byte => self.fetch_word() as u32 & 0xFF,
            Size::Word => self.fetch_word() as u32,
            Size::Long => self.fetch_long(),
        };
        let ea = self.ea_resolve(mode, reg, size)?;
        if matches!(ea, Ea::AddrReg(_) | Ea::Imm(_)) {
            return Err(Exception::Illegal);
        }
        let dst = self.ea_read(ea, size);
        match op >> 9 & 7 {
            0 => {
                let r = dst | imm;
                self.flags_logic(r, size);
                self.ea_write(ea, r, size);
            }
            1 => {
                let r = dst & imm;
                self.flags_logic(r, size);
                self.ea_write(ea, r, size);
            }
            2 => {
                let r = dst.wrapping_sub(imm);
                self.flags_sub(dst, imm, r, size, true);
                self.ea_write(ea, r, size);
            }
            3 => {
                let r = dst.wrapping_add(imm);
                self.flags_add(dst, imm, r, size, true);
                self.ea_write(ea, r, size);
            }
            5 => {
                let r = dst ^ imm;
                self.flags_logic(r, size);
                self.ea_write(ea, r, size);
            }
            6 => {
                let r = dst.wrapping_sub(imm);
                self.flags_sub(dst, imm, r, size, false);
            }
            _ => return Err(Exception::Illegal),
        }
        Ok(())
    }

    // --- Group 0x5: ADDQ/SUBQ (Scc/DBcc route to branch.rs) ---

    pub(crate) fn group_quick_scc_dbcc(&mut self, op: u16) -> Result<(), Exception> {
        if op & 0x00C0 == 0x00C0 {
            if op >> 3 & 7 == 1 {
                return self.op_dbcc(op);
            }
            return self.op_scc(op);
        }
        let size = Size::from_bits(op >> 6 & 3).ok_or(Exception::Illegal)?;
        let data = {
            let q = op >> 9 & 7;
            if q == 0 { 8u32 } else { q as u32 }
        };
        let ea = self.ea_resolve(op >> 3 & 7, op & 7, size)?;
        if let Ea::AddrReg(r) = ea {
            // Quick arithmetic on an address register: always long, no
            // flags.
            if size == Size::Byte {
                return Err(Exception::Illegal);
            }
            self.a[r] = if op & 0x0100 == 0 {
                self.a[r].wrapping_add(data)
            } else {
                self.a[r].wrapping_sub(data)
            };
            return Ok(());
        }
        if !Self::ea_is_writable(ea) {
            return Err(Exception::Illegal);
        }
        let dst = self.ea_read(ea, size);
        let r = if op & 0x0100 == 0 {
            let r = dst.wrapping_add(data);
            self.flags_add(dst, data, r, size, true);
            r
        } else {
            let r = dst.wrapping_sub(data);
            self.flags_sub(dst, data, r, size, true);
            r
        };
        self.ea_write(ea, r, size);
        Ok(())
    }

    // --- Group 0x8: OR / DIVU / DIVS ---

    pub(crate) fn group_or_div(&mut self, op: u16) -> Result<(), Exception> {
        match op >> 6 & 7 {
            3 => self.op_div(op, false),
            7 => self.op_div(op, true),
            opmode => {
                if opmode >= 4 && op >> 3 & 7 <= 1 {
                    // SBCD and friends.
                    return Err(Exception::Illegal);
                }
                self.binary_logic(op, |a, b| a | b)
            }
        }
    }

    // --- Group 0xC: AND / MULU / MULS / EXG ---

    pub(crate) fn group_and_mul(&mut self, op: u16) -> Result<(), Exception> {
        match op >> 6 & 7 {
            3 => self.op_mul(op, false),
            7 => self.op_mul(op, true),
            opmode => {
                if opmode >= 4 && op >> 3 & 7 <= 1 {
                    if let Some(()) = self.try_exg(op) {
                        return Ok(());
                    }
                    return Err(Exception::Illegal);
                }
                self.binary_logic(op, |a, b| a & b)
            }
        }
    }

    /// Shared body of OR and AND in their register and memory directions.
    fn binary_logic(
        &mut self,
        op: u16,
        f: impl Fn(u32, u32) -> u32,
    ) -> Result<(), Exception> {
        let size = Size::from_bits(op >> 6 & 3).ok_or(Exception::Illegal)?;
        let dn = (op >> 9 & 7) as usize;
        let ea = self.ea_resolve(op >> 3 & 7, op & 7, size)?;
        if matches!(ea, Ea::AddrReg(_)) {
            return Err(Exception::Illegal);
        }
        if op & 0x0100 == 0 {
            // ea op Dn -> Dn
            let src = self.ea_read(ea, size);
            let r = f(self.d[dn], src);
            self.flags_logic(r, size);
            self.ea_write(Ea::DataReg(dn), r, size);
        } else {
            // Dn op ea -> ea
            if !Self::ea_is_writable(ea) {
                return Err(Exception::Illegal);
            }
            let dst = self.ea_read(ea, size);
            let r = f(dst, self.d[dn]);
            self.flags_logic(r, size);
            self.ea_write(ea, r, size);
        }
        Ok(())
    }

    // --- Groups 0x9/0xD: SUB/ADD families ---

    pub(crate) fn group_sub(&mut self, op: u16) -> Result<(), Exception> {
        self.add_sub_family(op, false)
    }

    pub(crate) fn group_add(&mut self, op: u16) -> Result<(), Exception> {
        self.add_sub_family(op, true)
    }

    fn add_sub_family(&mut self, op: u16, adding: bool) -> Result<(), Exception> {
        let opmode = op >> 6 & 7;
        let an = (op >> 9 & 7) as usize;

        // ADDA/SUBA: word form sign-extends, no flags.
        if opmode == 3 || opmode == 7 {
            let size = if opmode == 3 { Size::Word } else { Size::Long };
            let ea = self.ea_resolve(op >> 3 & 7, op & 7, size)?;
            let src = size.sext(self.ea_read(ea, size));
            self.a[an] = if adding {
                self.a[an].wrapping_add(src)
            } else {
                self.a[an].wrapping_sub(src)
            };
            return Ok(());
        }

        let size = Size::from_bits(opmode & 3).ok_or(Exception::Illegal)?;
        if opmode >= 4 && op >> 3 & 7 <= 1 {
            return self.op_addx_subx(op, size, adding);
        }

        let dn = an;
        let ea = self.ea_resolve(op >> 3 & 7, op & 7, size)?;
        if matches!(ea, Ea::AddrReg(_)) && size == Size::Byte {
            return Err(Exception::Illegal);
        }
        if opmode < 4 {
            // ea op Dn -> Dn
            let src = self.ea_read(ea, size);
            let dst = self.d[dn] & size.mask();
            let r = if adding {
                let r = dst.wrapping_add(src);
                self.flags_add(dst, src, r, size, true);
                r
            } else {
                let r = dst.wrapping_sub(src);
                self.flags_sub(dst, src, r, size, true);
                r
            };
            self.ea_write(Ea::DataReg(dn), r, size);
        } else {
            // Dn op ea -> ea
            if !Self::ea_is_writable(ea) || matches!(ea, Ea::AddrReg(_)) {
                return Err(Exception::Illegal);
            }
            let dst = self.ea_read(ea, size);
            let src = self.d[dn] & size.mask();
            let r = if adding {
                let r = dst.wrapping_add(src);
                self.flags_add(dst, src, r, size, true);
                r
            } else {
                let r = dst.wrapping_sub(src);
                self.flags_sub(dst, src, r, size, true);
                r
            };
            self.ea_write(ea, r, size);
        }
        Ok(())
    }

    /// ADDX/SUBX: consume X, and only clear Z on a non-zero result so a
    /// chained multi-precision operation accumulates its zero test.
    fn op_addx_subx(&mut self, op: u16, size: Size, adding: bool) -> Result<(), Exception> {
        let rx = (op >> 9 & 7) as usize; // destination
        let ry = (op & 7) as usize; // source
        let memory = op & 0x0008 != 0;
        let x = self.flag(Sr::EXTEND) as u32;

        let (src, dst, dst_ea) = if memory {
            let src_ea = self.ea_resolve(4, ry as u16, size)?;
            let src = self.ea_read(src_ea, size);
            let dst_ea = self.ea_resolve(4, rx as u16, size)?;
            let dst = self.ea_read(dst_ea, size);
            (src, dst, dst_ea)
        } else {
            (self.d[ry] & size.mask(), self.d[rx] & size.mask(), Ea::DataReg(rx))
        };

        let z_before = self.flag(Sr::ZERO);
        let r = if adding {
            let r = dst.wrapping_add(src).wrapping_add(x);
            let m = size.mask();
            let carry = (dst & m) as u64 + (src & m) as u64 + x as u64 > m as u64;
            let overflow = !(dst ^ src) & (dst ^ r) & size.msb() != 0;
            self.set_flag(Sr::CARRY, carry);
            self.set_flag(Sr::EXTEND, carry);
            self.set_flag(Sr::OVERFLOW, overflow);
            r
        } else {
            let r = dst.wrapping_sub(src).wrapping_sub(x);
            let m = size.mask();
            let borrow = (src & m) as u64 + x as u64 > (dst & m) as u64;
            let overflow = (dst ^ src) & (dst ^ r) & size.msb() != 0;
            self.set_flag(Sr::CARRY, borrow);
            self.set_flag(Sr::EXTEND, borrow);
            self.set_flag(Sr::OVERFLOW, overflow);
            r
        };
        self.set_flag(Sr::NEGATIVE, r & size.msb() != 0);
        if r & size.mask() != 0 {
            self.set_flag(Sr::ZERO, false);
        } else {
            self.set_flag(Sr::ZERO, z_before);
        }
        self.ea_write(dst_ea, r, size);
        Ok(())
    }

    // --- Group 0xB: CMP / CMPA / EOR ---

    pub(crate) fn group_cmp_eor(&mut self, op: u16) -> Result<(), Exception> {
        let opmode = op >> 6 & 7;
        let reg = (op >> 9 & 7) as usize;
        match opmode {
            0..=2 => {
                let size = Size::from_bits(opmode).ok_or(Exception::Illegal)?;
                let ea = self.ea_resolve(op >> 3 & 7, op & 7, size)?;
                if matches!(ea, Ea::AddrReg(_)) && size == Size::Byte {
                    return Err(Exception::Illegal);
                }
                let src = self.ea_read(ea, size);
                let dst = self.d[reg] & size.mask();
                let r = dst.wrapping_sub(src);
                self.flags_sub(dst, src, r, size, false);
                Ok(())
            }
            3 | 7 => {
                // CMPA: source sign-extended, compare at long.
                let size = if opmode == 3 { Size::Word } else { Size::Long };
                let ea = self.ea_resolve(op >> 3 & 7, op & 7, size)?;
                let src = size.sext(self.ea_read(ea, size));
                let dst = self.a[reg];
                let r = dst.wrapping_sub(src);
                self.flags_sub(dst, src, r, Size::Long, false);
                Ok(())
            }
            _ => {
                if op >> 3 & 7 == 1 {
                    // CMPM is not part of this machine.
                    return Err(Exception::Illegal);
                }
                let size = Size::from_bits(opmode & 3).ok_or(Exception::Illegal)?;
                let ea = self.ea_resolve(op >> 3 & 7, op & 7, size)?;
                if !Self::ea_is_writable(ea) || matches!(ea, Ea::AddrReg(_)) {
                    return Err(Exception::Illegal);
                }
                let dst = self.ea_read(ea, size);
                let r = dst ^ self.d[reg];
                self.flags_logic(r, size);
                self.ea_write(ea, r, size);
                Ok(())
            }
        }
    }

    // --- Multiply and divide (16-bit forms) ---

    fn op_mul(&mut self, op: u16, signed: bool) -> Result<(), Exception> {
        let dn = (op >> 9 & 7) as usize;
        let ea = self.ea_resolve(op >> 3 & 7, op & 7, Size::Word)?;
        if matches!(ea, Ea::AddrReg(_)) {
            return Err(Exception::Illegal);
        }
        let src = self.ea_read(ea, Size::Word);
        let dst = self.d[dn] & 0xFFFF;
        let r = if signed {
            (src as u16 as i16 as i32).wrapping_mul(dst as u16 as i16 as i32) as u32
        } else {
            src.wrapping_mul(dst)
        };
        self.d[dn] = r;
        self.set_nz(r, Size::Long);
        self.set_flag(Sr::OVERFLOW, false);
        self.set_flag(Sr::CARRY, false);
        Ok(())
    }

    fn op_div(&mut self, op: u16, signed: bool) -> Result<(), Exception> {
        let dn = (op >> 9 & 7) as usize;
        let ea = self.ea_resolve(op >> 3 & 7, op & 7, Size::Word)?;
        if matches!(ea, Ea::AddrReg(_)) {
            return Err(Exception::Illegal);
        }
        let src = self.ea_read(ea, Size::Word);
        if src & 0xFFFF == 0 {
            return Err(Exception::DivideByZero);
        }
        let dst = self.d[dn];
        if signed {
            let divisor = src as u16 as i16 as i32;
            let dividend = dst as i32;
            let quot = dividend.wrapping_div(divisor);
            let rem = dividend.wrapping_rem(divisor);
            if quot > i16::MAX as i32 || quot < i16::MIN as i32 {
                // Signed overflow takes the divide vector on this machine.
                return Err(Exception::DivideByZero);
            }
            self.d[dn] = (rem as u32 & 0xFFFF) << 16 | quot as u32 & 0xFFFF;
            self.set_nz(quot as u32, Size::Word);
            self.set_flag(Sr::OVERFLOW, false);
            self.set_flag(Sr::CARRY, false);
        } else {
            let divisor = src & 0xFFFF;
            let quot = dst / divisor;
            let rem = dst % divisor;
            if quot > 0xFFFF {
                // Unsigned overflow only flags; the destination is kept.
                self.set_flag(Sr::OVERFLOW, true);
                self.set_flag(Sr::CARRY, false);
                return Ok(());
            }
            self.d[dn] = (rem & 0xFFFF) << 16 | quot & 0xFFFF;
            self.set_nz(quot, Size::Word);
            self.set_flag(Sr::OVERFLOW, false);
            self.set_flag(Sr::CARRY, false);
        }
        Ok(())
    }

    // --- Unary operations from group 4 ---

    pub(crate) fn op_unary(&mut self, op: u16) -> Result<(), Exception> {
        let size = Size::from_bits(op >> 6 & 3).ok_or(Exception::Illegal)?;
        let ea = self.ea_resolve(op >> 3 & 7, op & 7, size)?;
        if matches!(ea, Ea::AddrReg(_) | Ea::Imm(_)) {
            return Err(Exception::Illegal);
        }
        match op >> 8 & 0xF {
            0x0 => {
                // NEGX: 0 - dst - X with the cumulative-Z rule.
                let dst = self.ea_read(ea, size);
                let x = self.flag(Sr::EXTEND) as u32;
                let r = 0u32.wrapping_sub(dst).wrapping_sub(x);
                let z_before = self.flag(Sr::ZERO);
                let m = size.mask();
                let borrow = (dst & m) as u64 + x as u64 > 0;
                self.set_flag(Sr::CARRY, borrow);
                self.set_flag(Sr::EXTEND, borrow);
                self.set_flag(Sr::OVERFLOW, dst & r & size.msb() != 0);
                self.set_flag(Sr::NEGATIVE, r & size.msb() != 0);
                if r & m != 0 {
                    self.set_flag(Sr::ZERO, false);
                } else {
                    self.set_flag(Sr::ZERO, z_before);
                }
                self.ea_write(ea, r, size);
            }
            0x2 => {
                self.flags_logic(0, size);
                self.ea_write(ea, 0, size);
            }
            0x4 => {
                let dst = self.ea_read(ea, size);
                let r = 0u32.wrapping_sub(dst);
                self.flags_sub(0, dst, r, size, true);
                self.ea_write(ea, r, size);
            }
            0x6 => {
                let r = !self.ea_read(ea, size);
                self.flags_logic(r, size);
                self.ea_write(ea, r, size);
            }
            0xA => {
                let v = self.ea_read(ea, size);
                self.flags_logic(v, size);
            }
            _ => return Err(Exception::Illegal),
        }
        Ok(())
    }

    /// EXT.W / EXT.L.
    pub(crate) fn op_ext(&mut self, op: u16) -> Result<(), Exception> {
        let reg = (op & 7) as usize;
        if op & 0x0040 == 0 {
            let r = self.d[reg] as u8 as i8 as i16 as u16 as u32;
            self.d[reg] = self.d[reg] & 0xFFFF_0000 | r;
            self.flags_logic(r, Size::Word);
        } else {
            let r = self.d[reg] as u16 as i16 as i32 as u32;
            self.d[reg] = r;
            self.flags_logic(r, Size::Long);
        }
        Ok(())
    }

    /// CHK.W: bound check against an effective-address operand.
    pub(crate) fn op_chk(&mut self, op: u16) -> Result<(), Exception> {
        let dn = (op >> 9 & 7) as usize;
        let ea = self.ea_resolve(op >> 3 & 7, op & 7, Size::Word)?;
        if matches!(ea, Ea::AddrReg(_)) {
            return Err(Exception::Illegal);
        }
        let bound = self.ea_read(ea, Size::Word) as u16 as i16;
        let value = self.d[dn] as u16 as i16;
        if value < 0 {
            self.set_flag(Sr::NEGATIVE, true);
            return Err(Exception::CheckBound);
        }
        if value > bound {
            self.set_flag(Sr::NEGATIVE, false);
            return Err(Exception::CheckBound);
        }
        Ok(())
    }
}

/// ORI/ANDI/EORI applied to a status value; other kinds are illegal here.
fn apply_logic(kind: u16, current: u16, imm: u16) -> Result<u16, Exception> {
    match kind {
        0 => Ok(current | imm),
        1 => Ok(current & imm),
        5 => Ok(current ^ imm),
        _ => Err(Exception::Illegal),
    }
}
