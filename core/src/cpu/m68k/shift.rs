//! Shifts, rotates and the 68020 bitfield pair.
//!
//! Register forms shift a data register by an immediate count (1-8) or by
//! another data register modulo 64; memory forms shift a word by one.
//! The ASL overflow rule on this machine: V is set iff any bit shifted
//! out differs from the resulting sign bit.

use super::{Ea, Exception, M68k, Size, Sr};

#[derive(Clone, Copy, PartialEq)]
enum ShiftKind {
    Arithmetic,
    Logical,
    RotateX,
    Rotate,
}

impl M68k {
    pub(crate) fn group_shift(&mut self, op: u16) -> Result<(), Exception> {
        if op & 0x00C0 == 0x00C0 {
            if op & 0x0800 != 0 {
                return self.op_bitfield(op);
            }
            // Memory form: one-bit shift of a word operand.
            let kind = match op >> 9 & 3 {
                0 => ShiftKind::Arithmetic,
                1 => ShiftKind::Logical,
                2 => ShiftKind::RotateX,
                _ => ShiftKind::Rotate,
            };
            let left = op & 0x0100 != 0;
            let ea = self.ea_resolve(op >> 3 & 7, op & 7, Size::Word)?;
            if matches!(ea, Ea::DataReg(_) | Ea::AddrReg(_)) || !Self::ea_is_writable(ea) {
                return Err(Exception::Illegal);
            }
            let val = self.ea_read(ea, Size::Word);
            let r = self.shift(val, 1, Size::Word, kind, left);
            self.ea_write(ea, r, Size::Word);
            return Ok(());
        }

        let size = Size::from_bits(op >> 6 & 3).ok_or(Exception::Illegal)?;
        let kind = match op >> 3 & 3 {
            0 => ShiftKind::Arithmetic,
            1 => ShiftKind::Logical,
            2 => ShiftKind::RotateX,
            _ => ShiftKind::Rotate,
        };
        let left = op & 0x0100 != 0;
        let count = if op & 0x0020 != 0 {
            self.d[(op >> 9 & 7) as usize] % 64
        } else {
            let c = op >> 9 & 7;
            if c == 0 { 8 } else { c as u32 }
        };
        let reg = (op & 7) as usize;
        let val = self.d[reg] & size.mask();
        let r = self.shift(val, count, size, kind, left);
        self.d[reg] = self.d[reg] & !size.mask() | r & size.mask();
        Ok(())
    }

    fn shift(&mut self, val: u32, count: u32, size: Size, kind: ShiftKind, left: bool) -> u32 {
        let msb = size.msb();
        let m = size.mask();

        if count == 0 {
            // Count zero still sets N/Z; C clears except ROX which loads X.
            self.set_nz(val, size);
            self.set_flag(Sr::OVERFLOW, false);
            self.set_flag(
                Sr::CARRY,
                kind == ShiftKind::RotateX && self.flag(Sr::EXTEND),
            );
            return val;
        }

        let mut v = val & m;
        let mut carry = false;
        let mut overflow = false;
        match kind {
            ShiftKind::Arithmetic | ShiftKind::Logical => {
                let mut ones_out = 0u32;
                let mut total_out = 0u32;
                for _ in 0..count {
                    if left {
                        carry = v & msb != 0;
                        ones_out += carry as u32;
                        total_out += 1;
                        v = v << 1 & m;
                    } else {
                        carry = v & 1 != 0;
                        let fill = if kind == ShiftKind::Arithmetic { v & msb } else { 0 };
                        v = v >> 1 | fill;
                    }
                }
                if kind == ShiftKind::Arithmetic && left {
                    // V set iff any shifted-out bit differs from the final
                    // sign bit.
                    let sign_set = v & msb != 0;
                    let any_one = ones_out > 0;
                    let any_zero = total_out > ones_out;
                    overflow = if sign_set { any_zero } else { any_one };
                }
                self.set_flag(Sr::EXTEND, carry);
            }
            ShiftKind::Rotate => {
                for _ in 0..count {
                    if left {
                        carry = v & msb != 0;
                        v = (v << 1 | carry as u32) & m;
                    } else {
                        carry = v & 1 != 0;
                        v = v >> 1 | (carry as u32) * msb;
                    }
                }
                // X is untouched by plain rotates.
            }
            ShiftKind::RotateX => {
                let mut x = self.flag(Sr::EXTEND);
                for _ in 0..count {
                    if left {
                        let out = v & msb != 0;
                        v = (v << 1 | x as u32) & m;
                        x = out;
                    } else {
                        let out = v & 1 != 0;
                        v = v >> 1 | (x as u32) * msb;
                        x = out;
                    }
                }
                carry = x;
                self.set_flag(Sr::EXTEND, x);
            }
        }
        self.set_nz(v, size);
        self.set_flag(Sr::CARRY, carry);
        self.set_flag(Sr::OVERFLOW, overflow);
        v
    }

    // --- Bitfields (BFEXTU / BFINS; the rest are not part of this machine) ---

    fn op_bitfield(&mut self, op: u16) -> Result<(), Exception> {
        let ext = self.fetch_word();
        let sub = op >> 8 & 7;

        let offset_raw = (ext >> 6 & 0x1F) as u32;
        let offset = if ext & 0x0800 != 0 {
            self.d[(offset_raw & 7) as usize] as i32
        } else {
            offset_raw as i32
        };
        let width_raw = (ext & 0x1F) as u32;
        let width = {
            let w = if ext & 0x0020 != 0 {
                self.d[(width_raw & 7) as usize] % 32
            } else {
                width_raw
            };
            if w == 0 { 32 } else { w }
        };

        let mode = op >> 3 & 7;
        let reg = op & 7;
        match sub {
            1 => {
                // BFEXTU <ea>{offset:width},Dn
                let dn = (ext >> 12 & 7) as usize;
                let field = if mode == 0 {
                    extract_register_field(self.d[reg as usize], offset, width)
                } else {
                    let base = self.ea_control_address(mode, reg)?;
                    self.extract_memory_field(base, offset, width)
                };
                self.d[dn] = field;
                self.set_flag(Sr::NEGATIVE, field >> (width - 1) & 1 != 0);
                self.set_flag(Sr::ZERO, field == 0);
                self.set_flag(Sr::OVERFLOW, false);
                self.set_flag(Sr::CARRY, false);
                Ok(())
            }
            7 => {
                // BFINS Dn,<ea>{offset:width}
                let dn = (ext >> 12 & 7) as usize;
                let field = self.d[dn] & width_mask(width);
                if mode == 0 {
                    let r = insert_register_field(self.d[reg as usize], field, offset, width);
                    self.d[reg as usize] = r;
                } else {
                    let base = self.ea_control_address(mode, reg)?;
                    self.insert_memory_field(base, field, offset, width);
                }
                self.set_flag(Sr::NEGATIVE, field >> (width - 1) & 1 != 0);
                self.set_flag(Sr::ZERO, field == 0);
                self.set_flag(Sr::OVERFLOW, false);
                self.set_flag(Sr::CARRY, false);
                Ok(())
            }
            _ => Err(Exception::Illegal),
        }
    }

    /// Memory bitfields address bits big-endian from the base byte's MSB;
    /// a negative offset reaches below the base address.
    fn extract_memory_field(&mut self, base: u32, offset: i32, width: u32) -> u32 {
        let mut field = 0u32;
        for i in 0..width {
            let bitpos = offset + i as i32;
            let byte = base.wrapping_add_signed(bitpos.div_euclid(8));
            let bit = 7 - bitpos.rem_euclid(8);
            field = field << 1 | self.bus.read8(byte) >> bit & 1;
        }
        field
    }

    fn insert_memory_field(&mut self, base: u32, field: u32, offset: i32, width: u32) {
        for i in 0..width {
            let bitpos = offset + i as i32;
            let byte = base.wrapping_add_signed(bitpos.div_euclid(8));
            let bit = 7 - bitpos.rem_euclid(8);
            let old = self.bus.read8(byte);
            let set = field >> (width - 1 - i) & 1;
            let new = old & !(1 << bit) | set << bit;
            self.bus.write8(byte, new);
        }
    }
}

fn width_mask(width: u32) -> u32 {
    if width >= 32 { u32::MAX } else { (1 << width) - 1 }
}

/// Register bitfields number bits from the MSB and wrap modulo 32.
fn extract_register_field(reg: u32, offset: i32, width: u32) -> u32 {
    let mut field = 0;
    for i in 0..width {
        let bit = 31 - (offset + i as i32).rem_euclid(32);
        field = field << 1 | reg >> bit & 1;
    }
    field
}

fn insert_register_field(reg: u32, field: u32, offset: i32, width: u32) -> u32 {
    let mut out = reg;
    for i in 0..width {
        let bit = 31 - (offset + i as i32).rem_euclid(32);
        let set = field >> (width - 1 - i) & 1;
        out = out & !(1 << bit) | set << bit;
    }
    out
}
