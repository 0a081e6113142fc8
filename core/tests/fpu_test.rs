use lumen_core::cpu::m68k::extended::ExtendedReal;
use lumen_core::cpu::m68k::fpu::{CC_INFINITY, CC_NAN, CC_NEGATIVE, CC_ZERO};

mod common;
use common::{m68k, m68k_with_program, test_bus};

/// Build the general-form command word: opclass, source field, register
/// field, extension opcode.
fn cw(opclass: u16, src: u16, reg: u16, ext: u16) -> u16 {
    opclass << 13 | src << 10 | reg << 7 | ext
}

#[test]
fn test_fcmp_smaller_destination_sets_n() {
    // FCMP FP1,FP0 with FP0 = 5.0, FP1 = 10.0: 5 - 10 < 0.
    let mut cpu = m68k(&[0xF200, cw(0, 1, 0, 0x38)]);
    {
        let fpu = cpu.fpu_mut().unwrap();
        fpu.fp[0] = ExtendedReal::from_f64(5.0);
        fpu.fp[1] = ExtendedReal::from_f64(10.0);
    }
    cpu.step_one();
    let status = cpu.fpu().unwrap().status;
    assert_ne!(status & CC_NEGATIVE, 0);
    assert_eq!(status & CC_ZERO, 0);
    assert_eq!(status & CC_NAN, 0);
    // The operands are untouched.
    assert_eq!(cpu.fpu().unwrap().fp[0].to_f64(), 5.0);
}

#[test]
fn test_fcmp_equal_sets_z() {
    let mut cpu = m68k(&[0xF200, cw(0, 1, 0, 0x38)]);
    {
        let fpu = cpu.fpu_mut().unwrap();
        fpu.fp[0] = ExtendedReal::from_f64(2.5);
        fpu.fp[1] = ExtendedReal::from_f64(2.5);
    }
    cpu.step_one();
    let status = cpu.fpu().unwrap().status;
    assert_ne!(status & CC_ZERO, 0);
    assert_eq!(status & CC_NEGATIVE, 0);
}

#[test]
fn test_fcmp_nan_operand_sets_nan() {
    let mut cpu = m68k(&[0xF200, cw(0, 1, 0, 0x38)]);
    {
        let fpu = cpu.fpu_mut().unwrap();
        fpu.fp[0] = ExtendedReal::from_f64(1.0);
        fpu.fp[1] = ExtendedReal::nan();
    }
    cpu.step_one();
    assert_ne!(cpu.fpu().unwrap().status & CC_NAN, 0);
}

#[test]
fn test_fadd_and_condition_codes() {
    let mut cpu = m68k(&[0xF200, cw(0, 1, 0, 0x22)]); // FADD FP1,FP0
    {
        let fpu = cpu.fpu_mut().unwrap();
        fpu.fp[0] = ExtendedReal::from_f64(1.5);
        fpu.fp[1] = ExtendedReal::from_f64(2.5);
    }
    cpu.step_one();
    let fpu = cpu.fpu().unwrap();
    assert_eq!(fpu.fp[0].to_f64(), 4.0);
    assert_eq!(fpu.status & (CC_NEGATIVE | CC_ZERO | CC_NAN | CC_INFINITY), 0);
}

#[test]
fn test_fdiv_by_zero_gives_infinity_cc() {
    let mut cpu = m68k(&[0xF200, cw(0, 1, 0, 0x20)]); // FDIV FP1,FP0
    {
        let fpu = cpu.fpu_mut().unwrap();
        fpu.fp[0] = ExtendedReal::from_f64(1.0);
        fpu.fp[1] = ExtendedReal::from_f64(0.0);
    }
    cpu.step_one();
    let fpu = cpu.fpu().unwrap();
    assert!(fpu.fp[0].is_infinite());
    assert_ne!(fpu.status & CC_INFINITY, 0);
}

#[test]
fn test_fmovecr_pi_and_unknown_offsets() {
    let mut cpu = m68k(&[
        0xF200, cw(2, 7, 0, 0x00), // FMOVECR #0,FP0 (pi)
        0xF200, cw(2, 7, 1, 0x7F), // unknown offset -> 0.0
    ]);
    cpu.step_one();
    cpu.step_one();
    let fpu = cpu.fpu().unwrap();
    assert_eq!(fpu.fp[0].to_f64(), std::f64::consts::PI);
    assert_eq!(fpu.fp[1].to_f64(), 0.0);
}

#[test]
fn test_fmove_immediate_double() {
    // FMOVE.D #-3.25,FP2.
    let bits = (-3.25f64).to_bits();
    let mut cpu = m68k(&[
        0xF23C,
        cw(2, 5, 2, 0x00),
        (bits >> 48) as u16,
        (bits >> 32) as u16,
        (bits >> 16) as u16,
        bits as u16,
    ]);
    cpu.step_one();
    let fpu = cpu.fpu().unwrap();
    assert_eq!(fpu.fp[2].to_f64(), -3.25);
    assert_ne!(fpu.status & CC_NEGATIVE, 0, "move caches condition codes");
}

#[test]
fn test_fmove_long_operand_from_register() {
    // FMOVE.L D3,FP0.
    let mut cpu = m68k(&[0xF203, cw(2, 0, 0, 0x00)]);
    cpu.d[3] = (-7i32) as u32;
    cpu.step_one();
    assert_eq!(cpu.fpu().unwrap().fp[0].to_f64(), -7.0);
}

#[test]
fn test_fmove_store_rounds_per_fpcr() {
    let bus = test_bus();
    // FMOVE.L FP0,D1 twice under different rounding modes.
    let mut cpu = m68k_with_program(&bus, &[0xF201, cw(3, 0, 0, 0)]);
    {
        let fpu = cpu.fpu_mut().unwrap();
        fpu.fp[0] = ExtendedReal::from_f64(2.7);
        fpu.control = 0x10; // toward zero
    }
    cpu.step_one();
    assert_eq!(cpu.d[1], 2);

    let mut cpu = m68k_with_program(&bus, &[0xF201, cw(3, 0, 0, 0)]);
    {
        let fpu = cpu.fpu_mut().unwrap();
        fpu.fp[0] = ExtendedReal::from_f64(2.7);
        fpu.control = 0x30; // toward plus infinity
    }
    cpu.step_one();
    assert_eq!(cpu.d[1], 3);
}

#[test]
fn test_fint_uses_rounding_mode() {
    let mut cpu = m68k(&[0xF200, cw(0, 1, 0, 0x01)]); // FINT FP1,FP0
    {
        let fpu = cpu.fpu_mut().unwrap();
        fpu.fp[1] = ExtendedReal::from_f64(-2.5);
        fpu.control = 0x20; // toward minus infinity
    }
    cpu.step_one();
    assert_eq!(cpu.fpu().unwrap().fp[0].to_f64(), -3.0);
}

#[test]
fn test_fsqrt_of_negative_flags_nan() {
    let mut cpu = m68k(&[0xF200, cw(0, 1, 0, 0x04)]); // FSQRT FP1,FP0
    {
        let fpu = cpu.fpu_mut().unwrap();
        fpu.fp[1] = ExtendedReal::from_f64(-4.0);
    }
    cpu.step_one();
    let fpu = cpu.fpu().unwrap();
    assert!(fpu.fp[0].is_nan());
    assert_ne!(fpu.status & CC_NAN, 0);
}

#[test]
fn test_ftst_classifies_source() {
    let mut cpu = m68k(&[0xF200, cw(0, 3, 0, 0x3A)]); // FTST FP3
    {
        let fpu = cpu.fpu_mut().unwrap();
        fpu.fp[3] = ExtendedReal::zero(true);
    }
    cpu.step_one();
    let status = cpu.fpu().unwrap().status;
    assert_ne!(status & CC_ZERO, 0);
    assert_ne!(status & CC_NEGATIVE, 0, "negative zero keeps its sign");
}

#[test]
fn test_extended_memory_roundtrip() {
    let bus = test_bus();
    // FMOVE.X FP0,(A0) then FMOVE.X (A0),FP5.
    let mut cpu = m68k_with_program(&bus, &[
        0xF210, cw(3, 2, 0, 0),
        0xF210, cw(2, 2, 5, 0),
    ]);
    cpu.a[0] = 0x3000;
    {
        let fpu = cpu.fpu_mut().unwrap();
        fpu.fp[0] = ExtendedReal::from_f64(1234.5678);
    }
    cpu.step_one();
    cpu.step_one();
    let fpu = cpu.fpu().unwrap();
    assert_eq!(fpu.fp[5], fpu.fp[0], "extended store/load is exact");
}

#[test]
fn test_fpcr_moves() {
    // FMOVE.L D0,FPCR then FMOVE.L FPSR,D1.
    let mut cpu = m68k(&[
        0xF200, 0x9000, // to FPCR (opclass 100, sel 100)
        0xF201, 0xA800, // from FPSR (opclass 101, sel 010)
    ]);
    cpu.d[0] = 0x30;
    cpu.step_one();
    assert_eq!(cpu.fpu().unwrap().control, 0x30);
    cpu.fpu_mut().unwrap().status = 0x0400_0000;
    cpu.step_one();
    assert_eq!(cpu.d[1], 0x0400_0000);
}
