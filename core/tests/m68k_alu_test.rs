use lumen_core::cpu::m68k::Sr;

mod common;
use common::{PROGRAM_BASE, m68k};

#[test]
fn test_addq_word_overflow_sets_n_and_v() {
    // ADDQ.W #1,D0 with D0 at the signed word maximum.
    let mut cpu = m68k(&[0x5240]);
    cpu.d[0] = 0x0000_7FFF;
    cpu.step_one();
    assert_eq!(cpu.d[0], 0x0000_8000);
    let sr = cpu.sr_bits();
    assert_ne!(sr & Sr::NEGATIVE.bits(), 0);
    assert_ne!(sr & Sr::OVERFLOW.bits(), 0);
    assert_eq!(sr & Sr::ZERO.bits(), 0);
    assert_eq!(sr & Sr::CARRY.bits(), 0);
}

#[test]
fn test_muls_word_sign_extends() {
    // MULS.W D1,D0: 16 * -16.
    let mut cpu = m68k(&[0xC1C1]);
    cpu.d[0] = 0x0000_0010;
    cpu.d[1] = 0x0000_FFF0;
    cpu.step_one();
    assert_eq!(cpu.d[0], 0xFFFF_FF00);
    assert_ne!(cpu.sr_bits() & Sr::NEGATIVE.bits(), 0);
}

#[test]
fn test_mulu_word_is_unsigned() {
    let mut cpu = m68k(&[0xC0C1]); // MULU.W D1,D0
    cpu.d[0] = 0x0000_0010;
    cpu.d[1] = 0x0000_FFF0;
    cpu.step_one();
    assert_eq!(cpu.d[0], 0x000F_FF00);
}

#[test]
fn test_divu_by_zero_takes_vector_5() {
    let bus = common::test_bus();
    bus.write32_be(5 * 4, 0x4000); // divide-by-zero handler
    let mut cpu = common::m68k_with_program(&bus, &[0x80C1]); // DIVU D1,D0
    cpu.d[0] = 100;
    cpu.d[1] = 0;
    cpu.step_one();
    assert_eq!(cpu.pc, 0x4000);
}

#[test]
fn test_divs_overflow_takes_vector_5() {
    let bus = common::test_bus();
    bus.write32_be(5 * 4, 0x4800);
    let mut cpu = common::m68k_with_program(&bus, &[0x81C1]); // DIVS D1,D0
    cpu.d[0] = 0x8000_0000; // -2^31 / 1 cannot fit a word quotient
    cpu.d[1] = 1;
    cpu.step_one();
    assert_eq!(cpu.pc, 0x4800);
}

#[test]
fn test_divu_results_pack_remainder_high() {
    let mut cpu = m68k(&[0x80C1]);
    cpu.d[0] = 100_007;
    cpu.d[1] = 10;
    cpu.step_one();
    assert_eq!(cpu.d[0] & 0xFFFF, 10_000);
    assert_eq!(cpu.d[0] >> 16, 7);
}

#[test]
fn test_zero_flag_respects_operand_width() {
    // ADD.B D1,D0 where the byte result wraps to zero but bit 8 carries.
    let mut cpu = m68k(&[0xD001]);
    cpu.d[0] = 0x0000_1180;
    cpu.d[1] = 0x0000_0080;
    cpu.step_one();
    assert_eq!(cpu.d[0] & 0xFF, 0);
    let sr = cpu.sr_bits();
    assert_ne!(sr & Sr::ZERO.bits(), 0, "Z is judged at byte width");
    assert_ne!(sr & Sr::CARRY.bits(), 0);
}

#[test]
fn test_x_tracks_c_for_arithmetic() {
    let mut cpu = m68k(&[0xD001, 0x9001]); // ADD.B then SUB.B
    cpu.d[0] = 0x0000_00FF;
    cpu.d[1] = 0x0000_0001;
    cpu.step_one(); // 0xFF + 1: carry out
    let sr = cpu.sr_bits();
    assert_eq!(sr & Sr::CARRY.bits() != 0, sr & Sr::EXTEND.bits() != 0);
    assert_ne!(sr & Sr::CARRY.bits(), 0);
    cpu.step_one(); // 0x00 - 1: borrow
    let sr = cpu.sr_bits();
    assert_eq!(sr & Sr::CARRY.bits() != 0, sr & Sr::EXTEND.bits() != 0);
    assert_ne!(sr & Sr::CARRY.bits(), 0);
}

#[test]
fn test_logical_ops_leave_x_alone() {
    // MOVE #X+C to CCR, then AND.B D1,D0: C clears, X survives.
    let mut cpu = m68k(&[0x44FC, 0x0011, 0xC001]);
    cpu.d[0] = 0xFF;
    cpu.d[1] = 0x0F;
    cpu.step_one();
    cpu.step_one();
    let sr = cpu.sr_bits();
    assert_eq!(sr & Sr::CARRY.bits(), 0);
    assert_ne!(sr & Sr::EXTEND.bits(), 0);
}

#[test]
fn test_addx_zero_is_cumulative() {
    // First ADDX with Z preset and a non-zero result clears Z; a second
    // with zero inputs and Z preset keeps it.
    let mut cpu = m68k(&[0x44FC, 0x0014, 0xD181]); // CCR := X|Z, ADDX.L D1,D0
    cpu.d[0] = 0;
    cpu.d[1] = 0;
    cpu.step_one();
    cpu.step_one();
    assert_eq!(cpu.d[0], 1, "ADDX consumed X");
    assert_eq!(cpu.sr_bits() & Sr::ZERO.bits(), 0, "non-zero result clears Z");

    let mut cpu = m68k(&[0x44FC, 0x0004, 0xD181]); // CCR := Z only
    cpu.d[0] = 0;
    cpu.d[1] = 0;
    cpu.step_one();
    cpu.step_one();
    assert_eq!(cpu.d[0], 0);
    assert_ne!(cpu.sr_bits() & Sr::ZERO.bits(), 0, "zero result keeps prior Z");
}

#[test]
fn test_cmp_discards_result() {
    let mut cpu = m68k(&[0xB041]); // CMP.W D1,D0
    cpu.d[0] = 5;
    cpu.d[1] = 10;
    cpu.step_one();
    assert_eq!(cpu.d[0], 5);
    let sr = cpu.sr_bits();
    assert_ne!(sr & Sr::NEGATIVE.bits(), 0);
    assert_ne!(sr & Sr::CARRY.bits(), 0);
}

#[test]
fn test_adda_touches_no_flags() {
    let mut cpu = m68k(&[0x44FC, 0x0000, 0xD0FC, 0xFFFF]); // clear CCR; ADDA.W #-1,A0
    cpu.a[0] = 0;
    cpu.step_one();
    cpu.step_one();
    assert_eq!(cpu.a[0], 0xFFFF_FFFF, "word source sign-extends");
    assert_eq!(cpu.sr_bits() & 0x1F, 0);
}

#[test]
fn test_neg_not_clr_ext() {
    let mut cpu = m68k(&[0x4480, 0x4680, 0x4280]); // NEG.L, NOT.L, CLR.L on D0
    cpu.d[0] = 1;
    cpu.step_one();
    assert_eq!(cpu.d[0], 0xFFFF_FFFF);
    cpu.step_one();
    assert_eq!(cpu.d[0], 0);
    cpu.d[0] = 0xDEAD_BEEF;
    cpu.step_one();
    assert_eq!(cpu.d[0], 0);
    assert_ne!(cpu.sr_bits() & Sr::ZERO.bits(), 0);

    let mut cpu = m68k(&[0x4880, 0x48C0]); // EXT.W then EXT.L
    cpu.d[0] = 0x0000_0080;
    cpu.step_one();
    assert_eq!(cpu.d[0] & 0xFFFF, 0xFF80);
    cpu.step_one();
    assert_eq!(cpu.d[0], 0xFFFF_FF80);
}

#[test]
fn test_immediate_group() {
    let mut cpu = m68k(&[
        0x0640, 0x0010, // ADDI.W #0x10,D0
        0x0240, 0x00FF, // ANDI.W #0xFF,D0
        0x0A40, 0x00F0, // EORI.W #0xF0,D0
        0x0C40, 0x00C2, // CMPI.W #0xC2,D0
    ]);
    cpu.d[0] = 0x22;
    cpu.step_one();
    assert_eq!(cpu.d[0], 0x32);
    cpu.step_one();
    assert_eq!(cpu.d[0], 0x32);
    cpu.step_one();
    assert_eq!(cpu.d[0], 0xC2);
    cpu.step_one();
    assert_ne!(cpu.sr_bits() & Sr::ZERO.bits(), 0);
}

#[test]
fn test_chk_in_bounds_continues() {
    let mut cpu = m68k(&[0x4181, 0x4E71]); // CHK.W D1,D0; NOP
    cpu.d[0] = 5;
    cpu.d[1] = 10;
    cpu.step_one();
    assert_eq!(cpu.pc, PROGRAM_BASE + 2, "no trap taken");
}

#[test]
fn test_chk_out_of_bounds_takes_vector_6() {
    let bus = common::test_bus();
    bus.write32_be(6 * 4, 0x5000);
    let mut cpu = common::m68k_with_program(&bus, &[0x4181]);
    cpu.d[0] = 11;
    cpu.d[1] = 10;
    cpu.step_one();
    assert_eq!(cpu.pc, 0x5000);
}
