use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use lumen_core::bus::MachineBus;
use lumen_core::cpu::bank::BankWindow;
use lumen_core::cpu::z80::{StatusFlag, Z80};

const PORT_BASE: u32 = 0xF3800;

fn cpu_with(program: &[u8]) -> (Arc<MachineBus>, Z80) {
    let bus = Arc::new(MachineBus::new(0x40_0000));
    bus.write_block(0, program);
    let cpu = Z80::new(
        Arc::clone(&bus),
        BankWindow::new(),
        PORT_BASE,
        Arc::new(AtomicBool::new(true)),
    );
    (bus, cpu)
}

#[test]
fn test_ld_immediate_and_register_moves() {
    // LD A,0x12; LD B,A; LD C,0x34; LD A,C.
    let (_bus, mut cpu) = cpu_with(&[0x3E, 0x12, 0x47, 0x0E, 0x34, 0x79]);
    for _ in 0..4 {
        cpu.step_one();
    }
    assert_eq!(cpu.b, 0x12);
    assert_eq!(cpu.a, 0x34);
}

#[test]
fn test_add_flags() {
    // LD A,0x7F; ADD A,1: signed overflow, half carry.
    let (_bus, mut cpu) = cpu_with(&[0x3E, 0x7F, 0xC6, 0x01]);
    cpu.step_one();
    cpu.step_one();
    assert_eq!(cpu.a, 0x80);
    assert!(cpu.test_flag(StatusFlag::PV));
    assert!(cpu.test_flag(StatusFlag::S));
    assert!(cpu.test_flag(StatusFlag::H));
    assert!(!cpu.test_flag(StatusFlag::C));
    assert!(!cpu.test_flag(StatusFlag::N));
}

#[test]
fn test_sub_sets_n() {
    let (_bus, mut cpu) = cpu_with(&[0x3E, 0x10, 0xD6, 0x20]); // LD A,0x10; SUB 0x20
    cpu.step_one();
    cpu.step_one();
    assert_eq!(cpu.a, 0xF0);
    assert!(cpu.test_flag(StatusFlag::N));
    assert!(cpu.test_flag(StatusFlag::C));
}

#[test]
fn test_cp_preserves_accumulator() {
    let (_bus, mut cpu) = cpu_with(&[0x3E, 0x42, 0xFE, 0x42]); // LD A,0x42; CP 0x42
    cpu.step_one();
    cpu.step_one();
    assert_eq!(cpu.a, 0x42);
    assert!(cpu.test_flag(StatusFlag::Z));
}

#[test]
fn test_hl_memory_operand() {
    // LD HL,0x4000; LD (HL),0x77; LD A,(HL); INC (HL).
    let (bus, mut cpu) = cpu_with(&[0x21, 0x00, 0x40, 0x36, 0x77, 0x7E, 0x34]);
    for _ in 0..4 {
        cpu.step_one();
    }
    assert_eq!(cpu.a, 0x77);
    assert_eq!(bus.read8(0x4000), 0x78);
}

#[test]
fn test_sixteen_bit_add_carry() {
    // LD HL,0xFFFF; LD BC,0x0001; ADD HL,BC.
    let (_bus, mut cpu) = cpu_with(&[0x21, 0xFF, 0xFF, 0x01, 0x01, 0x00, 0x09]);
    for _ in 0..3 {
        cpu.step_one();
    }
    assert_eq!(cpu.hl(), 0);
    assert!(cpu.test_flag(StatusFlag::C));
}

#[test]
fn test_push_pop_and_exchange() {
    // LD BC,0x1234; PUSH BC; POP DE; EX DE,HL.
    let (_bus, mut cpu) = cpu_with(&[0x01, 0x34, 0x12, 0xC5, 0xD1, 0xEB]);
    for _ in 0..4 {
        cpu.step_one();
    }
    assert_eq!(cpu.hl(), 0x1234);
}

#[test]
fn test_jumps_calls_returns() {
    // JP 0x0100; at 0x0100: CALL 0x0200; at 0x0200: RET.
    let (bus, mut cpu) = cpu_with(&[0xC3, 0x00, 0x01]);
    bus.write_block(0x0100, &[0xCD, 0x00, 0x02, 0x3E, 0x55]);
    bus.write_block(0x0200, &[0xC9]);
    cpu.step_one();
    assert_eq!(cpu.pc, 0x0100);
    cpu.step_one();
    assert_eq!(cpu.pc, 0x0200);
    cpu.step_one();
    assert_eq!(cpu.pc, 0x0103);
    cpu.step_one();
    assert_eq!(cpu.a, 0x55);
}

#[test]
fn test_djnz_counts_down() {
    // LD B,3; (loop) DJNZ -2.
    let (_bus, mut cpu) = cpu_with(&[0x06, 0x03, 0x10, 0xFE]);
    cpu.step_one();
    for _ in 0..2 {
        cpu.step_one();
        assert_eq!(cpu.pc, 0x0002, "loop taken while B > 0");
    }
    cpu.step_one();
    assert_eq!(cpu.pc, 0x0004);
    assert_eq!(cpu.b, 0);
}

#[test]
fn test_cb_bit_and_set() {
    // LD A,0x00; SET 3,A; BIT 3,A; RES 3,A.
    let (_bus, mut cpu) = cpu_with(&[0x3E, 0x00, 0xCB, 0xDF, 0xCB, 0x5F, 0xCB, 0x9F]);
    cpu.step_one();
    cpu.step_one();
    assert_eq!(cpu.a, 0x08);
    cpu.step_one();
    assert!(!cpu.test_flag(StatusFlag::Z));
    cpu.step_one();
    assert_eq!(cpu.a, 0x00);
}

#[test]
fn test_cb_rotates() {
    // LD A,0x81; RLCA; RRA with carry.
    let (_bus, mut cpu) = cpu_with(&[0x3E, 0x81, 0x07, 0x1F]);
    cpu.step_one();
    cpu.step_one(); // RLCA: 0x81 -> 0x03, C=1
    assert_eq!(cpu.a, 0x03);
    assert!(cpu.test_flag(StatusFlag::C));
    cpu.step_one(); // RRA: 0x03 -> 0x81 (carry into bit 7), C=1
    assert_eq!(cpu.a, 0x81);
    assert!(cpu.test_flag(StatusFlag::C));
}

#[test]
fn test_index_registers_with_displacement() {
    // LD IX,0x5000; LD (IX+2),0x9A; LD A,(IX+2).
    let (bus, mut cpu) = cpu_with(&[
        0xDD, 0x21, 0x00, 0x50, // LD IX,0x5000
        0xDD, 0x36, 0x02, 0x9A, // LD (IX+2),0x9A
        0xDD, 0x7E, 0x02, // LD A,(IX+2)
    ]);
    for _ in 0..3 {
        cpu.step_one();
    }
    assert_eq!(cpu.ix, 0x5000);
    assert_eq!(bus.read8(0x5002), 0x9A);
    assert_eq!(cpu.a, 0x9A);
}

#[test]
fn test_ldir_block_copy() {
    // LD HL,0x4000; LD DE,0x5000; LD BC,4; LDIR.
    let (bus, mut cpu) = cpu_with(&[
        0x21, 0x00, 0x40, 0x11, 0x00, 0x50, 0x01, 0x04, 0x00, 0xED, 0xB0,
    ]);
    bus.write_block(0x4000, b"copy");
    for _ in 0..3 {
        cpu.step_one();
    }
    // LDIR repeats by refetching until BC reaches zero.
    for _ in 0..4 {
        cpu.step_one();
    }
    let mut out = [0u8; 4];
    bus.read_block(0x5000, &mut out);
    assert_eq!(&out, b"copy");
    assert_eq!(cpu.bc(), 0);
    assert!(!cpu.test_flag(StatusFlag::PV), "PV clears when BC empties");
}

#[test]
fn test_sbc_hl_and_neg() {
    // OR A (clear carry); LD HL,5; LD BC,7; SBC HL,BC.
    let (_bus, mut cpu) = cpu_with(&[0xB7, 0x21, 0x05, 0x00, 0x01, 0x07, 0x00, 0xED, 0x42]);
    for _ in 0..4 {
        cpu.step_one();
    }
    assert_eq!(cpu.hl(), 0xFFFE);
    assert!(cpu.test_flag(StatusFlag::C));
    assert!(cpu.test_flag(StatusFlag::N));
}

#[test]
fn test_exx_swaps_register_banks() {
    let (_bus, mut cpu) = cpu_with(&[0x01, 0x11, 0x11, 0xD9, 0x01, 0x22, 0x22, 0xD9]);
    for _ in 0..4 {
        cpu.step_one();
    }
    assert_eq!(cpu.bc(), 0x1111, "first bank restored by the second EXX");
}

#[test]
fn test_io_ports_reach_the_bus_window() {
    // LD A,0x5A; OUT (0x42),A; IN A,(0x42).
    let (bus, mut cpu) = cpu_with(&[0x3E, 0x5A, 0xD3, 0x42, 0xDB, 0x42]);
    cpu.step_one();
    cpu.step_one();
    // The port window sits inside the MMIO range; with no handler mapped
    // the OUT is dropped and the IN reads open-bus zero.
    assert_eq!(bus.read8(PORT_BASE + 0x42 * 4), 0);
    cpu.step_one();
    assert_eq!(cpu.a, 0);
}

#[test]
fn test_interrupt_im1_jumps_to_0x38() {
    // EI; IM 1; NOP; then raise the line.
    let (bus, mut cpu) = cpu_with(&[0xFB, 0xED, 0x56, 0x00]);
    bus.write8(0x0038, 0x00);
    cpu.step_one(); // EI (takes effect after next instruction)
    cpu.step_one(); // IM 1
    let irq = cpu.irq_line();
    irq.raise(1);
    cpu.step_one();
    assert_eq!(cpu.pc, 0x0038);
}
