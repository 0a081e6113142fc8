use lumen_core::cpu::CpuCore;
use lumen_core::cpu::m68k::Sr;

mod common;
use common::{PROGRAM_BASE, STACK_TOP, m68k_with_program, test_bus};

#[test]
fn test_reset_loads_vectors_and_supervisor_state() {
    let bus = test_bus();
    let cpu = m68k_with_program(&bus, &[0x4E71]);
    assert_eq!(cpu.a[7], STACK_TOP);
    assert_eq!(cpu.pc, PROGRAM_BASE);
    assert_ne!(cpu.sr_bits() & Sr::SUPERVISOR.bits(), 0);
    assert_eq!(cpu.sr_bits() >> 8 & 7, 7, "interrupts masked at level 7");
}

#[test]
fn test_illegal_opcode_takes_vector_4() {
    let bus = test_bus();
    bus.write32_be(4 * 4, 0x7000);
    let mut cpu = m68k_with_program(&bus, &[0x4AFC]);
    cpu.step_one();
    assert_eq!(cpu.pc, 0x7000);
    // The frame holds the old SR (on top) then the return PC.
    assert_eq!(bus.read32_be(cpu.a[7] + 2), PROGRAM_BASE + 2);
}

#[test]
fn test_line_a_and_line_f_vectors() {
    let bus = test_bus();
    bus.write32_be(10 * 4, 0x7100);
    bus.write32_be(11 * 4, 0x7200);
    let mut cpu = m68k_with_program(&bus, &[0xA123]);
    cpu.step_one();
    assert_eq!(cpu.pc, 0x7100);

    let mut cpu = m68k_with_program(&bus, &[0xF201, 0x0000]).without_fpu();
    cpu.step_one();
    assert_eq!(cpu.pc, 0x7200, "no FPU routes the F-line");
}

#[test]
fn test_privilege_violation_from_user_mode() {
    let bus = test_bus();
    bus.write32_be(8 * 4, 0x7300);
    // Drop to user mode, then try the privileged STOP.
    let mut cpu = m68k_with_program(&bus, &[0x46FC, 0x0000, 0x4E72, 0x2700]);
    cpu.step_one();
    assert_eq!(cpu.sr_bits() & Sr::SUPERVISOR.bits(), 0);
    cpu.step_one();
    assert_eq!(cpu.pc, 0x7300);
    assert_ne!(cpu.sr_bits() & Sr::SUPERVISOR.bits(), 0);
}

#[test]
fn test_stack_banks_swap_on_mode_change() {
    let bus = test_bus();
    bus.write32_be(32 * 4, 0x7400); // TRAP #0
    // Enter user mode; the user stack starts at zero (never set).
    let mut cpu = m68k_with_program(&bus, &[0x46FC, 0x0000, 0x4E40]);
    let ssp = cpu.a[7];
    cpu.step_one();
    assert_eq!(cpu.a[7], 0, "user bank becomes the active SP");
    cpu.a[7] = 0x8000; // give the user program a stack
    cpu.step_one(); // TRAP back into supervisor
    assert_eq!(cpu.pc, 0x7400);
    assert_eq!(cpu.a[7], ssp - 6, "frame pushed on the supervisor bank");
}

#[test]
fn test_trace_fires_after_instruction() {
    let bus = test_bus();
    bus.write32_be(9 * 4, 0x7500);
    // Set trace via MOVE to SR, then run one NOP.
    let mut cpu = m68k_with_program(&bus, &[0x46FC, 0xA700, 0x4E71]);
    cpu.step_one();
    cpu.step_one(); // NOP, then trace exception
    assert_eq!(cpu.pc, 0x7500);
    assert_eq!(
        cpu.sr_bits() & Sr::TRACE.bits(),
        0,
        "trace clears while handling"
    );
}

#[test]
fn test_stop_parks_the_core() {
    let bus = test_bus();
    let mut cpu = m68k_with_program(&bus, &[0x4E72, 0x2700, 0x4E71]);
    cpu.step_one();
    assert!(cpu.is_stopped());
    let pc = cpu.pc;
    cpu.step_one();
    assert_eq!(cpu.pc, pc, "no fetch while stopped");
}

#[test]
fn test_autovector_interrupt_wakes_stop() {
    let bus = test_bus();
    bus.write32_be((24 + 2) * 4, 0x7600); // level-2 autovector
    let mut cpu = m68k_with_program(&bus, &[0x4E72, 0x2000, 0x4E71]);
    let irq = cpu.irq_line();
    cpu.step_one(); // STOP with mask 0
    assert!(cpu.is_stopped());
    irq.raise(2);
    cpu.step_one();
    assert_eq!(cpu.pc, 0x7600);
    assert!(!cpu.is_stopped());
    assert_eq!(cpu.sr_bits() >> 8 & 7, 2, "mask raised to the taken level");
}

#[test]
fn test_masked_interrupt_stays_pending() {
    let bus = test_bus();
    bus.write32_be((24 + 1) * 4, 0x7700);
    let mut cpu = m68k_with_program(&bus, &[0x4E71, 0x4E71]);
    let irq = cpu.irq_line();
    irq.raise(1); // below the boot mask of 7
    cpu.step_one();
    assert_eq!(cpu.pc, PROGRAM_BASE + 2, "level 1 cannot preempt mask 7");
    assert_eq!(irq.pending(), 1);
}
