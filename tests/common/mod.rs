//! Plain-memory register blocks standing in for timer hardware.
//!
//! Each block is leaked so the register pointers stay valid for the
//! lifetime of the test process; tests inspect what the timer wrote by
//! reading the cells back.

#![allow(dead_code)]

use core::cell::Cell;

use servo_envoy::registers::{Reg16, Reg8, TimerRegisters};
use servo_envoy::timer::{Timer, Width};

/// Register image of a 16-bit timer.
#[derive(Default)]
pub struct Regs16 {
    pub control_a: Cell<u8>,
    pub control_b: Cell<u8>,
    pub control_c: Cell<u8>,
    pub counter_h: Cell<u8>,
    pub counter_l: Cell<u8>,
    pub capture_h: Cell<u8>,
    pub capture_l: Cell<u8>,
    pub compare_a_h: Cell<u8>,
    pub compare_a_l: Cell<u8>,
    pub compare_b_h: Cell<u8>,
    pub compare_b_l: Cell<u8>,
    pub compare_c_h: Cell<u8>,
    pub compare_c_l: Cell<u8>,
    pub int_mask: Cell<u8>,
    pub int_flag: Cell<u8>,
}

impl Regs16 {
    pub fn counter(&self) -> u16 {
        wide(&self.counter_h, &self.counter_l)
    }

    pub fn capture(&self) -> u16 {
        wide(&self.capture_h, &self.capture_l)
    }

    pub fn compare_a(&self) -> u16 {
        wide(&self.compare_a_h, &self.compare_a_l)
    }

    pub fn compare_b(&self) -> u16 {
        wide(&self.compare_b_h, &self.compare_b_l)
    }

    pub fn compare_c(&self) -> u16 {
        wide(&self.compare_c_h, &self.compare_c_l)
    }
}

/// Register image of an 8-bit timer.
#[derive(Default)]
pub struct Regs8 {
    pub control_a: Cell<u8>,
    pub control_b: Cell<u8>,
    pub counter: Cell<u8>,
    pub compare_a: Cell<u8>,
    pub compare_b: Cell<u8>,
    pub int_mask: Cell<u8>,
    pub int_flag: Cell<u8>,
}

fn wide(high: &Cell<u8>, low: &Cell<u8>) -> u16 {
    (u16::from(high.get()) << 8) | u16::from(low.get())
}

#[expect(
    unsafe_code,
    reason = "tests hand the timer pointers into leaked plain memory"
)]
fn reg(cell: &Cell<u8>) -> Reg8 {
    // SAFETY: the cell lives in a leaked block, so the pointer is valid for
    // the rest of the process.
    unsafe { Reg8::new(cell.as_ptr()) }
}

/// A 16-bit, three-channel timer over a fresh register image.
pub fn timer16() -> (Timer, &'static Regs16) {
    timer16_with_channels(3)
}

/// A 16-bit, two-channel timer (no compare C register), like the 328P's
/// timer 1.
pub fn timer16_dual() -> (Timer, &'static Regs16) {
    timer16_with_channels(2)
}

fn timer16_with_channels(compare_channels: u8) -> (Timer, &'static Regs16) {
    let regs: &'static Regs16 = Box::leak(Box::default());
    let compare_c = (compare_channels >= 3)
        .then(|| Reg16::new(Some(reg(&regs.compare_c_h)), reg(&regs.compare_c_l)));
    let timer = Timer::new(
        Width::Bits16,
        compare_channels,
        TimerRegisters {
            control_a: reg(&regs.control_a),
            control_b: reg(&regs.control_b),
            control_c: Some(reg(&regs.control_c)),
            counter: Reg16::new(Some(reg(&regs.counter_h)), reg(&regs.counter_l)),
            capture: Some(Reg16::new(Some(reg(&regs.capture_h)), reg(&regs.capture_l))),
            compare_a: Reg16::new(Some(reg(&regs.compare_a_h)), reg(&regs.compare_a_l)),
            compare_b: Reg16::new(Some(reg(&regs.compare_b_h)), reg(&regs.compare_b_l)),
            compare_c,
            int_mask: reg(&regs.int_mask),
            int_flag: reg(&regs.int_flag),
        },
    );
    (timer, regs)
}

/// An 8-bit, two-channel timer over a fresh register image.
pub fn timer8() -> (Timer, &'static Regs8) {
    let regs: &'static Regs8 = Box::leak(Box::default());
    let timer = Timer::new(
        Width::Bits8,
        2,
        TimerRegisters {
            control_a: reg(&regs.control_a),
            control_b: reg(&regs.control_b),
            control_c: None,
            counter: Reg16::narrow(reg(&regs.counter)),
            capture: None,
            compare_a: Reg16::narrow(reg(&regs.compare_a)),
            compare_b: Reg16::narrow(reg(&regs.compare_b)),
            compare_c: None,
            int_mask: reg(&regs.int_mask),
            int_flag: reg(&regs.int_flag),
        },
    );
    (timer, regs)
}
