//! Target capability descriptor: which timers and PWM pins the selected
//! device provides, and where their registers live.
//!
//! [`Board::take`] builds one [`Timer`] per physical timer/counter, exactly
//! once for the life of the program, and hands the set out by value. Pass
//! `&Board` (or individual `&Timer` handles) to whatever needs a timer;
//! there are no global instances.
//!
//! The pin routing ([`ServoPin::timer_id`] / [`ServoPin::channel`]) is a
//! static table: each hardware PWM pin is permanently wired to one compare
//! channel of one 16-bit timer.

use portable_atomic::{AtomicBool, Ordering};

use crate::registers::{Reg8, Reg16, TimerRegisters};
use crate::timer::{Channel, Timer, Width};
use crate::{Error, Result};

static TAKEN: AtomicBool = AtomicBool::new(false);

#[expect(
    unsafe_code,
    reason = "board construction turns datasheet addresses into register handles"
)]
fn reg8(addr: usize) -> Reg8 {
    // SAFETY: every address below comes from the selected device's datasheet
    // and maps a device register for the whole program.
    unsafe { Reg8::new(addr as *mut u8) }
}

/// Build a 16-bit timer from its base address. The megaAVR 16-bit timers
/// share one layout: A/B/C control, counter, capture, then the compare pairs.
fn timer16(base: usize, compare_channels: u8, int_mask: usize, int_flag: usize) -> Timer {
    let compare_c = if compare_channels >= 3 {
        Some(Reg16::new(Some(reg8(base + 0x0D)), reg8(base + 0x0C)))
    } else {
        None
    };
    Timer::new(
        Width::Bits16,
        compare_channels,
        TimerRegisters {
            control_a: reg8(base),
            control_b: reg8(base + 0x01),
            control_c: Some(reg8(base + 0x02)),
            counter: Reg16::new(Some(reg8(base + 0x05)), reg8(base + 0x04)),
            capture: Some(Reg16::new(Some(reg8(base + 0x07)), reg8(base + 0x06))),
            compare_a: Reg16::new(Some(reg8(base + 0x09)), reg8(base + 0x08)),
            compare_b: Reg16::new(Some(reg8(base + 0x0B)), reg8(base + 0x0A)),
            compare_c,
            int_mask: reg8(int_mask),
            int_flag: reg8(int_flag),
        },
    )
}

/// Build an 8-bit timer from its base address (control A/B, counter, two
/// compare registers).
fn timer8(base: usize, int_mask: usize, int_flag: usize) -> Timer {
    Timer::new(
        Width::Bits8,
        2,
        TimerRegisters {
            control_a: reg8(base),
            control_b: reg8(base + 0x01),
            control_c: None,
            counter: Reg16::narrow(reg8(base + 0x02)),
            capture: None,
            compare_a: Reg16::narrow(reg8(base + 0x03)),
            compare_b: Reg16::narrow(reg8(base + 0x04)),
            compare_c: None,
            int_mask: reg8(int_mask),
            int_flag: reg8(int_flag),
        },
    )
}

#[cfg(feature = "atmega328p")]
mod map {
    pub const TIMER0_BASE: usize = 0x44;
    pub const TIMER1_BASE: usize = 0x80;
    pub const TIMER2_BASE: usize = 0xB0;
    pub const TIMSK0: usize = 0x6E;
    pub const TIMSK1: usize = 0x6F;
    pub const TIMSK2: usize = 0x70;
    pub const TIFR0: usize = 0x35;
    pub const TIFR1: usize = 0x36;
    pub const TIFR2: usize = 0x37;
    pub const DDRB: usize = 0x24;
}

#[cfg(feature = "atmega2560")]
mod map {
    pub const TIMER0_BASE: usize = 0x44;
    pub const TIMER1_BASE: usize = 0x80;
    pub const TIMER2_BASE: usize = 0xB0;
    pub const TIMER3_BASE: usize = 0x90;
    pub const TIMER4_BASE: usize = 0xA0;
    pub const TIMER5_BASE: usize = 0x120;
    pub const TIMSK0: usize = 0x6E;
    pub const TIMSK1: usize = 0x6F;
    pub const TIMSK2: usize = 0x70;
    pub const TIMSK3: usize = 0x71;
    pub const TIMSK4: usize = 0x72;
    pub const TIMSK5: usize = 0x73;
    pub const TIFR0: usize = 0x35;
    pub const TIFR1: usize = 0x36;
    pub const TIFR2: usize = 0x37;
    pub const TIFR3: usize = 0x38;
    pub const TIFR4: usize = 0x39;
    pub const TIFR5: usize = 0x3A;
    pub const DDRB: usize = 0x24;
    pub const DDRE: usize = 0x2D;
    pub const DDRH: usize = 0x101;
    pub const DDRL: usize = 0x10A;
}

/// Identity of one timer/counter peripheral on the selected device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimerId {
    /// Timer/counter 0 (8-bit).
    Timer0,
    /// Timer/counter 1 (16-bit).
    Timer1,
    /// Timer/counter 2 (8-bit).
    Timer2,
    /// Timer/counter 3 (16-bit).
    #[cfg(feature = "atmega2560")]
    Timer3,
    /// Timer/counter 4 (16-bit).
    #[cfg(feature = "atmega2560")]
    Timer4,
    /// Timer/counter 5 (16-bit).
    #[cfg(feature = "atmega2560")]
    Timer5,
}

/// Hardware PWM output pins usable for servo control.
///
/// Only pins driven by 16-bit timers qualify: 8-bit timers cannot hold a
/// 20 ms frame at servo resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ServoPin {
    /// Timer 1 channel A (PB1 on the 328P, PB5 on the 2560).
    Oc1a,
    /// Timer 1 channel B (PB2 on the 328P, PB6 on the 2560).
    Oc1b,
    /// Timer 1 channel C (PB7).
    #[cfg(feature = "atmega2560")]
    Oc1c,
    /// Timer 3 channel A (PE3).
    #[cfg(feature = "atmega2560")]
    Oc3a,
    /// Timer 3 channel B (PE4).
    #[cfg(feature = "atmega2560")]
    Oc3b,
    /// Timer 3 channel C (PE5).
    #[cfg(feature = "atmega2560")]
    Oc3c,
    /// Timer 4 channel A (PH3).
    #[cfg(feature = "atmega2560")]
    Oc4a,
    /// Timer 4 channel B (PH4).
    #[cfg(feature = "atmega2560")]
    Oc4b,
    /// Timer 4 channel C (PH5).
    #[cfg(feature = "atmega2560")]
    Oc4c,
    /// Timer 5 channel A (PL3).
    #[cfg(feature = "atmega2560")]
    Oc5a,
    /// Timer 5 channel B (PL4).
    #[cfg(feature = "atmega2560")]
    Oc5b,
    /// Timer 5 channel C (PL5).
    #[cfg(feature = "atmega2560")]
    Oc5c,
}

pub(crate) struct PinRoute {
    pub timer: TimerId,
    pub channel: Channel,
    pub ddr_addr: usize,
    pub ddr_bit: u8,
}

#[cfg(feature = "atmega328p")]
impl ServoPin {
    pub(crate) const fn route(self) -> PinRoute {
        match self {
            Self::Oc1a => PinRoute {
                timer: TimerId::Timer1,
                channel: Channel::A,
                ddr_addr: map::DDRB,
                ddr_bit: 1,
            },
            Self::Oc1b => PinRoute {
                timer: TimerId::Timer1,
                channel: Channel::B,
                ddr_addr: map::DDRB,
                ddr_bit: 2,
            },
        }
    }
}

#[cfg(feature = "atmega2560")]
impl ServoPin {
    pub(crate) const fn route(self) -> PinRoute {
        let (timer, channel, ddr_addr, ddr_bit) = match self {
            Self::Oc1a => (TimerId::Timer1, Channel::A, map::DDRB, 5),
            Self::Oc1b => (TimerId::Timer1, Channel::B, map::DDRB, 6),
            Self::Oc1c => (TimerId::Timer1, Channel::C, map::DDRB, 7),
            Self::Oc3a => (TimerId::Timer3, Channel::A, map::DDRE, 3),
            Self::Oc3b => (TimerId::Timer3, Channel::B, map::DDRE, 4),
            Self::Oc3c => (TimerId::Timer3, Channel::C, map::DDRE, 5),
            Self::Oc4a => (TimerId::Timer4, Channel::A, map::DDRH, 3),
            Self::Oc4b => (TimerId::Timer4, Channel::B, map::DDRH, 4),
            Self::Oc4c => (TimerId::Timer4, Channel::C, map::DDRH, 5),
            Self::Oc5a => (TimerId::Timer5, Channel::A, map::DDRL, 3),
            Self::Oc5b => (TimerId::Timer5, Channel::B, map::DDRL, 4),
            Self::Oc5c => (TimerId::Timer5, Channel::C, map::DDRL, 5),
        };
        PinRoute {
            timer,
            channel,
            ddr_addr,
            ddr_bit,
        }
    }
}

impl ServoPin {
    /// Which timer peripheral drives this pin.
    #[must_use]
    pub const fn timer_id(self) -> TimerId {
        self.route().timer
    }

    /// Which compare channel of that timer drives this pin.
    #[must_use]
    pub const fn channel(self) -> Channel {
        self.route().channel
    }
}

/// The timer peripherals of the selected device.
///
/// One instance exists per program run; see [`Board::take`].
pub struct Board {
    /// Timer/counter 0 (8-bit).
    pub timer0: Timer,
    /// Timer/counter 1 (16-bit).
    pub timer1: Timer,
    /// Timer/counter 2 (8-bit).
    pub timer2: Timer,
    /// Timer/counter 3 (16-bit).
    #[cfg(feature = "atmega2560")]
    pub timer3: Timer,
    /// Timer/counter 4 (16-bit).
    #[cfg(feature = "atmega2560")]
    pub timer4: Timer,
    /// Timer/counter 5 (16-bit).
    #[cfg(feature = "atmega2560")]
    pub timer5: Timer,
}

impl Board {
    /// Hand out the device's timers, once.
    ///
    /// # Errors
    ///
    /// [`Error::TimersAlreadyTaken`] on every call after the first.
    pub fn take() -> Result<Self> {
        if TAKEN.swap(true, Ordering::SeqCst) {
            return Err(Error::TimersAlreadyTaken);
        }
        Ok(Self::build())
    }

    #[cfg(feature = "atmega328p")]
    fn build() -> Self {
        Self {
            timer0: timer8(map::TIMER0_BASE, map::TIMSK0, map::TIFR0),
            timer1: timer16(map::TIMER1_BASE, 2, map::TIMSK1, map::TIFR1),
            timer2: timer8(map::TIMER2_BASE, map::TIMSK2, map::TIFR2),
        }
    }

    #[cfg(feature = "atmega2560")]
    fn build() -> Self {
        Self {
            timer0: timer8(map::TIMER0_BASE, map::TIMSK0, map::TIFR0),
            timer1: timer16(map::TIMER1_BASE, 3, map::TIMSK1, map::TIFR1),
            timer2: timer8(map::TIMER2_BASE, map::TIMSK2, map::TIFR2),
            timer3: timer16(map::TIMER3_BASE, 3, map::TIMSK3, map::TIFR3),
            timer4: timer16(map::TIMER4_BASE, 3, map::TIMSK4, map::TIFR4),
            timer5: timer16(map::TIMER5_BASE, 3, map::TIMSK5, map::TIFR5),
        }
    }

    /// Look up a timer by identity.
    #[must_use]
    pub fn timer(&self, id: TimerId) -> &Timer {
        match id {
            TimerId::Timer0 => &self.timer0,
            TimerId::Timer1 => &self.timer1,
            TimerId::Timer2 => &self.timer2,
            #[cfg(feature = "atmega2560")]
            TimerId::Timer3 => &self.timer3,
            #[cfg(feature = "atmega2560")]
            TimerId::Timer4 => &self.timer4,
            #[cfg(feature = "atmega2560")]
            TimerId::Timer5 => &self.timer5,
        }
    }

    /// Drive a servo pin's port direction to output.
    pub(crate) fn configure_pin_output(&self, pin: ServoPin) {
        let route = pin.route();
        let ddr = reg8(route.ddr_addr);
        ddr.write(ddr.read() | (1 << route.ddr_bit));
    }
}
