//! A device abstraction for one hardware timer/counter peripheral.
//!
//! A [`Timer`] owns the register group of a single timer/counter and moves it
//! between a small set of operating modes: [`Mode::Normal`] (free-running
//! count) and [`Mode::FastPwm`] (count to TOP, restart, toggle compare pins
//! on match). A prescaler is *staged* with [`Timer::set_prescaler`] and only
//! reaches hardware on the next mode transition.
//!
//! Every multi-register control update goes through one atomic commit:
//! interrupts are held off while control register A, then C (16-bit timers),
//! then B are written. B goes last because its clock-select bits activate the
//! counter, and the hardware must never see new clocking with stale waveform
//! configuration or vice versa.
//!
//! Several pulse generators may share one timer on different compare
//! channels; methods therefore take `&self` and keep their bookkeeping in
//! [`Cell`]s. The crate does not arbitrate conflicting reconfiguration of a
//! shared timer: the last mode-set wins.

use core::cell::Cell;
use core::convert::Infallible;

use embedded_hal::pwm::{ErrorType, SetDutyCycle};

use crate::registers::TimerRegisters;

// Waveform-generation bit placement (architecture-defined, identical across
// the megaAVR timers this crate drives).
const FAST_PWM_8BIT_A: u8 = 0b0000_0011; // WGM01 | WGM00: fast PWM, TOP = 0xFF
const FAST_PWM_16BIT_A: u8 = 0b0000_0010; // WGM11: fast PWM, TOP = ICR (low half)
const FAST_PWM_16BIT_B: u8 = 0b0001_1000; // WGM13 | WGM12 (high half)

// Compare-output mode field values, shifted per channel into control A.
const COM_CLEAR_ON_MATCH: u8 = 0b10;
const COM_SET_ON_MATCH: u8 = 0b11;

/// Clock prescaler applied between the system clock and the counter.
///
/// Staged: setting a prescaler has no hardware effect until the next mode
/// transition commits it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Prescaler {
    /// No prescaling: the counter runs at the system clock.
    Direct,
    /// System clock ÷ 8.
    Div8,
    /// System clock ÷ 64.
    Div64,
    /// System clock ÷ 256.
    Div256,
    /// System clock ÷ 1024.
    Div1024,
}

impl Prescaler {
    /// Clock-select bits for control register B.
    const fn clock_select(self) -> u8 {
        match self {
            Self::Direct => 0b001,
            Self::Div8 => 0b010,
            Self::Div64 => 0b011,
            Self::Div256 => 0b100,
            Self::Div1024 => 0b101,
        }
    }

    /// The division factor.
    #[must_use]
    pub const fn divisor(self) -> u32 {
        match self {
            Self::Direct => 1,
            Self::Div8 => 8,
            Self::Div64 => 64,
            Self::Div256 => 256,
            Self::Div1024 => 1024,
        }
    }
}

/// Counter word width.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Width {
    /// 8-bit counter (two compare channels, TOP fixed at 0xFF in fast PWM).
    Bits8,
    /// 16-bit counter (TOP taken from the input-capture register in fast PWM).
    Bits16,
}

impl Width {
    /// The counter's ceiling value.
    #[must_use]
    pub const fn counter_max(self) -> u16 {
        match self {
            Self::Bits8 => 0x00FF,
            Self::Bits16 => 0xFFFF,
        }
    }
}

/// Operating mode of a timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    /// Power-on state: no clock source committed, counter stopped.
    Idle,
    /// Free-running count over the full counter range.
    Normal,
    /// Count 0..=TOP, restart, toggle compare outputs on match.
    FastPwm,
}

/// One output-compare channel of a timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Channel {
    /// Channel A.
    A,
    /// Channel B.
    B,
    /// Channel C; present on 16-bit timers only.
    C,
}

impl Channel {
    /// Bit position of this channel's compare-output mode field in control
    /// register A.
    const fn com_shift(self) -> u8 {
        match self {
            Self::A => 6,
            Self::B => 4,
            Self::C => 2,
        }
    }
}

/// A set of compare channels, for operations that update several at once.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Channels(u8);

impl Channels {
    /// Channel A only.
    pub const A: Self = Self(1 << 0);
    /// Channel B only.
    pub const B: Self = Self(1 << 1);
    /// Channel C only.
    pub const C: Self = Self(1 << 2);

    /// Whether `channel` is in the set.
    #[must_use]
    pub const fn contains(self, channel: Channel) -> bool {
        let bit = match channel {
            Channel::A => Self::A.0,
            Channel::B => Self::B.0,
            Channel::C => Self::C.0,
        };
        self.0 & bit != 0
    }
}

impl core::ops::BitOr for Channels {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl From<Channel> for Channels {
    fn from(channel: Channel) -> Self {
        match channel {
            Channel::A => Self::A,
            Channel::B => Self::B,
            Channel::C => Self::C,
        }
    }
}

/// Configuration last committed to hardware, kept so callers can check the
/// current mode/prescaler/TOP without decoding registers.
#[derive(Clone, Copy)]
struct Applied {
    mode: Mode,
    prescaler: Prescaler,
    top: u16,
}

/// One hardware timer/counter peripheral.
///
/// Instances are created once per physical peripheral (normally by
/// [`Board::take`](crate::board::Board::take)) and live for the rest of the
/// program.
pub struct Timer {
    width: Width,
    compare_channels: u8,
    regs: TimerRegisters,
    staged: Cell<Prescaler>,
    applied: Cell<Applied>,
}

impl Timer {
    /// Wrap a register group.
    ///
    /// `compare_channels` is how many output-compare channels the peripheral
    /// provides (2 or 3); requests for channels beyond it are ignored.
    #[must_use]
    pub fn new(width: Width, compare_channels: u8, regs: TimerRegisters) -> Self {
        Self {
            width,
            compare_channels,
            regs,
            staged: Cell::new(Prescaler::Direct),
            applied: Cell::new(Applied {
                mode: Mode::Idle,
                prescaler: Prescaler::Direct,
                top: width.counter_max(),
            }),
        }
    }

    /// Stage a prescaler for the next mode transition.
    ///
    /// No hardware effect until [`set_normal_mode`](Self::set_normal_mode) or
    /// [`set_fast_pwm_mode`](Self::set_fast_pwm_mode) commits it.
    pub fn set_prescaler(&self, prescaler: Prescaler) {
        if prescaler != self.staged.get() {
            self.staged.set(prescaler);
        }
    }

    /// The mode last committed to hardware ([`Mode::Idle`] before any
    /// mode-set call).
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.applied.get().mode
    }

    /// The prescaler last committed to hardware (not the staged one).
    #[must_use]
    pub fn prescaler(&self) -> Prescaler {
        self.applied.get().prescaler
    }

    /// The current TOP value: the committed fast-PWM TOP, or the counter
    /// ceiling in idle/normal mode.
    #[must_use]
    pub fn top(&self) -> u16 {
        self.applied.get().top
    }

    /// Counter word width.
    #[must_use]
    pub fn width(&self) -> Width {
        self.width
    }

    /// Switch to normal (free-running) mode.
    ///
    /// Commits the staged prescaler, clears every compare-output action, and
    /// resets the counter to zero.
    pub fn set_normal_mode(&self) {
        // Normal mode is all waveform-generation bits zero; only the clock
        // select is composed in.
        let control_b = self.staged.get().clock_select();
        self.commit_control(0, control_b, 0);
        self.regs.counter.write(0);
        self.applied.set(Applied {
            mode: Mode::Normal,
            prescaler: self.staged.get(),
            top: self.width.counter_max(),
        });
    }

    /// Switch to fast-PWM mode with the given TOP value.
    ///
    /// On 16-bit timers TOP is programmed into the input-capture register; on
    /// 8-bit timers the hardware fixes TOP at 0xFF and `top` is ignored.
    /// Commits the staged prescaler, clears every compare-output action, and
    /// resets the counter to zero.
    pub fn set_fast_pwm_mode(&self, top: u16) {
        let mut control_a = 0u8;
        let mut control_b = 0u8;
        let committed_top;

        match self.width {
            Width::Bits16 => {
                control_a |= FAST_PWM_16BIT_A;
                control_b |= FAST_PWM_16BIT_B;
                if let Some(capture) = self.regs.capture {
                    capture.write(top);
                }
                committed_top = top;
            }
            Width::Bits8 => {
                control_a |= FAST_PWM_8BIT_A;
                committed_top = Width::Bits8.counter_max();
            }
        }

        control_b |= self.staged.get().clock_select();
        self.commit_control(control_a, control_b, 0);
        self.regs.counter.write(0);
        self.applied.set(Applied {
            mode: Mode::FastPwm,
            prescaler: self.staged.get(),
            top: committed_top,
        });
    }

    /// Write `value` to the compare registers of every channel in
    /// `channels` and arm their compare-output actions.
    ///
    /// `inverting` selects set-on-match instead of clear-on-match. On 8-bit
    /// timers only the low byte of `value` reaches the register. Channels the
    /// peripheral lacks are ignored without signal.
    pub fn set_compare_value(&self, channels: Channels, value: u16, inverting: bool) {
        let com = if inverting {
            COM_SET_ON_MATCH
        } else {
            COM_CLEAR_ON_MATCH
        };

        // Compose onto the live control values so channels configured earlier
        // keep their compare-output actions.
        let mut control_a = self.regs.control_a.read();
        let control_b = self.regs.control_b.read();
        let control_c = match self.regs.control_c {
            Some(reg) => reg.read(),
            None => 0,
        };

        if channels.contains(Channel::A) && self.has_channel(Channel::A) {
            control_a |= com << Channel::A.com_shift();
            self.regs.compare_a.write(value);
        }

        if channels.contains(Channel::B) && self.has_channel(Channel::B) {
            control_a |= com << Channel::B.com_shift();
            self.regs.compare_b.write(value);
        }

        if channels.contains(Channel::C) && self.has_channel(Channel::C) {
            control_a |= com << Channel::C.com_shift();
            if let Some(compare_c) = self.regs.compare_c {
                compare_c.write(value);
            }
        }

        self.commit_control(control_a, control_b, control_c);
    }

    /// Shortcut for [`set_compare_value`](Self::set_compare_value) on channel A.
    pub fn set_compare_a(&self, value: u16, inverting: bool) {
        self.set_compare_value(Channels::A, value, inverting);
    }

    /// Shortcut for [`set_compare_value`](Self::set_compare_value) on channel B.
    pub fn set_compare_b(&self, value: u16, inverting: bool) {
        self.set_compare_value(Channels::B, value, inverting);
    }

    /// Shortcut for [`set_compare_value`](Self::set_compare_value) on channel C.
    pub fn set_compare_c(&self, value: u16, inverting: bool) {
        self.set_compare_value(Channels::C, value, inverting);
    }

    /// View one compare channel as an [`embedded_hal::pwm::SetDutyCycle`]
    /// output. `None` if the peripheral lacks the channel.
    #[must_use]
    pub fn channel(&self, channel: Channel) -> Option<PwmChannel<'_>> {
        self.has_channel(channel).then_some(PwmChannel {
            timer: self,
            channel,
        })
    }

    fn has_channel(&self, channel: Channel) -> bool {
        match channel {
            Channel::A => self.compare_channels >= 1,
            Channel::B => self.compare_channels >= 2,
            Channel::C => {
                self.width == Width::Bits16
                    && self.compare_channels >= 3
                    && self.regs.compare_c.is_some()
            }
        }
    }

    /// Overwrite the whole control register group atomically.
    ///
    /// Interrupts are held off for the duration so a compare-match handler
    /// can never observe a half-configured group. Control B is written last:
    /// its clock-select bits start the counter.
    fn commit_control(&self, control_a: u8, control_b: u8, control_c: u8) {
        critical_section::with(|_| {
            self.regs.control_a.write(control_a);
            if let Some(reg) = self.regs.control_c {
                reg.write(control_c);
            }
            self.regs.control_b.write(control_b);
        });
    }
}

/// One compare channel of a [`Timer`], exposed through the `embedded-hal`
/// PWM trait. The duty range is the timer's current TOP.
pub struct PwmChannel<'a> {
    timer: &'a Timer,
    channel: Channel,
}

impl ErrorType for PwmChannel<'_> {
    type Error = Infallible;
}

impl SetDutyCycle for PwmChannel<'_> {
    fn max_duty_cycle(&self) -> u16 {
        self.timer.top()
    }

    fn set_duty_cycle(&mut self, duty: u16) -> core::result::Result<(), Self::Error> {
        self.timer
            .set_compare_value(self.channel.into(), duty, false);
        Ok(())
    }
}
