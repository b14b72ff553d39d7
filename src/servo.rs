//! A device abstraction for servo-style actuators on hardware PWM pins.
//!
//! A [`Servo`] binds one compare channel of a 16-bit timer and converts
//! commands in engineering units — pulse width in microseconds, angle in
//! degrees, position in percent — into compare-register ticks. Constructing
//! the first servo on a timer tunes that timer to a ~50 Hz fast-PWM frame at
//! the best resolution the clock allows; further servos on the same timer
//! detect the existing configuration and leave it alone.
//!
//! Use the [`servo!`] macro for a keyword-driven constructor with default
//! pulse-width bounds.
//!
//! # Example
//!
//! ```rust,no_run
//! use servo_envoy::board::{Board, ServoPin};
//! use servo_envoy::servo;
//!
//! let board = Board::take()?;
//! let mut steering = servo! {
//!     pin: ServoPin::Oc1a,
//!     board: &board,
//! };
//!
//! steering.set_angle(45.0);       // +45° from center
//! steering.set_position(25.0);    // quarter travel, throttle-style
//! steering.set_pulse_width(1500); // raw microseconds
//! # Ok::<(), servo_envoy::Error>(())
//! ```
//!
//! Out-of-range commands are clamped to the configured bounds; nothing is
//! reported back. That trade of diagnostics for simplicity suits the target:
//! every input has a defined, bounded response.

use micromath::F32Ext;

#[cfg(any(feature = "atmega328p", feature = "atmega2560"))]
use crate::board::{Board, ServoPin};
use crate::clock;
use crate::timer::{Channel, Mode, Prescaler, Timer};

/// Servo refresh frame length in microseconds (~50 Hz).
const FRAME_US: u32 = 20_000;

/// Target refresh rate.
const REFRESH_HZ: u32 = 50;

/// Resolution floor: below one tick per microsecond the prescaler is
/// loosened no further.
const MIN_TICKS_PER_FRAME: u32 = 20_000;

/// Default minimum pulse width for hobby servos (microseconds).
pub const SERVO_MIN_US_DEFAULT: u16 = 1_000;

/// Default maximum pulse width for hobby servos (microseconds).
pub const SERVO_MAX_US_DEFAULT: u16 = 2_000;

/// Create a servo with keyword arguments and default pulse widths.
///
/// Required fields: `pin`, `board`.
///
/// Optional fields: `min_us`, `max_us` (defaults to
/// [`SERVO_MIN_US_DEFAULT`]/[`SERVO_MAX_US_DEFAULT`]) and `init_us`
/// (defaults to the minimum).
///
/// See [`Servo`] for details and examples.
#[cfg(any(feature = "atmega328p", feature = "atmega2560"))]
#[macro_export]
macro_rules! servo {
    ($($tt:tt)*) => { $crate::__servo_impl! { $($tt)* } };
}
#[cfg(any(feature = "atmega328p", feature = "atmega2560"))]
#[doc(inline)]
pub use servo;

// Public for macro expansion in downstream crates.
#[cfg(any(feature = "atmega328p", feature = "atmega2560"))]
#[doc(hidden)]
#[macro_export]
macro_rules! __servo_impl {
    (@__fill_defaults
        pin: $pin:tt,
        board: $board:tt,
        min_us: $min_us:expr,
        max_us: $max_us:expr,
        init_us: $init_us:expr,
        fields: [ pin: $pin_value:expr $(, $($rest:tt)* )? ]
    ) => {
        $crate::__servo_impl! {
            @__fill_defaults
            pin: $pin_value,
            board: $board,
            min_us: $min_us,
            max_us: $max_us,
            init_us: $init_us,
            fields: [ $($($rest)*)? ]
        }
    };

    (@__fill_defaults
        pin: $pin:tt,
        board: $board:tt,
        min_us: $min_us:expr,
        max_us: $max_us:expr,
        init_us: $init_us:expr,
        fields: [ board: $board_value:expr $(, $($rest:tt)* )? ]
    ) => {
        $crate::__servo_impl! {
            @__fill_defaults
            pin: $pin,
            board: $board_value,
            min_us: $min_us,
            max_us: $max_us,
            init_us: $init_us,
            fields: [ $($($rest)*)? ]
        }
    };

    (@__fill_defaults
        pin: $pin:tt,
        board: $board:tt,
        min_us: $min_us:expr,
        max_us: $max_us:expr,
        init_us: $init_us:expr,
        fields: [ min_us: $min_us_value:expr $(, $($rest:tt)* )? ]
    ) => {
        $crate::__servo_impl! {
            @__fill_defaults
            pin: $pin,
            board: $board,
            min_us: $min_us_value,
            max_us: $max_us,
            init_us: $init_us,
            fields: [ $($($rest)*)? ]
        }
    };

    (@__fill_defaults
        pin: $pin:tt,
        board: $board:tt,
        min_us: $min_us:expr,
        max_us: $max_us:expr,
        init_us: $init_us:expr,
        fields: [ max_us: $max_us_value:expr $(, $($rest:tt)* )? ]
    ) => {
        $crate::__servo_impl! {
            @__fill_defaults
            pin: $pin,
            board: $board,
            min_us: $min_us,
            max_us: $max_us_value,
            init_us: $init_us,
            fields: [ $($($rest)*)? ]
        }
    };

    (@__fill_defaults
        pin: $pin:tt,
        board: $board:tt,
        min_us: $min_us:expr,
        max_us: $max_us:expr,
        init_us: $init_us:expr,
        fields: [ init_us: $init_us_value:expr $(, $($rest:tt)* )? ]
    ) => {
        $crate::__servo_impl! {
            @__fill_defaults
            pin: $pin,
            board: $board,
            min_us: $min_us,
            max_us: $max_us,
            init_us: $init_us_value,
            fields: [ $($($rest)*)? ]
        }
    };

    (@__fill_defaults
        pin: $pin:tt,
        board: $board:tt,
        min_us: $min_us:expr,
        max_us: $max_us:expr,
        init_us: $init_us:expr,
        fields: [ ]
    ) => {
        $crate::__servo_impl! {
            @__build
            pin: $pin,
            board: $board,
            min_us: $min_us,
            max_us: $max_us,
            init_us: $init_us
        }
    };

    (@__build
        pin: _UNSET_,
        board: $board:tt,
        min_us: $min_us:expr,
        max_us: $max_us:expr,
        init_us: $init_us:expr
    ) => {
        compile_error!("servo! requires `pin: ...`");
    };

    (@__build
        pin: $pin:expr,
        board: _UNSET_,
        min_us: $min_us:expr,
        max_us: $max_us:expr,
        init_us: $init_us:expr
    ) => {
        compile_error!("servo! requires `board: ...`");
    };

    (@__build
        pin: $pin:expr,
        board: $board:expr,
        min_us: $min_us:expr,
        max_us: $max_us:expr,
        init_us: $init_us:expr
    ) => {
        $crate::servo::Servo::new($pin, $board, $min_us, $max_us, $init_us)
    };

    (
        $($fields:tt)*
    ) => {
        $crate::__servo_impl! {
            @__fill_defaults
            pin: _UNSET_,
            board: _UNSET_,
            min_us: $crate::servo::SERVO_MIN_US_DEFAULT,
            max_us: $crate::servo::SERVO_MAX_US_DEFAULT,
            init_us: $crate::servo::SERVO_MIN_US_DEFAULT,
            fields: [ $($fields)* ]
        }
    };
}

/// A fast-PWM configuration approximating the 50 Hz servo frame at the best
/// resolution a clock allows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrameTiming {
    /// Chosen prescaler.
    pub prescaler: Prescaler,
    /// Counter ticks per 20 ms frame.
    pub ticks_per_frame: u16,
}

impl FrameTiming {
    /// Pick a prescaler and tick count for `clock_hz`.
    ///
    /// The ÷8 baseline gives the finest resolution that fits a 16-bit
    /// counter on common clocks. If the frame would overflow 16 bits the
    /// prescaler escalates to ÷64; if it would fall under 20000 ticks
    /// (one tick per microsecond) prescaling is dropped entirely.
    /// Clocks up to 20 MHz stay within the counter range.
    #[must_use]
    pub fn for_clock(clock_hz: u32) -> Self {
        let mut prescaler = Prescaler::Div8;
        let mut ticks = clock_hz / (REFRESH_HZ * Prescaler::Div8.divisor());

        if ticks > u32::from(u16::MAX) {
            prescaler = Prescaler::Div64;
            ticks = clock_hz / (REFRESH_HZ * Prescaler::Div64.divisor());
        } else if ticks < MIN_TICKS_PER_FRAME {
            prescaler = Prescaler::Direct;
            ticks = clock_hz / REFRESH_HZ;
        }

        Self {
            prescaler,
            ticks_per_frame: (ticks & 0xFFFF) as u16,
        }
    }

    /// The TOP value programming this frame.
    #[must_use]
    pub const fn top(self) -> u16 {
        self.ticks_per_frame.saturating_sub(1)
    }

    /// Program `timer` with this frame, unless it already carries exactly
    /// this configuration (mode, prescaler, and TOP all match), in which
    /// case the timer is left running untouched.
    pub fn apply(self, timer: &Timer) {
        if timer.mode() != Mode::FastPwm
            || timer.prescaler() != self.prescaler
            || timer.top() != self.top()
        {
            timer.set_prescaler(self.prescaler);
            timer.set_fast_pwm_mode(self.top());
        }
    }
}

/// A device abstraction for servo-style actuators.
///
/// See the [module documentation](self) for an example. One timer can carry
/// several servos on its distinct compare channels; the frame configuration
/// is shared, and nothing stops a later constructor from re-tuning a shared
/// timer with different parameters — partition peripherals so that does not
/// happen.
pub struct Servo<'a> {
    timer: &'a Timer,
    channel: Channel,
    min_us: u16,
    max_us: u16,
    mid_us: u16,
    us_per_degree: u16,
    us_per_percent: u16,
    ticks_per_us: f32,
    pulse_width_us: u16,
}

impl<'a> Servo<'a> {
    /// Create a servo on a hardware PWM pin.
    ///
    /// The pin selects which timer and compare channel back the servo (a
    /// fixed hardware association) and is driven to output. If
    /// `min_us >= max_us` both bounds are silently replaced with the
    /// defaults. The initial pulse width is stored but not emitted until the
    /// first `set_*` call.
    #[cfg(any(feature = "atmega328p", feature = "atmega2560"))]
    #[must_use]
    pub fn new(pin: ServoPin, board: &'a Board, min_us: u16, max_us: u16, init_us: u16) -> Self {
        let timer = board.timer(pin.timer_id());
        board.configure_pin_output(pin);
        Self::bind(timer, pin.channel(), min_us, max_us, init_us)
    }

    /// Create a servo directly on a timer compare channel.
    ///
    /// [`new`](Self::new) resolves a pin to its timer and channel and then
    /// lands here; call this directly when you already hold the timer
    /// handle. `timer` should be a 16-bit peripheral — an 8-bit counter
    /// cannot hold the 20 ms frame. Configuring the output pin's direction
    /// is the caller's business on this path.
    #[must_use]
    pub fn bind(timer: &'a Timer, channel: Channel, min_us: u16, max_us: u16, init_us: u16) -> Self {
        let (min_us, max_us) = if min_us >= max_us {
            (SERVO_MIN_US_DEFAULT, SERVO_MAX_US_DEFAULT)
        } else {
            (min_us, max_us)
        };

        let span = f32::from(max_us) - f32::from(min_us);
        let mid_us = ((f32::from(min_us) + f32::from(max_us)) / 2.0).round() as u16;
        let us_per_degree = (span / 180.0).round() as u16;
        let us_per_percent = (span / 100.0).round() as u16;

        let timing = FrameTiming::for_clock(clock::CPU_FREQ_HZ);
        timing.apply(timer);
        let ticks_per_us = f32::from(timing.ticks_per_frame) / FRAME_US as f32;

        #[cfg(feature = "defmt")]
        defmt::info!(
            "servo min={}µs mid={}µs max={}µs frame={} ticks",
            min_us,
            mid_us,
            max_us,
            timing.ticks_per_frame
        );

        Self {
            timer,
            channel,
            min_us,
            max_us,
            mid_us,
            us_per_degree,
            us_per_percent,
            ticks_per_us,
            pulse_width_us: init_us,
        }
    }

    /// Command a pulse width in microseconds.
    ///
    /// Values outside `[min, max]` are clamped to the nearest bound. The
    /// result is always accepted; the return value reports that the (possibly
    /// clamped) width was committed.
    pub fn set_pulse_width(&mut self, pulse_width_us: u16) -> bool {
        let pulse_width_us = pulse_width_us.clamp(self.min_us, self.max_us);
        self.pulse_width_us = pulse_width_us;

        let ticks = (self.ticks_per_us * f32::from(pulse_width_us)).round() as u16;

        #[cfg(feature = "defmt")]
        defmt::trace!("servo pulse {}µs -> {} ticks", pulse_width_us, ticks);

        self.timer.set_compare_value(self.channel.into(), ticks, false);
        true
    }

    /// Command an angle in degrees from center, `-90.0..=90.0` spanning
    /// `[min, max]`.
    ///
    /// Out-of-domain angles set the corresponding bound. Because the
    /// per-degree scale is a rounded integer, in-domain angles can compute a
    /// width slightly past a bound; [`set_pulse_width`](Self::set_pulse_width)
    /// clamps it.
    pub fn set_angle(&mut self, degrees: f32) -> bool {
        if degrees < -90.0 {
            self.set_pulse_width(self.min_us)
        } else if degrees > 90.0 {
            self.set_pulse_width(self.max_us)
        } else {
            let offset = degrees * f32::from(self.us_per_degree);
            let pulse_width_us = (f32::from(self.mid_us) + offset).round() as u16;
            self.set_pulse_width(pulse_width_us)
        }
    }

    /// Command a position as a percentage of maximum travel,
    /// `0.0..=100.0` spanning `[min, max]`.
    ///
    /// Out-of-domain positions set the corresponding bound. In-domain
    /// positions compute an absolute width from the per-percent scale (not
    /// an offset from the minimum), then clamp through
    /// [`set_pulse_width`](Self::set_pulse_width).
    pub fn set_position(&mut self, percentage: f32) -> bool {
        if percentage < 0.0 {
            self.set_pulse_width(self.min_us)
        } else if percentage > 100.0 {
            self.set_pulse_width(self.max_us)
        } else {
            let pulse_width_us = (percentage * f32::from(self.us_per_percent)).round() as u16;
            self.set_pulse_width(pulse_width_us)
        }
    }

    /// The minimum pulse width (microseconds).
    #[must_use]
    pub fn min_us(&self) -> u16 {
        self.min_us
    }

    /// The maximum pulse width (microseconds).
    #[must_use]
    pub fn max_us(&self) -> u16 {
        self.max_us
    }

    /// The center pulse width (microseconds), fixed at construction.
    #[must_use]
    pub fn mid_us(&self) -> u16 {
        self.mid_us
    }

    /// The last commanded pulse width (microseconds), after clamping.
    #[must_use]
    pub fn pulse_width_us(&self) -> u16 {
        self.pulse_width_us
    }
}
