//! Hardware-timer PWM and servo control for AVR microcontrollers.
//!
//! The crate drives the timer/counter peripherals of megaAVR devices in
//! fast-PWM mode and maps servo commands (pulse width in microseconds, angle
//! in degrees, position in percent) onto output-compare register values.
//!
//! # Glossary
//!
//! - **Fast PWM:** a counter mode that counts 0..=TOP, repeating, while each
//!   compare channel toggles its pin on compare match. The basis for
//!   generating periodic pulses.
//! - **Prescaler / clock select:** a divisor (1, 8, 64, 256, 1024) applied to
//!   the system clock before it drives the counter, trading resolution for
//!   range.
//! - **TOP:** the counter value at which a fast-PWM cycle restarts; fixes the
//!   PWM period.
//! - **Output-compare channel:** one of up to three comparator units per
//!   timer (A/B/C), each able to drive a distinct pin.
//! - **Pulse width:** how long a servo control pulse stays high within each
//!   ~20 ms frame, encoding the commanded position.
//!
//! # Boards
//!
//! Select the target device with exactly one of the `atmega328p` /
//! `atmega2560` features; add the `avr` feature when building for the chip
//! itself. Without a board feature only the hardware-independent core
//! ([`timer`], [`servo::Servo::bind`]) is available, which is how the host
//! test suite runs.

#![no_std]

// Compile-time check: at most one board may be selected.
#[cfg(all(feature = "atmega328p", feature = "atmega2560"))]
compile_error!("Cannot enable both 'atmega328p' and 'atmega2560' features simultaneously");

#[cfg(any(feature = "atmega328p", feature = "atmega2560"))]
pub mod board;
pub mod clock;
mod error;
pub mod registers;
pub mod servo;
pub mod timer;

// Re-export error types and result (used throughout)
pub use crate::error::{Error, Result};
