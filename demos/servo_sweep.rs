//! Sweep a servo on OC1A (Arduino Mega pin 11) back and forth.

#![no_std]
#![no_main]

use panic_halt as _;
use servo_envoy::board::{Board, ServoPin};
use servo_envoy::servo;

#[avr_device::entry]
fn main() -> ! {
    // The single take at reset cannot fail.
    let Ok(board) = Board::take() else {
        loop {}
    };

    let mut servo = servo! {
        pin: ServoPin::Oc1a,
        board: &board,
    };

    loop {
        for degrees in [-90, -45, 0, 45, 90, 45, 0, -45] {
            servo.set_angle(degrees as f32);
            delay_frames(25); // ~half a second
        }
    }
}

/// Busy-wait for roughly `frames` 20 ms servo frames at 16 MHz.
fn delay_frames(frames: u32) {
    for _ in 0..frames {
        for _ in 0..40_000u32 {
            core::hint::spin_loop();
        }
    }
}
