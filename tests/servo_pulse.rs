#![allow(missing_docs)]
//! Unit-conversion and auto-tune tests for the servo layer.
//!
//! The crate's clock constant is 16 MHz, so the expected frame is the ÷8
//! prescaler with 40000 ticks per 20 ms: 2.0 ticks per microsecond.

mod common;

use common::timer16;
use servo_envoy::servo::{SERVO_MAX_US_DEFAULT, SERVO_MIN_US_DEFAULT, Servo};
use servo_envoy::timer::{Channel, Mode, Prescaler};

#[test]
fn construction_tunes_the_timer_to_a_50hz_frame() {
    let (timer, regs) = timer16();
    let _servo = Servo::bind(&timer, Channel::A, 1_000, 2_000, 1_000);

    assert_eq!(timer.mode(), Mode::FastPwm);
    assert_eq!(timer.prescaler(), Prescaler::Div8);
    assert_eq!(timer.top(), 39_999);
    assert_eq!(regs.capture(), 39_999);
}

#[test]
fn construction_does_not_emit_the_initial_pulse() {
    let (timer, regs) = timer16();
    let servo = Servo::bind(&timer, Channel::A, 1_000, 2_000, 1_500);

    assert_eq!(servo.pulse_width_us(), 1_500);
    assert_eq!(regs.compare_a(), 0, "no compare write until a set_* call");
}

#[test]
fn inverted_bounds_fall_back_to_defaults() {
    let (timer, _regs) = timer16();
    let servo = Servo::bind(&timer, Channel::A, 2_000, 1_000, 1_000);

    assert_eq!(servo.min_us(), SERVO_MIN_US_DEFAULT);
    assert_eq!(servo.max_us(), SERVO_MAX_US_DEFAULT);
}

#[test]
fn equal_bounds_fall_back_to_defaults() {
    let (timer, _regs) = timer16();
    let servo = Servo::bind(&timer, Channel::A, 1_500, 1_500, 1_500);

    assert_eq!(servo.min_us(), SERVO_MIN_US_DEFAULT);
    assert_eq!(servo.max_us(), SERVO_MAX_US_DEFAULT);
    assert_eq!(servo.mid_us(), 1_500);
}

#[test]
fn pulse_width_maps_microseconds_to_ticks() {
    let (timer, regs) = timer16();
    let mut servo = Servo::bind(&timer, Channel::A, 1_000, 2_000, 1_000);

    assert!(servo.set_pulse_width(1_500));
    assert_eq!(servo.pulse_width_us(), 1_500);
    assert_eq!(regs.compare_a(), 3_000);
}

#[test]
fn pulse_width_writes_the_bound_channel_only() {
    let (timer, regs) = timer16();
    let mut servo = Servo::bind(&timer, Channel::B, 1_000, 2_000, 1_000);

    servo.set_pulse_width(1_200);

    assert_eq!(regs.compare_b(), 2_400);
    assert_eq!(regs.compare_a(), 0);
}

#[test]
fn pulse_width_clamps_to_the_bounds() {
    let (timer, regs) = timer16();
    let mut servo = Servo::bind(&timer, Channel::A, 1_000, 2_000, 1_000);

    assert!(servo.set_pulse_width(500));
    assert_eq!(servo.pulse_width_us(), 1_000);
    assert_eq!(regs.compare_a(), 2_000);

    assert!(servo.set_pulse_width(2_500));
    assert_eq!(servo.pulse_width_us(), 2_000);
    assert_eq!(regs.compare_a(), 4_000);
}

#[test]
fn repeated_pulse_width_produces_the_identical_write() {
    let (timer, regs) = timer16();
    let mut servo = Servo::bind(&timer, Channel::A, 1_000, 2_000, 1_000);

    assert!(servo.set_pulse_width(1_750));
    let compare = regs.compare_a();
    let control_a = regs.control_a.get();

    assert!(servo.set_pulse_width(1_750));
    assert_eq!(regs.compare_a(), compare);
    assert_eq!(regs.control_a.get(), control_a);
}

#[test]
fn angle_endpoints_reach_the_bounds() {
    let (timer, regs) = timer16();
    let mut servo = Servo::bind(&timer, Channel::A, 1_000, 2_000, 1_000);

    // -90° computes 1500 - 540 = 960 µs; the downstream clamp lifts it to min.
    assert!(servo.set_angle(-90.0));
    assert_eq!(servo.pulse_width_us(), 1_000);
    assert_eq!(regs.compare_a(), 2_000);

    assert!(servo.set_angle(90.0));
    assert_eq!(servo.pulse_width_us(), 2_000);

    assert!(servo.set_angle(0.0));
    assert_eq!(servo.pulse_width_us(), 1_500);
}

#[test]
fn angle_follows_the_worked_example() {
    let (timer, regs) = timer16();
    let mut servo = Servo::bind(&timer, Channel::A, 1_000, 2_000, 1_000);

    // 6 µs per degree: 1500 + 45 × 6 = 1770 µs -> 3540 ticks.
    assert!(servo.set_angle(45.0));
    assert_eq!(servo.pulse_width_us(), 1_770);
    assert_eq!(regs.compare_a(), 3_540);
}

#[test]
fn out_of_domain_angles_pin_to_the_bounds() {
    let (timer, _regs) = timer16();
    let mut servo = Servo::bind(&timer, Channel::A, 1_000, 2_000, 1_000);

    assert!(servo.set_angle(-120.0));
    assert_eq!(servo.pulse_width_us(), 1_000);

    assert!(servo.set_angle(120.0));
    assert_eq!(servo.pulse_width_us(), 2_000);
}

#[test]
fn position_endpoints_reach_the_bounds_from_a_zero_minimum() {
    let (timer, regs) = timer16();
    let mut servo = Servo::bind(&timer, Channel::A, 0, 1_800, 0);

    assert!(servo.set_position(0.0));
    assert_eq!(servo.pulse_width_us(), 0);

    // 18 µs per percent: 100 % is exactly the maximum.
    assert!(servo.set_position(100.0));
    assert_eq!(servo.pulse_width_us(), 1_800);
    assert_eq!(regs.compare_a(), 3_600);
}

#[test]
fn out_of_domain_positions_pin_to_the_bounds() {
    let (timer, _regs) = timer16();
    let mut servo = Servo::bind(&timer, Channel::A, 1_000, 2_000, 1_000);

    assert!(servo.set_position(-5.0));
    assert_eq!(servo.pulse_width_us(), 1_000);

    assert!(servo.set_position(105.0));
    assert_eq!(servo.pulse_width_us(), 2_000);
}

#[test]
fn position_is_an_absolute_width_not_an_offset_from_min() {
    let (timer, _regs) = timer16();
    let mut servo = Servo::bind(&timer, Channel::A, 1_000, 2_000, 1_000);

    // 10 µs per percent: 50 % computes 500 µs outright, which the clamp
    // then lifts to the minimum. The scale is anchored at zero, not at min.
    assert!(servo.set_position(50.0));
    assert_eq!(servo.pulse_width_us(), 1_000);

    assert!(servo.set_position(100.0));
    assert_eq!(servo.pulse_width_us(), 1_000);
}

#[test]
fn a_second_servo_on_the_same_timer_skips_reconfiguration() {
    let (timer, regs) = timer16();
    let _first = Servo::bind(&timer, Channel::A, 1_000, 2_000, 1_000);

    // Sentinel survives only if the second construction leaves the timer
    // alone (a mode-set would reset the counter).
    regs.counter_l.set(42);
    let control_b = regs.control_b.get();

    let _second = Servo::bind(&timer, Channel::B, 1_000, 2_000, 1_000);

    assert_eq!(regs.counter_l.get(), 42);
    assert_eq!(regs.control_b.get(), control_b);
}

#[test]
fn different_bounds_still_share_the_timer_frame() {
    let (timer, regs) = timer16();
    let _first = Servo::bind(&timer, Channel::A, 1_000, 2_000, 1_000);
    regs.counter_l.set(7);

    // Pulse bounds do not affect the frame, so no retune happens.
    let _second = Servo::bind(&timer, Channel::B, 600, 2_400, 600);
    assert_eq!(regs.counter_l.get(), 7);
}
