//! System clock parameters.

/// CPU clock frequency in Hz.
///
/// Both supported boards ship with a 16 MHz crystal. The servo auto-tune
/// accepts clocks up to 20 MHz; see
/// [`FrameTiming::for_clock`](crate::servo::FrameTiming::for_clock).
pub const CPU_FREQ_HZ: u32 = 16_000_000;
