//! Crate-wide error and result types.

use derive_more::{Display, Error};

/// Result type used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors surfaced by the crate.
///
/// The pulse path itself never fails: out-of-range requests are clamped and
/// requests for hardware a peripheral lacks are ignored. Errors exist only at
/// the resource-ownership boundary.
#[derive(Debug, Display, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum Error {
    /// [`Board::take`](crate::board::Board::take) was called more than once.
    #[display("hardware timers already taken")]
    TimersAlreadyTaken,
}
