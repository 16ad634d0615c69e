//! Chain-wide constants shared across the explorer.

/// Unlock points below this value are block heights; at or above it they
/// are Unix timestamps (network rule).
pub const LOCK_TIME_MIN_TIMESTAMP: u64 = 500_000_000;

/// Divisor grouping time-locked outputs into maturation buckets.
///
/// Dropping the last five decimal digits of a Unix timestamp keeps the
/// number of buckets a promotion pass has to walk small.
pub const LOCK_TIME_BUCKET: u64 = 100_000;

/// Miner payouts can only be spent after this number of new blocks.
pub const MATURITY_DELAY: u64 = 720;

pub const fn time_bucket(timestamp: u64) -> u64 {
    timestamp / LOCK_TIME_BUCKET
}
