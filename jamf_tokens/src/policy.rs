//! Expiry policy
//!
//! Pure predicates deciding whether a token may still be handed out. The
//! current time is always passed in so that one decision is made against a
//! single, consistent snapshot of the clock.

use jamf_clock::{DurationSecs, UnixTime};

/// A token's lifecycle status
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenStatus {
    /// The token is valid and outside of its buffer window
    Fresh,
    /// The token is valid, but has entered its buffer window and should be
    /// extended or renewed before use
    Stale,
    /// The token is no longer valid
    Expired,
}

/// Whether a token expiring at `expiry` has expired as of `now`
///
/// A token is considered expired at the exact instant of its expiry.
#[inline]
pub fn is_expired(now: UnixTime, expiry: UnixTime) -> bool {
    now >= expiry
}

/// Whether a token expiring at `expiry` has less than `buffer` left as of `now`
///
/// Being in the buffer window does not imply being expired, but an expired
/// token is always in its buffer window unless the buffer is zero.
#[inline]
pub fn is_in_buffer(now: UnixTime, expiry: UnixTime, buffer: DurationSecs) -> bool {
    expiry - now < buffer
}

/// Classifies a token expiring at `expiry` as of `now`
#[inline]
pub fn token_status(now: UnixTime, expiry: UnixTime, buffer: DurationSecs) -> TokenStatus {
    if is_expired(now, expiry) {
        TokenStatus::Expired
    } else if is_in_buffer(now, expiry, buffer) {
        TokenStatus::Stale
    } else {
        TokenStatus::Fresh
    }
}
