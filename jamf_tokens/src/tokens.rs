use jamf_clock::{Clock, DurationSecs, System, UnixTime};

use crate::{
    policy::{self, TokenStatus},
    AccessToken, AccessTokenRef,
};

/// A token as returned by the authority along with its validity window
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IssuedToken {
    access_token: AccessToken,
    issued: UnixTime,
    expiry: UnixTime,
}

impl IssuedToken {
    /// Constructs a token that was obtained at `issued` and is valid until `expiry`
    pub fn new(access_token: AccessToken, issued: UnixTime, expiry: UnixTime) -> Self {
        Self {
            access_token,
            issued,
            expiry,
        }
    }

    /// Gets the access token
    #[inline]
    pub fn access_token(&self) -> &AccessTokenRef {
        &self.access_token
    }

    /// Gets the time that the token was obtained
    #[inline]
    pub fn issued(&self) -> UnixTime {
        self.issued
    }

    /// Gets the time that the token will expire
    #[inline]
    pub fn expiry(&self) -> UnixTime {
        self.expiry
    }

    /// Gets the token's lifetime as issued
    #[inline]
    pub fn lifetime(&self) -> DurationSecs {
        self.expiry - self.issued
    }

    /// Gets the token's lifetime status as of the provided time
    #[inline]
    pub fn token_status_at(&self, time: UnixTime, buffer: DurationSecs) -> TokenStatus {
        policy::token_status(time, self.expiry, buffer)
    }

    /// Gets a duration for how much longer the token would be valid as of the
    /// provided time
    #[inline]
    pub fn until_expired_at(&self, time: UnixTime) -> DurationSecs {
        self.expiry - time
    }
}

/// Configuration for determining when a token is due for renewal
#[derive(Clone, Debug)]
pub struct TokenLifetimeConfig<C = System> {
    buffer: DurationSecs,
    clock: C,
}

impl TokenLifetimeConfig {
    /// The buffer used when none is configured
    pub const DEFAULT_BUFFER: DurationSecs = DurationSecs::from_mins(2);

    /// Constructs a new lifetime configuration
    ///
    /// A token using this configuration will be extended or renewed once it has
    /// less than `buffer` of its lifetime remaining. The buffer must be shorter
    /// than the lifetime of the tokens the authority issues.
    pub fn new(buffer: DurationSecs) -> Self {
        Self {
            buffer,
            clock: System,
        }
    }
}

impl Default for TokenLifetimeConfig {
    /// Default lifetime configuration
    ///
    /// Uses a buffer of two minutes and the system clock.
    fn default() -> Self {
        Self::new(Self::DEFAULT_BUFFER)
    }
}

impl<C> TokenLifetimeConfig<C> {
    /// Sets a custom clock to be used
    ///
    /// Useful for testing purposes
    pub fn with_clock<D>(self, clock: D) -> TokenLifetimeConfig<D> {
        TokenLifetimeConfig {
            buffer: self.buffer,
            clock,
        }
    }

    /// The minimum remaining validity before a token is renewed
    #[inline]
    pub fn buffer(&self) -> DurationSecs {
        self.buffer
    }

    /// The clock used to judge token validity
    #[inline]
    pub fn clock(&self) -> &C {
        &self.clock
    }
}

impl<C: Clock> TokenLifetimeConfig<C> {
    /// Gets the lifetime status of `token` according to the configured clock
    pub fn token_status(&self, token: &IssuedToken) -> TokenStatus {
        token.token_status_at(self.clock.now(), self.buffer)
    }
}
