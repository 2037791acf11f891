//! Credential storage

use crate::IssuedToken;

/// The mutable state behind a [`TokenGuard`][crate::TokenGuard]
///
/// Holds the current token, if any, and whether the credential has been
/// invalidated. Once closed, the store never holds a token again.
#[derive(Debug, Default)]
pub struct CredentialStore {
    current: Option<IssuedToken>,
    closed: bool,
}

impl CredentialStore {
    /// Constructs a new, empty store
    pub const fn new() -> Self {
        Self {
            current: None,
            closed: false,
        }
    }

    /// The current token, if one has been acquired
    #[inline]
    pub fn current(&self) -> Option<&IssuedToken> {
        self.current.as_ref()
    }

    /// Whether the credential has been invalidated
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Replaces the current token
    ///
    /// Ignored once the store is closed.
    pub fn replace(&mut self, token: IssuedToken) {
        if !self.closed {
            self.current = Some(token);
        }
    }

    /// Drops the current token so that the next use starts from scratch
    pub fn clear(&mut self) -> Option<IssuedToken> {
        self.current.take()
    }

    /// Marks the store terminal, handing back the last token for revocation
    pub fn close(&mut self) -> Option<IssuedToken> {
        self.closed = true;
        self.current.take()
    }
}
