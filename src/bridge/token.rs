//! Continuation tokens - one per protected call

use std::fmt;
use std::marker::PhantomData;

use tracing::trace;

use crate::host::Host;

/// Identity of a continuation token, comparable after the token itself has
/// been moved into the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenId(u64);

impl TokenId {
    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cont#{}", self.0)
    }
}

/// Opaque handle naming one protected region to the host's unwind machinery.
///
/// Not `Clone`: resuming a transfer consumes the token, so it can be re-issued
/// at most once. Not `Send`: it belongs to the thread running the host.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a continuation token must be resumed or dropped by its protected call"]
pub struct ContinuationToken {
    id: TokenId,
    _thread_bound: PhantomData<*const ()>,
}

impl ContinuationToken {
    /// Wrap a host-issued identifier. Only host implementations call this.
    pub fn from_raw(raw: u64) -> Self {
        Self {
            id: TokenId(raw),
            _thread_bound: PhantomData,
        }
    }

    #[inline]
    pub fn id(&self) -> TokenId {
        self.id
    }
}

/// Ask the host for a fresh token bound to the current protected call.
pub fn create_token<H: Host + ?Sized>(host: &H) -> ContinuationToken {
    let token = host.make_unwind_cont();
    trace!(event = "token_created", token = %token.id(), "continuation token created");
    token
}
