//! Unwind payloads and their classification at the coordinator frame

use std::any::Any;

use super::token::TokenId;
use crate::errors::NativeFault;
use crate::host::Host;

/// Native unwind payload meaning "a host transfer is pending; unwind the
/// native frames, then re-issue it". Carries no error data, only the token
/// of the protected region whose callback raised it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnwindSignal {
    token: TokenId,
}

impl UnwindSignal {
    pub(crate) fn new(token: TokenId) -> Self {
        Self { token }
    }

    pub fn token(&self) -> TokenId {
        self.token
    }
}

/// What a coordinator caught when its try-region was left by unwinding.
#[derive(Debug)]
pub enum Caught {
    /// The host's own error, relayed through native frames for this token.
    HostUnwind(UnwindSignal),
    /// A native failure unrelated to the host.
    NativeFault(NativeFault),
    /// Not ours to interpret: a signal for another token, or a transfer the
    /// host emulates by unwinding. Re-thrown unchanged.
    Foreign(Box<dyn Any + Send>),
}

/// Sort an unwind payload caught by the coordinator owning `token`.
pub fn classify<H: Host + ?Sized>(
    host: &H,
    token: TokenId,
    payload: Box<dyn Any + Send>,
) -> Caught {
    if let Some(signal) = payload.downcast_ref::<UnwindSignal>() {
        return if signal.token() == token {
            Caught::HostUnwind(*signal)
        } else {
            Caught::Foreign(payload)
        };
    }

    if host.owns_transfer(payload.as_ref()) {
        return Caught::Foreign(payload);
    }

    Caught::NativeFault(fault_from_payload(payload))
}

/// Recover a description from a panic payload.
pub fn fault_from_payload(payload: Box<dyn Any + Send>) -> NativeFault {
    match payload.downcast::<NativeFault>() {
        Ok(fault) => *fault,
        Err(payload) => {
            if let Some(message) = payload.downcast_ref::<&str>() {
                NativeFault::new(*message)
            } else if let Some(message) = payload.downcast_ref::<String>() {
                NativeFault::new(message.as_str())
            } else {
                NativeFault::new("native panic payload could not be unpacked")
            }
        }
    }
}
