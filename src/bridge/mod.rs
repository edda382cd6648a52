//! Unwind bridge - carry host errors through native frames
//!
//! Design: the host signals errors with a non-local transfer that would skip
//! native destructors. The bridge converts that transfer into a native unwind
//! at the earliest point, lets it drop every scoped resource, then hands the
//! transfer back to the host from the frame that owns the continuation token.
//!
//! Architecture:
//! - `token.rs` - Continuation tokens (one per protected call)
//! - `invoker.rs` - Guarded invoker, the body run under host protection
//! - `signal.rs` - Unwind payloads and their classification
//! - `state.rs` - Per-call state machine
//! - `coordinator.rs` - Translator callback and the protected entry point

mod token;
mod invoker;
mod signal;
mod state;
mod coordinator;

pub use token::{create_token, ContinuationToken, TokenId};
pub use invoker::invoke;
pub use signal::{classify, fault_from_payload, Caught, UnwindSignal};
pub use state::{CallState, ProtectedCall};
pub use coordinator::{on_unwind_signal, run_protected, Coordinator};

#[cfg(test)]
mod tests;
