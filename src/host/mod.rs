//! Host execution environment
//!
//! The bridge never reaches for ambient interpreter state; everything it needs
//! from the host goes through the [`Host`] trait. [`Interpreter`] is a small
//! host that emulates longjmp-style error signaling and is used by the demo
//! package, the CLI and the tests.
//!
//! Architecture:
//! - `value.rs` - Host values and expressions
//! - `registry.rs` - Native routine table (`.Call` targets)
//! - `interp.rs` - The interpreter and its `Host` implementation

mod value;
mod registry;
mod interp;

pub use value::{Expr, Function, Value};
pub use registry::{Registry, Routine, RoutineFn};
pub use interp::{HostStats, Interpreter};

use std::any::Any;

use crate::bridge::ContinuationToken;

/// Primitives the host exposes to native code.
pub trait Host {
    type Value;

    /// Fresh continuation token for one protected region.
    fn make_unwind_cont(&self) -> ContinuationToken;

    /// Run `body`. If a host error begins inside it, record the transfer
    /// against `cont`, call `cleanup(true)` and, should that return, carry on
    /// with the transfer. On normal completion call `cleanup(false)` and
    /// return the body's value.
    fn unwind_protect(
        &self,
        body: &mut dyn FnMut() -> Self::Value,
        cleanup: &mut dyn FnMut(bool),
        cont: &ContinuationToken,
    ) -> Self::Value;

    /// Resume the transfer recorded against `cont`. Never returns.
    fn continue_unwind(&self, cont: ContinuationToken) -> !;

    /// Raise a new host error with `message`. Never returns.
    fn error(&self, message: &str) -> !;

    /// Call a host function with no arguments.
    fn apply(&self, callable: &Self::Value) -> Self::Value;

    /// Write a line to the host console.
    fn print(&self, text: &str);

    /// Note entry into a protected native call. Returns how many are active
    /// on this host now, this one included.
    fn enter_protected(&self) -> usize;

    /// Balance one earlier [`Host::enter_protected`].
    fn leave_protected(&self);

    /// Whether an unwind payload is one of the host's own transfers. Hosts
    /// that emulate their transfers by unwinding answer `true` for them so
    /// native code lets them pass untouched.
    fn owns_transfer(&self, _payload: &(dyn Any + Send)) -> bool {
        false
    }
}
