//! `.Call` entry points of the demo package
//!
//! Reached through the registry, which checks that exactly one argument is
//! passed before any of these run.

use std::convert::Infallible;

use super::object::TracedObject;
use crate::bridge::{invoke, Coordinator};
use crate::host::{Interpreter, Routine, Value};

/// Apply `f` with a traced object alive, under unwind protection.
pub(crate) fn call_fn_with_unwind_protect(host: &Interpreter, args: &[Value]) -> Value {
    let coordinator = Coordinator::with_config(host, host.bridge_config().clone());
    coordinator.run_protected(|| Ok::<_, Infallible>(TracedObject::new(host)), &args[0])
}

/// Apply `f` with a traced object alive and nothing in between: a host error
/// jumps over the object's destructor.
pub(crate) fn call_fn_without_unwind_protect(host: &Interpreter, args: &[Value]) -> Value {
    let _object = TracedObject::new(host);
    invoke(host, &args[0], host.bridge_config().announce_calls)
}

/// Like `call_fn_with_unwind_protect`, but the object's constructor fails.
pub(crate) fn call_fn_with_failing_object(host: &Interpreter, args: &[Value]) -> Value {
    let coordinator = Coordinator::with_config(host, host.bridge_config().clone());
    coordinator.run_protected(|| TracedObject::failing(host), &args[0])
}

pub const ROUTINES: [Routine; 3] = [
    Routine::new("call_fn_with_unwind_protect", call_fn_with_unwind_protect, 1),
    Routine::new("call_fn_without_unwind_protect", call_fn_without_unwind_protect, 1),
    Routine::new("call_fn_with_failing_object", call_fn_with_failing_object, 1),
];
