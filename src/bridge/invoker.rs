//! Guarded invoker - the body handed to the host's unwind-protection primitive

use tracing::trace;

use crate::host::Host;

/// Apply a zero-argument host callable and hand back its value.
///
/// Deliberately no error handling: a host error raised by `callable` leaves
/// through this frame untouched and is caught by the primitive.
pub fn invoke<H: Host + ?Sized>(host: &H, callable: &H::Value, announce: bool) -> H::Value {
    if announce {
        host.print("Will call supplied function");
    }
    trace!(event = "invoke", "applying host callable");

    let result = host.apply(callable);

    if announce {
        host.print("Done with call to supplied function");
    }
    result
}
