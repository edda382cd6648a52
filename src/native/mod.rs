//! Demo native package
//!
//! A traced object plus three `.Call` routines that apply a host function
//! with the object alive: protected, unprotected, and with a failing
//! constructor.

mod object;
mod routines;

pub use object::TracedObject;
pub use routines::ROUTINES;

use crate::errors::RoutineError;
use crate::host::{Interpreter, Registry};

pub const PACKAGE_NAME: &str = "unwindprotect";

/// Package init hook: registers the routine table.
pub fn init_unwindprotect(registry: &mut Registry) -> Result<(), RoutineError> {
    registry.register_routines(&ROUTINES)
}

/// Load the package into `host`.
pub fn load(host: &mut Interpreter) -> Result<(), RoutineError> {
    host.load_package(PACKAGE_NAME, init_unwindprotect)
}
