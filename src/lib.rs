//! unwindprotect - carry host interpreter errors through native frames
//!
//! A host interpreter that signals errors with a non-local transfer calls
//! into native code, which calls back into the host. This crate makes sure
//! the native resources on that stack are dropped before the host error is
//! allowed to continue, and that unrelated native failures surface as host
//! errors instead of taking the process down.

pub mod bridge;
pub mod config;
pub mod errors;
pub mod host;
pub mod logging;
pub mod native;

pub use bridge::{run_protected, ContinuationToken, Coordinator, TokenId, UnwindSignal};
pub use config::{BridgeConfig, Config, HostConfig};
pub use errors::{ConfigError, HostError, NativeFault, RoutineError};
pub use host::{Expr, Host, Interpreter, Value};
pub use logging::{init_dev_logging, init_logging, LogConfig, LogFormat, LogOutput};

/// Interpreter built from `config` with the demo package loaded.
pub fn interpreter_with_package(config: &Config) -> Result<Interpreter, RoutineError> {
    let mut interp = Interpreter::new(config);
    native::load(&mut interp)?;
    Ok(interp)
}
