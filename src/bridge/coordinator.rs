//! Protection coordinator - entry point for protected calls from the host

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use tracing::{debug, debug_span, warn};

use super::invoker::invoke;
use super::signal::{classify, Caught, UnwindSignal};
use super::state::{CallState, ProtectedCall};
use super::token::{create_token, TokenId};
use crate::config::BridgeConfig;
use crate::errors::NativeFault;
use crate::host::Host;

/// Translator callback handed to the host's unwind-protection primitive.
///
/// The host calls it with `jump == true` right before continuing its own
/// transfer; raising here starts native unwinding at the earliest point.
pub fn on_unwind_signal(token: TokenId, jump: bool) {
    if jump {
        debug!(event = "unwind_signal", token = %token, "converting host error to native unwind");
        panic::resume_unwind(Box::new(UnwindSignal::new(token)));
    }
}

/// Runs host callables so that every scoped native resource is dropped before
/// a host error is allowed to continue past the native frames.
pub struct Coordinator<'h, H: Host + ?Sized> {
    host: &'h H,
    config: BridgeConfig,
}

impl<'h, H: Host + ?Sized> Coordinator<'h, H> {
    pub fn new(host: &'h H) -> Self {
        Self::with_config(host, BridgeConfig::default())
    }

    pub fn with_config(host: &'h H, config: BridgeConfig) -> Self {
        Self { host, config }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Acquire the scoped resources from `acquire`, then apply `callable`
    /// under the host's unwind protection.
    ///
    /// Returns the callable's value on success. On a host error the resources
    /// are dropped and the host's transfer is resumed; on a native fault
    /// (failed or panicking `acquire`, panicking native code) the resources
    /// are dropped and a new host error describing the fault is raised.
    /// Neither of those paths returns.
    pub fn run_protected<S, E, A>(&self, acquire: A, callable: &H::Value) -> H::Value
    where
        A: FnOnce() -> Result<S, E>,
        E: fmt::Display,
    {
        let host = self.host;
        let announce = self.config.announce_calls;

        // Released on every way out, including unwinding.
        let depth = NestingGuard::enter(host);
        if depth.level > self.config.max_nesting {
            warn!(
                event = "nesting_limit",
                depth = depth.level,
                limit = self.config.max_nesting,
                "refusing to nest protected call"
            );
            host.error(&format!(
                "protected native calls nested too deeply (limit {})",
                self.config.max_nesting
            ))
        }

        let token = create_token(host);
        let id = token.id();
        let span = debug_span!("run_protected", token = %id);
        let _entered = span.enter();

        let mut call = ProtectedCall::new(id);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| -> Result<H::Value, NativeFault> {
            // Lives until the end of the try-region, so unwinding drops it.
            let _scope = acquire().map_err(|e| NativeFault::new(e.to_string()))?;
            call.advance(CallState::RunningUserCode);

            let mut body = || invoke(host, callable, announce);
            let mut translator = |jump: bool| {
                if jump && announce {
                    host.print("Converting host error to native unwind");
                }
                on_unwind_signal(id, jump)
            };
            Ok(host.unwind_protect(&mut body, &mut translator, &token))
        }));

        match outcome {
            Ok(Ok(value)) => {
                call.advance(CallState::CompletedOk);
                value
            }
            Ok(Err(fault)) => self.report(&mut call, fault),
            Err(payload) => match classify(host, id, payload) {
                Caught::HostUnwind(_) => {
                    call.advance(CallState::UnwindSignaled);
                    call.advance(CallState::Reissued);
                    debug!(event = "reissue", token = %id, "resuming host unwind");
                    host.continue_unwind(token)
                }
                Caught::NativeFault(fault) => self.report(&mut call, fault),
                Caught::Foreign(payload) => {
                    debug!(token = %id, "passing foreign unwind through");
                    panic::resume_unwind(payload)
                }
            },
        }
    }

    fn report(&self, call: &mut ProtectedCall, fault: NativeFault) -> ! {
        call.advance(CallState::NativeFault);
        let message = fault.report(&self.config.fault_prefix);
        warn!(event = "native_fault", fault = %fault, "reporting native fault to host");
        call.advance(CallState::ReportedToHost);
        self.host.error(&message)
    }
}

/// Counts one active protected call on the host for as long as it lives.
struct NestingGuard<'h, H: Host + ?Sized> {
    host: &'h H,
    level: usize,
}

impl<'h, H: Host + ?Sized> NestingGuard<'h, H> {
    fn enter(host: &'h H) -> Self {
        let level = host.enter_protected();
        Self { host, level }
    }
}

impl<H: Host + ?Sized> Drop for NestingGuard<'_, H> {
    fn drop(&mut self) {
        self.host.leave_protected();
    }
}

/// Shorthand for [`Coordinator::run_protected`] with default settings.
pub fn run_protected<H, S, E, A>(host: &H, acquire: A, callable: &H::Value) -> H::Value
where
    H: Host + ?Sized,
    A: FnOnce() -> Result<S, E>,
    E: fmt::Display,
{
    Coordinator::new(host).run_protected(acquire, callable)
}
