//! A small interpreter that signals errors with a non-local transfer
//!
//! Host errors travel as a private unwind payload (`HostJump`) straight to
//! the nearest host context: a top-level evaluation, a `tryCatch`, or an
//! unwind-protection primitive. Native frames crossed by a raw transfer are
//! treated as skipped: objects dropped while one is in flight count as
//! bypassed destructors, which is what a real longjmp would do to them.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

use serde::Serialize;
use tracing::{debug, error, trace};

use super::registry::Registry;
use super::value::{Expr, Value};
use super::Host;
use crate::bridge::{ContinuationToken, TokenId};
use crate::config::{BridgeConfig, Config, HostConfig};
use crate::errors::{HostError, RoutineError};

/// Payload of a host transfer in flight.
struct HostJump(HostError);

#[derive(Debug, Default)]
struct TransferState {
    in_flight: bool,
    pending: HashMap<TokenId, HostError>,
}

/// Counters exposed for tests and the demo CLI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HostStats {
    pub errors_raised: usize,
    pub tokens_issued: usize,
    pub transfers_intercepted: usize,
    pub reissues: usize,
    pub bypassed_destructors: usize,
}

pub struct Interpreter {
    registry: Registry,
    host_config: HostConfig,
    bridge_config: BridgeConfig,
    console: RefCell<Vec<String>>,
    /// Names of the host functions being applied, innermost last.
    calls: RefCell<Vec<Option<String>>>,
    transfer: RefCell<TransferState>,
    next_token: Cell<u64>,
    next_object: Cell<u64>,
    /// Protected native calls currently on the stack.
    protected_depth: Cell<usize>,
    stats: Cell<HostStats>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}

impl Interpreter {
    pub fn new(config: &Config) -> Self {
        Self {
            registry: Registry::new(),
            host_config: config.host.clone(),
            bridge_config: config.bridge.clone(),
            console: RefCell::new(Vec::new()),
            calls: RefCell::new(Vec::new()),
            transfer: RefCell::new(TransferState::default()),
            next_token: Cell::new(1),
            next_object: Cell::new(1),
            protected_depth: Cell::new(0),
            stats: Cell::new(HostStats::default()),
        }
    }

    /// Run a package's init hook once; later loads of the same name are no-ops.
    pub fn load_package(
        &mut self,
        name: &str,
        init: fn(&mut Registry) -> Result<(), RoutineError>,
    ) -> Result<(), RoutineError> {
        if self.registry.is_loaded(name) {
            debug!(package = name, "package already loaded");
            return Ok(());
        }
        init(&mut self.registry)?;
        self.registry.mark_loaded(name);
        debug!(event = "package_loaded", package = name, routines = self.registry.len());
        Ok(())
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn bridge_config(&self) -> &BridgeConfig {
        &self.bridge_config
    }

    /// Evaluate in a top-level context: host errors end up in `Err`.
    pub fn eval_toplevel(&self, expr: &Expr) -> Result<Value, HostError> {
        let _span = tracing::debug_span!("eval_toplevel").entered();
        self.catch_transfer(|| self.eval(expr))
    }

    /// Run native code in a fresh top-level context.
    pub fn toplevel_exec(&self, f: impl FnOnce() -> Value) -> Result<Value, HostError> {
        self.catch_transfer(f)
    }

    /// Evaluate in the current context. A host error leaves this call as a
    /// transfer to the nearest enclosing host context.
    pub fn eval(&self, expr: &Expr) -> Value {
        match expr {
            Expr::Lit(value) => value.clone(),
            Expr::Stop(message) => self.raise(HostError::new(message.as_str())),
            Expr::Cat(text) => {
                self.print(text);
                Value::Null
            }
            Expr::DoCall(fun) => {
                let fun = self.eval(fun);
                self.apply(&fun)
            }
            Expr::Native { routine, args } => {
                let args: Vec<Value> = args.iter().map(|arg| self.eval(arg)).collect();
                let routine = match self.registry.resolve(routine, args.len()) {
                    Ok(routine) => routine,
                    Err(err) => self.raise(HostError::new(err.to_string())),
                };
                debug!(event = "native_call", routine = routine.name, args = args.len());
                (routine.fun)(self, &args)
            }
            Expr::Block(exprs) => {
                let mut last = Value::Null;
                for expr in exprs {
                    last = self.eval(expr);
                }
                last
            }
            Expr::TryCatch { body, fallback } => match self.catch_transfer(|| self.eval(body)) {
                Ok(value) => value,
                Err(err) => {
                    debug!(error = %err, "tryCatch handled host error");
                    self.eval(fallback)
                }
            },
        }
    }

    /// Lines written to the console so far.
    pub fn console(&self) -> Vec<String> {
        self.console.borrow().clone()
    }

    pub fn take_console(&self) -> Vec<String> {
        std::mem::take(&mut *self.console.borrow_mut())
    }

    pub fn stats(&self) -> HostStats {
        self.stats.get()
    }

    /// Transfers recorded against a token that was never resumed.
    pub fn unresolved_unwinds(&self) -> usize {
        self.transfer.borrow().pending.len()
    }

    /// Whether a raw host transfer is crossing native frames right now.
    pub fn transfer_in_flight(&self) -> bool {
        self.transfer.borrow().in_flight
    }

    pub fn protected_depth(&self) -> usize {
        self.protected_depth.get()
    }

    pub fn next_object_id(&self) -> u64 {
        let id = self.next_object.get();
        self.next_object.set(id + 1);
        id
    }

    /// A native destructor the raw transfer would have skipped.
    pub fn note_bypassed_destructor(&self) {
        self.bump(|s| s.bypassed_destructors += 1);
    }

    fn bump(&self, f: impl FnOnce(&mut HostStats)) {
        let mut stats = self.stats.get();
        f(&mut stats);
        self.stats.set(stats);
    }

    fn raise(&self, mut err: HostError) -> ! {
        if err.call.is_none() {
            err.call = self.calls.borrow().last().cloned().flatten();
        }
        self.transfer.borrow_mut().in_flight = true;
        self.bump(|s| s.errors_raised += 1);
        debug!(event = "host_error", error = %err, "host transfer started");
        panic::resume_unwind(Box::new(HostJump(err)))
    }

    fn resume(&self, token: TokenId) -> ! {
        let pending = self.transfer.borrow_mut().pending.remove(&token);
        match pending {
            Some(err) => {
                self.transfer.borrow_mut().in_flight = true;
                self.bump(|s| s.reissues += 1);
                debug!(event = "continue_unwind", token = %token, error = %err);
                panic::resume_unwind(Box::new(HostJump(err)))
            }
            None => {
                error!(token = %token, "no host transfer pending for continuation token");
                eprintln!("fatal: continuation token {} resumed with no pending transfer", token);
                std::process::abort()
            }
        }
    }

    /// Establish a host context around `f`.
    fn catch_transfer(&self, f: impl FnOnce() -> Value) -> Result<Value, HostError> {
        let mark = self.calls.borrow().len();
        match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(value) => Ok(value),
            Err(payload) => {
                self.calls.borrow_mut().truncate(mark);
                match payload.downcast::<HostJump>() {
                    Ok(jump) => {
                        self.transfer.borrow_mut().in_flight = false;
                        Err(jump.0)
                    }
                    Err(other) => panic::resume_unwind(other),
                }
            }
        }
    }
}

impl Host for Interpreter {
    type Value = Value;

    fn make_unwind_cont(&self) -> ContinuationToken {
        let raw = self.next_token.get();
        self.next_token.set(raw + 1);
        self.bump(|s| s.tokens_issued += 1);
        ContinuationToken::from_raw(raw)
    }

    fn unwind_protect(
        &self,
        body: &mut dyn FnMut() -> Value,
        cleanup: &mut dyn FnMut(bool),
        cont: &ContinuationToken,
    ) -> Value {
        let mark = self.calls.borrow().len();
        match panic::catch_unwind(AssertUnwindSafe(|| body())) {
            Ok(value) => {
                cleanup(false);
                value
            }
            Err(payload) => {
                self.calls.borrow_mut().truncate(mark);
                let jump = match payload.downcast::<HostJump>() {
                    Ok(jump) => *jump,
                    Err(other) => panic::resume_unwind(other),
                };
                {
                    let mut transfer = self.transfer.borrow_mut();
                    transfer.in_flight = false;
                    transfer.pending.insert(cont.id(), jump.0);
                }
                self.bump(|s| s.transfers_intercepted += 1);
                trace!(token = %cont.id(), "transfer intercepted, running cleanup");

                cleanup(true);

                // Cleanup returned: nothing native took over, keep going.
                self.resume(cont.id())
            }
        }
    }

    fn continue_unwind(&self, cont: ContinuationToken) -> ! {
        self.resume(cont.id())
    }

    fn error(&self, message: &str) -> ! {
        self.raise(HostError::new(message))
    }

    fn apply(&self, callable: &Value) -> Value {
        let fun = match callable {
            Value::Function(fun) => fun.clone(),
            _ => self.raise(HostError::new("attempt to apply non-function")),
        };

        if self.calls.borrow().len() >= self.host_config.max_eval_depth {
            self.raise(HostError::new(
                "evaluation nested too deeply: infinite recursion / options(expressions=)?",
            ));
        }

        self.calls.borrow_mut().push(fun.name.clone());
        let value = self.eval(&fun.body);
        self.calls.borrow_mut().pop();
        value
    }

    fn print(&self, text: &str) {
        if self.host_config.echo_console {
            println!("{}", text);
        }
        trace!(target: "host_console", text = text, "console output");
        self.console.borrow_mut().push(text.to_string());
    }

    fn enter_protected(&self) -> usize {
        let depth = self.protected_depth.get() + 1;
        self.protected_depth.set(depth);
        depth
    }

    fn leave_protected(&self) {
        self.protected_depth.set(self.protected_depth.get().saturating_sub(1));
    }

    fn owns_transfer(&self, payload: &(dyn Any + Send)) -> bool {
        payload.is::<HostJump>()
    }
}
