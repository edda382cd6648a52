//! Tests for the unwind bridge

use super::*;
use crate::config::BridgeConfig;
use crate::errors::{HostError, NativeFault};
use crate::host::{Expr, Host, Interpreter, Value};

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::convert::Infallible;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

type Log = Rc<RefCell<Vec<String>>>;

/// Scoped resource recording its drop and whether a raw transfer was in flight.
struct Probe<'h> {
    name: &'static str,
    log: Log,
    host: &'h Interpreter,
}

impl<'h> Probe<'h> {
    fn new(name: &'static str, log: &Log, host: &'h Interpreter) -> Self {
        log.borrow_mut().push(format!("acquire {}", name));
        Self {
            name,
            log: log.clone(),
            host,
        }
    }
}

impl Drop for Probe<'_> {
    fn drop(&mut self) {
        self.log.borrow_mut().push(format!(
            "release {} in_flight={}",
            self.name,
            self.host.transfer_in_flight()
        ));
    }
}

fn lambda(body: Expr) -> Value {
    match Expr::lambda(body) {
        Expr::Lit(value) => value,
        _ => unreachable!(),
    }
}

#[test]
fn test_tokens_are_fresh() {
    let interp = Interpreter::default();
    let a = create_token(&interp);
    let b = create_token(&interp);
    assert_ne!(a.id(), b.id());
    assert!(a.id() < b.id());
    assert_eq!(interp.stats().tokens_issued, 2);
}

#[test]
fn test_token_display() {
    let token = ContinuationToken::from_raw(7);
    assert_eq!(token.id().to_string(), "cont#7");
    assert_eq!(token.id().raw(), 7);
}

#[test]
fn test_state_transitions() {
    use CallState::*;

    assert!(Entered.can_transition_to(RunningUserCode));
    assert!(Entered.can_transition_to(NativeFault));
    assert!(RunningUserCode.can_transition_to(CompletedOk));
    assert!(RunningUserCode.can_transition_to(UnwindSignaled));
    assert!(UnwindSignaled.can_transition_to(Reissued));
    assert!(NativeFault.can_transition_to(ReportedToHost));

    assert!(!Entered.can_transition_to(CompletedOk));
    assert!(!UnwindSignaled.can_transition_to(ReportedToHost));
    assert!(!CompletedOk.can_transition_to(RunningUserCode));
    assert!(!Reissued.can_transition_to(Reissued));

    assert!(CompletedOk.is_terminal());
    assert!(Reissued.is_terminal());
    assert!(ReportedToHost.is_terminal());
    assert!(!UnwindSignaled.is_terminal());
}

#[test]
fn test_protected_call_tracks_state() {
    let mut call = ProtectedCall::new(ContinuationToken::from_raw(1).id());
    assert_eq!(call.state(), CallState::Entered);
    call.advance(CallState::RunningUserCode);
    call.advance(CallState::CompletedOk);
    assert_eq!(call.state(), CallState::CompletedOk);
}

#[test]
fn test_translator_ignores_normal_exit() {
    let token = ContinuationToken::from_raw(3);
    on_unwind_signal(token.id(), false);
}

#[test]
fn test_translator_raises_signal() {
    let id = ContinuationToken::from_raw(3).id();
    let payload = panic::catch_unwind(move || on_unwind_signal(id, true)).unwrap_err();
    let signal = payload.downcast_ref::<UnwindSignal>().unwrap();
    assert_eq!(signal.token(), id);
}

#[test]
fn test_classify_payloads() {
    let interp = Interpreter::default();
    let mine = ContinuationToken::from_raw(1).id();
    let other = ContinuationToken::from_raw(2).id();

    let caught = classify(&interp, mine, Box::new(UnwindSignal::new(mine)));
    assert!(matches!(caught, Caught::HostUnwind(s) if s.token() == mine));

    let caught = classify(&interp, mine, Box::new(UnwindSignal::new(other)));
    assert!(format!("{:?}", caught).starts_with("Foreign"));

    let caught = classify(&interp, mine, Box::new("index out of bounds"));
    assert!(matches!(caught, Caught::NativeFault(f) if f.description() == "index out of bounds"));

    let caught = classify(&interp, mine, Box::new(String::from("bad state")));
    assert!(matches!(caught, Caught::NativeFault(f) if f.description() == "bad state"));

    let caught = classify(&interp, mine, Box::new(NativeFault::new("typed")));
    assert!(matches!(caught, Caught::NativeFault(f) if f.description() == "typed"));

    let caught = classify(&interp, mine, Box::new(42_u32));
    assert!(matches!(
        caught,
        Caught::NativeFault(f) if f.description() == "native panic payload could not be unpacked"
    ));
}

#[test]
fn test_classify_passes_host_transfers() {
    let interp = Interpreter::default();
    let payload = panic::catch_unwind(AssertUnwindSafe(|| interp.error("raw"))).unwrap_err();
    let token = ContinuationToken::from_raw(1).id();
    assert!(matches!(classify(&interp, token, payload), Caught::Foreign(_)));
}

#[test]
fn test_run_protected_returns_value() {
    let interp = Interpreter::default();
    let log: Log = Rc::default();

    let value = interp
        .toplevel_exec(|| {
            run_protected(
                &interp,
                || Ok::<_, Infallible>(Probe::new("scope", &log, &interp)),
                &lambda(Expr::lit(Value::Int(7))),
            )
        })
        .unwrap();

    assert_eq!(value, Value::Int(7));
    assert_eq!(
        *log.borrow(),
        vec!["acquire scope", "release scope in_flight=false"]
    );
    assert_eq!(interp.stats().transfers_intercepted, 0);
}

#[test]
fn test_run_protected_relays_host_error() {
    let interp = Interpreter::default();
    let log: Log = Rc::default();

    let err = interp
        .toplevel_exec(|| {
            run_protected(
                &interp,
                || Ok::<_, Infallible>(Probe::new("scope", &log, &interp)),
                &lambda(Expr::stop("boom")),
            )
        })
        .unwrap_err();

    assert_eq!(err, HostError::new("boom"));
    // Released by native unwinding, not skipped by the raw transfer.
    assert_eq!(
        *log.borrow(),
        vec!["acquire scope", "release scope in_flight=false"]
    );

    let stats = interp.stats();
    assert_eq!(stats.transfers_intercepted, 1);
    assert_eq!(stats.reissues, 1);
    assert_eq!(interp.unresolved_unwinds(), 0);
    assert!(!interp.transfer_in_flight());
}

#[test]
fn test_run_protected_reports_failed_acquire() {
    let interp = Interpreter::default();

    let err = interp
        .toplevel_exec(|| {
            run_protected(
                &interp,
                || Err::<(), _>(NativeFault::new("pool exhausted")),
                &lambda(Expr::lit(Value::Int(1))),
            )
        })
        .unwrap_err();

    assert_eq!(err.message, "A native exception occurred: pool exhausted");
    assert!(interp.console().is_empty(), "callable must not run");
}

#[test]
fn test_run_protected_reports_panicking_acquire() {
    let interp = Interpreter::default();

    let err = interp
        .toplevel_exec(|| {
            run_protected(
                &interp,
                || -> Result<(), Infallible> { panic!("constructor blew up") },
                &lambda(Expr::lit(Value::Int(1))),
            )
        })
        .unwrap_err();

    assert_eq!(err.message, "A native exception occurred: constructor blew up");
    assert_eq!(interp.unresolved_unwinds(), 0);
}

#[test]
fn test_custom_fault_prefix() {
    let interp = Interpreter::default();
    let config = BridgeConfig {
        announce_calls: false,
        fault_prefix: "native fault".to_string(),
        ..BridgeConfig::default()
    };

    let err = interp
        .toplevel_exec(|| {
            Coordinator::with_config(&interp, config.clone()).run_protected(
                || Err::<(), _>("no memory"),
                &lambda(Expr::lit(Value::Null)),
            )
        })
        .unwrap_err();

    assert_eq!(err.message, "native fault: no memory");
}

#[test]
fn test_raw_host_error_in_acquire_passes_through() {
    let interp = Interpreter::default();

    let err = interp
        .toplevel_exec(|| {
            run_protected(
                &interp,
                || -> Result<(), Infallible> { interp.error("raised outside the primitive") },
                &lambda(Expr::lit(Value::Null)),
            )
        })
        .unwrap_err();

    // The host's own error, not re-labelled as a native fault.
    assert_eq!(err.message, "raised outside the primitive");
    assert_eq!(interp.stats().reissues, 0);
}

#[test]
fn test_announce_calls() {
    let interp = Interpreter::default();
    interp
        .toplevel_exec(|| {
            run_protected(
                &interp,
                || Ok::<_, Infallible>(()),
                &lambda(Expr::cat("inside")),
            )
        })
        .unwrap();

    assert_eq!(
        interp.console(),
        vec![
            "Will call supplied function",
            "inside",
            "Done with call to supplied function"
        ]
    );

    let quiet = Interpreter::default();
    let config = BridgeConfig {
        announce_calls: false,
        ..BridgeConfig::default()
    };
    quiet
        .toplevel_exec(|| {
            Coordinator::with_config(&quiet, config.clone())
                .run_protected(|| Ok::<_, Infallible>(()), &lambda(Expr::cat("inside")))
        })
        .unwrap();
    assert_eq!(quiet.console(), vec!["inside"]);
}

#[test]
fn test_invoke_passes_errors_untouched() {
    let interp = Interpreter::default();
    let err = interp
        .toplevel_exec(|| invoke(&interp, &lambda(Expr::stop("direct")), false))
        .unwrap_err();
    assert_eq!(err.message, "direct");
}

/// Host that only moves transfers around; it evaluates nothing itself.
#[derive(Default)]
struct RecordingHost {
    log: Log,
    next_token: Cell<u64>,
    depth: Cell<usize>,
    pending: RefCell<Vec<(TokenId, String)>>,
}

/// A raw transfer of `RecordingHost`.
struct Jump(String);

#[derive(Clone)]
enum Fake {
    Int(i64),
    Call(Rc<dyn Fn(&RecordingHost) -> Fake>),
}

impl std::fmt::Debug for Fake {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Fake::Int(n) => f.debug_tuple("Int").field(n).finish(),
            Fake::Call(_) => f.write_str("Call(..)"),
        }
    }
}

impl Fake {
    fn call(f: impl Fn(&RecordingHost) -> Fake + 'static) -> Self {
        Fake::Call(Rc::new(f))
    }

    fn int(&self) -> i64 {
        match self {
            Fake::Int(n) => *n,
            Fake::Call(_) => panic!("expected an integer"),
        }
    }
}

impl RecordingHost {
    fn note(&self, event: impl Into<String>) {
        self.log.borrow_mut().push(event.into());
    }

    fn resume(&self, token: TokenId) -> ! {
        let mut pending = self.pending.borrow_mut();
        let index = pending.iter().position(|(t, _)| *t == token).unwrap();
        let (_, message) = pending.remove(index);
        drop(pending);
        self.note(format!("continue {}", token));
        panic::resume_unwind(Box::new(Jump(message)))
    }
}

impl Host for RecordingHost {
    type Value = Fake;

    fn make_unwind_cont(&self) -> ContinuationToken {
        let raw = self.next_token.get() + 1;
        self.next_token.set(raw);
        ContinuationToken::from_raw(raw)
    }

    fn unwind_protect(
        &self,
        body: &mut dyn FnMut() -> Fake,
        cleanup: &mut dyn FnMut(bool),
        cont: &ContinuationToken,
    ) -> Fake {
        match panic::catch_unwind(AssertUnwindSafe(|| body())) {
            Ok(value) => {
                cleanup(false);
                value
            }
            Err(payload) => match payload.downcast::<Jump>() {
                Ok(jump) => {
                    self.note(format!("intercept {}", cont.id()));
                    self.pending.borrow_mut().push((cont.id(), jump.0));
                    cleanup(true);
                    self.resume(cont.id())
                }
                Err(other) => panic::resume_unwind(other),
            },
        }
    }

    fn continue_unwind(&self, cont: ContinuationToken) -> ! {
        self.resume(cont.id())
    }

    fn error(&self, message: &str) -> ! {
        self.note(format!("error {}", message));
        panic::resume_unwind(Box::new(Jump(message.to_string())))
    }

    fn apply(&self, callable: &Fake) -> Fake {
        match callable {
            Fake::Call(f) => f(self),
            Fake::Int(_) => self.error("attempt to apply non-function"),
        }
    }

    fn print(&self, text: &str) {
        self.note(format!("print {}", text));
    }

    fn enter_protected(&self) -> usize {
        self.depth.set(self.depth.get() + 1);
        self.depth.get()
    }

    fn leave_protected(&self) {
        self.depth.set(self.depth.get() - 1);
    }

    fn owns_transfer(&self, payload: &(dyn Any + Send)) -> bool {
        payload.is::<Jump>()
    }
}

/// Scoped resource that records into the host's log.
struct Held {
    name: &'static str,
    log: Log,
}

impl Held {
    fn new(name: &'static str, host: &RecordingHost) -> Self {
        host.note(format!("acquire {}", name));
        Self {
            name,
            log: host.log.clone(),
        }
    }
}

impl Drop for Held {
    fn drop(&mut self) {
        self.log.borrow_mut().push(format!("release {}", self.name));
    }
}

#[test]
fn test_injected_host_clean_path() {
    let host = RecordingHost::default();
    let value = run_protected(
        &host,
        || Ok::<_, Infallible>(Held::new("scope", &host)),
        &Fake::call(|_| Fake::Int(11)),
    );

    assert_eq!(value.int(), 11);
    assert_eq!(
        *host.log.borrow(),
        vec![
            "acquire scope",
            "print Will call supplied function",
            "print Done with call to supplied function",
            "release scope",
        ]
    );
    assert_eq!(host.depth.get(), 0);
}

#[test]
fn test_injected_host_error_released_before_reissue() {
    let host = RecordingHost::default();

    let payload = panic::catch_unwind(AssertUnwindSafe(|| {
        run_protected(
            &host,
            || Ok::<_, Infallible>(Held::new("scope", &host)),
            &Fake::call(|host| host.error("boom")),
        )
    }))
    .unwrap_err();

    assert_eq!(payload.downcast_ref::<Jump>().map(|j| j.0.as_str()), Some("boom"));
    assert_eq!(
        *host.log.borrow(),
        vec![
            "acquire scope",
            "print Will call supplied function",
            "error boom",
            "intercept cont#1",
            "print Converting host error to native unwind",
            "release scope",
            "continue cont#1",
        ]
    );
    assert!(host.pending.borrow().is_empty());
    assert_eq!(host.depth.get(), 0);
}

#[test]
fn test_foreign_signal_rethrown_unchanged() {
    let host = RecordingHost::default();
    let foreign = ContinuationToken::from_raw(99).id();

    // A signal for some other protected region reaches this coordinator.
    let payload = panic::catch_unwind(AssertUnwindSafe(|| {
        run_protected(
            &host,
            || Ok::<_, Infallible>(Held::new("inner", &host)),
            &Fake::call(move |_| panic::resume_unwind(Box::new(UnwindSignal::new(foreign)))),
        )
    }))
    .unwrap_err();

    let signal = payload.downcast_ref::<UnwindSignal>().unwrap();
    assert_eq!(signal.token(), foreign);

    // Scope dropped on the way out; nothing re-issued or reported.
    assert_eq!(
        *host.log.borrow(),
        vec![
            "acquire inner",
            "print Will call supplied function",
            "release inner",
        ]
    );
    assert!(host.pending.borrow().is_empty());
    assert_eq!(host.depth.get(), 0);
}

#[test]
fn test_nesting_limit_raises_host_error() {
    let host = RecordingHost::default();
    let config = BridgeConfig {
        announce_calls: false,
        max_nesting: 1,
        ..BridgeConfig::default()
    };

    let inner_config = config.clone();
    let nested = Fake::call(move |host| {
        Coordinator::with_config(host, inner_config.clone())
            .run_protected(|| Ok::<_, Infallible>(Held::new("inner", host)), &Fake::Int(0))
    });

    let payload = panic::catch_unwind(AssertUnwindSafe(|| {
        Coordinator::with_config(&host, config.clone())
            .run_protected(|| Ok::<_, Infallible>(Held::new("outer", &host)), &nested)
    }))
    .unwrap_err();

    assert_eq!(
        payload.downcast_ref::<Jump>().map(|j| j.0.as_str()),
        Some("protected native calls nested too deeply (limit 1)")
    );
    // The refused level acquired nothing; the outer one still released.
    assert_eq!(
        *host.log.borrow(),
        vec![
            "acquire outer",
            "error protected native calls nested too deeply (limit 1)",
            "intercept cont#1",
            "release outer",
            "continue cont#1",
        ]
    );
    assert_eq!(host.depth.get(), 0);
}
