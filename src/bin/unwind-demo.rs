use std::path::PathBuf;

use serde::Serialize;
use tracing::{debug, info};
use unwindprotect::host::HostStats;
use unwindprotect::{init_logging, interpreter_with_package, Config, Expr, LogConfig, Value};

const SCENARIOS: [&str; 6] = ["ok", "error", "unprotected", "nested", "fault", "recover"];

#[derive(Debug)]
struct Args {
    config: Option<PathBuf>,
    json: bool,
    scenarios: Vec<String>,
}

impl Args {
    fn from_args() -> Result<Self, String> {
        let args: Vec<String> = std::env::args().collect();
        let prog = args.first().map(String::as_str).unwrap_or("unwind-demo");

        let mut config = None;
        let mut json = false;
        let mut scenarios = Vec::new();

        let mut iter = args.iter().skip(1);
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--help" | "-h" => return Err(Self::usage(prog)),
                "--json" => json = true,
                "--config" => match iter.next() {
                    Some(path) => config = Some(PathBuf::from(path)),
                    None => return Err(format!("--config needs a path\n\n{}", Self::usage(prog))),
                },
                name if SCENARIOS.contains(&name) => scenarios.push(name.to_string()),
                other => {
                    return Err(format!("Unknown argument: {}\n\n{}", other, Self::usage(prog)))
                }
            }
        }

        if scenarios.is_empty() {
            scenarios = SCENARIOS.iter().map(|s| s.to_string()).collect();
        }

        Ok(Self { config, json, scenarios })
    }

    fn usage(prog: &str) -> String {
        format!(
            "unwind-demo - host errors crossing native frames\n\n\
            USAGE:\n    {} [OPTIONS] [SCENARIO...]\n\n\
            OPTIONS:\n    \
            -h, --help        Print help information\n    \
            --config <PATH>   Load settings from a TOML file\n    \
            --json            Print one JSON object per scenario\n\n\
            SCENARIOS:\n    {}",
            prog,
            SCENARIOS.join(", ")
        )
    }
}

#[derive(Debug, Serialize)]
struct Outcome {
    scenario: String,
    console: Vec<String>,
    value: Option<Value>,
    error: Option<String>,
    stats: HostStats,
}

fn protected(routine: &str, body: Expr) -> Expr {
    Expr::native(routine, vec![Expr::lambda(body)])
}

fn scenario(name: &str) -> Expr {
    let failing = Expr::do_call(Expr::function("f", Expr::stop("an error raised by f")));
    match name {
        "ok" => protected(
            "call_fn_with_unwind_protect",
            Expr::block(vec![Expr::cat("f is running"), Expr::lit(Value::Int(42))]),
        ),
        "error" => protected("call_fn_with_unwind_protect", failing),
        "unprotected" => protected("call_fn_without_unwind_protect", failing),
        "nested" => protected(
            "call_fn_with_unwind_protect",
            protected("call_fn_with_unwind_protect", failing),
        ),
        "fault" => protected("call_fn_with_failing_object", Expr::lit(Value::Null)),
        _ => Expr::try_catch(
            protected("call_fn_with_unwind_protect", failing),
            Expr::lit(Value::Str("recovered".to_string())),
        ),
    }
}

fn run(name: &str, config: &Config) -> Result<Outcome, Box<dyn std::error::Error>> {
    let interp = interpreter_with_package(config)?;
    debug!(scenario = name, "running scenario");

    let result = interp.eval_toplevel(&scenario(name));
    let (value, error) = match result {
        Ok(value) => (Some(value), None),
        Err(err) => (None, Some(err.to_string())),
    };

    Ok(Outcome {
        scenario: name.to_string(),
        console: interp.take_console(),
        value,
        error,
        stats: interp.stats(),
    })
}

fn print_outcome(outcome: &Outcome) {
    println!("== {}", outcome.scenario);
    for line in &outcome.console {
        println!("  | {}", line);
    }
    match (&outcome.value, &outcome.error) {
        (Some(value), _) => println!("  => {}", value),
        (_, Some(error)) => println!("  => {}", error),
        _ => {}
    }
    if outcome.stats.bypassed_destructors > 0 {
        println!(
            "  !! {} native destructor(s) skipped",
            outcome.stats.bypassed_destructors
        );
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = match Args::from_args() {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{}", message);
            std::process::exit(2);
        }
    };

    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::discover(),
    };

    let log_config = if std::env::var("UNWINDPROTECT_LOG_LEVEL").is_ok() {
        LogConfig::from_env()
    } else {
        config.log.to_log_config()
    };
    let _guard = init_logging(log_config);

    info!(scenarios = args.scenarios.len(), "unwind-demo starting");

    for name in &args.scenarios {
        let outcome = run(name, &config)?;
        if args.json {
            println!("{}", serde_json::to_string(&outcome)?);
        } else {
            print_outcome(&outcome);
        }
    }

    Ok(())
}
