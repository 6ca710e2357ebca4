//! inject-eval: evaluate an exercise inject from the command line.
//!
//! Reads a JSON request from stdin and writes the JSON result to stdout.
//!
//! Modes:
//!   - default: inject test request → `{"outcome": 1|2, "debug": [...]}`
//!   - `--test-path`: `{path, data, extract_type}` → `{"success": ..., ...}`
//!
//! Flags:
//!   --timeout SECS        bound for the remote query
//!   --match-mode MODE     query_search combination: any, all or dataset
//!   -v, --verbose         debug logging on stderr

use std::io::Read;

use serde::Deserialize;
use serde_json::{Value, json};

use inject_eval::config::Config;
use inject_eval::eval::{Evaluator, InjectTestRequest};
use inject_eval::logging;
use inject_eval::path::ExtractType;
use inject_eval::strategies::MatchMode;

#[derive(Deserialize)]
struct PathTestRequest {
    path: String,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    extract_type: Option<String>,
}

#[derive(Default)]
struct Args {
    test_path: bool,
    verbose: bool,
    timeout_secs: Option<u64>,
    match_mode: Option<MatchMode>,
}

fn parse_args(argv: impl IntoIterator<Item = String>) -> Result<Args, String> {
    let mut args = Args::default();
    let mut iter = argv.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--test-path" => args.test_path = true,
            "-v" | "--verbose" => args.verbose = true,
            "--timeout" => {
                let value = iter.next().ok_or("--timeout needs a value")?;
                args.timeout_secs = Some(parse_timeout(&value)?);
            }
            "--match-mode" => {
                let value = iter.next().ok_or("--match-mode needs a value")?;
                args.match_mode = Some(value.parse()?);
            }
            other => return Err(format!("unknown argument: {other}")),
        }
    }
    Ok(args)
}

/// Whole seconds, at least one.
fn parse_timeout(value: &str) -> Result<u64, String> {
    match value.parse::<u64>() {
        Ok(0) => Err("--timeout must be at least 1 second".to_string()),
        Ok(secs) => Ok(secs),
        Err(_) => Err(format!("invalid --timeout value: {value}")),
    }
}

fn print_json(value: &impl serde::Serialize) {
    match serde_json::to_string(value) {
        Ok(s) => println!("{s}"),
        Err(e) => {
            eprintln!("inject-eval: could not encode result: {e}");
            std::process::exit(1);
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("inject-eval: {e}");
            std::process::exit(2);
        }
    };

    let mut config = Config::load();
    if let Some(secs) = args.timeout_secs {
        config.fetch.timeout_secs = secs;
    }
    logging::init(&config.logging, args.verbose);

    let mut input = String::new();
    if std::io::stdin().read_to_string(&mut input).is_err() {
        eprintln!("failed to read stdin");
        std::process::exit(1);
    }

    if args.test_path {
        let request: PathTestRequest = match serde_json::from_str(&input) {
            Ok(v) => v,
            Err(e) => {
                eprintln!("JSON parse error: {e}");
                std::process::exit(1);
            }
        };
        let extract_type = request
            .extract_type
            .as_deref()
            .map(ExtractType::parse)
            .unwrap_or(config.settings.default_extract_type);
        let output = match inject_eval::test_path(&request.path, &request.data, extract_type) {
            Ok(result) => json!({"success": true, "result": result}),
            Err(message) => json!({"success": false, "message": message}),
        };
        print_json(&output);
        return;
    }

    let request: InjectTestRequest = match serde_json::from_str(&input) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("JSON parse error: {e}");
            std::process::exit(1);
        }
    };

    let mut evaluator = Evaluator::from_config(&config);
    if let Some(mode) = args.match_mode {
        evaluator.set_match_mode(mode);
    }
    let interrupted = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    let verdict = evaluator.evaluate_until(&request, interrupted).await;
    logging::log_verdict(&request, &verdict);
    print_json(&verdict);
}
