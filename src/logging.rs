use std::fs::{File, OpenOptions};
use std::path::Path;

use log::LevelFilter;
use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, SharedLogger, TermLogger, TerminalMode, WriteLogger,
};

use crate::config::LoggingConfig;
use crate::eval::{InjectTestRequest, Verdict};

/// Install the global logger: stderr at the configured level, plus an
/// append-only file log that always records at least `info`.
///
/// Best-effort: an unusable log file is reported on stderr and skipped.
pub fn init(config: &LoggingConfig, verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        config.level.parse().unwrap_or(LevelFilter::Warn)
    };
    let log_config = ConfigBuilder::new().set_time_format_rfc3339().build();

    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        log_config.clone(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )];
    if let Some(file) = open_log_file(&config.log_file) {
        loggers.push(WriteLogger::new(
            level.max(LevelFilter::Info),
            log_config,
            file,
        ));
    }
    let _ = CombinedLogger::init(loggers);
}

fn open_log_file(configured: &str) -> Option<File> {
    if configured.trim().is_empty() {
        return None;
    }
    let expanded = shellexpand::tilde(configured);
    let path = Path::new(expanded.as_ref());
    if let Some(dir) = path.parent() {
        let _ = std::fs::create_dir_all(dir);
    }
    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => Some(file),
        Err(e) => {
            eprintln!("inject-eval: cannot open log file {}: {e}", path.display());
            None
        }
    }
}

/// Record one verdict as a single log line.
pub fn log_verdict(request: &InjectTestRequest, verdict: &Verdict) {
    log::info!("{}", verdict_line(request, verdict));
}

/// `tool<TAB>strategy<TAB>outcome<TAB>N steps<TAB>last message`, newlines flattened.
fn verdict_line(request: &InjectTestRequest, verdict: &Verdict) -> String {
    let tool: String = request.target_tool.chars().take(60).collect();
    let last = verdict
        .debug
        .last()
        .map(|e| e.message.replace('\n', "; "))
        .unwrap_or_default();
    format!(
        "{tool}\t{strategy}\t{outcome}\t{steps} steps\t{last}",
        strategy = request.evaluation_strategy,
        outcome = verdict.outcome.as_str(),
        steps = verdict.debug.len(),
    )
}
