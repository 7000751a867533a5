//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `symcheck_core` linkage.
//! - Optionally open a catalog file and print per-predicate fact counts.
//! - Keep output deterministic for quick local sanity checks.

use log::info;
use std::process::ExitCode;
use symcheck_core::{init_logging_with, open_catalog, CatalogConfig};

const ENV_LOG_DIR: &str = "SYMCHECK_LOG_DIR";

fn main() -> ExitCode {
    println!("symcheck_core ping={}", symcheck_core::ping());
    println!("symcheck_core version={}", symcheck_core::core_version());

    let Some(catalog_file) = std::env::args_os().nth(1) else {
        return ExitCode::SUCCESS;
    };

    let mut config = CatalogConfig::with_catalog_file(catalog_file);
    if let Ok(level) = std::env::var(symcheck_core::config::ENV_LOG_LEVEL) {
        config.log_level = level;
    }
    if let Err(err) = config.validate() {
        eprintln!("symcheck_core config error={err}");
        return ExitCode::FAILURE;
    }
    if let Ok(log_dir) = std::env::var(ENV_LOG_DIR) {
        if let Err(err) = init_logging_with(&config, &log_dir) {
            eprintln!("symcheck_core logging error={err}");
        }
    }

    let store = match open_catalog(&config) {
        Ok(store) => store,
        Err(err) => {
            eprintln!("symcheck_core catalog error_code={} error={err}", err.code());
            return ExitCode::FAILURE;
        }
    };

    let predicates = store.predicates();
    for (predicate, _) in &predicates {
        println!(
            "predicate={} facts={}",
            predicate,
            store.list(predicate).len()
        );
    }
    info!(
        "event=cli_check module=cli status=ok predicates={}",
        predicates.len()
    );
    ExitCode::SUCCESS
}
