//! CLI smoke entry point.
//!
//! # Responsibility
//! - Load `.env`, read `SEEDBED_*` configuration and start stderr logging.
//! - Bootstrap the bundled models once and print per-table row counts.
//!
//! Exit code is non-zero when configuration is missing or bootstrap fails.
//! Seed rows already present from an earlier run are not a failure.

use seedbed_core::{
    core_version, default_log_level, init_logging, LogTarget, Store, StoreError, ValidationError,
};
use std::process::ExitCode;

fn main() -> ExitCode {
    // A missing .env file is fine; the environment may already be set.
    let _ = dotenvy::dotenv();

    if let Err(err) = init_logging(default_log_level(), LogTarget::Stderr) {
        eprintln!("seedbed: logging disabled: {err}");
    }

    let store = match Store::from_env() {
        Ok(store) => store,
        Err(err) => {
            log::error!("event=cli_start module=cli status=error error={err}");
            eprintln!("seedbed: {err}");
            return ExitCode::FAILURE;
        }
    };

    println!("seedbed_core version={}", core_version());
    match store.init_db() {
        Ok(report) => println!(
            "init_db tables={} seeded_rows={}",
            report.tables,
            report.seeded_rows()
        ),
        Err(ref err) if is_already_seeded(err) => {
            log::warn!("event=cli_init_db module=cli status=already_seeded error_code=element_already_exists");
            println!("init_db seed rows already present; continuing");
        }
        Err(err) => {
            eprintln!("seedbed: init_db failed: {err}");
            return ExitCode::FAILURE;
        }
    }

    for entity_type in store.registry().entity_types() {
        match store.count_rows(entity_type.table()) {
            Ok(count) => println!("table={} rows={}", entity_type.table(), count),
            Err(err) => {
                eprintln!("seedbed: count failed for {}: {err}", entity_type.table());
                return ExitCode::FAILURE;
            }
        }
    }

    ExitCode::SUCCESS
}

fn is_already_seeded(err: &StoreError) -> bool {
    matches!(
        err.as_validation(),
        Some(ValidationError::ElementAlreadyExists { .. })
    )
}
