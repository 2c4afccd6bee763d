//! CLI smoke entry point.
//!
//! # Responsibility
//! - Open (or create) one database file and print a catalog summary.
//! - Verify `geodb_core` linkage; this is not a general-purpose tool.

use geodb_core::{ChannelFilter, Database, DatabaseOptions};
use log::info;
use std::path::PathBuf;
use std::process::ExitCode;

const LOG_DIR_ENV: &str = "GEODB_LOG_DIR";

fn main() -> ExitCode {
    if let Ok(log_dir) = std::env::var(LOG_DIR_ENV) {
        if let Err(err) = geodb_core::init_logging(geodb_core::default_log_level(), &log_dir) {
            eprintln!("logging disabled: {err}");
        }
    }

    let Some(path) = std::env::args_os().nth(1).map(PathBuf::from) else {
        eprintln!("usage: geodb_cli <database.gdb>");
        return ExitCode::from(2);
    };

    match summarize(path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn summarize(path: PathBuf) -> Result<(), geodb_core::GdbError> {
    let options = DatabaseOptions::default();
    let path = geodb_core::normalize_database_name(path);
    let db = if path.exists() {
        Database::open(&path, &options)?
    } else {
        Database::create(&path, &options)?
    };
    info!(
        "event=cli_summary module=cli status=ok instance_id={}",
        db.instance_id()
    );

    println!("geodb_core version={}", geodb_core::core_version());
    println!("file={}", path.display());
    println!("instance_id={}", db.instance_id());
    println!("lines={}", db.lines(false)?.len());
    println!("channels={}", db.channels(ChannelFilter::All)?.len());
    println!("array_channels={}", db.channels(ChannelFilter::Array)?.len());
    Ok(())
}
