//! hookhub -- logs configured key, sequence and mouse bindings as they fire.
//!
//! Usage: `hookhub [CONFIG]` (default `hookhub.toml` in the working directory).

use std::path::PathBuf;
use std::process::ExitCode;

use hookhub::{Bindings, Config, Registry};

const DEFAULT_CONFIG: &str = "hookhub.toml";

fn main() -> ExitCode {
    let path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));

    let config = match Config::load(&path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("hookhub: {e}");
            return ExitCode::FAILURE;
        }
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.logging.level))
        .init();

    log::info!("hookhub v{} using {}", env!("CARGO_PKG_VERSION"), path.display());

    if config.is_empty() {
        log::warn!("config has no bindings; nothing to do");
        return ExitCode::SUCCESS;
    }

    let bindings = match Bindings::install(&config, Registry::global()) {
        Ok(bindings) => bindings,
        Err(e) => {
            log::error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    // Hook threads deliver events; this thread only keeps the bindings alive.
    // Single-use bindings can run out, at which point there is nothing left to wait for.
    while bindings.is_active() {
        std::thread::park_timeout(std::time::Duration::from_secs(1));
    }
    log::info!("all bindings have fired; exiting");
    ExitCode::SUCCESS
}
