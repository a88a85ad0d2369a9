// CLI modules
mod cli;

use cli::args::{Args, Parser};
use drivefs_daemon::{init_logging, run, AppState};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let state = match AppState::load(None) {
        Ok(state) => state,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let log_level = match state.config.log_level() {
        Ok(level) => level,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    let guards = init_logging(log_level, &state.log_dir);

    if let Err(e) = run(args.mountpoint, state).await {
        tracing::error!("drivefs exited with error: {}", e);
        eprintln!("Error: {}", e);
        // Flush the non-blocking writers before exiting
        drop(guards);
        std::process::exit(1);
    }
}
