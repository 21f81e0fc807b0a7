use std::path::PathBuf;

use multiworld::ClientConfig;
use persistence::SyncState;

struct Args {
    config: ClientConfig,
    state_path: PathBuf,
}

fn parse_cli_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut config_path: Option<&str> = None;
    let mut state_path: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                if let Some(val) = args.get(i + 1) {
                    config_path = Some(val.as_str());
                    i += 2;
                } else {
                    eprintln!("--config requires a path argument");
                    std::process::exit(1);
                }
            }
            other if state_path.is_none() && !other.starts_with("--") => {
                state_path = Some(PathBuf::from(other));
                i += 1;
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                std::process::exit(1);
            }
        }
    }

    let Some(state_path) = state_path else {
        eprintln!("usage: multiworld_state [--config <file>] <state.json>");
        std::process::exit(1);
    };

    match ClientConfig::load(config_path) {
        Ok(config) => Args { config, state_path },
        Err(e) => {
            eprintln!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    }
}

/// Print the sync state of a game slot, applying the configured corrupt
/// file policy exactly as the client would on start.
fn main() {
    observability::init_logging();
    let args = parse_cli_args();

    let state = match SyncState::open(&args.state_path, args.config.state.on_corrupt) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(path = %args.state_path.display(), "Failed to open sync state: {}", e);
            std::process::exit(1);
        }
    };

    let pending = state.pending_locations();
    tracing::info!(pending = pending.len(), "Locations awaiting upload");
    match serde_json::to_string_pretty(state.record()) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            tracing::error!("Failed to render sync state: {}", e);
            std::process::exit(1);
        }
    }
}
