use scrubline::cli::Args;
use scrubline::paths::{self, PathConfig};
use scrubline::runner;

use clap::Parser;
use log::{debug, error, info};

fn main() {
    let args = Args::parse();

    let path_config = PathConfig::from_env_and_cli(args.config_dir.clone());
    if let Err(e) = paths::ensure_dirs(&path_config) {
        eprintln!("Warning: Failed to create application directories: {}", e);
    }

    // 0 (default) = warn, 1 (-v) = info, 2 (-vv) = debug, 3+ (-vvv) = trace
    let log_level = match args.verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    if let Some(log_path_opt) = &args.log_file {
        let log_path = log_path_opt
            .as_ref()
            .cloned()
            .unwrap_or_else(|| paths::data_file(paths::LOG_FILE, &path_config));

        let file = match std::fs::File::create(&log_path) {
            Ok(file) => file,
            Err(e) => {
                eprintln!("Failed to create log file {}: {}", log_path.display(), e);
                std::process::exit(1);
            }
        };

        env_logger::Builder::new()
            .filter_level(log_level)
            .format_timestamp_millis()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();

        info!("Logging to file: {} (level: {:?})", log_path.display(), log_level);
    } else {
        // Respects RUST_LOG if set
        let default_level = match args.verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };

        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
            .format_timestamp_millis()
            .init();
    }

    info!("Scrubline starting...");
    debug!("Command-line args: {:?}", args);

    match runner::run_app(&args, &path_config) {
        Ok(summary) if summary.started => {
            println!(
                "session {}: {} frames, {} autoplay steps, final {} ({:.2})",
                summary.session_id,
                summary.frames,
                summary.autoplay_steps,
                summary.final_label,
                summary.final_value.unwrap_or_default()
            );
        }
        Ok(summary) => {
            println!("session {}: not started", summary.session_id);
        }
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}
