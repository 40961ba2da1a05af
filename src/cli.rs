use clap::Parser;
use std::path::PathBuf;

// Build version with target info
const VERSION_INFO: &str = const_format::concatcp!(
    env!("CARGO_PKG_VERSION"), "\n",
    "Target: ", std::env::consts::ARCH, "-", std::env::consts::OS
);

/// Headless timeline scrub viewer
#[derive(Parser, Debug)]
#[command(author, version = VERSION_INFO, about, long_about = None)]
pub struct Args {
    /// Asset file to load before the timeline starts (omit to start immediately)
    #[arg(value_name = "ASSET")]
    pub asset: Option<PathBuf>,

    /// JSON script of timed input actions (drag, input, toggle, ...)
    #[arg(short = 's', long = "script", value_name = "FILE")]
    pub script: Option<PathBuf>,

    /// Simulated frame rate (overrides settings)
    #[arg(long = "fps", value_name = "FPS")]
    pub fps: Option<f64>,

    /// Seconds of simulated playback
    #[arg(short = 'd', long = "duration", value_name = "SECONDS", default_value = "4.0")]
    pub duration: f64,

    /// Start with autoplay paused
    #[arg(short = 'p', long = "paused")]
    pub paused: bool,

    /// Initial timeline value (internal units)
    #[arg(long = "start", value_name = "VALUE")]
    pub start_value: Option<f64>,

    /// Print every frame, not only changes
    #[arg(long = "every-frame")]
    pub every_frame: bool,

    /// Write the effective settings back to the settings file
    #[arg(long = "save-settings")]
    pub save_settings: bool,

    /// Enable debug logging to file (default: scrubline.log)
    #[arg(short = 'l', long = "log", value_name = "LOG_FILE")]
    pub log_file: Option<Option<PathBuf>>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Custom configuration directory (overrides default platform paths)
    #[arg(short = 'c', long = "config-dir", value_name = "DIR")]
    pub config_dir: Option<PathBuf>,
}
