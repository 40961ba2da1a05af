//! Headless runner - drives a session with simulated frames and scripted input.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, info};
use uuid::Uuid;

use crate::cli::Args;
use crate::core::event_store::EventStore;
use crate::core::loader::{AssetLoader, FileLoader, NullLoader};
use crate::core::render_sink::{RenderTarget, SimpleEntity};
use crate::core::session::Session;
use crate::core::timeline::DragEvent;
use crate::paths::{self, PathConfig};
use crate::script::{Script, ScriptAction};
use crate::settings::ViewerSettings;
use crate::ui::{ScrubBar, ScrubBarStyle};

/// Outcome of one headless run
#[derive(Clone, Debug, PartialEq)]
pub struct RunSummary {
    pub session_id: Uuid,
    pub started: bool,
    pub frames: usize,
    pub autoplay_steps: usize,
    pub final_value: Option<f64>,
    pub final_label: String,
}

/// Settings file merged with CLI overrides.
pub fn effective_settings(args: &Args, settings_path: &Path) -> Result<ViewerSettings> {
    let mut settings = ViewerSettings::load(settings_path)?;
    if let Some(fps) = args.fps {
        settings.fps = fps;
    }
    if args.paused {
        settings.start_paused = true;
    }
    if let Some(start) = args.start_value {
        settings.start_value = start;
    }
    settings.validate().context("Invalid settings after command-line overrides")?;
    Ok(settings)
}

/// Run the viewer with parsed command-line arguments, printing to stdout.
pub fn run_app(args: &Args, path_config: &PathConfig) -> Result<RunSummary> {
    let settings_path = paths::config_file(paths::SETTINGS_FILE, path_config);
    info!("Settings path: {}", settings_path.display());
    let settings = effective_settings(args, &settings_path)?;
    if args.save_settings {
        settings.save(&settings_path)?;
    }

    let script = match &args.script {
        Some(path) => Script::load(path)?,
        None => Script::default(),
    };

    let mut loader: Box<dyn AssetLoader> = match &args.asset {
        Some(path) => {
            info!("Asset: {}", path.display());
            Box::new(FileLoader::new(path))
        }
        None => {
            info!("No asset given, starting immediately");
            Box::new(NullLoader)
        }
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    simulate(&settings, loader.as_mut(), script, args.duration, args.every_frame, &mut out)
}

/// Run one session for `duration` seconds of simulated frames.
///
/// Writes the scrub bar line whenever it changes (or every frame).
pub fn simulate(
    settings: &ViewerSettings,
    loader: &mut dyn AssetLoader,
    mut script: Script,
    duration: f64,
    every_frame: bool,
    out: &mut dyn Write,
) -> Result<RunSummary> {
    let store = EventStore::new();
    let style = ScrubBarStyle {
        width: settings.bar_width,
        ..Default::default()
    };
    let bar = ScrubBar::attach(&store, settings.timeline, style);
    let mut session = Session::new(&store, settings.session_options())?;

    let started = session.start(loader, Some(Box::new(SimpleEntity::enabled())));
    let mut last_line = bar.render_line();
    writeln!(out, "{:>8.3}s {}", 0.0, last_line)?;

    let dt = settings.frame_dt();
    let frames = if started && duration.is_finite() {
        (duration * settings.fps).ceil().max(0.0) as usize
    } else {
        0
    };
    debug!("Simulating {} frames at {} fps ({} script steps)", frames, settings.fps, script.len());

    let mut parked: Option<Box<dyn RenderTarget>> = None;
    let mut autoplay_steps = 0;
    for frame in 1..=frames {
        let time = frame as f64 * dt;
        for action in script.due(time) {
            apply_action(&bar, &session, &mut parked, action);
        }
        autoplay_steps += session.tick(dt);

        let line = bar.render_line();
        if every_frame || line != last_line {
            writeln!(out, "{:>8.3}s {}", time, line)?;
            last_line = line;
        }
    }

    let summary = RunSummary {
        session_id: session.id(),
        started,
        frames,
        autoplay_steps,
        final_value: session.controller().map(|c| c.current_value()),
        final_label: bar.label(),
    };
    session.teardown();
    info!(
        "Run finished: {} frames, {} autoplay steps, final {:?}",
        summary.frames, summary.autoplay_steps, summary.final_value
    );
    Ok(summary)
}

fn apply_action(bar: &ScrubBar, session: &Session, parked: &mut Option<Box<dyn RenderTarget>>, action: ScriptAction) {
    debug!("Script: {:?}", action);
    match action {
        ScriptAction::Input { value } => bar.input(&value.as_text()),
        ScriptAction::Drag { event } => bar.drag(event),
        ScriptAction::DragStart => bar.drag(DragEvent::PointerDown),
        ScriptAction::DragEnd => bar.drag(DragEvent::PointerUp),
        ScriptAction::Toggle => bar.press_play_toggle(),
        ScriptAction::RemoveTarget => {
            if let Some(sink) = session.sink()
                && let Some(target) = sink.take_target()
            {
                *parked = Some(target);
            }
        }
        ScriptAction::RestoreTarget => {
            if let Some(sink) = session.sink()
                && let Some(target) = parked.take()
            {
                sink.set_target(target);
            }
        }
    }
}
