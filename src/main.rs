// src/main.rs

use std::fs::File;
use std::io::stdout;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Parser;
use crossterm::{
    cursor::{Hide, Show},
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};

use live_spectrogram::{
    AnalysisLoop, FrameSource, MicSource, SpectrogramConfig, TerminalRenderer, ToneSource,
};

/// Real-time spectrogram of the default microphone, drawn in the terminal.
#[derive(Parser, Debug)]
#[command(name = "live_spectrogram", version)]
struct Args {
    /// TOML file overriding the default tunables
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Capture from the first input device whose name contains this text
    #[arg(long, value_name = "NAME", conflicts_with = "tone")]
    device: Option<String>,

    /// Analyse a synthetic sine at this frequency instead of the microphone
    #[arg(long, value_name = "HZ")]
    tone: Option<f32>,

    /// Stop after this many ticks
    #[arg(long, value_name = "N")]
    ticks: Option<u64>,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    dump_config: bool,

    /// Append log records to this file (RUST_LOG picks the level, default info)
    #[arg(long, value_name = "PATH")]
    log: Option<PathBuf>,
}

/// The screen belongs to the spectrogram while it runs, so records only go
/// somewhere when a log file is given.
fn init_logging(path: Option<&PathBuf>) -> Result<(), anyhow::Error> {
    let mut builder = match path {
        Some(path) => {
            let file = File::options().create(true).append(true).open(path)?;
            let mut builder =
                env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
            builder.target(env_logger::Target::Pipe(Box::new(file)));
            builder
        }
        None => env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("off")),
    };
    builder.init();
    Ok(())
}

fn main() -> Result<(), anyhow::Error> {
    let args = Args::parse();
    init_logging(args.log.as_ref())?;

    let config = match &args.config {
        Some(path) => SpectrogramConfig::load(path)?,
        None => SpectrogramConfig::default(),
    };

    if args.dump_config {
        print!("{}", config.to_toml_string()?);
        return Ok(());
    }

    let source: Box<dyn FrameSource> = match args.tone {
        Some(hz) => Box::new(ToneSource::new(&config, hz, 0.5)?),
        None => Box::new(MicSource::open(&config, args.device.as_deref())?),
    };
    // The mic blocks for a whole frame on its own; the tone has to be paced.
    let pacing = if args.tone.is_some() {
        config.tick_interval()
    } else {
        Duration::from_millis(1)
    };

    enable_raw_mode()?;
    if let Err(e) = execute!(stdout(), EnterAlternateScreen, Hide) {
        disable_raw_mode()?;
        return Err(e.into());
    }

    let outcome = run(config, source, pacing, args.ticks);

    // Raw mode has to go even if leaving the alternate screen failed.
    let restored = execute!(stdout(), Show, LeaveAlternateScreen);
    disable_raw_mode()?;
    restored?;

    let summary = outcome?;
    println!(
        "Spectrogram stopped after {} ticks (last tick {:?} of processing).",
        summary.ticks, summary.last_tick
    );
    Ok(())
}

struct RunSummary {
    ticks: u64,
    last_tick: Duration,
}

/// The scheduler: wait out the rest of the interval while watching the
/// keyboard, then tick. Quitting is only ever checked between ticks.
fn run(
    config: SpectrogramConfig,
    source: Box<dyn FrameSource>,
    pacing: Duration,
    max_ticks: Option<u64>,
) -> Result<RunSummary, anyhow::Error> {
    let renderer = TerminalRenderer::stdout(&config.display)?;
    let mut session = AnalysisLoop::start(config, source, renderer)?;

    loop {
        if max_ticks.is_some_and(|n| session.ticks() >= n) {
            break;
        }

        let deadline = Instant::now() + pacing;
        let mut quit = false;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if !event::poll(remaining)? {
                break;
            }
            match event::read()? {
                Event::Key(ev) if ev.kind == KeyEventKind::Press => {
                    let ctrl_c = ev.code == KeyCode::Char('c')
                        && ev.modifiers.contains(KeyModifiers::CONTROL);
                    if ctrl_c || matches!(ev.code, KeyCode::Char('q') | KeyCode::Esc) {
                        quit = true;
                        break;
                    }
                }
                Event::Resize(width, height) => {
                    log::debug!("terminal resized to {width}x{height}");
                    session.renderer_mut().resize(width, height);
                }
                _ => {}
            }
        }
        if quit {
            break;
        }

        session.tick()?;
    }

    let last_tick = session.last_tick_duration();
    Ok(RunSummary {
        ticks: session.stop(),
        last_tick,
    })
}
