use std::{
    path::{Path, PathBuf},
    thread,
    time::Duration,
};

use clap::{Parser, Subcommand};
use music_player_core::{
    sim::{RecordingEffectHost, RecordingSurface, SimulatedAudio, SimulatedMedia},
    store::write_flag,
    Clock, FrameOutcome, JsonFileStore, ManualClock, MemoryStore, PlaybackController,
    PlaybackStatus, PlayerConfig, PreferenceStore, Preferences, SystemClock,
};
use tracing_subscriber::EnvFilter;

const FRAME_MS: u64 = 16;

fn main() -> music_player_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Tracks { config } => run_tracks(config.as_deref()),
        Commands::Simulate {
            config,
            store,
            frames,
            loudness,
            track_frames,
            seed,
            realtime,
        } => run_simulate(
            config.as_deref(),
            store.as_deref(),
            SimulateOptions {
                frames,
                loudness,
                track_frames,
                seed,
                realtime,
            },
        ),
        Commands::Shuffle { config, store } => {
            run_toggle(config.as_deref(), &store, |keys| keys.shuffle.clone(), |p| p.shuffle)
        }
        Commands::TrashMode { config, store } => run_toggle(
            config.as_deref(),
            &store,
            |keys| keys.continuous_effects.clone(),
            |p| p.continuous_effects,
        ),
    }
}

fn load_config(path: Option<&Path>) -> music_player_core::Result<PlayerConfig> {
    match path {
        Some(path) => PlayerConfig::load(path),
        None => Ok(PlayerConfig::default()),
    }
}

fn run_tracks(config: Option<&Path>) -> music_player_core::Result<()> {
    let config = load_config(config)?;
    if config.tracks.is_empty() {
        println!("no tracks configured");
        return Ok(());
    }
    for (index, track) in config.tracks.iter().enumerate() {
        println!(
            "#{:02}  {}  ({})",
            index + 1,
            track.display_title(index),
            track.source_uri
        );
    }
    Ok(())
}

struct SimulateOptions {
    frames: u64,
    loudness: f32,
    track_frames: u64,
    seed: Option<u64>,
    realtime: bool,
}

/// Timestamps handed to the visualizer. Realtime runs pace frames against the
/// wall clock; the default virtual clock finishes instantly.
enum FrameClock {
    Virtual(ManualClock),
    Realtime(SystemClock),
}

impl FrameClock {
    fn new(realtime: bool) -> Self {
        if realtime {
            Self::Realtime(SystemClock::start())
        } else {
            Self::Virtual(ManualClock::new())
        }
    }

    fn next_frame(&mut self) -> u64 {
        match self {
            Self::Virtual(clock) => clock.advance(FRAME_MS),
            Self::Realtime(clock) => {
                thread::sleep(Duration::from_millis(FRAME_MS));
                clock.now_ms()
            }
        }
    }

    fn now_ms(&self) -> u64 {
        match self {
            Self::Virtual(clock) => clock.now_ms(),
            Self::Realtime(clock) => clock.now_ms(),
        }
    }
}

fn run_simulate(
    config: Option<&Path>,
    store: Option<&Path>,
    options: SimulateOptions,
) -> music_player_core::Result<()> {
    let config = load_config(config)?;
    let store: Box<dyn PreferenceStore> = match store {
        Some(path) => Box::new(JsonFileStore::open(path)?),
        None => Box::new(MemoryStore::new()),
    };
    tracing::info!(tracks = config.tracks.len(), frames = options.frames, "starting headless session");

    let mut player =
        PlaybackController::new(config, SimulatedMedia::new(), SimulatedAudio::new(), store)?;
    if let Some(seed) = options.seed {
        player = player.with_shuffle_seed(seed);
    }

    let mut surface = RecordingSurface::new(640.0, 160.0, 2.0);
    let mut host = RecordingEffectHost::default();
    let mut clock = FrameClock::new(options.realtime);

    player.on_user_gesture();
    player.select_track(0, true)?;
    player
        .graph_mut()
        .backend_mut()
        .set_amplitude(options.loudness);
    let ready = player.media().ready_event();
    report(player.handle_media_event(ready));

    let mut drawn = 0u64;
    let mut loud_frames = 0u64;
    let mut peak_rms = 0.0f32;
    let mut frames_on_track = 0u64;

    for _ in 0..options.frames {
        let now = clock.next_frame();
        match player.animation_frame(now, &mut surface, &mut host) {
            FrameOutcome::Drawn(frame) => {
                drawn += 1;
                peak_rms = peak_rms.max(frame.rms);
                if frame.effects.any() {
                    loud_frames += 1;
                }
            }
            FrameOutcome::Halted => tracing::warn!("visualizer halted"),
            FrameOutcome::Idle => {}
        }

        frames_on_track += 1;
        match player.status() {
            PlaybackStatus::Playing if frames_on_track >= options.track_frames => {
                let ended = player.media().ended_event();
                report(player.handle_media_event(ended));
                frames_on_track = 0;
            }
            PlaybackStatus::Loading => {
                let ready = player.media().ready_event();
                report(player.handle_media_event(ready));
            }
            _ => {}
        }
    }

    tracing::info!(
        status = ?player.status(),
        track = ?player.active_index(),
        drawn,
        loud_frames,
        peak_rms,
        effects_shown = host.total_shown(),
        effects_visible = host.visible().len(),
        clock_ms = clock.now_ms(),
        "session finished"
    );
    if let Ok(label) = player.now_playing() {
        println!("{label}");
    }
    for row in player.track_list() {
        let marker = if row.active { '>' } else { ' ' };
        println!("{marker} {} {}", row.number, row.title);
    }
    Ok(())
}

fn run_toggle(
    config: Option<&Path>,
    store: &Path,
    key: impl Fn(&music_player_core::StoreKeys) -> String,
    current: impl Fn(&Preferences) -> bool,
) -> music_player_core::Result<()> {
    let config = load_config(config)?;
    let mut store = JsonFileStore::open(store)?;
    let key = key(&config.store_keys);
    let enabled = !current(&Preferences::load(&store, &config.store_keys));
    write_flag(&mut store, &key, enabled)?;
    tracing::info!(%key, enabled, path = ?store.path(), "flag updated");
    println!("{key} = {enabled}");
    Ok(())
}

fn report(outcome: music_player_core::Result<PlaybackStatus>) {
    match outcome {
        Ok(status) => tracing::debug!(?status, "media event handled"),
        Err(err) if err.is_recoverable() => tracing::info!(%err, "player continues degraded"),
        Err(err) => tracing::warn!(%err, "player reported a problem"),
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Headless driver for the portfolio audio player", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the configured playlist.
    Tracks {
        /// JSON configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Run a session against simulated media, audio and canvas backends.
    Simulate {
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Preference store file. Defaults to an in-memory store.
        #[arg(short, long)]
        store: Option<PathBuf>,
        /// Number of animation frames to render.
        #[arg(long, default_value_t = 600)]
        frames: u64,
        /// Peak amplitude of the simulated signal, 0.0 to 1.0.
        #[arg(long, default_value_t = 0.6)]
        loudness: f32,
        /// Frames each track plays before it reports completion.
        #[arg(long, default_value_t = 180)]
        track_frames: u64,
        /// Seed for the shuffle order.
        #[arg(long)]
        seed: Option<u64>,
        /// Pace frames against the wall clock instead of a virtual one.
        #[arg(long)]
        realtime: bool,
    },
    /// Toggle the persisted shuffle flag.
    Shuffle {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long)]
        store: PathBuf,
    },
    /// Toggle the persisted continuous-effects ("trash mode") flag.
    TrashMode {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long)]
        store: PathBuf,
    },
}
