use std::path::{Path, PathBuf};

use avatar_lipsync_core::{
    AvatarScene, EngineConfig, LipSyncEngine, LipSyncError, LoopbackTransport, SequenceGenerator,
    Transition, VisemeId,
};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

fn main() -> avatar_lipsync_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Timeline {
            text,
            seed,
            deterministic,
        } => run_timeline(config, &text, seed, deterministic),
        Commands::Simulate {
            text,
            fps,
            seed,
            start_delay_ms,
            tail_ms,
        } => run_simulate(config, &text, seed, fps, start_delay_ms, tail_ms),
    }
}

fn load_config(path: Option<&Path>) -> avatar_lipsync_core::Result<EngineConfig> {
    match path {
        Some(path) => {
            tracing::info!(?path, "loading engine configuration");
            EngineConfig::from_json_file(path)
        }
        None => Ok(EngineConfig::default()),
    }
}

fn run_timeline(
    mut config: EngineConfig,
    text: &str,
    seed: Option<u64>,
    deterministic: bool,
) -> avatar_lipsync_core::Result<()> {
    config.generation.seed = seed.or(config.generation.seed);
    config.generation.deterministic |= deterministic;

    let timeline = SequenceGenerator::new(config.generation).generate(text);
    tracing::info!(
        events = timeline.len(),
        duration_ms = timeline.duration_ms(),
        "generated timeline"
    );
    println!("{}", to_json(&timeline)?);
    Ok(())
}

fn run_simulate(
    mut config: EngineConfig,
    text: &str,
    seed: Option<u64>,
    fps: u32,
    start_delay_ms: u64,
    tail_ms: u64,
) -> avatar_lipsync_core::Result<()> {
    config.generation.seed = seed.or(config.generation.seed);
    let frame_ms = (1_000 / u64::from(fps.max(1))).max(1);

    let mut engine = LipSyncEngine::new(config, LoopbackTransport::new());
    let mut scene = AvatarScene::ready_player_me();

    let token = match engine.speak(text, 0) {
        Transition::Armed { token, .. } => token,
        other => {
            return Err(LipSyncError::msg(format!(
                "speak request was not accepted: {other:?}"
            )))
        }
    };
    let speech_ms = engine.timeline_snapshot().duration_ms();
    let end_at = start_delay_ms.saturating_add(speech_ms);
    let stop_at = end_at.saturating_add(tail_ms);
    tracing::info!(%token, fps, speech_ms, "simulating playback");

    let mut started = false;
    let mut ended = false;
    let mut last_viseme = VisemeId::Sil;
    let mut frames = 0_u64;
    let mut now = 0_u64;

    while now <= stop_at {
        if !started && now >= start_delay_ms {
            engine.playback_started(token, now);
            started = true;
        }
        if !ended && now >= end_at {
            engine.playback_ended(token, now);
            ended = true;
        }

        let active = engine.on_frame(now, &mut scene);
        if active.viseme != last_viseme {
            tracing::info!(
                now_ms = now,
                viseme = %active.viseme,
                intensity = active.intensity,
                "viseme change"
            );
            last_viseme = active.viseme;
        }

        frames += 1;
        match now.checked_add(frame_ms) {
            Some(next) => now = next,
            None => break,
        }
    }

    for notice in engine.drain_notices() {
        tracing::info!(?notice, "session notice");
    }

    let summary = serde_json::json!({
        "token": token,
        "frames": frames,
        "speech_ms": speech_ms,
        "state": engine.state(),
        "meshes": scene.meshes(),
    });
    println!("{}", to_json(&summary)?);
    Ok(())
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> avatar_lipsync_core::Result<String> {
    serde_json::to_string_pretty(value)
        .map_err(|err| LipSyncError::msg(format!("failed to encode output: {err}")))
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Text-driven lip-sync for talking avatars", long_about = None)]
struct Cli {
    /// JSON engine configuration; defaults are used when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the viseme timeline generated for a piece of text.
    Timeline {
        /// Text to convert.
        text: String,
        /// Seed for intensity jitter.
        #[arg(long)]
        seed: Option<u64>,
        /// Disable intensity jitter.
        #[arg(long)]
        deterministic: bool,
    },
    /// Drive the engine frame by frame against an in-memory avatar.
    Simulate {
        /// Text to speak.
        text: String,
        /// Render frames per second.
        #[arg(long, default_value_t = 60)]
        fps: u32,
        /// Seed for intensity jitter.
        #[arg(long)]
        seed: Option<u64>,
        /// Delay between the speak request and the audio start signal.
        #[arg(long, default_value_t = 0)]
        start_delay_ms: u64,
        /// Idle time simulated after speech ends.
        #[arg(long, default_value_t = 500)]
        tail_ms: u64,
    },
}
