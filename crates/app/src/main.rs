use std::f32::consts::TAU;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use projectm_bridge_core::{
    default_search_paths, DegradationTier, ProjectMBinding, TracingObserver,
};
use tracing_subscriber::EnvFilter;

mod settings;

use settings::HostSettings;

const SAMPLE_RATE: u32 = 44_100;
const CHANNELS: usize = 2;

fn main() -> projectm_bridge_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Probe { config, library } => run_probe(load(config, &library)?),
        Commands::Run {
            config,
            library,
            frames,
            preset_every,
        } => run_frames(load(config, &library)?, frames, preset_every),
        Commands::Paths => {
            for path in default_search_paths() {
                println!("{}", path.display());
            }
            Ok(())
        }
    }
}

fn load(config: Option<PathBuf>, library: &[PathBuf]) -> projectm_bridge_core::Result<HostSettings> {
    let mut settings = HostSettings::load(config.as_deref())?;
    settings.prepend_paths(library);
    Ok(settings)
}

fn open(settings: &HostSettings) -> projectm_bridge_core::Result<ProjectMBinding> {
    ProjectMBinding::open(
        settings.search_paths.as_slice(),
        settings.candidates.clone(),
        Box::new(TracingObserver),
    )
    .inspect_err(|err| {
        tracing::error!(tier = ?DegradationTier::Unavailable, %err, "cannot bind projectM");
    })
}

fn run_probe(settings: HostSettings) -> projectm_bridge_core::Result<()> {
    let mut binding = open(&settings)?;
    let state = binding.init(settings.visual);

    if let Some(library) = binding.library() {
        println!("library: {}", library.path().display());
    }
    println!("state:   {state:?}");
    for (operation, entry) in binding.symbols().entries() {
        println!("  {operation:<12} {}", entry.symbol().unwrap_or("-"));
    }
    if let Some((x, y)) = binding.mesh_size() {
        println!("mesh:    {x}x{y}");
    }

    binding.uninitialize();
    Ok(())
}

fn run_frames(
    settings: HostSettings,
    frames: u32,
    preset_every: u32,
) -> projectm_bridge_core::Result<()> {
    let mut binding = open(&settings)?;
    binding.init(settings.visual);
    binding.set_window_size(settings.visual.width, settings.visual.height);
    binding.display_initial_preset();

    let fps = settings.visual.fps.max(1);
    let frame_budget = Duration::from_secs_f64(1.0 / f64::from(fps));
    let mut tone = Tone::new(220.0);
    let block = (SAMPLE_RATE / fps) as usize;

    tracing::info!(frames, fps, tier = ?binding.tier(), "starting frame loop");
    for frame in 0..frames {
        let started = Instant::now();

        binding.add_samples(&tone.next_block(block), CHANNELS);
        binding.render_frame();
        if preset_every > 0 && frame > 0 && frame % preset_every == 0 && !binding.preset_locked() {
            binding.next_preset();
        }

        if let Some(rest) = frame_budget.checked_sub(started.elapsed()) {
            std::thread::sleep(rest);
        }
    }

    tracing::info!(tier = ?binding.tier(), "frame loop finished");
    binding.uninitialize();
    Ok(())
}

/// Interleaved stereo sine used to exercise the sample feed.
struct Tone {
    phase: f32,
    step: f32,
}

impl Tone {
    fn new(frequency: f32) -> Self {
        Self {
            phase: 0.0,
            step: TAU * frequency / SAMPLE_RATE as f32,
        }
    }

    fn next_block(&mut self, frames: usize) -> Vec<f32> {
        let mut out = Vec::with_capacity(frames * CHANNELS);
        for _ in 0..frames {
            let value = self.phase.sin() * 0.5;
            out.extend(std::iter::repeat(value).take(CHANNELS));
            self.phase = (self.phase + self.step) % TAU;
        }
        out
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
#[command(author, version, about = "Runtime host for the projectM native library", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load the library, run init and report which symbols resolved.
    Probe {
        /// JSON settings file.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Library path tried before the configured search list.
        #[arg(short, long)]
        library: Vec<PathBuf>,
    },
    /// Drive the render loop for a fixed number of frames.
    Run {
        /// JSON settings file.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Library path tried before the configured search list.
        #[arg(short, long)]
        library: Vec<PathBuf>,
        /// Number of frames to render.
        #[arg(short, long, default_value_t = 600)]
        frames: u32,
        /// Advance to the next preset every N frames (0 disables).
        #[arg(long, default_value_t = 300)]
        preset_every: u32,
    },
    /// Print the default library search paths for this platform.
    Paths,
}
