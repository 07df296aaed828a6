use clap::{Parser, Subcommand};
use color_eyre::Result;
use playable::controller::{ControllerForwarder, LoggingController};
use playable::gesture::{RaiseStrategy, ReplaySource};
use playable::persistence::{ConfigStore, Settings};
use playable::pipe::{ensure_fifo, FifoConnector, FifoSource, PipeConsumer, PipeProducer};
use playable::sensor::{SensorEngine, SensorError, SensorHandle};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "playable", version, about = "Gesture controller relay over a named pipe")]
struct Cli {
    /// Named pipe path, overrides the settings file
    #[arg(long, global = true)]
    pipe: Option<PathBuf>,

    /// Gesture configuration (JSON), overrides the settings file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Runtime settings file (TOML)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify recorded landmarks and write button events to the pipe
    Sense {
        /// JSON-lines landmark recording
        #[arg(long)]
        replay: PathBuf,

        /// position_or_motion | motion_and_position
        #[arg(long)]
        raise_strategy: Option<RaiseStrategy>,
    },
    /// Read the pipe and forward events to the controller
    Relay,
    /// Show or edit the gesture configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
    /// Create the named pipe
    Mkfifo,
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    Show,
    /// Map a gesture to a button
    Map { gesture: String, button: String },
    /// Remove a gesture mapping
    Unmap { gesture: String },
    /// Update the detection thresholds
    Thresholds {
        #[arg(long, allow_negative_numbers = true)]
        delta: Option<f32>,
        #[arg(long, allow_negative_numbers = true)]
        raise_min: Option<f32>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;
    let cli = Cli::parse();

    let settings_path = cli.settings.clone().unwrap_or_else(Settings::default_path);
    let mut settings = Settings::load(&settings_path).await?;
    if let Some(pipe) = cli.pipe {
        settings.pipe.path = pipe;
    }
    if let Some(config) = cli.config {
        settings.gesture_config = config;
    }

    match cli.command {
        Command::Sense {
            replay,
            raise_strategy,
        } => sense(&settings, replay, raise_strategy).await,
        Command::Relay => relay(&settings).await,
        Command::Config { action } => config(&settings, action).await,
        Command::Mkfifo => {
            ensure_fifo(&settings.pipe.path)?;
            Ok(())
        }
    }
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}

fn stop_on_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received, shutting down");
                cancel.cancel();
            }
            Err(e) => error!("Unable to listen for Ctrl-C: {}", e),
        }
    });
}

async fn sense(
    settings: &Settings,
    replay: PathBuf,
    raise_strategy: Option<RaiseStrategy>,
) -> Result<()> {
    let strategy = raise_strategy
        .or(settings.sensor.raise_strategy)
        .ok_or(SensorError::NoRaiseStrategy)?;

    ensure_fifo(&settings.pipe.path)?;
    let store = ConfigStore::load(&settings.gesture_config).await?;
    let source = ReplaySource::open(&replay).await.map_err(|source| SensorError::Source {
        path: replay.clone(),
        source,
    })?;

    let producer = PipeProducer::new(
        Box::new(FifoConnector::new(&settings.pipe.path)),
        Some(settings.producer()),
    );
    let engine = SensorEngine::create(
        Box::new(source),
        producer,
        strategy,
        store.subscribe(),
        &settings.engine(),
    );

    let cancel = CancellationToken::new();
    stop_on_ctrl_c(cancel.clone());
    let report = SensorHandle::spawn(engine, cancel).join().await?;

    info!(
        "Sensor finished: {} frames, {} events sent, {} dropped, {} reconnects",
        report.frames, report.events_sent, report.events_dropped, report.reconnects
    );
    Ok(())
}

async fn relay(settings: &Settings) -> Result<()> {
    ensure_fifo(&settings.pipe.path)?;

    let forwarder = ControllerForwarder::new(
        Box::new(LoggingController::new()),
        Some(settings.forwarder()),
    );
    let mut consumer = PipeConsumer::new(
        Box::new(FifoSource::new(&settings.pipe.path)),
        forwarder,
        Some(settings.consumer()),
    );

    let cancel = CancellationToken::new();
    stop_on_ctrl_c(cancel.clone());
    let stats = consumer.run(cancel).await;

    info!(
        "Relay finished: {} forwarded, {} failed, {} discarded, {} resyncs",
        stats.forwarded, stats.forward_failures, stats.discarded, stats.resyncs
    );
    Ok(())
}

async fn config(settings: &Settings, action: ConfigCommand) -> Result<()> {
    let mut store = ConfigStore::load(&settings.gesture_config).await?;

    match action {
        ConfigCommand::Show => {}
        ConfigCommand::Map { gesture, button } => store.add_mapping(&gesture, &button).await?,
        ConfigCommand::Unmap { gesture } => {
            store.remove_mapping(&gesture).await?;
        }
        ConfigCommand::Thresholds { delta, raise_min } => {
            store.update_thresholds(delta, raise_min).await?;
        }
    }

    let thresholds = store.thresholds();
    println!("{}", store.path().display());
    println!(
        "  delta_threshold = {}\n  raise_minimum   = {}",
        thresholds.delta_threshold, thresholds.raise_minimum
    );
    for (gesture, button) in store.mappings().iter() {
        println!("  {:<18} -> {}", gesture.as_str(), button);
    }
    Ok(())
}
