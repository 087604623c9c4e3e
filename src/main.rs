//! Presence Bridge CLI
//!
//! Samples a presence detector, logs every reading and triggers the camera.

use clap::{Parser, Subcommand, ValueEnum};
use presence_bridge::{
    config::Config,
    control::{run_session, CancelToken, ControlLoop, LoopOutcome, TriggerPolicy},
    logging,
    notifier::{build_notifier, listener, DispatchMode, ListenerConfig, TriggerClient},
    recorder::{read_records, CsvRecorder},
    source::{ReplaySource, SampleSource, SimulatedConfig, SimulatedSource},
    stats::{create_shared_stats_with_persistence, load_persisted},
    VERSION,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "presence-bridge")]
#[command(version = VERSION)]
#[command(about = "Presence radar sampling with camera triggering", long_about = None)]
struct Cli {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum SourceKind {
    /// Deterministic simulated detector
    Simulated,
    /// Replay a previously recorded sample log
    Replay,
}

#[derive(Subcommand)]
enum Commands {
    /// Start sampling
    Start {
        /// Where readings come from
        #[arg(long, value_enum, default_value = "simulated")]
        source: SourceKind,

        /// Recorded log to replay (with --source replay)
        #[arg(long)]
        replay: Option<PathBuf>,

        /// Start the replay over when it runs out
        #[arg(long)]
        repeat: bool,

        /// Make the simulated detector fail after this many readings
        #[arg(long)]
        fail_after: Option<u64>,

        /// Polling rate in Hz
        #[arg(long)]
        rate_hz: Option<u32>,

        /// Successful polls per batch before the log is reset
        #[arg(long)]
        batch_size: Option<u32>,

        /// Trigger policy: distance[:meters], score[:value] or detected
        #[arg(long)]
        policy: Option<TriggerPolicy>,

        /// CSV log path
        #[arg(long)]
        log_path: Option<PathBuf>,

        /// Trigger endpoint host
        #[arg(long)]
        host: Option<String>,

        /// Trigger endpoint port
        #[arg(long)]
        port: Option<u16>,

        /// Send triggers from the sampling thread instead of a worker
        #[arg(long)]
        inline: bool,
    },

    /// Run a trigger listener that acknowledges camera triggers
    Listen {
        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,

        /// Reply sent for every trigger
        #[arg(long, default_value = "ok")]
        ack: String,
    },

    /// Send a single trigger and print the reply
    Trigger {
        /// Trigger endpoint port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Delete the sample log
    Reset {
        /// CSV log path
        #[arg(long)]
        log_path: Option<PathBuf>,
    },

    /// Show the log and last session statistics
    Status,

    /// Show configuration
    Config {
        /// Write the effective configuration to the config file
        #[arg(long)]
        save: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let code = match cli.command {
        Commands::Start {
            source,
            replay,
            repeat,
            fail_after,
            rate_hz,
            batch_size,
            policy,
            log_path,
            host,
            port,
            inline,
        } => {
            let mut config = load_config();
            if let Some(rate) = rate_hz {
                config.update_rate_hz = rate;
            }
            if let Some(size) = batch_size {
                config.batch_size = size;
            }
            if let Some(policy) = policy {
                config.trigger_policy = policy;
            }
            if let Some(path) = log_path {
                config.log_path = path;
            }
            if let Some(host) = host {
                config.notifier.host = host;
            }
            if let Some(port) = port {
                config.notifier.port = port;
            }
            if inline {
                config.dispatch = DispatchMode::Inline;
            }

            let source: Box<dyn SampleSource> = match source {
                SourceKind::Simulated => Box::new(SimulatedSource::new(SimulatedConfig {
                    fail_after,
                    ..SimulatedConfig::default()
                })),
                SourceKind::Replay => match replay {
                    Some(path) => Box::new(ReplaySource::new(path).repeat(repeat)),
                    None => {
                        eprintln!("Error: --source replay requires --replay <PATH>");
                        std::process::exit(2);
                    }
                },
            };

            cmd_start(config, source)
        }
        Commands::Listen { port, ack } => cmd_listen(port, ack),
        Commands::Trigger { port } => cmd_trigger(port),
        Commands::Reset { log_path } => cmd_reset(log_path),
        Commands::Status => cmd_status(),
        Commands::Config { save } => cmd_config(save),
    };

    std::process::exit(code);
}

fn load_config() -> Config {
    match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Could not load config, using defaults: {e}");
            Config::default()
        }
    }
}

fn cmd_start(config: Config, mut source: Box<dyn SampleSource>) -> i32 {
    println!("Presence Bridge v{VERSION}");
    println!();

    if let Err(e) = config.validate() {
        eprintln!("Error: {e}");
        return 1;
    }
    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }

    println!("Starting sampling...");
    println!("  Source: {}", source.describe());
    println!("  Rate: {} Hz", config.update_rate_hz);
    println!("  Batch size: {}", config.batch_size);
    println!("  Log: {}", config.log_path.display());
    println!("  Trigger policy: {}", config.trigger_policy);
    println!("  Trigger endpoint: {}", config.notifier.endpoint());
    match config.dispatch {
        DispatchMode::Inline => println!("  Dispatch: inline"),
        DispatchMode::Background { queue_capacity } => {
            println!("  Dispatch: background (queue: {queue_capacity})")
        }
    }
    if matches!(config.trigger_policy, TriggerPolicy::DistanceAbove { meters } if meters == 0.0)
    {
        tracing::info!(
            "Triggering on any measured distance; use --policy score:1.1 for the score cut-off"
        );
    }
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let stats = create_shared_stats_with_persistence(config.stats_path());
    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_token.cancel()) {
        eprintln!("Warning: Could not install Ctrl+C handler: {e}");
    }

    let notifier = match build_notifier(config.notifier.clone(), config.dispatch, stats.clone()) {
        Ok(notifier) => notifier,
        Err(e) => {
            eprintln!("Error starting trigger dispatcher: {e}");
            return 1;
        }
    };

    let control = ControlLoop::new(
        config.loop_config(),
        CsvRecorder::new(&config.log_path),
        stats.clone(),
        cancel,
    );

    let result = run_session(source.as_mut(), &control, notifier.as_ref());

    // Let an in-flight trigger finish before the final statistics are taken;
    // anything still queued is discarded.
    drop(notifier);

    if let Err(e) = stats.save() {
        eprintln!("Warning: Could not save session statistics: {e}");
    }

    println!();
    println!("{}", stats.summary());

    match result {
        Ok(outcome) if outcome.is_success() => {
            println!("Application finished OK");
            0
        }
        Ok(LoopOutcome::Cancelled { .. }) => {
            eprintln!("Session stopped before any sample was taken");
            1
        }
        Ok(LoopOutcome::PollFailed { error, .. }) => {
            eprintln!("Session ended: {error}");
            1
        }
        Err(e) => {
            eprintln!("Error: {e}");
            1
        }
    }
}

fn cmd_listen(port: Option<u16>, ack: String) -> i32 {
    let config = load_config();
    let listener_config = ListenerConfig {
        host: config.notifier.host.clone(),
        port: port.unwrap_or(config.notifier.port),
        token: config.notifier.token.clone(),
        ack,
        ..ListenerConfig::default()
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error creating runtime: {e}");
            return 1;
        }
    };

    let result = runtime.block_on(async move {
        let handle = listener::run(listener_config).await?;
        println!("Listening for triggers on {}", handle.local_addr());
        println!("Press Ctrl+C to stop");

        tokio::signal::ctrl_c().await?;

        let received = handle.triggers_received();
        let rejected = handle.payloads_rejected();
        handle.shutdown().await;
        anyhow::Ok((received, rejected))
    });

    match result {
        Ok((received, rejected)) => {
            println!();
            println!("Triggers received: {received}");
            println!("Payloads rejected: {rejected}");
            0
        }
        Err(e) => {
            eprintln!("Error: {e:#}");
            1
        }
    }
}

fn cmd_trigger(port: Option<u16>) -> i32 {
    let mut config = load_config().notifier;
    if let Some(port) = port {
        config.port = port;
    }

    let endpoint = config.endpoint();
    match TriggerClient::new(config).send_trigger() {
        Ok(reply) if reply.bytes == 0 => {
            println!("Trigger sent to {endpoint}; no data received from the server.");
            0
        }
        Ok(reply) => {
            println!("Trigger sent to {endpoint}; reply: {}", reply.body);
            0
        }
        Err(e) => {
            eprintln!("Error: {e}");
            1
        }
    }
}

fn cmd_reset(log_path: Option<PathBuf>) -> i32 {
    let path = log_path.unwrap_or_else(|| load_config().log_path);
    match CsvRecorder::new(&path).reset() {
        Ok(()) => {
            println!("Log {} reset.", path.display());
            0
        }
        Err(e) => {
            eprintln!("Error: {e}");
            1
        }
    }
}

fn cmd_status() -> i32 {
    let config = load_config();

    println!("Presence Bridge Status");
    println!("======================");
    println!();

    println!("Configuration:");
    println!("  Rate: {} Hz", config.update_rate_hz);
    println!("  Batch size: {}", config.batch_size);
    println!("  Trigger policy: {}", config.trigger_policy);
    println!("  Trigger endpoint: {}", config.notifier.endpoint());
    println!();

    println!("Log: {}", config.log_path.display());
    if config.log_path.exists() {
        match read_records(&config.log_path) {
            Ok(records) => {
                println!("  Rows in current batch: {}", records.len());
                if let Some(last) = records.last() {
                    println!(
                        "  Last row: score {:.3}, distance {:.3}",
                        last.score(),
                        last.distance()
                    );
                }
            }
            Err(e) => println!("  Unreadable: {e}"),
        }
    } else {
        println!("  No rows recorded since the last reset.");
    }
    println!();

    match load_persisted(&config.stats_path()) {
        Ok(Some(persisted)) => {
            let stats = persisted.stats;
            println!(
                "Last Session ({}, updated {}):",
                stats.session_id,
                persisted.last_updated.format("%Y-%m-%d %H:%M:%S")
            );
            println!("  Samples polled: {}", stats.samples_polled);
            println!(
                "  Rows appended: {} ({} skipped)",
                stats.records_appended, stats.records_skipped
            );
            println!("  Batches completed: {}", stats.batches_completed);
            println!(
                "  Triggers: {} attempted, {} delivered, {} failed, {} dropped",
                stats.triggers_attempted,
                stats.triggers_delivered,
                stats.triggers_failed,
                stats.triggers_dropped
            );
        }
        Ok(None) => println!("No previous session data found."),
        Err(e) => println!("Could not read session data: {e}"),
    }

    0
}

fn cmd_config(save: bool) -> i32 {
    let config = load_config();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).unwrap_or_else(|_| "Error".to_string())
    );

    if save {
        if let Err(e) = config.save() {
            eprintln!("Error saving config: {e}");
            return 1;
        }
        println!();
        println!("Saved.");
    }
    0
}
