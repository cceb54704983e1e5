//! Sensorium Agent CLI
//!
//! Privacy-filtered sensor readings behind named methods.

use clap::{Parser, Subcommand};
use sensorium_agent::{
    config::Config,
    core::{anonymize_salted, ChannelListener, SensorContext, SensorRegistry, SharedListener},
    preferences::{BundleOutcome, Preferences},
    sensors,
    transparency::{create_shared_log_with_capacity, DebugSink},
    PRIVACY_DECLARATION, VERSION,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[cfg(feature = "campaign")]
use sensorium_agent::{BlockingCampaignLoader, CampaignConfig};

#[derive(Parser)]
#[command(name = "sensorium")]
#[command(version = VERSION)]
#[command(about = "Privacy-filtered sensor readings behind named methods", long_about = None)]
struct Cli {
    /// Print the in-memory debug log before exiting
    #[arg(long, global = true)]
    debug_log: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show sensors and their state
    Status,

    /// Switch a sensor on (persisted)
    Enable {
        /// Sensor short name, e.g. WifiConnectionSensor
        sensor: String,
    },

    /// Switch a sensor off (persisted)
    Disable {
        /// Sensor short name
        sensor: String,
    },

    /// List callable methods of enabled sensors
    Methods,

    /// Describe every enabled method with this name
    Signature {
        /// Unqualified method name, e.g. rssi
        method: String,
    },

    /// Call a method and print its privacy-filtered value
    Call {
        /// Qualified name, e.g. WifiConnectionSensor.rssi
        name: String,
    },

    /// Re-sample enabled sensors until Ctrl+C
    Watch {
        /// Seconds between samples
        #[arg(long, default_value = "5")]
        interval: u64,

        /// Mirror the debug log to stderr as lines are written
        #[arg(long)]
        echo_log: bool,
    },

    /// Read and write preferences
    Prefs {
        #[command(subcommand)]
        action: PrefsCommand,
    },

    /// Display privacy declaration
    Privacy,

    /// Show configuration
    Config,
}

#[derive(Subcommand)]
enum PrefsCommand {
    /// Print a stored preference
    Get { key: String },

    /// Store a preference; "true"/"false" and integers are typed accordingly
    Set { key: String, value: String },

    /// Apply a bundled preferences file if it is newer
    LoadDefaults {
        /// Bundle path (defaults to `default_preferences` from the config)
        path: Option<PathBuf>,
    },

    /// Fetch a campaign bundle and apply it if it is newer
    Fetch {
        /// Bundle URL (defaults to `campaign_url` from the config)
        url: Option<String>,
    },
}

/// Everything a command needs: configuration plus the live registry.
struct Agent {
    config: Config,
    registry: SensorRegistry,
}

impl Agent {
    fn prefs(&self) -> &Preferences {
        self.registry.context().prefs()
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut agent = match open_agent() {
        Ok(agent) => agent,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Commands::Status => cmd_status(&agent),
        Commands::Enable { sensor } => cmd_set_state(&mut agent, &sensor, true),
        Commands::Disable { sensor } => cmd_set_state(&mut agent, &sensor, false),
        Commands::Methods => cmd_methods(&agent),
        Commands::Signature { method } => cmd_signature(&agent, &method),
        Commands::Call { name } => cmd_call(&agent, &name),
        Commands::Watch { interval, echo_log } => cmd_watch(&mut agent, interval, echo_log),
        Commands::Prefs { action } => cmd_prefs(&agent, action),
        Commands::Privacy => cmd_privacy(&agent),
        Commands::Config => cmd_config(&agent),
    };

    if cli.debug_log {
        println!();
        println!("Debug log (newest first)");
        println!("========================");
        println!("{}", agent.registry.debug_log().render());
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Load config and preferences, register sensors, restore persisted state.
fn open_agent() -> Result<Agent, String> {
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Warning: Could not load config, using defaults: {e}");
        Config::default()
    });
    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }

    let prefs = Preferences::open(&config.preferences_file)
        .map_err(|e| format!("opening {:?}: {e}", config.preferences_file))?;

    if let Some(path) = &config.default_preferences {
        if let Err(e) = prefs.load_default_preferences(path) {
            eprintln!("Warning: Could not apply default preferences {path:?}: {e}");
        }
    }

    let log = create_shared_log_with_capacity(config.debug_log_lines);
    let mut registry = SensorRegistry::new(SensorContext::new(prefs, log));
    sensors::register_builtin(&mut registry, &config);

    let report = registry.startup();
    for (sensor, e) in &report.failed {
        eprintln!("Warning: {sensor} could not be re-enabled: {e}");
    }

    Ok(Agent { config, registry })
}

fn cmd_status(agent: &Agent) -> Result<(), String> {
    let prefs = agent.prefs();

    println!("Sensorium Agent Status");
    println!("======================");
    println!();
    println!("Preferences: {:?}", agent.config.preferences_file);
    println!("  Version: {}", prefs.stored_version());
    println!(
        "  Autostart: {}",
        if prefs.sensor_autostart() {
            "enabled"
        } else {
            "disabled"
        }
    );
    println!();

    println!("Sensors:");
    for sensor in agent.registry.sensors() {
        println!(
            "  {:<24} {:<9} privacy={:<8} {}",
            sensor.short_name(),
            if sensor.is_enabled() { "enabled" } else { "disabled" },
            sensor.privacy_level(),
            sensor.description()
        );
    }
    Ok(())
}

fn cmd_set_state(agent: &mut Agent, name: &str, enabled: bool) -> Result<(), String> {
    let available = sensor_names(&agent.registry);
    let sensor = agent
        .registry
        .sensor_mut(name)
        .ok_or_else(|| format!("Unknown sensor '{name}' (available: {available})"))?;

    sensor.set_state(enabled).map_err(|e| e.to_string())?;
    println!(
        "{} {}",
        if enabled { "Enabled" } else { "Disabled" },
        sensor.short_name()
    );
    Ok(())
}

fn cmd_methods(agent: &Agent) -> Result<(), String> {
    let methods = agent.registry.list_exposed_methods();
    if methods.is_empty() {
        println!("No sensors enabled.");
        println!("Run 'sensorium enable <sensor>' first.");
        return Ok(());
    }
    for method in methods {
        println!("{method}");
    }
    Ok(())
}

fn cmd_signature(agent: &Agent, method: &str) -> Result<(), String> {
    let signature = agent
        .registry
        .describe_method_signature(method)
        .ok_or_else(|| format!("No enabled sensor exposes '{method}'"))?;

    // Every exposed method takes no arguments, so each entry is
    // [qualified name, return tag, "nil"].
    for entry in signature.chunks(3) {
        println!("{}", entry.join(" "));
    }
    Ok(())
}

fn cmd_call(agent: &Agent, name: &str) -> Result<(), String> {
    let value = agent.registry.call_method(name).map_err(|e| e.to_string())?;
    println!("{value}");
    Ok(())
}

/// Console mirror for the debug log.
struct StderrSink;

impl DebugSink for StderrSink {
    fn show(&self, line: &str) {
        eprintln!("{line}");
    }
}

fn cmd_watch(agent: &mut Agent, interval: u64, echo_log: bool) -> Result<(), String> {
    let interval = Duration::from_secs(interval.max(1));

    let sink: Arc<dyn DebugSink> = Arc::new(StderrSink);
    if echo_log {
        agent.registry.debug_log().set_sink(&sink);
    }

    let (listener, receiver) = ChannelListener::new(1_000);
    let listener: SharedListener = listener;
    for sensor in agent.registry.sensors_mut() {
        sensor.add_listener(listener.clone());
    }

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone())?;

    println!("Watching {} every {}s", sensor_names(&agent.registry), interval.as_secs());
    println!("Press Ctrl+C to stop");
    println!();

    let salt = agent.prefs().privacy_salt();
    let mut last_refresh: Option<Instant> = None;

    while running.load(Ordering::SeqCst) {
        if last_refresh.map_or(true, |t| t.elapsed() >= interval) {
            for (sensor, e) in agent.registry.refresh_enabled() {
                eprintln!("Warning: {sensor}: {e}");
            }
            last_refresh = Some(Instant::now());
        }

        match receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(update) => {
                let level = agent
                    .registry
                    .sensor(&update.sensor)
                    .map(|s| s.privacy_level())
                    .unwrap_or_default();
                let shown: Vec<String> = update
                    .values
                    .iter()
                    .map(|v| anonymize_salted(v, level, &salt).to_string())
                    .collect();
                println!(
                    "[{}] {}: {}",
                    update.received_at.format("%H:%M:%S"),
                    update.sensor,
                    shown.join("; ")
                );
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        }
    }

    for sensor in agent.registry.sensors_mut() {
        sensor.remove_listener(&listener);
    }
    agent.registry.debug_log().clear_sink();
    println!();
    println!("Stopped.");
    Ok(())
}

fn cmd_prefs(agent: &Agent, action: PrefsCommand) -> Result<(), String> {
    let prefs = agent.prefs();
    match action {
        PrefsCommand::Get { key } => {
            match prefs.store().get(&key) {
                Some(value) => println!("{value}"),
                None => println!("(unset)"),
            }
            Ok(())
        }
        PrefsCommand::Set { key, value } => {
            prefs.put_preference(&key, &value).map_err(|e| e.to_string())?;
            println!("{key} = {}", prefs.store().get(&key).map(|v| v.to_string()).unwrap_or_default());
            Ok(())
        }
        PrefsCommand::LoadDefaults { path } => {
            let path = path
                .or_else(|| agent.config.default_preferences.clone())
                .ok_or("No bundle path given and no default_preferences configured")?;
            let outcome = prefs
                .load_default_preferences(&path)
                .map_err(|e| e.to_string())?;
            print_outcome(&outcome);
            Ok(())
        }
        PrefsCommand::Fetch { url } => {
            let url = url
                .or_else(|| agent.config.campaign_url.clone())
                .ok_or("No URL given and no campaign_url configured")?;
            fetch_campaign(agent, &url)
        }
    }
}

#[cfg(feature = "campaign")]
fn fetch_campaign(agent: &Agent, url: &str) -> Result<(), String> {
    let config = CampaignConfig::new(url).with_connect_timeout(agent.config.fetch_connect_timeout);
    let loader = BlockingCampaignLoader::new(config).map_err(|e| e.to_string())?;
    let outcome = loader.load(agent.prefs()).map_err(|e| e.to_string())?;
    print_outcome(&outcome);
    Ok(())
}

#[cfg(not(feature = "campaign"))]
fn fetch_campaign(_agent: &Agent, _url: &str) -> Result<(), String> {
    Err("campaign support not enabled at compile time".to_string())
}

fn print_outcome(outcome: &BundleOutcome) {
    match outcome {
        BundleOutcome::Applied { version, keys } => {
            println!("Applied preferences v{version} ({keys} keys)");
        }
        BundleOutcome::Stale { offered, stored } => {
            println!("Preferences v{offered} are not newer than v{stored}; nothing changed");
        }
    }
}

fn cmd_privacy(agent: &Agent) -> Result<(), String> {
    println!("{PRIVACY_DECLARATION}");
    println!("Current levels:");
    for sensor in agent.registry.sensors() {
        println!("  {:<24} {}", sensor.short_name(), sensor.privacy_level());
    }
    Ok(())
}

fn cmd_config(agent: &Agent) -> Result<(), String> {
    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    let json = serde_json::to_string_pretty(&agent.config).map_err(|e| e.to_string())?;
    println!("{json}");
    Ok(())
}

fn sensor_names(registry: &SensorRegistry) -> String {
    registry
        .sensors()
        .iter()
        .map(|s| s.short_name())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) -> Result<(), String> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|e| format!("Error setting Ctrl+C handler: {e}"))
}
