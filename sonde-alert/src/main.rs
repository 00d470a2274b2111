//! sonde-alert: watch for radiosondes landing near a Home Assistant person.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use comfy_table::{Cell, Table};
use tokio::sync::watch;
use tracing::{error, info, warn};

use sonde_core::alert::deep_link;
use sonde_core::config::{
    HubConfig, MonitorConfig, DEFAULT_EVENT_TYPE, DEFAULT_NOTIFY_TARGET, DEFAULT_SONDEHUB_URL,
};
use sonde_core::dedup::DedupStore;
use sonde_core::types::Result;

mod cycle;
mod http;
mod hub;
mod scheduler;
mod sondehub;
mod source;
#[cfg(test)]
mod testutil;

use cycle::CycleController;
use hub::HubClient;
use scheduler::{CycleOutcome, Scheduler};
use sondehub::SondehubClient;

#[derive(Parser)]
#[command(
    name = "sonde-alert",
    version,
    about = "Alert when a radiosonde lands near a tracked person"
)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll SondeHub and alert through Home Assistant
    Run {
        #[command(flatten)]
        args: RunArgs,

        /// Run a single cycle and exit
        #[arg(long)]
        once: bool,
    },

    /// List sondes already alerted on
    List {
        /// Path to the notified file
        #[arg(long, env = "SONDE_NOTIFIED_FILE")]
        notified_file: PathBuf,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Home Assistant base URL, e.g. http://homeassistant.local:8123
    #[arg(long, env = "HA_URL")]
    ha_url: String,

    /// Home Assistant long-lived access token
    #[arg(long, env = "HA_TOKEN", hide_env_values = true)]
    ha_token: String,

    /// Person entity to track (e.g. person.trick)
    #[arg(long, env = "SONDE_PERSON")]
    person: String,

    /// Path to the notified file (e.g. notified_trick.json)
    #[arg(long, env = "SONDE_NOTIFIED_FILE")]
    notified_file: PathBuf,

    /// Search radius in kilometers
    #[arg(long, env = "DISTANCE_KM")]
    distance_km: f64,

    /// Seconds between cycles
    #[arg(long, env = "SONDE_INTERVAL_SECS", default_value = "600")]
    interval_secs: u64,

    /// Maximum random delay added to each interval, in seconds
    #[arg(long, env = "SONDE_JITTER_SECS", default_value = "0")]
    jitter_secs: u64,

    /// Per-request HTTP timeout in seconds
    #[arg(long, env = "SONDE_TIMEOUT_SECS", default_value = "30")]
    timeout_secs: u64,

    /// SondeHub API base URL
    #[arg(long, env = "SONDEHUB_URL", default_value = DEFAULT_SONDEHUB_URL)]
    sondehub_url: String,

    /// Alert target: script.<name> or notify.<service>
    #[arg(long, env = "SONDE_NOTIFY_TARGET", default_value = DEFAULT_NOTIFY_TARGET)]
    notify_target: String,

    /// Home Assistant event type fired for each alert
    #[arg(long, env = "SONDE_EVENT_TYPE", default_value = DEFAULT_EVENT_TYPE)]
    event_type: String,
}

impl RunArgs {
    fn into_config(self) -> Result<MonitorConfig> {
        let config = MonitorConfig {
            hub: HubConfig {
                base_url: self.ha_url,
                token: self.ha_token,
                notify_target: self.notify_target.parse()?,
                event_type: self.event_type,
            },
            sondehub_url: self.sondehub_url,
            entity_id: self.person,
            radius_km: self.distance_km,
            notified_file: self.notified_file,
            interval: Duration::from_secs(self.interval_secs),
            max_jitter: Duration::from_secs(self.jitter_secs),
            request_timeout: Duration::from_secs(self.timeout_secs),
        };
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() {
    // Before parsing, so env-backed flags see values from the file
    let env_file = load_env_file(Path::new(".env"));
    let cli = Cli::parse();
    init_logging(cli.log_json);
    if let Err(e) = env_file {
        warn!(error = %e, "could not load .env");
    }

    match cli.command {
        Commands::Run { args, once } => {
            let config = args.into_config().unwrap_or_else(|e| {
                eprintln!("Error: {e}");
                std::process::exit(2);
            });
            if let Err(e) = cmd_run(&config, once).await {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        }
        Commands::List { notified_file } => {
            if let Err(e) = cmd_list(&notified_file) {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        }
    }
}

/// Load `KEY=value` lines from `path` into the process environment.
/// Variables that are already set win. Returns `Ok(false)` if there is no file.
fn load_env_file(path: &Path) -> std::result::Result<bool, dotenvy::Error> {
    match dotenvy::from_path(path) {
        Ok(()) => Ok(true),
        Err(e) if e.not_found() => Ok(false),
        Err(e) => Err(e),
    }
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn cmd_run(config: &MonitorConfig, once: bool) -> Result<()> {
    let hub = HubClient::new(config)?;
    let sondehub = SondehubClient::new(config)?;
    let controller = CycleController::new(config, &hub, &sondehub, &hub);
    let scheduler = Scheduler::from_config(config);

    info!(
        entity = %config.entity_id,
        file = %config.notified_file.display(),
        radius_km = config.radius_km,
        notify_target = %config.hub.notify_target,
        "starting sonde-alert"
    );

    if once {
        return match scheduler.run_once(&controller).await {
            CycleOutcome::Completed(_) => Ok(()),
            CycleOutcome::Failed { error, .. } => Err(error),
        };
    }

    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown requested, finishing current cycle");
        let _ = tx.send(true);
    });

    scheduler.run(&controller, rx).await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "could not listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "could not listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

fn cmd_list(path: &Path) -> Result<()> {
    let record = DedupStore::new(path).load()?;

    println!();
    println!("Notified file: {}", path.display());
    println!("  {} sondes", record.len());
    println!();

    if record.is_empty() {
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Sonde", "Notified", "Link"]);
    for (id, notified) in record.iter() {
        table.add_row(vec![
            Cell::new(id),
            Cell::new(if notified { "yes" } else { "no" }),
            Cell::new(deep_link(id)),
        ]);
    }
    println!("{table}");
    Ok(())
}
