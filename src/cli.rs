use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;

use crate::{
    app::{AppState, Collaborators, SETTINGS_FILE},
    connectivity::ConnectivityProbe,
    models::{Category, Coordinates, ReportDraft, Severity},
    reconcile::{run_guarded, TriggerSource},
    reporter::SubmissionStatus,
    settings::{self, SettingsPatch, SettingsStore, DATA_DIR_ENV},
    utils::init_logging,
};

const DEFAULT_DATA_DIR: &str = ".resqforce";

#[derive(Parser)]
#[command(name = "resqforce", about = "Report emergencies, even while offline.")]
pub struct Cli {
    /// Directory holding the report queue and settings.json.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Override the API base URL from settings.
    #[arg(long)]
    api_base_url: Option<String>,

    /// Enable debug logging.
    #[arg(long)]
    debug: bool,

    /// Command to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Submit a report now, or queue it if the device is offline.
    Report {
        #[arg(long, value_enum, default_value_t = CategoryArg::Fire)]
        category: CategoryArg,
        #[arg(long, value_enum, default_value_t = SeverityArg::Medium)]
        severity: SeverityArg,
        /// Free-text description of the emergency.
        #[arg(long, default_value = "")]
        description: String,
        #[command(flatten)]
        position: PositionArgs,
        /// Skip the connectivity probe and treat the device as offline.
        #[arg(long)]
        offline: bool,
    },
    /// List reports waiting to be sent.
    Pending,
    /// Drop every queued report.
    Clear,
    /// Run one reconciliation pass now.
    Sync {
        #[command(flatten)]
        position: PositionArgs,
    },
    /// Stay running: drain the queue at startup and whenever the network returns.
    Agent {
        #[command(flatten)]
        position: PositionArgs,
    },
    /// Show or change the persisted settings.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective settings, environment overrides included.
    Show,
    /// Write new values to settings.json.
    Set {
        #[arg(long)]
        api_base_url: Option<String>,
        #[arg(long)]
        request_timeout_ms: Option<u64>,
        #[arg(long)]
        probe_interval_ms: Option<u64>,
    },
}

/// Current device position, if the caller knows it.
#[derive(Args)]
struct PositionArgs {
    #[arg(long, requires = "lng", allow_hyphen_values = true)]
    lat: Option<f64>,
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    lng: Option<f64>,
}

impl PositionArgs {
    fn coordinates(&self) -> Option<Coordinates> {
        match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => Some(Coordinates::new(lat, lng)),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum CategoryArg {
    Fire,
    Flood,
    Accident,
    Medical,
    NaturalDisaster,
    Crime,
    Other,
}

impl From<CategoryArg> for Category {
    fn from(value: CategoryArg) -> Self {
        match value {
            CategoryArg::Fire => Category::Fire,
            CategoryArg::Flood => Category::Flood,
            CategoryArg::Accident => Category::Accident,
            CategoryArg::Medical => Category::Medical,
            CategoryArg::NaturalDisaster => Category::NaturalDisaster,
            CategoryArg::Crime => Category::Crime,
            CategoryArg::Other => Category::Other,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum SeverityArg {
    Low,
    Medium,
    High,
}

impl From<SeverityArg> for Severity {
    fn from(value: SeverityArg) -> Self {
        match value {
            SeverityArg::Low => Severity::Low,
            SeverityArg::Medium => Severity::Medium,
            SeverityArg::High => Severity::High,
        }
    }
}

pub async fn execute(cli: Cli) -> Result<()> {
    init_logging(cli.debug || settings::debug_enabled());

    let data_dir = cli
        .data_dir
        .or_else(|| std::env::var(DATA_DIR_ENV).ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

    let settings_store = SettingsStore::new(data_dir.join(SETTINGS_FILE))?;
    let mut settings = settings_store.effective();
    if let Some(url) = cli.api_base_url {
        settings.api_base_url = url;
    }

    match cli.command {
        Command::Report {
            category,
            severity,
            description,
            position,
            offline,
        } => {
            let online = !offline && probe(&settings).await?;
            let collaborators = Collaborators::open(&data_dir, &settings, position.coordinates())?;
            let state = AppState::new(settings, collaborators, online);

            let status = state
                .reporter
                .submit(ReportDraft {
                    description,
                    category: category.into(),
                    severity: severity.into(),
                })
                .await;

            println!("{}", status.message());
            if let SubmissionStatus::Failed { .. } = status {
                bail!("report was not sent");
            }
        }
        Command::Pending => {
            let collaborators = Collaborators::open(&data_dir, &settings, None)?;
            let state = AppState::new(settings, collaborators, false);
            let pending = state.queue.pending().await?;
            println!("{}", serde_json::to_string_pretty(&pending)?);
        }
        Command::Clear => {
            let collaborators = Collaborators::open(&data_dir, &settings, None)?;
            let state = AppState::new(settings, collaborators, false);
            let dropped = state.queue.clear().await?;
            println!("Cleared {dropped} queued report(s)");
        }
        Command::Sync { position } => {
            let online = probe(&settings).await?;
            let collaborators = Collaborators::open(&data_dir, &settings, position.coordinates())?;
            let state = AppState::new(settings, collaborators, online);

            state.gate.ensure_location_permission_checked().await;
            match run_guarded(state.engine.clone(), TriggerSource::Manual).await {
                Some(outcome) => println!("{}", serde_json::to_string_pretty(&outcome)?),
                None => bail!("reconciliation pass failed; see log for details"),
            }
        }
        Command::Agent { position } => {
            let online = probe(&settings).await?;
            let collaborators = Collaborators::open(&data_dir, &settings, position.coordinates())?;
            let state = AppState::new(settings, collaborators, online);

            let cancel_token = CancellationToken::new();
            let probe_handle = state.spawn_probe(cancel_token.clone())?;
            let triggers = state.start_background(cancel_token.clone());

            log::info!("ResQForce agent running; press Ctrl-C to stop");
            tokio::signal::ctrl_c()
                .await
                .context("failed to listen for Ctrl-C")?;

            log::info!("Shutting down");
            cancel_token.cancel();
            triggers.shutdown().await;
            probe_handle.await.context("connectivity probe failed to join")?;
        }
        Command::Config { action } => match action {
            ConfigAction::Show => println!("{}", serde_json::to_string_pretty(&settings)?),
            ConfigAction::Set {
                api_base_url,
                request_timeout_ms,
                probe_interval_ms,
            } => {
                let patch = SettingsPatch {
                    api_base_url,
                    request_timeout_ms,
                    probe_interval_ms,
                };
                if patch.is_empty() {
                    bail!("nothing to change; pass at least one setting");
                }
                let saved = settings_store.apply_patch(patch)?;
                println!("{}", serde_json::to_string_pretty(&saved)?);
            }
        },
    }

    Ok(())
}

async fn probe(settings: &settings::Settings) -> Result<bool> {
    let probe = ConnectivityProbe::new(
        &settings.api_base_url,
        settings.probe_interval(),
        settings.request_timeout(),
    )?;
    Ok(probe.probe_once().await)
}
