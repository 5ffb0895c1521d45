/// Breeze - sync therapy data from a wireless SD card and relay it upstream
use anyhow::Result;
use breeze_cloud::{CloudClient, CloudConfig, TokenStore};
use breeze_core::CredentialSource;
use breeze_device::DeviceClient;
use breeze_sync::{SyncConfig, SyncOrchestrator, UploadTracker};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod credentials;

use config::{state_dir, AppConfig};
use credentials::TerminalCredentialSource;

#[derive(Parser)]
#[command(name = "breeze")]
#[command(about = "Sync therapy data from a wireless SD card", long_about = None)]
struct Cli {
    /// Configuration file path (default: ./breeze.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one sync pass (and upload when enabled)
    Sync {
        /// Destination directory for the mirror
        #[arg(long)]
        dest: Option<PathBuf>,
        /// Device listing URL
        #[arg(long)]
        url: Option<String>,
        /// Inclusive first day to sync (overrides --days)
        #[arg(long, value_name = "YYYY-MM-DD")]
        start_from: Option<chrono::NaiveDate>,
        /// Sync only the N most recent days
        #[arg(long)]
        days: Option<u32>,
        /// Additional file names to ignore (repeatable)
        #[arg(long, value_name = "NAME")]
        ignore: Vec<String>,
        /// Re-fetch files even when the local copy looks current
        #[arg(long)]
        overwrite: bool,
        /// Never overwrite existing local files
        #[arg(long)]
        keep_old: bool,
        /// Download attempts per file
        #[arg(long)]
        retries: Option<u32>,
        /// Upload newly synced files to the service
        #[arg(long)]
        upload: bool,
        /// Re-submit the whole mirror, bypassing the dedup tracker
        #[arg(long)]
        force_upload: bool,
    },
    /// Authenticate with the upload service and cache the token
    Login,
    /// Drop the cached token
    Logout,
    /// Show how many files the upload tracker remembers
    Tracker,
    /// Forget every tracked upload
    TrackerClear,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "breeze_cli=info,breeze_device=info,breeze_cloud=info,breeze_sync=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Sync {
            dest,
            url,
            start_from,
            days,
            ignore,
            overwrite,
            keep_old,
            retries,
            upload,
            force_upload,
        } => {
            let mut config = config;
            if let Some(dest) = dest {
                config.sync.dest_path = dest;
            }
            if let Some(url) = url {
                config.device.url = url;
            }
            if start_from.is_some() {
                config.sync.start_from = start_from;
            }
            if days.is_some() {
                config.sync.day_count = days;
            }
            config.sync.ignore.extend(ignore);
            config.sync.overwrite |= overwrite;
            config.sync.keep_old |= keep_old;
            if let Some(retries) = retries {
                config.sync.retries = retries;
            }

            run_sync(config, upload, force_upload).await
        }
        Commands::Login => login(&config).await,
        Commands::Logout => logout(),
        Commands::Tracker => {
            let tracker = UploadTracker::load(state_dir().join("upload_tracker.json"));
            println!("{} file(s) tracked as uploaded", tracker.count());
            Ok(())
        }
        Commands::TrackerClear => {
            let mut tracker = UploadTracker::load(state_dir().join("upload_tracker.json"));
            tracker.clear()?;
            println!("Upload tracker cleared");
            Ok(())
        }
    }
}

async fn run_sync(config: AppConfig, upload: bool, force_upload: bool) -> Result<()> {
    config.validate(upload)?;
    let upload_enabled = upload || config.upload.enabled;

    let device = DeviceClient::new(&config.device.url)?;
    let state = state_dir();
    let tracker = UploadTracker::load(state.join("upload_tracker.json"));

    let cloud = if upload_enabled {
        Some(cloud_client(&config)?)
    } else {
        None
    };

    let mut sync_config = SyncConfig::new(&config.sync.dest_path);
    sync_config.max_retries = config.sync.retries;
    sync_config.upload_enabled = upload_enabled;
    sync_config.force_upload = force_upload;
    sync_config.policy.start_from = config.sync.start_from;
    sync_config.policy.day_count = config.sync.day_count;
    sync_config.policy.ignore = config.sync.ignore.clone();
    sync_config.policy.overwrite = config.sync.overwrite;
    sync_config.policy.keep_old = config.sync.keep_old;

    let mut orchestrator = SyncOrchestrator::new(
        device,
        sync_config,
        tracker,
        cloud,
        Arc::new(TerminalCredentialSource),
    );
    let summary = orchestrator.run().await?;

    println!(
        "Sync complete: {} fetched, {} failed, {} already current, {} ignored, {} out of range",
        summary.fetched,
        summary.download_failures,
        summary.skipped_current,
        summary.skipped_ignored,
        summary.skipped_out_of_range,
    );
    if upload_enabled {
        println!(
            "Upload: {} uploaded, {} failed, {} not attempted",
            summary.uploaded, summary.upload_failures, summary.upload_not_attempted,
        );
    }

    Ok(())
}

async fn login(config: &AppConfig) -> Result<()> {
    config.validate(true)?;

    let client = cloud_client(config)?;
    if client.is_authenticated() {
        println!("Already authenticated with a valid cached token");
        return Ok(());
    }

    let creds = TerminalCredentialSource.get()?;
    let token = client.authenticate(&creds.username, &creds.password).await?;
    println!("Authenticated (team {})", token.team_id);
    Ok(())
}

fn logout() -> Result<()> {
    TokenStore::new(state_dir().join("token.json")).clear()?;
    println!("Logged out");
    Ok(())
}

fn cloud_client(config: &AppConfig) -> Result<CloudClient> {
    let store = TokenStore::new(state_dir().join("token.json"));
    Ok(CloudClient::new(
        CloudConfig::new(
            config.upload.url.clone(),
            config.upload.client_id.clone(),
            config.upload.client_secret.clone(),
        ),
        store,
    )?)
}
