// src/main.rs

//! # dpt-sync - Main Entry Point
//!
//! Command-line client for a paired DPT-RP1 digital paper device. Sends PDFs
//! from the web straight to the device's viewer and manages the pairing
//! credentials it authenticates with.
//!
//! ## Architecture Overview
//! 1. **Device Layer**: `DeviceTransport` and `DeviceClient` for the device's HTTPS API
//! 2. **Services Layer**: the download/upload/show workflow and file naming
//! 3. **Wallet Layer**: credential storage and nonce signing
//! 4. **Utils**: PKCS#1 to PKCS#8 key conversion, JSON helpers
//!
//! ## Configuration
//! See [`config::Settings`]. Values come from `dpt-sync.toml` and `DPT_SYNC_*`
//! environment variables (a `.env` file is honored).

use crate::config::Settings;
use crate::device::{DeviceApi, DeviceClient, ProgressCallback};
use crate::error::DeviceError;
use crate::models::document::Identifier;
use crate::services::upload_workflow::{UploadOutcome, UploadWorkflow};
use crate::utils::crypto::convert_to_pkcs8;
use crate::wallet::credential_storage::CredentialStore;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use log::{error, info};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

mod config;   // Layered settings
mod device;   // Device HTTP API
mod error;    // Error types
mod models;   // Data structures
mod services; // Workflows
mod utils;    // Helper functions
mod wallet;   // Credentials and signing

#[derive(Parser, Debug)]
#[command(name = "dpt-sync", version, about = "Send documents to a DPT-RP1 digital paper device")]
struct Cli {
    /// Device origin, overriding the configured one
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import the device id and private key exported by the device
    Register {
        device_id_file: PathBuf,
        private_key_file: PathBuf,
    },
    /// Check the stored credentials, forgetting them if they fail
    Reset,
    /// Print a private key as base64 PKCS#8 DER
    ConvertKey { private_key_file: PathBuf },
    /// Check that the device is reachable
    Ping,
    /// Download a document and open it on the device
    Send { url: String },
    /// Print the entry stored at a device path
    Resolve { path: String },
    /// Open a document (path or id) in the device's viewer
    Show {
        target: String,
        #[arg(long)]
        page: Option<u32>,
    },
    /// Delete a document (path or id) from the device
    Delete { target: String },
}

/// Main application entry point
///
/// # Initialization Sequence
/// 1. Load `.env` and initialize logging
/// 2. Load settings
/// 3. Dispatch the subcommand
#[tokio::main]
async fn main() {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run(Cli::parse()).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let settings = Settings::load().context("failed to load settings")?;
    execute(cli, settings).await
}

async fn execute(cli: Cli, mut settings: Settings) -> Result<()> {
    if let Some(base_url) = cli.base_url {
        settings.base_url = base_url;
    }
    let store = CredentialStore::new(&settings.credentials_dir);

    match cli.command {
        Command::Register {
            device_id_file,
            private_key_file,
        } => register(&settings, &store, &device_id_file, &private_key_file).await,
        Command::Reset => reset(&settings, &store).await,
        Command::ConvertKey { private_key_file } => {
            let key = std::fs::read_to_string(&private_key_file)
                .with_context(|| format!("cannot read {}", private_key_file.display()))?;
            println!("{}", convert_to_pkcs8(&key)?);
            Ok(())
        }
        Command::Ping => {
            let client = connect(&settings, &store)?;
            client.ping().await?;
            println!("Device is reachable at {}", settings.base_url);
            Ok(())
        }
        Command::Send { url } => send(&settings, &store, &url).await,
        Command::Resolve { path } => {
            let client = connect(&settings, &store)?;
            guard_auth(&store, client.authenticate().await)?;
            match client.resolve_object(&path).await? {
                Some(entry) => println!(
                    "{}\t{}\t{}",
                    entry.entry_id,
                    entry
                        .file_size
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "-".into()),
                    entry.path
                ),
                None => println!("{path} does not exist"),
            }
            Ok(())
        }
        Command::Show { target, page } => {
            let client = connect(&settings, &store)?;
            guard_auth(&store, client.authenticate().await)?;
            client
                .display_document(&Identifier::parse(&target), page)
                .await?;
            Ok(())
        }
        Command::Delete { target } => {
            let client = connect(&settings, &store)?;
            guard_auth(&store, client.authenticate().await)?;
            client.delete_document(&Identifier::parse(&target)).await?;
            Ok(())
        }
    }
}

/// Validates and stores the exported credentials, then proves them against
/// the device. Nothing stays on disk if any step fails.
async fn register(
    settings: &Settings,
    store: &CredentialStore,
    device_id_file: &std::path::Path,
    private_key_file: &std::path::Path,
) -> Result<()> {
    let attempt = async {
        let stored = CredentialStore::import(device_id_file, private_key_file)?;
        store.save(&stored)?;
        let client = DeviceClient::new(settings, stored.to_credential()?)?;
        client.authenticate().await?;
        anyhow::Ok(())
    };

    match attempt.await {
        Ok(()) => {
            info!("Registered with device; credentials in {}", store.dir().display());
            Ok(())
        }
        Err(e) => {
            store.clear()?;
            Err(e.context("registration failed"))
        }
    }
}

/// Authenticates with the stored credentials; any failure, including an
/// unreadable key, clears them.
async fn reset(settings: &Settings, store: &CredentialStore) -> Result<()> {
    let check = async {
        let client = connect(settings, store)?;
        client.authenticate().await?;
        anyhow::Ok(())
    };

    match check.await {
        Ok(()) => {
            println!("Credentials are valid");
            Ok(())
        }
        Err(e) => {
            store.clear()?;
            Err(e.context("stored credentials were cleared; run `dpt-sync register` again"))
        }
    }
}

async fn send(settings: &Settings, store: &CredentialStore, url: &str) -> Result<()> {
    let client = connect(settings, store)?;
    client
        .ping()
        .await
        .context("device is not reachable; is it awake and on the network?")?;

    let progress: ProgressCallback = Arc::new(|fraction: f64| {
        eprint!("\rUploading... {:>3.0}%", fraction * 100.0);
        let _ = std::io::stderr().flush();
        if fraction >= 1.0 {
            eprintln!();
        }
    });

    let outcome = guard_auth(
        store,
        UploadWorkflow::new(&client, settings)
            .download_upload_show(url, Some(progress))
            .await,
    )?;
    let document_id = outcome.document_id();
    match outcome {
        UploadOutcome::Reused { path, .. } => println!("Opened existing {path} ({document_id})"),
        UploadOutcome::Uploaded { path, .. } => {
            println!("Uploaded and opened {path} ({document_id})")
        }
    }
    Ok(())
}

fn connect(settings: &Settings, store: &CredentialStore) -> Result<DeviceClient> {
    let credential = store
        .load_credential()
        .context("no usable credentials; run `dpt-sync register` first")?;
    Ok(DeviceClient::new(settings, credential)?)
}

/// Forgets credentials the device no longer accepts.
fn guard_auth<T>(store: &CredentialStore, result: Result<T, DeviceError>) -> Result<T> {
    match result {
        Err(e) if e.is_auth_failure() => {
            store.clear()?;
            Err(anyhow::Error::new(e)
                .context("the device rejected the stored credentials; run `dpt-sync register` again"))
        }
        other => Ok(other?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::credential::tests::{CLIENT_ID, PKCS1_PEM};
    use crate::wallet::credential_storage::StoredCredentials;
    use mockito::Server;

    fn stored_with_key(private_key: &str) -> StoredCredentials {
        StoredCredentials {
            device_id: CLIENT_ID.to_string(),
            private_key: private_key.to_string(),
        }
    }

    fn settings_in(dir: &std::path::Path) -> Settings {
        Settings {
            credentials_dir: dir.to_path_buf(),
            ..Settings::default()
        }
    }

    fn cli(base_url: &str, args: &[&str]) -> Cli {
        let mut argv = vec!["dpt-sync", "--base-url", base_url];
        argv.extend_from_slice(args);
        Cli::parse_from(argv)
    }

    #[tokio::test]
    async fn reset_clears_credentials_on_any_device_failure() {
        let mut device = Server::new_async().await;
        device
            .mock("GET", format!("/auth/nonce/{CLIENT_ID}").as_str())
            .with_status(500)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path());
        store.save(&stored_with_key(PKCS1_PEM)).unwrap();

        let result = execute(cli(&device.url(), &["reset"]), settings_in(dir.path())).await;
        assert!(result.is_err());
        assert!(store.load().unwrap().is_none());
    }

    #[tokio::test]
    async fn reset_clears_credentials_that_cannot_be_loaded() {
        let device = Server::new_async().await;
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path());
        store.save(&stored_with_key("not a key")).unwrap();

        let result = execute(cli(&device.url(), &["reset"]), settings_in(dir.path())).await;
        assert!(result.is_err());
        assert!(store.load().unwrap().is_none());
    }

    #[tokio::test]
    async fn reset_keeps_working_credentials() {
        let mut device = Server::new_async().await;
        device
            .mock("GET", format!("/auth/nonce/{CLIENT_ID}").as_str())
            .with_body(r#"{"nonce":"abc"}"#)
            .create_async()
            .await;
        device.mock("PUT", "/auth").with_status(204).create_async().await;

        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path());
        store.save(&stored_with_key(PKCS1_PEM)).unwrap();

        execute(cli(&device.url(), &["reset"]), settings_in(dir.path()))
            .await
            .unwrap();
        assert!(store.load().unwrap().is_some());
    }

    #[tokio::test]
    async fn rejected_credentials_are_cleared_by_other_commands() {
        let mut device = Server::new_async().await;
        device
            .mock("GET", format!("/auth/nonce/{CLIENT_ID}").as_str())
            .with_status(401)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path());
        store.save(&stored_with_key(PKCS1_PEM)).unwrap();

        let result = execute(
            cli(&device.url(), &["delete", "Document/Received/a.pdf"]),
            settings_in(dir.path()),
        )
        .await;
        assert!(result.is_err());
        assert!(store.load().unwrap().is_none());
    }
}
