// SPDX-FileCopyrightText: 2026 Plugind Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Subcommand execution.

use std::sync::Arc;

use plugind_bus::{BroadcastTransport, BusTransport, Delivery, init_global};
use plugind_config::PlugindConfig;
use plugind_core::{GitOptions, InstallRequest, MarketOptions, PlugindError};
use plugind_pipeline::{Collaborators, PluginService};
use plugind_worker::RootWorker;
use tokio::sync::broadcast;
use tracing::warn;
use uuid::Uuid;

use crate::{Commands, InstallSource};

/// Runs one subcommand and returns the process exit code.
pub async fn run(command: Commands, config: PlugindConfig) -> Result<i32, PlugindError> {
    match command {
        Commands::Config => {
            let rendered = toml::to_string_pretty(&config)
                .map_err(|e| PlugindError::Internal(format!("failed to render configuration: {e}")))?;
            print!("{rendered}");
            Ok(0)
        }
        Commands::Install { source } => {
            let request = match source {
                InstallSource::Git { url, git_ref } => InstallRequest::Git(GitOptions { url, git_ref }),
                InstallSource::Market {
                    namespace,
                    name,
                    version,
                } => {
                    let mut options = MarketOptions::new(namespace, name);
                    options.version = version;
                    InstallRequest::Market(options)
                }
            };
            let (service, mut events) = start(config)?;
            let uuid = service.install(request)?;
            println!("{uuid}");
            let ok = follow(&mut events, uuid).await;
            service.shutdown().await;
            Ok(if ok { 0 } else { 1 })
        }
        Commands::Uninstall { namespace, name } => {
            let (service, mut events) = start(config)?;
            let uuid = service.uninstall(&namespace, &name)?;
            println!("{uuid}");
            let ok = follow(&mut events, uuid).await;
            service.shutdown().await;
            Ok(if ok { 0 } else { 1 })
        }
        Commands::List => {
            let (service, _) = start(config)?;
            for metadata in service.list().await? {
                println!("{}/{} {}", metadata.namespace, metadata.name, metadata.version);
            }
            Ok(0)
        }
        Commands::Show { namespace, name } => {
            let (service, _) = start(config)?;
            let metadata = service.get_metadata(&namespace, &name)?;
            println!("{}", to_json(&metadata)?);
            Ok(0)
        }
        Commands::Market => {
            let (service, _) = start(config)?;
            println!("{}", to_json(&service.market().await?)?);
            Ok(0)
        }
    }
}

/// Wires the service to the process-wide publisher and the privileged worker.
fn start(config: PlugindConfig) -> Result<(PluginService, broadcast::Receiver<Delivery>), PlugindError> {
    let transport = BroadcastTransport::new(config.bus.channel_capacity);
    let events = transport.subscribe();
    let transport: Arc<dyn BusTransport> = Arc::new(transport);
    let publisher = init_global(transport, &config.bus.exchange_name).clone();

    let (worker, _) = RootWorker::spawn(&config.worker);
    let collaborators = Collaborators::production(&config, Arc::new(worker), publisher)?;
    let service = PluginService::new(Arc::new(config), collaborators)?;
    Ok((service, events))
}

/// Prints the events of one run until its terminal event. Returns whether
/// the run succeeded.
async fn follow(events: &mut broadcast::Receiver<Delivery>, uuid: Uuid) -> bool {
    loop {
        match events.recv().await {
            Ok(delivery) if delivery.message.data.uuid == uuid => {
                let data = delivery.message.data;
                println!("{}", data.status);
                if let Some(error) = &data.errors {
                    eprintln!("{}: {}", error.error_id, error.message);
                    if let Ok(details) = serde_json::to_string_pretty(&error.details) {
                        eprintln!("{details}");
                    }
                }
                if data.status.is_terminal() {
                    return data.errors.is_none();
                }
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "progress events dropped");
            }
            Err(broadcast::error::RecvError::Closed) => return false,
        }
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, PlugindError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| PlugindError::Internal(format!("failed to render output: {e}")))
}
