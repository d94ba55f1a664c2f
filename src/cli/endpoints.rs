//! Endpoint management commands

use super::Cli;
use clap::Subcommand;
use explorer_relay::Relay;

#[derive(Subcommand)]
pub enum EndpointCommands {
    /// List configured services and their endpoints
    List,

    /// Probe every endpoint of a service
    Probe {
        /// Service name
        service: String,
    },
}

pub async fn handle(action: &EndpointCommands, cli: &Cli) -> anyhow::Result<()> {
    match action {
        EndpointCommands::List => {
            let config = cli.relay_config(None)?;
            if config.services.is_empty() {
                println!("No services configured in {}", cli.config_path().display());
                println!("\nCreate a starter config with:");
                println!("  explorer-relay config init");
                return Ok(());
            }

            for service in &config.services {
                println!(
                    "{} ({}, rotate after {} failures)",
                    service.name, service.kind, service.failure_threshold
                );
                if let Some(note) = &service.note {
                    println!("  {}", note);
                }
                for url in service.normalized_urls() {
                    println!("  {}", url);
                }
                println!("  liveness: {}", service.liveness_path);
                println!();
            }
        }

        EndpointCommands::Probe { service } => {
            let relay = Relay::new(cli.relay_config(Some(service))?)?;
            println!("Probing {}\n", service);

            let results = relay.probe_service(service).await?;
            for result in &results {
                if result.reachable {
                    println!(
                        "  ✓ {} ({} ms)",
                        result.endpoint,
                        result.latency.as_millis()
                    );
                } else {
                    println!("  ✗ {} (unreachable)", result.endpoint);
                }
            }

            let reachable = results.iter().filter(|r| r.reachable).count();
            println!("\n{}/{} endpoints reachable", reachable, results.len());
        }
    }

    Ok(())
}
