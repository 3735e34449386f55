mod cli;
mod shutdown;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use adapters::nft::{ApplierConfig, NftApplier, NftCli};
use application::policy_service::{PolicyService, ServiceConfig};
use application::watcher::watch_and_reload;
use domain::policy::parser::ManifestParser;
use infrastructure::config::AgentConfig;
use infrastructure::logging::init_logging;

use cli::Command;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = cli::parse();

    let config = match AgentConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("aegisx-agent: cannot load config {}: {e}", cli.config.display());
            return ExitCode::FAILURE;
        }
    };

    let level = cli.log_level.unwrap_or(config.log.level);
    let format = cli.log_format.unwrap_or(config.log.format);
    init_logging(level, format);

    match run(cli.command, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("aegisx-agent: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(
    command: Option<Command>,
    config: &AgentConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    if matches!(command, Some(Command::Version)) {
        println!("aegisx-agent {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let service = Arc::new(build_service(config)?);

    match command.unwrap_or(Command::Run) {
        Command::Run => run_watcher(service, config).await,

        Command::Apply { file } => {
            match file {
                Some(path) => {
                    let manifests = ManifestParser::new().parse_file(&path)?;
                    service.apply_manifests(&manifests).await?;
                }
                None => service.apply_directory().await?,
            }
            if let Some(ir) = service.current_ir().await {
                println!("applied ir {} ({} firewall rules)", ir.id, ir.firewall_rules.len());
            }
            Ok(())
        }

        Command::Diff { file } => {
            let manifests = ManifestParser::new().parse_file(&file)?;
            let delta = service.diff_manifests(&manifests).await?;
            if delta.is_empty() {
                println!("no changes");
            } else {
                print!("{delta}");
            }
            Ok(())
        }

        Command::Status => {
            print!("{}", service.status().await?);
            Ok(())
        }

        Command::Rollback => {
            service.rollback().await?;
            println!("rollback applied");
            Ok(())
        }

        Command::Flush => {
            service.flush().await?;
            println!("table {} removed", config.firewall.table_name);
            Ok(())
        }

        Command::Version => unreachable!("handled above"),
    }
}

fn build_service(config: &AgentConfig) -> Result<PolicyService, Box<dyn std::error::Error>> {
    let loader = Arc::new(NftCli::new(config.firewall.table_name.clone()));
    let applier = NftApplier::new(
        ApplierConfig {
            table_name: config.firewall.table_name.clone(),
            rollback_dir: Path::new(&config.firewall.rollback_dir).to_path_buf(),
            dry_run: config.firewall.dry_run,
        },
        loader,
    )?;

    let policy_dir = if config.firewall.policy_dir.is_empty() {
        None
    } else {
        Some(Path::new(&config.firewall.policy_dir).to_path_buf())
    };

    Ok(PolicyService::new(
        ServiceConfig {
            policy_dir,
            reload_interval: Some(config.firewall.reload_interval()),
        },
        Arc::new(applier),
    ))
}

async fn run_watcher(
    service: Arc<PolicyService>,
    config: &AgentConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        table = %config.firewall.table_name,
        policy_dir = %config.firewall.policy_dir,
        dry_run = config.firewall.dry_run,
        "aegisx-agent starting"
    );

    let shutdown = shutdown::create_shutdown_token();
    let watcher = tokio::spawn(watch_and_reload(service, shutdown.clone()));

    shutdown.cancelled().await;
    tracing::info!("shutdown signal received, waiting for in-flight apply");

    // The watcher finishes its current iteration before exiting; give it a
    // bounded grace period rather than hanging shutdown forever.
    match tokio::time::timeout(Duration::from_secs(30), watcher).await {
        Ok(join) => join?,
        Err(_) => tracing::warn!("watcher did not stop within grace period"),
    }

    tracing::info!("aegisx-agent stopped");
    Ok(())
}
