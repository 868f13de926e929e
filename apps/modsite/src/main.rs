//! modsite - Go module ingestion pipeline
//!
//! Command line front end that wires the proxy client, fetcher, store, worker
//! and work queue together and runs one command against them.

mod cli;
mod display;
mod error;
mod logging;
mod setup;

use crate::cli::{parse_task, Cli, Commands};
use crate::display::{FetchReport, OperationResult, OutputRenderer, StateReport, TaskReport};
use crate::error::CliError;
use crate::setup::Services;
use clap::Parser;
use modsite_config::Config;
use modsite_errors::status;
use modsite_events::EventReceiver;
use modsite_state::ModuleStore;
use std::process;
use std::time::Duration;
use tokio::select;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Parse command line arguments first to check for JSON mode
    let cli = Cli::parse();
    let json_mode = cli.global.json;

    init_tracing(json_mode, cli.global.debug);

    match run(cli).await {
        Ok(true) => {}
        Ok(false) => process::exit(2),
        Err(e) => {
            error!("Application error: {}", e);
            if !json_mode {
                eprintln!("Error: {e}");
            }
            process::exit(1);
        }
    }
}

/// Main application logic. Returns whether every module processed succeeded.
async fn run(cli: Cli) -> Result<bool, CliError> {
    info!("Starting modsite v{}", env!("CARGO_PKG_VERSION"));

    // File config (or defaults), then environment, then CLI flags
    let mut config = Config::load_or_default(cli.global.config.as_deref()).await?;
    config.merge_env()?;
    apply_cli_config(&mut config, &cli.global, &cli.command);

    let (event_sender, event_receiver) = modsite_events::channel();
    let services = Services::initialize(config, event_sender).await?;

    let result = execute_command_with_events(cli.command, &services, event_receiver).await?;

    OutputRenderer::new(cli.global.json).render_result(&result)?;
    info!("Command completed");
    Ok(!result.has_failures())
}

/// Execute command while logging events as they arrive
async fn execute_command_with_events(
    command: Commands,
    services: &Services,
    mut event_receiver: EventReceiver,
) -> Result<OperationResult, CliError> {
    let mut command_future = Box::pin(execute_command(command, services));

    loop {
        select! {
            result = &mut command_future => {
                while let Ok(event) = event_receiver.try_recv() {
                    logging::log_event_with_tracing(&event);
                }
                return result;
            }

            event = event_receiver.recv() => {
                if let Some(event) = event {
                    logging::log_event_with_tracing(&event);
                }
            }
        }
    }
}

/// Execute the specified command
async fn execute_command(
    command: Commands,
    services: &Services,
) -> Result<OperationResult, CliError> {
    match command {
        Commands::Fetch { module, version } => {
            let (code, err) = services.worker.fetch_and_update_state(&module, &version).await;
            let report = fetch_report(services, &module, &version, code, err).await?;
            Ok(OperationResult::Fetch(report))
        }

        Commands::Enqueue { tasks, .. } => {
            let tasks = parse_tasks(&tasks)?;
            let queue = services.work_queue(services.config.queue.workers)?;
            let mut handles = Vec::with_capacity(tasks.len());
            for (module, version) in &tasks {
                let (handle, _) = queue.submit(module, version)?;
                handles.push(handle);
            }
            let mut reports = Vec::with_capacity(handles.len());
            for handle in handles {
                let task = handle.key().to_string();
                let outcome = handle.wait().await;
                reports.push(TaskReport {
                    task,
                    status: outcome.status,
                    error: outcome.error.map(|e| e.to_string()),
                });
            }
            Ok(OperationResult::Tasks(reports))
        }

        Commands::State { module, version } => {
            let store = &services.store;
            let version_map = store.get_version_map(&module, &version).await?;
            let resolved = version_map
                .as_ref()
                .and_then(|entry| entry.resolved_version.clone())
                .unwrap_or_else(|| version.clone());
            let module_state = store.get_module_version_state(&module, &resolved).await?;
            let packages = store.get_package_version_states(&module, &resolved).await?;
            Ok(OperationResult::State(StateReport {
                version_map,
                module: module_state,
                packages,
            }))
        }

        Commands::Exclude { prefix, reason } => {
            services.store.insert_excluded_prefix(&prefix, &reason).await?;
            Ok(OperationResult::Success(format!("Excluded {prefix}")))
        }

        Commands::Inflight { tasks, interval_ms } => {
            let tasks = parse_tasks(&tasks)?;
            let queue = services.work_queue(services.config.queue.workers)?;
            for (module, version) in &tasks {
                queue.submit(module, version)?;
            }
            let renderer = OutputRenderer::new(false);
            let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms.max(1)));
            while !queue.in_flight().is_empty() {
                ticker.tick().await;
                renderer.render_result(&OperationResult::InFlight(services.registry.snapshot()))?;
            }
            Ok(OperationResult::InFlight(services.registry.snapshot()))
        }
    }
}

fn parse_tasks(tasks: &[String]) -> Result<Vec<(String, String)>, CliError> {
    tasks
        .iter()
        .map(|task| {
            parse_task(task)
                .map(|(m, v)| (m.to_string(), v.to_string()))
                .ok_or_else(|| {
                    CliError::InvalidArguments(format!("{task:?} is not of the form module@version"))
                })
        })
        .collect()
}

/// Read back what a fetch left in the store.
async fn fetch_report(
    services: &Services,
    module: &str,
    version: &str,
    code: u16,
    err: Option<modsite_errors::Error>,
) -> Result<FetchReport, CliError> {
    let store = &services.store;
    let resolved_version = store
        .get_version_map(module, version)
        .await?
        .and_then(|entry| entry.resolved_version);
    let lookup = resolved_version.as_deref().unwrap_or(version);

    let units = if status::is_success(code) {
        store.get_units(module, lookup).await?
    } else {
        Vec::new()
    };
    let incomplete = store
        .get_package_version_states(module, lookup)
        .await?
        .into_iter()
        .filter(|state| state.status != status::OK)
        .collect();

    Ok(FetchReport {
        module_path: module.to_string(),
        requested_version: version.to_string(),
        resolved_version,
        status: code,
        error: err.map(|e| e.to_string()),
        packages: units.iter().filter(|u| u.is_package()).count(),
        units: units.len(),
        incomplete,
    })
}

/// Initialize tracing/logging
fn init_tracing(json_mode: bool, debug_enabled_flag: bool) {
    let debug_enabled = std::env::var("RUST_LOG").is_ok() || debug_enabled_flag;
    let file_filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::new("info,modsite=debug,modsite_fetch=debug")
        })
    };

    if debug_enabled {
        // Debug mode: structured JSON logs to file
        let log_dir = modsite_config::logs_dir();
        if let Err(e) = std::fs::create_dir_all(&log_dir) {
            if !json_mode {
                eprintln!("Warning: Failed to create log directory: {e}");
            }
        }
        let log_file = log_dir.join(format!(
            "modsite-{}.log",
            chrono::Utc::now().format("%Y%m%d-%H%M%S")
        ));

        match std::fs::File::create(&log_file) {
            Ok(file) => {
                tracing_subscriber::fmt()
                    .json()
                    .with_writer(file)
                    .with_env_filter(file_filter())
                    .init();
                if !json_mode {
                    eprintln!("Debug logging enabled: {}", log_file.display());
                }
                return;
            }
            Err(e) => {
                if !json_mode {
                    eprintln!("Warning: Failed to create log file: {e}");
                }
            }
        }
    }

    if json_mode {
        // Keep stdout clean for the JSON result
        tracing_subscriber::fmt()
            .with_writer(std::io::sink)
            .with_env_filter("off")
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                    tracing_subscriber::EnvFilter::new("warn,modsite=warn")
                }),
            )
            .init();
    }
}

/// Apply CLI configuration overrides (highest precedence)
fn apply_cli_config(config: &mut Config, global: &cli::GlobalArgs, command: &Commands) {
    if let Some(db) = &global.db {
        config.store.db_path = Some(db.clone());
    }
    if let Some(proxy) = &global.proxy {
        config.proxy.url.clone_from(proxy);
    }
    if let Commands::Enqueue {
        workers: Some(workers),
        ..
    } = command
    {
        config.queue.workers = *workers;
    }
}
