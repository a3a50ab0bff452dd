//! CLI command implementations
//!
//! `check`, `replay` and `audit` are one-shot and print a single JSON
//! document. `serve` installs bundles into a fresh service and blocks on the
//! HTTP server.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{json, Value};
use uuid::Uuid;

use crate::authoring::{Installed, TreeBundle};
use crate::config::EngineConfig;
use crate::core::TenantContext;
use crate::http_server::HttpServer;
use crate::scenario::ScenarioService;

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::{write_lines, write_response};

/// Parse arguments and run the command
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Check { bundle, tenant } => write_response(check(&bundle, &tenant)?),
        Command::Replay {
            config,
            tenant,
            scenario,
            up_to,
        } => write_response(replay(&config, &tenant, scenario, up_to)?),
        Command::Audit {
            config,
            tenant,
            scenario,
        } => write_lines(&audit(&config, &tenant, scenario)?),
        Command::Serve {
            config,
            bundle,
            tenant,
        } => serve(&config, &bundle, &tenant),
    }
}

fn summary(installed: &Installed) -> Value {
    json!({
        "tree": installed.tree.tree.name,
        "tree_id": installed.tree.id(),
        "version": installed.tree.tree.version,
        "content_hash": installed.tree.tree.content_hash,
        "nodes": installed.nodes.len(),
        "conditions": installed.conditions.len(),
        "questions": installed.questions.len(),
    })
}

/// Load a bundle and install it into empty stores.
pub fn check(bundle_path: &Path, tenant: &str) -> CliResult<Value> {
    let bundle = TreeBundle::load(bundle_path)?;
    let installed = bundle.check(&TenantContext::system(tenant))?;
    Ok(summary(&installed))
}

/// Projected state of one scenario as recorded in the journal.
///
/// Authoring state is not journaled, so this is the raw projection without
/// derived availability.
pub fn replay(config_path: &Path, tenant: &str, scenario_id: Uuid, up_to: Option<u64>) -> CliResult<Value> {
    let service = durable_service(config_path)?;
    let ctx = TenantContext::system(tenant);
    let up_to = match up_to {
        Some(version) => version,
        None => service.log().head(tenant, scenario_id).map_err(|e| {
            CliError::replay_failed(format!("{} ({})", e, e.code()))
        })?,
    };
    let state = service.state_at(&ctx, scenario_id, up_to)?;
    Ok(serde_json::to_value(state)?)
}

/// Audit lines of one scenario.
pub fn audit(config_path: &Path, tenant: &str, scenario_id: Uuid) -> CliResult<String> {
    let service = durable_service(config_path)?;
    Ok(service.audit_export(&TenantContext::system(tenant), scenario_id)?)
}

/// Install bundles and serve until the process is stopped.
pub fn serve(config_path: &Path, bundles: &[PathBuf], tenant: &str) -> CliResult<()> {
    let config = EngineConfig::load(config_path)?;
    let service = ScenarioService::from_config(&config)
        .map_err(|e| CliError::boot_failed(format!("{} ({})", e, e.code())))?;

    let ctx = TenantContext::system(tenant);
    for path in bundles {
        let bundle = TreeBundle::load(path)?;
        let installed = service.install_bundle(&ctx, &bundle)?;
        write_response(summary(&installed))?;
    }

    let server = HttpServer::new(config, Arc::new(service));
    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::boot_failed(format!("Failed to create tokio runtime: {}", e)))?;

    rt.block_on(async {
        server
            .start()
            .await
            .map_err(|e| CliError::boot_failed(format!("HTTP server failed: {}", e)))
    })
}

fn durable_service(config_path: &Path) -> CliResult<ScenarioService> {
    let config = EngineConfig::load(config_path)?;
    if config.data_dir.is_none() {
        return Err(CliError::config_error(
            "data_dir is required to read a journal",
        ));
    }
    Ok(ScenarioService::from_config(&config)?)
}
