//! Orchestration binary: resolve service config, connect, evaluate, render.

use staking_report::chain::Connection;
use staking_report::config::chains::{rpc_probe_timeout_from_env, ChainConfig};
use staking_report::contracts::OnchainViews;
use staking_report::descriptor;
use staking_report::evaluator::Evaluator;
use staking_report::render::{Palette, Renderer, ReportProfile};
use std::time::{SystemTime, UNIX_EPOCH};

fn init_tracing() {
    // Default to `info` when `RUST_LOG` is unset or invalid to avoid silent runs.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr) // keep the rendered report on stdout clean
        .init();
}

fn palette_from_env() -> Palette {
    if std::env::var_os("NO_COLOR").is_some() {
        Palette::plain()
    } else {
        Palette::ansi()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let profile = ReportProfile::from_env();
    tracing::info!("[STARTUP] Report profile: {}", profile.as_str());

    let roots = descriptor::default_service_roots();
    let service = descriptor::resolve(&roots)?;
    tracing::info!(
        "[STARTUP] Resolved service {} (program `{}`, staking contract {:#x})",
        service.service_id,
        service.staking_program_id,
        service.staking_contract_address
    );

    let chain = ChainConfig::gnosis();
    let probe_timeout = rpc_probe_timeout_from_env(chain.rpc_probe_timeout);
    let candidates = chain.rpc_candidates(&service.rpc_candidates);
    let connection = Connection::establish(&candidates, probe_timeout).await?;
    tracing::info!("[STARTUP] Using endpoint {}", connection.endpoint());

    let views = OnchainViews::new(connection, service.staking_contract_address);
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0);

    let report = Evaluator::new(&views, &service).run(now).await?;
    tracing::info!(
        "[REPORT] Evaluation complete: state={} advisories={}",
        report.state.as_str(),
        report.advisories.len()
    );

    let rendered = Renderer::new(palette_from_env(), profile, &chain).render(&report);
    println!("{rendered}");
    Ok(())
}
