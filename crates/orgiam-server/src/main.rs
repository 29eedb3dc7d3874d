//! ORGIAM Server: reconciliation daemon.
//!
//! Connects to SurrealDB, applies migrations, audits the organization once
//! at startup, then re-synchronizes pending employees against the policy
//! store until interrupted.

mod config;

use anyhow::{Context, Result};
use orgiam_db::{
    DbManager, SurrealDepartmentRepository, SurrealEmployeeRepository, SurrealPolicyStore,
    SurrealSyncIncidentRepository, SurrealTeamRepository,
};
use orgiam_engine::OrgService;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("orgiam=info".parse().context("parse log directive")?),
        )
        .json()
        .init();

    info!("Starting ORGIAM server...");

    let config = ServerConfig::from_env()?;
    let manager = DbManager::connect(&config.db)
        .await
        .context("connect to SurrealDB")?;
    let db = manager.client().clone();
    orgiam_db::run_migrations(&db)
        .await
        .context("apply schema migrations")?;

    let employees = match config.password_pepper.clone() {
        Some(pepper) => SurrealEmployeeRepository::with_pepper(db.clone(), pepper),
        None => SurrealEmployeeRepository::new(db.clone()),
    };
    let service = OrgService::new(
        employees,
        SurrealTeamRepository::new(db.clone()),
        SurrealDepartmentRepository::new(db.clone()),
        SurrealSyncIncidentRepository::new(db.clone()),
        SurrealPolicyStore::new(db),
        config.engine.clone(),
    );

    match service.audit().await {
        Ok(report) if report.is_clean() => {}
        Ok(report) => {
            let findings = serde_json::to_string(&report.findings)
                .unwrap_or_else(|_| format!("{:?}", report.findings));
            warn!(
                count = report.findings.len(),
                findings = %findings,
                "Startup audit found inconsistencies"
            );
        }
        Err(err) => error!(error = %err, "Startup audit failed"),
    }

    let mut ticker = tokio::time::interval(config.reconcile_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(err) = service.reconcile_pending().await {
                    error!(error = %err, "Reconciliation pass failed");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    info!("ORGIAM server stopped.");
    Ok(())
}
