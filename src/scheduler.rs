use anyhow::Result;
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, info};

use crate::trading::StrategyRunner;
use crate::utils::config::TriggerTime;

/// Registers the daily trigger (UTC) and starts the scheduler.
pub async fn start_daily(runner: Arc<StrategyRunner>, trigger: TriggerTime) -> Result<JobScheduler> {
    let cron = trigger.cron_expression();
    debug!("Daily job cron expression: {}", cron);

    let job = Job::new_async(cron.as_str(), move |_uuid, _lock| {
        let runner = Arc::clone(&runner);
        Box::pin(async move {
            info!("Daily trigger fired");
            runner.run_trigger().await;
        })
    })?;

    let mut scheduler = JobScheduler::new().await?;
    scheduler.add(job).await?;
    scheduler.start().await?;
    info!("Started strategy with daily trigger at {} UTC", trigger);
    Ok(scheduler)
}

/// Resolves on Ctrl-C, or SIGTERM on unix (`docker stop`).
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
