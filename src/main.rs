use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use article_tracker::cli::Cli;
use article_tracker::notify::format_usd;
use article_tracker::web::{AppState, DashboardServer};
use article_tracker::{
    ArticleLedger, Config, CycleSettings, Database, FeedClient, PollCycle, Result, Scheduler,
    WebhookDispatcher,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let mut config = match Config::load_with_env(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {}: {e}", cli.config.display());
            return ExitCode::FAILURE;
        }
    };

    if cli.verbose {
        config.logging.level = "debug".to_string();
    }

    // Initialize logging
    if let Err(e) = article_tracker::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        article_tracker::logging::init_console_only(&config.logging.level);
    }

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, config: Config) -> Result<()> {
    info!("Article Tracker v{}", env!("CARGO_PKG_VERSION"));
    config.validate()?;

    let db = Database::connect(&config.database.url).await?;
    let ledger = ArticleLedger::new(db.pool().clone());
    let dispatcher = Arc::new(WebhookDispatcher::from_config(&config.webhook)?);

    if cli.test {
        info!("Sending test notification");
        let outcome = dispatcher
            .notify_test(
                config.tracker.article_value_cents(),
                config.tracker.daily_target,
                config.tracker.monthly_target,
            )
            .await;
        db.close().await;
        return if outcome.is_delivered() {
            info!("Test notification sent");
            Ok(())
        } else {
            Err(article_tracker::TrackerError::Delivery(format!(
                "test notification failed: {:?}",
                outcome
            )))
        };
    }

    let feed = Arc::new(FeedClient::new(&config.feed)?);
    let cycle = PollCycle::new(
        feed,
        ledger.clone(),
        dispatcher.clone(),
        CycleSettings::from_config(&config),
    );
    let scheduler = Scheduler::new(cycle, &config.scheduler);
    let cancel = CancellationToken::new();

    if cli.once {
        let result = scheduler.run_once(&cancel).await;
        db.close().await;
        let count = result?;
        info!("Single cycle complete: {} new article(s)", count);
        return Ok(());
    }

    let summary = startup_summary(&config);
    info!("\n{}", summary);
    if !dispatcher.notify_startup(&summary).await.is_delivered() {
        warn!("Startup notification was not delivered");
    }

    let dashboard = if config.dashboard.enabled {
        let server = DashboardServer::new(
            &config.dashboard,
            AppState::from_config(ledger.clone(), &config),
        )?;
        let token = cancel.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = server.run(token).await {
                error!("Dashboard error: {}", e);
            }
        }))
    } else {
        None
    };

    tokio::spawn(shutdown_signal(cancel.clone()));

    let summary = scheduler.run(cancel.clone()).await;
    cancel.cancel();
    if let Some(handle) = dashboard {
        let _ = handle.await;
    }
    db.close().await;

    info!(
        "Tracker stopped: {} cycle(s), {} new article(s)",
        summary.cycles, summary.new_articles
    );
    Ok(())
}

fn startup_summary(config: &Config) -> String {
    format!(
        "Sitemap: {}\nRate: {}/article\nDaily target: {}\nMonthly target: {}\n\
         Poll interval: {}s\nTimezone: {}\nDashboard: {}",
        config.feed.url,
        format_usd(config.tracker.article_value_cents()),
        config.tracker.daily_target,
        config.tracker.monthly_target,
        config.scheduler.poll_interval_secs,
        config.tracker.timezone,
        if config.webhook.dashboard_url.is_empty() {
            "-"
        } else {
            config.webhook.dashboard_url.as_str()
        },
    )
}

/// Cancel `token` on SIGINT or SIGTERM.
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("Shutdown signal received");
    token.cancel();
}
