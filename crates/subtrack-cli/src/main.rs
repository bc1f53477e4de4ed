//! Subtrack CLI: manage subscriptions and run the daily lifecycle job.
//!
//! Set SUBTRACK_DATABASE_URL (or DATABASE_URL). See `Config` for the other settings.

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use subtrack_cli::{parse_billing_cycle, parse_instant, print_json, AppContext};
use subtrack_core::models::{BillingCycle, NewSubscription, UpdateSubscription};
use subtrack_core::Config;
use subtrack_worker::{LifecycleScheduler, LifecycleSchedulerConfig};

#[derive(Parser)]
#[command(name = "subtrack", about = "Subscription tracker with renewal and payment reminders")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a subscription
    Add {
        #[arg(long)]
        name: String,
        /// Price per billing cycle, e.g. 9.99
        #[arg(long)]
        price: Decimal,
        /// weekly, monthly, quarterly or yearly
        #[arg(long, value_parser = parse_billing_cycle)]
        cycle: BillingCycle,
        /// First charge date (YYYY-MM-DD or RFC 3339). Defaults to now.
        #[arg(long, value_parser = parse_instant)]
        start: Option<DateTime<Utc>>,
    },
    /// List all subscriptions, most recent first
    List,
    /// Show one subscription with its derived dates
    Show { id: i64 },
    /// Edit a subscription
    Edit {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        price: Option<Decimal>,
        #[arg(long, value_parser = parse_billing_cycle)]
        cycle: Option<BillingCycle>,
        #[arg(long, value_parser = parse_instant)]
        start: Option<DateTime<Utc>>,
    },
    /// Cancel an active subscription
    Cancel { id: i64 },
    /// Delete a subscription and its reminder history
    Delete { id: i64 },
    /// Monthly spending summary
    Summary,
    /// Active subscriptions charging within the next week, soonest first
    Upcoming,
    /// Show or change the global notifications switch
    Notifications {
        #[arg(value_enum)]
        state: Option<Switch>,
    },
    /// Run renewals and reminders once
    RunOnce {
        /// Evaluate as of this instant instead of now
        #[arg(long, value_parser = parse_instant)]
        at: Option<DateTime<Utc>>,
    },
    /// Run the daily scheduler until interrupted
    Serve,
}

#[derive(Clone, Copy, ValueEnum)]
enum Switch {
    On,
    Off,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::from_env().context("Failed to load configuration")?;
    subtrack_infra::init_telemetry(&config.environment, config.is_production())
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;

    let app = AppContext::connect(&config).await?;
    let now = Utc::now();

    match cli.command {
        Commands::Add {
            name,
            price,
            cycle,
            start,
        } => {
            let subscription = app
                .subscriptions
                .create(
                    NewSubscription {
                        name,
                        price,
                        billing_cycle: cycle,
                        start_date: start.unwrap_or(now),
                    },
                    now,
                )
                .await?;
            print_json(&subscription)?;
        }
        Commands::List => {
            print_json(&app.subscriptions.list().await?)?;
        }
        Commands::Show { id } => {
            let subscription = app.subscriptions.get(id).await?;
            let next_billing_date = subscription.next_billing_date(now)?;
            let remaining_days = subscription.remaining_days(now)?;
            print_json(&serde_json::json!({
                "subscription": subscription,
                "next_billing_date": next_billing_date,
                "remaining_days": remaining_days,
            }))?;
        }
        Commands::Edit {
            id,
            name,
            price,
            cycle,
            start,
        } => {
            let changes = UpdateSubscription {
                name,
                price,
                billing_cycle: cycle,
                start_date: start,
            };
            print_json(&app.subscriptions.update(id, changes, now).await?)?;
        }
        Commands::Cancel { id } => {
            print_json(&app.subscriptions.cancel(id, now).await?)?;
        }
        Commands::Delete { id } => {
            let deleted = app.subscriptions.delete(id).await?;
            print_json(&serde_json::json!({ "id": id, "deleted": deleted }))?;
        }
        Commands::Summary => {
            print_json(&app.subscriptions.summary().await?)?;
        }
        Commands::Upcoming => {
            print_json(&app.subscriptions.upcoming(now).await?)?;
        }
        Commands::Notifications { state } => {
            if let Some(state) = state {
                app.settings
                    .set_notifications_enabled(matches!(state, Switch::On))
                    .await?;
            }
            let enabled = app.settings.is_notifications_enabled().await?;
            print_json(&serde_json::json!({ "notifications_enabled": enabled }))?;
        }
        Commands::RunOnce { at } => {
            let report = app
                .job
                .run_once(at.unwrap_or(now))
                .await
                .map_err(|e| e.into_inner())?;
            print_json(&report)?;
        }
        Commands::Serve => {
            let scheduler =
                LifecycleScheduler::start(app.job.clone(), LifecycleSchedulerConfig::from(&config));
            shutdown_signal().await;
            scheduler.shutdown().await;
        }
    }

    subtrack_infra::shutdown_telemetry().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal");
        },
    }

    tracing::info!("Shutting down gracefully...");
}
