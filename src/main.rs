use std::sync::Arc;

use anyhow::{bail, Context};
use lynx::models::RecordId;
use lynx::pipeline::{QueuedSpawner, TaskSpawner, TokioSpawner};
use lynx::{App, Config};

const USAGE: &str = "usage: lynx [--refresh | --add <user_id> <url> | --subscribe <user_id> <url>]";

enum Command {
    Daemon,
    Refresh,
    Add { user_id: RecordId, url: String },
    Subscribe { user_id: RecordId, url: String },
}

fn parse_args(args: &[String]) -> anyhow::Result<Command> {
    match args.get(1).map(String::as_str) {
        None => Ok(Command::Daemon),
        Some("--refresh") => Ok(Command::Refresh),
        Some(flag @ ("--add" | "--subscribe")) => {
            let (Some(user_id), Some(url)) = (args.get(2), args.get(3)) else {
                bail!(USAGE);
            };
            let user_id = user_id
                .parse()
                .with_context(|| format!("invalid user id: {}", user_id))?;
            let url = url.clone();
            Ok(if flag == "--add" {
                Command::Add { user_id, url }
            } else {
                Command::Subscribe { user_id, url }
            })
        }
        Some(_) => bail!(USAGE),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("lynx=info,warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let command = parse_args(&args)?;
    let config = Config::load().context("failed to load configuration")?;

    match command {
        Command::Daemon => {
            let app = App::new(&config, Arc::new(TokioSpawner)).await?;
            let poller = app.poller();
            tracing::info!(
                interval_minutes = config.poll_interval_minutes,
                "Starting feed scheduler"
            );
            poller
                .run_scheduler(config.poll_interval(), async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        tracing::error!(error = %e, "Failed to listen for ctrl-c");
                    }
                })
                .await;
        }
        Command::Refresh => {
            let spawner = Arc::new(QueuedSpawner::new());
            let app = App::new(&config, spawner.clone() as Arc<dyn TaskSpawner>).await?;
            let summary = app.refresh_feeds(None, None).await?;
            spawner.run_pending().await;
            println!(
                "Refreshed {} feeds ({} failed, {} new items)",
                summary.polled, summary.failed, summary.new_items
            );
        }
        Command::Add { user_id, url } => {
            let spawner = Arc::new(QueuedSpawner::new());
            let app = App::new(&config, spawner.clone() as Arc<dyn TaskSpawner>).await?;
            let link = app.submit_url(user_id, &url, None).await?;
            spawner.run_pending().await;
            println!("Saved link {}: {}", link.id, link.title);
        }
        Command::Subscribe { user_id, url } => {
            let spawner = Arc::new(QueuedSpawner::new());
            let app = App::new(&config, spawner.clone() as Arc<dyn TaskSpawner>).await?;
            let feed_id = app.subscribe_feed(user_id, &url, false).await?;
            spawner.run_pending().await;
            println!("Subscribed to feed {}", feed_id);
        }
    }

    Ok(())
}
