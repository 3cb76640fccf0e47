use anyhow::Context;
use tracing_subscriber::EnvFilter;

use chambers_db::db::{ConnectionManager, CONFIG_FILE};
use chambers_db::ui::{notify_error, notify_success, ConsoleNotifier};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let manager = ConnectionManager::from_config_file(CONFIG_FILE);
    let notifier = ConsoleNotifier::stderr();

    match manager.probe().await {
        Ok(info) => {
            let version = info.server_version.as_deref().unwrap_or("unknown version");
            notify_success(
                &notifier,
                &(),
                "Database",
                &format!("Connected to {} in {} ms", version, info.latency_ms),
            );
            let json = serde_json::to_string_pretty(&info).context("Failed to encode probe result")?;
            println!("{}", json);
            Ok(())
        }
        Err(e) => {
            notify_error(&notifier, &(), "Database Error", &e.to_string());
            Err(e).context(format!("Could not reach {}", manager.settings().address))
        }
    }
}
