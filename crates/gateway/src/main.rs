use std::{path::PathBuf, sync::Arc, time::Duration};

use {
    anyhow::Context,
    clap::Parser,
    tracing::{debug, info, warn},
    tracing_subscriber::EnvFilter,
};

use {
    doorman_gateway::{AppConfig, Gateway, server},
    doorman_storage::{SqliteStore, StateStore},
    doorman_telegram::{App, BotApi},
};

/// How often expired rows are swept out of the SQLite store.
const PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[derive(Parser)]
#[command(name = "doorman", version, about = "Verification-gated Telegram relay bot")]
struct Cli {
    /// Path to a TOML config file.
    #[arg(long, env = "DOORMAN_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,

    /// Override the configured bind address.
    #[arg(long)]
    bind: Option<String>,

    /// Override the configured port.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(bind) = cli.bind {
        config.bind = bind;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    config.validate()?;

    let store = Arc::new(
        SqliteStore::open(&config.db_path)
            .await
            .with_context(|| format!("opening state store at {}", config.db_path))?,
    );
    spawn_purge_loop(Arc::clone(&store));

    let api = BotApi::new(&config.bot_token);
    let app = App::new(
        api.clone(),
        Arc::clone(&store) as Arc<dyn StateStore>,
        config.staff_chat,
    );
    let gateway = Arc::new(Gateway {
        app,
        api,
        webhook_url: config.webhook_url.clone(),
        webhook_secret: config.webhook_secret.clone(),
    });

    let addr = format!("{}:{}", config.bind, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, staff_chat = config.staff_chat, "doorman listening");
    axum::serve(listener, server::router(gateway)).await?;
    Ok(())
}

fn spawn_purge_loop(store: Arc<SqliteStore>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PURGE_INTERVAL);
        loop {
            interval.tick().await;
            match store.purge_expired().await {
                Ok(0) => {},
                Ok(purged) => debug!(purged, "swept expired state"),
                Err(e) => warn!(error = %e, "state purge failed"),
            }
        }
    });
}

fn init_logging(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if cli.json_logs {
        builder.json().init();
    } else {
        builder.init();
    }
}
