use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use engine::{AppState, ConfigStore};

#[derive(Parser)]
#[command(name = "transfeed", version = env!("APP_VERSION"))]
#[command(about = "Feed subscription downloader", long_about = None)]
struct Cli {
    /// Directory holding config.toml, templates and webhook bodies
    #[arg(short, long, default_value = "configs")]
    config_dir: PathBuf,

    /// Ledger database file path
    #[arg(short, long, default_value = "data.sqlite3")]
    database: PathBuf,

    /// Run one update cycle immediately instead of waiting a full interval
    #[arg(long)]
    update_on_start: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let config_store = ConfigStore::load_or_create(cli.config_dir.join("config.toml")).await?;
    let config = config_store.get().await;

    let mut extract_templates = extract::TemplateStore::builtin();
    extract_templates.load_user_dir(&cli.config_dir.join("templates"))?;
    let webhook_templates = webhook::TemplateStore::new(cli.config_dir.join("webhooks"))?;

    let database_url = format!("sqlite:{}?mode=rwc", cli.database.display());
    let db = engine::db::create_pool(&database_url).await?;

    let state = AppState::new(db, config.clone(), extract_templates, webhook_templates);

    let interval = Duration::from_secs(config.poll_minutes * 60);
    state.scheduler.start(interval, true).await;
    tracing::info!("Polling every {} minutes", config.poll_minutes);

    if cli.update_on_start {
        state.scheduler.trigger_now().await;
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    state.scheduler.stop().await;

    Ok(())
}
