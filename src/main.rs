use std::sync::Arc;

use anyhow::Context;

use signup_bot::channels::TelegramClient;
use signup_bot::config::BotConfig;
use signup_bot::dispatcher::Dispatcher;
use signup_bot::registration::{self, RegistrationMachine, SessionStore};
use signup_bot::store::{LibSqlUserStore, UserStore};
use signup_bot::webhook::{WebhookState, webhook_routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine; real deployments set the environment directly.
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = BotConfig::from_env().context("Invalid configuration")?;

    eprintln!("🤖 Signup Bot v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Store: {}", config.store.describe());
    eprintln!("   Webhook: {}", config.webhook_url);
    eprintln!("   Listening: http://0.0.0.0:{}/webhook", config.port);

    // ── User store ──────────────────────────────────────────────────────
    let users: Arc<dyn UserStore> = Arc::new(
        LibSqlUserStore::open(&config.store)
            .await
            .context("Failed to open user store")?,
    );

    // ── Telegram ────────────────────────────────────────────────────────
    let telegram = Arc::new(TelegramClient::new(config.bot_token.clone()));
    let bot_name = telegram.get_me().await.context("Bot token rejected")?;
    telegram
        .set_webhook(&config.webhook_url)
        .await
        .context("Failed to register webhook")?;
    eprintln!("   Bot: @{bot_name}");

    // ── Sessions ────────────────────────────────────────────────────────
    let sessions = Arc::new(SessionStore::new());
    match config.session_idle_timeout {
        Some(idle) => {
            let _sweep_handle = registration::spawn_sweep_task(Arc::clone(&sessions), idle);
            eprintln!("   Sessions: expire after {} min idle\n", idle.as_secs() / 60);
        }
        None => eprintln!("   Sessions: no idle expiry\n"),
    }

    // ── Webhook server ──────────────────────────────────────────────────
    let machine = RegistrationMachine::new(sessions, users, config.store_timeout);
    let dispatcher = Arc::new(Dispatcher::new(machine, telegram));
    let app = webhook_routes(WebhookState { dispatcher });

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.port))?;
    tracing::info!(port = config.port, "Webhook server started");
    axum::serve(listener, app).await?;

    Ok(())
}
