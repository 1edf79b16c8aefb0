use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vpnshop_db::db::init_db;
use vpnshop_panel::bot_manager::BotManager;
use vpnshop_panel::services::PlategaClient;
use vpnshop_panel::settings::Settings;
use vpnshop_panel::{AppState, cli, handlers};

#[derive(Parser)]
#[command(name = "vpnshop")]
#[command(about = "VPN shop: Telegram bot and payment callback server", long_about = None)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the web server and the bot
    Serve,
    /// Start only the web server
    Web,
    /// Start only the bot
    Bot,
    /// Administrative tools
    Admin {
        #[command(subcommand)]
        subcommand: AdminCommands,
    },
    /// Install as a systemd service
    Install {
        /// Unit name under /etc/systemd/system
        #[arg(long, default_value = "vpnshop")]
        name: String,
        /// Account the service runs as
        #[arg(long, default_value = "vpnshop")]
        user: String,
        /// Print the unit instead of writing it
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Show user and order totals
    Stats,
    /// Show one order
    Order {
        /// Order id, e.g. vpn_42_1700000000000
        order_id: String,
    },
    /// Ask the gateway about a pending order
    Poll { order_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        println!("⚠️  Warning: Failed to load .env file: {}", e);
    }

    let args = Cli::parse();

    let file_appender = tracing_appender::rolling::never(".", "server.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vpnshop=debug,vpnshop_panel=debug,tower_http=info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stdout))
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    if let Commands::Install { name, user, dry_run } = &args.command {
        return cli::install_service(&cli::InstallOptions {
            unit_name: name.clone(),
            user: user.clone(),
            config: args.config.clone(),
            dry_run: *dry_run,
        });
    }

    let settings = Arc::new(Settings::load(args.config.as_deref())?);
    let pool = init_db(&settings.database_url)
        .await
        .with_context(|| format!("Failed to open database {}", settings.database_url))?;

    let gateway = Arc::new(PlategaClient::new(&settings.platega));
    let bot_manager = Arc::new(BotManager::new(settings.vpn_duration_days));
    let state = AppState::new(pool, settings.clone(), gateway, bot_manager.clone());

    match args.command {
        Commands::Serve => {
            if settings.bot_token.is_empty() {
                tracing::warn!("BOT_TOKEN is not set, running without the bot");
            } else if !bot_manager.start_bot(&settings.bot_token, state.clone()).await {
                tracing::error!("Bot failed to start, continuing with the web server only");
            } else {
                check_bot_username(&settings, &bot_manager).await;
            }
            run_server(state).await?;
            bot_manager.stop_bot().await;
        }
        Commands::Web => {
            // Outgoing notifications only; updates are consumed by the `bot` process.
            if settings.bot_token.is_empty() {
                tracing::warn!("BOT_TOKEN is not set, payment notifications are disabled");
            } else if bot_manager.connect(&settings.bot_token).await {
                check_bot_username(&settings, &bot_manager).await;
            } else {
                tracing::warn!("Payment notifications are disabled");
            }
            run_server(state).await?;
        }
        Commands::Bot => {
            if settings.bot_token.is_empty() {
                anyhow::bail!("BOT_TOKEN is not set");
            }
            if !bot_manager.start_bot(&settings.bot_token, state.clone()).await {
                anyhow::bail!("Bot failed to start");
            }
            check_bot_username(&settings, &bot_manager).await;
            shutdown_signal().await;
            bot_manager.stop_bot().await;
        }
        Commands::Admin { subcommand } => match subcommand {
            AdminCommands::Stats => cli::print_stats(&state).await?,
            AdminCommands::Order { order_id } => cli::print_order(&state, &order_id).await?,
            AdminCommands::Poll { order_id } => cli::poll_order(&state, &order_id).await?,
        },
        Commands::Install { .. } => {}
    }

    Ok(())
}

/// Gateway return links point at the configured username, not the one Telegram reports.
async fn check_bot_username(settings: &Settings, bot_manager: &BotManager) {
    let Some(actual) = bot_manager.get_username().await else {
        return;
    };
    let configured = settings.bot_username.trim_start_matches('@');
    if configured.is_empty() {
        tracing::warn!("BOT_USERNAME is not set, the bot is @{}; return links will not reach it", actual);
    } else if !configured.eq_ignore_ascii_case(&actual) {
        tracing::warn!("BOT_USERNAME is @{} but the token belongs to @{}", configured, actual);
    }
}

async fn run_server(state: AppState) -> Result<()> {
    let port = state.settings.listen_port;
    tracing::info!("Price: {} {}", state.settings.price, state.settings.currency);
    tracing::info!("Public URL: {}", state.settings.web_url);
    tracing::info!("Callback URL: {}", state.settings.callback_url());

    let app = handlers::router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
