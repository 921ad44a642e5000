mod config;
mod dispatch;
mod extract;
mod gate;
mod notify;
mod slack;
mod telegram;
mod types;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{any, get},
    Router,
};
use config::{ChannelSource, Config};
use dispatch::Dispatcher;
use extract::AlertExtractor;
use gate::{Admitted, InboundAuth};
use notify::{LogNotifier, Notifier};
use serde_json::json;
use slack::SlackWebClient;
use std::sync::Arc;
use std::time::Duration;
use telegram::TelegramClient;
use tracing::{error, info, warn};

#[derive(Clone)]
struct AppState {
    auth: Arc<InboundAuth>,
    extractor: Arc<AlertExtractor>,
    dispatcher: Dispatcher,
}

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "grafana_relay=info,tower_http=info".into()),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    if config.dry_run {
        warn!("DRY_RUN mode enabled - alerts will NOT be sent to Telegram");
    }
    if config.auth.token.is_none() && config.auth.signing_secret.is_none() {
        warn!("No SLACK_OUTGOING_WEBHOOK_TOKEN or SLACK_SIGNING_SECRET set - accepting unauthenticated events");
    }

    let channel_id = match config.channel.clone() {
        ChannelSource::Id(id) => id,
        ChannelSource::Name { name, bot_token } => resolve_channel(&name, bot_token).await,
    };

    let extractor = match AlertExtractor::new(channel_id, &config.marker, &config.tenant) {
        Ok(extractor) => extractor,
        Err(e) => {
            error!("Invalid ALERT_TENANT {:?}: {}", config.tenant, e);
            std::process::exit(1);
        }
    };
    info!(
        "Watching channel {} for {:?} alerts of tenant {:?}",
        extractor.channel_id(),
        config.marker,
        config.tenant
    );

    let dispatcher = build_dispatcher(&config).await;
    let state = AppState {
        auth: Arc::new(config.auth.clone()),
        extractor: Arc::new(extractor),
        dispatcher,
    };

    let app = router(state).layer(tower_http::trace::TraceLayer::new_for_http());

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    info!("Starting server on {}", addr);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Resolves the target channel by name (with timeout to avoid blocking server
/// startup), exiting the process when it cannot be found.
async fn resolve_channel(name: &str, bot_token: String) -> String {
    info!("Resolving channel ID for #{}", name);
    let slack = SlackWebClient::new(bot_token, slack::DEFAULT_API_BASE.to_string());
    let resolved =
        tokio::time::timeout(Duration::from_secs(10), slack.resolve_channel_id_by_name(name))
            .await;

    match resolved {
        Ok(Ok(Some(id))) => {
            info!("Found channel ID: {}", id);
            id
        }
        Ok(Ok(None)) => {
            error!("Channel #{} not found", name);
            std::process::exit(1);
        }
        Ok(Err(e)) => {
            error!("Failed to resolve channel: {}", e);
            std::process::exit(1);
        }
        Err(_) => {
            error!("Channel resolution timed out after 10 seconds");
            std::process::exit(1);
        }
    }
}

async fn build_dispatcher(config: &Config) -> Dispatcher {
    let destination = config
        .telegram
        .as_ref()
        .map(|t| t.chat_id.clone())
        .unwrap_or_else(|| "dry-run".to_string());

    let notifier: Arc<dyn Notifier> = match &config.telegram {
        Some(telegram) if !config.dry_run => {
            let client = TelegramClient::new(
                telegram.bot_token.clone(),
                telegram.bot_username.clone(),
                telegram.api_base.clone(),
            );
            check_telegram_bot(&client).await;
            info!("Forwarding alerts to Telegram chat {}", destination);
            Arc::new(client)
        }
        _ => Arc::new(LogNotifier),
    };

    Dispatcher::new(notifier, destination)
}

/// Confirms the bot token works. Failures are logged only, so Slack keeps
/// getting acknowledged while Telegram is misconfigured.
async fn check_telegram_bot(client: &TelegramClient) {
    match tokio::time::timeout(Duration::from_secs(10), client.get_me()).await {
        Ok(Ok(Some(username))) => {
            info!("Telegram bot authenticated as @{}", username);
            if let Some(expected) = client.bot_username() {
                if !expected.trim_start_matches('@').eq_ignore_ascii_case(&username) {
                    warn!(
                        "TELEGRAM_BOT_USERNAME is {} but the token belongs to @{}",
                        expected, username
                    );
                }
            }
        }
        Ok(Ok(None)) => warn!("Telegram getMe returned no username"),
        Ok(Err(e)) => warn!("Telegram bot check failed: {}", e),
        Err(_) => warn!("Telegram bot check timed out after 10 seconds"),
    }
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        // All methods reach the handler so the gate answers 405 itself
        .route("/slack/events", any(slack_events_handler))
        .with_state(state)
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn slack_events_handler(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    info!(
        "Received {} /slack/events, body length: {} bytes",
        method,
        body.len()
    );

    let event = match gate::admit(&state.auth, &method, &headers, &body) {
        Ok(Admitted::Challenge(challenge)) => {
            info!("Responding to URL verification challenge");
            return Json(json!({ "challenge": challenge })).into_response();
        }
        Ok(Admitted::Event(event)) => event,
        Err(e) => return e.into_response(),
    };

    if let Some(record) = state.extractor.extract(event.as_ref()) {
        info!(
            "Forwarding {:?} alert for {} server(s)",
            record.status,
            record.servers.len()
        );
        // Slack must get its OK without waiting on Telegram
        state.dispatcher.spawn(record);
    }

    (StatusCode::OK, "OK").into_response()
}
