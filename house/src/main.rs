use anyhow::{Context, Result};
use arcade_house::{Api, House, HouseConfig, HouseSecret};
use arcade_types::Token;
use clap::Parser;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use rust_decimal::Decimal;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing() -> Result<()> {
    let endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
        .ok()
        .and_then(|value| {
            let trimmed = value.trim().to_string();
            (!trimmed.is_empty()).then_some(trimmed)
        });

    if let Some(endpoint) = endpoint {
        let service_name =
            std::env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| "arcade-house".to_string());
        let rate = std::env::var("OTEL_SAMPLING_RATE")
            .ok()
            .and_then(|value| value.parse::<f64>().ok())
            .map(|value| value.clamp(0.0, 1.0))
            .unwrap_or(1.0);
        let exporter = opentelemetry_otlp::SpanExporter::builder()
            .with_http()
            .with_endpoint(endpoint)
            .build()
            .context("failed to build OTLP exporter")?;
        let tracer_provider = opentelemetry_sdk::trace::SdkTracerProvider::builder()
            .with_sampler(opentelemetry_sdk::trace::Sampler::TraceIdRatioBased(rate))
            .with_resource(
                opentelemetry_sdk::Resource::builder_empty()
                    .with_attributes([opentelemetry::KeyValue::new("service.name", service_name)])
                    .build(),
            )
            .with_batch_exporter(exporter)
            .build();
        let tracer = tracer_provider.tracer("arcade-house");
        opentelemetry::global::set_tracer_provider(tracer_provider);

        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_filter(LevelFilter::INFO))
            .with(tracing_opentelemetry::layer().with_tracer(tracer))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .init();
    }

    Ok(())
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Host interface to bind (default: localhost).
    #[arg(long, default_value = "127.0.0.1")]
    host: IpAddr,

    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// Credit canonical payouts to the ledger (payouts are recorded as deferred otherwise).
    #[arg(long, default_value_t = false)]
    payouts_enabled: bool,

    /// Minimum bet amount (default: 0.01).
    #[arg(long)]
    min_bet: Option<String>,

    /// Maximum bet amount (0 disables limit).
    #[arg(long)]
    max_bet: Option<String>,

    /// Comma separated tokens accepted for wagers (any token when omitted).
    #[arg(long, value_delimiter = ',')]
    allowed_tokens: Vec<String>,

    /// Seconds an unreported round stays open before it is settled automatically.
    #[arg(long)]
    round_ttl_secs: Option<u64>,

    /// Path to SQLite database for ledger persistence (in-memory only when omitted).
    #[arg(long)]
    persistence_path: Option<PathBuf>,

    /// Max queued persistence writes (0 uses default).
    #[arg(long)]
    persistence_buffer: Option<usize>,

    /// Maximum number of wagers retained per wallet (0 disables limit).
    #[arg(long)]
    wager_history_limit: Option<usize>,

    /// HTTP rate limit per IP in requests per second (0 disables rate limiting).
    #[arg(long, env = "HOUSE_RATE_LIMIT_PER_SECOND")]
    http_rate_limit_per_second: Option<u64>,

    /// HTTP rate limit burst size (0 disables rate limiting).
    #[arg(long, env = "HOUSE_RATE_LIMIT_BURST")]
    http_rate_limit_burst: Option<u32>,

    /// Max request body size in bytes (0 disables limit).
    #[arg(long)]
    http_body_limit_bytes: Option<usize>,

    /// Comma separated browser origins allowed to call the house (`*` allows any).
    #[arg(long, env = "HOUSE_ALLOWED_ORIGINS", value_delimiter = ',')]
    allowed_origins: Vec<String>,

    /// Accept requests without an Origin header (bots and server-side callers).
    #[arg(long, env = "HOUSE_ALLOW_NO_ORIGIN")]
    allow_no_origin: bool,

    /// Bearer token required by /metrics (open when unset).
    #[arg(long, env = "HOUSE_METRICS_TOKEN", hide_env_values = true)]
    metrics_token: Option<String>,

    /// Refuse to start without an origin list, metrics token, rate limit and house secret.
    #[arg(long, env = "HOUSE_PRODUCTION")]
    production: bool,
}

/// Maps an optional arg value to Option: 0 => None, Some(v) => Some(v), None => default
fn map_optional_limit<T: Copy + PartialEq + From<u8>>(
    arg: Option<T>,
    default: Option<T>,
) -> Option<T> {
    match arg {
        Some(v) if v == T::from(0) => None,
        Some(v) => Some(v),
        None => default,
    }
}

/// Maps an optional arg value keeping the default on 0.
/// 0 => default, Some(v) => Some(v), None => default
fn map_optional_default_on_zero<T: Copy + PartialEq + From<u8>>(
    arg: Option<T>,
    default: Option<T>,
) -> Option<T> {
    match arg {
        Some(v) if v == T::from(0) => default,
        Some(v) => Some(v),
        None => default,
    }
}

fn parse_amount(field: &str, value: &str) -> Result<Decimal> {
    let amount: Decimal = value
        .trim()
        .parse()
        .with_context(|| format!("invalid {field}: {value}"))?;
    if amount.is_sign_negative() {
        anyhow::bail!("invalid {field}: {value}");
    }
    Ok(amount)
}

fn load_house_secret(production: bool) -> Result<HouseSecret> {
    match std::env::var("HOUSE_SECRET") {
        Ok(value) if !value.trim().is_empty() => HouseSecret::from_hex(&value)
            .context("HOUSE_SECRET must be 32 bytes of hex"),
        _ if production => anyhow::bail!("HOUSE_SECRET is required in production"),
        _ => {
            warn!("HOUSE_SECRET not set; generated an ephemeral secret");
            Ok(HouseSecret::generate())
        }
    }
}

fn build_config(args: &Args) -> Result<HouseConfig> {
    let defaults = HouseConfig::default();

    let min_bet = match args.min_bet.as_deref() {
        Some(value) => parse_amount("min_bet", value)?,
        None => defaults.min_bet,
    };
    let max_bet = match args.max_bet.as_deref() {
        Some(value) => {
            let max_bet = parse_amount("max_bet", value)?;
            (!max_bet.is_zero()).then_some(max_bet)
        }
        None => defaults.max_bet,
    };
    if let Some(max_bet) = max_bet {
        if max_bet < min_bet {
            anyhow::bail!("max_bet {max_bet} is below min_bet {min_bet}");
        }
    }
    let allowed_tokens = args
        .allowed_tokens
        .iter()
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(|value| Token::parse(value).with_context(|| format!("invalid token: {value}")))
        .collect::<Result<Vec<_>>>()?;
    if let Some(0) = args.round_ttl_secs {
        anyhow::bail!("round_ttl_secs must be > 0 when set");
    }

    Ok(HouseConfig {
        payouts_enabled: args.payouts_enabled,
        min_bet,
        max_bet,
        allowed_tokens,
        round_ttl_secs: args.round_ttl_secs.unwrap_or(defaults.round_ttl_secs),
        persistence_path: args.persistence_path.clone(),
        persistence_buffer: map_optional_default_on_zero(
            args.persistence_buffer,
            defaults.persistence_buffer,
        ),
        wager_history_limit: map_optional_limit(
            args.wager_history_limit,
            defaults.wager_history_limit,
        ),
        http_rate_limit_per_second: map_optional_limit(
            args.http_rate_limit_per_second,
            defaults.http_rate_limit_per_second,
        ),
        http_rate_limit_burst: map_optional_limit(
            args.http_rate_limit_burst,
            defaults.http_rate_limit_burst,
        ),
        http_body_limit_bytes: map_optional_limit(
            args.http_body_limit_bytes,
            defaults.http_body_limit_bytes,
        ),
        allowed_origins: args
            .allowed_origins
            .iter()
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect(),
        allow_no_origin: args.allow_no_origin,
        metrics_token: args
            .metrics_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(str::to_string),
        house_secret: defaults.house_secret,
    })
}

/// Settings a production house must not run without.
fn check_production(config: &HouseConfig) -> Result<()> {
    if config.allowed_origins.is_empty() {
        anyhow::bail!("allowed_origins must be set in production");
    }
    if config.metrics_token.is_none() {
        anyhow::bail!("metrics_token must be set in production");
    }
    if config.http_rate_limit_per_second.is_none() || config.http_rate_limit_burst.is_none() {
        anyhow::bail!("HTTP rate limiting must stay enabled in production");
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(?err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse args
    let args = Args::parse();

    // Create logger
    init_tracing()?;

    let mut config = build_config(&args)?;
    if args.production {
        check_production(&config)?;
    }
    config.house_secret = load_house_secret(args.production)?;
    if config.payouts_enabled {
        warn!("payouts_enabled: canonical payouts will be credited to player balances");
    } else {
        info!("payouts disabled: winning rounds are recorded as deferred");
    }

    let house = Arc::new(House::load(config).context("load house state")?);

    // Settle rounds nobody reported
    let sweeper = house.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweeper.config.expiry_sweep_interval());
        loop {
            interval.tick().await;
            sweeper.expire_rounds().await;
        }
    });

    let api = Api::new(house.clone());
    let app = api.router();

    // Start server
    let addr = SocketAddr::new(args.host, args.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Listening on {}", addr);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("axum server error")?;

    // Open rounds are not persisted; settle them so no debited stake is orphaned
    house.settle_open_rounds().await;
    house.flush().await;
    Ok(())
}
