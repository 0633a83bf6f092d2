// # telsyncd - Account Reconciliation Daemon
//
// The telsyncd daemon is a THIN integration layer only:
// 1. Reading configuration from environment variables
// 2. Initializing the runtime and tracing
// 3. Wiring collaborators to the registry
// 4. Running until a shutdown signal arrives
//
// All reconciliation, retry, and capability logic lives in telsync-core.
// This binary wires the simulated collaborators from telsync-sim, which is
// what makes it runnable outside a real telephony stack.
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Registry
// - `TELSYNC_COMPONENT`: Component name for published handles
// - `TELSYNC_USER`: Numeric id of the foreground user (default 0)
// - `TELSYNC_CLEANUP_CALL_CAPABLE_ONLY`: Restrict orphan cleanup scope
// - `TELSYNC_EMERGENCY_RTT_COUNTRIES`: Comma-separated ISO country codes
// - `TELSYNC_REQUIRE_DEFAULT_DATA_FOR_EMERGENCY_SUPL`: Device policy flag
//
// ### Backoff
// - `TELSYNC_LISTENER_BACKOFF_INITIAL_MS` / `TELSYNC_LISTENER_BACKOFF_CEILING_MS`
// - `TELSYNC_READINESS_BACKOFF_INITIAL_MS` / `TELSYNC_READINESS_BACKOFF_CEILING_MS`
//
// ### Simulated lines
// - `TELSYNC_LINES`: Comma-separated `id:name[:number]` entries
// - `TELSYNC_MULTI_SIM`: Treat the device as multi-SIM
//
// ### Logging
// - `TELSYNC_LOG_LEVEL`: trace, debug, info, warn, error
//
// ## Example
//
// ```bash
// export TELSYNC_LINES="1:Carrier One:+15550001,2:Carrier Two:+15550002"
// export TELSYNC_MULTI_SIM=true
// export TELSYNC_LOG_LEVEL=debug
//
// telsyncd
// ```

use anyhow::Result;
use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use telsync_core::traits::line_provider::{ImsRegState, Line, LineRecord};
use telsync_core::{AccountRegistry, Collaborators, LineId, RegistryConfig, UserId};
use telsync_sim::{
    SimAuthority, SimCarrierConfig, SimChangeSource, SimLineProvider, SimNotifier, SimPlatform,
};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum TelsyncExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<TelsyncExitCode> for ExitCode {
    fn from(code: TelsyncExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// One simulated line parsed from `TELSYNC_LINES`
struct LineSpec {
    id: i32,
    name: String,
    number: Option<String>,
}

/// Application configuration
struct Config {
    component: Option<String>,
    user: u32,
    cleanup_call_capable_only: bool,
    emergency_rtt_countries: Vec<String>,
    require_default_data_for_emergency_supl: bool,
    listener_initial_ms: Option<u64>,
    listener_ceiling_ms: Option<u64>,
    readiness_initial_ms: Option<u64>,
    readiness_ceiling_ms: Option<u64>,
    lines: Vec<LineSpec>,
    multi_sim: bool,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Ok(Self {
            component: env::var("TELSYNC_COMPONENT").ok(),
            user: parse_env("TELSYNC_USER")?.unwrap_or(0),
            cleanup_call_capable_only: parse_bool_env("TELSYNC_CLEANUP_CALL_CAPABLE_ONLY")?,
            emergency_rtt_countries: env::var("TELSYNC_EMERGENCY_RTT_COUNTRIES")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            require_default_data_for_emergency_supl: parse_bool_env(
                "TELSYNC_REQUIRE_DEFAULT_DATA_FOR_EMERGENCY_SUPL",
            )?,
            listener_initial_ms: parse_env("TELSYNC_LISTENER_BACKOFF_INITIAL_MS")?,
            listener_ceiling_ms: parse_env("TELSYNC_LISTENER_BACKOFF_CEILING_MS")?,
            readiness_initial_ms: parse_env("TELSYNC_READINESS_BACKOFF_INITIAL_MS")?,
            readiness_ceiling_ms: parse_env("TELSYNC_READINESS_BACKOFF_CEILING_MS")?,
            lines: parse_lines(&env::var("TELSYNC_LINES").unwrap_or_default())?,
            multi_sim: parse_bool_env("TELSYNC_MULTI_SIM")?,
            log_level: env::var("TELSYNC_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the configuration and produce the registry config
    fn registry_config(&self) -> Result<RegistryConfig> {
        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => anyhow::bail!(
                "TELSYNC_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                other
            ),
        }

        let mut config = RegistryConfig::default();
        if let Some(component) = &self.component {
            config.component = component.clone();
        }
        config.cleanup_call_capable_only = self.cleanup_call_capable_only;
        config.emergency_rtt_countries = self.emergency_rtt_countries.clone();
        config.require_default_data_for_emergency_supl =
            self.require_default_data_for_emergency_supl;
        if let Some(ms) = self.listener_initial_ms {
            config.listener_backoff.initial_delay_ms = ms;
        }
        if let Some(ms) = self.listener_ceiling_ms {
            config.listener_backoff.ceiling_ms = ms;
        }
        if let Some(ms) = self.readiness_initial_ms {
            config.readiness_backoff.initial_delay_ms = ms;
        }
        if let Some(ms) = self.readiness_ceiling_ms {
            config.readiness_backoff.ceiling_ms = ms;
        }

        // Surfaces range errors (zero delays, inverted ceilings) before the
        // runtime even starts.
        config.validate()?;
        Ok(config)
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("{} is not valid: {}", name, e)),
        Err(_) => Ok(None),
    }
}

fn parse_bool_env(name: &str) -> Result<bool> {
    match env::var(name) {
        Ok(raw) => match raw.to_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" => Ok(false),
            other => anyhow::bail!("{} must be a boolean, got '{}'", name, other),
        },
        Err(_) => Ok(false),
    }
}

/// Parse `TELSYNC_LINES` entries of the form `id:name[:number]`
fn parse_lines(raw: &str) -> Result<Vec<LineSpec>> {
    let mut specs = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let mut parts = entry.splitn(3, ':');
        let id: i32 = parts
            .next()
            .unwrap_or_default()
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("TELSYNC_LINES entry '{}' has no numeric id", entry))?;
        if id < 0 {
            anyhow::bail!("TELSYNC_LINES entry '{}' has a negative id", entry);
        }
        let name = parts
            .next()
            .ok_or_else(|| anyhow::anyhow!("TELSYNC_LINES entry '{}' has no name", entry))?
            .trim()
            .to_string();
        let number = parts.next().map(|n| n.trim().to_string());
        specs.push(LineSpec { id, name, number });
    }
    Ok(specs)
}

fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return TelsyncExitCode::ConfigError.into();
        }
    };

    let registry_config = match config.registry_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration validation error: {}", e);
            return TelsyncExitCode::ConfigError.into();
        }
    };

    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return TelsyncExitCode::ConfigError.into();
    }

    info!("Starting telsyncd daemon");
    info!("Configuration loaded: {} simulated line(s)", config.lines.len());

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return TelsyncExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(config, registry_config).await {
            error!("Daemon error: {}", e);
            TelsyncExitCode::RuntimeError
        } else {
            TelsyncExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Run the daemon
async fn run_daemon(config: Config, registry_config: RegistryConfig) -> Result<()> {
    let lines = SimLineProvider::new();
    let authority = SimAuthority::new();
    let notifier = SimNotifier::new();
    let carrier = SimCarrierConfig::new();
    let platform = SimPlatform::new();
    let changes = SimChangeSource::new();

    platform.set_multi_sim(config.multi_sim);
    platform.set_active_subscription_count(config.lines.len().max(1));

    for (slot, spec) in config.lines.iter().enumerate() {
        let line_id = LineId(spec.id);
        lines
            .upsert_line(
                sim_line(line_id, slot, &spec.name, spec.number.clone()),
                LineRecord {
                    line_id,
                    opportunistic: false,
                    provisioning: false,
                    satellite_only: false,
                },
            )
            .await;
        info!(line = %line_id, name = %spec.name, "seeded line");
    }
    if let Some(first) = config.lines.first() {
        let line_id = LineId(first.id);
        lines
            .set_default_line(sim_line(line_id, 0, &first.name, first.number.clone()))
            .await;
        lines.set_default_data(line_id).await;
        lines.set_default_voice(line_id).await;
        lines.set_active_data(line_id).await;
    } else {
        // A device without usable subscriptions still dials emergency calls
        // through a default line.
        lines
            .set_default_line(sim_line(LineId(0), 0, "Emergency", None))
            .await;
    }

    let collab = Collaborators {
        lines: Arc::new(lines),
        authority: Arc::new(authority),
        notifier: Arc::new(notifier),
        carrier: Arc::new(carrier),
        platform: Arc::new(platform),
    };

    let (registry, mut events) = AccountRegistry::new(
        collab,
        Arc::new(changes),
        registry_config,
        UserId(config.user),
    )?;
    registry.start().await;

    let event_logger = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            info!(?event, "registry event");
        }
    });

    let signal_name = wait_for_shutdown().await?;
    info!("Received shutdown signal: {}", signal_name);

    registry.stop("shutdown signal").await;
    event_logger.abort();

    let status = registry.status().await;
    info!(
        accounts = status.accounts.len(),
        emergency_active = status.emergency_active,
        "daemon stopped"
    );
    Ok(())
}

fn sim_line(id: LineId, slot_index: usize, name: &str, number: Option<String>) -> Line {
    Line {
        id,
        display_name: name.to_string(),
        number,
        slot_index,
        icon: None,
        highlight_color: 0xFF3366FF,
        group_identity: None,
        opportunistic: false,
        roaming: false,
        wifi_calling: false,
        ims_voice_available: true,
        video_capable: false,
        ims_registration: ImsRegState::Registered,
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    let name = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(name)
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
