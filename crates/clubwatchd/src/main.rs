// # clubwatchd - Club Watcher Daemon
//
// This daemon is a THIN integration layer:
// - DO NOT add polling, diffing or retry logic here
// - All watch logic lives in clubwatch-core
// - Configuration is via environment variables ONLY
//
// The clubwatchd daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Registering sources and notifiers
// 4. Starting the watch engine and mapping its outcome to an exit code
//
// ## Configuration
//
// ### Sources
// - `CLUBWATCH_CLUB_ID`: Club name as listed by the registration-ban API
//   (enables the count source)
// - `CLUBWATCH_COUNT_URL`: Override for the registration-ban endpoint
// - `CLUBWATCH_ROSTER_URL`: Roster form page (enables the roster source)
// - `CLUBWATCH_ROSTER_SEASON`: Season filter of the roster form
//
// ### Messages
// - `CLUBWATCH_CLUB_NAME`: Display name (defaults to the club id)
//
// ### Notifier
// - `CLUBWATCH_NOTIFIER_TYPE`: Notifier type (webhook, log)
// - `CLUBWATCH_NOTIFY_URL`: Webhook endpoint
// - `CLUBWATCH_NOTIFY_TOKEN`: Bearer token
// - `CLUBWATCH_MODE`: `dry-run` logs messages instead of sending them
//
// ### State Store
// - `CLUBWATCH_STATE_STORE_TYPE`: Type of state store (file, memory)
// - `CLUBWATCH_STATE_STORE_PATH`: Path to state file (for file store)
//
// ### Engine
// - `CLUBWATCH_POLL_INTERVAL_SECS`: Seconds between cycles (default 600)
// - `CLUBWATCH_FORCE_BASELINE`: Announce a baseline on the first cycle.
//   Read once per process start and not recorded in the state file: unset it
//   after use, or every restart announces a baseline again.
// - `CLUBWATCH_LOG_LEVEL`: trace, debug, info, warn, error
//
// ## Example
//
// ```bash
// export CLUBWATCH_CLUB_ID="KAYSERISPOR FUTBOL A.S."
// export CLUBWATCH_CLUB_NAME=Kayserispor
// export CLUBWATCH_NOTIFY_URL=https://hooks.example.org/notify
// export CLUBWATCH_NOTIFY_TOKEN=your_token
// export CLUBWATCH_STATE_STORE_PATH=/var/lib/clubwatch/state.json
//
// clubwatchd
// ```

use anyhow::Result;
use clubwatch_core::config::{
    CountSourceConfig, EngineConfig, FormRosterConfig, NotifierConfig, SourceConfig,
    StateStoreConfig, WatchConfig,
};
use clubwatch_core::{EngineEvent, NotifyError, WatchEngine, WatchRegistry};
use std::env;
use std::process::ExitCode;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Exit codes for different termination scenarios
///
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
/// - 3: Notifier credentials rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClubwatchExitCode {
    CleanShutdown = 0,
    ConfigError = 1,
    RuntimeError = 2,
    AuthError = 3,
}

impl From<ClubwatchExitCode> for ExitCode {
    fn from(code: ClubwatchExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

const DEFAULT_POLL_INTERVAL_SECS: u64 = 600;

/// Daemon configuration as read from the environment
struct Config {
    club_id: Option<String>,
    club_name: Option<String>,
    count_url: Option<String>,
    roster_url: Option<String>,
    roster_season: Option<String>,
    notifier_type: String,
    notify_url: Option<String>,
    notify_token: Option<String>,
    dry_run: bool,
    state_store_type: String,
    state_store_path: Option<String>,
    poll_interval_secs: u64,
    force_baseline: bool,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through a variable lookup
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let poll_interval_secs = match non_empty("CLUBWATCH_POLL_INTERVAL_SECS") {
            Some(raw) => raw.trim().parse().map_err(|_| {
                anyhow::anyhow!(
                    "CLUBWATCH_POLL_INTERVAL_SECS must be a whole number of seconds. Got: {}",
                    raw
                )
            })?,
            None => DEFAULT_POLL_INTERVAL_SECS,
        };

        Ok(Self {
            club_id: non_empty("CLUBWATCH_CLUB_ID"),
            club_name: non_empty("CLUBWATCH_CLUB_NAME"),
            count_url: non_empty("CLUBWATCH_COUNT_URL"),
            roster_url: non_empty("CLUBWATCH_ROSTER_URL"),
            roster_season: non_empty("CLUBWATCH_ROSTER_SEASON"),
            notifier_type: non_empty("CLUBWATCH_NOTIFIER_TYPE")
                .unwrap_or_else(|| "webhook".to_string()),
            notify_url: non_empty("CLUBWATCH_NOTIFY_URL"),
            notify_token: non_empty("CLUBWATCH_NOTIFY_TOKEN"),
            dry_run: non_empty("CLUBWATCH_MODE").is_some_and(|m| m.eq_ignore_ascii_case("dry-run")),
            state_store_type: non_empty("CLUBWATCH_STATE_STORE_TYPE")
                .unwrap_or_else(|| "file".to_string()),
            state_store_path: non_empty("CLUBWATCH_STATE_STORE_PATH"),
            poll_interval_secs,
            force_baseline: non_empty("CLUBWATCH_FORCE_BASELINE").is_some_and(|v| parse_flag(&v)),
            log_level: non_empty("CLUBWATCH_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the environment-level settings
    ///
    /// Value-level checks (URL schemes, ids, limits) are left to
    /// `WatchConfig::validate`.
    fn validate(&self) -> Result<()> {
        if self.club_id.is_none() && self.roster_url.is_none() {
            anyhow::bail!(
                "No source configured. Set CLUBWATCH_CLUB_ID for the registration-ban count \
                and/or CLUBWATCH_ROSTER_URL for the roster."
            );
        }

        if self.club_id.is_none() && self.club_name.is_none() {
            anyhow::bail!("CLUBWATCH_CLUB_NAME is required when CLUBWATCH_CLUB_ID is not set");
        }

        match self.notifier_type.as_str() {
            "webhook" => {
                // Dry runs without an endpoint fall back to the log notifier
                if !(self.dry_run && self.notify_url.is_none()) {
                    if self.notify_url.is_none() {
                        anyhow::bail!(
                            "CLUBWATCH_NOTIFY_URL is required when CLUBWATCH_NOTIFIER_TYPE=webhook"
                        );
                    }
                    self.validate_token()?;
                }
            }
            "log" => {}
            _ => anyhow::bail!(
                "CLUBWATCH_NOTIFIER_TYPE '{}' is not supported. \
                Supported types: webhook, log",
                self.notifier_type
            ),
        }

        match self.state_store_type.as_str() {
            "file" | "memory" => {}
            _ => anyhow::bail!(
                "CLUBWATCH_STATE_STORE_TYPE '{}' is not supported. \
                Supported types: file, memory",
                self.state_store_type
            ),
        }

        if self.state_store_type == "file"
            && let Some(ref path) = self.state_store_path
            && let Some(parent) = std::path::Path::new(path).parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            anyhow::bail!(
                "CLUBWATCH_STATE_STORE_PATH parent directory does not exist: {}. \
                Create it first: mkdir -p {}",
                parent.display(),
                parent.display()
            );
        }

        if !(10..=86_400).contains(&self.poll_interval_secs) {
            anyhow::bail!(
                "CLUBWATCH_POLL_INTERVAL_SECS must be between 10 and 86400 seconds. Got: {}",
                self.poll_interval_secs
            );
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "CLUBWATCH_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }

    fn validate_token(&self) -> Result<()> {
        let Some(token) = self.notify_token.as_deref() else {
            anyhow::bail!(
                "CLUBWATCH_NOTIFY_TOKEN is required. \
                Set it via: export CLUBWATCH_NOTIFY_TOKEN=your_token"
            );
        };

        // Common mistake: the example value copied verbatim
        let token_lower = token.to_lowercase();
        if token_lower.contains("your_token") || token_lower.contains("replace_me") {
            anyhow::bail!(
                "CLUBWATCH_NOTIFY_TOKEN appears to be a placeholder. \
                Use the token issued for your notification endpoint."
            );
        }

        Ok(())
    }

    /// Build the watch configuration
    fn to_watch_config(&self) -> Result<WatchConfig> {
        let mut sources = Vec::new();

        if let Some(ref club_id) = self.club_id {
            let mut count = CountSourceConfig::new(club_id.clone());
            if let Some(ref url) = self.count_url {
                count = count.with_url(url.clone());
            }
            sources.push(SourceConfig::Count(count));
        }

        if let Some(ref url) = self.roster_url {
            let mut roster = FormRosterConfig::new(url.clone());
            if let Some(ref season) = self.roster_season {
                roster.filters.season = season.clone();
            }
            sources.push(SourceConfig::FormRoster(roster));
        }

        let club_name = self
            .club_name
            .clone()
            .or_else(|| self.club_id.clone())
            .ok_or_else(|| anyhow::anyhow!("CLUBWATCH_CLUB_NAME is required"))?;

        let notifier = match (self.notifier_type.as_str(), &self.notify_url) {
            ("webhook", Some(url)) => NotifierConfig::Webhook {
                url: url.clone(),
                token: self.notify_token.clone().unwrap_or_default(),
                timeout_secs: 30,
            },
            _ => NotifierConfig::Log,
        };

        let state_store = match self.state_store_type.as_str() {
            "memory" => StateStoreConfig::Memory,
            _ => match self.state_store_path {
                Some(ref path) => StateStoreConfig::File { path: path.clone() },
                None => StateStoreConfig::default(),
            },
        };

        let config = WatchConfig {
            club_name,
            sources,
            notifier,
            state_store,
            engine: EngineConfig {
                poll_interval_secs: self.poll_interval_secs,
                force_baseline: self.force_baseline,
                ..EngineConfig::default()
            },
        };
        config.validate()?;

        Ok(config)
    }

    fn tracing_level(&self) -> Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ClubwatchExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return ClubwatchExitCode::ConfigError.into();
    }

    let watch_config = match config.to_watch_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration validation error: {}", e);
            return ClubwatchExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.tracing_level())
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return ClubwatchExitCode::ConfigError.into();
    }

    info!("Starting clubwatchd daemon");
    info!(
        "Configuration loaded: {} source(s), notifier: {}, state store: {}",
        watch_config.sources.len(),
        watch_config.notifier.type_name(),
        watch_config.state_store.type_name()
    );
    if config.dry_run {
        warn!("CLUBWATCH_MODE=dry-run: no notification will be delivered");
    }
    if config.force_baseline {
        warn!("CLUBWATCH_FORCE_BASELINE is set: unset it after this run to avoid a baseline on every restart");
    }

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return ClubwatchExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        match run_daemon(watch_config).await {
            Ok(()) => ClubwatchExitCode::CleanShutdown,
            Err(e) => {
                error!("Daemon error: {}", e);
                exit_code_for(&e)
            }
        }
    });

    result.into()
}

/// Build every component from config and run the engine until shutdown
async fn run_daemon(config: WatchConfig) -> Result<()> {
    let registry = WatchRegistry::with_builtin_state_stores();

    #[cfg(feature = "json")]
    clubwatch_source_json::register(&registry);

    #[cfg(feature = "form")]
    clubwatch_source_form::register(&registry);

    #[cfg(feature = "webhook")]
    clubwatch_notify_webhook::register(&registry);

    debug!(
        "Registered sources: {:?}, notifiers: {:?}",
        registry.list_sources(),
        registry.list_notifiers()
    );

    let sources = config
        .sources
        .iter()
        .map(|source| registry.create_source(source))
        .collect::<clubwatch_core::Result<Vec<_>>>()?;
    let notifier = registry.create_notifier(&config.notifier)?;
    let state_store = registry.create_state_store(&config.state_store).await?;

    let (engine, mut events) = WatchEngine::new(
        sources,
        notifier,
        state_store,
        config.club_name.clone(),
        config.engine.clone(),
    )?;

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            log_event(&event);
        }
    });

    info!("Watching: {}", engine.source_ids().join(", "));
    engine.run().await?;

    info!("Shutting down daemon");
    Ok(())
}

fn log_event(event: &EngineEvent) {
    match event {
        EngineEvent::CycleCompleted {
            cycle,
            notifications,
        } => debug!("Cycle {} completed, {} notification(s)", cycle, notifications),
        other => debug!("Engine event: {:?}", other),
    }
}

/// Map a daemon failure to its exit code
fn exit_code_for(err: &anyhow::Error) -> ClubwatchExitCode {
    match err.downcast_ref::<clubwatch_core::Error>() {
        Some(clubwatch_core::Error::Notify(NotifyError::Auth(_))) => ClubwatchExitCode::AuthError,
        Some(clubwatch_core::Error::Config(_)) => ClubwatchExitCode::ConfigError,
        _ => ClubwatchExitCode::RuntimeError,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    fn base_vars() -> Vec<(&'static str, &'static str)> {
        vec![
            ("CLUBWATCH_CLUB_ID", "KAYSERISPOR FUTBOL A.S."),
            ("CLUBWATCH_CLUB_NAME", "Kayserispor"),
            ("CLUBWATCH_NOTIFY_URL", "https://hooks.example.org/notify"),
            ("CLUBWATCH_NOTIFY_TOKEN", "a1b2c3d4e5f6"),
        ]
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&base_vars()).unwrap();
        config.validate().unwrap();

        assert_eq!(config.poll_interval_secs, 600);
        assert!(!config.force_baseline);
        assert!(!config.dry_run);

        let watch = config.to_watch_config().unwrap();
        assert_eq!(watch.club_name, "Kayserispor");
        assert_eq!(watch.sources.len(), 1);
        assert_eq!(watch.sources[0].type_name(), "count");
        assert_eq!(watch.notifier.type_name(), "webhook");
        assert_eq!(watch.state_store.type_name(), "file");
    }

    #[test]
    fn test_roster_source_enabled_by_url() {
        let mut vars = base_vars();
        vars.push(("CLUBWATCH_ROSTER_URL", "https://tff.example.org/Default.aspx"));
        vars.push(("CLUBWATCH_ROSTER_SEASON", "2026-2027"));
        let watch = config_from(&vars).unwrap().to_watch_config().unwrap();

        assert_eq!(watch.sources.len(), 2);
        match &watch.sources[1] {
            SourceConfig::FormRoster(roster) => assert_eq!(roster.filters.season, "2026-2027"),
            other => panic!("unexpected source: {:?}", other),
        }
    }

    #[test]
    fn test_no_source_rejected() {
        let config = config_from(&[
            ("CLUBWATCH_NOTIFY_URL", "https://hooks.example.org/notify"),
            ("CLUBWATCH_NOTIFY_TOKEN", "a1b2c3d4e5f6"),
        ])
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_club_name_defaults_to_club_id() {
        let vars: Vec<_> = base_vars()
            .into_iter()
            .filter(|(k, _)| *k != "CLUBWATCH_CLUB_NAME")
            .collect();
        let watch = config_from(&vars).unwrap().to_watch_config().unwrap();
        assert_eq!(watch.club_name, "KAYSERISPOR FUTBOL A.S.");
    }

    #[test]
    fn test_webhook_requires_token() {
        let vars: Vec<_> = base_vars()
            .into_iter()
            .filter(|(k, _)| *k != "CLUBWATCH_NOTIFY_TOKEN")
            .collect();
        assert!(config_from(&vars).unwrap().validate().is_err());

        let mut vars = base_vars();
        vars.retain(|(k, _)| *k != "CLUBWATCH_NOTIFY_TOKEN");
        vars.push(("CLUBWATCH_NOTIFY_TOKEN", "your_token"));
        assert!(config_from(&vars).unwrap().validate().is_err());
    }

    #[test]
    fn test_dry_run_without_endpoint_uses_log_notifier() {
        let config = config_from(&[
            ("CLUBWATCH_CLUB_ID", "KAYSERISPOR FUTBOL A.S."),
            ("CLUBWATCH_MODE", "dry-run"),
            ("CLUBWATCH_STATE_STORE_TYPE", "memory"),
        ])
        .unwrap();
        config.validate().unwrap();

        let watch = config.to_watch_config().unwrap();
        assert_eq!(watch.notifier.type_name(), "log");
        assert_eq!(watch.state_store.type_name(), "memory");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut vars = base_vars();
        vars.push(("CLUBWATCH_POLL_INTERVAL_SECS", "ten"));
        assert!(config_from(&vars).is_err());

        let mut vars = base_vars();
        vars.push(("CLUBWATCH_POLL_INTERVAL_SECS", "5"));
        assert!(config_from(&vars).unwrap().validate().is_err());

        let mut vars = base_vars();
        vars.push(("CLUBWATCH_LOG_LEVEL", "verbose"));
        assert!(config_from(&vars).unwrap().validate().is_err());

        let mut vars = base_vars();
        vars.push(("CLUBWATCH_STATE_STORE_TYPE", "redis"));
        assert!(config_from(&vars).unwrap().validate().is_err());

        let mut vars = base_vars();
        vars.retain(|(k, _)| *k != "CLUBWATCH_NOTIFY_URL");
        vars.push(("CLUBWATCH_NOTIFY_URL", "ftp://hooks.example.org"));
        let config = config_from(&vars).unwrap();
        config.validate().unwrap();
        assert!(config.to_watch_config().is_err());
    }

    #[test]
    fn test_force_baseline_flag() {
        let mut vars = base_vars();
        vars.push(("CLUBWATCH_FORCE_BASELINE", "true"));
        let watch = config_from(&vars).unwrap().to_watch_config().unwrap();
        assert!(watch.engine.force_baseline);

        assert!(parse_flag("1"));
        assert!(parse_flag(" YES "));
        assert!(!parse_flag("0"));
        assert!(!parse_flag("false"));
    }

    #[test]
    fn test_exit_codes() {
        let auth = anyhow::Error::from(clubwatch_core::Error::Notify(NotifyError::Auth(
            "401".to_string(),
        )));
        assert_eq!(exit_code_for(&auth), ClubwatchExitCode::AuthError);

        let config = anyhow::Error::from(clubwatch_core::Error::config("bad"));
        assert_eq!(exit_code_for(&config), ClubwatchExitCode::ConfigError);

        let other = anyhow::anyhow!("boom");
        assert_eq!(exit_code_for(&other), ClubwatchExitCode::RuntimeError);

        assert_eq!(ClubwatchExitCode::AuthError as u8, 3);
    }
}
