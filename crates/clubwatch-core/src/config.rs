//! Configuration types for clubwatch
//!
//! This module defines all configuration structures used throughout the crate.
//! Loading them (from the environment) is the daemon's job; validation lives here.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Registration-ban endpoint polled by the count source
pub const DEFAULT_COUNT_URL: &str =
    "https://knowledge.fifa.com/api/fkmpdatahub/fifadatahubtransfer/registrationBans";

/// Browser-like identification; the upstream services reject default client ids
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Main clubwatch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Display name of the club, used in messages
    pub club_name: String,

    /// Sources to poll, in polling order
    pub sources: Vec<SourceConfig>,

    /// Notifier configuration
    pub notifier: NotifierConfig,

    /// State store configuration
    #[serde(default)]
    pub state_store: StateStoreConfig,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl WatchConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.club_name.trim().is_empty() {
            return Err(crate::Error::config("Club name cannot be empty"));
        }

        if self.sources.is_empty() {
            return Err(crate::Error::config("No sources configured"));
        }

        let mut seen = HashSet::new();
        for source in &self.sources {
            source.validate()?;
            if !seen.insert(source.id()) {
                return Err(crate::Error::config(format!(
                    "Duplicate source id: {}",
                    source.id()
                )));
            }
        }

        self.notifier.validate()?;
        self.state_store.validate()?;
        self.engine.validate()?;

        Ok(())
    }
}

/// Source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceConfig {
    /// JSON list endpoint, counted by club
    Count(CountSourceConfig),

    /// Legacy web-form roster page
    FormRoster(FormRosterConfig),
}

impl SourceConfig {
    /// Source identifier (state store key)
    pub fn id(&self) -> &str {
        match self {
            SourceConfig::Count(c) => &c.id,
            SourceConfig::FormRoster(c) => &c.id,
        }
    }

    /// Get the source type name
    pub fn type_name(&self) -> &'static str {
        match self {
            SourceConfig::Count(_) => "count",
            SourceConfig::FormRoster(_) => "form_roster",
        }
    }

    /// Validate the source configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            SourceConfig::Count(c) => {
                validate_common(&c.id, &c.url, c.timeout_secs)?;
                if c.club_id.trim().is_empty() {
                    return Err(crate::Error::config("Count source club id cannot be empty"));
                }
                Ok(())
            }
            SourceConfig::FormRoster(c) => {
                validate_common(&c.id, &c.url, c.timeout_secs)?;
                if c.filters.search_field.is_empty() {
                    return Err(crate::Error::config(
                        "Form roster search trigger field cannot be empty",
                    ));
                }
                Ok(())
            }
        }
    }
}

fn validate_common(id: &str, url: &str, timeout_secs: u64) -> Result<(), crate::Error> {
    if id.trim().is_empty() {
        return Err(crate::Error::config("Source id cannot be empty"));
    }
    if !url.starts_with("https://") && !url.starts_with("http://") {
        return Err(crate::Error::config(format!(
            "Source {} URL must use HTTP or HTTPS scheme. Got: {}",
            id, url
        )));
    }
    if timeout_secs == 0 {
        return Err(crate::Error::config(format!(
            "Source {} timeout must be > 0",
            id
        )));
    }
    Ok(())
}

/// Count source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountSourceConfig {
    /// Source identifier
    #[serde(default = "default_count_id")]
    pub id: String,

    /// Endpoint returning a JSON array of records
    #[serde(default = "default_count_url")]
    pub url: String,

    /// Exact value of the `club_in` field to count
    pub club_id: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl CountSourceConfig {
    pub fn new(club_id: impl Into<String>) -> Self {
        Self {
            id: default_count_id(),
            url: default_count_url(),
            club_id: club_id.into(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

/// Form roster source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormRosterConfig {
    /// Source identifier
    #[serde(default = "default_roster_id")]
    pub id: String,

    /// Page URL (GET and POST target)
    pub url: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Search filter fields posted with the form tokens
    #[serde(default)]
    pub filters: FormFilters,

    /// Roster table lookup parameters
    #[serde(default)]
    pub table: TableLookup,

    /// Positional layout of roster cells
    #[serde(default)]
    pub columns: RosterColumns,
}

impl FormRosterConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            id: default_roster_id(),
            url: url.into(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            filters: FormFilters::default(),
            table: TableLookup::default(),
            columns: RosterColumns::default(),
        }
    }
}

/// Search filter fields of the roster form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormFilters {
    pub season_field: String,
    pub season: String,
    pub professional_field: String,
    pub professional_status: String,
    pub active_field: String,
    pub active_status: String,
    /// Submit trigger field (the "search" button)
    pub search_field: String,
    pub search_value: String,
}

impl Default for FormFilters {
    fn default() -> Self {
        Self {
            season_field: "ddlSezon".to_string(),
            season: "2025-2026".to_string(),
            professional_field: "ddlProfesyonel".to_string(),
            professional_status: "Profesyonel".to_string(),
            active_field: "ddlAktif".to_string(),
            active_status: "Aktif".to_string(),
            search_field: "btnAra".to_string(),
            search_value: "Ara".to_string(),
        }
    }
}

impl FormFilters {
    /// Filter fields as form pairs, in posting order
    pub fn pairs(&self) -> [(&str, &str); 4] {
        [
            (&self.season_field, &self.season),
            (&self.professional_field, &self.professional_status),
            (&self.active_field, &self.active_status),
            (&self.search_field, &self.search_value),
        ]
    }
}

/// Parameters of the roster table fallback chain
///
/// A `None` entry disables that step of the chain. The last step (largest
/// table) is always enabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableLookup {
    /// Exact `id` attribute of the roster table
    pub exact_id: Option<String>,
    /// Substring of the roster table `id`
    pub id_contains: Option<String>,
    /// Class attribute value of the roster table
    pub class_name: Option<String>,
    /// Keyword contained in the roster table text
    pub keyword: Option<String>,
}

impl Default for TableLookup {
    fn default() -> Self {
        Self {
            exact_id: Some("grdFutbolcular".to_string()),
            id_contains: Some("Futbolcu".to_string()),
            class_name: Some("MasterTable_Default".to_string()),
            keyword: Some("Lisans".to_string()),
        }
    }
}

/// Positional layout of a roster row
///
/// `name` is mandatory; the other cells are read when present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RosterColumns {
    pub name: usize,
    pub license_status: Option<usize>,
    pub position: Option<usize>,
    pub birth_date: Option<usize>,
    pub nationality: Option<usize>,
}

impl Default for RosterColumns {
    fn default() -> Self {
        Self {
            name: 0,
            license_status: Some(1),
            position: Some(2),
            birth_date: Some(3),
            nationality: Some(4),
        }
    }
}

/// Notifier configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotifierConfig {
    /// HTTP webhook receiving `{"text": ...}`
    Webhook {
        /// Endpoint URL
        url: String,
        /// Bearer token
        token: String,
        /// Request timeout in seconds
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },

    /// Dry-run: log messages instead of sending them
    Log,
}

impl NotifierConfig {
    /// Validate the notifier configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            NotifierConfig::Webhook {
                url,
                token,
                timeout_secs,
            } => {
                if !url.starts_with("https://") && !url.starts_with("http://") {
                    return Err(crate::Error::config(
                        "Notifier URL must use HTTP or HTTPS scheme",
                    ));
                }
                if token.is_empty() {
                    return Err(crate::Error::config("Notifier token cannot be empty"));
                }
                if *timeout_secs == 0 {
                    return Err(crate::Error::config("Notifier timeout must be > 0"));
                }
                Ok(())
            }
            NotifierConfig::Log => Ok(()),
        }
    }

    /// Get the notifier type name
    pub fn type_name(&self) -> &'static str {
        match self {
            NotifierConfig::Webhook { .. } => "webhook",
            NotifierConfig::Log => "log",
        }
    }
}

// Custom Debug implementation that hides the token
impl std::fmt::Debug for NotifierConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotifierConfig::Webhook {
                url, timeout_secs, ..
            } => f
                .debug_struct("Webhook")
                .field("url", url)
                .field("token", &"<REDACTED>")
                .field("timeout_secs", timeout_secs)
                .finish(),
            NotifierConfig::Log => f.write_str("Log"),
        }
    }
}

/// State store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateStoreConfig {
    /// File-based state store
    File {
        /// Path to the state file
        path: String,
    },

    /// In-memory state store (not persistent)
    Memory,
}

impl Default for StateStoreConfig {
    fn default() -> Self {
        StateStoreConfig::File {
            path: "clubwatch_state.json".to_string(),
        }
    }
}

impl StateStoreConfig {
    /// Get the state store type name
    pub fn type_name(&self) -> &'static str {
        match self {
            StateStoreConfig::File { .. } => "file",
            StateStoreConfig::Memory => "memory",
        }
    }

    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            StateStoreConfig::File { path } if path.is_empty() => {
                Err(crate::Error::config("State file path cannot be empty"))
            }
            _ => Ok(()),
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Sleep between the end of one cycle and the start of the next (seconds)
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Announce a baseline for every source on the first cycle, even when
    /// state already exists. Consumed once.
    #[serde(default)]
    pub force_baseline: bool,

    /// Platform length limit for messages, in characters
    #[serde(default = "default_message_max_chars")]
    pub message_max_chars: usize,

    /// Capacity of the engine event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            force_baseline: false,
            message_max_chars: default_message_max_chars(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.poll_interval_secs == 0 {
            return Err(crate::Error::config("Poll interval must be > 0"));
        }
        if self.message_max_chars < 16 {
            return Err(crate::Error::config("Message limit must be at least 16 characters"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }
}

fn default_count_id() -> String {
    "registration_bans".to_string()
}

fn default_roster_id() -> String {
    "roster".to_string()
}

fn default_count_url() -> String {
    DEFAULT_COUNT_URL.to_string()
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_poll_interval_secs() -> u64 {
    600
}

fn default_message_max_chars() -> usize {
    280
}

fn default_event_channel_capacity() -> usize {
    1000
}
