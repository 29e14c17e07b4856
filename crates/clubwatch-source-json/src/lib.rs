// # JSON Count Source
//
// This crate provides the registration-ban count source for clubwatch.
//
// ## Behavior
//
// A single GET to an endpoint returning a JSON array of records. The
// snapshot is the number of records whose `club_in` field equals the
// configured club identifier.
//
// - Body not a JSON array → `FetchError::Format` (never a count of zero)
// - Records that are not objects, or lack `club_in`, are skipped
// - Timeout, connection failure or non-2xx status → `FetchError::Transport`
//
// No retry: the next polling cycle is the retry.

use clubwatch_core::config::{CountSourceConfig, SourceConfig};
use clubwatch_core::model::{ScalarSnapshot, Snapshot};
use clubwatch_core::registry::WatchRegistry;
use clubwatch_core::traits::{BaselinePersistence, Source, SourceFactory};
use clubwatch_core::{Error, FetchError, Result};

use serde_json::Value;
use std::time::Duration;

/// Field holding the club a ban record applies to
const CLUB_FIELD: &str = "club_in";

/// Registration-ban count source
pub struct CountAdapter {
    /// Source identifier (state store key)
    id: String,

    /// Endpoint URL
    url: String,

    /// Exact `club_in` value to count
    club_id: String,

    /// HTTP client (timeout and User-Agent preset)
    client: reqwest::Client,
}

impl CountAdapter {
    /// Create a count source from its configuration
    pub fn new(config: &CountSourceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            id: config.id.clone(),
            url: config.url.clone(),
            club_id: config.club_id.clone(),
            client,
        })
    }

    /// Fetch the current number of records for the club
    pub async fn fetch_count(&self) -> std::result::Result<ScalarSnapshot, FetchError> {
        tracing::debug!("Fetching registration bans from {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::transport(format!("HTTP error: {}", status)));
        }

        let body = response.text().await.map_err(transport_error)?;
        let snapshot = parse_count(&body, &self.club_id)?;

        tracing::debug!("{} record(s) for {}", snapshot.count, self.club_id);
        Ok(snapshot)
    }
}

fn transport_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::transport(format!("Request timed out: {}", e))
    } else {
        FetchError::transport(format!("Request failed: {}", e))
    }
}

/// Count the records of a JSON array body whose `club_in` equals `club_id`
///
/// # Returns
///
/// - `Ok(ScalarSnapshot)`: Number of matching records
/// - `Err(FetchError::Format)`: Body is not valid JSON, or not an array
pub fn parse_count(body: &str, club_id: &str) -> std::result::Result<ScalarSnapshot, FetchError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| FetchError::format(format!("Invalid JSON body: {}", e)))?;

    let records = match value {
        Value::Array(records) => records,
        other => {
            return Err(FetchError::format(format!(
                "Expected a JSON array, got {}",
                json_type(&other)
            )));
        }
    };

    let count = records
        .iter()
        .filter(|record| record.get(CLUB_FIELD).and_then(Value::as_str) == Some(club_id))
        .count();

    Ok(ScalarSnapshot::new(count as u64))
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[async_trait::async_trait]
impl Source for CountAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    async fn fetch(&self) -> std::result::Result<Snapshot, FetchError> {
        self.fetch_count().await.map(Snapshot::from)
    }

    fn baseline_persistence(&self) -> BaselinePersistence {
        BaselinePersistence::RecordAlways
    }
}

impl std::fmt::Debug for CountAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CountAdapter")
            .field("id", &self.id)
            .field("url", &self.url)
            .field("club_id", &self.club_id)
            .finish()
    }
}

/// Factory for creating count sources
pub struct CountSourceFactory;

impl SourceFactory for CountSourceFactory {
    fn create(&self, config: &SourceConfig) -> Result<Box<dyn Source>> {
        match config {
            SourceConfig::Count(config) => Ok(Box::new(CountAdapter::new(config)?)),
            _ => Err(Error::config("Invalid config for count source")),
        }
    }
}

/// Register the count source with a registry
pub fn register(registry: &WatchRegistry) {
    registry.register_source("count", Box::new(CountSourceFactory));
}
