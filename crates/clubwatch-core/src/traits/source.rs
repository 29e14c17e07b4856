// # Source Trait
//
// Defines the interface for adapters that normalize a remote data source
// into a `Snapshot`.
//
// ## Implementations
//
// - JSON count endpoint: `clubwatch-source-json` crate
// - Legacy web-form roster: `clubwatch-source-form` crate
//
// ## Usage
//
// ```rust,ignore
// use clubwatch_core::Source;
//
// #[tokio::main]
// async fn main() -> Result<(), Box<dyn std::error::Error>> {
//     let source = /* Source implementation */;
//
//     match source.fetch().await {
//         Ok(snapshot) => println!("{}: {:?}", source.id(), snapshot),
//         Err(e) => eprintln!("{} failed ({}): {}", source.id(), e.class(), e),
//     }
//
//     Ok(())
// }
// ```

use async_trait::async_trait;

use crate::error::FetchError;
use crate::model::Snapshot;

/// When a baseline snapshot is recorded relative to its announcement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BaselinePersistence {
    /// Record the baseline even if the announcement could not be sent
    RecordAlways,
    /// Record the baseline only after the announcement was sent
    #[default]
    AfterNotify,
}

/// Trait for source adapter implementations
///
/// # Trust Level: Untrusted
///
/// Sources talk to remote systems whose structure is not under our control.
///
/// ## Allowed Capabilities
/// - ✅ Perform HTTP requests to their own endpoint
/// - ✅ Hold per-invocation session state (cookies, form tokens)
/// - ✅ Parse and normalize remote payloads
///
/// ## Forbidden Capabilities
/// - ❌ Retry internally (each polling cycle is the retry)
/// - ❌ Access the state store (owned by `WatchEngine`)
/// - ❌ Send notifications (owned by `WatchEngine`)
/// - ❌ Keep session state across invocations
/// - ❌ Spawn tasks or sleep
///
/// Every call must be bounded by a timeout so a cycle cannot hang on one
/// unresponsive source.
#[async_trait]
pub trait Source: Send + Sync {
    /// Stable identifier, used as the state store key
    fn id(&self) -> &str;

    /// Fetch and normalize the current remote state
    ///
    /// # Returns
    ///
    /// - `Ok(Snapshot)`: The normalized snapshot
    /// - `Err(FetchError)`: Transport, format or protocol failure
    async fn fetch(&self) -> Result<Snapshot, FetchError>;

    /// How the first snapshot of this source is recorded
    fn baseline_persistence(&self) -> BaselinePersistence {
        BaselinePersistence::AfterNotify
    }
}

/// Helper trait for constructing sources from configuration
pub trait SourceFactory: Send + Sync {
    /// Create a Source instance from configuration
    ///
    /// # Parameters
    ///
    /// - `config`: Configuration of the source to build
    ///
    /// # Returns
    ///
    /// A boxed Source trait object
    fn create(&self, config: &crate::config::SourceConfig) -> Result<Box<dyn Source>, crate::Error>;
}
