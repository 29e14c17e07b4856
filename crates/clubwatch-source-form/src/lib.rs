// # Form Roster Source
//
// This crate provides the licensed-player roster source for clubwatch. The
// roster lives behind a legacy server-rendered search form.
//
// ## Protocol
//
// 1. GET the page with a fresh cookie-carrying client and read the hidden
//    state tokens (`__VIEWSTATE`, `__VIEWSTATEGENERATOR`, `__EVENTVALIDATION`)
// 2. POST the tokens back with the search filters, same client and cookies
// 3. Locate the roster table through the matcher chain and read its rows
//
// Session state (cookies and tokens) lives for a single `fetch()` call.
//
// ## Failure classes
//
// - Tokens or table absent → `FetchError::Protocol`
// - Network, timeout or non-2xx → `FetchError::Transport`
// - Body not valid UTF-8 text → `FetchError::Format`

pub mod roster;
pub mod table;
pub mod tokens;

pub use roster::parse_roster;
pub use table::{TableLocator, TableMatcher};
pub use tokens::{FormTokens, extract_form_tokens};

use clubwatch_core::config::{FormFilters, FormRosterConfig, RosterColumns, SourceConfig};
use clubwatch_core::model::{RosterSnapshot, Snapshot};
use clubwatch_core::registry::WatchRegistry;
use clubwatch_core::traits::{BaselinePersistence, Source, SourceFactory};
use clubwatch_core::{Error, FetchError, Result};

use std::time::Duration;

/// Roster source backed by a search form
pub struct FormRosterAdapter {
    id: String,
    url: String,
    timeout: Duration,
    user_agent: String,
    filters: FormFilters,
    locator: TableLocator,
    columns: RosterColumns,
}

impl FormRosterAdapter {
    /// Create a roster source from its configuration
    pub fn new(config: &FormRosterConfig) -> Self {
        Self {
            id: config.id.clone(),
            url: config.url.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            user_agent: config.user_agent.clone(),
            filters: config.filters.clone(),
            locator: TableLocator::from_lookup(&config.table),
            columns: config.columns,
        }
    }

    /// Replace the table matcher chain
    pub fn with_locator(mut self, locator: TableLocator) -> Self {
        self.locator = locator;
        self
    }

    /// Client for one GET/POST exchange
    ///
    /// A new cookie store per call: no session leaks into the next cycle.
    fn session_client(&self) -> std::result::Result<reqwest::Client, FetchError> {
        reqwest::Client::builder()
            .cookie_store(true)
            .timeout(self.timeout)
            .user_agent(self.user_agent.as_str())
            .build()
            .map_err(|e| FetchError::transport(format!("Failed to build HTTP client: {}", e)))
    }

    /// Run the form exchange and parse the roster
    pub async fn fetch_roster(&self) -> std::result::Result<RosterSnapshot, FetchError> {
        let client = self.session_client()?;

        tracing::debug!("Loading search form from {}", self.url);
        let page = read_body(client.get(&self.url).send().await).await?;
        let tokens = extract_form_tokens(&page)?;

        let mut form: Vec<(&str, &str)> = tokens.pairs().to_vec();
        form.extend(self.filters.pairs());

        tracing::debug!("Submitting roster search to {}", self.url);
        let results = read_body(client.post(&self.url).form(&form).send().await).await?;

        let roster = parse_roster(&results, &self.locator, &self.columns)?;
        tracing::debug!("Parsed {} player(s) from roster page", roster.len());
        Ok(roster)
    }
}

/// Check the status and decode the body of a response
async fn read_body(
    response: std::result::Result<reqwest::Response, reqwest::Error>,
) -> std::result::Result<String, FetchError> {
    let response = response.map_err(transport_error)?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::transport(format!("HTTP error: {}", status)));
    }

    let bytes = response.bytes().await.map_err(transport_error)?;
    String::from_utf8(bytes.to_vec())
        .map_err(|e| FetchError::format(format!("Response body is not UTF-8 text: {}", e)))
}

fn transport_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::transport(format!("Request timed out: {}", e))
    } else {
        FetchError::transport(format!("Request failed: {}", e))
    }
}

#[async_trait::async_trait]
impl Source for FormRosterAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    async fn fetch(&self) -> std::result::Result<Snapshot, FetchError> {
        self.fetch_roster().await.map(Snapshot::from)
    }

    fn baseline_persistence(&self) -> BaselinePersistence {
        BaselinePersistence::AfterNotify
    }
}

/// Factory for creating form roster sources
pub struct FormRosterFactory;

impl SourceFactory for FormRosterFactory {
    fn create(&self, config: &SourceConfig) -> Result<Box<dyn Source>> {
        match config {
            SourceConfig::FormRoster(config) => Ok(Box::new(FormRosterAdapter::new(config))),
            _ => Err(Error::config("Invalid config for form roster source")),
        }
    }
}

/// Register the form roster source with a registry
pub fn register(registry: &WatchRegistry) {
    registry.register_source("form_roster", Box::new(FormRosterFactory));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::ExactId;
    use clubwatch_core::config::CountSourceConfig;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    const SEARCH_PAGE: &str = r#"<html><body><form method="post" action="./roster.aspx">
        <input type="hidden" name="__VIEWSTATE" value="vs123" />
        <input type="hidden" name="__VIEWSTATEGENERATOR" value="CA0B0334" />
        <input type="hidden" name="__EVENTVALIDATION" value="ev456" />
    </form></body></html>"#;

    const RESULTS_PAGE: &str = r#"<html><body>
        <table id="layout"><tr><td>Menu</td></tr><tr><td>a</td></tr><tr><td>b</td></tr><tr><td>c</td></tr></table>
        <table id="results">
            <tr><th>Adı Soyadı</th><th>Lisans</th><th>Mevki</th></tr>
            <tr><td>Ali Yilmaz</td><td>Faal</td><td>Kaleci</td></tr>
            <tr><td>Veli Demir</td><td>Faal</td><td>Forvet</td></tr>
        </table>
    </body></html>"#;

    fn response(extra_headers: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\n{}Content-Length: {}\r\nConnection: close\r\n\r\n{}",
            extra_headers,
            body.len(),
            body
        )
    }

    /// Serve one canned response per connection and report each raw request
    async fn serve(responses: Vec<String>) -> (String, mpsc::UnboundedReceiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            for canned in responses {
                let (mut stream, _) = listener.accept().await.unwrap();

                let mut request = Vec::new();
                let mut buf = [0u8; 4096];
                loop {
                    let n = stream.read(&mut buf).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    request.extend_from_slice(&buf[..n]);

                    let text = String::from_utf8_lossy(&request);
                    if let Some(end) = text.find("\r\n\r\n") {
                        let content_length = text[..end]
                            .lines()
                            .find_map(|line| {
                                let (name, value) = line.split_once(':')?;
                                name.eq_ignore_ascii_case("content-length")
                                    .then(|| value.trim().parse::<usize>().ok())
                                    .flatten()
                            })
                            .unwrap_or(0);
                        if request.len() >= end + 4 + content_length {
                            break;
                        }
                    }
                }

                tx.send(String::from_utf8_lossy(&request).into_owned()).unwrap();
                stream.write_all(canned.as_bytes()).await.unwrap();
                stream.shutdown().await.unwrap();
            }
        });

        (format!("http://{}/roster.aspx", addr), rx)
    }

    fn adapter_for(url: &str) -> FormRosterAdapter {
        let mut config = FormRosterConfig::new(url);
        config.timeout_secs = 5;
        FormRosterAdapter::new(&config)
            .with_locator(TableLocator::new(vec![Box::new(ExactId("results".into()))]))
    }

    #[test]
    fn test_factory_creation() {
        let factory = FormRosterFactory;

        let config = SourceConfig::FormRoster(FormRosterConfig::new("https://example.org/roster.aspx"));
        let source = factory.create(&config).unwrap();
        assert_eq!(source.id(), "roster");
        assert_eq!(source.baseline_persistence(), BaselinePersistence::AfterNotify);

        let wrong = SourceConfig::Count(CountSourceConfig::new("KAYSERISPOR FUTBOL A.S."));
        assert!(factory.create(&wrong).is_err());
    }

    #[test]
    fn test_register() {
        let registry = WatchRegistry::new();
        register(&registry);
        assert!(registry.has_source("form_roster"));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        let mut config = FormRosterConfig::new("http://127.0.0.1:9/roster.aspx");
        config.timeout_secs = 2;
        let adapter = FormRosterAdapter::new(&config);

        let err = adapter.fetch().await.unwrap_err();
        assert_eq!(err.class(), "transport");
    }

    #[tokio::test]
    async fn test_search_post_echoes_session_and_tokens() {
        let (url, mut requests) = serve(vec![
            response("Set-Cookie: ASP.NET_SessionId=abc123; Path=/\r\n", SEARCH_PAGE),
            response("", RESULTS_PAGE),
        ])
        .await;

        let roster = adapter_for(&url).fetch_roster().await.unwrap();
        assert_eq!(roster.len(), 2);
        assert_eq!(roster.get("Ali Yilmaz").unwrap().license_status, "Faal");

        let get = requests.recv().await.unwrap();
        assert!(get.starts_with("GET /roster.aspx"));

        let post = requests.recv().await.unwrap();
        assert!(post.starts_with("POST /roster.aspx"));
        assert!(post.to_lowercase().contains("cookie: asp.net_sessionid=abc123"));
        assert!(post.to_lowercase().contains("content-type: application/x-www-form-urlencoded"));

        let (_, body) = post.split_once("\r\n\r\n").unwrap();
        assert_eq!(
            body,
            "__VIEWSTATE=vs123&__VIEWSTATEGENERATOR=CA0B0334&__EVENTVALIDATION=ev456\
             &ddlSezon=2025-2026&ddlProfesyonel=Profesyonel&ddlAktif=Aktif&btnAra=Ara"
        );
    }

    #[tokio::test]
    async fn test_missing_token_stops_before_post() {
        let page = SEARCH_PAGE.replace(r#"<input type="hidden" name="__VIEWSTATE" value="vs123" />"#, "");
        let (url, mut requests) = serve(vec![response("", &page)]).await;

        let err = adapter_for(&url).fetch().await.unwrap_err();
        assert_eq!(err.class(), "protocol");

        assert!(requests.recv().await.unwrap().starts_with("GET "));
        // The server task exits after its single response
        assert!(requests.recv().await.is_none());
    }
}
