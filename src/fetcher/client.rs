use std::time::Duration;

use once_cell::sync::Lazy;
use reqwest::header::HeaderMap;
use reqwest::{Client, ClientBuilder};
use tracing::{instrument, warn};

use crate::fetcher::errors::FetchError;

const USER_AGENT: &str = "TelepostBot/0.1 (+https://telepost.example.com)";

/// Bounded retry budget for a single preview-page fetch: up to three
/// additional attempts, fixed delay between them.
const RETRY_LIMIT: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_millis(100);

/// Inbound request headers that must never be forwarded upstream.
const STRIPPED_HEADERS: [&str; 4] = ["host", "cookie", "origin", "referer"];

static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    ClientBuilder::new()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(30))
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(10))
        .default_headers({
            let mut headers = HeaderMap::new();
            headers.insert(
                reqwest::header::ACCEPT,
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"
                    .parse()
                    .unwrap(),
            );
            headers
        })
        .build()
        .expect("Failed to build HTTP client")
});

/// Copy the inbound request headers minus the ones that identify our own
/// origin (`host`, `cookie`, `origin`, `referer`). Everything else is
/// forwarded to the preview mirror verbatim.
pub fn forwardable_headers(inbound: &HeaderMap) -> HeaderMap {
    let mut forwarded = HeaderMap::new();
    for (name, value) in inbound {
        if STRIPPED_HEADERS.contains(&name.as_str()) {
            continue;
        }
        forwarded.append(name.clone(), value.clone());
    }
    forwarded
}

/// Fetch the preview page at `url` and return its body text.
///
/// Retriable failures (5xx, timeouts, connection errors) are retried up to
/// [`RETRY_LIMIT`] times with a fixed [`RETRY_DELAY`] between attempts;
/// anything else propagates immediately.
#[instrument(skip_all, fields(url = %url))]
pub async fn fetch_page(url: &str, headers: HeaderMap) -> Result<String, FetchError> {
    let parsed_url = url::Url::parse(url)?;

    let mut attempt = 0;
    loop {
        match fetch_once(parsed_url.clone(), headers.clone()).await {
            Ok(body) => return Ok(body),
            Err(err) if err.should_retry() && attempt < RETRY_LIMIT => {
                attempt += 1;
                warn!(attempt, error = %err, "retrying preview fetch");
                tokio::time::sleep(RETRY_DELAY).await;
            }
            Err(err) => return Err(err),
        }
    }
}

async fn fetch_once(url: url::Url, headers: HeaderMap) -> Result<String, FetchError> {
    let response = HTTP_CLIENT
        .get(url)
        .headers(headers)
        .send()
        .await
        .map_err(FetchError::from_reqwest_error)?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Http {
            status,
            retriable: status.is_server_error(),
        });
    }

    response.text().await.map_err(|e| FetchError::Io(e.to_string()))
}
