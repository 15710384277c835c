use std::time::Duration;

use crate::error::Result;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Blocking text download. Resolvers only see this trait so tests can hand
/// them canned payloads.
pub trait Fetch {
    fn get(&self, url: &str, query: &[(&str, String)], timeout: Duration) -> Result<String>;
}

pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .build()?;

        Ok(HttpFetcher { client })
    }
}

impl Fetch for HttpFetcher {
    fn get(&self, url: &str, query: &[(&str, String)], timeout: Duration) -> Result<String> {
        log::debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .query(query)
            .timeout(timeout)
            .send()?
            .error_for_status()?;

        Ok(response.text()?)
    }
}

/// Calendar apps hand out `webcal://` links; the feed itself is served over
/// plain https.
pub fn normalize_feed_url(url: &str) -> String {
    let trimmed = url.trim();
    match trimmed.get(..9) {
        Some(scheme) if scheme.eq_ignore_ascii_case("webcal://") => {
            format!("https://{}", &trimmed[9..])
        }
        _ => trimmed.to_owned(),
    }
}
