use crate::{FetchConfig, FetchError};
use std::io::Read;
use tracing::debug;
use url::Url;

/// Blocking HTTP client for remote manifests.
pub struct HttpClient {
    agent: ureq::Agent,
    user_agent: String,
}

impl HttpClient {
    pub fn new(config: &FetchConfig) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(config.timeout()))
            .build()
            .into();
        Self {
            agent,
            user_agent: config.user_agent.clone(),
        }
    }

    /// GET `url` and return the body as UTF-8 text.
    pub fn get_text(&self, url: &Url) -> Result<String, FetchError> {
        debug!("GET {url}");
        let resp = match self
            .agent
            .get(url.as_str())
            .header("User-Agent", &self.user_agent)
            .call()
        {
            Ok(r) => r,
            Err(ureq::Error::StatusCode(404)) => {
                return Err(FetchError::NotFound(url.to_string()));
            }
            Err(ureq::Error::StatusCode(code)) => {
                return Err(FetchError::Http(format!("HTTP {code} for {url}")));
            }
            Err(e) => return Err(FetchError::Http(e.to_string())),
        };

        let mut body = Vec::new();
        resp.into_body()
            .into_reader()
            .read_to_end(&mut body)
            .map_err(|e| FetchError::Http(e.to_string()))?;
        String::from_utf8(body)
            .map_err(|e| FetchError::Http(format!("{url} is not valid UTF-8: {e}")))
    }
}
