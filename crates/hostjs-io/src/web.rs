//! Network collaborator (HTTP GET only).

use crate::error::{ProviderError, ProviderResult};
use crate::fs::Completion;
use crate::scheduler;
use std::sync::OnceLock;
use tracing::debug;
use url::Url;

/// Response delivered to a GET completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerResponse {
    pub status_code: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

/// Web request capability consumed by scripts through `_webRequest`.
pub trait WebRequest: Send + Sync {
    fn get(&self, url: &str, headers: &[(String, String)], done: Completion<ServerResponse>);
}

/// `reqwest`-backed implementation. Only `http` and `https` URLs are accepted.
#[derive(Debug, Default)]
pub struct DefaultWebRequest {
    client: OnceLock<reqwest::Client>,
}

impl DefaultWebRequest {
    pub fn new() -> Self {
        Self::default()
    }

    fn client(&self) -> ProviderResult<reqwest::Client> {
        if let Some(client) = self.client.get() {
            return Ok(client.clone());
        }
        let client = reqwest::Client::builder().build()?;
        Ok(self.client.get_or_init(|| client).clone())
    }
}

/// Parse `url` and reject anything but http(s).
pub fn validate_url(url: &str) -> ProviderResult<Url> {
    let parsed = Url::parse(url)?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(ProviderError::InvalidUrl(format!(
            "unsupported scheme '{other}' in {url}"
        ))),
    }
}

impl WebRequest for DefaultWebRequest {
    fn get(&self, url: &str, headers: &[(String, String)], done: Completion<ServerResponse>) {
        let parsed = match validate_url(url) {
            Ok(parsed) => parsed,
            Err(e) => return done(Err(e)),
        };
        let client = match self.client() {
            Ok(client) => client,
            Err(e) => return done(Err(e)),
        };

        debug!(url = %parsed, "GET");
        let mut request = client.get(parsed);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        scheduler::spawn_with_completion(
            async move {
                let response = request.send().await?;
                let status_code = response.status().as_u16();
                let headers = response
                    .headers()
                    .iter()
                    .map(|(name, value)| {
                        (
                            name.as_str().to_string(),
                            String::from_utf8_lossy(value.as_bytes()).into_owned(),
                        )
                    })
                    .collect();
                let body = response.text().await?;
                Ok(ServerResponse {
                    status_code,
                    headers,
                    body,
                })
            },
            done,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_validate_url_accepts_http() {
        assert!(validate_url("http://example.com/list.txt").is_ok());
        assert!(validate_url("https://example.com/").is_ok());
    }

    #[test]
    fn test_validate_url_rejects_other_schemes() {
        let err = validate_url("file:///etc/passwd").unwrap_err();
        assert!(err.to_string().contains("unsupported scheme 'file'"));
        assert!(validate_url("::").is_err());
    }

    #[test]
    fn test_invalid_url_completes_with_error() {
        let web = DefaultWebRequest::new();
        let (tx, rx) = mpsc::channel();
        web.get(
            "ftp://example.com/",
            &[],
            Box::new(move |result| tx.send(result.map(|r| r.status_code)).unwrap()),
        );
        let result = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(result, Err(ProviderError::InvalidUrl(_))));
    }
}
