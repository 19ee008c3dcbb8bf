use std::env;
use thiserror::Error;
use url::Url;

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:44480";
pub const SERVER_URL_ENV: &str = "OPCON_SERVER_URL";

pub const CONSOLE_PATH: &str = "/api/console";
pub const CONTROL_PATH: &str = "/api/control";

const DEFAULT_SINK_CAPACITY: usize = 512;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid server url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("unsupported url scheme: {0}")]
    UnsupportedScheme(String),
}

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub base_url: Url,
    pub sink_capacity: usize,
    pub transcript_max_lines: usize,
}

impl ClientConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            sink_capacity: DEFAULT_SINK_CAPACITY,
            transcript_max_lines: opcon_core::transcript::DEFAULT_MAX_LINES,
        }
    }

    /// Flag value wins, then `OPCON_SERVER_URL`, then the default.
    pub fn resolve(flag: &str) -> Result<Self, ConfigError> {
        let raw = if !flag.trim().is_empty() {
            flag.trim().to_string()
        } else {
            env::var(SERVER_URL_ENV)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string())
        };
        let base_url = Url::parse(&raw)?;
        match base_url.scheme() {
            "http" | "https" => Ok(Self::new(base_url)),
            other => Err(ConfigError::UnsupportedScheme(other.to_string())),
        }
    }

    /// Derive the streaming-channel URL for `path`, mapping http → ws and
    /// https → wss as the page origin would.
    pub fn channel_url(&self, path: &str, query: &str) -> Result<Url, ConfigError> {
        let mut url = self.base_url.clone();
        let scheme = match url.scheme() {
            "https" => "wss",
            _ => "ws",
        };
        url.set_scheme(scheme)
            .map_err(|_| ConfigError::UnsupportedScheme(scheme.to_string()))?;
        url.set_path(path);
        url.set_query(Some(query));
        Ok(url)
    }

    pub fn api_url(&self, path: &str) -> Result<Url, ConfigError> {
        Ok(self.base_url.join(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_url_maps_http_to_ws_and_keeps_host() {
        let cfg = ClientConfig::resolve("http://example.net:8080").expect("resolve");
        let url = cfg
            .channel_url(CONSOLE_PATH, "token=none")
            .expect("channel url");
        assert_eq!(url.as_str(), "ws://example.net:8080/api/console?token=none");
    }

    #[test]
    fn channel_url_maps_https_to_wss() {
        let cfg = ClientConfig::resolve("https://example.net").expect("resolve");
        let url = cfg
            .channel_url(CONTROL_PATH, "websocket=1&command=reload&token=abc")
            .expect("channel url");
        assert_eq!(
            url.as_str(),
            "wss://example.net/api/control?websocket=1&command=reload&token=abc"
        );
    }

    #[test]
    fn resolve_rejects_non_http_schemes() {
        let result = ClientConfig::resolve("ftp://example.net");
        assert!(matches!(result, Err(ConfigError::UnsupportedScheme(_))));
    }
}
