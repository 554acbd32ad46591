//! Session configuration.

use url::Url;

use crate::error::{Error, Result};
use crate::media::FlushIntervals;
use crate::playback::AudioFormat;
use crate::transport::DEFAULT_MESSAGE_CAPACITY;

/// Settings for a [`LiveSession`](super::LiveSession).
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Agent server authority with optional path prefix, e.g. `localhost:8000`.
    pub server: String,
    /// Use `wss://` instead of `ws://`.
    pub secure: bool,
    /// Outbound flush cadence.
    pub intervals: FlushIntervals,
    /// Format of inbound PCM audio.
    pub audio_format: AudioFormat,
    /// How many inbound payloads a slow subscriber may lag behind.
    pub message_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            server: String::new(),
            secure: false,
            intervals: FlushIntervals::default(),
            audio_format: AudioFormat::default(),
            message_capacity: DEFAULT_MESSAGE_CAPACITY,
        }
    }
}

impl SessionConfig {
    /// Creates a config for `server` with default settings.
    #[must_use]
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            ..Self::default()
        }
    }

    /// Derives server and security from the page-style base URL the agent
    /// API is served from, e.g. `https://agents.example.com/api`.
    ///
    /// `https` and `wss` select a secure connection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Url`] if `base` does not parse, and [`Error::Config`]
    /// if it has no host or an unsupported scheme.
    pub fn from_base_url(base: &str) -> Result<Self> {
        let url = Url::parse(base)?;
        let secure = match url.scheme() {
            "https" | "wss" => true,
            "http" | "ws" => false,
            other => return Err(Error::config(format!("Unsupported scheme: {other}"))),
        };
        let host = url
            .host_str()
            .ok_or_else(|| Error::config(format!("Base URL has no host: {base}")))?;

        let mut server = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_owned(),
        };
        let path = url.path().trim_end_matches('/');
        server.push_str(path);

        Ok(Self {
            server,
            secure,
            ..Self::default()
        })
    }

    /// Checks the settings are usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        if self.server.trim().is_empty() {
            return Err(Error::config(
                "Server address is required. Use .server() to set it.\n\
                 Example: LiveSession::builder().server(\"localhost:8000\")",
            ));
        }
        if self.secure && !cfg!(feature = "tls") {
            return Err(Error::config(
                "Secure (wss://) connections need the `tls` feature enabled",
            ));
        }
        if self.intervals.audio.is_zero() || self.intervals.video.is_zero() {
            return Err(Error::config("Flush intervals must be non-zero"));
        }
        if self.audio_format.sample_rate == 0 || self.audio_format.channels == 0 {
            return Err(Error::config("Audio format needs a sample rate and channel count"));
        }
        if self.message_capacity == 0 {
            return Err(Error::config("Message capacity must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::new("localhost:8000");
        assert_eq!(config.server, "localhost:8000");
        assert!(!config.secure);
        assert_eq!(config.intervals.audio, Duration::from_millis(250));
        assert_eq!(config.intervals.video, Duration::from_millis(1000));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_base_url_https() {
        let config = SessionConfig::from_base_url("https://agents.example.com/api/").unwrap();
        assert_eq!(config.server, "agents.example.com/api");
        assert!(config.secure);
    }

    #[test]
    fn test_from_base_url_http_with_port() {
        let config = SessionConfig::from_base_url("http://localhost:8000").unwrap();
        assert_eq!(config.server, "localhost:8000");
        assert!(!config.secure);
    }

    #[test]
    fn test_from_base_url_rejects_other_schemes() {
        assert!(SessionConfig::from_base_url("ftp://host").is_err());
        assert!(SessionConfig::from_base_url("not a url").is_err());
    }

    #[test]
    fn test_validate_rejects_empty_server() {
        let err = SessionConfig::default().validate().unwrap_err();
        assert!(err.to_string().contains("Server"));
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut config = SessionConfig::new("host");
        config.intervals.audio = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_secure_config_follows_tls_feature() {
        let config = SessionConfig::from_base_url("https://agents.example.com").unwrap();
        assert_eq!(config.validate().is_ok(), cfg!(feature = "tls"));
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let mut config = SessionConfig::new("host");
        config.message_capacity = 0;
        assert!(config.validate().is_err());
    }
}
