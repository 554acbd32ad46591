//! Session identity and live endpoint URL.

use std::fmt;

use url::Url;

use crate::error::{Error, Result};

/// Path of the live streaming endpoint on the agent server.
pub const LIVE_PATH: &str = "run_live";

/// The (application, user, session) triple a connection is opened for.
///
/// The same triple against the same server always yields the same URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionIdentity {
    app_name: String,
    user_id: String,
    session_id: String,
}

impl SessionIdentity {
    /// Creates an identity.
    #[must_use]
    pub fn new(
        app_name: impl Into<String>,
        user_id: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            user_id: user_id.into(),
            session_id: session_id.into(),
        }
    }

    /// Agent application name.
    #[inline]
    #[must_use]
    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// User the session belongs to.
    #[inline]
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Session identifier on the agent runtime.
    #[inline]
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Builds `ws[s]://{server}/run_live?app_name=..&user_id=..&session_id=..`.
    ///
    /// `server` is an authority with an optional path prefix, such as
    /// `localhost:8000` or `agents.example.com/api`. Query values are
    /// percent-encoded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an empty server and [`Error::Url`] if
    /// the result is not a valid URL.
    pub fn live_url(&self, server: &str, secure: bool) -> Result<String> {
        let server = server.trim().trim_end_matches('/');
        if server.is_empty() {
            return Err(Error::config("Server address is empty"));
        }

        let scheme = if secure { "wss" } else { "ws" };
        let mut url = Url::parse(&format!("{scheme}://{server}/{LIVE_PATH}"))?;
        url.query_pairs_mut()
            .append_pair("app_name", &self.app_name)
            .append_pair("user_id", &self.user_id)
            .append_pair("session_id", &self.session_id);

        Ok(url.into())
    }
}

impl fmt::Display for SessionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.app_name, self.user_id, self.session_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_url_plain() {
        let identity = SessionIdentity::new("weather", "u1", "s1");
        let url = identity.live_url("localhost:8000", false).unwrap();
        assert_eq!(url, "ws://localhost:8000/run_live?app_name=weather&user_id=u1&session_id=s1");
    }

    #[test]
    fn test_live_url_secure_with_prefix() {
        let identity = SessionIdentity::new("a", "b", "c");
        let url = identity.live_url("agents.example.com/api/", true).unwrap();
        assert_eq!(url, "wss://agents.example.com/api/run_live?app_name=a&user_id=b&session_id=c");
    }

    #[test]
    fn test_live_url_encodes_query_values() {
        let identity = SessionIdentity::new("my app", "a&b", "s=1");
        let url = identity.live_url("host", false).unwrap();
        assert_eq!(url, "ws://host/run_live?app_name=my+app&user_id=a%26b&session_id=s%3D1");
    }

    #[test]
    fn test_same_identity_same_url() {
        let first = SessionIdentity::new("a", "b", "c").live_url("host", false).unwrap();
        let second = SessionIdentity::new("a", "b", "c").live_url("host", false).unwrap();
        let other = SessionIdentity::new("a", "b", "d").live_url("host", false).unwrap();

        assert_eq!(first, second);
        assert_ne!(first, other);
    }

    #[test]
    fn test_live_url_rejects_empty_server() {
        let err = SessionIdentity::new("a", "b", "c").live_url("  ", false).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_display() {
        assert_eq!(SessionIdentity::new("a", "b", "c").to_string(), "a/b/c");
    }
}
