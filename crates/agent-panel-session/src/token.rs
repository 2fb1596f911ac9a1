//! Access to the externally issued login token.

/// Environment variable read by [`EnvToken::default`].
pub const ACCESS_TOKEN_ENV: &str = "AGENT_PANEL_ACCESS_TOKEN";

/// Provides the access token issued by the surrounding application's login.
///
/// Called once per silent authentication attempt. Returning `None` is a
/// recoverable state, reported as a missing token.
pub trait TokenSource: Send + Sync {
    fn access_token(&self) -> Option<String>;
}

impl<F> TokenSource for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn access_token(&self) -> Option<String> {
        self()
    }
}

/// Fixed token, or none at all.
#[derive(Debug, Clone, Default)]
pub struct StaticToken(Option<String>);

impl StaticToken {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    #[must_use]
    pub const fn none() -> Self {
        Self(None)
    }
}

impl TokenSource for StaticToken {
    fn access_token(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Token read from an environment variable at each attempt.
#[derive(Debug, Clone)]
pub struct EnvToken {
    var: String,
}

impl EnvToken {
    #[must_use]
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvToken {
    fn default() -> Self {
        Self::new(ACCESS_TOKEN_ENV)
    }
}

impl TokenSource for EnvToken {
    fn access_token(&self) -> Option<String> {
        std::env::var(&self.var)
            .ok()
            .filter(|token| !token.trim().is_empty())
    }
}
