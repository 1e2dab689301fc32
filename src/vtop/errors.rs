//! Error types for the VTOP portal client.

use reqwest::StatusCode;

/// Why the portal rejected a login attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    /// The response mentions the captcha: missing or mistyped.
    Captcha,
    /// The response reports invalid or incorrect credentials.
    Credentials,
}

impl AuthFailure {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Captcha => "captcha",
            Self::Credentials => "credentials",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::Captcha => "Captcha required or incorrect",
            Self::Credentials => "Invalid credentials",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum VtopError {
    #[error("Portal returned {status} for {url}")]
    Fetch { status: StatusCode, url: String },
    #[error("Request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Request to {url} timed out")]
    Timeout { url: String },
    #[error("Too many redirects starting from {url}")]
    TooManyRedirects { url: String },
    #[error("Invalid URL '{input}': {source}")]
    InvalidUrl {
        input: String,
        #[source]
        source: url::ParseError,
    },
    #[error("Malformed cookie token: {0}")]
    Decode(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{}", .0.message())]
    Auth(AuthFailure),
    #[error("Login failed; check form field names/action URL")]
    UnclassifiedLogin,
}

impl VtopError {
    /// Whether this error came from talking to the portal rather than from
    /// the portal's answer.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::Fetch { .. }
                | Self::Transport { .. }
                | Self::Timeout { .. }
                | Self::TooManyRedirects { .. }
        )
    }
}

pub type Result<T, E = VtopError> = std::result::Result<T, E>;
