//! Configuration, layered from defaults, an optional TOML file and the environment.

use figment::Figment;
use figment::providers::{Env, Format, Toml};
use serde::{Deserialize, Deserializer};
use std::time::Duration;

use crate::vtop::extract::CaptchaMatchers;
use crate::vtop::login::{FormFieldNames, LoginMarkers};

/// Environment variable naming the TOML file to read.
const CONFIG_PATH_VAR: &str = "VTOP_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "vtop.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Level for this crate's own logs; `RUST_LOG` overrides everything.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_login_page_url")]
    pub login_page_url: String,
    /// Prefix for academic pages such as the timetable.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Submit target used when the login page has no form action.
    #[serde(default = "default_fallback_action")]
    pub fallback_action: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Skip TLS certificate verification for the portal.
    #[serde(default)]
    pub accept_invalid_certs: bool,

    #[serde(default = "default_page_timeout", deserialize_with = "deserialize_duration")]
    pub page_timeout: Duration,
    #[serde(default = "default_submit_timeout", deserialize_with = "deserialize_duration")]
    pub submit_timeout: Duration,
    #[serde(default = "default_timetable_timeout", deserialize_with = "deserialize_duration")]
    pub timetable_timeout: Duration,
    #[serde(default = "default_shutdown_timeout", deserialize_with = "deserialize_duration")]
    pub shutdown_timeout: Duration,

    #[serde(default)]
    pub fields: FormFieldNames,
    #[serde(default)]
    pub markers: LoginMarkers,
    #[serde(default)]
    pub captcha_matchers: CaptchaMatchers,
}

impl Config {
    /// Defaults ← `vtop.toml` (or `$VTOP_CONFIG`) ← environment.
    pub fn load() -> Result<Self, figment::Error> {
        let path = std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::figment(&path).extract()
    }

    fn figment(path: &str) -> Figment {
        Figment::new().merge(Toml::file(path)).merge(Env::raw().only(&[
            "log_level",
            "port",
            "login_page_url",
            "base_url",
            "fallback_action",
            "user_agent",
            "accept_invalid_certs",
            "page_timeout",
            "submit_timeout",
            "timetable_timeout",
            "shutdown_timeout",
        ]))
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_login_page_url() -> String {
    "https://vtopcc.vit.ac.in/vtop/login".to_string()
}

fn default_base_url() -> String {
    "https://vtopcc.vit.ac.in/vtop/open/page".to_string()
}

fn default_fallback_action() -> String {
    "/vtop/doLogin".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 Chrome/118 Safari/537.36"
        .to_string()
}

fn default_page_timeout() -> Duration {
    Duration::from_secs(20)
}

fn default_submit_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_timetable_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(8)
}

/// Accepts whole seconds (`20`) or a duration string (`20s`, `1.5m`, `500ms`).
fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Seconds(secs) => Ok(Duration::from_secs(secs)),
        Raw::Text(text) => parse_duration(&text).map_err(serde::de::Error::custom),
    }
}

fn parse_duration(text: &str) -> Result<Duration, String> {
    let parsed = fundu::DurationParser::with_all_time_units()
        .parse(text.trim())
        .map_err(|e| format!("invalid duration '{text}': {e}"))?;
    Duration::try_from(parsed).map_err(|e| format!("invalid duration '{text}': {e}"))
}
