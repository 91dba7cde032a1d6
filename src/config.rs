use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "MedicHelp";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5001;
pub const DEFAULT_TOKEN_TTL_DAYS: i64 = 30;
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_INSIGHT_MODEL: &str = "gemini-2.0-flash-exp";
pub const DEFAULT_REPORT_MODEL: &str = "gemini-2.5-flash-lite";
pub const DEFAULT_AI_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_MAIL_FROM: &str = "MedicHelp <no-reply@medichelp.local>";
pub const DEFAULT_SMTP_PORT: u16 = 587;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },

    #[error("Cannot determine home directory; set MEDICHELP_DB")]
    NoHomeDir,
}

/// Default tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "medichelp=info,medichelp_lib=info,tower_http=warn"
}

/// Get the application data directory (~/MedicHelp/).
pub fn app_data_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(APP_NAME))
}

/// SMTP relay settings. Present only when `SMTP_HOST` is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    /// Implicit TLS when true, STARTTLS otherwise.
    pub secure: bool,
    pub user: Option<String>,
    pub password: Option<String>,
}

/// Runtime configuration resolved from the process environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub db_path: PathBuf,
    pub token_secret: String,
    pub token_ttl_days: i64,
    pub gemini_api_key: Option<String>,
    pub gemini_base_url: String,
    pub insight_model: String,
    pub report_model: String,
    pub ai_timeout: Duration,
    pub smtp: Option<SmtpConfig>,
    pub mail_webhook_url: Option<String>,
    pub mail_from: String,
    /// Honour `X-Forwarded-For` when keying rate limits.
    pub trust_proxy: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let host = parse_or(get("HOST"), "HOST", || {
            DEFAULT_HOST.parse().map_err(|_| ConfigError::Invalid {
                name: "HOST",
                value: DEFAULT_HOST.into(),
            })
        })?;
        let port = parse_or(get("PORT"), "PORT", || Ok(DEFAULT_PORT))?;

        let db_path = match get("MEDICHELP_DB") {
            Some(path) => PathBuf::from(path),
            None => app_data_dir()
                .ok_or(ConfigError::NoHomeDir)?
                .join("medichelp.db"),
        };

        let token_secret = get("TOKEN_SECRET").ok_or(ConfigError::Missing("TOKEN_SECRET"))?;

        let token_ttl_days: i64 =
            parse_or(get("TOKEN_TTL_DAYS"), "TOKEN_TTL_DAYS", || Ok(DEFAULT_TOKEN_TTL_DAYS))?;
        if token_ttl_days <= 0 {
            return Err(ConfigError::Invalid {
                name: "TOKEN_TTL_DAYS",
                value: token_ttl_days.to_string(),
            });
        }

        let ai_timeout_secs: u64 =
            parse_or(get("AI_TIMEOUT_SECS"), "AI_TIMEOUT_SECS", || Ok(DEFAULT_AI_TIMEOUT_SECS))?;

        let smtp = match get("SMTP_HOST") {
            Some(smtp_host) => Some(SmtpConfig {
                host: smtp_host.trim().to_string(),
                port: parse_or(get("SMTP_PORT"), "SMTP_PORT", || Ok(DEFAULT_SMTP_PORT))?,
                secure: parse_flag(get("SMTP_SECURE"), "SMTP_SECURE")?,
                user: get("SMTP_USER"),
                password: get("SMTP_PASSWORD"),
            }),
            None => None,
        };

        let mail_from = match (get("MAIL_FROM"), smtp.as_ref().and_then(|s| s.user.as_deref())) {
            (Some(from), _) => from,
            (None, Some(user)) => format!("\"{APP_NAME}\" <{user}>"),
            (None, None) => DEFAULT_MAIL_FROM.into(),
        };

        Ok(Self {
            host,
            port,
            db_path,
            token_secret,
            token_ttl_days,
            gemini_api_key: get("GEMINI_API_KEY"),
            gemini_base_url: get("GEMINI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.into())
                .trim_end_matches('/')
                .to_string(),
            insight_model: get("INSIGHT_MODEL").unwrap_or_else(|| DEFAULT_INSIGHT_MODEL.into()),
            report_model: get("REPORT_MODEL").unwrap_or_else(|| DEFAULT_REPORT_MODEL.into()),
            ai_timeout: Duration::from_secs(ai_timeout_secs),
            smtp,
            mail_webhook_url: get("MAIL_WEBHOOK_URL"),
            mail_from,
            trust_proxy: parse_flag(get("TRUST_PROXY"), "TRUST_PROXY")?,
        })
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Configuration for tests: fixed secret, database at `db_path`.
    pub fn for_tests(db_path: PathBuf) -> Self {
        Self {
            host: IpAddr::from([127, 0, 0, 1]),
            port: 0,
            db_path,
            token_secret: "test-secret".into(),
            token_ttl_days: DEFAULT_TOKEN_TTL_DAYS,
            gemini_api_key: None,
            gemini_base_url: DEFAULT_GEMINI_BASE_URL.into(),
            insight_model: DEFAULT_INSIGHT_MODEL.into(),
            report_model: DEFAULT_REPORT_MODEL.into(),
            ai_timeout: Duration::from_secs(DEFAULT_AI_TIMEOUT_SECS),
            smtp: None,
            mail_webhook_url: None,
            mail_from: DEFAULT_MAIL_FROM.into(),
            trust_proxy: false,
        }
    }
}

fn parse_or<T, D>(raw: Option<String>, name: &'static str, default: D) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    D: FnOnce() -> Result<T, ConfigError>,
{
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => default(),
    }
}

/// `true`/`false` (also `1`/`0`, `yes`/`no`); unset means false.
fn parse_flag(raw: Option<String>, name: &'static str) -> Result<bool, ConfigError> {
    let Some(value) = raw else {
        return Ok(false);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::Invalid { name, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn token_secret_is_required() {
        let err = Config::from_lookup(lookup(&[("MEDICHELP_DB", "/tmp/x.db")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("TOKEN_SECRET"));
    }

    #[test]
    fn defaults_apply() {
        let cfg = Config::from_lookup(lookup(&[
            ("TOKEN_SECRET", "s3cret"),
            ("MEDICHELP_DB", "/tmp/medichelp.db"),
        ]))
        .unwrap();
        assert_eq!(cfg.bind_addr().to_string(), "0.0.0.0:5001");
        assert_eq!(cfg.token_ttl_days, 30);
        assert_eq!(cfg.insight_model, "gemini-2.0-flash-exp");
        assert_eq!(cfg.report_model, "gemini-2.5-flash-lite");
        assert_eq!(cfg.ai_timeout, Duration::from_secs(60));
        assert!(cfg.gemini_api_key.is_none());
        assert!(cfg.mail_webhook_url.is_none());
        assert!(cfg.smtp.is_none());
        assert!(!cfg.trust_proxy);
        assert_eq!(cfg.mail_from, DEFAULT_MAIL_FROM);
    }

    #[test]
    fn smtp_settings_read_from_env() {
        let cfg = Config::from_lookup(lookup(&[
            ("TOKEN_SECRET", "s3cret"),
            ("MEDICHELP_DB", "/tmp/medichelp.db"),
            ("SMTP_HOST", "smtp.clinic.test"),
            ("SMTP_SECURE", "true"),
            ("SMTP_USER", "robot@clinic.test"),
            ("SMTP_PASSWORD", "hunter2"),
        ]))
        .unwrap();
        let smtp = cfg.smtp.expect("smtp configured");
        assert_eq!(smtp.host, "smtp.clinic.test");
        assert_eq!(smtp.port, DEFAULT_SMTP_PORT);
        assert!(smtp.secure);
        assert_eq!(smtp.user.as_deref(), Some("robot@clinic.test"));
        assert_eq!(cfg.mail_from, "\"MedicHelp\" <robot@clinic.test>");
    }

    #[test]
    fn mail_from_overrides_smtp_user() {
        let cfg = Config::from_lookup(lookup(&[
            ("TOKEN_SECRET", "s3cret"),
            ("MEDICHELP_DB", "/tmp/medichelp.db"),
            ("SMTP_HOST", "smtp.clinic.test"),
            ("SMTP_PORT", "465"),
            ("SMTP_USER", "robot@clinic.test"),
            ("MAIL_FROM", "Clinic <desk@clinic.test>"),
        ]))
        .unwrap();
        assert_eq!(cfg.smtp.as_ref().map(|s| s.port), Some(465));
        assert_eq!(cfg.mail_from, "Clinic <desk@clinic.test>");
    }

    #[test]
    fn invalid_flags_rejected() {
        let err = Config::from_lookup(lookup(&[
            ("TOKEN_SECRET", "s3cret"),
            ("MEDICHELP_DB", "/tmp/medichelp.db"),
            ("TRUST_PROXY", "maybe"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "TRUST_PROXY", .. }));

        let cfg = Config::from_lookup(lookup(&[
            ("TOKEN_SECRET", "s3cret"),
            ("MEDICHELP_DB", "/tmp/medichelp.db"),
            ("TRUST_PROXY", "1"),
        ]))
        .unwrap();
        assert!(cfg.trust_proxy);
    }

    #[test]
    fn blank_values_count_as_unset() {
        let cfg = Config::from_lookup(lookup(&[
            ("TOKEN_SECRET", "s3cret"),
            ("MEDICHELP_DB", "/tmp/medichelp.db"),
            ("GEMINI_API_KEY", "   "),
        ]))
        .unwrap();
        assert!(cfg.gemini_api_key.is_none());
    }

    #[test]
    fn invalid_port_rejected() {
        let err = Config::from_lookup(lookup(&[
            ("TOKEN_SECRET", "s3cret"),
            ("MEDICHELP_DB", "/tmp/medichelp.db"),
            ("PORT", "http"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "PORT", .. }));
    }

    #[test]
    fn non_positive_ttl_rejected() {
        let err = Config::from_lookup(lookup(&[
            ("TOKEN_SECRET", "s3cret"),
            ("MEDICHELP_DB", "/tmp/medichelp.db"),
            ("TOKEN_TTL_DAYS", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "TOKEN_TTL_DAYS", .. }));
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let cfg = Config::from_lookup(lookup(&[
            ("TOKEN_SECRET", "s3cret"),
            ("MEDICHELP_DB", "/tmp/medichelp.db"),
            ("GEMINI_BASE_URL", "http://localhost:9999/"),
        ]))
        .unwrap();
        assert_eq!(cfg.gemini_base_url, "http://localhost:9999");
    }

    #[test]
    fn app_name_is_medichelp() {
        assert_eq!(APP_NAME, "MedicHelp");
    }
}
