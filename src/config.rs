// config.rs
use std::{env, fmt::Display, str::FromStr};

use http::HeaderName;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid {key} value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub login_url: String,
    pub user_header: HeaderName,
    /// Admin routes are disabled when unset.
    pub admin_token: Option<String>,
    /// At least 1.
    pub index_limit: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3030,
            database_url: None,
            max_connections: 5,
            login_url: "/accounts/login".to_string(),
            user_header: HeaderName::from_static("x-user-id"),
            admin_token: None,
            index_limit: 5,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let optional = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            port: try_load(&lookup, "PORT", defaults.port)?,
            database_url: optional("DATABASE_URL"),
            max_connections: try_load(&lookup, "DATABASE_MAX_CONNECTIONS", defaults.max_connections)?,
            login_url: optional("LOGIN_URL").unwrap_or(defaults.login_url),
            user_header: match optional("USER_HEADER") {
                Some(value) => parse_header_name(value)?,
                None => defaults.user_header,
            },
            admin_token: optional("ADMIN_TOKEN"),
            index_limit: at_least_one(
                "INDEX_LIMIT",
                try_load(&lookup, "INDEX_LIMIT", defaults.index_limit)?,
            )?,
        })
    }
}

fn try_load<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Display,
    T::Err: Display,
{
    // blank counts as unset, same as the optional variables
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        None => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
        Some(value) => {
            let parsed = value.trim().parse::<T>();
            parsed.map_err(|e| ConfigError::Invalid {
                key,
                reason: e.to_string(),
                value,
            })
        }
    }
}

fn parse_header_name(value: String) -> Result<HeaderName, ConfigError> {
    let parsed = HeaderName::from_str(value.trim());
    parsed.map_err(|e| ConfigError::Invalid {
        key: "USER_HEADER",
        reason: e.to_string(),
        value,
    })
}

fn at_least_one(key: &'static str, value: u32) -> Result<u32, ConfigError> {
    if value == 0 {
        return Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = load(&[]).unwrap();
        assert_eq!(config.port, 3030);
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.index_limit, 5);
        assert_eq!(config.user_header.as_str(), "x-user-id");
        assert!(config.database_url.is_none());
        assert!(config.admin_token.is_none());
    }

    #[test]
    fn reads_overrides() {
        let config = load(&[
            ("PORT", "8080"),
            ("DATABASE_URL", "postgres://localhost/polls"),
            ("USER_HEADER", "X-Remote-User"),
            ("ADMIN_TOKEN", "s3cret"),
            ("INDEX_LIMIT", "10"),
        ])
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/polls"));
        assert_eq!(config.user_header.as_str(), "x-remote-user");
        assert_eq!(config.admin_token.as_deref(), Some("s3cret"));
        assert_eq!(config.index_limit, 10);
    }

    #[test]
    fn blank_optional_values_are_unset() {
        let config = load(&[("DATABASE_URL", "  "), ("ADMIN_TOKEN", "")]).unwrap();
        assert!(config.database_url.is_none());
        assert!(config.admin_token.is_none());
    }

    #[test]
    fn rejects_invalid_port() {
        let err = load(&[("PORT", "eighty")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PORT", .. }));
    }

    #[test]
    fn rejects_index_limit_below_one() {
        for value in ["-1", "0"] {
            let err = load(&[("INDEX_LIMIT", value)]).unwrap_err();
            assert!(
                matches!(err, ConfigError::Invalid { key: "INDEX_LIMIT", .. }),
                "INDEX_LIMIT={value} accepted"
            );
        }
    }

    #[test]
    fn rejects_invalid_user_header() {
        let err = load(&[("USER_HEADER", "x user id")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "USER_HEADER", .. }));
    }

    #[test]
    fn blank_typed_values_fall_back_to_defaults() {
        let config = load(&[("PORT", ""), ("INDEX_LIMIT", "  "), ("DATABASE_MAX_CONNECTIONS", "")]).unwrap();
        assert_eq!(config.port, 3030);
        assert_eq!(config.index_limit, 5);
        assert_eq!(config.max_connections, 5);
    }
}
