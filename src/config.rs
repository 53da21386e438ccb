/*
 * Runtime configuration, read from the environment after loading `.env`
 */
use std::env;
use std::time::Duration;

use dotenv::dotenv;
use reqwest::Url;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub bind_address: String,
    /**
     * Base URL of the polls REST API, e.g. `http://localhost:3000/api`
     */
    pub api_url: Url,
    pub api_token: Option<String>,
    pub api_timeout: Duration,
    /**
     * Where to send the user after a successful save
     */
    pub list_path: String,
    /**
     * Where unauthenticated users are redirected
     */
    pub login_redirect: String,
    /**
     * A session granted the poll update permission at startup
     */
    pub seed_session: Option<Uuid>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /**
     * Build the configuration from any variable source
     */
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.is_empty());

        let api_url = var("POLL_API_URL").ok_or(ConfigError::Missing("POLL_API_URL"))?;
        let api_url = Url::parse(&api_url).map_err(|e| ConfigError::Invalid {
            name: "POLL_API_URL",
            value: api_url.clone(),
            reason: e.to_string(),
        })?;

        let api_timeout = match var("POLL_API_TIMEOUT_SECS") {
            Some(secs) => secs
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|e| ConfigError::Invalid {
                    name: "POLL_API_TIMEOUT_SECS",
                    value: secs.clone(),
                    reason: e.to_string(),
                })?,
            None => Duration::from_secs(30),
        };

        let seed_session = match var("ADMIN_SESSION_ID") {
            Some(id) => Some(Uuid::parse_str(&id).map_err(|e| ConfigError::Invalid {
                name: "ADMIN_SESSION_ID",
                value: id.clone(),
                reason: e.to_string(),
            })?),
            None => None,
        };

        Ok(Self {
            bind_address: var("BIND_ADDRESS").unwrap_or_else(|| "127.0.0.1:8000".to_string()),
            api_url,
            api_token: var("POLL_API_TOKEN"),
            api_timeout,
            list_path: var("POLL_LIST_PATH").unwrap_or_else(|| "/polls".to_string()),
            login_redirect: var("LOGIN_REDIRECT").unwrap_or_else(|| "/".to_string()),
            seed_session,
        })
    }
}
