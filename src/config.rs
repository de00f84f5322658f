//! Configuration loading from `.env` files.

use std::{env, time::Duration};

use anyhow::{Context, Result};

use crate::backoff::Backoff;

/// Runtime settings derived from environment variables.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Realtime socket URL, e.g. `ws://127.0.0.1:8787/realtime`.
    pub ws_url: String,
    /// Base URL of the social API used for refetches.
    pub api_url: String,
    /// Auth token appended to the socket URL. Empty means not signed in.
    pub auth_token: Option<String>,
    /// Id of the authenticated user the caches belong to.
    pub user_id: Option<String>,
    /// Status server bind address, e.g. `127.0.0.1:7900`.
    pub bind_http: String,
    /// Interval between heartbeat pings.
    pub heartbeat: Duration,
    /// First reconnect delay.
    pub backoff_base: Duration,
    /// Upper bound on the reconnect delay.
    pub backoff_cap: Duration,
    /// Server page size for notification fetches.
    pub page_limit: usize,
}

impl Settings {
    /// Load settings from the specified `.env` file.
    pub fn from_env(path: &str) -> Result<Self> {
        dotenvy::from_filename(path).context("reading env file")?;
        let ws_url = env::var("WS_URL").context("WS_URL")?;
        let api_url = env::var("API_URL").context("API_URL")?;
        let auth_token = env::var("AUTH_TOKEN").ok().filter(|s| !s.is_empty());
        let user_id = env::var("USER_ID").ok().filter(|s| !s.is_empty());
        let bind_http = env::var("BIND_HTTP").context("BIND_HTTP")?;
        let heartbeat = Duration::from_secs(env_u64("HEARTBEAT_SECS", 30));
        let backoff_base = Duration::from_millis(env_u64("BACKOFF_BASE_MS", 1_000));
        let backoff_cap = Duration::from_millis(env_u64("BACKOFF_CAP_MS", 30_000));
        let page_limit = env_u64("PAGE_LIMIT", 20) as usize;
        Ok(Self {
            ws_url,
            api_url,
            auth_token,
            user_id,
            bind_http,
            heartbeat,
            backoff_base,
            backoff_cap,
            page_limit,
        })
    }

    pub fn backoff(&self) -> Backoff {
        Backoff::new(self.backoff_base, self.backoff_cap)
    }
}

/// Read a numeric variable, falling back to `default` when absent or invalid.
fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{env, fs, sync::Mutex};
    use tempfile::tempdir;

    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const ALL_VARS: [&str; 9] = [
        "WS_URL",
        "API_URL",
        "AUTH_TOKEN",
        "USER_ID",
        "BIND_HTTP",
        "HEARTBEAT_SECS",
        "BACKOFF_BASE_MS",
        "BACKOFF_CAP_MS",
        "PAGE_LIMIT",
    ];

    fn clear_env() {
        for v in ALL_VARS {
            env::remove_var(v);
        }
    }

    #[test]
    fn loads_env() {
        let _g = ENV_MUTEX.lock().unwrap();
        clear_env();
        let dir = tempdir().unwrap();
        let env_path = dir.path().join(".env");
        fs::write(
            &env_path,
            concat!(
                "WS_URL=ws://127.0.0.1:9000/realtime\n",
                "API_URL=http://127.0.0.1:9001\n",
                "AUTH_TOKEN=tok\n",
                "USER_ID=u1\n",
                "BIND_HTTP=127.0.0.1:7900\n",
                "HEARTBEAT_SECS=15\n",
                "BACKOFF_BASE_MS=500\n",
                "BACKOFF_CAP_MS=8000\n",
                "PAGE_LIMIT=50\n",
            ),
        )
        .unwrap();
        let cfg = Settings::from_env(env_path.to_str().unwrap()).unwrap();
        assert_eq!(cfg.ws_url, "ws://127.0.0.1:9000/realtime");
        assert_eq!(cfg.api_url, "http://127.0.0.1:9001");
        assert_eq!(cfg.auth_token.as_deref(), Some("tok"));
        assert_eq!(cfg.user_id.as_deref(), Some("u1"));
        assert_eq!(cfg.bind_http, "127.0.0.1:7900");
        assert_eq!(cfg.heartbeat, Duration::from_secs(15));
        assert_eq!(cfg.backoff().delay(0), Duration::from_millis(500));
        assert_eq!(cfg.backoff().delay(10), Duration::from_millis(8000));
        assert_eq!(cfg.page_limit, 50);
    }

    #[test]
    fn defaults_when_optional_absent() {
        let _g = ENV_MUTEX.lock().unwrap();
        clear_env();
        let dir = tempdir().unwrap();
        let env_path = dir.path().join(".env");
        fs::write(
            &env_path,
            concat!(
                "WS_URL=ws://127.0.0.1:9000/realtime\n",
                "API_URL=http://127.0.0.1:9001\n",
                "BIND_HTTP=127.0.0.1:7900\n",
            ),
        )
        .unwrap();
        let cfg = Settings::from_env(env_path.to_str().unwrap()).unwrap();
        assert!(cfg.auth_token.is_none());
        assert!(cfg.user_id.is_none());
        assert_eq!(cfg.heartbeat, Duration::from_secs(30));
        assert_eq!(cfg.backoff_base, Duration::from_millis(1_000));
        assert_eq!(cfg.backoff_cap, Duration::from_millis(30_000));
        assert_eq!(cfg.page_limit, 20);
    }

    #[test]
    fn empty_credentials_are_none() {
        let _g = ENV_MUTEX.lock().unwrap();
        clear_env();
        let dir = tempdir().unwrap();
        let env_path = dir.path().join(".env");
        fs::write(
            &env_path,
            concat!(
                "WS_URL=ws://127.0.0.1:9000/realtime\n",
                "API_URL=http://127.0.0.1:9001\n",
                "BIND_HTTP=127.0.0.1:7900\n",
                "AUTH_TOKEN=\n",
                "USER_ID=\n",
            ),
        )
        .unwrap();
        let cfg = Settings::from_env(env_path.to_str().unwrap()).unwrap();
        assert!(cfg.auth_token.is_none());
        assert!(cfg.user_id.is_none());
    }

    #[test]
    fn missing_required_fields_error() {
        let _g = ENV_MUTEX.lock().unwrap();
        clear_env();
        let dir = tempdir().unwrap();
        let env_path = dir.path().join(".env");
        fs::write(&env_path, "API_URL=http://127.0.0.1:9001\n").unwrap();
        assert!(Settings::from_env(env_path.to_str().unwrap()).is_err());
    }

    #[test]
    fn invalid_numbers_fall_back_to_defaults() {
        let _g = ENV_MUTEX.lock().unwrap();
        clear_env();
        let dir = tempdir().unwrap();
        let env_path = dir.path().join(".env");
        fs::write(
            &env_path,
            concat!(
                "WS_URL=ws://127.0.0.1:9000/realtime\n",
                "API_URL=http://127.0.0.1:9001\n",
                "BIND_HTTP=127.0.0.1:7900\n",
                "HEARTBEAT_SECS=soon\n",
                "PAGE_LIMIT=lots\n",
            ),
        )
        .unwrap();
        let cfg = Settings::from_env(env_path.to_str().unwrap()).unwrap();
        assert_eq!(cfg.heartbeat, Duration::from_secs(30));
        assert_eq!(cfg.page_limit, 20);
    }
}
