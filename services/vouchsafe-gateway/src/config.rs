//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The client secret is never read from the TOML directly. It comes from the
//! settings store (admin API), or is seeded at startup from the
//! VOUCHSAFE_CLIENT_SECRET env var or `settings.client_secret_file`.

use common::Secret;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use vouchsafe_api::{API_BASE, ClientOptions, CredentialsUpdate, DASHBOARD_BASE};

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub settings: SettingsConfig,
    #[serde(default)]
    pub endpoint: EndpointConfig,
    /// Credentials to seed into the settings store at startup
    #[serde(skip)]
    pub bootstrap: Option<CredentialsUpdate>,
}

/// Listener settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Public listener (request endpoint + health)
    pub listen_addr: SocketAddr,
    /// Admin listener (settings, verifications, metrics); keep it private
    #[serde(default = "default_admin_listen_addr")]
    pub admin_listen_addr: SocketAddr,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// Remote API settings
#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_dashboard_url")]
    pub dashboard_url: String,
    #[serde(default = "default_auth_timeout")]
    pub auth_timeout_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            dashboard_url: default_dashboard_url(),
            auth_timeout_secs: default_auth_timeout(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl ApiConfig {
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            base_url: self.base_url.clone(),
            auth_timeout: Duration::from_secs(self.auth_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}

/// Persisted settings location
#[derive(Debug, Deserialize)]
pub struct SettingsConfig {
    #[serde(default = "default_settings_path")]
    pub path: PathBuf,
    /// File containing a client secret to seed at startup
    #[serde(default)]
    pub client_secret_file: Option<PathBuf>,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            path: default_settings_path(),
            client_secret_file: None,
        }
    }
}

/// Public endpoint behavior
#[derive(Debug, Default, Deserialize)]
pub struct EndpointConfig {
    /// Hosts a `fallback` URL may point at. Empty allows any http(s) host.
    #[serde(default)]
    pub allowed_redirect_hosts: Vec<String>,
}

fn default_admin_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9090))
}

fn default_max_connections() -> usize {
    1000
}

fn default_base_url() -> String {
    API_BASE.to_string()
}

fn default_dashboard_url() -> String {
    DASHBOARD_BASE.to_string()
}

fn default_auth_timeout() -> u64 {
    15
}

fn default_request_timeout() -> u64 {
    20
}

fn default_settings_path() -> PathBuf {
    PathBuf::from("vouchsafe-settings.json")
}

fn require_http(field: &str, value: &str) -> common::Result<()> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(common::Error::Config(format!(
            "{field} must start with http:// or https://, got: {value}"
        )))
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Bootstrap credentials: VOUCHSAFE_CLIENT_ID, VOUCHSAFE_WORKFLOW_ID, and
    /// VOUCHSAFE_CLIENT_SECRET (which takes precedence over client_secret_file).
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        require_http("api.base_url", &config.api.base_url)?;
        require_http("api.dashboard_url", &config.api.dashboard_url)?;

        if config.api.auth_timeout_secs == 0 || config.api.request_timeout_secs == 0 {
            return Err(common::Error::Config(
                "api timeouts must be greater than 0".into(),
            ));
        }

        if config.server.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }

        for host in &mut config.endpoint.allowed_redirect_hosts {
            *host = host.trim().to_ascii_lowercase();
        }

        let secret = if let Some(secret) = non_empty_env("VOUCHSAFE_CLIENT_SECRET") {
            Some(secret)
        } else if let Some(ref secret_file) = config.settings.client_secret_file {
            let secret = std::fs::read_to_string(secret_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read client_secret_file {}: {e}",
                    secret_file.display()
                ))
            })?;
            let secret = secret.trim().to_owned();
            (!secret.is_empty()).then_some(secret)
        } else {
            None
        };

        let update = CredentialsUpdate {
            client_id: non_empty_env("VOUCHSAFE_CLIENT_ID"),
            client_secret: secret.map(Secret::new),
            workflow_id: non_empty_env("VOUCHSAFE_WORKFLOW_ID"),
        };
        if update.client_id.is_some() || update.client_secret.is_some() || update.workflow_id.is_some()
        {
            config.bootstrap = Some(update);
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("vouchsafe-gateway.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Serializes tests that mutate environment variables.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const BOOTSTRAP_VARS: &[&str] = &[
        "VOUCHSAFE_CLIENT_ID",
        "VOUCHSAFE_CLIENT_SECRET",
        "VOUCHSAFE_WORKFLOW_ID",
    ];

    /// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
    unsafe fn set_env(key: &str, val: &str) {
        unsafe { std::env::set_var(key, val) };
    }

    unsafe fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) };
    }

    fn clear_bootstrap_env() {
        for key in BOOTSTRAP_VARS {
            unsafe { remove_env(key) };
        }
    }

    fn write_config(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("config.toml");
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn minimal_toml() -> &'static str {
        r#"
[server]
listen_addr = "0.0.0.0:8080"
"#
    }

    #[test]
    fn test_load_minimal_config_uses_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_bootstrap_env();
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&write_config(&dir, minimal_toml())).unwrap();

        assert_eq!(config.server.listen_addr.port(), 8080);
        assert_eq!(config.server.admin_listen_addr, default_admin_listen_addr());
        assert_eq!(config.server.max_connections, 1000);
        assert_eq!(config.api.base_url, "https://app.vouchsafe.id/api/v1");
        assert_eq!(config.api.dashboard_url, "https://app.vouchsafe.id");
        assert_eq!(config.api.auth_timeout_secs, 15);
        assert_eq!(config.api.request_timeout_secs, 20);
        assert_eq!(config.settings.path, PathBuf::from("vouchsafe-settings.json"));
        assert!(config.endpoint.allowed_redirect_hosts.is_empty());
        assert!(config.bootstrap.is_none());
    }

    #[test]
    fn test_load_full_config() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_bootstrap_env();
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&write_config(
            &dir,
            r#"
[server]
listen_addr = "127.0.0.1:8080"
admin_listen_addr = "127.0.0.1:9999"
max_connections = 50

[api]
base_url = "http://localhost:4000/api/v1"
request_timeout_secs = 30

[settings]
path = "/var/lib/vouchsafe/settings.json"

[endpoint]
allowed_redirect_hosts = [" Shop.Example "]
"#,
        ))
        .unwrap();

        assert_eq!(config.server.admin_listen_addr.port(), 9999);
        assert_eq!(config.server.max_connections, 50);
        let options = config.api.client_options();
        assert_eq!(options.base_url, "http://localhost:4000/api/v1");
        assert_eq!(options.auth_timeout, Duration::from_secs(15));
        assert_eq!(options.request_timeout, Duration::from_secs(30));
        assert_eq!(config.endpoint.allowed_redirect_hosts, vec!["shop.example"]);
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load(&write_config(&dir, "not valid {{{{ toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_server_section_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load(&write_config(&dir, "[api]\nbase_url = \"https://x.test\"\n"));
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load(&write_config(
            &dir,
            r#"
[server]
listen_addr = "127.0.0.1:8080"

[api]
base_url = "app.vouchsafe.id/api/v1"
"#,
        ));
        let err = format!("{}", result.unwrap_err());
        assert!(
            err.contains("api.base_url must start with http"),
            "error message should explain the issue, got: {err}"
        );
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load(&write_config(
            &dir,
            r#"
[server]
listen_addr = "127.0.0.1:8080"

[api]
auth_timeout_secs = 0
"#,
        ));
        assert!(result.is_err(), "auth_timeout_secs = 0 must be rejected");
    }

    #[test]
    fn test_zero_max_connections_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load(&write_config(
            &dir,
            r#"
[server]
listen_addr = "127.0.0.1:8080"
max_connections = 0
"#,
        ));
        assert!(result.is_err(), "max_connections = 0 must be rejected");
    }

    #[test]
    fn test_bootstrap_from_env() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_bootstrap_env();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, minimal_toml());

        unsafe { set_env("VOUCHSAFE_CLIENT_ID", "cid-env") };
        unsafe { set_env("VOUCHSAFE_CLIENT_SECRET", "secret-env") };
        let config = Config::load(&path).unwrap();
        clear_bootstrap_env();

        let bootstrap = config.bootstrap.unwrap();
        assert_eq!(bootstrap.client_id.as_deref(), Some("cid-env"));
        assert_eq!(bootstrap.client_secret.unwrap().expose(), "secret-env");
        assert!(bootstrap.workflow_id.is_none());
    }

    #[test]
    fn test_secret_from_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_bootstrap_env();
        let dir = tempfile::tempdir().unwrap();
        let secret_path = dir.path().join("client_secret");
        std::fs::write(&secret_path, "secret-file-456\n").unwrap();

        let config = Config::load(&write_config(
            &dir,
            &format!(
                r#"
[server]
listen_addr = "127.0.0.1:8080"

[settings]
client_secret_file = "{}"
"#,
                secret_path.display()
            ),
        ))
        .unwrap();

        let bootstrap = config.bootstrap.unwrap();
        assert_eq!(bootstrap.client_secret.unwrap().expose(), "secret-file-456");
        assert!(bootstrap.client_id.is_none());
    }

    #[test]
    fn test_secret_env_overrides_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_bootstrap_env();
        let dir = tempfile::tempdir().unwrap();

        let path = write_config(
            &dir,
            r#"
[server]
listen_addr = "127.0.0.1:8080"

[settings]
client_secret_file = "/nonexistent/path/client_secret"
"#,
        );

        unsafe { set_env("VOUCHSAFE_CLIENT_SECRET", "secret-env-wins") };
        let config = Config::load(&path).unwrap();
        clear_bootstrap_env();

        assert_eq!(
            config.bootstrap.unwrap().client_secret.unwrap().expose(),
            "secret-env-wins"
        );
    }

    #[test]
    fn test_secret_file_missing_is_error() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_bootstrap_env();
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load(&write_config(
            &dir,
            r#"
[server]
listen_addr = "127.0.0.1:8080"

[settings]
client_secret_file = "/nonexistent/path/client_secret"
"#,
        ));
        assert!(result.is_err(), "nonexistent client_secret_file must error");
    }

    #[test]
    fn test_resolve_path_cli_overrides_env() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("CONFIG_PATH", "/env/should-lose.toml") };
        let path = Config::resolve_path(Some("/cli/wins.toml"));
        assert_eq!(path, PathBuf::from("/cli/wins.toml"));

        let path = Config::resolve_path(None);
        assert_eq!(path, PathBuf::from("/env/should-lose.toml"));
        unsafe { remove_env("CONFIG_PATH") };
    }

    #[test]
    fn test_resolve_path_default() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env("CONFIG_PATH") };
        let path = Config::resolve_path(None);
        assert_eq!(path, PathBuf::from("vouchsafe-gateway.toml"));
    }
}
