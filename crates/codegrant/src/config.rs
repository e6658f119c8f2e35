//! Configuration file loading.

use anyhow::Context;
use codegrant_oauth::OAuthConfig;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "CODEGRANT_CONFIG";

/// Picks the configuration file: CLI argument, then environment, then
/// `<config dir>/codegrant/config.json`.
pub fn resolve_config_path(arg: Option<String>, env: Option<OsString>) -> PathBuf {
    arg.map(PathBuf::from)
        .or_else(|| env.map(PathBuf::from))
        .unwrap_or_else(default_config_path)
}

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("codegrant")
        .join("config.json")
}

/// Loads and validates the configuration file at `path`.
pub async fn load_config(path: &Path) -> anyhow::Result<OAuthConfig> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("cannot read configuration file {}", path.display()))?;

    let config: OAuthConfig = serde_json::from_str(&contents)
        .with_context(|| format!("invalid configuration file {}", path.display()))?;
    config.validate()?;

    tracing::debug!(path = %path.display(), port = config.port, "configuration loaded");
    Ok(config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"{
        "base_url": "login.sipgate.com",
        "auth_endpoint": "/login/third-party/protocol/openid-connect/auth",
        "token_endpoint": "/login/third-party/protocol/openid-connect/token",
        "client_id": "my-client",
        "client_secret": "my-secret",
        "redirect_uri": "http://localhost:8080/oauth",
        "oauth_scope": "all",
        "port": 8080,
        "http_timeout_secs": 30
    }"#;

    #[test]
    fn test_argument_wins_over_environment() {
        let path = resolve_config_path(
            Some("from-arg.json".to_string()),
            Some(OsString::from("from-env.json")),
        );
        assert_eq!(path, PathBuf::from("from-arg.json"));

        let path = resolve_config_path(None, Some(OsString::from("from-env.json")));
        assert_eq!(path, PathBuf::from("from-env.json"));
    }

    #[test]
    fn test_default_path() {
        let path = resolve_config_path(None, None);
        assert!(path.ends_with("codegrant/config.json"));
    }

    #[tokio::test]
    async fn test_load_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = load_config(file.path()).await.unwrap();
        assert_eq!(config.client_id, "my-client");
        assert_eq!(config.port, 8080);
        assert_eq!(config.http_timeout_secs, Some(30));
        assert_eq!(config.account_url, codegrant_oauth::config::DEFAULT_ACCOUNT_URL);
    }

    #[tokio::test]
    async fn test_load_config_rejects_missing_key() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"{"base_url": "login.sipgate.com"}"#).unwrap();

        let err = load_config(file.path()).await.unwrap_err();
        assert!(err.to_string().contains("invalid configuration file"));
    }

    #[tokio::test]
    async fn test_load_config_rejects_invalid_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.replace("my-secret", "").as_bytes())
            .unwrap();

        let err = load_config(file.path()).await.unwrap_err();
        assert!(err.to_string().contains("client_secret"));
    }

    #[tokio::test]
    async fn test_missing_file() {
        let err = load_config(Path::new("/nonexistent/codegrant.json"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("cannot read configuration file"));
    }
}
