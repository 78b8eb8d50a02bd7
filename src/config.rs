//! Configuration management
//!
//! Both the stdio server and the OAuth login helper are configured purely
//! through `REFLECT_*` environment variables (optionally seeded from a `.env`
//! file in the working directory).

use std::collections::BTreeMap;

use figment::{
    Figment,
    providers::{Env, Serialized},
};
use serde::Deserialize;
use url::Url;

use crate::{Error, Result};

/// Default Reflect API base URL
pub const DEFAULT_API_BASE_URL: &str = "https://reflect.app/api";

/// Default OAuth redirect URI used by the login helper
pub const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:8787/callback";

/// Prefix shared by every environment variable the connector reads
pub const ENV_PREFIX: &str = "REFLECT_";

/// Configuration for the MCP server
#[derive(Clone)]
pub struct ServerConfig {
    /// Bearer token for the Reflect API
    pub access_token: String,
    /// Graph used when a tool call does not name one
    pub default_graph_id: Option<String>,
    /// API base URL
    pub api_base_url: String,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("access_token", &"<redacted>")
            .field("default_graph_id", &self.default_graph_id)
            .field("api_base_url", &self.api_base_url)
            .finish()
    }
}

/// Configuration for the OAuth login helper
#[derive(Clone)]
pub struct AuthConfig {
    /// OAuth client id
    pub client_id: String,
    /// OAuth client secret (confidential clients only)
    pub client_secret: Option<String>,
    /// Loopback redirect URI registered for the client
    pub redirect_uri: String,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "<redacted>"),
            )
            .field("redirect_uri", &self.redirect_uri)
            .finish()
    }
}

/// Raw server variables as extracted by figment
#[derive(Debug, Default, Deserialize)]
struct ServerEnv {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    default_graph_id: Option<String>,
    #[serde(default)]
    api_base_url: Option<String>,
}

/// Raw login helper variables as extracted by figment
#[derive(Debug, Default, Deserialize)]
struct AuthEnv {
    #[serde(default)]
    client_id: Option<String>,
    #[serde(default)]
    client_secret: Option<String>,
    #[serde(default)]
    oauth_redirect_uri: Option<String>,
}

/// Provider for all `REFLECT_*` variables, keyed by lowercased name with the
/// prefix stripped.
///
/// Values stay verbatim strings: `Env` on its own would parse `007` into the
/// integer 7 and `[a, b]` into an array.
#[must_use]
pub fn env_provider() -> Serialized<BTreeMap<String, String>> {
    let vars: BTreeMap<String, String> = Env::prefixed(ENV_PREFIX)
        .iter()
        .map(|(key, value)| (key.as_str().to_ascii_lowercase(), value))
        .collect();
    Serialized::defaults(vars)
}

/// Load `.env` from the working directory into the process environment.
/// A missing file is not an error.
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(path = %path.display(), "Loaded env file"),
        Err(e) if e.not_found() => tracing::trace!("No .env file found"),
        Err(e) => tracing::warn!(error = %e, "Failed to load .env file"),
    }
}

/// Collects validation issues so every problem is reported at once.
#[derive(Default)]
struct Issues(Vec<String>);

impl Issues {
    fn push(&mut self, var: &str, message: &str) {
        self.0.push(format!("{ENV_PREFIX}{var}: {message}"));
    }

    fn required(&mut self, var: &str, value: Option<&String>) {
        match value {
            None => self.push(var, "Required"),
            Some(v) if v.is_empty() => self.push(var, "String must contain at least 1 character(s)"),
            Some(_) => {}
        }
    }

    fn optional_non_empty(&mut self, var: &str, value: Option<&String>) {
        if value.is_some_and(String::is_empty) {
            self.push(var, "String must contain at least 1 character(s)");
        }
    }

    fn optional_url(&mut self, var: &str, value: Option<&String>) {
        if let Some(v) = value {
            if let Err(e) = Url::parse(v) {
                self.push(var, &format!("Invalid url ({e})"));
            }
        }
    }

    fn into_result(self, context: &str) -> Result<()> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(Error::Config(format!("{context}: {}", self.0.join("; "))))
        }
    }
}

impl ServerConfig {
    /// Load server configuration from the process environment (and `.env`)
    pub fn load() -> Result<Self> {
        load_dotenv();
        Self::from_figment(&Figment::from(env_provider()))
    }

    /// Extract and validate server configuration from a figment
    pub fn from_figment(figment: &Figment) -> Result<Self> {
        let raw: ServerEnv = figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;

        let mut issues = Issues::default();
        issues.required("ACCESS_TOKEN", raw.access_token.as_ref());
        issues.optional_non_empty("DEFAULT_GRAPH_ID", raw.default_graph_id.as_ref());
        issues.optional_url("API_BASE_URL", raw.api_base_url.as_ref());
        issues.into_result("Invalid environment configuration")?;

        Ok(Self {
            access_token: raw.access_token.unwrap_or_default(),
            default_graph_id: raw.default_graph_id,
            api_base_url: raw
                .api_base_url
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
        })
    }
}

impl AuthConfig {
    /// Load login helper configuration from the process environment (and `.env`)
    pub fn load() -> Result<Self> {
        load_dotenv();
        Self::from_figment(&Figment::from(env_provider()))
    }

    /// Extract and validate login helper configuration from a figment
    pub fn from_figment(figment: &Figment) -> Result<Self> {
        let raw: AuthEnv = figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;

        let mut issues = Issues::default();
        issues.required("CLIENT_ID", raw.client_id.as_ref());
        issues.optional_non_empty("CLIENT_SECRET", raw.client_secret.as_ref());
        issues.optional_url("OAUTH_REDIRECT_URI", raw.oauth_redirect_uri.as_ref());
        issues.into_result("Invalid OAuth environment configuration")?;

        Ok(Self {
            client_id: raw.client_id.unwrap_or_default(),
            client_secret: raw.client_secret,
            redirect_uri: raw
                .oauth_redirect_uri
                .unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use pretty_assertions::assert_eq;

    fn server_from_env() -> Result<ServerConfig> {
        ServerConfig::from_figment(&Figment::from(env_provider()))
    }

    fn auth_from_env() -> Result<AuthConfig> {
        AuthConfig::from_figment(&Figment::from(env_provider()))
    }

    #[test]
    fn server_requires_access_token() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            let err = server_from_env().unwrap_err().to_string();
            assert!(err.contains("REFLECT_ACCESS_TOKEN"), "got: {err}");
            assert!(err.contains("Invalid environment configuration"));
            Ok(())
        });
    }

    #[test]
    fn server_rejects_empty_access_token() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.set_env("REFLECT_ACCESS_TOKEN", "");
            let err = server_from_env().unwrap_err().to_string();
            assert!(err.contains("REFLECT_ACCESS_TOKEN"), "got: {err}");
            Ok(())
        });
    }

    #[test]
    fn server_defaults_base_url() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.set_env("REFLECT_ACCESS_TOKEN", "x");
            let cfg = server_from_env().map_err(|e| e.to_string())?;
            assert_eq!(cfg.api_base_url, "https://reflect.app/api");
            assert_eq!(cfg.access_token, "x");
            assert_eq!(cfg.default_graph_id, None);
            Ok(())
        });
    }

    #[test]
    fn server_rejects_invalid_base_url() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.set_env("REFLECT_ACCESS_TOKEN", "x");
            jail.set_env("REFLECT_API_BASE_URL", "not a url");
            let err = server_from_env().unwrap_err().to_string();
            assert!(err.contains("REFLECT_API_BASE_URL"), "got: {err}");
            Ok(())
        });
    }

    #[test]
    fn server_reads_optional_values() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.set_env("REFLECT_ACCESS_TOKEN", "tok");
            jail.set_env("REFLECT_DEFAULT_GRAPH_ID", "graph-1");
            jail.set_env("REFLECT_API_BASE_URL", "http://localhost:9000/api");
            let cfg = server_from_env().map_err(|e| e.to_string())?;
            assert_eq!(cfg.default_graph_id.as_deref(), Some("graph-1"));
            assert_eq!(cfg.api_base_url, "http://localhost:9000/api");
            Ok(())
        });
    }

    #[test]
    fn auth_requires_client_id() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            let err = auth_from_env().unwrap_err().to_string();
            assert!(err.contains("REFLECT_CLIENT_ID"), "got: {err}");
            assert!(err.contains("Invalid OAuth environment configuration"));
            Ok(())
        });
    }

    #[test]
    fn auth_defaults_redirect_uri() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.set_env("REFLECT_CLIENT_ID", "x");
            let cfg = auth_from_env().map_err(|e| e.to_string())?;
            assert_eq!(cfg.redirect_uri, "http://127.0.0.1:8787/callback");
            assert_eq!(cfg.client_secret, None);
            Ok(())
        });
    }

    #[test]
    fn auth_accepts_numeric_client_id() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.set_env("REFLECT_CLIENT_ID", "12345");
            let cfg = auth_from_env().map_err(|e| e.to_string())?;
            assert_eq!(cfg.client_id, "12345");
            Ok(())
        });
    }

    #[test]
    fn auth_keeps_numeric_looking_values_verbatim() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.set_env("REFLECT_CLIENT_ID", "007");
            jail.set_env("REFLECT_CLIENT_SECRET", "1.50");
            let cfg = auth_from_env().map_err(|e| e.to_string())?;
            assert_eq!(cfg.client_id, "007");
            assert_eq!(cfg.client_secret.as_deref(), Some("1.50"));
            Ok(())
        });
    }

    #[test]
    fn server_keeps_bracketed_token_verbatim() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.set_env("REFLECT_ACCESS_TOKEN", "[abc, def]");
            jail.set_env("REFLECT_DEFAULT_GRAPH_ID", "true");
            let cfg = server_from_env().map_err(|e| e.to_string())?;
            assert_eq!(cfg.access_token, "[abc, def]");
            assert_eq!(cfg.default_graph_id.as_deref(), Some("true"));
            Ok(())
        });
    }

    #[test]
    fn auth_reports_every_issue() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.set_env("REFLECT_OAUTH_REDIRECT_URI", "::nope::");
            let err = auth_from_env().unwrap_err().to_string();
            assert!(err.contains("REFLECT_CLIENT_ID"), "got: {err}");
            assert!(err.contains("REFLECT_OAUTH_REDIRECT_URI"), "got: {err}");
            Ok(())
        });
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let cfg = AuthConfig {
            client_id: "id".to_string(),
            client_secret: Some("hunter2".to_string()),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
        };
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("hunter2"));

        let server = ServerConfig {
            access_token: "secret-token".to_string(),
            default_graph_id: None,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
        };
        assert!(!format!("{server:?}").contains("secret-token"));
    }
}
