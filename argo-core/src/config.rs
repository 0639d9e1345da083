//! Client configuration
//!
//! The mode, offline file set and server options are carried in one explicit
//! struct handed to the client factory. Values are layered: defaults, then an
//! optional TOML file, then environment variables, then command-line flags
//! (applied by the caller).

use crate::ArgoError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Environment variable names read by the client layer
pub mod env {
    /// Pre-obtained auth token, sent as the bearer credential
    pub const TOKEN: &str = "ARGO_TOKEN";
    /// Active namespace
    pub const NAMESPACE: &str = "ARGO_NAMESPACE";
    /// Argo Server `host:port` or URL
    pub const SERVER: &str = "ARGO_SERVER";
    /// Path prefix when the server is behind a base href
    pub const BASE_HREF: &str = "ARGO_BASE_HREF";
    /// TLS on unless set to "false"
    pub const SECURE: &str = "ARGO_SECURE";
    /// Skip certificate verification when "true"
    pub const INSECURE_SKIP_VERIFY: &str = "ARGO_INSECURE_SKIP_VERIFY";
    /// Controller instance id label applied to created objects
    pub const INSTANCE_ID: &str = "ARGO_INSTANCEID";
    /// Explicit client config file
    pub const CONFIG: &str = "ARGO_CONFIG";
}

/// Namespace used when neither configuration nor environment names one
pub const DEFAULT_NAMESPACE: &str = "default";

/// Default client configuration as TOML
pub const DEFAULT_CONFIG: &str = r#"# Argo client configuration

# "live" talks to an Argo Server, "offline" answers from local manifests
mode = "live"
# Manifest files or directories loaded in offline mode
offline_files = []
# Seconds before a request to the server is abandoned
request_timeout_secs = 30

[server]
# host:port or full URL of the Argo Server (ARGO_SERVER)
# url = "localhost:2746"
base_href = ""
secure = true
insecure_skip_verify = false
# Extra headers, "Name: value"
headers = []
"#;

/// Whether commands talk to a server or to local manifests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Live,
    Offline,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub mode: Mode,
    #[serde(default)]
    pub offline_files: Vec<PathBuf>,
    /// Explicit namespace; wins over `ARGO_NAMESPACE`
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub instance_id: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Server connection options. `Debug` shows header names only.
#[derive(Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub base_href: String,
    #[serde(default = "default_secure")]
    pub secure: bool,
    #[serde(default)]
    pub insecure_skip_verify: bool,
    #[serde(default)]
    pub headers: Vec<String>,
}

fn default_request_timeout_secs() -> u64 {
    30
}
fn default_secure() -> bool {
    true
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            offline_files: Vec::new(),
            namespace: None,
            instance_id: None,
            request_timeout_secs: default_request_timeout_secs(),
            server: ServerConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: None,
            base_href: String::new(),
            secure: default_secure(),
            insecure_skip_verify: false,
            headers: Vec::new(),
        }
    }
}

impl ClientConfig {
    /// Offline configuration over the given manifest paths
    pub fn offline<P: Into<PathBuf>>(files: impl IntoIterator<Item = P>) -> Self {
        Self {
            mode: Mode::Offline,
            offline_files: files.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Live configuration against `server`
    pub fn live(server: impl Into<String>) -> Self {
        Self {
            mode: Mode::Live,
            server: ServerConfig {
                url: Some(server.into()),
                ..ServerConfig::default()
            },
            ..Self::default()
        }
    }

    /// Load config from a TOML file
    pub fn load(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ArgoError::ConfigParse(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Parse config from TOML string
    pub fn from_toml(content: &str) -> crate::Result<Self> {
        toml::from_str(content).map_err(|e| ArgoError::ConfigParse(e.to_string()))
    }

    /// Resolve configuration from the process environment.
    ///
    /// Precedence (highest to lowest):
    /// 1. Environment variables
    /// 2. Config file (`explicit`, else `ARGO_CONFIG`, else the default path if present)
    /// 3. Default values
    pub fn resolve(explicit: Option<&Path>) -> crate::Result<Self> {
        let from_env = std::env::var_os(env::CONFIG).map(PathBuf::from);
        let mut config = match explicit.map(Path::to_path_buf).or(from_env) {
            Some(path) => Self::load(&path)?,
            None => match Self::default_config_path().filter(|p| p.is_file()) {
                Some(path) => {
                    debug!("Loading config from: {}", path.display());
                    Self::load(&path)?
                }
                None => Self::default(),
            },
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        debug!(
            mode = ?config.mode,
            server = ?config.server.url,
            headers = config.server.headers.len(),
            "resolved client configuration"
        );
        Ok(config)
    }

    /// `<config dir>/argo/client.toml`
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("argo").join("client.toml"))
    }

    /// Apply environment overrides read through `lookup`.
    ///
    /// Takes the lookup as a function so tests need not touch process state.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(env::SERVER).filter(|v| !v.is_empty()) {
            self.server.url = Some(url);
        }
        if let Some(href) = lookup(env::BASE_HREF) {
            self.server.base_href = href;
        }
        if let Some(secure) = lookup(env::SECURE) {
            self.server.secure = secure != "false";
        }
        if let Some(skip) = lookup(env::INSECURE_SKIP_VERIFY) {
            self.server.insecure_skip_verify = skip == "true";
        }
        if let Some(id) = lookup(env::INSTANCE_ID).filter(|v| !v.is_empty()) {
            self.instance_id = Some(id);
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl ServerConfig {
    /// Full base URL of the server, or `None` when no server is configured.
    ///
    /// A bare `host:port` gets `https://` or `http://` depending on `secure`;
    /// the base href is appended as a path prefix.
    pub fn base_url(&self) -> Option<String> {
        let raw = self.url.as_deref().map(str::trim).filter(|u| !u.is_empty())?;
        let root = if raw.contains("://") {
            raw.trim_end_matches('/').to_string()
        } else {
            let scheme = if self.secure { "https" } else { "http" };
            format!("{}://{}", scheme, raw.trim_end_matches('/'))
        };
        let href = self.base_href.trim_matches('/');
        if href.is_empty() {
            Some(root)
        } else {
            Some(format!("{}/{}", root, href))
        }
    }

    /// Parse extra headers.
    ///
    /// Each entry is `Name: value`; an entry may hold several comma separated
    /// headers.
    pub fn parsed_headers(&self) -> crate::Result<Vec<(String, String)>> {
        let mut headers = Vec::new();
        for entry in &self.headers {
            for header in entry.split(',').map(str::trim).filter(|h| !h.is_empty()) {
                let (name, value) = header.split_once(':').ok_or_else(|| {
                    ArgoError::InvalidConfig(format!(
                        "header {:?} is not in \"Name: value\" form",
                        header
                    ))
                })?;
                let name = name.trim();
                if name.is_empty() {
                    return Err(ArgoError::InvalidConfig(format!(
                        "header {:?} has an empty name",
                        header
                    )));
                }
                headers.push((name.to_string(), value.trim().to_string()));
            }
        }
        Ok(headers)
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let header_names: Vec<&str> = self
            .headers
            .iter()
            .flat_map(|entry| entry.split(','))
            .filter_map(|header| header.split(':').next())
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .collect();
        f.debug_struct("ServerConfig")
            .field("url", &self.url)
            .field("base_href", &self.base_href)
            .field("secure", &self.secure)
            .field("insecure_skip_verify", &self.insecure_skip_verify)
            .field("headers", &header_names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config_parses() {
        let config = ClientConfig::from_toml(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.mode, Mode::Live);
        assert!(config.offline_files.is_empty());
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert!(config.server.secure);
        assert!(config.server.url.is_none());
    }

    #[test]
    fn test_offline_config_from_toml() {
        let config = ClientConfig::from_toml(
            r#"
mode = "offline"
offline_files = ["a.yaml", "templates/"]
namespace = "team-a"
"#,
        )
        .unwrap();
        assert_eq!(config.mode, Mode::Offline);
        assert_eq!(config.offline_files.len(), 2);
        assert_eq!(config.namespace.as_deref(), Some("team-a"));
    }

    #[test]
    fn test_bad_mode_is_config_error() {
        let err = ClientConfig::from_toml("mode = \"sideways\"").unwrap_err();
        assert!(matches!(err, ArgoError::ConfigParse(_)));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            (env::SERVER, "argo.example.com:443"),
            (env::SECURE, "false"),
            (env::INSECURE_SKIP_VERIFY, "true"),
            (env::BASE_HREF, "/argo/"),
            (env::INSTANCE_ID, "blue"),
        ]
        .into_iter()
        .collect();

        let mut config = ClientConfig::default();
        config.apply_env_overrides(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.server.url.as_deref(), Some("argo.example.com:443"));
        assert!(!config.server.secure);
        assert!(config.server.insecure_skip_verify);
        assert_eq!(config.instance_id.as_deref(), Some("blue"));
        assert_eq!(
            config.server.base_url().as_deref(),
            Some("http://argo.example.com:443/argo")
        );
    }

    #[test]
    fn test_secure_stays_on_unless_false() {
        let mut config = ClientConfig::default();
        config.apply_env_overrides(|k| (k == env::SECURE).then(|| "yes".to_string()));
        assert!(config.server.secure);
    }

    #[test]
    fn test_base_url() {
        let mut server = ServerConfig::default();
        assert_eq!(server.base_url(), None);

        server.url = Some("localhost:2746".to_string());
        assert_eq!(server.base_url().as_deref(), Some("https://localhost:2746"));

        server.url = Some("http://127.0.0.1:9000/".to_string());
        assert_eq!(server.base_url().as_deref(), Some("http://127.0.0.1:9000"));
    }

    #[test]
    fn test_parsed_headers() {
        let server = ServerConfig {
            headers: vec![
                "X-Team: a".to_string(),
                "X-One: 1, X-Two: 2".to_string(),
            ],
            ..ServerConfig::default()
        };
        let headers = server.parsed_headers().unwrap();
        assert_eq!(
            headers,
            vec![
                ("X-Team".to_string(), "a".to_string()),
                ("X-One".to_string(), "1".to_string()),
                ("X-Two".to_string(), "2".to_string()),
            ]
        );

        let bad = ServerConfig {
            headers: vec!["no-colon".to_string()],
            ..ServerConfig::default()
        };
        assert!(matches!(
            bad.parsed_headers(),
            Err(ArgoError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("client.toml");
        std::fs::write(&path, "[server]\nurl = \"localhost:2746\"\nsecure = false\n").unwrap();

        let config = ClientConfig::load(&path).unwrap();
        assert_eq!(
            config.server.base_url().as_deref(),
            Some("http://localhost:2746")
        );

        let missing = ClientConfig::load(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(missing, ArgoError::ConfigParse(_)));
    }

    #[test]
    fn test_debug_hides_header_values() {
        let mut config = ClientConfig::live("localhost:2746");
        config.server.headers = vec!["Authorization: Bearer s3cret, X-Team: blue".to_string()];

        let rendered = format!("{:?}", config);
        assert!(rendered.contains("Authorization"));
        assert!(rendered.contains("X-Team"));
        assert!(!rendered.contains("s3cret"));
        assert!(!rendered.contains("blue"));
    }
}
