use std::net::SocketAddr;
use std::path::PathBuf;

/// Host configuration, constructed once at startup and passed to the
/// authorization gate and file-serving handlers. Nothing reads process
/// environment after boot.
#[derive(Debug, Clone)]
pub struct HostConfig {
    pub bind: SocketAddr,
    /// Root served via `/files` and `/api/tree`; also holds `manifest.json`.
    pub base_dir: PathBuf,
    /// Directory for `index.html` and other frontend assets.
    pub static_dir: PathBuf,
    /// Event log directory.
    pub data_dir: PathBuf,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Require the shared token (private networks may still be allowed).
    Token,
    /// No token checks.
    Open,
}

impl AuthMode {
    pub fn parse(raw: &str) -> AuthMode {
        match raw.trim().to_ascii_lowercase().as_str() {
            "none" | "open" => AuthMode::Open,
            _ => AuthMode::Token,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub mode: AuthMode,
    /// Shared device token; `None` or empty disables token checks.
    pub token: Option<String>,
    /// Accept requests from private/CGNAT networks without a token.
    pub allow_private: bool,
}

impl AuthConfig {
    pub fn token_set(&self) -> bool {
        self.token.as_deref().is_some_and(|token| !token.is_empty())
    }
}
