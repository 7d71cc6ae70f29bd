/// Configuration schema and defaults for speckle-activity.
///
/// Defines the TOML-serializable configuration structure with four sections:
/// `[server]`, `[dashboard]`, `[web]` and `[logging]`.
///
/// Every field has a built-in default. Users only need to set the values
/// they want to override; in practice that is the access token.
use serde::{Deserialize, Serialize};

use crate::speckle::DEFAULT_COMMIT_LIMIT;

/// Shown in place of a configured token wherever config is displayed.
pub const REDACTED: &str = "********";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level configuration.
///
/// Maps directly to `~/.speckle-activity/config.toml` and
/// `.speckle-activity.toml`. Loaded once at startup and passed by reference.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityConfig {
    pub server: ServerConfig,
    pub dashboard: DashboardConfig,
    pub web: WebConfig,
    pub logging: LoggingConfig,
}

// ---------------------------------------------------------------------------
// [server]
// ---------------------------------------------------------------------------

/// Remote server connection settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server address: bare host (`speckle.xyz`) or full URL.
    pub url: String,
    /// Personal access token. Empty means "ask the user".
    pub token: String,
    /// Maximum commits fetched per stream, most recent first.
    pub commit_limit: usize,
    /// Maximum branches fetched per stream.
    pub branch_limit: usize,
    /// Maximum streams listed for the stream picker.
    pub stream_limit: usize,
    /// HTTP request timeout (milliseconds).
    pub timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: "speckle.xyz".to_string(),
            token: String::new(),
            commit_limit: DEFAULT_COMMIT_LIMIT,
            branch_limit: 100,
            stream_limit: 50,
            timeout_ms: 30_000,
        }
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("url", &self.url)
            .field("token", &if self.token.is_empty() { "" } else { REDACTED })
            .field("commit_limit", &self.commit_limit)
            .field("branch_limit", &self.branch_limit)
            .field("stream_limit", &self.stream_limit)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// [dashboard]
// ---------------------------------------------------------------------------

/// Page titles and layout settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Browser tab title.
    pub page_title_tab: String,
    /// Heading at the top of the page.
    pub page_title_header: String,
    /// Emoji shown as the page icon.
    pub page_icon: String,
    /// Text of the "About this app" section.
    pub about: String,
    /// Height of the embedded viewer (pixels).
    pub viewer_height: u32,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            page_title_tab: "Speckle Stream Activity".to_string(),
            page_title_header: "Speckle Stream Activity App 📈".to_string(),
            page_icon: "📊".to_string(),
            about: "A small dashboard that reads a stream's branches, commits and \
                    collaborators from the Speckle API and summarizes its activity."
                .to_string(),
            viewer_height: 400,
        }
    }
}

// ---------------------------------------------------------------------------
// [web]
// ---------------------------------------------------------------------------

/// Embedded web dashboard settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    /// Bind address of the HTTP server.
    pub addr: String,
    /// Open the dashboard in the default browser on start.
    pub open_browser: bool,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8501".to_string(),
            open_browser: true,
        }
    }
}

// ---------------------------------------------------------------------------
// [logging]
// ---------------------------------------------------------------------------

/// Render log settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Whether render passes are appended to the log.
    pub enabled: bool,
    /// Path to the JSONL render log. `~` is expanded to the home directory.
    pub path: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "~/.speckle-activity/render-log.jsonl".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Redaction
// ---------------------------------------------------------------------------

impl ActivityConfig {
    /// Copy of this config with the token masked, for display.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.server.token.is_empty() {
            copy.server.token = REDACTED.to_string();
        }
        copy
    }

    /// Whether a token is configured.
    pub fn has_token(&self) -> bool {
        !self.server.token.trim().is_empty()
    }
}

// ---------------------------------------------------------------------------
// Default TOML content
// ---------------------------------------------------------------------------

impl ActivityConfig {
    /// Generate the annotated default TOML config file content.
    ///
    /// Used by `speckle-activity config init`.
    pub fn default_toml() -> String {
        r#"# speckle-activity configuration
#
# Configuration hierarchy (highest precedence wins):
#   1. Environment variables (SPECKLE_*)
#   2. Project config (.speckle-activity.toml in current directory)
#   3. User global config (~/.speckle-activity/config.toml)
#   4. Built-in defaults

[server]
url = "speckle.xyz"       # bare host or full URL (http://localhost:3000)
token = ""                # personal access token, or set SPECKLE_TOKEN
commit_limit = 100        # commits fetched per stream, most recent first
branch_limit = 100
stream_limit = 50
timeout_ms = 30000

[dashboard]
page_title_tab = "Speckle Stream Activity"
page_title_header = "Speckle Stream Activity App 📈"
page_icon = "📊"
about = "A small dashboard that reads a stream's branches, commits and collaborators from the Speckle API and summarizes its activity."
viewer_height = 400

[web]
addr = "127.0.0.1:8501"
open_browser = true

[logging]
enabled = true
path = "~/.speckle-activity/render-log.jsonl"
"#
        .to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
