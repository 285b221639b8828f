//! Application configuration
//!
//! Centralized configuration management with environment variable support
//! and sensible defaults.

use std::env;
use std::path::PathBuf;

/// Default model used by both chat agents
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// Default OpenAI API base URL
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Workflow version used when only a workflow id is configured
pub const DEFAULT_WORKFLOW_VERSION: &str = "draft";

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Agent runtime configuration
    pub openai: OpenAiConfig,
    /// Rent workbook export configuration
    pub workbook: WorkbookConfig,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind the server to
    pub port: u16,
    /// Host address to bind to
    pub host: String,
    /// Directory holding the built frontend (`index.html` + `assets/`)
    pub static_dir: PathBuf,
}

/// Agent runtime configuration
#[derive(Clone)]
pub struct OpenAiConfig {
    /// API key; chat requests fail with an error event when absent
    pub api_key: Option<String>,
    /// API base URL (overridable for proxies and tests)
    pub base_url: String,
    /// Model name
    pub model: String,
    /// Hosted workflow id forwarded as trace metadata
    pub workflow_id: Option<String>,
    /// Hosted workflow version
    pub workflow_version: String,
    /// Vector store backing the rent data lookup
    pub vector_store_id: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

// The API key never goes to the logs.
impl std::fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("workflow_id", &self.workflow_id)
            .field("workflow_version", &self.workflow_version)
            .field("vector_store_id", &self.vector_store_id)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Rent workbook export configuration
#[derive(Debug, Clone)]
pub struct WorkbookConfig {
    /// Directory containing `RENT_Payments_{year}.txt`
    pub data_dir: PathBuf,
    /// Spreadsheet template path
    pub template_path: PathBuf,
    /// The only year the template supports
    pub year: i32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                port: 8000,
                host: "0.0.0.0".to_string(),
                static_dir: PathBuf::from("static"),
            },
            openai: OpenAiConfig {
                api_key: None,
                base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
                model: DEFAULT_MODEL.to_string(),
                workflow_id: None,
                workflow_version: DEFAULT_WORKFLOW_VERSION.to_string(),
                vector_store_id: None,
                timeout_secs: 120,
            },
            workbook: WorkbookConfig {
                data_dir: PathBuf::from("data"),
                template_path: PathBuf::from("templates/Property_Rents_Received_Template.xlsx"),
                year: 2025,
            },
        }
    }
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            server: ServerConfig {
                port: env::var("PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(defaults.server.port),
                host: env::var("HOST").unwrap_or(defaults.server.host),
                static_dir: non_empty_var("STATIC_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.server.static_dir),
            },
            openai: OpenAiConfig {
                api_key: non_empty_var("OPENAI_API_KEY"),
                base_url: non_empty_var("OPENAI_BASE_URL")
                    .map(|url| url.trim_end_matches('/').to_string())
                    .unwrap_or(defaults.openai.base_url),
                model: non_empty_var("OPENAI_MODEL").unwrap_or(defaults.openai.model),
                workflow_id: non_empty_var("OPENAI_WORKFLOW_ID"),
                workflow_version: non_empty_var("OPENAI_WORKFLOW_VERSION")
                    .unwrap_or(defaults.openai.workflow_version),
                vector_store_id: non_empty_var("OPENAI_VECTOR_STORE_ID"),
                timeout_secs: env::var("OPENAI_TIMEOUT_SECS")
                    .ok()
                    .and_then(|t| t.parse().ok())
                    .unwrap_or(defaults.openai.timeout_secs),
            },
            workbook: WorkbookConfig {
                data_dir: non_empty_var("RENT_DATA_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.workbook.data_dir),
                template_path: non_empty_var("RENT_TEMPLATE_PATH")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.workbook.template_path),
                year: env::var("RENT_WORKBOOK_YEAR")
                    .ok()
                    .and_then(|y| y.parse().ok())
                    .unwrap_or(defaults.workbook.year),
            },
        }
    }

    /// Get the server address as a string
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
