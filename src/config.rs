use std::collections::HashSet;
use std::str::FromStr;
use std::time::Duration;

use uuid::Uuid;

pub const DEFAULT_LLM_URL: &str = "https://api.anthropic.com/v1/messages";
pub const DEFAULT_LLM_MODEL: &str = "claude-sonnet-4-20250514";

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub endpoint: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub base_url: Option<String>,
    pub bucket: Option<String>,
    pub service_key: Option<String>,
    pub timeout_secs: u64,
}

/// Knobs of the orchestrator itself.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub edit_cooldown: Duration,
    pub edit_grant: u32,
    pub bundle_zip: bool,
    pub default_design_style: String,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            edit_cooldown: Duration::from_secs(10),
            edit_grant: 3,
            bundle_zip: true,
            default_design_style: "modern_red".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct QuotaConfig {
    pub whitelist: HashSet<Uuid>,
    pub starting_credits: u32,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub llm: LlmConfig,
    pub render: RenderConfig,
    pub storage: StorageConfig,
    pub pipeline: PipelineSettings,
    /// `None` leaves generation open to anonymous callers.
    pub quota: Option<QuotaConfig>,
}

impl Config {
    /// Endpoints and secrets stay optional here; the clients report a missing
    /// value when a request actually needs it.
    pub fn from_env() -> Self {
        let defaults = PipelineSettings::default();
        let quota = optional("BETA_WHITELIST").map(|list| QuotaConfig {
            whitelist: list.split(',').filter_map(|id| id.trim().parse().ok()).collect(),
            starting_credits: parsed("STARTING_CREDITS", 3),
        });

        Self {
            port: parsed("PORT", 8080),
            llm: LlmConfig {
                api_url: optional("LLM_API_URL").unwrap_or_else(|| DEFAULT_LLM_URL.to_string()),
                api_key: optional("ANTHROPIC_API_KEY"),
                model: optional("LLM_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
                max_tokens: parsed("LLM_MAX_TOKENS", 3200),
                timeout_secs: parsed("LLM_TIMEOUT_SECS", 60),
            },
            render: RenderConfig {
                endpoint: optional("RENDER_SERVER_URL"),
                timeout_secs: parsed("RENDER_TIMEOUT_SECS", 90),
            },
            storage: StorageConfig {
                base_url: optional("STORAGE_BASE_URL"),
                bucket: optional("STORAGE_BUCKET"),
                service_key: optional("STORAGE_SERVICE_KEY"),
                timeout_secs: parsed("STORAGE_TIMEOUT_SECS", 30),
            },
            pipeline: PipelineSettings {
                edit_cooldown: Duration::from_secs(parsed("EDIT_COOLDOWN_SECS", defaults.edit_cooldown.as_secs())),
                edit_grant: parsed("EDIT_GRANT", defaults.edit_grant),
                bundle_zip: parsed("BUNDLE_ZIP", defaults.bundle_zip),
                default_design_style: optional("DEFAULT_DESIGN_STYLE").unwrap_or(defaults.default_design_style),
            },
            quota,
        }
    }
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parsed<T: FromStr>(key: &str, default: T) -> T {
    optional(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}
