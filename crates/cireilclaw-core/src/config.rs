use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use figment::{
    providers::{Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Environment variable naming the root directory's parent (`$HOME/.cireilclaw`).
pub const ROOT_DIR_ENV: &str = "HOME";
pub const ROOT_DIR_NAME: &str = ".cireilclaw";

pub const MAX_TURNS: usize = 30;
pub const CHUNK_LIMIT: usize = 1800;
pub const SESSION_SAVE_DEBOUNCE_SECS: u64 = 2;
pub const HEARTBEAT_OK_TOKEN: &str = "HEARTBEAT_OK";
pub const BUSY_POLL_TIMEOUT_SECS: u64 = 5;
pub const BUSY_POLL_INTERVAL_MS: u64 = 500;

/// Resolves `$HOME/.cireilclaw`.
pub fn root_dir() -> Result<PathBuf> {
    let home = std::env::var(ROOT_DIR_ENV)
        .map_err(|_| ConfigError::MissingEnv(ROOT_DIR_ENV.to_string()))?;
    Ok(PathBuf::from(home).join(ROOT_DIR_NAME))
}

/// `{root}/agents/{slug}`.
pub fn agent_root(root: &Path, slug: &crate::types::AgentSlug) -> PathBuf {
    root.join("agents").join(slug.as_str())
}

/// Lists every agent slug with an existing directory under `{root}/agents/`.
pub fn discover_agents(root: &Path) -> std::io::Result<Vec<crate::types::AgentSlug>> {
    let agents_dir = root.join("agents");
    if !agents_dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut slugs: Vec<crate::types::AgentSlug> = std::fs::read_dir(agents_dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .map(|name| crate::types::AgentSlug::new(name))
        .collect();
    slugs.sort();
    Ok(slugs)
}

/// `config/engine.toml` — `{apiBase, apiKey?, model, channel?}` plus the
/// per-channel override table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    pub api_base: String,
    pub api_key: Option<String>,
    pub model: String,
    #[serde(default)]
    pub channel_overrides: ChannelOverrides,
}

/// Partial override: channel kind (`"discord"`, `"matrix"`) → sub-key
/// (guild id / room id) → partial `{apiBase?, apiKey?, model?}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelOverrides(pub HashMap<String, HashMap<String, EngineOverride>>);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineOverride {
    pub api_base: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
}

impl EngineConfig {
    /// Resolves the effective `{apiBase, apiKey, model}` for a channel,
    /// applying any matching override.
    pub fn resolve(&self, channel_kind: &str, override_key: Option<&str>) -> ResolvedEngine {
        let mut resolved = ResolvedEngine {
            api_base: self.api_base.clone(),
            api_key: self.api_key.clone(),
            model: self.model.clone(),
        };
        if let Some(key) = override_key {
            if let Some(ov) = self
                .channel_overrides
                .0
                .get(channel_kind)
                .and_then(|m| m.get(key))
            {
                if let Some(v) = &ov.api_base {
                    resolved.api_base = v.clone();
                }
                if let Some(v) = &ov.api_key {
                    resolved.api_key = Some(v.clone());
                }
                if let Some(v) = &ov.model {
                    resolved.model = v.clone();
                }
            }
        }
        resolved
    }
}

/// A fully-resolved, immutable snapshot a turn takes at context-assembly
/// time so concurrent config hot-reload cannot affect an in-flight turn.
#[derive(Debug, Clone)]
pub struct ResolvedEngine {
    pub api_base: String,
    pub api_key: Option<String>,
    pub model: String,
}

/// `config/tools.toml` — table of `tool-name -> bool | {enabled, ...}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolsConfig(pub HashMap<String, ToolEntry>);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolEntry {
    Enabled(bool),
    Detailed {
        enabled: bool,
        #[serde(flatten)]
        extra: serde_json::Value,
    },
}

impl ToolEntry {
    pub fn is_enabled(&self) -> bool {
        match self {
            ToolEntry::Enabled(b) => *b,
            ToolEntry::Detailed { enabled, .. } => *enabled,
        }
    }

    pub fn extra(&self) -> Option<&serde_json::Value> {
        match self {
            ToolEntry::Detailed { extra, .. } => Some(extra),
            ToolEntry::Enabled(_) => None,
        }
    }
}

impl ToolsConfig {
    pub fn is_enabled(&self, name: &str, default: bool) -> bool {
        self.0.get(name).map(|e| e.is_enabled()).unwrap_or(default)
    }

    /// `exec`'s configured binary allowlist, or empty if unset/malformed.
    pub fn exec_allowed_binaries(&self) -> Vec<String> {
        self.0
            .get("exec")
            .and_then(|e| e.extra())
            .and_then(|v| v.get("allowedBinaries"))
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// `config/heartbeat.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatConfig {
    #[serde(default)]
    pub enabled: bool,
    pub interval_sec: u64,
    pub active_hours: Option<ActiveHours>,
    pub target: String,
    pub model: Option<String>,
    #[serde(default)]
    pub visibility: HeartbeatVisibility,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveHours {
    /// `HH:MM`, compared lexicographically.
    pub start: String,
    /// `HH:MM`, compared lexicographically.
    pub end: String,
    pub tz: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatVisibility {
    #[serde(default = "bool_true")]
    pub show_alerts: bool,
    #[serde(default)]
    pub show_ok: bool,
    #[serde(default)]
    pub use_indicator: bool,
}

impl HeartbeatConfig {
    /// Validates the midnight-wrap open question's resolution: windows that
    /// wrap midnight are rejected at load rather than silently misbehaving
    /// under the lexicographic `HH:MM` comparison (see DESIGN.md).
    pub fn validate(&self) -> Result<()> {
        if let Some(hours) = &self.active_hours {
            if hours.start > hours.end {
                return Err(ConfigError::Invalid(format!(
                    "heartbeat active_hours {}..{} wraps past midnight, which the lexicographic HH:MM comparison cannot express",
                    hours.start, hours.end
                )));
            }
        }
        Ok(())
    }
}

/// `config/cron.toml` — `{jobs: [CronJob, ...]}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CronConfig {
    #[serde(default)]
    pub jobs: Vec<CronJobConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CronJobConfig {
    pub id: String,
    #[serde(default = "bool_true")]
    pub enabled: bool,
    pub schedule: Schedule,
    #[serde(default)]
    pub execution: ExecutionMode,
    #[serde(default)]
    pub delivery: DeliveryMode,
    pub target: String,
    pub prompt: String,
    pub model: Option<String>,
    pub webhook_url: Option<String>,
}

/// `{every: seconds} | {cron: expression} | {at: iso8601}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Schedule {
    Every { every: u64 },
    Cron { cron: String },
    At { at: DateTime<Utc> },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    #[default]
    Main,
    Isolated,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    #[default]
    Announce,
    Webhook,
    None,
}

fn bool_true() -> bool {
    true
}

/// `config/channels/discord.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscordChannelConfig {
    pub bot_token: String,
    #[serde(default)]
    pub require_mention: bool,
    #[serde(default = "bool_true")]
    pub dm_allowed: bool,
}

/// `config/channels/matrix.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixChannelConfig {
    pub homeserver_url: String,
    pub user_id: String,
    pub access_token: String,
}

/// `{root}/config/integrations.toml` — `{brave?: {apiKey}}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntegrationsConfig {
    pub brave: Option<BraveConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BraveConfig {
    pub api_key: String,
}

/// The five per-agent config files, loaded together.
#[derive(Debug, Clone)]
pub struct AgentConfigBundle {
    pub engine: EngineConfig,
    pub tools: ToolsConfig,
    pub heartbeat: HeartbeatConfig,
    pub cron: CronConfig,
    pub discord: Option<DiscordChannelConfig>,
    pub matrix: Option<MatrixChannelConfig>,
}

fn load_toml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    Figment::new()
        .merge(Toml::file(path))
        .extract()
        .map_err(|e| ConfigError::Invalid(format!("{}: {}", path.display(), e)))
}

/// Loads `config/engine.toml`, `config/tools.toml`, `config/heartbeat.toml`,
/// `config/cron.toml`, `config/channels/{discord,matrix}.toml` from an agent
/// root. A missing optional file (heartbeat/cron/channels) falls back to its
/// `Default`; a missing mandatory file (`engine.toml`) is a hard `ConfigError`.
pub fn load_agent_config(agent_root: &Path) -> Result<AgentConfigBundle> {
    let config_dir = agent_root.join("config");

    let engine_path = config_dir.join("engine.toml");
    if !engine_path.is_file() {
        return Err(ConfigError::Missing(engine_path.display().to_string()));
    }
    let engine: EngineConfig = load_toml(&engine_path)?;

    let tools = config_dir.join("tools.toml");
    let tools: ToolsConfig = if tools.is_file() {
        load_toml(&tools)?
    } else {
        ToolsConfig::default()
    };

    let heartbeat_path = config_dir.join("heartbeat.toml");
    let heartbeat: HeartbeatConfig = if heartbeat_path.is_file() {
        let hb: HeartbeatConfig = load_toml(&heartbeat_path)?;
        hb.validate()?;
        hb
    } else {
        HeartbeatConfig {
            enabled: false,
            interval_sec: 3600,
            active_hours: None,
            target: "none".to_string(),
            model: None,
            visibility: HeartbeatVisibility::default(),
        }
    };

    let cron_path = config_dir.join("cron.toml");
    let cron: CronConfig = if cron_path.is_file() {
        load_toml(&cron_path)?
    } else {
        CronConfig::default()
    };

    let discord_path = config_dir.join("channels").join("discord.toml");
    let discord = if discord_path.is_file() {
        Some(load_toml(&discord_path)?)
    } else {
        None
    };

    let matrix_path = config_dir.join("channels").join("matrix.toml");
    let matrix = if matrix_path.is_file() {
        Some(load_toml(&matrix_path)?)
    } else {
        None
    };

    Ok(AgentConfigBundle {
        engine,
        tools,
        heartbeat,
        cron,
        discord,
        matrix,
    })
}

/// Loads the global `{root}/config/integrations.toml`, defaulting if absent.
pub fn load_integrations(root: &Path) -> Result<IntegrationsConfig> {
    let path = root.join("config").join("integrations.toml");
    if path.is_file() {
        load_toml(&path)
    } else {
        Ok(IntegrationsConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn engine_override_applies_for_matching_guild() {
        let mut per_guild = HashMap::new();
        per_guild.insert(
            "42".to_string(),
            EngineOverride {
                api_base: None,
                api_key: None,
                model: Some("gpt-5".to_string()),
            },
        );
        let mut by_kind = HashMap::new();
        by_kind.insert("discord".to_string(), per_guild);

        let engine = EngineConfig {
            api_base: "https://api.example.com".to_string(),
            api_key: Some("k".to_string()),
            model: "default-model".to_string(),
            channel_overrides: ChannelOverrides(by_kind),
        };

        let resolved = engine.resolve("discord", Some("42"));
        assert_eq!(resolved.model, "gpt-5");
        assert_eq!(resolved.api_base, "https://api.example.com");

        let unresolved = engine.resolve("discord", Some("99"));
        assert_eq!(unresolved.model, "default-model");
    }

    #[test]
    fn heartbeat_rejects_midnight_wrap() {
        let hb = HeartbeatConfig {
            enabled: true,
            interval_sec: 60,
            active_hours: Some(ActiveHours {
                start: "22:00".to_string(),
                end: "06:00".to_string(),
                tz: "UTC".to_string(),
            }),
            target: "last".to_string(),
            model: None,
            visibility: HeartbeatVisibility::default(),
        };
        assert!(hb.validate().is_err());
    }

    #[test]
    fn heartbeat_accepts_non_wrapping_window() {
        let hb = HeartbeatConfig {
            enabled: true,
            interval_sec: 60,
            active_hours: Some(ActiveHours {
                start: "08:00".to_string(),
                end: "20:00".to_string(),
                tz: "UTC".to_string(),
            }),
            target: "last".to_string(),
            model: None,
            visibility: HeartbeatVisibility::default(),
        };
        assert!(hb.validate().is_ok());
    }

    #[test]
    fn missing_engine_toml_is_a_config_error() {
        let dir = tempdir().unwrap();
        let err = load_agent_config(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(_)));
    }

    #[test]
    fn loads_minimal_agent_config() {
        let dir = tempdir().unwrap();
        let config_dir = dir.path().join("config");
        fs::create_dir_all(&config_dir).unwrap();
        fs::write(
            config_dir.join("engine.toml"),
            "apiBase = \"https://api.example.com\"\nmodel = \"test-model\"\n",
        )
        .unwrap();

        let bundle = load_agent_config(dir.path()).unwrap();
        assert_eq!(bundle.engine.model, "test-model");
        assert!(!bundle.heartbeat.enabled);
        assert!(bundle.cron.jobs.is_empty());
    }
}
