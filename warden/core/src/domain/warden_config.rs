// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Warden Configuration Types
//
// Defines the configuration schema for a pg-warden process, including:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - SQL and tool governance settings (profiles plus allow/deny overrides)
// - Primary and optional replica endpoints
// - Pool sizing, lifecycle and scale-to-zero retry settings
//
// Environment variables (WARDEN_*) override anything read from YAML.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use crate::domain::governance::GovernanceProfile;
use crate::domain::policy::PolicyConfig;
use crate::domain::pool::{ConnectionPoolConfig, Endpoint};
use crate::domain::statement::StatementType;
use crate::domain::tool::{self, ToolCategory};

pub const API_VERSION: &str = "pg-warden/v1";
pub const KIND: &str = "WardenConfig";

/// Top-level Kubernetes-style configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WardenConfigManifest {
    /// API version (must be "pg-warden/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "WardenConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    #[serde(default)]
    pub spec: WardenConfigSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Human-readable deployment name
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WardenConfigSpec {
    #[serde(default)]
    pub governance: GovernanceSettings,

    #[serde(default)]
    pub database: DatabaseSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GovernanceSettings {
    #[serde(default)]
    pub sql: SqlGovernanceSettings,

    #[serde(default)]
    pub tools: ToolGovernanceSettings,

    /// Legacy switch, only consulted when no governance setting is present
    #[serde(default)]
    pub allow_write: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SqlGovernanceSettings {
    /// One of read_only, analyst, developer, admin
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_types: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub denied_types: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolGovernanceSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_categories: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub denied_categories: Option<Vec<String>>,

    /// Exclusive allow-list of individual tool identifiers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_tools: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub denied_tools: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default)]
    pub primary: EndpointConfig,

    /// Read replica; absent disables replica routing entirely
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replica: Option<EndpointConfig>,

    #[serde(default)]
    pub pool: PoolSettings,

    #[serde(default)]
    pub retry: RetrySettings,

    /// Upper bound on rows returned by a single query
    #[serde(default = "default_max_rows")]
    pub max_rows: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub database: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// Password (supports "env:VAR_NAME" for environment variables)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSettings {
    #[serde(default = "default_pool_min")]
    pub min_size: u32,

    #[serde(default = "default_pool_max")]
    pub max_size: u32,

    /// Connections older than this are retired on next checkout
    #[serde(default = "default_max_lifetime")]
    pub max_lifetime_seconds: u64,

    /// Connections idle longer than this are evicted
    #[serde(default = "default_max_idle")]
    pub max_idle_seconds: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Retries after the first failed attempt while compute wakes up
    #[serde(default = "default_retry_attempts")]
    pub attempts: u32,

    #[serde(default = "default_base_delay")]
    pub base_delay_seconds: f64,

    #[serde(default = "default_max_delay")]
    pub max_delay_seconds: f64,
}

// Default value functions
fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    5432
}

fn default_max_rows() -> u32 {
    1000
}

fn default_pool_min() -> u32 {
    2
}

fn default_pool_max() -> u32 {
    10
}

fn default_max_lifetime() -> u64 {
    300
}

fn default_max_idle() -> u64 {
    60
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_retry_attempts() -> u32 {
    5
}

fn default_base_delay() -> f64 {
    0.5
}

fn default_max_delay() -> f64 {
    10.0
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            database: String::new(),
            user: None,
            password: None,
        }
    }
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            min_size: default_pool_min(),
            max_size: default_pool_max(),
            max_lifetime_seconds: default_max_lifetime(),
            max_idle_seconds: default_max_idle(),
            connect_timeout_seconds: default_connect_timeout(),
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            attempts: default_retry_attempts(),
            base_delay_seconds: default_base_delay(),
            max_delay_seconds: default_max_delay(),
        }
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            primary: EndpointConfig::default(),
            replica: None,
            pool: PoolSettings::default(),
            retry: RetrySettings::default(),
            max_rows: default_max_rows(),
        }
    }
}

impl Default for WardenConfigManifest {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "pg-warden".to_string(),
                labels: None,
            },
            spec: WardenConfigSpec::default(),
        }
    }
}

impl EndpointConfig {
    /// Resolve the password (supports "env:VAR_NAME" syntax)
    pub fn resolve_password(&self) -> anyhow::Result<Option<String>> {
        match &self.password {
            Some(p) => match p.strip_prefix("env:") {
                Some(var_name) => std::env::var(var_name)
                    .map(Some)
                    .map_err(|_| anyhow::anyhow!("Environment variable not set: {}", var_name)),
                None => Ok(Some(p.clone())),
            },
            None => Ok(None),
        }
    }
}

/// Parse a comma-separated override into a list. Blank values count as unset.
pub fn parse_list(value: &str) -> Option<Vec<String>> {
    let items: Vec<String> = value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect();
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_names<T, E>(names: &Option<Vec<String>>) -> Result<BTreeSet<T>, E>
where
    T: std::str::FromStr<Err = E> + Ord,
{
    names
        .iter()
        .flatten()
        .map(|name| name.parse::<T>())
        .collect()
}

impl WardenConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Discover configuration file using precedence order
    /// 1. WARDEN_CONFIG_PATH environment variable
    /// 2. ./warden-config.yaml (working directory)
    /// 3. ~/.warden/config.yaml (user home)
    /// 4. /etc/warden/config.yaml (system, Unix) or C:\ProgramData\Warden\config.yaml (Windows)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("WARDEN_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./warden-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".warden").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        #[cfg(unix)]
        let system_config = PathBuf::from("/etc/warden/config.yaml");
        #[cfg(windows)]
        let system_config = PathBuf::from("C:\\ProgramData\\Warden\\config.yaml");

        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit CLI path (fail if missing/invalid)
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
            })?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply WARDEN_* environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup. Values from `lookup` win over
    /// anything loaded from YAML.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let governance = &mut self.spec.governance;

        if let Some(profile) = lookup("WARDEN_SQL_PROFILE").filter(|v| !v.trim().is_empty()) {
            governance.sql.profile = Some(profile.trim().to_string());
        }
        if let Some(list) = lookup("WARDEN_SQL_ALLOWED_TYPES").and_then(|v| parse_list(&v)) {
            governance.sql.allowed_types = Some(list);
        }
        if let Some(list) = lookup("WARDEN_SQL_DENIED_TYPES").and_then(|v| parse_list(&v)) {
            governance.sql.denied_types = Some(list);
        }

        if let Some(profile) = lookup("WARDEN_TOOL_PROFILE").filter(|v| !v.trim().is_empty()) {
            governance.tools.profile = Some(profile.trim().to_string());
        }
        if let Some(list) = lookup("WARDEN_TOOL_ALLOWED_CATEGORIES").and_then(|v| parse_list(&v)) {
            governance.tools.allowed_categories = Some(list);
        }
        if let Some(list) = lookup("WARDEN_TOOL_DENIED_CATEGORIES").and_then(|v| parse_list(&v)) {
            governance.tools.denied_categories = Some(list);
        }
        if let Some(list) = lookup("WARDEN_TOOL_ALLOWED").and_then(|v| parse_list(&v)) {
            governance.tools.allowed_tools = Some(list);
        }
        if let Some(list) = lookup("WARDEN_TOOL_DENIED").and_then(|v| parse_list(&v)) {
            governance.tools.denied_tools = Some(list);
        }

        if let Some(val) = lookup("WARDEN_ALLOW_WRITE") {
            match parse_bool(&val) {
                Some(enabled) => {
                    tracing::info!("Environment override: WARDEN_ALLOW_WRITE={}", enabled);
                    governance.allow_write = enabled;
                }
                None => tracing::warn!(
                    "Invalid value for WARDEN_ALLOW_WRITE: '{}'. Expected true/false. Ignoring.",
                    val
                ),
            }
        }

        let database = &mut self.spec.database;
        if let Some(host) = lookup("WARDEN_HOST") {
            database.primary.host = host;
        }
        if let Some(port) = lookup("WARDEN_PORT").and_then(|v| v.trim().parse().ok()) {
            database.primary.port = port;
        }
        if let Some(name) = lookup("WARDEN_DATABASE") {
            database.primary.database = name;
        }
        if let Some(user) = lookup("WARDEN_USER") {
            database.primary.user = Some(user);
        }
        if let Some(password) = lookup("WARDEN_PASSWORD") {
            database.primary.password = Some(password);
        }

        if let Some(host) = lookup("WARDEN_REPLICA_HOST").filter(|v| !v.trim().is_empty()) {
            let port = lookup("WARDEN_REPLICA_PORT")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or_else(default_port);
            let primary = database.primary.clone();
            let replica = database.replica.get_or_insert_with(|| EndpointConfig {
                database: primary.database,
                user: primary.user,
                password: primary.password,
                ..EndpointConfig::default()
            });
            replica.host = host;
            replica.port = port;
        }

        let seconds = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());
        let count = |key: &str| {
            let value = lookup(key)?;
            match value.trim().parse::<u32>() {
                Ok(v) => Some(v),
                Err(_) => {
                    tracing::warn!("Invalid value for {}: '{}'. Expected 0-{}. Ignoring.", key, value, u32::MAX);
                    None
                }
            }
        };
        if let Some(v) = count("WARDEN_POOL_MIN") {
            database.pool.min_size = v;
        }
        if let Some(v) = count("WARDEN_POOL_MAX") {
            database.pool.max_size = v;
        }
        if let Some(v) = seconds("WARDEN_POOL_MAX_LIFETIME") {
            database.pool.max_lifetime_seconds = v;
        }
        if let Some(v) = seconds("WARDEN_POOL_MAX_IDLE") {
            database.pool.max_idle_seconds = v;
        }
        if let Some(v) = seconds("WARDEN_CONNECT_TIMEOUT") {
            database.pool.connect_timeout_seconds = v;
        }
        if let Some(v) = count("WARDEN_S2Z_RETRY_ATTEMPTS") {
            database.retry.attempts = v;
        }
        if let Some(v) = lookup("WARDEN_S2Z_RETRY_DELAY").and_then(|v| v.trim().parse().ok()) {
            database.retry.base_delay_seconds = v;
        }
        if let Some(v) = lookup("WARDEN_S2Z_MAX_DELAY").and_then(|v| v.trim().parse().ok()) {
            database.retry.max_delay_seconds = v;
        }
        if let Some(v) = count("WARDEN_MAX_ROWS") {
            database.max_rows = v;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        // Name resolution errors surface here with the offending value.
        self.resolve_policy()?;

        let pool = &self.spec.database.pool;
        if pool.max_size == 0 {
            anyhow::bail!("database.pool.max_size must be at least 1");
        }
        if pool.min_size > pool.max_size {
            anyhow::bail!(
                "database.pool.min_size ({}) cannot exceed max_size ({})",
                pool.min_size,
                pool.max_size
            );
        }

        if self.spec.database.max_rows == 0 {
            anyhow::bail!("database.max_rows must be at least 1");
        }

        let retry = &self.spec.database.retry;
        if !(retry.base_delay_seconds > 0.0) || !(retry.max_delay_seconds > 0.0) {
            anyhow::bail!("database.retry delays must be positive");
        }
        if retry.base_delay_seconds > retry.max_delay_seconds {
            anyhow::bail!(
                "database.retry.base_delay_seconds ({}) cannot exceed max_delay_seconds ({})",
                retry.base_delay_seconds,
                retry.max_delay_seconds
            );
        }

        if let Some(replica) = &self.spec.database.replica {
            if replica.host.trim().is_empty() {
                anyhow::bail!("database.replica.host cannot be empty");
            }
        }

        Ok(())
    }

    /// Resolve governance settings into the immutable runtime policy
    pub fn resolve_policy(&self) -> anyhow::Result<PolicyConfig> {
        let governance = &self.spec.governance;

        let sql_profile = non_blank(&governance.sql.profile)
            .map(str::parse::<GovernanceProfile>)
            .transpose()?;
        let tool_profile = non_blank(&governance.tools.profile)
            .map(str::parse::<GovernanceProfile>)
            .transpose()?;

        let sql_allowed_types = parse_names::<StatementType, _>(&governance.sql.allowed_types)?;
        let sql_denied_types = parse_names::<StatementType, _>(&governance.sql.denied_types)?;
        let tool_allowed_categories =
            parse_names::<ToolCategory, _>(&governance.tools.allowed_categories)?;
        let tool_denied_categories =
            parse_names::<ToolCategory, _>(&governance.tools.denied_categories)?;

        let tool_allowed = Self::known_tools(&governance.tools.allowed_tools)?;
        let tool_denied = Self::known_tools(&governance.tools.denied_tools)?;

        Ok(PolicyConfig {
            sql_profile,
            sql_allowed_types,
            sql_denied_types,
            tool_profile,
            tool_allowed_categories,
            tool_denied_categories,
            tool_allowed,
            tool_denied,
            legacy_allow_write: governance.allow_write,
        })
    }

    fn known_tools(names: &Option<Vec<String>>) -> anyhow::Result<BTreeSet<String>> {
        names
            .iter()
            .flatten()
            .map(|name| {
                let name = name.trim();
                match tool::lookup(name) {
                    Some(entry) => Ok(entry.name.to_string()),
                    None => Err(anyhow::anyhow!("Unknown tool identifier: {}", name)),
                }
            })
            .collect()
    }

    pub fn has_replica(&self) -> bool {
        self.spec.database.replica.is_some()
    }

    pub fn endpoint(&self, endpoint: Endpoint) -> Option<&EndpointConfig> {
        match endpoint {
            Endpoint::Primary => Some(&self.spec.database.primary),
            Endpoint::Replica => self.spec.database.replica.as_ref(),
        }
    }

    /// Pool settings for one endpoint. The replica keeps a single warm connection.
    pub fn pool_config(&self, endpoint: Endpoint) -> ConnectionPoolConfig {
        let database = &self.spec.database;
        let min_size = match endpoint {
            Endpoint::Primary => database.pool.min_size,
            Endpoint::Replica => database.pool.min_size.min(1),
        };
        ConnectionPoolConfig {
            min_size,
            max_size: database.pool.max_size,
            max_lifetime_seconds: database.pool.max_lifetime_seconds,
            max_idle_seconds: database.pool.max_idle_seconds,
            connect_timeout_seconds: database.pool.connect_timeout_seconds,
            retry_attempts: database.retry.attempts,
            base_retry_delay_seconds: database.retry.base_delay_seconds,
            max_retry_delay_seconds: database.retry.max_delay_seconds,
        }
    }
}
