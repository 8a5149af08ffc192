use std::path::PathBuf;

use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config migration failed: {0}")]
    Migration(String),

    #[error("Config version {found} is newer than supported version {supported}")]
    TooNew { found: i64, supported: i64 },
}

/// Current config file format version.
pub const CONFIG_VERSION: i64 = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub version: i64,
    /// Skip all download-client calls; the ledger and webhooks still run.
    pub without_transmission: bool,
    /// Minutes between scheduled update cycles.
    pub poll_minutes: u64,
    /// Keep requesting further pages of a source within one crawl.
    pub auto_page: bool,
    /// Root directory downloads are filed under, one subdirectory per
    /// subscription name.
    pub download_dir: PathBuf,
    /// Offset applied to user-facing timestamps.
    pub timezone_offset_hours: i32,
    pub transmission: TransmissionConfig,
    pub webhooks: Vec<WebhookEndpoint>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            without_transmission: false,
            poll_minutes: 60,
            auto_page: true,
            download_dir: PathBuf::from("downloads"),
            timezone_offset_hours: 8,
            transmission: TransmissionConfig::default(),
            webhooks: Vec::new(),
        }
    }
}

impl Config {
    pub fn timezone(&self) -> FixedOffset {
        match FixedOffset::east_opt(self.timezone_offset_hours * 3600) {
            Some(offset) => offset,
            None => {
                tracing::warn!(
                    "Invalid timezone offset {}, falling back to UTC",
                    self.timezone_offset_hours
                );
                Utc.fix()
            }
        }
    }

    /// Current time in the configured display timezone.
    pub fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.timezone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransmissionConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for TransmissionConfig {
    fn default() -> Self {
        Self {
            protocol: "http".into(),
            host: "localhost".into(),
            port: 9091,
            username: None,
            password: None,
        }
    }
}

impl TransmissionConfig {
    pub fn rpc_url(&self) -> String {
        format!("{}://{}:{}/transmission/rpc", self.protocol, self.host, self.port)
    }

    pub fn auth(&self) -> Option<(String, String)> {
        match (&self.username, &self.password) {
            (Some(user), Some(password)) => Some((user.clone(), password.clone())),
            _ => None,
        }
    }
}

/// One outbound notification target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookEndpoint {
    pub name: String,
    /// Template kind, resolved against the webhook template store.
    pub kind: String,
    pub url: String,
    pub enabled: bool,
}

type ConfigMigration = fn(&mut toml::Table) -> Result<(), ConfigError>;

/// Ordered config migrations, applied strictly ascending above the stored
/// version, mirroring the ledger's migration policy.
const CONFIG_MIGRATIONS: &[(i64, ConfigMigration)] = &[
    (2, migrate_to_2),
    (3, migrate_to_3),
];

/// `subscribe_minutes` was renamed to `poll_minutes`.
fn migrate_to_2(table: &mut toml::Table) -> Result<(), ConfigError> {
    if let Some(value) = table.remove("subscribe_minutes") {
        table.insert("poll_minutes".into(), value);
    }
    Ok(())
}

/// Webhooks used to be a bare list of urls, all treated as enabled feishu
/// endpoints; they became structured endpoint tables.
fn migrate_to_3(table: &mut toml::Table) -> Result<(), ConfigError> {
    let Some(old) = table.remove("webhooks") else {
        return Ok(());
    };
    let urls = old
        .as_array()
        .ok_or_else(|| ConfigError::Migration("webhooks is not a list".into()))?;

    let mut endpoints = toml::value::Array::new();
    for (index, url) in urls.iter().enumerate() {
        if let Some(table) = url.as_table() {
            // Already structured; keep as is.
            endpoints.push(toml::Value::Table(table.clone()));
            continue;
        }
        let url = url
            .as_str()
            .ok_or_else(|| ConfigError::Migration("webhook url is not a string".into()))?;
        let mut endpoint = toml::Table::new();
        endpoint.insert("name".into(), toml::Value::String(format!("webhook-{index}")));
        endpoint.insert("kind".into(), toml::Value::String("feishu".into()));
        endpoint.insert("url".into(), toml::Value::String(url.to_string()));
        endpoint.insert("enabled".into(), toml::Value::Boolean(true));
        endpoints.push(toml::Value::Table(endpoint));
    }
    table.insert("webhooks".into(), toml::Value::Array(endpoints));
    Ok(())
}

/// Process configuration, loaded once and cached; saved atomically.
pub struct ConfigStore {
    path: PathBuf,
    cache: RwLock<Config>,
}

impl ConfigStore {
    /// Load the config file, migrating old formats, or create it with
    /// defaults. A migrated file is written back immediately.
    pub async fn load_or_create(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let config = match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                let (config, migrated) = parse_and_migrate(&content)?;
                if migrated {
                    save_atomic(&path, &config).await?;
                    tracing::info!("Migrated config file to version {}", config.version);
                }
                config
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Config::default();
                save_atomic(&path, &config).await?;
                tracing::info!("Created default config at {}", path.display());
                config
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            cache: RwLock::new(config),
        })
    }

    /// Current config snapshot (no I/O).
    pub async fn get(&self) -> Config {
        self.cache.read().await.clone()
    }

    /// Replace the config, persisting before the cache is touched.
    pub async fn update(&self, mut config: Config) -> Result<Config, ConfigError> {
        config.version = CONFIG_VERSION;
        save_atomic(&self.path, &config).await?;
        *self.cache.write().await = config.clone();
        Ok(config)
    }
}

fn parse_and_migrate(content: &str) -> Result<(Config, bool), ConfigError> {
    let mut table: toml::Table = content.parse()?;
    let stored = table.get("version").and_then(|v| v.as_integer()).unwrap_or(1);
    if stored > CONFIG_VERSION {
        return Err(ConfigError::TooNew {
            found: stored,
            supported: CONFIG_VERSION,
        });
    }

    let mut migrated = false;
    for (version, migration) in CONFIG_MIGRATIONS.iter().filter(|(v, _)| *v > stored) {
        migration(&mut table)?;
        table.insert("version".into(), toml::Value::Integer(*version));
        migrated = true;
    }

    let config: Config = toml::Value::Table(table).try_into()?;
    Ok((config, migrated))
}

/// Write-to-temp-then-rename, so a crash never leaves a torn config.
async fn save_atomic(path: &PathBuf, config: &Config) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    let content = toml::to_string_pretty(config)?;
    let tmp = path.with_extension("toml.tmp");
    tokio::fs::write(&tmp, &content).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}
