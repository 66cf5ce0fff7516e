use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::PersistenceError;

const DEFAULT_DESCRIPTION: &str = "Authorized user IDs for the inline bot";

/// 白名单用户附加信息
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WhitelistUserInfo {
    pub username: String,
    #[serde(deserialize_with = "utc_timestamp")]
    pub added_at: DateTime<Utc>,
}

/// 白名单快照，JSON 文件中的完整内容
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WhitelistSnapshot {
    #[serde(default)]
    pub users: HashSet<i64>,
    #[serde(default)]
    pub user_info: BTreeMap<i64, WhitelistUserInfo>,
    #[serde(default = "Utc::now", deserialize_with = "utc_timestamp")]
    pub last_updated: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// 兼容不带时区的时间戳（如 `2025-07-01T12:34:56.789012`），按 UTC 处理
fn utc_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(dt) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| serde::de::Error::custom(format!("invalid timestamp {:?}: {}", raw, e)))
}

impl Default for WhitelistSnapshot {
    fn default() -> Self {
        Self {
            users: HashSet::new(),
            user_info: BTreeMap::new(),
            last_updated: Utc::now(),
            description: Some(DEFAULT_DESCRIPTION.to_string()),
        }
    }
}

/// 白名单持久化接口
#[async_trait]
pub trait WhitelistStore: Send + Sync {
    async fn load(&self) -> Result<WhitelistSnapshot, PersistenceError>;
    async fn save(&self, snapshot: &WhitelistSnapshot) -> Result<(), PersistenceError>;
}

/// JSON 文件白名单
pub struct JsonFileWhitelistStore {
    path: PathBuf,
}

impl JsonFileWhitelistStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl WhitelistStore for JsonFileWhitelistStore {
    async fn load(&self) -> Result<WhitelistSnapshot, PersistenceError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // 文件不存在时创建空白名单
                let snapshot = WhitelistSnapshot::default();
                self.save(&snapshot).await?;
                tracing::info!("Created empty whitelist at {}", self.path.display());
                Ok(snapshot)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, snapshot: &WhitelistSnapshot) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(snapshot)?;

        // 先写临时文件再重命名，避免写到一半的文件
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

/// 内存白名单，用于关闭白名单的部署
#[derive(Default)]
pub struct MemoryWhitelistStore {
    snapshot: Mutex<Option<WhitelistSnapshot>>,
}

impl MemoryWhitelistStore {
    pub fn new(snapshot: WhitelistSnapshot) -> Self {
        Self {
            snapshot: Mutex::new(Some(snapshot)),
        }
    }
}

#[async_trait]
impl WhitelistStore for MemoryWhitelistStore {
    async fn load(&self) -> Result<WhitelistSnapshot, PersistenceError> {
        let guard = self
            .snapshot
            .lock()
            .map_err(|e| PersistenceError::Unavailable(e.to_string()))?;
        Ok(guard.clone().unwrap_or_default())
    }

    async fn save(&self, snapshot: &WhitelistSnapshot) -> Result<(), PersistenceError> {
        let mut guard = self
            .snapshot
            .lock()
            .map_err(|e| PersistenceError::Unavailable(e.to_string()))?;
        *guard = Some(snapshot.clone());
        Ok(())
    }
}
